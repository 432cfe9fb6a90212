//! Exchange access: the gateway port and its Binance futures implementation.

mod binance_client;
mod dry_run;
mod gateway;
#[cfg(test)]
pub mod scripted;
mod types;

pub use binance_client::{BinanceFuturesClient, FUTURES_URL};
pub use dry_run::DryRunGateway;
pub use gateway::{round_to_tick, ExchangeGateway, RawBookTop, RawOrder, RawPosition, RawTrade};
