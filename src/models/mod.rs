//! Value types shared by the gateway, the risk controller and the CLI.

mod order;
mod position;

pub use order::{CloseAttempt, OrderBookTop, OrderSide, OrderState};
pub use position::{PositionSide, PositionSnapshot};
