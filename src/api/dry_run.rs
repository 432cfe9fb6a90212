//! Dry-run gateway: real market and account reads, simulated writes.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use tracing::info;

use crate::models::OrderSide;

use super::gateway::{ExchangeGateway, RawBookTop, RawOrder, RawPosition, RawTrade};

/// Wraps a gateway so cancels and order submissions are only logged.
pub struct DryRunGateway {
    inner: Arc<dyn ExchangeGateway>,
}

impl DryRunGateway {
    pub fn new(inner: Arc<dyn ExchangeGateway>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl ExchangeGateway for DryRunGateway {
    async fn fetch_position(&self, symbol: &str) -> Result<Option<RawPosition>> {
        self.inner.fetch_position(symbol).await
    }

    async fn fetch_order_book_top(&self, symbol: &str) -> Result<RawBookTop> {
        self.inner.fetch_order_book_top(symbol).await
    }

    async fn fetch_last_trade(&self, symbol: &str) -> Result<Option<RawTrade>> {
        self.inner.fetch_last_trade(symbol).await
    }

    async fn fetch_orders(&self, symbol: &str) -> Result<Vec<RawOrder>> {
        self.inner.fetch_orders(symbol).await
    }

    async fn cancel_all_orders(&self, symbol: &str) -> Result<()> {
        info!(symbol = %symbol, "[DRY RUN] Would cancel all open orders");
        Ok(())
    }

    async fn submit_limit_order(
        &self,
        symbol: &str,
        side: OrderSide,
        price: Decimal,
        size: Decimal,
    ) -> Result<String> {
        info!(
            symbol = %symbol,
            side = %side,
            price = %price,
            size = %size,
            "[DRY RUN] Would submit limit order"
        );
        Ok(format!("dry-run-{}", uuid::Uuid::new_v4().simple()))
    }

    async fn round_price(&self, symbol: &str, price: Decimal) -> Result<Decimal> {
        self.inner.round_price(symbol, price).await
    }
}
