//! Response types for the Binance USDT-M futures REST API.
//!
//! Binance encodes prices and quantities as strings; `Decimal` parses them
//! directly.

use rust_decimal::Decimal;
use serde::Deserialize;

use crate::models::OrderSide;

use super::gateway::{RawBookTop, RawOrder, RawPosition, RawTrade};

/// Entry from `/fapi/v2/positionRisk`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionRiskResponse {
    pub symbol: String,
    /// Signed: negative for shorts in one-way mode.
    pub position_amt: Decimal,
    pub entry_price: Decimal,
    pub un_realized_profit: Decimal,
    #[serde(default)]
    pub notional: Decimal,
    #[serde(default)]
    pub leverage: Decimal,
    /// `BOTH` in one-way mode, `LONG` / `SHORT` in hedge mode.
    #[serde(default)]
    pub position_side: Option<String>,
}

impl PositionRiskResponse {
    /// Return on initial margin, in percent. `None` when margin is unknown.
    pub fn pnl_percent(&self) -> Option<Decimal> {
        if self.leverage <= Decimal::ZERO {
            return None;
        }
        let initial_margin = self.notional.abs() / self.leverage;
        if initial_margin.is_zero() {
            return None;
        }
        Some(self.un_realized_profit / initial_margin * Decimal::ONE_HUNDRED)
    }

    pub fn into_raw(self) -> RawPosition {
        let pnl_percent = self.pnl_percent();
        RawPosition {
            symbol: self.symbol,
            side: self.position_side,
            amount: self.position_amt,
            entry_price: self.entry_price,
            notional: self.notional,
            pnl_percent,
            unrealized_pnl: self.un_realized_profit,
        }
    }
}

/// Response from `/fapi/v1/depth`. Levels are `[price, qty]` pairs.
#[derive(Debug, Clone, Deserialize)]
pub struct DepthResponse {
    pub bids: Vec<(Decimal, Decimal)>,
    pub asks: Vec<(Decimal, Decimal)>,
}

impl DepthResponse {
    pub fn top(&self) -> RawBookTop {
        RawBookTop {
            best_bid: self.bids.first().map(|(price, _)| *price),
            best_ask: self.asks.first().map(|(price, _)| *price),
        }
    }
}

/// Entry from `/fapi/v1/trades`.
#[derive(Debug, Clone, Deserialize)]
pub struct TradeResponse {
    pub price: Decimal,
    pub qty: Decimal,
    pub time: i64,
}

impl From<TradeResponse> for RawTrade {
    fn from(t: TradeResponse) -> Self {
        RawTrade {
            price: t.price,
            qty: t.qty,
            time_ms: t.time,
        }
    }
}

/// Entry from `/fapi/v1/allOrders`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    pub order_id: u64,
    pub status: String,
    pub side: OrderSide,
    pub price: Decimal,
    pub orig_qty: Decimal,
    pub executed_qty: Decimal,
    pub time: i64,
}

impl From<OrderResponse> for RawOrder {
    fn from(o: OrderResponse) -> Self {
        RawOrder {
            order_id: o.order_id.to_string(),
            status: o.status,
            side: o.side,
            price: o.price,
            orig_qty: o.orig_qty,
            executed_qty: o.executed_qty,
            time_ms: o.time,
        }
    }
}

/// Acknowledgement from `POST /fapi/v1/order`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacedOrderResponse {
    pub order_id: u64,
    #[serde(default)]
    pub status: String,
}

/// Binance error body, e.g. `{"code":-2019,"msg":"Margin is insufficient."}`.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorResponse {
    pub code: i64,
    pub msg: String,
}

/// Response from `/fapi/v1/exchangeInfo`.
#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeInfoResponse {
    pub symbols: Vec<SymbolInfo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SymbolInfo {
    pub symbol: String,
    #[serde(default)]
    pub filters: Vec<SymbolFilter>,
}

impl SymbolInfo {
    pub fn tick_size(&self) -> Option<Decimal> {
        self.filters.iter().find_map(|f| match f {
            SymbolFilter::PriceFilter { tick_size } => Some(*tick_size),
            SymbolFilter::Other => None,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "filterType")]
pub enum SymbolFilter {
    #[serde(rename = "PRICE_FILTER")]
    PriceFilter {
        #[serde(rename = "tickSize")]
        tick_size: Decimal,
    },
    #[serde(other)]
    Other,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_short_position() {
        let json = r#"{
            "symbol": "BTCUSDT",
            "positionAmt": "-0.004",
            "entryPrice": "65000.0",
            "markPrice": "66300.0",
            "unRealizedProfit": "-5.20000000",
            "liquidationPrice": "0",
            "leverage": "20",
            "marginType": "cross",
            "isolatedMargin": "0.00000000",
            "positionSide": "BOTH",
            "notional": "-265.2",
            "updateTime": 1700000000000
        }"#;

        let pos: PositionRiskResponse = serde_json::from_str(json).unwrap();
        assert_eq!(pos.position_amt, dec!(-0.004));
        assert_eq!(pos.leverage, dec!(20));

        // margin = 265.2 / 20 = 13.26; -5.2 / 13.26 * 100
        let pct = pos.pnl_percent().unwrap();
        assert_eq!(pct.round_dp(2), dec!(-39.22));

        let raw = pos.into_raw();
        assert_eq!(raw.amount, dec!(-0.004));
        assert_eq!(raw.side.as_deref(), Some("BOTH"));
    }

    #[test]
    fn test_pnl_percent_without_margin() {
        let json = r#"{
            "symbol": "BTCUSDT",
            "positionAmt": "0.000",
            "entryPrice": "0.0",
            "unRealizedProfit": "0.00000000",
            "leverage": "20",
            "notional": "0"
        }"#;

        let pos: PositionRiskResponse = serde_json::from_str(json).unwrap();
        assert_eq!(pos.pnl_percent(), None);
    }

    #[test]
    fn test_depth_top() {
        let json = r#"{
            "lastUpdateId": 1027024,
            "E": 1589436922972,
            "T": 1589436922959,
            "bids": [["65000.10", "1.2"], ["64999.90", "0.5"]],
            "asks": []
        }"#;

        let depth: DepthResponse = serde_json::from_str(json).unwrap();
        let top = depth.top();
        assert_eq!(top.best_bid, Some(dec!(65000.10)));
        assert_eq!(top.best_ask, None);
    }

    #[test]
    fn test_tick_size_from_exchange_info() {
        let json = r#"{
            "symbols": [{
                "symbol": "BTCUSDT",
                "pricePrecision": 2,
                "filters": [
                    {"filterType": "PRICE_FILTER", "minPrice": "556.80", "maxPrice": "4529764", "tickSize": "0.10"},
                    {"filterType": "LOT_SIZE", "stepSize": "0.001", "maxQty": "1000", "minQty": "0.001"}
                ]
            }]
        }"#;

        let info: ExchangeInfoResponse = serde_json::from_str(json).unwrap();
        assert_eq!(info.symbols[0].tick_size(), Some(dec!(0.10)));
    }

    #[test]
    fn test_parse_order() {
        let json = r#"{
            "orderId": 8886774,
            "symbol": "BTCUSDT",
            "status": "NEW",
            "clientOrderId": "rg-abc",
            "price": "65000.1",
            "avgPrice": "0.0",
            "origQty": "0.002",
            "executedQty": "0",
            "side": "BUY",
            "type": "LIMIT",
            "time": 1700000000000,
            "updateTime": 1700000000000
        }"#;

        let order: RawOrder = serde_json::from_str::<OrderResponse>(json).unwrap().into();
        assert_eq!(order.order_id, "8886774");
        assert_eq!(order.side, OrderSide::Buy);
        assert_eq!(order.orig_qty, dec!(0.002));
    }
}
