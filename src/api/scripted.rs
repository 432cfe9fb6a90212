//! In-memory gateway for tests: replays scripted exchange responses and
//! records every write.

use std::collections::VecDeque;
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::models::OrderSide;

use super::gateway::{round_to_tick, ExchangeGateway, RawBookTop, RawOrder, RawPosition, RawTrade};

/// An order the code under test submitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmittedOrder {
    pub side: OrderSide,
    pub price: Decimal,
    pub size: Decimal,
}

#[derive(Default)]
struct ScriptState {
    positions: VecDeque<Result<Option<RawPosition>, String>>,
    books: VecDeque<Result<RawBookTop, String>>,
    submit_failures: VecDeque<String>,
    cancel_failure: Option<String>,
    orders: Vec<RawOrder>,
    last_trade: Option<RawTrade>,
    tick: Decimal,
    submitted: Vec<SubmittedOrder>,
    cancel_calls: usize,
    position_reads: usize,
    order_reads: usize,
}

/// Scripted exchange.
///
/// Position and book responses are queues: each read pops the front entry,
/// and the last entry repeats forever. With nothing scripted the position
/// is flat and the book is `100.0 / 100.5`.
pub struct ScriptedGateway {
    symbol: String,
    state: Mutex<ScriptState>,
}

fn next_or_last<T: Clone>(queue: &mut VecDeque<T>) -> Option<T> {
    if queue.len() > 1 {
        queue.pop_front()
    } else {
        queue.front().cloned()
    }
}

impl ScriptedGateway {
    pub fn new(symbol: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            state: Mutex::new(ScriptState {
                tick: dec!(0.1),
                ..Default::default()
            }),
        }
    }

    fn edit(self, f: impl FnOnce(&mut ScriptState)) -> Self {
        f(&mut self.state.lock().unwrap());
        self
    }

    pub fn with_position(self, position: Option<RawPosition>) -> Self {
        self.edit(|s| s.positions.push_back(Ok(position)))
    }

    pub fn with_position_error(self, msg: &str) -> Self {
        let msg = msg.to_string();
        self.edit(|s| s.positions.push_back(Err(msg)))
    }

    pub fn with_book(self, bid: Decimal, ask: Decimal) -> Self {
        self.with_raw_book(RawBookTop {
            best_bid: Some(bid),
            best_ask: Some(ask),
        })
    }

    pub fn with_raw_book(self, book: RawBookTop) -> Self {
        self.edit(|s| s.books.push_back(Ok(book)))
    }

    pub fn with_book_error(self, msg: &str) -> Self {
        let msg = msg.to_string();
        self.edit(|s| s.books.push_back(Err(msg)))
    }

    pub fn with_submit_failure(self, msg: &str) -> Self {
        let msg = msg.to_string();
        self.edit(|s| s.submit_failures.push_back(msg))
    }

    pub fn with_cancel_failure(self, msg: &str) -> Self {
        let msg = msg.to_string();
        self.edit(|s| s.cancel_failure = Some(msg))
    }

    pub fn with_orders(self, orders: Vec<RawOrder>) -> Self {
        self.edit(|s| s.orders = orders)
    }

    pub fn with_last_trade(self, price: Decimal) -> Self {
        self.edit(|s| {
            s.last_trade = Some(RawTrade {
                price,
                qty: dec!(0.001),
                time_ms: 1_700_000_000_000,
            })
        })
    }

    pub fn with_tick(self, tick: Decimal) -> Self {
        self.edit(|s| s.tick = tick)
    }

    pub fn submitted(&self) -> Vec<SubmittedOrder> {
        self.state.lock().unwrap().submitted.clone()
    }

    pub fn cancel_calls(&self) -> usize {
        self.state.lock().unwrap().cancel_calls
    }

    pub fn position_reads(&self) -> usize {
        self.state.lock().unwrap().position_reads
    }

    pub fn order_reads(&self) -> usize {
        self.state.lock().unwrap().order_reads
    }
}

#[async_trait]
impl ExchangeGateway for ScriptedGateway {
    async fn fetch_position(&self, symbol: &str) -> Result<Option<RawPosition>> {
        assert_eq!(symbol, self.symbol);
        let mut state = self.state.lock().unwrap();
        state.position_reads += 1;
        match next_or_last(&mut state.positions) {
            Some(Ok(position)) => Ok(position),
            Some(Err(msg)) => Err(anyhow!(msg)),
            None => Ok(None),
        }
    }

    async fn fetch_order_book_top(&self, _symbol: &str) -> Result<RawBookTop> {
        let mut state = self.state.lock().unwrap();
        match next_or_last(&mut state.books) {
            Some(Ok(book)) => Ok(book),
            Some(Err(msg)) => Err(anyhow!(msg)),
            None => Ok(RawBookTop {
                best_bid: Some(dec!(100.0)),
                best_ask: Some(dec!(100.5)),
            }),
        }
    }

    async fn fetch_last_trade(&self, _symbol: &str) -> Result<Option<RawTrade>> {
        Ok(self.state.lock().unwrap().last_trade.clone())
    }

    async fn fetch_orders(&self, _symbol: &str) -> Result<Vec<RawOrder>> {
        let mut state = self.state.lock().unwrap();
        state.order_reads += 1;
        Ok(state.orders.clone())
    }

    async fn cancel_all_orders(&self, _symbol: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.cancel_calls += 1;
        match &state.cancel_failure {
            Some(msg) => Err(anyhow!(msg.clone())),
            None => Ok(()),
        }
    }

    async fn submit_limit_order(
        &self,
        _symbol: &str,
        side: OrderSide,
        price: Decimal,
        size: Decimal,
    ) -> Result<String> {
        let mut state = self.state.lock().unwrap();
        if let Some(msg) = state.submit_failures.pop_front() {
            return Err(anyhow!(msg));
        }
        state.submitted.push(SubmittedOrder { side, price, size });
        Ok(format!("order-{}", state.submitted.len()))
    }

    async fn round_price(&self, _symbol: &str, price: Decimal) -> Result<Decimal> {
        Ok(round_to_tick(price, self.state.lock().unwrap().tick))
    }
}

/// One-way-mode long position record.
pub fn long_position(symbol: &str, size: Decimal, pnl_percent: Decimal) -> RawPosition {
    RawPosition {
        symbol: symbol.to_string(),
        side: Some("BOTH".to_string()),
        amount: size,
        entry_price: dec!(65000),
        notional: size * dec!(65000),
        pnl_percent: Some(pnl_percent),
        unrealized_pnl: pnl_percent / dec!(10),
    }
}

/// One-way-mode short position record; `size` is reported negative.
pub fn short_position(symbol: &str, size: Decimal, pnl_percent: Decimal) -> RawPosition {
    RawPosition {
        symbol: symbol.to_string(),
        side: Some("BOTH".to_string()),
        amount: -size,
        entry_price: dec!(65000),
        notional: -size * dec!(65000),
        pnl_percent: Some(pnl_percent),
        unrealized_pnl: pnl_percent / dec!(10),
    }
}

pub fn order(order_id: &str, status: &str, time_ms: i64) -> RawOrder {
    RawOrder {
        order_id: order_id.to_string(),
        status: status.to_string(),
        side: OrderSide::Buy,
        price: dec!(65000),
        orig_qty: dec!(0.002),
        executed_qty: Decimal::ZERO,
        time_ms,
    }
}
