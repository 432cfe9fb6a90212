//! Telegram MarkdownV2 message templates.
//!
//! Values go inside inline code spans, where only `` ` `` and `\` need
//! escaping. Free text outside a span goes through [`escape`].

use rust_decimal::Decimal;

use crate::models::{PositionSide, PositionSnapshot};
use crate::risk::{CloseOutcome, RiskPolicy, ThresholdAction};

const RESERVED: &[char] = &[
    '_', '*', '[', ']', '(', ')', '~', '`', '>', '#', '+', '-', '=', '|', '{', '}', '.', '!', '\\',
];

/// Escape MarkdownV2 reserved characters in plain text.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if RESERVED.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn code(value: impl ToString) -> String {
    let value = value.to_string().replace('\\', "\\\\").replace('`', "\\`");
    format!("`{}`", value)
}

fn closed_body(snapshot: &PositionSnapshot) -> String {
    format!(
        "*Symbol*: {}\n*Side*: {}\n*Size*: {}\n*Entry Price*: {}\n*PnL*: {}\n*Return*: {}\n\n",
        code(snapshot.symbol()),
        code(snapshot.side().as_str().to_uppercase()),
        code(snapshot.size().normalize()),
        code(snapshot.entry_price().normalize()),
        code(snapshot.unrealized_pnl().round_dp(2)),
        code(format!("{}%", snapshot.unrealized_pnl_pct().round_dp(2))),
    )
}

/// Alert for a position flattened by a threshold. `snapshot` is the
/// position as it was when the threshold fired.
pub fn position_closed(action: ThresholdAction, snapshot: &PositionSnapshot) -> Option<String> {
    let (header, footer) = match action {
        ThresholdAction::CloseStopLoss => (
            "\u{1F534} *STOP\\-LOSS TRIGGERED* \u{1F534}",
            "*Position closed due to stop\\-loss\\.*",
        ),
        ThresholdAction::CloseTakeProfit => (
            "\u{1F7E2} *TAKE\\-PROFIT TRIGGERED* \u{1F7E2}",
            "*Position closed due to take\\-profit\\.*",
        ),
        ThresholdAction::None => return None,
    };
    Some(format!("{}\n\n{}{}", header, closed_body(snapshot), footer))
}

/// Alert for an operator-requested flatten that completed.
pub fn position_flattened(snapshot: &PositionSnapshot, outcome: &CloseOutcome) -> String {
    format!(
        "\u{26AA} *POSITION FLATTENED* \u{26AA}\n\n{}{}",
        closed_body(snapshot),
        escape(&format!("Manual flatten, {}.", outcome)),
    )
}

pub fn position_opened(
    symbol: &str,
    side: PositionSide,
    size: Decimal,
    price: Decimal,
    policy: &RiskPolicy,
) -> String {
    let header = match side {
        PositionSide::Short => "\u{1F4C9} *Short position opened* \u{1F4C9}",
        _ => "\u{1F4C8} *Long position opened* \u{1F4C8}",
    };
    format!(
        "{}\n\n*Position:*\n• *Pair*: {}\n• *Size*: {}\n• *Price*: {}\n• *Stop\\-Loss*: {}\n• *Profit\\-Target*: {}",
        header,
        code(symbol),
        code(size.normalize()),
        code(price.normalize()),
        code(format!("{}%", policy.stop_loss_pct)),
        code(format!("{}%", policy.take_profit_pct)),
    )
}
