use crate::api::*;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;

/// Floor for `opposite_odds - 1`, keeps odds of exactly 1 from dividing by zero.
pub const ODDS_EPSILON: Decimal = dec!(0.000001);
pub const MAX_AMOUNT: Decimal = dec!(1_000_000_000);
pub const MAX_ODDS: Decimal = dec!(1000);

pub fn round_currency(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

pub fn is_cent_precise(amount: Decimal) -> bool {
    amount.normalize().scale() <= 2
}

pub fn to_cents(amount: Decimal) -> Option<i64> {
    let cents = amount.checked_mul(dec!(100))?;
    if !cents.fract().is_zero() {
        return None;
    }
    cents.to_i64()
}

pub fn from_cents(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}

/// Counter-stake the taker has to put up so that both sides risk what the other can win.
///
/// `None` if the result doesn't fit a `Decimal`.
pub fn taker_stake(maker_stake: Amount, maker_odds: Odds, opposite_odds: Odds) -> Option<Amount> {
    let numerator = maker_stake.checked_mul((maker_odds - Decimal::ONE).max(Decimal::ZERO))?;
    let denominator = (opposite_odds - Decimal::ONE).max(ODDS_EPSILON);
    Some(round_currency(numerator.checked_div(denominator)?))
}

pub fn potential_win(maker_stake: Amount, maker_odds: Odds) -> Option<Amount> {
    Some(round_currency(maker_stake.checked_mul(maker_odds)?))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Split {
    pub pool: Amount,
    /// The losing side's stake.
    pub profit: Amount,
    pub commission: Amount,
    /// Credited to the winner. `payout + commission == pool` always holds.
    pub payout: Amount,
}

pub fn split(maker_stake: Amount, taker_stake: Amount, maker_wins: bool, rate: Decimal) -> Split {
    let pool = maker_stake + taker_stake;
    let profit = if maker_wins { taker_stake } else { maker_stake };
    let commission = round_currency(profit * rate);
    Split {
        pool,
        profit,
        commission,
        payout: pool - commission,
    }
}
