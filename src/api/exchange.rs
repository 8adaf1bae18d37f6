use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub type RowId = i64;
pub type MatchId = String;
pub type Amount = Decimal;
pub type Odds = Decimal;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Account {
    pub id: RowId,
    pub name: String,
    pub balance: Amount,
    pub role: UserRole,
}
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    User,
    Admin,
}

/// Two-sided stake contract between a maker and a taker.
///
/// The taker fields stay `None` while the wager is [`WagerStatus::Pending`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Wager {
    pub id: RowId,
    pub match_id: MatchId,
    pub sport: String,
    pub maker_id: RowId,
    pub maker_team: String,
    pub maker_stake: Amount,
    pub maker_odds: Odds,
    pub taker_id: Option<RowId>,
    pub taker_team: Option<String>,
    pub taker_stake: Option<Amount>,
    pub taker_odds: Option<Odds>,
    pub opposite_odds: Odds,
    pub potential_win: Amount,
    pub status: WagerStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub matched_at: Option<DateTime<Utc>>,
    pub settled_at: Option<DateTime<Utc>>,
    pub settled_by: Option<String>,
    pub winner_team: Option<String>,
    pub commission: Amount,
}
impl Wager {
    pub fn is_settled(&self) -> bool {
        matches!(self.status, WagerStatus::Won | WagerStatus::Lost)
    }
    pub fn pool(&self) -> Amount {
        self.maker_stake + self.taker_stake.unwrap_or_default()
    }
}
/// `Won` and `Lost` always describe the maker's outcome.
#[derive(PartialEq, Debug, Clone, Copy, Serialize, Deserialize, Eq)]
#[serde(rename_all = "lowercase")]
pub enum WagerStatus {
    Pending,
    Active,
    Won,
    Lost,
    Cancelled,
    Refunded,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Match {
    pub id: MatchId,
    pub sport: String,
    pub team_a: String,
    pub team_b: String,
    pub odds_a: Odds,
    pub odds_b: Odds,
    pub status: MatchStatus,
    pub winner: Option<String>,
    pub settled: bool,
}
impl Match {
    pub fn has_team(&self, team: &str) -> bool {
        self.team_a == team || self.team_b == team
    }
    /// Team and odds of the side not chosen by `team`.
    pub fn opposite_of(&self, team: &str) -> Option<(&str, Odds)> {
        if team == self.team_a {
            Some((self.team_b.as_str(), self.odds_b))
        } else if team == self.team_b {
            Some((self.team_a.as_str(), self.odds_a))
        } else {
            None
        }
    }
}
#[derive(PartialEq, Debug, Clone, Copy, Serialize, Deserialize, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MatchStatus {
    Upcoming,
    Live,
    Completed,
    Finished,
    Cancelled,
}
impl MatchStatus {
    fn rank(&self) -> u8 {
        match self {
            Self::Upcoming => 0,
            Self::Live => 1,
            Self::Completed => 2,
            Self::Finished | Self::Cancelled => 3,
        }
    }
    pub fn accepts_bets(&self) -> bool {
        matches!(self, Self::Upcoming)
    }
    pub fn is_concluded(&self) -> bool {
        matches!(self, Self::Completed | Self::Finished)
    }
    /// Status only ever moves forward. Staying put is allowed.
    pub fn can_become(&self, next: MatchStatus) -> bool {
        *self == next || next.rank() > self.rank()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OddsQuote {
    pub match_id: MatchId,
    #[serde(default = "default_sport")]
    pub sport: String,
    pub team_a: String,
    pub team_b: String,
    pub odds_a: Odds,
    pub odds_b: Odds,
    pub status: MatchStatus,
    #[serde(default)]
    pub winner: Option<String>,
}
pub fn default_sport() -> String {
    "cricket".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transaction {
    pub id: RowId,
    pub user_id: RowId,
    pub amount: Amount,
    pub direction: TxDirection,
    pub method: TxMethod,
    pub status: TxStatus,
    pub note: String,
    pub meta: serde_json::Value,
    pub created_at: DateTime<Utc>,
}
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TxDirection {
    Credit,
    Debit,
}
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TxMethod {
    Deposit,
    Withdraw,
    Bet,
    Settlement,
    Refund,
}
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TxStatus {
    Pending,
    Success,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Commission {
    pub id: RowId,
    pub match_id: MatchId,
    pub user_id: RowId,
    pub wager_id: RowId,
    pub amount: Amount,
    pub percent: Decimal,
    pub status: CommissionStatus,
    pub created_at: DateTime<Utc>,
}
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CommissionStatus {
    Pending,
    Credited,
}
