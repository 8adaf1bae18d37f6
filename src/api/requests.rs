use serde::{Deserialize, Serialize};

use super::*;

// Requests
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct PlaceWagerRequest {
    pub user: RowId,
    pub match_id: MatchId,
    pub team: String,
    pub stake: Amount,
    pub odds: Odds,
    #[serde(default)]
    pub accept_window_secs: Option<u32>,
}
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct AcceptWagerRequest {
    pub wager: RowId,
    pub user: RowId,
}
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct EditWagerRequest {
    pub wager: RowId,
    pub user: RowId,
    #[serde(default)]
    pub stake: Option<Amount>,
    #[serde(default)]
    pub odds: Option<Odds>,
}
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct CancelWagerRequest {
    pub wager: RowId,
    pub user: RowId,
}
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SettleWagerRequest {
    pub admin: RowId,
    pub wager: RowId,
    pub winner: String,
}
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SettleMatchRequest {
    pub admin: RowId,
    pub match_id: MatchId,
    pub winner: String,
}
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct VoidMatchRequest {
    pub admin: RowId,
    pub match_id: MatchId,
}
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct CreateAccountRequest {
    pub name: String,
    #[serde(default)]
    pub role: UserRole,
    #[serde(default)]
    pub balance: Amount,
}
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct AccountRequest {
    pub user: RowId,
}
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct FundsRequest {
    pub user: RowId,
    pub amount: Amount,
}
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct TransactionDecisionRequest {
    pub admin: RowId,
    pub transaction: RowId,
}
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct PublishOddsRequest {
    pub admin: RowId,
    pub quote: OddsQuote,
}
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct CreateMatchRequest {
    pub admin: RowId,
    pub match_id: MatchId,
    #[serde(default = "default_sport")]
    pub sport: String,
    pub team_a: String,
    pub team_b: String,
    pub odds_a: Odds,
    pub odds_b: Odds,
}
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct MatchRequest {
    pub match_id: MatchId,
}
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct AdminMatchRequest {
    pub admin: RowId,
    pub match_id: MatchId,
}
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct AdminRequest {
    pub admin: RowId,
}
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct AdminWagersRequest {
    pub admin: RowId,
    #[serde(default)]
    pub status: Option<WagerStatus>,
}
