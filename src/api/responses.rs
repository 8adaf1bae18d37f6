use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::*;

#[derive(PartialEq, Debug, Serialize, Deserialize, Clone)]
pub struct MatchSettlement {
    pub match_id: MatchId,
    pub winner: String,
    pub wagers: Vec<Wager>,
    pub total_commission: Amount,
}
#[derive(PartialEq, Debug, Serialize, Deserialize, Clone, Default)]
pub struct SweepReport {
    pub matches_settled: u32,
    pub wagers_settled: u32,
    pub wagers_refunded: u32,
    pub failures: u32,
}
#[derive(PartialEq, Debug, Serialize, Deserialize, Clone)]
pub struct CommissionSummary {
    pub total_commission: Amount,
    pub count: u32,
}
#[derive(PartialEq, Debug, Serialize, Deserialize, Clone)]
pub struct CommissionReportRow {
    pub match_id: MatchId,
    pub total_commission: Amount,
    pub count: u32,
    pub last_at: DateTime<Utc>,
}
