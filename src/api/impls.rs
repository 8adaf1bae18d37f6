use std::{
    fmt::{Display, Formatter},
    str::FromStr,
};

use anyhow::bail;

use super::*;

impl Display for UserRole {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let output = match self {
            Self::User => "user",
            Self::Admin => "admin",
        };
        write!(f, "{}", output)
    }
}
impl FromStr for UserRole {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "admin" => Ok(Self::Admin),
            e => bail!("Couldn't deserialize to UserRole: {}", e),
        }
    }
}
impl Default for UserRole {
    fn default() -> Self {
        UserRole::User
    }
}
impl Display for WagerStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let output = match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Won => "won",
            Self::Lost => "lost",
            Self::Cancelled => "cancelled",
            Self::Refunded => "refunded",
        };
        write!(f, "{}", output)
    }
}
impl FromStr for WagerStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "active" => Ok(Self::Active),
            "won" => Ok(Self::Won),
            "lost" => Ok(Self::Lost),
            "cancelled" => Ok(Self::Cancelled),
            "refunded" => Ok(Self::Refunded),
            e => bail!("Couldn't deserialize to WagerStatus: {}", e),
        }
    }
}
impl Display for MatchStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let output = match self {
            Self::Upcoming => "upcoming",
            Self::Live => "live",
            Self::Completed => "completed",
            Self::Finished => "finished",
            Self::Cancelled => "cancelled",
        };
        write!(f, "{}", output)
    }
}
impl FromStr for MatchStatus {
    type Err = anyhow::Error;

    // Feeds are not consistent about casing
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "upcoming" | "scheduled" => Ok(Self::Upcoming),
            "live" => Ok(Self::Live),
            "completed" => Ok(Self::Completed),
            "finished" => Ok(Self::Finished),
            "cancelled" | "canceled" => Ok(Self::Cancelled),
            e => bail!("Couldn't deserialize to MatchStatus: {}", e),
        }
    }
}
impl Display for TxDirection {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let output = match self {
            Self::Credit => "credit",
            Self::Debit => "debit",
        };
        write!(f, "{}", output)
    }
}
impl FromStr for TxDirection {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "credit" => Ok(Self::Credit),
            "debit" => Ok(Self::Debit),
            e => bail!("Couldn't deserialize to TxDirection: {}", e),
        }
    }
}
impl Display for TxMethod {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let output = match self {
            Self::Deposit => "deposit",
            Self::Withdraw => "withdraw",
            Self::Bet => "bet",
            Self::Settlement => "settlement",
            Self::Refund => "refund",
        };
        write!(f, "{}", output)
    }
}
impl FromStr for TxMethod {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "deposit" => Ok(Self::Deposit),
            "withdraw" => Ok(Self::Withdraw),
            "bet" => Ok(Self::Bet),
            "settlement" => Ok(Self::Settlement),
            "refund" => Ok(Self::Refund),
            e => bail!("Couldn't deserialize to TxMethod: {}", e),
        }
    }
}
impl Display for TxStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let output = match self {
            Self::Pending => "pending",
            Self::Success => "success",
            Self::Failed => "failed",
        };
        write!(f, "{}", output)
    }
}
impl FromStr for TxStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "success" => Ok(Self::Success),
            "failed" => Ok(Self::Failed),
            e => bail!("Couldn't deserialize to TxStatus: {}", e),
        }
    }
}
impl Display for CommissionStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let output = match self {
            Self::Pending => "pending",
            Self::Credited => "credited",
        };
        write!(f, "{}", output)
    }
}
impl FromStr for CommissionStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "credited" => Ok(Self::Credited),
            e => bail!("Couldn't deserialize to CommissionStatus: {}", e),
        }
    }
}
