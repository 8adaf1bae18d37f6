use crate::api::*;
use crate::stake::MAX_ODDS;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use log::{debug, warn};
use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const DEFAULT_TIMEOUT_SECS: u64 = 5;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FeedRecord {
    pub match_id: MatchId,
    #[serde(default = "default_sport")]
    pub sport: String,
    pub team_a: String,
    pub team_b: String,
    pub odds: FeedOdds,
    pub status: String,
    #[serde(default)]
    pub winner: Option<String>,
}
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FeedOdds {
    pub team_a: Odds,
    pub team_b: Odds,
}
impl TryFrom<FeedRecord> for OddsQuote {
    type Error = anyhow::Error;

    fn try_from(record: FeedRecord) -> Result<Self> {
        let status = MatchStatus::from_str(&record.status)
            .with_context(|| format!("bad status for match {}", record.match_id))?;
        for odds in [record.odds.team_a, record.odds.team_b] {
            if odds <= Decimal::ONE || odds > MAX_ODDS {
                bail!("odds {} out of range for match {}", odds, record.match_id);
            }
        }
        if record.team_a == record.team_b {
            bail!("{} plays itself in match {}", record.team_a, record.match_id);
        }
        // Some feeds send an empty string until a result is in
        let winner = record.winner.filter(|winner| !winner.trim().is_empty());
        Ok(OddsQuote {
            match_id: record.match_id,
            sport: record.sport,
            team_a: record.team_a,
            team_b: record.team_b,
            odds_a: record.odds.team_a,
            odds_b: record.odds.team_b,
            status,
            winner,
        })
    }
}

pub fn to_quotes(records: Vec<FeedRecord>) -> Vec<OddsQuote> {
    records
        .into_iter()
        .filter_map(|record| match OddsQuote::try_from(record) {
            Ok(quote) => Some(quote),
            Err(e) => {
                warn!("Skipping feed record: {:#}", e);
                None
            }
        })
        .collect()
}

#[async_trait]
pub trait OddsProvider {
    async fn fetch(&self) -> Result<Vec<FeedRecord>>;
}

pub struct HttpOddsProvider {
    client: Client,
    url: String,
    api_key: Option<String>,
}
impl HttpOddsProvider {
    pub fn new(url: String, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("couldn't build feed client")?;
        Ok(Self {
            client,
            url,
            api_key,
        })
    }
}
#[async_trait]
impl OddsProvider for HttpOddsProvider {
    async fn fetch(&self) -> Result<Vec<FeedRecord>> {
        let mut request = self.client.get(self.url.as_str());
        if let Some(api_key) = &self.api_key {
            request = request.header("x-api-key", api_key);
        }
        let response = request
            .send()
            .await
            .with_context(|| format!("feed {} unreachable", self.url))?;
        if response.status() != StatusCode::OK {
            bail!(
                "feed answered {}: {}",
                response.status(),
                response.text().await.unwrap_or_default()
            )
        }
        let records = response
            .json::<Vec<FeedRecord>>()
            .await
            .context("feed sent malformed records")?;
        debug!("Fetched {} records from {}", records.len(), self.url);
        Ok(records)
    }
}

#[derive(Debug, Default, Clone)]
pub struct StaticOddsProvider {
    records: Arc<Mutex<Vec<FeedRecord>>>,
}
impl StaticOddsProvider {
    pub fn new(records: Vec<FeedRecord>) -> Self {
        Self {
            records: Arc::new(Mutex::new(records)),
        }
    }
    pub fn set(&self, records: Vec<FeedRecord>) {
        if let Ok(mut current) = self.records.lock() {
            *current = records;
        }
    }
}
#[async_trait]
impl OddsProvider for StaticOddsProvider {
    async fn fetch(&self) -> Result<Vec<FeedRecord>> {
        match self.records.lock() {
            Ok(records) => Ok(records.clone()),
            Err(_) => bail!("static feed poisoned"),
        }
    }
}
