use crate::api::*;
use log::{info, warn};
use serde::Serialize;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MatchSettled {
    pub match_id: MatchId,
    pub winner: String,
    pub wagers: u32,
    pub total_commission: Amount,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "event", content = "payload")]
pub enum Event {
    #[serde(rename = "wager:created")]
    WagerCreated(Wager),
    #[serde(rename = "wager:matched")]
    WagerMatched(Wager),
    #[serde(rename = "wager:settled")]
    WagerSettled(Wager),
    #[serde(rename = "match:settled")]
    MatchSettled(MatchSettled),
}

/// Fire-and-forget sink for exchange events.
///
/// Called only after the ledger change is committed. Implementations must not fail the caller.
pub trait Notifier {
    fn emit(&self, event: Event);
}

#[derive(Debug, Default)]
pub struct LogNotifier;
impl Notifier for LogNotifier {
    fn emit(&self, event: Event) {
        match serde_json::to_string(&event) {
            Ok(json) => info!("{}", json),
            Err(e) => warn!("Couldn't serialize event {:?}: {}", event, e),
        }
    }
}

#[cfg(test)]
pub use self::recording::RecordingNotifier;


#[cfg(test)]
mod test {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn event_shape() {
        let event = Event::MatchSettled(MatchSettled {
            match_id: "m1".into(),
            winner: "Lions".into(),
            wagers: 2,
            total_commission: dec!(7.50),
        });
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({
                "event": "match:settled",
                "payload": {
                    "match_id": "m1",
                    "winner": "Lions",
                    "wagers": 2,
                    "total_commission": "7.50"
                }
            })
        );
    }
}
