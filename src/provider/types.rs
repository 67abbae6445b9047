//! Wire types for the provider's race documents.
//!
//! The provider returns nested GraphQL documents: races with meetings and
//! runners, runners with bookmaker and exchange markets. Everything outside
//! the race/runner identifiers is deserialized defensively: a single odd
//! field must never sink a whole page.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{Display, EnumString};

/// Lifecycle status of a race as reported by the provider.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, Default,
)]
pub enum RaceStatus {
    /// Open for betting.
    Open,
    /// Temporarily suspended; prices may still be quoted.
    Suspended,
    /// Betting closed.
    Closed,
    /// Interim results posted.
    Interim,
    /// Winnings being paid.
    Paying,
    /// Race abandoned.
    Abandoned,
    /// Any status this version does not know about.
    #[serde(other)]
    #[default]
    Unknown,
}

impl RaceStatus {
    /// Whether prices on this race are still worth scanning.
    pub fn is_active(&self) -> bool {
        matches!(self, RaceStatus::Open | RaceStatus::Suspended)
    }
}

/// A race document for one polling cycle.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Race {
    /// Provider race identifier.
    #[serde(default)]
    pub id: String,
    /// Meeting the race belongs to.
    #[serde(default)]
    pub meeting: Option<Meeting>,
    /// Race name.
    #[serde(default)]
    pub name: String,
    /// Race number within the meeting.
    #[serde(default)]
    pub number: u32,
    /// Current race status.
    #[serde(default)]
    pub status: RaceStatus,
    /// Scheduled start in RFC 3339, parsed lazily by the scanner.
    #[serde(default)]
    pub start_time: Option<String>,
    /// Runners in card order.
    #[serde(default)]
    pub runners: Vec<Runner>,
}

/// Meeting context for a race.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Meeting {
    /// Provider meeting identifier.
    #[serde(default)]
    pub id: String,
    /// State or region.
    #[serde(default)]
    pub location: String,
    /// Track name.
    #[serde(default)]
    pub track: String,
    /// Race type, e.g. "Greyhound" or "Harness".
    #[serde(rename = "type", default)]
    pub meeting_type: String,
    /// Meeting date as reported by the provider.
    #[serde(default)]
    pub date: String,
}

/// One runner on a race card.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Runner {
    /// Provider runner identifier.
    #[serde(default)]
    pub id: String,
    /// Runner name.
    #[serde(default)]
    pub name: String,
    /// Saddlecloth/box number.
    #[serde(default)]
    pub number: u32,
    /// Present when the runner has been withdrawn.
    #[serde(default)]
    pub scratched_time: Option<String>,
    /// Fixed-odds quotes per bookmaker.
    #[serde(default)]
    pub bookmaker_markets: Vec<BookmakerMarket>,
    /// Exchange markets with lay/back ladders.
    #[serde(default)]
    pub exchange_markets: Vec<ExchangeMarket>,
}

impl Runner {
    /// Whether the runner has been scratched from the race.
    pub fn is_scratched(&self) -> bool {
        self.scratched_time.is_some()
    }
}

/// A bookmaker's quotes for one runner.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookmakerMarket {
    /// Bookmaker name, matched against the configured allow-list.
    #[serde(default)]
    pub bookmaker: String,
    /// Fixed win quote, if offered.
    #[serde(default)]
    pub fixed_win: Option<FixedOdds>,
}

/// A fixed-odds quote.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixedOdds {
    /// Quoted price; number, string, or null depending on the feed.
    #[serde(default)]
    pub price: Option<Value>,
    /// When the quote last moved.
    #[serde(default)]
    pub last_updated: Option<String>,
}

/// One exchange market for a runner.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeMarket {
    /// Market name, used to pick win markets over place variants.
    #[serde(default)]
    pub market_name: String,
    /// Total volume matched on the market.
    #[serde(default)]
    pub total_matched: Option<f64>,
    /// Back ladder, best price first. Not consulted by the scanner.
    #[serde(default)]
    pub back: Vec<PriceSize>,
    /// Lay ladder, best price first.
    #[serde(default)]
    pub lay: Vec<PriceSize>,
}

/// A price level on an exchange ladder.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceSize {
    /// Price at this level; number, string, or null depending on the feed.
    #[serde(default)]
    pub price: Option<Value>,
    /// Size available at this level.
    #[serde(default)]
    pub size: Option<Value>,
}

/// Parse a price field that may arrive as a JSON number or string.
///
/// Returns `None` for null, empty, or unparsable values; the caller decides
/// whether that deserves a log line.
pub fn decimal_price(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => {
            let raw = n.to_string();
            raw.parse()
                .or_else(|_| Decimal::from_scientific(&raw))
                .ok()
        }
        Value::String(s) => {
            let raw = s.trim();
            if raw.is_empty() {
                return None;
            }
            raw.parse().or_else(|_| Decimal::from_scientific(raw)).ok()
        }
        _ => None,
    }
}
