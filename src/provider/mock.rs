//! Mock provider and race fixtures for unit testing.
//!
//! The mock serves a scripted sequence of pages (or failures) without
//! touching the network, and records the offsets it was asked for so tests
//! can assert on pagination behavior.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::error::ProviderError;

use super::types::{
    BookmakerMarket, ExchangeMarket, FixedOdds, Meeting, PriceSize, Race, RaceStatus, Runner,
};
use super::PageFetch;

/// Mock provider serving scripted pages.
#[derive(Debug, Clone, Default)]
pub struct MockProvider {
    pages: Arc<Mutex<VecDeque<Result<Vec<Race>, ProviderError>>>>,
    offsets: Arc<Mutex<Vec<usize>>>,
}

impl MockProvider {
    /// Create an empty mock; unscripted fetches return an empty page.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful page.
    pub fn push_page(&self, races: Vec<Race>) {
        self.pages.lock().unwrap().push_back(Ok(races));
    }

    /// Queue a failing fetch.
    pub fn push_error(&self, error: ProviderError) {
        self.pages.lock().unwrap().push_back(Err(error));
    }

    /// Offsets requested so far, in order.
    pub fn offsets_requested(&self) -> Vec<usize> {
        self.offsets.lock().unwrap().clone()
    }
}

#[async_trait]
impl PageFetch for MockProvider {
    async fn fetch_page(&self, offset: usize) -> Result<Vec<Race>, ProviderError> {
        self.offsets.lock().unwrap().push(offset);
        self.pages
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}

/// Builder for race fixtures.
#[derive(Debug, Clone)]
pub struct RaceBuilder {
    race: Race,
}

impl RaceBuilder {
    /// Start a race with sensible defaults: open, race 1 at Mock Park.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            race: Race {
                id: id.into(),
                meeting: Some(Meeting {
                    id: "meeting-1".to_string(),
                    location: "VIC".to_string(),
                    track: "Mock Park".to_string(),
                    meeting_type: "Greyhound".to_string(),
                    date: "2026-08-06".to_string(),
                }),
                name: "Mock Stakes".to_string(),
                number: 1,
                status: RaceStatus::Open,
                start_time: None,
                runners: Vec::new(),
            },
        }
    }

    /// Set the race status.
    pub fn status(mut self, status: RaceStatus) -> Self {
        self.race.status = status;
        self
    }

    /// Set the scheduled start.
    pub fn starts_at(mut self, at: OffsetDateTime) -> Self {
        self.race.start_time = Some(at.format(&Rfc3339).expect("rfc3339 formats"));
        self
    }

    /// Set a raw start-time string (for unparsable-timestamp tests).
    pub fn raw_start_time(mut self, raw: impl Into<String>) -> Self {
        self.race.start_time = Some(raw.into());
        self
    }

    /// Set the race number.
    pub fn number(mut self, number: u32) -> Self {
        self.race.number = number;
        self
    }

    /// Set the track name.
    pub fn track(mut self, track: impl Into<String>) -> Self {
        if let Some(meeting) = self.race.meeting.as_mut() {
            meeting.track = track.into();
        }
        self
    }

    /// Add a runner.
    pub fn runner(mut self, runner: Runner) -> Self {
        self.race.runners.push(runner);
        self
    }

    /// Finish the race fixture.
    pub fn build(self) -> Race {
        self.race
    }
}

/// Builder for runner fixtures.
#[derive(Debug, Clone)]
pub struct RunnerBuilder {
    runner: Runner,
}

impl RunnerBuilder {
    /// Start a runner; the name defaults to the id.
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            runner: Runner {
                name: id.clone(),
                id,
                number: 1,
                scratched_time: None,
                bookmaker_markets: Vec::new(),
                exchange_markets: Vec::new(),
            },
        }
    }

    /// Set the runner name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.runner.name = name.into();
        self
    }

    /// Set the saddlecloth number.
    pub fn number(mut self, number: u32) -> Self {
        self.runner.number = number;
        self
    }

    /// Mark the runner as scratched.
    pub fn scratched(mut self) -> Self {
        self.runner.scratched_time = Some("2026-08-06T00:00:00Z".to_string());
        self
    }

    /// Add a bookmaker fixed win quote.
    pub fn fixed_win(self, bookmaker: impl Into<String>, price: Decimal) -> Self {
        self.raw_fixed_win(bookmaker, json!(price.to_string()))
    }

    /// Add a bookmaker quote with a raw JSON price (for junk-price tests).
    pub fn raw_fixed_win(mut self, bookmaker: impl Into<String>, price: Value) -> Self {
        self.runner.bookmaker_markets.push(BookmakerMarket {
            bookmaker: bookmaker.into(),
            fixed_win: Some(FixedOdds {
                price: Some(price),
                last_updated: None,
            }),
        });
        self
    }

    /// Add an exchange market with a single lay level.
    pub fn lay(self, market_name: impl Into<String>, price: Decimal) -> Self {
        self.raw_lay(market_name, json!(price.to_string()))
    }

    /// Add an exchange market with a raw JSON lay price.
    pub fn raw_lay(mut self, market_name: impl Into<String>, price: Value) -> Self {
        self.runner.exchange_markets.push(ExchangeMarket {
            market_name: market_name.into(),
            total_matched: Some(1_000.0),
            back: Vec::new(),
            lay: vec![PriceSize {
                price: Some(price),
                size: Some(json!(100)),
            }],
        });
        self
    }

    /// Add an exchange market with no lay levels at all.
    pub fn empty_market(mut self, market_name: impl Into<String>) -> Self {
        self.runner.exchange_markets.push(ExchangeMarket {
            market_name: market_name.into(),
            total_matched: None,
            back: Vec::new(),
            lay: Vec::new(),
        });
        self
    }

    /// Finish the runner fixture.
    pub fn build(self) -> Runner {
        self.runner
    }
}
