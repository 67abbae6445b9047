//! Opportunity sinks.
//!
//! The scanner hands each newly detected opportunity to a [`Sink`] exactly
//! once. What the sink does with it (log it, message someone, place a bet
//! through a downstream service) is its own business; delivery failure is
//! reported back but never un-marks the opportunity as alerted.

use std::sync::Mutex;

use async_trait::async_trait;
use tracing::info;

use crate::error::SinkError;
use crate::scanner::Opportunity;

/// Receiver for newly detected opportunities.
#[async_trait]
pub trait Sink: Send + Sync {
    /// Deliver one opportunity. Called at most once per opportunity key.
    async fn notify(&self, opportunity: &Opportunity) -> Result<(), SinkError>;
}

/// Sink that announces opportunities on the log and stdout.
#[derive(Debug, Default)]
pub struct LogSink;

impl LogSink {
    /// Create a new log sink.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Sink for LogSink {
    async fn notify(&self, opportunity: &Opportunity) -> Result<(), SinkError> {
        info!(
            race = %opportunity.race_id,
            runner = %opportunity.runner_id,
            bookmaker = %opportunity.bookmaker,
            fixed = %opportunity.fixed_price,
            lay = %opportunity.lay_price,
            time_left = %opportunity.time_left_str(),
            "opportunity delivered"
        );

        println!("\n>>> {opportunity}");
        if let Some(url) = opportunity.watch_url() {
            println!("    {url}");
        }

        Ok(())
    }
}

/// Recording sink for tests; optionally fails every delivery.
#[derive(Debug, Default)]
pub struct RecordingSink {
    delivered: Mutex<Vec<Opportunity>>,
    fail_delivery: bool,
}

impl RecordingSink {
    /// Create a sink that records and succeeds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a sink that records but fails every delivery.
    pub fn failing() -> Self {
        Self {
            delivered: Mutex::new(Vec::new()),
            fail_delivery: true,
        }
    }

    /// Opportunities delivered so far, in order.
    pub fn delivered(&self) -> Vec<Opportunity> {
        self.delivered.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sink for RecordingSink {
    async fn notify(&self, opportunity: &Opportunity) -> Result<(), SinkError> {
        self.delivered.lock().unwrap().push(opportunity.clone());
        if self.fail_delivery {
            return Err(SinkError::Delivery(
                "recording sink set to fail".to_string(),
            ));
        }
        Ok(())
    }
}
