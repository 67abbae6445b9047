//! Opportunity scanning.
//!
//! This module handles:
//! - Exchange lay price extraction
//! - Race/runner filtering and price comparison
//! - Process-lifetime deduplication of alerts

pub mod dedup;
pub mod detector;
pub mod prices;

pub use dedup::{OpportunityKey, ReportedStore};
pub use detector::{Opportunity, OpportunityScanner};
pub use prices::best_lay_price;
