//! Provider integration.
//!
//! This module handles:
//! - Wire/domain types for race documents
//! - The GraphQL client with error classification
//! - The explicit retry policy
//! - Paginated race collection
//! - Mock provider and fixtures for testing

use async_trait::async_trait;

use crate::error::ProviderError;

pub mod client;
pub mod collector;
pub mod mock;
pub mod retry;
pub mod types;

/// One paginated fetch against the provider.
///
/// [`RaceCollector`] drives this across offsets; the production
/// implementation is [`BetwatchClient`], tests substitute [`MockProvider`].
#[async_trait]
pub trait PageFetch: Send + Sync {
    /// Fetch the page of races starting at `offset`.
    async fn fetch_page(&self, offset: usize) -> Result<Vec<types::Race>, ProviderError>;
}

pub use client::BetwatchClient;
pub use collector::RaceCollector;
pub use mock::{MockProvider, RaceBuilder, RunnerBuilder};
pub use retry::RetryPolicy;
pub use types::{Race, RaceStatus, Runner};
