//! Race collection: drives page fetches until the provider runs dry.

use std::time::Duration;

use tracing::{debug, info};

use crate::error::ProviderError;
use crate::metrics;

use super::types::Race;
use super::PageFetch;

/// Assembles the full race set for one polling cycle.
///
/// Pages are requested from offset 0 in `page_size` steps with a politeness
/// delay in between; a short page signals end-of-data. Any terminal fetch
/// failure abandons the whole cycle; no partial race set is ever returned.
#[derive(Debug)]
pub struct RaceCollector<F> {
    fetcher: F,
    page_size: usize,
    page_delay: Duration,
}

impl<F: PageFetch> RaceCollector<F> {
    /// Create a collector over the given fetcher.
    pub fn new(fetcher: F, page_size: usize, page_delay: Duration) -> Self {
        Self {
            fetcher,
            page_size,
            page_delay,
        }
    }

    /// Fetch every page of today's races.
    pub async fn collect(&self) -> Result<Vec<Race>, ProviderError> {
        let mut races: Vec<Race> = Vec::new();
        let mut offset = 0usize;
        let mut pages = 0usize;

        loop {
            debug!(page = pages + 1, offset, "fetching races page");
            let batch = self.fetcher.fetch_page(offset).await?;
            let count = batch.len();
            races.extend(batch);
            pages += 1;
            metrics::inc_pages_fetched();

            if count < self.page_size {
                debug!(count, "short page, collection complete");
                break;
            }

            offset += self.page_size;
            tokio::time::sleep(self.page_delay).await;
        }

        metrics::add_races_fetched(races.len());
        info!(total = races.len(), pages, "race collection complete");
        Ok(races)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::mock::{MockProvider, RaceBuilder};

    fn page_of(count: usize, prefix: &str) -> Vec<Race> {
        (0..count)
            .map(|i| RaceBuilder::new(format!("{prefix}-{i}")).build())
            .collect()
    }

    #[tokio::test]
    async fn stops_after_short_page_and_keeps_every_race() {
        let provider = MockProvider::new();
        provider.push_page(page_of(3, "a"));
        provider.push_page(page_of(3, "b"));
        provider.push_page(page_of(3, "c"));
        provider.push_page(page_of(2, "d"));

        let collector = RaceCollector::new(provider.clone(), 3, Duration::from_millis(1));
        let races = collector.collect().await.unwrap();

        assert_eq!(races.len(), 11);
        assert_eq!(provider.offsets_requested(), vec![0, 3, 6, 9]);
    }

    #[tokio::test]
    async fn single_short_page_needs_one_request() {
        let provider = MockProvider::new();
        provider.push_page(page_of(1, "only"));

        let collector = RaceCollector::new(provider.clone(), 95, Duration::from_millis(1));
        let races = collector.collect().await.unwrap();

        assert_eq!(races.len(), 1);
        assert_eq!(provider.offsets_requested(), vec![0]);
    }

    #[tokio::test]
    async fn empty_first_page_terminates_immediately() {
        let provider = MockProvider::new();

        let collector = RaceCollector::new(provider.clone(), 95, Duration::from_millis(1));
        let races = collector.collect().await.unwrap();

        assert!(races.is_empty());
        assert_eq!(provider.offsets_requested(), vec![0]);
    }

    #[tokio::test]
    async fn terminal_failure_abandons_the_cycle() {
        let provider = MockProvider::new();
        provider.push_page(page_of(3, "a"));
        provider.push_error(ProviderError::Client { status: 400 });

        let collector = RaceCollector::new(provider.clone(), 3, Duration::from_millis(1));
        let result = collector.collect().await;

        assert!(matches!(result, Err(ProviderError::Client { status: 400 })));
    }
}
