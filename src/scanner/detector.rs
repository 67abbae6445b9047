//! Opportunity detection over a cycle's race set.

use std::collections::HashSet;
use std::fmt;

use rust_decimal::Decimal;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::OffsetDateTime;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::Config;
use crate::metrics;
use crate::provider::types::{decimal_price, Race, Runner};
use crate::sink::Sink;

use super::dedup::{OpportunityKey, ReportedStore};
use super::prices::best_lay_price;

/// Base URL for per-race deep links on the provider's site.
const WATCH_BASE_URL: &str = "https://www.betwatch.com/app/racing";

/// Tolerance for races that look just-started due to clock skew or feed lag.
const STARTED_GRACE: time::Duration = time::Duration::minutes(1);

/// A detected opportunity, handed to the sink exactly once.
#[derive(Debug, Clone)]
pub struct Opportunity {
    /// Provider race identifier.
    pub race_id: String,
    /// Race name.
    pub race_name: String,
    /// Race number within the meeting.
    pub race_number: u32,
    /// Track name.
    pub track: String,
    /// State or region.
    pub location: String,
    /// Race type, e.g. "Greyhound".
    pub meeting_type: String,
    /// Scheduled start, UTC.
    pub start_time: OffsetDateTime,
    /// Provider runner identifier.
    pub runner_id: String,
    /// Runner name.
    pub runner_name: String,
    /// Saddlecloth/box number.
    pub runner_number: u32,
    /// Bookmaker offering the qualifying fixed price.
    pub bookmaker: String,
    /// Bookmaker fixed win price.
    pub fixed_price: Decimal,
    /// Best exchange lay price at detection.
    pub lay_price: Decimal,
    /// Time to jump at detection.
    pub time_to_jump: time::Duration,
    /// When the opportunity was detected.
    pub detected_at: OffsetDateTime,
}

impl Opportunity {
    /// Deduplication key for this opportunity.
    pub fn key(&self) -> OpportunityKey {
        OpportunityKey {
            race_id: self.race_id.clone(),
            runner_id: self.runner_id.clone(),
            bookmaker: self.bookmaker.clone(),
        }
    }

    /// Format time to jump as "Xm Ys".
    pub fn time_left_str(&self) -> String {
        let secs = self.time_to_jump.whole_seconds().max(0);
        format!("{}m {}s", secs / 60, secs % 60)
    }

    /// Deep link to the race on the provider's site.
    pub fn watch_url(&self) -> Option<Url> {
        let date = self
            .start_time
            .date()
            .format(&format_description!("[year]-[month]-[day]"))
            .ok()?;
        let type_code = match self.meeting_type.as_str() {
            "Greyhound" => "G",
            "Harness" => "H",
            _ => "R",
        };
        let race_number = self.race_number.to_string();

        let mut url = Url::parse(WATCH_BASE_URL).ok()?;
        url.path_segments_mut().ok()?.extend([
            date.as_str(),
            type_code,
            self.track.as_str(),
            race_number.as_str(),
        ]);
        Some(url)
    }
}

impl fmt::Display for Opportunity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} R{} {}. {}: {} @ {} vs exchange lay {} ({} to jump)",
            self.track,
            self.race_number,
            self.runner_number,
            self.runner_name,
            self.bookmaker,
            self.fixed_price,
            self.lay_price,
            self.time_left_str()
        )
    }
}

/// Scans a cycle's race set for new opportunities.
///
/// Filters races by status and betting window, runners by scratch state and
/// exchange coverage, bookmakers by allow-list, then compares prices: a fixed
/// win price at or above the best exchange lay price is an opportunity. The
/// dedup store gates emission so each key alerts once per process lifetime.
#[derive(Debug, Clone)]
pub struct OpportunityScanner {
    bookmakers: HashSet<String>,
    min_minutes: f64,
    max_minutes: f64,
}

impl OpportunityScanner {
    /// Build a scanner from configuration.
    pub fn new(config: &Config) -> Self {
        Self {
            bookmakers: config.target_bookmakers.iter().cloned().collect(),
            min_minutes: config.min_minutes_to_jump as f64,
            max_minutes: config.max_minutes_to_jump as f64,
        }
    }

    /// Scan one cycle's races, emitting new opportunities to the sink.
    ///
    /// Returns the number of newly reported opportunities. A problem with one
    /// race or runner never aborts its siblings.
    pub async fn scan(
        &self,
        races: &[Race],
        now: OffsetDateTime,
        store: &mut ReportedStore,
        sink: &dyn Sink,
    ) -> usize {
        let mut new_count = 0usize;
        let mut in_window = 0usize;

        for race in races {
            if !race.status.is_active() {
                continue;
            }

            let start = match race.start_time.as_deref() {
                Some(raw) => match OffsetDateTime::parse(raw, &Rfc3339) {
                    Ok(t) => t,
                    Err(e) => {
                        warn!(race = %race.id, raw, error = %e, "unparsable start time, skipping race");
                        continue;
                    }
                },
                None => {
                    warn!(race = %race.id, "race missing start time, skipping");
                    continue;
                }
            };

            // Already jumped, modulo the grace period.
            if start <= now - STARTED_GRACE {
                continue;
            }

            let minutes_to_jump = (start - now).as_seconds_f64() / 60.0;
            if minutes_to_jump < self.min_minutes || minutes_to_jump > self.max_minutes {
                continue;
            }
            in_window += 1;
            debug!(race = %race.id, minutes_to_jump, "race inside betting window");

            for runner in &race.runners {
                if runner.id.is_empty() || runner.is_scratched() {
                    continue;
                }

                // The exchange reference price is mandatory: without it no
                // comparison can be made for any bookmaker.
                let Some(lay_price) = best_lay_price(runner) else {
                    continue;
                };

                for market in &runner.bookmaker_markets {
                    if !self.bookmakers.contains(&market.bookmaker) {
                        continue;
                    }
                    let Some(quote) = market.fixed_win.as_ref() else {
                        continue;
                    };
                    let Some(raw) = quote.price.as_ref().filter(|v| !v.is_null()) else {
                        continue;
                    };
                    let fixed_price = match decimal_price(raw) {
                        Some(p) if p > Decimal::ZERO => p,
                        Some(_) => continue,
                        None => {
                            warn!(
                                race = %race.id,
                                runner = %runner.id,
                                bookmaker = %market.bookmaker,
                                raw = %raw,
                                "unparsable bookmaker price"
                            );
                            continue;
                        }
                    };

                    if fixed_price < lay_price {
                        continue;
                    }

                    let key = OpportunityKey {
                        race_id: race.id.clone(),
                        runner_id: runner.id.clone(),
                        bookmaker: market.bookmaker.clone(),
                    };
                    // Insert before emitting so a duplicate within the same
                    // cycle can never alert twice.
                    if !store.insert(key) {
                        continue;
                    }

                    let opportunity =
                        build_opportunity(race, runner, &market.bookmaker, fixed_price, lay_price, start, now);
                    info!(
                        race = %race.id,
                        runner = %runner.id,
                        bookmaker = %market.bookmaker,
                        fixed = %fixed_price,
                        lay = %lay_price,
                        "new opportunity"
                    );
                    metrics::inc_opportunities_detected();
                    new_count += 1;

                    if let Err(e) = sink.notify(&opportunity).await {
                        warn!(
                            error = %e,
                            race = %race.id,
                            runner = %runner.id,
                            "sink delivery failed; key stays reported"
                        );
                        metrics::inc_notify_failures();
                    }
                }
            }
        }

        debug!(in_window, new_count, "scan pass complete");
        new_count
    }
}

fn build_opportunity(
    race: &Race,
    runner: &Runner,
    bookmaker: &str,
    fixed_price: Decimal,
    lay_price: Decimal,
    start: OffsetDateTime,
    now: OffsetDateTime,
) -> Opportunity {
    let meeting = race.meeting.clone().unwrap_or_default();
    Opportunity {
        race_id: race.id.clone(),
        race_name: race.name.clone(),
        race_number: race.number,
        track: meeting.track,
        location: meeting.location,
        meeting_type: meeting.meeting_type,
        start_time: start,
        runner_id: runner.id.clone(),
        runner_name: runner.name.clone(),
        runner_number: runner.number,
        bookmaker: bookmaker.to_string(),
        fixed_price,
        lay_price,
        time_to_jump: start - now,
        detected_at: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;
    use crate::provider::mock::{RaceBuilder, RunnerBuilder};
    use crate::provider::types::RaceStatus;
    use crate::sink::RecordingSink;
    use rust_decimal_macros::dec;
    use time::Duration;

    fn scanner() -> OpportunityScanner {
        OpportunityScanner::new(&test_config())
    }

    fn qualifying_race(id: &str, now: OffsetDateTime) -> Race {
        RaceBuilder::new(id)
            .starts_at(now + Duration::minutes(10))
            .runner(
                RunnerBuilder::new("runner-1")
                    .fixed_win("Sportsbet", dec!(2.50))
                    .lay("R1 Win", dec!(2.40))
                    .build(),
            )
            .build()
    }

    #[tokio::test]
    async fn emits_opportunity_with_exact_prices() {
        let now = OffsetDateTime::now_utc();
        let races = vec![qualifying_race("race-1", now)];
        let mut store = ReportedStore::new();
        let sink = RecordingSink::new();

        let count = scanner().scan(&races, now, &mut store, &sink).await;

        assert_eq!(count, 1);
        let delivered = sink.delivered();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].fixed_price, dec!(2.50));
        assert_eq!(delivered[0].lay_price, dec!(2.40));
        assert_eq!(delivered[0].bookmaker, "Sportsbet");
    }

    #[tokio::test]
    async fn equal_prices_are_an_opportunity_but_one_cent_below_is_not() {
        let now = OffsetDateTime::now_utc();
        let race = |id: &str, fixed: Decimal| {
            RaceBuilder::new(id)
                .starts_at(now + Duration::minutes(10))
                .runner(
                    RunnerBuilder::new(format!("{id}-runner"))
                        .fixed_win("Sportsbet", fixed)
                        .lay("Win", dec!(2.40))
                        .build(),
                )
                .build()
        };
        let mut store = ReportedStore::new();
        let sink = RecordingSink::new();

        let equal = scanner()
            .scan(&[race("race-eq", dec!(2.40))], now, &mut store, &sink)
            .await;
        let below = scanner()
            .scan(&[race("race-lt", dec!(2.39))], now, &mut store, &sink)
            .await;

        assert_eq!(equal, 1);
        assert_eq!(below, 0);
    }

    #[tokio::test]
    async fn window_bounds_are_inclusive() {
        let now = OffsetDateTime::now_utc();
        let at = |minutes: i64, id: &str| {
            RaceBuilder::new(id)
                .starts_at(now + Duration::minutes(minutes))
                .runner(
                    RunnerBuilder::new(format!("{id}-runner"))
                        .fixed_win("Sportsbet", dec!(3.00))
                        .lay("Win", dec!(2.40))
                        .build(),
                )
                .build()
        };
        let mut store = ReportedStore::new();
        let sink = RecordingSink::new();
        let scanner = scanner();

        assert_eq!(scanner.scan(&[at(2, "min")], now, &mut store, &sink).await, 1);
        assert_eq!(scanner.scan(&[at(15, "max")], now, &mut store, &sink).await, 1);
        assert_eq!(scanner.scan(&[at(1, "below")], now, &mut store, &sink).await, 0);
        assert_eq!(scanner.scan(&[at(16, "above")], now, &mut store, &sink).await, 0);
    }

    #[tokio::test]
    async fn inactive_status_and_started_races_are_skipped() {
        let now = OffsetDateTime::now_utc();
        let closed = RaceBuilder::new("race-closed")
            .status(RaceStatus::Closed)
            .starts_at(now + Duration::minutes(10))
            .runner(
                RunnerBuilder::new("r1")
                    .fixed_win("Sportsbet", dec!(3.00))
                    .lay("Win", dec!(2.40))
                    .build(),
            )
            .build();
        let started = RaceBuilder::new("race-started")
            .starts_at(now - Duration::minutes(5))
            .runner(
                RunnerBuilder::new("r2")
                    .fixed_win("Sportsbet", dec!(3.00))
                    .lay("Win", dec!(2.40))
                    .build(),
            )
            .build();
        let mut store = ReportedStore::new();
        let sink = RecordingSink::new();

        let count = scanner().scan(&[closed, started], now, &mut store, &sink).await;

        assert_eq!(count, 0);
        assert!(sink.delivered().is_empty());
    }

    #[tokio::test]
    async fn unparsable_start_time_skips_race_not_cycle() {
        let now = OffsetDateTime::now_utc();
        let bad = RaceBuilder::new("race-bad")
            .raw_start_time("yesterday-ish")
            .runner(
                RunnerBuilder::new("r1")
                    .fixed_win("Sportsbet", dec!(3.00))
                    .lay("Win", dec!(2.40))
                    .build(),
            )
            .build();
        let good = qualifying_race("race-good", now);
        let mut store = ReportedStore::new();
        let sink = RecordingSink::new();

        let count = scanner().scan(&[bad, good], now, &mut store, &sink).await;

        assert_eq!(count, 1);
        assert_eq!(sink.delivered()[0].race_id, "race-good");
    }

    #[tokio::test]
    async fn scratched_runner_never_alerts() {
        let now = OffsetDateTime::now_utc();
        let race = RaceBuilder::new("race-1")
            .starts_at(now + Duration::minutes(10))
            .runner(
                RunnerBuilder::new("runner-1")
                    .scratched()
                    .fixed_win("Sportsbet", dec!(10.00))
                    .lay("Win", dec!(2.40))
                    .build(),
            )
            .build();
        let mut store = ReportedStore::new();
        let sink = RecordingSink::new();

        assert_eq!(scanner().scan(&[race], now, &mut store, &sink).await, 0);
    }

    #[tokio::test]
    async fn runner_without_exchange_price_is_skipped() {
        let now = OffsetDateTime::now_utc();
        let race = RaceBuilder::new("race-1")
            .starts_at(now + Duration::minutes(10))
            .runner(
                RunnerBuilder::new("runner-1")
                    .fixed_win("Sportsbet", dec!(10.00))
                    .build(),
            )
            .build();
        let mut store = ReportedStore::new();
        let sink = RecordingSink::new();

        assert_eq!(scanner().scan(&[race], now, &mut store, &sink).await, 0);
    }

    #[tokio::test]
    async fn non_target_bookmaker_is_ignored() {
        let now = OffsetDateTime::now_utc();
        let race = RaceBuilder::new("race-1")
            .starts_at(now + Duration::minutes(10))
            .runner(
                RunnerBuilder::new("runner-1")
                    .fixed_win("SomeObscureBookie", dec!(5.00))
                    .lay("Win", dec!(2.40))
                    .build(),
            )
            .build();
        let mut store = ReportedStore::new();
        let sink = RecordingSink::new();

        assert_eq!(scanner().scan(&[race], now, &mut store, &sink).await, 0);
    }

    #[tokio::test]
    async fn repeated_cycles_alert_once_per_key() {
        let now = OffsetDateTime::now_utc();
        let mut store = ReportedStore::new();
        let sink = RecordingSink::new();
        let scanner = scanner();

        let first = scanner
            .scan(&[qualifying_race("race-1", now)], now, &mut store, &sink)
            .await;
        let second = scanner
            .scan(&[qualifying_race("race-1", now)], now, &mut store, &sink)
            .await;
        let third = scanner
            .scan(&[qualifying_race("race-1", now)], now, &mut store, &sink)
            .await;

        assert_eq!((first, second, third), (1, 0, 0));
        assert_eq!(sink.delivered().len(), 1);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn sink_failure_keeps_key_reported() {
        let now = OffsetDateTime::now_utc();
        let mut store = ReportedStore::new();
        let sink = RecordingSink::failing();
        let scanner = scanner();

        let first = scanner
            .scan(&[qualifying_race("race-1", now)], now, &mut store, &sink)
            .await;
        let second = scanner
            .scan(&[qualifying_race("race-1", now)], now, &mut store, &sink)
            .await;

        // Delivery failed both times it was attempted, but the key was
        // marked on first detection: at-most-once alerting.
        assert_eq!((first, second), (1, 0));
        assert_eq!(sink.delivered().len(), 1);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn watch_url_encodes_track_and_type() {
        let now = OffsetDateTime::now_utc();
        let race = RaceBuilder::new("race-1")
            .number(4)
            .track("Albion Park")
            .starts_at(now + Duration::minutes(10))
            .build();
        let runner = RunnerBuilder::new("runner-1").build();
        let opportunity = build_opportunity(
            &race,
            &runner,
            "Sportsbet",
            dec!(2.50),
            dec!(2.40),
            now + Duration::minutes(10),
            now,
        );

        let url = opportunity.watch_url().unwrap();
        assert!(url.as_str().starts_with("https://www.betwatch.com/app/racing/"));
        assert!(url.path().contains("/G/"));
        assert!(url.path().contains("Albion%20Park"));
        assert!(url.path().ends_with("/4"));
    }

    #[test]
    fn time_left_formats_minutes_and_seconds() {
        let now = OffsetDateTime::now_utc();
        let race = RaceBuilder::new("race-1").build();
        let runner = RunnerBuilder::new("runner-1").build();
        let opportunity = build_opportunity(
            &race,
            &runner,
            "Tab",
            dec!(3.00),
            dec!(2.50),
            now + Duration::seconds(150),
            now,
        );

        assert_eq!(opportunity.time_left_str(), "2m 30s");
    }
}
