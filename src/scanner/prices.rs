//! Exchange lay price extraction.

use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::provider::types::{decimal_price, Runner};

/// Best qualifying exchange lay price for a runner.
///
/// Exchange markets are scanned in document order. A market qualifies as a
/// win market when its name contains "win" (case-insensitive) and does not
/// contain "place" (which also rules out "to be placed" variants). The first
/// lay level of the first qualifying market that parses to a positive price
/// wins; nothing else is inspected after that.
pub fn best_lay_price(runner: &Runner) -> Option<Decimal> {
    for market in &runner.exchange_markets {
        let name = market.market_name.to_ascii_lowercase();
        if !name.contains("win") || name.contains("place") {
            continue;
        }

        // Best lay is the first ladder entry.
        let Some(level) = market.lay.first() else {
            continue;
        };
        let Some(raw) = level.price.as_ref().filter(|v| !v.is_null()) else {
            continue;
        };

        match decimal_price(raw) {
            Some(price) if price > Decimal::ZERO => {
                debug!(
                    runner = %runner.id,
                    market = %market.market_name,
                    %price,
                    "best exchange lay price"
                );
                return Some(price);
            }
            Some(price) => {
                debug!(
                    runner = %runner.id,
                    market = %market.market_name,
                    %price,
                    "ignoring non-positive lay price"
                );
            }
            None => {
                warn!(
                    runner = %runner.id,
                    market = %market.market_name,
                    raw = %raw,
                    "unparsable lay price"
                );
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::mock::RunnerBuilder;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn finds_win_market_lay_price() {
        let runner = RunnerBuilder::new("r1").lay("R4 Win", dec!(2.40)).build();
        assert_eq!(best_lay_price(&runner), Some(dec!(2.40)));
    }

    #[test]
    fn ignores_place_markets() {
        let runner = RunnerBuilder::new("r1")
            .lay("R4 Place", dec!(1.20))
            .lay("R4 To Be Placed", dec!(1.30))
            .lay("R4 Win", dec!(2.40))
            .build();
        assert_eq!(best_lay_price(&runner), Some(dec!(2.40)));
    }

    #[test]
    fn first_qualifying_market_wins() {
        let runner = RunnerBuilder::new("r1")
            .lay("Race 4 Win", dec!(2.40))
            .lay("Win Special", dec!(9.99))
            .build();
        assert_eq!(best_lay_price(&runner), Some(dec!(2.40)));
    }

    #[test]
    fn market_name_match_is_case_insensitive() {
        let runner = RunnerBuilder::new("r1").lay("r4 WIN", dec!(3.00)).build();
        assert_eq!(best_lay_price(&runner), Some(dec!(3.00)));
    }

    #[test]
    fn unparsable_price_falls_through_to_next_market() {
        let runner = RunnerBuilder::new("r1")
            .raw_lay("R4 Win", json!("garbage"))
            .lay("Win Market 2", dec!(2.10))
            .build();
        assert_eq!(best_lay_price(&runner), Some(dec!(2.10)));
    }

    #[test]
    fn empty_ladder_and_no_markets_yield_none() {
        let empty = RunnerBuilder::new("r1").empty_market("R4 Win").build();
        assert_eq!(best_lay_price(&empty), None);

        let bare = RunnerBuilder::new("r2").build();
        assert_eq!(best_lay_price(&bare), None);
    }

    #[test]
    fn non_positive_price_yields_none() {
        let runner = RunnerBuilder::new("r1").lay("R4 Win", dec!(0)).build();
        assert_eq!(best_lay_price(&runner), None);
    }
}
