use std::collections::HashSet;
use std::ops::{Range, RangeInclusive};
use rand::Rng;

use crate::config::{Config, DEFAULT_INTERVAL_MAX, DEFAULT_INTERVAL_MIN, DEFAULT_PRICE_MAX, DEFAULT_PRICE_MIN};
use crate::data::model::{FullSnapshot, InstrumentSnapshot};

/// Turns a list of symbols into a priced snapshot. Swap this out for real pricing.
pub trait PriceGenerator: Send + Sync {
    fn generate(&self, symbols: &[String]) -> FullSnapshot;
}

/// Samples prices and refresh hints uniformly inside fixed bounds.
#[derive(Debug, Clone)]
pub struct RandomPriceGenerator {
    price_range: Range<f64>,
    interval_range: RangeInclusive<u32>,
}

impl RandomPriceGenerator {
    pub fn new(price_range: Range<f64>, interval_range: RangeInclusive<u32>) -> Self {
        Self {
            price_range,
            interval_range,
        }
    }
}

impl Default for RandomPriceGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_PRICE_MIN..DEFAULT_PRICE_MAX, DEFAULT_INTERVAL_MIN..=DEFAULT_INTERVAL_MAX)
    }
}

impl From<&Config> for RandomPriceGenerator {
    fn from(config: &Config) -> Self {
        Self::new(config.price_range(), config.interval_range())
    }
}

impl PriceGenerator for RandomPriceGenerator {
    fn generate(&self, symbols: &[String]) -> FullSnapshot {
        let mut rng = rand::thread_rng();

        let instruments = symbols
            .iter()
            .map(|symbol| InstrumentSnapshot {
                symbol: symbol.clone(),
                open_price: rng.gen_range(self.price_range.clone()),
                current_price: rng.gen_range(self.price_range.clone()),
                refresh_interval_hint: rng.gen_range(self.interval_range.clone()),
            })
            .collect();

        FullSnapshot::new(instruments)
    }
}

/// Drops blank and repeated tickers, keeping first occurrences in order.
pub fn unique_symbols<'a, I>(symbols: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen = HashSet::new();
    symbols
        .into_iter()
        .map(str::trim)
        .filter(|symbol| !symbol.is_empty() && seen.insert(*symbol))
        .map(str::to_string)
        .collect()
}
