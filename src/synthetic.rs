use std::f64::consts::PI;
use std::future::Future;
use std::sync::Mutex;
use std::collections::VecDeque;

use chrono::Days;
use chrono::naive::NaiveDate;
use rand::{Rng,SeedableRng};
use rand::rngs::StdRng;
use serde_json::Value;

use super::aggregate::{daily_totals,DailyTotal};
use super::error::Result;
use super::indicators::{Indicators,BASE_INFECTIONS,MAX_STEP};
use super::records::EventRecord;
use super::sources::Sources;
use super::zones::ZoneRegistry;


/// Sliding window over one zone's most recent daily records.
#[derive(Clone,Debug,PartialEq)]
pub struct LiveSeries {
    window: usize,
    points: VecDeque<EventRecord>,
}

impl LiveSeries {

    pub fn seeded<I: IntoIterator<Item = EventRecord>>(window: usize, records: I) -> Self {
	let mut records: Vec<_> = records.into_iter().collect();
	records.sort_by_key(|r| r.date);
	let mut series = LiveSeries { window, points: records.into() };
	series.prune();
	series
    }

    fn prune(&mut self) {
	while self.points.len() > self.window {
	    self.points.pop_front();
	}
    }

    /// Appends the next day as a random step from the last value, floored at
    /// zero. An empty series has nothing to step from.
    pub fn advance<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Option<&EventRecord> {
	let last = self.points.back()?;
	let next = EventRecord {
	    date: last.date.checked_add_days(Days::new(1))?,
	    zone: last.zone.clone(),
	    new_cases: (last.new_cases + rng.random_range(-MAX_STEP..MAX_STEP)).max(0),
	    gender: None,
	    age: None,
	};
	self.points.push_back(next);
	self.prune();
	self.points.back()
    }

    pub fn len(&self) -> usize {
	self.points.len()
    }

    pub fn is_empty(&self) -> bool {
	self.points.is_empty()
    }

    pub fn records(&self) -> impl Iterator<Item = &EventRecord> {
	self.points.iter()
    }

    pub fn daily_totals(&self) -> Vec<DailyTotal> {
	daily_totals(&self.points.iter().cloned().collect::<Vec<_>>())
    }

}


/// Simulated case feed: a rise-and-fall curve per registered zone that then
/// moves one random step per refresh. It also simulates the indicator series.
pub struct SyntheticSources {
    window: usize,
    state: Mutex<State>,
}

struct State {
    series: Vec<LiveSeries>,
    indicators: Indicators,
    rng: StdRng,
}

impl SyntheticSources {

    pub fn new(registry: &ZoneRegistry, start: NaiveDate, window: usize, seed: u64) -> Self {
	let mut rng = StdRng::seed_from_u64(seed);
	let last_day = window.saturating_sub(1).max(1) as f64;
	let series = registry.zones().iter().map(|zone| {
	    let history: Vec<_> = (0..window).filter_map(|day| {
		let factor = (day as f64 / last_day * PI).sin() * 0.5 + 0.5;
		let cases = BASE_INFECTIONS + (rng.random::<f64>() - 0.5) * 50.0 + factor * 100.0;
		Some(EventRecord {
		    date: start.checked_add_days(Days::new(day as u64))?,
		    zone: zone.id.clone(),
		    new_cases: cases.floor().max(0.0) as i64,
		    gender: None,
		    age: None,
		})
	    }).collect();
	    LiveSeries::seeded(window, history)
	}).collect();
	let indicators = Indicators::generate(start, window, &mut rng);
	SyntheticSources { window, state: Mutex::new(State { series, indicators, rng }) }
    }

    /// Renders feed A, first advancing each zone by one day when `advance` is
    /// set. `cases()` advances on every call, `snapshot()` never does.
    fn tick(&self, advance: bool) -> Result<String> {
	let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
	let State { series, rng, .. } = &mut *state;
	if advance {
	    for s in series.iter_mut() {
		s.advance(rng);
	    }
	}
	let mut out = csv::Writer::from_writer(vec![]);
	out.write_record(&["id", "date", "zone", "new_cases"])?;
	for (id,record) in series.iter().flat_map(|s| s.records()).enumerate() {
	    out.write_record(&[(id + 1).to_string(), record.date.format("%Y-%m-%d").to_string(),
			       record.zone.clone(), record.new_cases.to_string()])?;
	}
	let bytes = out.into_inner().map_err(|err| csv::Error::from(err.into_error()))?;
	Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    pub fn snapshot(&self) -> Result<String> {
	self.tick(false)
    }

    /// Current indicator series. With `advance` set, new cases move one day
    /// forward first.
    pub fn current_indicators(&self, advance: bool) -> Indicators {
	let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
	let State { indicators, rng, .. } = &mut *state;
	if advance {
	    indicators.advance(self.window, rng);
	}
	indicators.clone()
    }

}

impl Sources for SyntheticSources {

    fn cases(&self) -> impl Future<Output = Result<String>> + Send {
	let text = self.tick(true);
	async move { text }
    }

    fn persons(&self) -> impl Future<Output = Result<String>> + Send {
	async { Ok(String::new()) }
    }

    fn predictions(&self) -> impl Future<Output = Result<Value>> + Send {
	async { Ok(Value::Null) }
    }

    fn indicators(&self) -> impl Future<Output = Result<Indicators>> + Send {
	let data = self.current_indicators(true);
	async move { Ok(data) }
    }

}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{parse_cases,parse_date,ParsePolicy};
    use crate::zones::ZONES;
    use proptest::prelude::*;

    fn record(date: &str, new_cases: i64) -> EventRecord {
	EventRecord { date: parse_date(date).unwrap(), zone: "zone_1".to_string(),
		      new_cases, gender: None, age: None }
    }

    #[test]
    fn test_seeded_keeps_most_recent() {
	let records = (1..=20).map(|d| record(&format!("2024-01-{:02}", d), d));
	let series = LiveSeries::seeded(14, records);
	assert_eq!(series.len(), 14);
	assert_eq!(series.records().next().unwrap().new_cases, 7);
	assert_eq!(series.daily_totals().last().unwrap().total, 20);
    }

    #[test]
    fn test_advance_appends_next_day_and_slides() {
	let mut rng = StdRng::seed_from_u64(7);
	let mut series = LiveSeries::seeded(3, vec![record("2024-01-01", 5), record("2024-01-02", 8)]);
	let next = series.advance(&mut rng).unwrap().clone();
	assert_eq!(next.date, parse_date("2024-01-03").unwrap());
	assert_eq!(next.zone, "zone_1");
	series.advance(&mut rng);
	assert_eq!(series.len(), 3);
	assert_eq!(series.records().next().unwrap().date, parse_date("2024-01-02").unwrap());
    }

    #[test]
    fn test_advance_empty_series() {
	let mut rng = StdRng::seed_from_u64(1);
	assert!(LiveSeries::seeded(14, vec![]).advance(&mut rng).is_none());
    }

    #[test]
    fn test_synthetic_feed_parses() {
	let start = parse_date("2024-01-01").unwrap();
	let sources = SyntheticSources::new(&ZONES, start, 14, 42);
	let text = sources.snapshot().unwrap();
	let records: Vec<_> = parse_cases(&text, ParsePolicy::Strict).collect();
	assert_eq!(records.len(), 14 * ZONES.zones().len());
	assert!(records.iter().all(|r| r.new_cases >= 0));
	let again = SyntheticSources::new(&ZONES, start, 14, 42).snapshot().unwrap();
	assert_eq!(text, again);
    }

    #[tokio::test]
    async fn test_synthetic_feed_advances_per_refresh() {
	let start = parse_date("2024-01-01").unwrap();
	let sources = SyntheticSources::new(&ZONES, start, 14, 42);
	let text = sources.cases().await.unwrap();
	let records: Vec<_> = parse_cases(&text, ParsePolicy::Strict).collect();
	assert_eq!(records.len(), 14 * ZONES.zones().len());
	assert_eq!(records.iter().map(|r| r.date).min(), Some(parse_date("2024-01-02").unwrap()));
	assert_eq!(records.iter().map(|r| r.date).max(), Some(parse_date("2024-01-15").unwrap()));
	let snapshot: Vec<_> = parse_cases(&sources.snapshot().unwrap(), ParsePolicy::Strict).collect();
	assert_eq!(snapshot, records);
    }

    #[tokio::test]
    async fn test_synthetic_indicators_advance_per_refresh() {
	let start = parse_date("2024-01-01").unwrap();
	let sources = SyntheticSources::new(&ZONES, start, 14, 42);
	let initial = sources.current_indicators(false);
	assert_eq!(initial.clinical.hospitalizations.len(), 14);
	let data = sources.indicators().await.unwrap();
	let new_cases = &data.epidemiological.new_cases;
	assert_eq!(new_cases.len(), 14);
	assert_eq!(new_cases.last().unwrap().0, parse_date("2024-01-15").unwrap());
	assert_eq!(data.clinical, initial.clinical);
	assert_eq!(sources.current_indicators(false), data);
    }

    proptest! {
	#[test]
	fn test_walk_is_bounded(seed in any::<u64>(), start in 0i64..30, steps in 1usize..40) {
	    let mut rng = StdRng::seed_from_u64(seed);
	    let mut series = LiveSeries::seeded(14, vec![record("2024-01-01", start)]);
	    let mut previous = start;
	    for _ in 0..steps {
		let value = series.advance(&mut rng).unwrap().new_cases;
		prop_assert!(value >= 0);
		prop_assert!(value >= previous - MAX_STEP && value < previous + MAX_STEP);
		previous = value;
	    }
	    prop_assert_eq!(series.len(), (steps + 1).min(14));
	}
    }

}
