use std::f64::consts::PI;

use chrono::{Datelike,Days,Weekday};
use chrono::naive::NaiveDate;
use rand::Rng;
use serde::{Serialize,Deserialize};

use super::aggregate::percent_change;


pub type Series = Vec<(NaiveDate,f64)>;

pub const BASE_INFECTIONS: f64 = 150.0;
pub const MAX_STEP: i64 = 10;
const INITIAL_ACTIVE: f64 = 800.0;


#[derive(Serialize,Deserialize,Clone,Debug,PartialEq,Default)]
#[serde(rename_all = "camelCase")]
pub struct Epidemiological {
    pub new_cases: Series,
    pub active_cases: Series,
    pub recoveries: Series,
    pub deaths: Series,
    pub reproduction_rate: Series,
    pub positivity_rate: Series,
}

#[derive(Serialize,Deserialize,Clone,Debug,PartialEq,Default)]
#[serde(rename_all = "camelCase")]
pub struct Clinical {
    pub hospitalizations: Series,
    pub icu_occupancy: Series,
    pub ventilator_usage: Series,
}

/// Percent of the pre-outbreak baseline.
#[derive(Serialize,Deserialize,Clone,Debug,PartialEq,Default)]
#[serde(rename_all = "camelCase")]
pub struct Mobility {
    pub public_transport: Series,
    pub retail: Series,
    pub workplace: Series,
    pub residential: Series,
    pub recreation: Series,
}

#[derive(Serialize,Deserialize,Clone,Debug,PartialEq,Default)]
#[serde(rename_all = "camelCase")]
pub struct Environmental {
    pub temperature: Series,
    pub humidity: Series,
    pub air_quality: Series,
    pub uv_index: Series,
}

#[derive(Serialize,Deserialize,Clone,Debug,PartialEq,Default)]
#[serde(rename_all = "camelCase")]
pub struct SocialMedia {
    pub sentiment: Series,
    pub mentions: Series,
}

/// Daily indicator series beyond the case feeds. Only the simulated source
/// produces them; real feeds leave them empty.
#[derive(Serialize,Deserialize,Clone,Debug,PartialEq,Default)]
#[serde(rename_all = "camelCase")]
pub struct Indicators {
    pub epidemiological: Epidemiological,
    pub clinical: Clinical,
    pub mobility: Mobility,
    pub environmental: Environmental,
    pub social_media: SocialMedia,
}

#[derive(Serialize,Deserialize,Clone,Copy,Debug,PartialEq,Eq)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Increase,
    Decrease,
    Stable,
}

#[derive(Serialize,Clone,Debug,PartialEq,Eq)]
pub struct StatCard {
    pub key: &'static str,
    pub title: &'static str,
    pub value: String,
    pub change: String,
    pub trend: Trend,
}


fn jitter<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    rng.random::<f64>() - 0.5
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}


impl Indicators {

    /// `days` consecutive days from `start` following a single rise-and-fall
    /// wave that peaks mid-window.
    pub fn generate<R: Rng + ?Sized>(start: NaiveDate, days: usize, rng: &mut R) -> Self {

	let mut data = Indicators::default();
	let last_day = days.saturating_sub(1).max(1) as f64;
	let mut active = INITIAL_ACTIVE;

	for day in 0..days {

	    let date = match start.checked_add_days(Days::new(day as u64)) {
		Some(date) => date,
		None => break,
	    };
	    let wave = (day as f64 / last_day * PI).sin() * 0.5 + 0.5;

	    let epi = &mut data.epidemiological;
	    let new_cases = (BASE_INFECTIONS + jitter(rng) * 50.0 + wave * 100.0).floor();
	    let recoveries = (new_cases * 0.85 + jitter(rng) * 20.0).floor();
	    let deaths = (new_cases * 0.02 + rng.random::<f64>() * 3.0).floor();
	    active = (active + new_cases - recoveries - deaths).max(0.0);
	    epi.new_cases.push((date, new_cases));
	    epi.active_cases.push((date, active));
	    epi.recoveries.push((date, recoveries));
	    epi.deaths.push((date, deaths));
	    epi.reproduction_rate.push((date, round_to(1.2 + wave * 0.8 + jitter(rng) * 0.3, 2)));
	    epi.positivity_rate.push((date, round_to(8.0 + wave * 12.0 + jitter(rng) * 4.0, 1)));

	    let clinical = &mut data.clinical;
	    clinical.hospitalizations.push((date, (50.0 + wave * 80.0 + jitter(rng) * 20.0).floor()));
	    clinical.icu_occupancy.push((date, (15.0 + wave * 25.0 + jitter(rng) * 8.0).floor()));
	    clinical.ventilator_usage.push((date, (8.0 + wave * 15.0 + jitter(rng) * 5.0).floor()));

	    let weekend = matches!(date.weekday(), Weekday::Sat | Weekday::Sun);
	    let mobility = &mut data.mobility;
	    let transport = if weekend { 0.7 } else { 0.85 };
	    let retail = if weekend { 1.1 } else { 0.9 };
	    mobility.public_transport.push((date, ((transport + jitter(rng) * 0.2) * 100.0).floor()));
	    mobility.retail.push((date, ((retail + jitter(rng) * 0.3) * 100.0).floor()));
	    mobility.workplace.push((date, ((0.6 + jitter(rng) * 0.2) * 100.0).floor()));
	    mobility.residential.push((date, ((1.2 + jitter(rng) * 0.1) * 100.0).floor()));
	    mobility.recreation.push((date, ((0.8 + jitter(rng) * 0.3) * 100.0).floor()));

	    let env = &mut data.environmental;
	    env.temperature.push((date, (18.0 + rng.random::<f64>() * 15.0).floor()));
	    env.humidity.push((date, (40.0 + rng.random::<f64>() * 40.0).floor()));
	    env.air_quality.push((date, (50.0 + rng.random::<f64>() * 100.0).floor()));
	    env.uv_index.push((date, (3.0 + rng.random::<f64>() * 8.0).floor()));

	    let social = &mut data.social_media;
	    social.sentiment.push((date, round_to(0.3 + rng.random::<f64>() * 0.4, 2)));
	    social.mentions.push((date, (500.0 + rng.random::<f64>() * 1000.0).floor()));

	}

	data

    }

    /// Appends the next day of new cases as a random step from the last value,
    /// floored at zero, and keeps the latest `window` days. The other series
    /// stay as generated.
    pub fn advance<R: Rng + ?Sized>(&mut self, window: usize, rng: &mut R) -> Option<(NaiveDate,f64)> {
	let series = &mut self.epidemiological.new_cases;
	let (date,value) = *series.last()?;
	let next = (date.checked_add_days(Days::new(1))?,
		    (value + rng.random_range(-MAX_STEP..MAX_STEP) as f64).max(0.0));
	series.push(next);
	let excess = series.len().saturating_sub(window);
	series.drain(..excess);
	Some(next)
    }

}


/// Whole number with comma thousands separators, e.g. `12,345`.
fn grouped(value: f64) -> String {
    let n = value.round() as i64;
    let digits = n.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if n < 0 {
	out.push('-');
    }
    for (i,c) in digits.chars().enumerate() {
	if i > 0 && (digits.len() - i) % 3 == 0 {
	    out.push(',');
	}
	out.push(c);
    }
    out
}

fn latest(series: &Series) -> Option<f64> {
    series.last().map(|(_,v)| *v)
}


/// Headline cards from the most recent indicator values. A card whose series
/// is empty is left out.
pub fn latest_stats(data: &Indicators) -> Vec<StatCard> {

    let epi = &data.epidemiological;
    let mut cards = vec![];

    if let Some(today) = latest(&epi.new_cases) {
	let yesterday = epi.new_cases.len().checked_sub(2).map(|i| epi.new_cases[i].1);
	cards.push(StatCard {
	    key: "newCases",
	    title: "New Cases (24h)",
	    value: grouped(today),
	    change: percent_change(today as i64, yesterday.unwrap_or(today) as i64),
	    trend: match today > yesterday.unwrap_or(0.0) {
		true => Trend::Increase,
		false => Trend::Decrease,
	    },
	});
    }

    if let Some(active) = latest(&epi.active_cases) {
	cards.push(StatCard { key: "activeCases", title: "Active Cases", value: grouped(active),
			      change: "Active infections".to_string(), trend: Trend::Stable });
    }

    if let Some(admitted) = latest(&data.clinical.hospitalizations) {
	cards.push(StatCard { key: "hospitalizations", title: "Hospitalizations", value: grouped(admitted),
			      change: "Current admissions".to_string(), trend: Trend::Stable });
    }

    if let Some(r) = latest(&epi.reproduction_rate) {
	let (change,trend) = match r > 1.0 {
	    true => ("Above threshold", Trend::Increase),
	    false => ("Under control", Trend::Decrease),
	};
	cards.push(StatCard { key: "reproductionRate", title: "R Number", value: r.to_string(),
			      change: change.to_string(), trend });
    }

    if let Some(rate) = latest(&epi.positivity_rate) {
	cards.push(StatCard {
	    key: "positivityRate",
	    title: "Positivity Rate",
	    value: format!("{}%", rate),
	    change: "Test positivity".to_string(),
	    trend: match rate > 10.0 {
		true => Trend::Increase,
		false => Trend::Stable,
	    },
	});
    }

    cards

}
