use std::fmt;
use std::collections::BTreeMap;

use chrono::Days;
use chrono::naive::NaiveDate;
use serde::{Serialize,Deserialize};

use super::records::{EventRecord,Gender};


pub const PAST_WEEK_DAYS: usize = 7;
pub const ACTIVE_CASE_DAYS: usize = 14;
const R_NUMBER_LOOKBACK: usize = 3;


#[derive(Serialize,Deserialize,Clone,Debug,PartialEq,Eq)]
pub struct DailyTotal {
    pub date: NaiveDate,
    pub total: i64,
}

#[derive(Serialize,Deserialize,Clone,Debug,PartialEq,Eq)]
#[serde(rename_all = "camelCase")]
pub struct ZoneStats {
    pub zone: String,
    pub total_cases: i64,
    pub max_cases: i64,
    pub avg_cases: Option<i64>,
    pub count: usize,
}

#[derive(Serialize,Deserialize,Clone,Debug,PartialEq,Eq)]
pub struct SeriesPoint {
    pub date: NaiveDate,
    #[serde(flatten)]
    pub zones: BTreeMap<String,i64>,
}

#[derive(Serialize,Deserialize,Clone,Copy,Debug,PartialEq,Eq)]
pub enum RTrend {
    #[serde(rename = "Above threshold")]
    AboveThreshold,
    Stable,
}

impl fmt::Display for RTrend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
	match self {
	    RTrend::AboveThreshold => write!(f, "Above threshold"),
	    RTrend::Stable => write!(f, "Stable"),
	}
    }
}

#[derive(Serialize,Deserialize,Clone,Copy,Debug,PartialEq,Eq,Hash)]
pub enum AlertKind {
    #[serde(rename = "New Cases")]
    NewCases,
    #[serde(rename = "Weekly Trend")]
    WeeklyTrend,
    #[serde(rename = "R Number")]
    RNumber,
}

#[derive(Serialize,Deserialize,Clone,Debug,PartialEq,Eq)]
pub struct Alert {
    #[serde(rename = "type")]
    pub kind: AlertKind,
    pub message: String,
}

#[derive(Serialize,Deserialize,Clone,Debug,PartialEq,Eq)]
#[serde(rename_all = "camelCase")]
pub struct Overview {
    pub new_cases_24h: i64,
    pub new_cases_change: String,
    pub active_cases: i64,
    pub past_week: i64,
    pub r_number_status: RTrend,
    pub alerts: Vec<Alert>,
}

#[derive(Serialize,Deserialize,Clone,Copy,Debug,PartialEq,Eq,PartialOrd,Ord,Hash)]
pub enum AgeBand {
    #[serde(rename = "0-18")]
    Child,
    #[serde(rename = "19-35")]
    YoungAdult,
    #[serde(rename = "36-50")]
    Adult,
    #[serde(rename = "51-65")]
    MiddleAged,
    #[serde(rename = "65+")]
    Senior,
    #[serde(rename = "unknown")]
    Unknown,
}

impl AgeBand {
    pub fn of(age: Option<u32>) -> Self {
	match age {
	    None => AgeBand::Unknown,
	    Some(0..=18) => AgeBand::Child,
	    Some(19..=35) => AgeBand::YoungAdult,
	    Some(36..=50) => AgeBand::Adult,
	    Some(51..=65) => AgeBand::MiddleAged,
	    Some(_) => AgeBand::Senior,
	}
    }
}

#[derive(Serialize,Deserialize,Clone,Debug,PartialEq,Eq,Default)]
#[serde(rename_all = "camelCase")]
pub struct Demographics {
    pub gender: BTreeMap<Gender,u64>,
    pub age_groups: BTreeMap<AgeBand,u64>,
}


/// Sums every record per calendar date, ascending. Dates without records are
/// simply absent. Sums saturate at the `i64` bounds.
pub fn daily_totals(records: &[EventRecord]) -> Vec<DailyTotal> {
    let mut totals: BTreeMap<NaiveDate,i64> = BTreeMap::new();
    for record in records {
	let total = totals.entry(record.date).or_insert(0);
	*total = total.saturating_add(record.new_cases);
    }
    totals.into_iter().map(|(date,total)| DailyTotal { date, total }).collect()
}


/// Negative counts contribute zero here, so totals stay non-negative.
pub fn zone_statistics(records: &[EventRecord]) -> BTreeMap<String,ZoneStats> {

    let mut stats: BTreeMap<String,ZoneStats> = BTreeMap::new();

    for record in records {
	let cases = record.new_cases.max(0);
	let entry = stats.entry(record.zone.clone()).or_insert_with(|| ZoneStats {
	    zone: record.zone.clone(), total_cases: 0, max_cases: 0, avg_cases: None, count: 0
	});
	entry.total_cases = entry.total_cases.saturating_add(cases);
	entry.max_cases = entry.max_cases.max(cases);
	entry.count += 1;
    }

    for entry in stats.values_mut() {
	entry.avg_cases = match entry.count {
	    0 => None,
	    n => Some((entry.total_cases as f64 / n as f64).round() as i64),
	};
    }

    stats

}


/// Date by zone matrix; repeated (date, zone) rows are summed.
pub fn zone_series(records: &[EventRecord]) -> Vec<SeriesPoint> {
    let mut series: BTreeMap<NaiveDate,BTreeMap<String,i64>> = BTreeMap::new();
    for record in records {
	let cell = series.entry(record.date).or_insert_with(BTreeMap::new)
	    .entry(record.zone.clone()).or_insert(0);
	*cell = cell.saturating_add(record.new_cases);
    }
    series.into_iter().map(|(date,zones)| SeriesPoint { date, zones }).collect()
}


/// A zero baseline is treated as one. The percentage is rounded to one
/// decimal with ties away from zero, so 0.25 prints as `+0.3%`.
pub fn percent_change(today: i64, yesterday: i64) -> String {
    let divisor = match yesterday {
	0 => 1.0,
	n => n as f64,
    };
    let change = (today as f64 - yesterday as f64) / divisor * 100.0;
    let rounded = (change * 10.0).round() / 10.0;
    format!("{}{:.1}% from yesterday", if change > 0.0 { "+" } else { "" }, rounded)
}


/// Sum of the last `days` entries, or of all entries when there are fewer.
pub fn rolling_window(totals: &[DailyTotal], days: usize) -> i64 {
    totals[totals.len().saturating_sub(days)..].iter().map(|t| t.total).fold(0, i64::saturating_add)
}


pub fn r_number_status(totals: &[DailyTotal]) -> RTrend {
    let today = totals.last().map_or(0, |t| t.total);
    let reference = match totals.len() {
	n if n > R_NUMBER_LOOKBACK => totals[n - 1 - R_NUMBER_LOOKBACK].total,
	_ => 0,
    };
    match today > reference {
	true => RTrend::AboveThreshold,
	false => RTrend::Stable,
    }
}


pub fn build_alerts(new_cases_24h: i64, past_week: i64, r_status: RTrend) -> Vec<Alert> {
    vec![
	Alert { kind: AlertKind::NewCases,
		message: format!("Today reported {} new cases.", new_cases_24h) },
	Alert { kind: AlertKind::WeeklyTrend,
		message: format!("Last 7 days total: {} cases.", past_week) },
	Alert { kind: AlertKind::RNumber,
		message: format!("Trend is {}.", r_status.to_string().to_lowercase()) },
    ]
}


pub fn overview(totals: &[DailyTotal]) -> Overview {
    let today = totals.last().map_or(0, |t| t.total);
    let yesterday = match totals.len() {
	n if n >= 2 => totals[n - 2].total,
	_ => 0,
    };
    let past_week = rolling_window(totals, PAST_WEEK_DAYS);
    let r_number_status = r_number_status(totals);
    Overview {
	new_cases_24h: today,
	new_cases_change: percent_change(today, yesterday),
	active_cases: rolling_window(totals, ACTIVE_CASE_DAYS),
	past_week,
	r_number_status,
	alerts: build_alerts(today, past_week, r_number_status),
    }
}


/// Keeps records within the first `days` calendar days, counted from the
/// earliest observed date.
pub fn first_days(records: &[EventRecord], days: u64) -> Vec<EventRecord> {
    let start = match records.iter().map(|r| r.date).min() {
	Some(start) => start,
	None => return vec![],
    };
    let end = start.checked_add_days(Days::new(days)).unwrap_or(NaiveDate::MAX);
    records.iter().filter(|r| r.date < end).cloned().collect()
}


pub fn demographics(records: &[EventRecord]) -> Demographics {
    let mut result = Demographics::default();
    for record in records {
	if let Some(gender) = record.gender {
	    let cases = record.new_cases.max(0) as u64;
	    let by_gender = result.gender.entry(gender).or_insert(0);
	    *by_gender = by_gender.saturating_add(cases);
	    let by_age = result.age_groups.entry(AgeBand::of(record.age)).or_insert(0);
	    *by_age = by_age.saturating_add(cases);
	}
    }
    result
}
