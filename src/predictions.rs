use std::collections::{BTreeMap,HashMap};

use serde::{Serialize,Deserialize};
use serde_json::{Map,Value};
use slog::{debug,warn};

use super::aggregate::ZoneStats;
use super::logging::DEFAULT;
use super::zones::ZoneRegistry;


#[derive(Serialize,Deserialize,Clone,Debug,PartialEq)]
pub struct PredictionEntry {
    pub zone: String,
    pub population: u64,
    pub outbreak: Option<bool>,
    pub epidemic: Option<bool>,
}

/// Zone statistics joined with coordinates and external predictions. `None`
/// flags mean "no prediction", which is not the same as `false`.
#[derive(Serialize,Deserialize,Clone,Debug,PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ZoneSummary {
    #[serde(flatten)]
    pub stats: ZoneStats,
    pub lat: f64,
    pub long: f64,
    pub population: u64,
    pub outbreak: Option<bool>,
    pub epidemic: Option<bool>,
}

#[derive(Clone,Copy,Debug,PartialEq,Eq)]
pub enum Shape {
    Bare,
    Data,
    Predictions,
    Keyed,
}

#[derive(Clone,Debug,PartialEq)]
pub enum Normalized {
    Recognized { shape: Shape, entries: Vec<PredictionEntry> },
    Unrecognized,
}

impl Normalized {
    pub fn into_entries(self) -> Vec<PredictionEntry> {
	match self {
	    Normalized::Recognized { entries, .. } => entries,
	    Normalized::Unrecognized => vec![],
	}
    }
}


#[derive(Deserialize)]
#[serde(untagged)]
enum Envelope {
    Bare(Vec<Value>),
    Data { data: Vec<Value> },
    Predictions { predictions: Vec<Value> },
    Keyed(Map<String,Value>),
    Unexpected(Value),
}

#[derive(Deserialize)]
struct RawEntry {
    #[serde(default)]
    zone: Option<String>,
    #[serde(default)]
    population: Option<f64>,
    #[serde(default)]
    outbreak: Option<Flag>,
    #[serde(default)]
    epidemic: Option<Flag>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Flag {
    Bool(bool),
    Number(f64),
}

impl Flag {
    fn truthy(self) -> bool {
	match self {
	    Flag::Bool(b) => b,
	    Flag::Number(n) => n != 0.0 && !n.is_nan(),
	}
    }
}

impl RawEntry {

    /// An entry needs a zone (its own, or the key it was filed under) and at
    /// least one predicted field.
    fn into_entry(self, key: Option<&str>) -> Option<PredictionEntry> {
	if self.population.is_none() && self.outbreak.is_none() && self.epidemic.is_none() {
	    return None;
	}
	let zone = self.zone.or(key.map(str::to_string))?;
	Some(PredictionEntry {
	    zone,
	    population: self.population.filter(|p| p.is_finite())
		.map_or(0, |p| p.max(0.0).round() as u64),
	    outbreak: self.outbreak.map(Flag::truthy),
	    epidemic: self.epidemic.map(Flag::truthy),
	})
    }

}


fn entries(values: Vec<Value>) -> Vec<PredictionEntry> {
    values.into_iter().filter_map(|value| {
	match serde_json::from_value::<RawEntry>(value) {
	    Ok(raw) => raw.into_entry(None),
	    Err(err) => { debug!(DEFAULT, "skipping prediction entry"; "error" => %err); None }
	}
    }).collect()
}


/// Tries each known envelope in turn: a bare array, `{data: [..]}`,
/// `{predictions: [..]}`, then an object keyed by zone id.
pub fn decode(payload: Value) -> Normalized {
    match serde_json::from_value::<Envelope>(payload) {
	Ok(Envelope::Bare(values)) => Normalized::Recognized { shape: Shape::Bare, entries: entries(values) },
	Ok(Envelope::Data { data }) => Normalized::Recognized { shape: Shape::Data, entries: entries(data) },
	Ok(Envelope::Predictions { predictions }) => Normalized::Recognized {
	    shape: Shape::Predictions, entries: entries(predictions)
	},
	Ok(Envelope::Keyed(map)) => {
	    let entries: Vec<_> = map.into_iter().filter_map(|(key,value)| {
		serde_json::from_value::<RawEntry>(value).ok()?.into_entry(Some(key.as_str()))
	    }).collect();
	    match entries.is_empty() {
		true => {
		    warn!(DEFAULT, "prediction payload has no usable entries");
		    Normalized::Unrecognized
		},
		false => Normalized::Recognized { shape: Shape::Keyed, entries },
	    }
	},
	Ok(Envelope::Unexpected(v)) => {
	    warn!(DEFAULT, "unrecognized prediction payload"; "payload" => %v);
	    Normalized::Unrecognized
	},
	Err(err) => {
	    warn!(DEFAULT, "unreadable prediction payload"; "error" => %err);
	    Normalized::Unrecognized
	},
    }
}


pub fn normalize(payload: Value) -> Vec<PredictionEntry> {
    decode(payload).into_entries()
}


/// Left join on zone id. When several predictions name the same zone the first
/// one is used. Output follows registry order, unknown zones last.
pub fn merge(stats: &BTreeMap<String,ZoneStats>, predictions: &[PredictionEntry],
	     registry: &ZoneRegistry) -> Vec<ZoneSummary> {

    let mut by_zone = HashMap::new();
    for prediction in predictions {
	by_zone.entry(prediction.zone.as_str()).or_insert(prediction);
    }

    let mut merged: Vec<ZoneSummary> = stats.values().map(|stats| {
	let coords = registry.coordinates_for(&stats.zone);
	let prediction = by_zone.get(stats.zone.as_str());
	ZoneSummary {
	    stats: stats.clone(),
	    lat: coords.lat,
	    long: coords.long,
	    population: prediction.map_or(0, |p| p.population),
	    outbreak: prediction.and_then(|p| p.outbreak),
	    epidemic: prediction.and_then(|p| p.epidemic),
	}
    }).collect();

    let position = |zone: &str| registry.zones().iter().position(|z| z.id == zone)
	.unwrap_or(usize::MAX);
    merged.sort_by(|a,b| (position(a.stats.zone.as_str()), &a.stats.zone)
		   .cmp(&(position(b.stats.zone.as_str()), &b.stats.zone)));
    merged

}
