use std::sync::Mutex;
use std::collections::HashMap;

use chrono::{DateTime,Utc};
use serde::{Serialize,Deserialize};
use serde_json::Value;
use slog::warn;

use super::aggregate::{Alert,AlertKind};
use super::error::Result;
use super::logging::DEFAULT;


pub trait Storage: Send + Sync {
    fn save(&self, key: &str, value: Value) -> Result<()>;
    fn load(&self, key: &str) -> Result<Option<Value>>;
}

#[derive(Default,Debug)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String,Value>>,
}

impl Storage for MemoryStorage {

    fn save(&self, key: &str, value: Value) -> Result<()> {
	self.entries.lock().unwrap_or_else(|e| e.into_inner()).insert(key.to_string(), value);
	Ok(())
    }

    fn load(&self, key: &str) -> Result<Option<Value>> {
	Ok(self.entries.lock().unwrap_or_else(|e| e.into_inner()).get(key).cloned())
    }

}


#[derive(Serialize,Deserialize,Clone,Debug,PartialEq)]
pub struct LoggedAlert {
    #[serde(flatten)]
    pub alert: Alert,
    pub at: DateTime<Utc>,
}

/// Alert history, newest first and bounded.
#[derive(Serialize,Deserialize,Clone,Debug,PartialEq,Default)]
pub struct AlertLog {
    entries: Vec<LoggedAlert>,
}

impl AlertLog {

    pub const CAPACITY: usize = 50;
    pub const STORAGE_KEY: &'static str = "alerts";

    pub fn record<I: IntoIterator<Item = Alert>>(mut self, alerts: I, at: DateTime<Utc>) -> Self {
	for alert in alerts {
	    self.entries.insert(0, LoggedAlert { alert, at });
	}
	self.entries.truncate(Self::CAPACITY);
	self
    }

    pub fn len(&self) -> usize {
	self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
	self.entries.is_empty()
    }

    pub fn filter(&self, kind: Option<AlertKind>, limit: usize) -> Vec<&LoggedAlert> {
	self.entries.iter()
	    .filter(|e| kind.map_or(true, |k| e.alert.kind == k))
	    .take(limit)
	    .collect()
    }

    pub fn persist<S: Storage + ?Sized>(&self, storage: &S) -> Result<()> {
	storage.save(Self::STORAGE_KEY, serde_json::to_value(&self.entries)?)
    }

    /// A missing or unreadable stored log restores as an empty one.
    pub fn restore<S: Storage + ?Sized>(storage: &S) -> Self {
	let stored = match storage.load(Self::STORAGE_KEY) {
	    Ok(Some(value)) => value,
	    Ok(None) => return AlertLog::default(),
	    Err(err) => {
		warn!(DEFAULT, "cannot load alert log"; "error" => %err);
		return AlertLog::default();
	    }
	};
	match serde_json::from_value::<Vec<LoggedAlert>>(stored) {
	    Ok(mut entries) => {
		entries.truncate(Self::CAPACITY);
		AlertLog { entries }
	    },
	    Err(err) => {
		warn!(DEFAULT, "discarding corrupt alert log"; "error" => %err);
		AlertLog::default()
	    }
	}
    }

}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{build_alerts,RTrend};
    use chrono::TimeZone;

    fn at(hour: u32) -> DateTime<Utc> {
	Utc.with_ymd_and_hms(2024, 1, 15, hour, 0, 0).unwrap()
    }

    #[test]
    fn test_record_is_newest_first_and_bounded() {
	let mut log = AlertLog::default();
	for i in 0..20 {
	    log = log.record(build_alerts(i, i * 7, RTrend::Stable), at(i as u32 % 24));
	}
	assert_eq!(log.len(), AlertLog::CAPACITY);
	let latest = log.filter(Some(AlertKind::NewCases), 1);
	assert_eq!(latest[0].alert.message, "Today reported 19 new cases.");
	assert_eq!(log.filter(None, 5).len(), 5);
	assert_eq!(log.filter(Some(AlertKind::RNumber), 100).len(), 17);
    }

    #[test]
    fn test_persist_and_restore() {
	let storage = MemoryStorage::default();
	let log = AlertLog::default().record(build_alerts(3, 21, RTrend::AboveThreshold), at(9));
	log.persist(&storage).unwrap();
	assert_eq!(AlertLog::restore(&storage), log);
	assert_eq!(storage.load(AlertLog::STORAGE_KEY).unwrap().unwrap()[0]["type"], "R Number");
    }

    #[test]
    fn test_restore_missing_or_corrupt() {
	let storage = MemoryStorage::default();
	assert!(AlertLog::restore(&storage).is_empty());
	storage.save(AlertLog::STORAGE_KEY, serde_json::json!({"not": "a list"})).unwrap();
	assert!(AlertLog::restore(&storage).is_empty());
    }

}
