use std::fmt;
use std::str::FromStr;

use chrono::naive::NaiveDate;
use serde::{Serialize,Deserialize};
use slog::{debug,o};

use super::error::{Result,Error};
use super::logging::{self,DEFAULT};


/// One observation from either feed. Per-person rows count as a single case.
#[derive(Serialize,Deserialize,Clone,Debug,PartialEq,Eq)]
pub struct EventRecord {
    pub date: NaiveDate,
    pub zone: String,
    pub new_cases: i64,
    pub gender: Option<Gender>,
    pub age: Option<u32>,
}

#[derive(Serialize,Deserialize,Clone,Copy,Debug,PartialEq,Eq,PartialOrd,Ord,Hash)]
pub enum Gender {
    M,
    F,
    U,
}

impl Gender {
    pub fn from_code(code: &str) -> Self {
	match code.trim().to_uppercase().as_str() {
	    "M" | "MALE" => Gender::M,
	    "F" | "FEMALE" => Gender::F,
	    _ => Gender::U,
	}
    }
}

/// What to do with a row whose measure field (count or age) is missing or not
/// a number. Rows without a usable date or zone are always dropped.
#[derive(Serialize,Deserialize,Clone,Copy,Debug,PartialEq,Eq,Default)]
#[serde(rename_all = "lowercase")]
pub enum ParsePolicy {
    #[default]
    Lenient,
    Strict,
}

impl FromStr for ParsePolicy {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, String> {
	match s.trim().to_lowercase().as_str() {
	    "lenient" => Ok(ParsePolicy::Lenient),
	    "strict" => Ok(ParsePolicy::Strict),
	    other => Err(format!("unknown parse policy '{}'", other)),
	}
    }
}

impl fmt::Display for ParsePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
	match self {
	    ParsePolicy::Lenient => write!(f, "lenient"),
	    ParsePolicy::Strict => write!(f, "strict"),
	}
    }
}


pub fn parse_date(s: &str) -> Result<NaiveDate> {
    Ok(NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")?)
}


/// Feed A: `[_, date, zone, new_cases]`, header line skipped. Parsing is pure,
/// so calling this again on the same text yields the same records.
pub fn parse_cases(raw: &str, policy: ParsePolicy) -> impl Iterator<Item = EventRecord> + '_ {
    let log = logging::component("parser").new(o!("feed" => "cases", "policy" => policy.to_string()));
    rows(raw).filter_map(move |(line,row)| {
	let (date,zone) = match keys(&row) {
	    Some(keys) => keys,
	    None => { debug!(log, "dropping row without date or zone"; "line" => line); return None }
	};
	let new_cases = match (row.get(3).map(str::trim).map(str::parse::<i64>), policy) {
	    (Some(Ok(n)),_) => n,
	    (_,ParsePolicy::Lenient) => 0,
	    (_,ParsePolicy::Strict) => {
		debug!(log, "dropping row with invalid case count"; "line" => line);
		return None
	    }
	};
	Some(EventRecord { date, zone, new_cases, gender: None, age: None })
    })
}


/// Feed B: `[_, date, zone, gender, age]`, one row per reported person.
pub fn parse_persons(raw: &str, policy: ParsePolicy) -> impl Iterator<Item = EventRecord> + '_ {
    let log = logging::component("parser").new(o!("feed" => "persons", "policy" => policy.to_string()));
    rows(raw).filter_map(move |(line,row)| {
	let (date,zone) = match keys(&row) {
	    Some(keys) => keys,
	    None => { debug!(log, "dropping row without date or zone"; "line" => line); return None }
	};
	let gender = Gender::from_code(row.get(3).unwrap_or(""));
	let age = match (row.get(4).map(str::trim).map(str::parse::<u32>), policy) {
	    (Some(Ok(age)),_) => Some(age),
	    (_,ParsePolicy::Lenient) => None,
	    (_,ParsePolicy::Strict) => {
		debug!(log, "dropping row with invalid age"; "line" => line);
		return None
	    }
	};
	Some(EventRecord { date, zone, new_cases: 1, gender: Some(gender), age })
    })
}


fn keys(row: &csv::StringRecord) -> Option<(NaiveDate,String)> {
    let date = parse_date(row.get(1)?).ok()?;
    let zone = row.get(2)?.trim();
    match zone.is_empty() {
	true => None,
	false => Some((date, zone.to_string())),
    }
}


fn rows(raw: &str) -> impl Iterator<Item = (u64,csv::StringRecord)> + '_ {
    csv::ReaderBuilder::new()
	.has_headers(true)
	.flexible(true)
	.quoting(false)
	.trim(csv::Trim::All)
	.from_reader(raw.as_bytes())
	.into_records()
	.filter_map(|row| match row {
	    Ok(row) => Some((row.position().map_or(0, |p| p.line()), row)),
	    Err(err) => {
		debug!(DEFAULT, "skipping unreadable row"; "error" => %Error::from(err));
		None
	    }
	})
}


#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const CASES: &str = "id,date,zone,new_cases\n\
			 1,2024-01-01,zone_1,10\n\
			 2,2024-01-01,zone_2,5\n\
			 3,2024-01-02,zone_1,20\n";

    fn date(s: &str) -> NaiveDate {
	parse_date(s).unwrap()
    }

    #[test]
    fn test_parse_cases() {
	let records: Vec<_> = parse_cases(CASES, ParsePolicy::Lenient).collect();
	assert_eq!(records.len(), 3);
	assert_eq!(records[0], EventRecord {
	    date: date("2024-01-01"), zone: "zone_1".to_string(),
	    new_cases: 10, gender: None, age: None,
	});
	assert_eq!(records[2].new_cases, 20);
    }

    #[test]
    fn test_header_only_and_empty_input() {
	assert_eq!(parse_cases("", ParsePolicy::Lenient).count(), 0);
	assert_eq!(parse_cases("id,date,zone,new_cases\n", ParsePolicy::Lenient).count(), 0);
    }

    #[test]
    fn test_blank_lines_and_extra_fields() {
	let raw = "id,date,zone,new_cases\n\n1,2024-01-01,zone_1,7,extra,fields\n\n";
	let records: Vec<_> = parse_cases(raw, ParsePolicy::Strict).collect();
	assert_eq!(records.len(), 1);
	assert_eq!(records[0].new_cases, 7);
    }

    #[test]
    fn test_bad_count_follows_policy() {
	let raw = "id,date,zone,new_cases\n1,2024-01-01,zone_1,abc\n2,2024-01-01,zone_2\n3,2024-01-01,zone_3,-4\n";
	let lenient: Vec<_> = parse_cases(raw, ParsePolicy::Lenient).collect();
	assert_eq!(lenient.iter().map(|r| r.new_cases).collect::<Vec<_>>(), vec![0, 0, -4]);
	let strict: Vec<_> = parse_cases(raw, ParsePolicy::Strict).collect();
	assert_eq!(strict.len(), 1);
	assert_eq!(strict[0].zone, "zone_3");
    }

    #[test]
    fn test_rows_without_keys_are_dropped() {
	let raw = "id,date,zone,new_cases\n1,not-a-date,zone_1,3\n2,2024-01-01,,3\n3\n4,2024-01-01,zone_4,3\n";
	let records: Vec<_> = parse_cases(raw, ParsePolicy::Lenient).collect();
	assert_eq!(records.len(), 1);
	assert_eq!(records[0].zone, "zone_4");
    }

    #[test]
    fn test_stray_quote_does_not_swallow_rows() {
	let raw = "id,date,zone,new_cases\n1,2024-01-01,zone_1,\"10\n2,2024-01-01,zone_2,5\n3,2024-01-02,zone_3,20\n";
	let lenient: Vec<_> = parse_cases(raw, ParsePolicy::Lenient).collect();
	assert_eq!(lenient.iter().map(|r| (r.zone.as_str(), r.new_cases)).collect::<Vec<_>>(),
		   vec![("zone_1", 0), ("zone_2", 5), ("zone_3", 20)]);
	let strict: Vec<_> = parse_cases(raw, ParsePolicy::Strict).collect();
	assert_eq!(strict.len(), 2);
	let persons = "id,date,zone,gender,age\n1,2024-01-01,\"zone_1,M,30\n2,2024-01-01,zone_2,F,41\n";
	assert_eq!(parse_persons(persons, ParsePolicy::Lenient).count(), 2);
    }

    #[test]
    fn test_parse_persons() {
	let raw = "id,date,zone,gender,age\n\
		   1,2024-01-01,zone_1,M,34\n\
		   2,2024-01-01,zone_1,F,\n\
		   3,2024-01-02,zone_2,X,70\n";
	let records: Vec<_> = parse_persons(raw, ParsePolicy::Lenient).collect();
	assert_eq!(records.len(), 3);
	assert!(records.iter().all(|r| r.new_cases == 1));
	assert_eq!(records[0].gender, Some(Gender::M));
	assert_eq!(records[1].age, None);
	assert_eq!(records[2].gender, Some(Gender::U));
	assert_eq!(parse_persons(raw, ParsePolicy::Strict).count(), 2);
    }

    #[test]
    fn test_parse_policy_from_str() {
	assert_eq!("Strict".parse::<ParsePolicy>(), Ok(ParsePolicy::Strict));
	assert!("maybe".parse::<ParsePolicy>().is_err());
    }

    proptest! {
	#[test]
	fn test_reparse_is_deterministic(rows in proptest::collection::vec(
	    (1u32..28, 1u32..11, -5i64..500, any::<bool>()), 0..40)) {
	    let mut raw = String::from("id,date,zone,new_cases\n");
	    for (i,(day,zone,cases,garbage)) in rows.iter().enumerate() {
		match garbage {
		    true => raw.push_str(&format!("{},2024-02-{:02},zone_{},x{}\n", i, day, zone, cases)),
		    false => raw.push_str(&format!("{},2024-02-{:02},zone_{},{}\n", i, day, zone, cases)),
		}
	    }
	    let first: Vec<_> = parse_cases(&raw, ParsePolicy::Lenient).collect();
	    let second: Vec<_> = parse_cases(&raw, ParsePolicy::Lenient).collect();
	    prop_assert_eq!(first.len(), rows.len());
	    prop_assert_eq!(first, second);
	}
    }

}
