use std::time::Duration;

use humantime::parse_duration;

use super::classify::Heuristic;
use super::error::{Result,Error};
use super::records::ParsePolicy;


pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(30);
pub const DEFAULT_HISTORY_DAYS: usize = 14;


pub fn get(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}


#[derive(Clone,Debug,PartialEq)]
pub struct Config {
    pub cases_url: Option<String>,
    pub persons_url: Option<String>,
    pub predictions_url: Option<String>,
    pub refresh_interval: Duration,
    pub history_days: usize,
    pub parse_policy: ParsePolicy,
    pub heuristic: Heuristic,
}

impl Default for Config {
    fn default() -> Self {
	Config {
	    cases_url: None,
	    persons_url: None,
	    predictions_url: None,
	    refresh_interval: DEFAULT_REFRESH_INTERVAL,
	    history_days: DEFAULT_HISTORY_DAYS,
	    parse_policy: ParsePolicy::Lenient,
	    heuristic: Heuristic::default(),
	}
    }
}

impl Config {

    pub fn from_env() -> Result<Self> {

	let refresh_interval = match get("HEALTH_REFRESH_INTERVAL") {
	    Some(v) => parse_duration(&v)
		.map_err(|err| Error::config("HEALTH_REFRESH_INTERVAL", err))?,
	    None => DEFAULT_REFRESH_INTERVAL,
	};
	if refresh_interval.is_zero() {
	    return Err(Error::config("HEALTH_REFRESH_INTERVAL", "must be positive"));
	}

	let history_days = match get("HEALTH_HISTORY_DAYS") {
	    Some(v) => match v.trim().parse::<usize>() {
		Ok(0) => return Err(Error::config("HEALTH_HISTORY_DAYS", "must be positive")),
		Ok(n) => n,
		Err(err) => return Err(Error::config("HEALTH_HISTORY_DAYS", err)),
	    },
	    None => DEFAULT_HISTORY_DAYS,
	};

	let parse_policy = match get("HEALTH_PARSE_POLICY") {
	    Some(v) => v.parse().map_err(|err| Error::config("HEALTH_PARSE_POLICY", err))?,
	    None => ParsePolicy::Lenient,
	};

	let require_population = match get("HEALTH_OUTBREAK_REQUIRES_POPULATION") {
	    Some(v) => v.trim().parse::<bool>()
		.map_err(|err| Error::config("HEALTH_OUTBREAK_REQUIRES_POPULATION", err))?,
	    None => false,
	};

	Ok(Config {
	    cases_url: get("HEALTH_CASES_URL"),
	    persons_url: get("HEALTH_PERSONS_URL"),
	    predictions_url: get("HEALTH_PREDICTIONS_URL"),
	    refresh_interval, history_days, parse_policy,
	    heuristic: Heuristic { require_population },
	})

    }

}
