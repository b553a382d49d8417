use std::sync::{Arc,Mutex};
use std::sync::atomic::{AtomicU64,AtomicUsize,Ordering};

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use slog::{debug,info,warn,o,Logger};
use tokio::sync::{watch,oneshot,Notify};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::aggregate::{self,Alert,DailyTotal,Demographics,Overview,SeriesPoint,ACTIVE_CASE_DAYS};
use super::classify::{self,HeatmapPoint,Strategy,ZoneView};
use super::config::Config;
use super::error::{Result,Error};
use super::indicators::{self,Indicators,StatCard};
use super::journal::{AlertLog,Storage};
use super::logging;
use super::predictions;
use super::records;
use super::sources::Sources;
use super::zones::ZoneRegistry;


#[derive(Clone,Debug,Default,PartialEq)]
pub struct Inputs {
    pub cases: String,
    pub persons: String,
    pub predictions: Value,
    pub indicators: Indicators,
}

/// Everything the presentation layer reads, rebuilt from scratch each cycle.
#[derive(Serialize,Clone,Debug,PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub generation: u64,
    pub daily_totals: Vec<DailyTotal>,
    pub zone_series: Vec<SeriesPoint>,
    pub zones: Vec<ZoneView>,
    pub overview: Overview,
    pub alerts: Vec<Alert>,
    pub heatmap_points: Vec<HeatmapPoint>,
    pub demographics: Demographics,
    pub historical: Vec<ZoneView>,
    pub stat_cards: Vec<StatCard>,
    pub indicators: Indicators,
}

#[derive(Clone,Copy,Debug,PartialEq,Eq)]
pub enum DriverState {
    Idle,
    Refreshing,
}


/// Case counts come from feed A only; feed B describes the same people and
/// only feeds the demographics. `strategy` classifies the live zones; the
/// historical window always uses the local heuristic.
pub fn build_dashboard(inputs: &Inputs, registry: &ZoneRegistry, config: &Config, strategy: Strategy) -> Dashboard {

    let policy = config.parse_policy;
    let cases: Vec<_> = records::parse_cases(&inputs.cases, policy).collect();
    let persons: Vec<_> = records::parse_persons(&inputs.persons, policy).collect();
    let predictions = predictions::normalize(inputs.predictions.clone());

    let daily_totals = aggregate::daily_totals(&cases);
    let merged = predictions::merge(&aggregate::zone_statistics(&cases), &predictions, registry);
    let historical = predictions::merge(
	&aggregate::zone_statistics(&aggregate::first_days(&cases, ACTIVE_CASE_DAYS as u64)),
	&predictions, registry);
    let overview = aggregate::overview(&daily_totals);

    Dashboard {
	generation: 0,
	zone_series: aggregate::zone_series(&cases),
	zones: classify::classify(&merged, strategy, config.heuristic),
	alerts: overview.alerts.clone(),
	heatmap_points: classify::heatmap_points(&merged),
	demographics: aggregate::demographics(&persons),
	historical: classify::classify(&historical, Strategy::LocalHeuristic, config.heuristic),
	stat_cards: indicators::latest_stats(&inputs.indicators),
	indicators: inputs.indicators.clone(),
	daily_totals,
	overview,
    }

}


pub struct Driver<S> {
    sources: S,
    registry: ZoneRegistry,
    config: Config,
    storage: Arc<dyn Storage>,
    tickets: AtomicU64,
    in_flight: AtomicUsize,
    state: watch::Sender<DriverState>,
    published: watch::Sender<Arc<Dashboard>>,
    journal: Mutex<AlertLog>,
    log: Logger,
}

struct InFlight<'a, S>(&'a Driver<S>);

impl<'a, S> Drop for InFlight<'a, S> {
    fn drop(&mut self) {
	if self.0.in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
	    self.0.state.send_replace(DriverState::Idle);
	}
    }
}

impl<S: Sources> Driver<S> {

    pub fn new(sources: S, registry: ZoneRegistry, config: Config, storage: Arc<dyn Storage>) -> Self {
	let empty = build_dashboard(&Inputs::default(), &registry, &config, Strategy::Predicted);
	let journal = AlertLog::restore(storage.as_ref());
	Driver {
	    sources, registry, storage,
	    log: logging::component("refresh").new(o!("policy" => config.parse_policy.to_string())),
	    config,
	    tickets: AtomicU64::new(0),
	    in_flight: AtomicUsize::new(0),
	    state: watch::channel(DriverState::Idle).0,
	    published: watch::channel(Arc::new(empty)).0,
	    journal: Mutex::new(journal),
	}
    }

    pub fn state(&self) -> DriverState {
	*self.state.borrow()
    }

    pub fn current(&self) -> Arc<Dashboard> {
	self.published.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<Dashboard>> {
	self.published.subscribe()
    }

    pub fn alert_log(&self) -> AlertLog {
	self.journal.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    async fn fetch(&self) -> Inputs {
	let (cases,persons,predictions,indicators) = tokio::join!(
	    self.sources.cases(), self.sources.persons(), self.sources.predictions(),
	    self.sources.indicators());
	Inputs {
	    cases: self.or_empty("cases", cases),
	    persons: self.or_empty("persons", persons),
	    predictions: self.or_empty("predictions", predictions),
	    indicators: self.or_empty("indicators", indicators),
	}
    }

    fn or_empty<T: Default>(&self, feed: &str, fetched: Result<T>) -> T {
	match fetched {
	    Ok(v) => v,
	    Err(Error::MissingData) => {
		debug!(self.log, "feed not configured"; "feed" => feed);
		T::default()
	    },
	    Err(err) => {
		warn!(self.log, "feed unavailable, using empty data"; "feed" => feed, "error" => %err);
		T::default()
	    },
	}
    }

    /// Runs one full cycle. The result is published only if no newer cycle has
    /// published first; `None` means it arrived stale and was dropped.
    pub async fn refresh(&self) -> Option<Arc<Dashboard>> {

	let ticket = self.tickets.fetch_add(1, Ordering::SeqCst) + 1;
	if self.in_flight.fetch_add(1, Ordering::SeqCst) == 0 {
	    self.state.send_replace(DriverState::Refreshing);
	}
	let _guard = InFlight(self);

	let inputs = self.fetch().await;
	let mut dashboard = build_dashboard(&inputs, &self.registry, &self.config, Strategy::Predicted);
	dashboard.generation = ticket;
	let dashboard = Arc::new(dashboard);

	let fresh = self.published.send_if_modified(|current| match ticket > current.generation {
	    true => { *current = dashboard.clone(); true },
	    false => false,
	});

	if !fresh {
	    debug!(self.log, "discarding stale refresh"; "generation" => ticket);
	    return None;
	}

	info!(self.log, "published dashboard"; "generation" => ticket,
	      "days" => dashboard.daily_totals.len(), "zones" => dashboard.zones.len());
	self.journal_alerts(&dashboard.alerts);
	Some(dashboard)

    }

    fn journal_alerts(&self, alerts: &[Alert]) {
	let mut journal = self.journal.lock().unwrap_or_else(|e| e.into_inner());
	let updated = std::mem::take(&mut *journal).record(alerts.iter().cloned(), Utc::now());
	if let Err(err) = updated.persist(self.storage.as_ref()) {
	    warn!(self.log, "cannot persist alert log"; "error" => %err);
	}
	*journal = updated;
    }

    /// Refreshes immediately, then every `refresh_interval` and on each
    /// trigger. A trigger during a refresh abandons it for a new one.
    pub fn start(self: &Arc<Self>) -> RefreshHandle {

	let driver = self.clone();
	let trigger = Arc::new(Notify::new());
	let notified = trigger.clone();
	let (stop,mut stopped) = oneshot::channel::<()>();
	let period = self.config.refresh_interval;

	let task = tokio::spawn(async move {
	    let mut ticks = tokio::time::interval(period);
	    ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
	    let mut pending = false;
	    loop {
		if !pending {
		    tokio::select! {
			_ = &mut stopped => break,
			_ = ticks.tick() => {},
			_ = notified.notified() => {},
		    }
		}
		pending = false;
		tokio::select! {
		    biased;
		    _ = &mut stopped => break,
		    _ = notified.notified() => {
			debug!(driver.log, "abandoning refresh for a newer trigger");
			pending = true;
		    },
		    _ = driver.refresh() => {},
		}
	    }
	    debug!(driver.log, "refresh loop stopped");
	});

	RefreshHandle { trigger, stop: Some(stop), task: Some(task) }

    }

}


/// Owner of a running refresh loop. Dropping it cancels the loop.
pub struct RefreshHandle {
    trigger: Arc<Notify>,
    stop: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl RefreshHandle {

    pub fn trigger(&self) {
	self.trigger.notify_one();
    }

    pub async fn stop(mut self) -> Result<()> {
	if let Some(stop) = self.stop.take() {
	    let _ = stop.send(());
	}
	match self.task.take() {
	    Some(task) => Ok(task.await?),
	    None => Ok(()),
	}
    }

}

impl Drop for RefreshHandle {
    fn drop(&mut self) {
	if let Some(task) = self.task.take() {
	    task.abort();
	}
    }
}
