pub mod error;
pub mod logging;
pub mod config;
pub mod zones;
pub mod records;
pub mod aggregate;
pub mod predictions;
pub mod classify;
pub mod indicators;
pub mod journal;
pub mod sources;
pub mod synthetic;
pub mod refresh;

pub use error::{Result,Error};
pub use config::Config;
pub use zones::{ZoneRegistry,ZONES};
pub use records::{EventRecord,ParsePolicy};
pub use classify::{Heuristic,Strategy};
pub use indicators::{Indicators,StatCard};
pub use refresh::{build_dashboard,Dashboard,Driver,DriverState,Inputs,RefreshHandle};
pub use sources::{HttpSources,Sources};
pub use synthetic::SyntheticSources;
pub use journal::{AlertLog,MemoryStorage,Storage};
