use lazy_static::lazy_static;
use serde::{Serialize,Deserialize};


#[derive(Serialize,Deserialize,Clone,Copy,Debug,PartialEq,Default)]
pub struct Coordinates {
    pub lat: f64,
    pub long: f64,
}

#[derive(Serialize,Deserialize,Clone,Debug,PartialEq)]
pub struct Zone {
    pub id: String,
    #[serde(flatten)]
    pub coordinates: Coordinates,
}

/// Static zone reference data, kept in registration order.
#[derive(Clone,Debug,Default)]
pub struct ZoneRegistry {
    zones: Vec<Zone>,
}

lazy_static! {
    pub static ref ZONES: ZoneRegistry = ZoneRegistry::new(vec![
	("zone_1", 28.6139, 77.2090),
	("zone_2", 19.0760, 72.8777),
	("zone_3", 22.5726, 88.3639),
	("zone_4", 23.0225, 72.5714),
	("zone_5", 17.3850, 78.4867),
	("zone_6", 12.9716, 77.5946),
	("zone_7", 25.5941, 85.1376),
	("zone_8", 21.2514, 81.6296),
	("zone_9", 26.9124, 75.7873),
	("zone_10", 15.9129, 79.7400),
    ]);
}

impl ZoneRegistry {

    pub fn new<S: ToString>(zones: Vec<(S,f64,f64)>) -> Self {
	let mut registry = ZoneRegistry::default();
	for (id,lat,long) in zones {
	    registry.register(id.to_string(), Coordinates { lat, long });
	}
	registry
    }

    /// Registering a known id again keeps the first entry.
    pub fn register(&mut self, id: String, coordinates: Coordinates) {
	if !self.contains(&id) {
	    self.zones.push(Zone { id, coordinates });
	}
    }

    pub fn contains(&self, id: &str) -> bool {
	self.zones.iter().any(|z| z.id == id)
    }

    pub fn zones(&self) -> &[Zone] {
	&self.zones
    }

    pub fn coordinates_for(&self, id: &str) -> Coordinates {
	self.zones.iter().find(|z| z.id == id)
	    .map_or(Coordinates::default(), |z| z.coordinates)
    }

    /// Plain euclidean distance in lat/long space; the first registered zone
    /// wins a tie.
    pub fn nearest_zone(&self, lat: f64, long: f64) -> Option<&str> {
	self.zones.iter().fold(None, |best: Option<(&Zone,f64)>, zone| {
	    let dist = ((zone.coordinates.lat - lat).powi(2)
			+ (zone.coordinates.long - long).powi(2)).sqrt();
	    match best {
		Some((_,min)) if min <= dist => best,
		_ => Some((zone, dist)),
	    }
	}).map(|(zone,_)| zone.id.as_str())
    }

}
