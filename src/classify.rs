use serde::{Serialize,Deserialize};

use super::predictions::ZoneSummary;


/// Share of the population that must be infected before the local heuristic
/// calls an outbreak.
pub const ATTACK_RATE: f64 = 0.1;

const RADII: [(u64,u32); 6] = [(1000, 50), (500, 40), (200, 30), (100, 25), (50, 20), (20, 15)];
const MIN_RADIUS: u32 = 10;


#[derive(Serialize,Deserialize,Clone,Copy,Debug,PartialEq,Eq,Default)]
pub struct Status {
    pub outbreak: bool,
    pub epidemic: bool,
}

#[derive(Serialize,Deserialize,Clone,Copy,Debug,PartialEq,Eq)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    /// Use merged predictions, falling back to the heuristic per missing flag.
    Predicted,
    /// Ignore predictions, e.g. for a historical window they do not cover.
    LocalHeuristic,
}

/// The attack-rate test. With `require_population` set, a zone whose
/// population is unknown (0) is never an outbreak; by default any case in such
/// a zone counts as one.
#[derive(Serialize,Deserialize,Clone,Copy,Debug,PartialEq,Eq,Default)]
#[serde(rename_all = "camelCase")]
pub struct Heuristic {
    pub require_population: bool,
}

impl Heuristic {

    pub fn outbreak(&self, total_cases: i64, population: u64) -> bool {
	match (self.require_population, population) {
	    (true,0) => false,
	    _ => local_outbreak(total_cases, population),
	}
    }

}

/// Strictly ordered: a zone is shown at its single highest level.
#[derive(Serialize,Deserialize,Clone,Copy,Debug,PartialEq,Eq,PartialOrd,Ord,Hash)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Normal,
    Outbreak,
    Epidemic,
    Critical,
}

impl Severity {

    pub fn color(&self) -> &'static str {
	match self {
	    Severity::Critical => "#8B0000",
	    Severity::Epidemic => "#FF0000",
	    Severity::Outbreak => "#FFA500",
	    Severity::Normal => "#00FF00",
	}
    }

}

#[derive(Serialize,Clone,Debug,PartialEq)]
pub struct ZoneView {
    #[serde(flatten)]
    pub summary: ZoneSummary,
    pub status: Status,
    pub severity: Severity,
    pub color: &'static str,
    pub radius: u32,
}

#[derive(Serialize,Deserialize,Clone,Debug,PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HeatmapPoint {
    pub zone: String,
    pub lat: f64,
    pub long: f64,
    pub total_cases: i64,
    pub radius: u32,
    pub intensity: f64,
}


pub fn local_outbreak(total_cases: i64, population: u64) -> bool {
    total_cases as f64 > population as f64 * ATTACK_RATE
}


pub fn status(zone: &ZoneSummary, strategy: Strategy, heuristic: Heuristic) -> Status {
    let local = || heuristic.outbreak(zone.stats.total_cases, zone.population);
    match strategy {
	Strategy::Predicted => Status {
	    outbreak: zone.outbreak.unwrap_or_else(local),
	    epidemic: zone.epidemic.unwrap_or(false),
	},
	Strategy::LocalHeuristic => Status { outbreak: local(), epidemic: false },
    }
}


pub fn color_for(outbreak: bool, epidemic: bool) -> Severity {
    match (outbreak, epidemic) {
	(true,true) => Severity::Critical,
	(false,true) => Severity::Epidemic,
	(true,false) => Severity::Outbreak,
	(false,false) => Severity::Normal,
    }
}


/// Marker size in fixed steps so that both tiny and huge zones stay legible.
pub fn radius_for(magnitude: u64) -> u32 {
    RADII.iter().find(|(above,_)| magnitude > *above)
	.map_or(MIN_RADIUS, |(_,radius)| *radius)
}


pub fn classify(zones: &[ZoneSummary], strategy: Strategy, heuristic: Heuristic) -> Vec<ZoneView> {
    zones.iter().map(|zone| {
	let status = status(zone, strategy, heuristic);
	let severity = color_for(status.outbreak, status.epidemic);
	ZoneView {
	    summary: zone.clone(),
	    status,
	    severity,
	    color: severity.color(),
	    radius: radius_for(zone.population),
	}
    }).collect()
}


pub fn heatmap_points(zones: &[ZoneSummary]) -> Vec<HeatmapPoint> {
    let max = zones.iter().map(|z| z.stats.total_cases).max().unwrap_or(0).max(1);
    zones.iter().map(|zone| HeatmapPoint {
	zone: zone.stats.zone.clone(),
	lat: zone.lat,
	long: zone.long,
	total_cases: zone.stats.total_cases,
	radius: radius_for(zone.stats.total_cases.max(0) as u64),
	intensity: zone.stats.total_cases as f64 / max as f64,
    }).collect()
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::ZoneStats;

    fn zone(total_cases: i64, population: u64, outbreak: Option<bool>, epidemic: Option<bool>) -> ZoneSummary {
	ZoneSummary {
	    stats: ZoneStats { zone: "zone_1".to_string(), total_cases, max_cases: total_cases,
			       avg_cases: Some(total_cases), count: 1 },
	    lat: 28.6139, long: 77.2090, population, outbreak, epidemic,
	}
    }

    #[test]
    fn test_local_heuristic() {
	assert!(local_outbreak(150, 1000));
	assert!(!local_outbreak(100, 1000));
	assert!(local_outbreak(150, 0));
	assert!(!local_outbreak(0, 0));
	let status = status(&zone(150, 1000, Some(false), Some(true)), Strategy::LocalHeuristic,
			    Heuristic::default());
	assert_eq!(status, Status { outbreak: true, epidemic: false });
    }

    #[test]
    fn test_unknown_population() {
	let unknown = zone(150, 0, None, None);
	assert!(status(&unknown, Strategy::LocalHeuristic, Heuristic::default()).outbreak);
	assert!(status(&unknown, Strategy::Predicted, Heuristic::default()).outbreak);
	let guarded = Heuristic { require_population: true };
	assert!(!status(&unknown, Strategy::LocalHeuristic, guarded).outbreak);
	assert!(!status(&unknown, Strategy::Predicted, guarded).outbreak);
	assert!(status(&zone(150, 1000, None, None), Strategy::LocalHeuristic, guarded).outbreak);
    }

    #[test]
    fn test_predicted_flags_take_precedence() {
	let heuristic = Heuristic::default();
	assert_eq!(status(&zone(150, 1000, Some(false), Some(true)), Strategy::Predicted, heuristic),
		   Status { outbreak: false, epidemic: true });
	assert_eq!(status(&zone(150, 1000, None, None), Strategy::Predicted, heuristic),
		   Status { outbreak: true, epidemic: false });
	assert_eq!(status(&zone(5, 1000, None, None), Strategy::Predicted, heuristic), Status::default());
    }

    #[test]
    fn test_severity_precedence() {
	assert_eq!(color_for(true, true), Severity::Critical);
	assert_ne!(color_for(true, true), color_for(true, false));
	assert_eq!(color_for(false, true), Severity::Epidemic);
	assert_eq!(color_for(true, false), Severity::Outbreak);
	assert_eq!(color_for(false, false), Severity::Normal);
	assert!(Severity::Critical > Severity::Epidemic);
	assert!(Severity::Epidemic > Severity::Outbreak);
	assert!(Severity::Outbreak > Severity::Normal);
	assert_eq!(Severity::Critical.color(), "#8B0000");
    }

    #[test]
    fn test_radius_breakpoints() {
	let cases = [(5000, 50), (1001, 50), (1000, 40), (501, 40), (500, 30), (201, 30),
		     (200, 25), (101, 25), (100, 20), (51, 20), (50, 15), (21, 15), (20, 10), (0, 10)];
	for (magnitude,radius) in cases.iter() {
	    assert_eq!(radius_for(*magnitude), *radius, "magnitude {}", magnitude);
	}
    }

    #[test]
    fn test_classify_uses_population_radius() {
	let views = classify(&[zone(10, 600, Some(true), Some(true))], Strategy::Predicted,
			     Heuristic::default());
	assert_eq!(views[0].severity, Severity::Critical);
	assert_eq!(views[0].color, "#8B0000");
	assert_eq!(views[0].radius, 40);
	let json = serde_json::to_value(&views[0]).unwrap();
	assert_eq!(json["zone"], "zone_1");
	assert_eq!(json["severity"], "critical");
	assert_eq!(json["status"]["outbreak"], true);
    }

    #[test]
    fn test_heatmap_points() {
	let mut small = zone(30, 0, None, None);
	small.stats.zone = "zone_2".to_string();
	let points = heatmap_points(&[zone(120, 0, None, None), small]);
	assert_eq!(points[0].intensity, 1.0);
	assert_eq!(points[0].radius, 25);
	assert_eq!(points[1].intensity, 0.25);
	assert_eq!(points[1].radius, 15);
	assert!(heatmap_points(&[]).is_empty());
	assert_eq!(heatmap_points(&[zone(0, 0, None, None)])[0].intensity, 0.0);
    }

}
