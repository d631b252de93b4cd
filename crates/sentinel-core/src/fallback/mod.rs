//! Synthetic data generator.
//!
//! Produces plausible, internally consistent records when the backend is
//! unreachable: colonies cluster around region centroids, sightings attach to
//! colonies, cases lean toward high-risk regions, and weather follows the
//! regional climate band and monsoon calendar. The same generator feeds the
//! trickle of "live" updates shown while offline.

use std::time::Duration;

use chrono::{DateTime, Datelike, Duration as ChronoDuration, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::Serialize;

use crate::models::{
    Case, Colony, EntityCollection, EntityId, EntityKind, EntityRecord, MovementPath, Outbreak,
    OutbreakStatus, RiskTier, Sighting, WeatherReading,
};
use crate::regions::{self, Region, REGIONS};
use crate::store::EntityStore;

const COLONY_COUNT: usize = 24;
const SIGHTING_COUNT: usize = 80;
const CASE_COUNT: usize = 40;
const PATH_COUNT: usize = 18;
const OUTBREAK_COUNT: usize = 6;

const SIGHTING_ON_COLONY_PROBABILITY: f64 = 0.7;
const CASE_HIGH_RISK_PROBABILITY: f64 = 0.7;
const OUTBREAK_HIGH_RISK_PROBABILITY: f64 = 0.8;
const OUTBREAK_NEAR_COLONY_PROBABILITY: f64 = 0.6;

const TRICKLE_SIGHTING_PROBABILITY: f64 = 0.3;
const TRICKLE_CASE_PROBABILITY: f64 = 0.1;
const TRICKLE_WEATHER_PROBABILITY: f64 = 0.5;

const COLONY_JITTER_DEG: f64 = 0.25;
const SIGHTING_JITTER_DEG: f64 = 0.02;
const REGION_JITTER_DEG: f64 = 0.2;
const HISTORY_DAYS: i64 = 90;
const OUTBREAK_WINDOW_DAYS: i64 = 30;

/// A full synthetic dataset.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FallbackDataset {
    pub colonies: Vec<Colony>,
    pub sightings: Vec<Sighting>,
    pub cases: Vec<Case>,
    pub paths: Vec<MovementPath>,
    pub outbreaks: Vec<Outbreak>,
    pub weather_readings: Vec<WeatherReading>,
}

impl FallbackDataset {
    /// Split into store collections, one per bootstrap kind.
    pub fn into_collections(self) -> Vec<EntityCollection> {
        vec![
            EntityCollection::Colonies(self.colonies),
            EntityCollection::Sightings(self.sightings),
            EntityCollection::Cases(self.cases),
            EntityCollection::MovementPaths(self.paths),
            EntityCollection::Outbreaks(self.outbreaks),
            EntityCollection::WeatherReadings(self.weather_readings),
        ]
    }
}

/// Randomized generator with an injectable random source.
pub struct FallbackGenerator {
    rng: StdRng,
}

impl Default for FallbackGenerator {
    fn default() -> Self {
        Self::from_entropy()
    }
}

impl FallbackGenerator {
    pub fn from_entropy() -> Self {
        Self::from_rng(StdRng::from_entropy())
    }

    /// Deterministic generator for tests and reproducible demos.
    pub fn seeded(seed: u64) -> Self {
        Self::from_rng(StdRng::seed_from_u64(seed))
    }

    pub const fn from_rng(rng: StdRng) -> Self {
        Self { rng }
    }

    /// Generate a complete dataset anchored at `now`.
    pub fn dataset(&mut self, now: DateTime<Utc>) -> FallbackDataset {
        let colonies = self.colonies(COLONY_COUNT, now);
        let sightings = self.sightings(SIGHTING_COUNT, &colonies, now);
        let cases = self.cases(CASE_COUNT, now);
        let paths = self.paths(PATH_COUNT, &colonies, now);
        let outbreaks = self.outbreaks(OUTBREAK_COUNT, &colonies, now);
        let weather_readings = self.weather_readings(now);
        FallbackDataset {
            colonies,
            sightings,
            cases,
            paths,
            outbreaks,
            weather_readings,
        }
    }

    /// Colonies at small offsets around random region centroids.
    pub fn colonies(&mut self, count: usize, now: DateTime<Utc>) -> Vec<Colony> {
        (0..count)
            .map(|index| {
                let region = self.any_region();
                self.colony_in(region, index, now)
            })
            .collect()
    }

    /// A colony near a region centroid; risk comes from the region table,
    /// or is drawn uniformly when the region has no fixed tier.
    pub fn colony_in(&mut self, region: &Region, index: usize, now: DateTime<Utc>) -> Colony {
        let (latitude, longitude) = self.jitter(region, COLONY_JITTER_DEG);
        let risk = region.risk.unwrap_or_else(|| self.random_risk());
        let last_active = if self.rng.gen_bool(0.8) {
            Some(now - ChronoDuration::hours(self.rng.gen_range(1..72)))
        } else {
            None
        };
        Colony {
            id: EntityId::generate("colony"),
            colony_ref: format!("COL-{:03}", index + 1),
            latitude,
            longitude,
            surveyed_on: self.past(now, HISTORY_DAYS * 4),
            population: self.rng.gen_range(50..2000),
            risk,
            last_active,
        }
    }

    /// Sightings, most attached to (and jittered around) an existing colony.
    pub fn sightings(
        &mut self,
        count: usize,
        colonies: &[Colony],
        now: DateTime<Utc>,
    ) -> Vec<Sighting> {
        let mut sightings: Vec<Sighting> = (0..count)
            .map(|_| {
                let observed_at = self.past(now, HISTORY_DAYS);
                self.sighting_at(colonies, observed_at)
            })
            .collect();
        sightings.sort_by(|left, right| right.observed_at.cmp(&left.observed_at));
        sightings
    }

    /// Cases weighted toward high-risk regions.
    pub fn cases(&mut self, count: usize, now: DateTime<Utc>) -> Vec<Case> {
        let mut cases: Vec<Case> = (0..count)
            .map(|_| {
                let reported_on = self.past(now, HISTORY_DAYS);
                self.case_at(reported_on)
            })
            .collect();
        cases.sort_by(|left, right| right.reported_on.cmp(&left.reported_on));
        cases
    }

    /// Paths between two distinct colonies; a self-path only when fewer than
    /// two colonies exist, and none when there are no colonies at all.
    pub fn paths(
        &mut self,
        count: usize,
        colonies: &[Colony],
        now: DateTime<Utc>,
    ) -> Vec<MovementPath> {
        if colonies.is_empty() {
            return Vec::new();
        }

        (0..count)
            .map(|_| {
                let (from, to) = if colonies.len() < 2 {
                    (&colonies[0], &colonies[0])
                } else {
                    let mut pair = colonies.choose_multiple(&mut self.rng, 2);
                    match (pair.next(), pair.next()) {
                        (Some(from), Some(to)) => (from, to),
                        _ => (&colonies[0], &colonies[1]),
                    }
                };
                MovementPath {
                    id: EntityId::generate("path"),
                    from_colony: from.colony_ref.clone(),
                    to_colony: to.colony_ref.clone(),
                    intensity: self.rng.gen_range(0.1..1.0),
                    active: self.rng.gen_bool(0.7),
                    observed_on: self.past(now, HISTORY_DAYS),
                }
            })
            .collect()
    }

    /// Outbreaks biased toward high-risk regions and toward their colonies.
    pub fn outbreaks(
        &mut self,
        count: usize,
        colonies: &[Colony],
        now: DateTime<Utc>,
    ) -> Vec<Outbreak> {
        (0..count)
            .map(|_| {
                let region = if self.rng.gen_bool(OUTBREAK_HIGH_RISK_PROBABILITY) {
                    self.high_risk_region()
                } else {
                    self.any_region()
                };

                let nearby: Vec<&Colony> = colonies
                    .iter()
                    .filter(|colony| {
                        regions::nearest(colony.latitude, colony.longitude).name == region.name
                    })
                    .collect();
                let anchor = if self.rng.gen_bool(OUTBREAK_NEAR_COLONY_PROBABILITY) {
                    nearby.choose(&mut self.rng).copied()
                } else {
                    None
                };

                let (latitude, longitude) = match anchor {
                    Some(colony) => (
                        colony.latitude + self.offset(SIGHTING_JITTER_DEG * 2.0),
                        colony.longitude + self.offset(SIGHTING_JITTER_DEG * 2.0),
                    ),
                    None => self.jitter(region, REGION_JITTER_DEG),
                };

                let start = self.past(now, HISTORY_DAYS);
                let end = start + ChronoDuration::days(OUTBREAK_WINDOW_DAYS);
                let status = if end >= now {
                    OutbreakStatus::Active
                } else if self.rng.gen_bool(0.5) {
                    OutbreakStatus::Contained
                } else {
                    OutbreakStatus::Resolved
                };

                Outbreak {
                    id: EntityId::generate("outbreak"),
                    latitude,
                    longitude,
                    start,
                    end,
                    case_count: self.rng.gen_range(5..40),
                    severity: self.rng.gen_range(1..=5),
                    status,
                    colony_ref: anchor.map(|colony| colony.colony_ref.clone()),
                    region: Some(region.name.to_string()),
                }
            })
            .collect()
    }

    /// One reading per region for the current moment.
    pub fn weather_readings(&mut self, now: DateTime<Utc>) -> Vec<WeatherReading> {
        REGIONS
            .iter()
            .map(|region| self.weather_for(region, now))
            .collect()
    }

    /// A seasonal reading for one region.
    ///
    /// Northern districts run slightly cooler and wetter; June through
    /// November is the wet season.
    pub fn weather_for(&mut self, region: &Region, at: DateTime<Utc>) -> WeatherReading {
        let wet_season = is_wet_season(at.month());
        let northern = region.is_northern();

        let base_temperature: f64 = match (northern, wet_season) {
            (true, true) => 25.5,
            (true, false) => 28.5,
            (false, true) => 26.5,
            (false, false) => 30.0,
        };
        let (humidity_base, rainfall_range): (f64, _) = if wet_season {
            (if northern { 88.0 } else { 84.0 }, 8.0..45.0)
        } else {
            (if northern { 68.0 } else { 64.0 }, 0.0..6.0)
        };

        WeatherReading {
            region: region.name.to_string(),
            temperature_c: round1(base_temperature + self.rng.gen_range(-2.5..2.5)),
            humidity_pct: round1((humidity_base + self.rng.gen_range(-8.0..8.0)).clamp(0.0, 100.0)),
            rainfall_mm: round1(self.rng.gen_range(rainfall_range)),
            wind_speed_kmh: round1(self.rng.gen_range(5.0..25.0)),
            recorded_at: at,
        }
    }

    /// A low-probability batch of new live records.
    ///
    /// Often empty; at most one sighting, one case, and one weather reading.
    pub fn trickle(&mut self, colonies: &[Colony], now: DateTime<Utc>) -> Vec<EntityRecord> {
        let mut records = Vec::new();
        if self.rng.gen_bool(TRICKLE_SIGHTING_PROBABILITY) {
            records.push(EntityRecord::Sighting(self.sighting_at(colonies, now)));
        }
        if self.rng.gen_bool(TRICKLE_CASE_PROBABILITY) {
            records.push(EntityRecord::Case(self.case_at(now)));
        }
        if self.rng.gen_bool(TRICKLE_WEATHER_PROBABILITY) {
            let region = self.any_region();
            records.push(EntityRecord::WeatherReading(self.weather_for(region, now)));
        }
        records
    }

    /// Random delay in `[min, max]` before the next trickle.
    pub fn next_delay(&mut self, min: Duration, max: Duration) -> Duration {
        if max <= min {
            return min;
        }
        self.rng.gen_range(min..=max)
    }

    /// Fill every empty bootstrap collection with synthetic data.
    ///
    /// Collections that already hold records (from cache or a partial
    /// bootstrap) are left alone. Returns the kinds that were seeded.
    pub fn seed_missing(&mut self, store: &EntityStore, now: DateTime<Utc>) -> Vec<EntityKind> {
        let snapshot = store.snapshot();
        let dataset = self.dataset(now);
        let mut seeded = Vec::new();

        for collection in dataset.into_collections() {
            let kind = collection.kind();
            if snapshot.count(kind) == 0 {
                store.replace(collection);
                seeded.push(kind);
            }
        }

        if !seeded.is_empty() {
            tracing::info!("Seeded synthetic data for {:?}", seeded);
        }
        seeded
    }

    fn sighting_at(&mut self, colonies: &[Colony], observed_at: DateTime<Utc>) -> Sighting {
        let colony = if self.rng.gen_bool(SIGHTING_ON_COLONY_PROBABILITY) {
            colonies.choose(&mut self.rng)
        } else {
            None
        };

        let (latitude, longitude, colony_ref, region) = match colony {
            Some(colony) => (
                colony.latitude + self.offset(SIGHTING_JITTER_DEG),
                colony.longitude + self.offset(SIGHTING_JITTER_DEG),
                Some(colony.colony_ref.clone()),
                regions::nearest(colony.latitude, colony.longitude).name,
            ),
            None => {
                let region = self.any_region();
                let (latitude, longitude) = self.jitter(region, REGION_JITTER_DEG);
                (latitude, longitude, None, region.name)
            }
        };

        Sighting {
            id: EntityId::generate("sighting"),
            colony_ref,
            latitude,
            longitude,
            observed_at,
            population: Some(self.rng.gen_range(5..400)),
            region: Some(region.to_string()),
        }
    }

    fn case_at(&mut self, reported_on: DateTime<Utc>) -> Case {
        let region = if self.rng.gen_bool(CASE_HIGH_RISK_PROBABILITY) {
            self.high_risk_region()
        } else {
            self.any_region()
        };
        let (latitude, longitude) = self.jitter(region, REGION_JITTER_DEG);
        Case {
            id: EntityId::generate("case"),
            latitude,
            longitude,
            reported_on,
            severity: self.rng.gen_range(1..=5),
            confirmed: self.rng.gen_bool(0.75),
            region: Some(region.name.to_string()),
        }
    }

    fn any_region(&mut self) -> &'static Region {
        REGIONS.choose(&mut self.rng).unwrap_or(&REGIONS[0])
    }

    fn high_risk_region(&mut self) -> &'static Region {
        let candidates: Vec<&'static Region> = regions::high_risk().collect();
        match candidates.choose(&mut self.rng) {
            Some(region) => *region,
            None => self.any_region(),
        }
    }

    fn random_risk(&mut self) -> RiskTier {
        *[RiskTier::Low, RiskTier::Moderate, RiskTier::High]
            .choose(&mut self.rng)
            .unwrap_or(&RiskTier::Low)
    }

    fn jitter(&mut self, region: &Region, spread: f64) -> (f64, f64) {
        (
            region.latitude + self.offset(spread),
            region.longitude + self.offset(spread),
        )
    }

    fn offset(&mut self, spread: f64) -> f64 {
        self.rng.gen_range(-spread..=spread)
    }

    fn past(&mut self, now: DateTime<Utc>, max_days: i64) -> DateTime<Utc> {
        now - ChronoDuration::minutes(self.rng.gen_range(0..max_days * 24 * 60))
    }
}

const fn is_wet_season(month: u32) -> bool {
    matches!(month, 6..=11)
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
