//! Spatiotemporal outbreak detection.
//!
//! Records are binned into a fixed geographic grid; within each cell a
//! window of fixed duration slides over the time-ordered records, and any
//! window holding at least the threshold count becomes an outbreak.
//! After an emission the scan skips past every record the window consumed,
//! so one cluster yields one outbreak.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::config::DetectorConfig;
use crate::models::{Case, EntityId, Outbreak, OutbreakStatus, Sighting};
use crate::regions;

/// A located, timestamped event fed to the detector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    pub latitude: f64,
    pub longitude: f64,
    pub at: DateTime<Utc>,
}

impl From<&Case> for Observation {
    fn from(case: &Case) -> Self {
        Self {
            latitude: case.latitude,
            longitude: case.longitude,
            at: case.reported_on,
        }
    }
}

impl From<&Sighting> for Observation {
    fn from(sighting: &Sighting) -> Self {
        Self {
            latitude: sighting.latitude,
            longitude: sighting.longitude,
            at: sighting.observed_at,
        }
    }
}

/// Concatenate sightings and cases into one observation list.
pub fn observations(sightings: &[Sighting], cases: &[Case]) -> Vec<Observation> {
    sightings
        .iter()
        .map(Observation::from)
        .chain(cases.iter().map(Observation::from))
        .collect()
}

/// Detect outbreaks. Pure: no clock reads, no side effects.
///
/// Status is `Active` when the window reaches the newest input record and
/// `Resolved` otherwise. Non-finite coordinates are skipped.
pub fn detect_outbreaks(records: &[Observation], config: &DetectorConfig) -> Vec<Outbreak> {
    let cell_size = config.cell_size_deg;
    let window = config.window();
    let threshold = config.min_cases.max(1) as usize;

    let Some(newest) = records.iter().map(|record| record.at).max() else {
        return Vec::new();
    };

    let mut cells: BTreeMap<(i64, i64), Vec<&Observation>> = BTreeMap::new();
    for record in records {
        if !record.latitude.is_finite() || !record.longitude.is_finite() {
            continue;
        }
        let key = (
            (record.longitude / cell_size).floor() as i64,
            (record.latitude / cell_size).floor() as i64,
        );
        cells.entry(key).or_default().push(record);
    }

    let mut outbreaks = Vec::new();
    for ((cell_x, cell_y), mut cell) in cells {
        if cell.len() < threshold {
            continue;
        }
        // stable: equal timestamps keep input order
        cell.sort_by_key(|record| record.at);

        let mut index = 0;
        while index < cell.len() {
            let start = cell[index].at;
            let end = start + window;
            let windowed = &cell[index..];
            let count = windowed
                .iter()
                .take_while(|record| record.at <= end)
                .count();

            if count < threshold {
                index += 1;
                continue;
            }

            let members = &windowed[..count];
            let latitude = members.iter().map(|record| record.latitude).sum::<f64>() / count as f64;
            let longitude =
                members.iter().map(|record| record.longitude).sum::<f64>() / count as f64;
            let severity = (count / threshold).min(5) as u8;
            let status = if end >= newest {
                OutbreakStatus::Active
            } else {
                OutbreakStatus::Resolved
            };

            outbreaks.push(Outbreak {
                id: EntityId::from(format!(
                    "detected-{cell_x}_{cell_y}-{}",
                    start.timestamp_millis()
                )),
                latitude,
                longitude,
                start,
                end,
                case_count: u32::try_from(count).unwrap_or(u32::MAX),
                severity,
                status,
                colony_ref: None,
                region: Some(regions::nearest(latitude, longitude).name.to_string()),
            });

            index += count;
        }
    }

    outbreaks
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap()
    }

    fn observation(latitude: f64, longitude: f64, day: i64) -> Observation {
        Observation {
            latitude,
            longitude,
            at: base() + Duration::days(day),
        }
    }

    fn cluster(count: usize) -> Vec<Observation> {
        (0..count)
            .map(|index| {
                let offset = index as f64 * 0.015;
                observation(11.21 + offset, 75.71 + offset, index as i64 * 2)
            })
            .collect()
    }

    #[test]
    fn dense_cluster_is_detected() {
        let records = cluster(6);
        let outbreaks = detect_outbreaks(&records, &DetectorConfig::default());

        assert_eq!(outbreaks.len(), 1);
        let outbreak = &outbreaks[0];
        assert!(outbreak.case_count >= 5);
        assert!((11.21..=11.31).contains(&outbreak.latitude));
        assert!((75.71..=75.81).contains(&outbreak.longitude));
        assert_eq!(outbreak.start, base());
        assert_eq!(outbreak.end, base() + Duration::days(30));
        assert_eq!(outbreak.severity, 1);
        assert_eq!(outbreak.region.as_deref(), Some("Kozhikode"));
        assert_eq!(outbreak.status, OutbreakStatus::Active);
    }

    #[test]
    fn cluster_below_threshold_is_ignored() {
        let records = cluster(4);
        assert!(detect_outbreaks(&records, &DetectorConfig::default()).is_empty());
    }

    #[test]
    fn window_upper_bound_is_inclusive() {
        let mut records = cluster(4);
        records.push(observation(11.22, 75.72, 30));

        let outbreaks = detect_outbreaks(&records, &DetectorConfig::default());
        assert_eq!(outbreaks.len(), 1);
        assert_eq!(outbreaks[0].case_count, 5);
    }

    #[test]
    fn record_just_past_window_is_excluded() {
        let mut records = cluster(4);
        records.push(Observation {
            latitude: 11.22,
            longitude: 75.72,
            at: base() + Duration::days(30) + Duration::seconds(1),
        });

        assert!(detect_outbreaks(&records, &DetectorConfig::default()).is_empty());
    }

    #[test]
    fn records_in_different_cells_do_not_combine() {
        let mut records = cluster(3);
        records.push(observation(9.98, 76.28, 1));
        records.push(observation(9.99, 76.29, 2));

        assert!(detect_outbreaks(&records, &DetectorConfig::default()).is_empty());
    }

    #[test]
    fn skip_ahead_emits_one_outbreak_per_cluster() {
        let records: Vec<Observation> = (0..12)
            .map(|index| observation(11.3, 75.8, index))
            .collect();

        let outbreaks = detect_outbreaks(&records, &DetectorConfig::default());
        assert_eq!(outbreaks.len(), 1);
        assert_eq!(outbreaks[0].case_count, 12);
        assert_eq!(outbreaks[0].severity, 2);
    }

    #[test]
    fn separate_clusters_in_time_emit_separately() {
        let mut records: Vec<Observation> = (0..5).map(|day| observation(11.3, 75.8, day)).collect();
        records.extend((0..5).map(|day| observation(11.3, 75.8, 100 + day)));

        let outbreaks = detect_outbreaks(&records, &DetectorConfig::default());
        assert_eq!(outbreaks.len(), 2);
        assert_eq!(outbreaks[0].status, OutbreakStatus::Resolved);
        assert_eq!(outbreaks[1].status, OutbreakStatus::Active);
    }

    #[test]
    fn severity_is_capped_at_five() {
        let records: Vec<Observation> = (0..40).map(|_| observation(11.3, 75.8, 0)).collect();
        let outbreaks = detect_outbreaks(&records, &DetectorConfig::default());
        assert_eq!(outbreaks[0].severity, 5);
    }

    #[test]
    fn ids_are_stable_across_runs() {
        let records = cluster(6);
        let first = detect_outbreaks(&records, &DetectorConfig::default());
        let second = detect_outbreaks(&records, &DetectorConfig::default());
        assert_eq!(first[0].id, second[0].id);
    }

    #[test]
    fn unsorted_input_is_ordered_before_scanning() {
        let mut records = cluster(6);
        records.reverse();
        let outbreaks = detect_outbreaks(&records, &DetectorConfig::default());
        assert_eq!(outbreaks.len(), 1);
        assert_eq!(outbreaks[0].start, base());
    }

    #[test]
    fn custom_thresholds_are_respected() {
        let config = DetectorConfig {
            min_cases: 3,
            window_days: 7,
            ..DetectorConfig::default()
        };
        let records = vec![
            observation(11.3, 75.8, 0),
            observation(11.3, 75.8, 3),
            observation(11.3, 75.8, 7),
        ];
        assert_eq!(detect_outbreaks(&records, &config).len(), 1);
    }
}
