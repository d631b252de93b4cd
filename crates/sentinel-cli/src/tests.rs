use std::path::Path;

use chrono::{TimeZone, Utc};
use clap::Parser;
use pretty_assertions::assert_eq;
use sentinel_core::cache::{CachedSnapshot, PersistedCache};
use sentinel_core::models::{Alert, AlertSeverity, EntityRecord, Outbreak};
use sentinel_core::store::EntityStore;
use sentinel_core::{detect_outbreaks, DetectorConfig, EntityId};
use tempfile::tempdir;

use crate::cli::{CacheAction, Cli, Commands, CompletionShell};
use crate::commands::cache::{run_cache_clear, CacheSummary};
use crate::commands::common::{
    format_outbreak_lines, format_relative_time, format_status_line, load_engine_config,
    parse_observations, resolve_detector_config,
};
use crate::commands::completions::render_completions;
use crate::commands::run::StartMode;
use crate::commands::seed::render_dataset;
use crate::error::CliError;

fn case_json(id: &str, latitude: f64, day: u32) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "latitude": latitude,
        "longitude": 75.78,
        "reported_on": format!("2024-05-{day:02}"),
        "severity": 3,
        "confirmed": true
    })
}

#[test]
fn format_relative_time_uses_seconds_for_recent_attempts() {
    assert_eq!(format_relative_time(10_000, 10_500), "just now");
    assert_eq!(format_relative_time(0, 42_000), "42s ago");
    assert_eq!(format_relative_time(0, 5 * 60_000), "5m ago");
    assert_eq!(format_relative_time(0, 3 * 3_600_000), "3h ago");
    assert_eq!(format_relative_time(0, 2 * 86_400_000), "2d ago");
}

#[test]
fn parse_observations_accepts_cases_and_sightings() {
    let raw = serde_json::json!([
        case_json("c-1", 11.2, 1),
        {
            "id": "s-1",
            "lat": 11.3,
            "lng": 75.8,
            "timestamp": "2024-05-02T06:00:00Z"
        },
        { "id": "junk" }
    ])
    .to_string();

    let (observations, skipped) = parse_observations(&raw).unwrap();
    assert_eq!(observations.len(), 2);
    assert_eq!(skipped, 1);
}

#[test]
fn parse_observations_rejects_non_array() {
    let error = parse_observations(r#"{"id": "c-1"}"#).unwrap_err();
    assert!(matches!(error, CliError::NotAnArray));
}

#[test]
fn detector_overrides_are_validated() {
    let config =
        resolve_detector_config(DetectorConfig::default(), Some(0.25), None, Some(3)).unwrap();
    assert_eq!(config.cell_size_deg, 0.25);
    assert_eq!(config.window_days, 30);
    assert_eq!(config.min_cases, 3);

    assert!(resolve_detector_config(DetectorConfig::default(), Some(-1.0), None, None).is_err());
    assert!(resolve_detector_config(DetectorConfig::default(), None, None, Some(0)).is_err());
}

#[test]
fn outbreak_lines_include_region_and_window() {
    let rows: Vec<serde_json::Value> = (1..=6).map(|day| case_json("c", 11.21, day)).collect();
    let (observations, _) = parse_observations(&serde_json::Value::Array(rows).to_string()).unwrap();
    let outbreaks: Vec<Outbreak> = detect_outbreaks(&observations, &DetectorConfig::default());

    let lines = format_outbreak_lines(&outbreaks);
    assert_eq!(lines.len(), 1);
    assert!(lines[0].contains("Kozhikode"));
    assert!(lines[0].contains("2024-05-01 to 2024-05-31"));
    assert!(lines[0].contains("6 records"));
    assert!(lines[0].ends_with("active"));
}

#[test]
fn status_line_reports_state_counts_and_unacked_alerts() {
    let store = EntityStore::new();
    let alert = Alert::new(AlertSeverity::Warning, "Suspected case in Wayanad", None);
    let alert_id: EntityId = alert.id.clone();
    store.append(EntityRecord::Alert(alert));
    store.append(EntityRecord::Alert(Alert::new(
        AlertSeverity::Info,
        "Bat sighting in Kannur",
        None,
    )));
    store.acknowledge_alert(&alert_id);
    store.set_offline_mode(true);

    let line = format_status_line(
        &store.snapshot(),
        Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap(),
    );
    assert!(line.starts_with("[offline]"));
    assert!(line.contains("alerts=2 (1 unacked)"));
    assert!(line.ends_with("last attempt never"));
}

#[test]
fn seeded_dataset_renders_every_bootstrap_collection() {
    let rendered = render_dataset(Some(11)).unwrap();
    let value: serde_json::Value = serde_json::from_str(&rendered).unwrap();
    for key in [
        "colonies",
        "sightings",
        "cases",
        "paths",
        "outbreaks",
        "weather_readings",
    ] {
        assert!(
            value[key].as_array().is_some_and(|items| !items.is_empty()),
            "{key} should be populated"
        );
    }
}

#[test]
fn cache_summary_counts_collections() {
    let dir = tempdir().unwrap();
    let cache = PersistedCache::in_dir(dir.path());
    let rendered = render_dataset(Some(5)).unwrap();
    let snapshot: CachedSnapshot = serde_json::from_str(&rendered).unwrap();
    cache.save(&snapshot).unwrap();

    let loaded = cache.load().unwrap().unwrap();
    let summary = CacheSummary::new(&cache, &loaded);
    assert_eq!(summary.colonies, snapshot.colonies.len());
    assert_eq!(summary.cases, snapshot.cases.len());
    assert!(!summary.offline_mode);
}

#[test]
fn cache_clear_removes_file() {
    let dir = tempdir().unwrap();
    let cache = PersistedCache::in_dir(dir.path());
    cache.save(&CachedSnapshot::default()).unwrap();

    run_cache_clear(&cache).unwrap();
    assert!(!cache.path().exists());
    run_cache_clear(&cache).unwrap();
}

#[test]
fn cache_path_flag_overrides_config() {
    let dir = tempdir().unwrap();
    let config_path = dir.path().join("engine.json");
    std::fs::write(&config_path, r#"{ "cache_path": "/tmp/from-config.json" }"#).unwrap();

    let from_config = load_engine_config(Some(&config_path), None).unwrap();
    assert_eq!(
        from_config.cache_path.as_deref(),
        Some(Path::new("/tmp/from-config.json"))
    );

    let overridden =
        load_engine_config(Some(&config_path), Some(dir.path().join("flag.json"))).unwrap();
    assert_eq!(overridden.cache_path, Some(dir.path().join("flag.json")));
}

#[test]
fn cli_parses_detect_overrides() {
    let cli = Cli::try_parse_from([
        "sentinel",
        "detect",
        "cases.json",
        "--json",
        "--min-cases",
        "3",
    ])
    .unwrap();
    match cli.command {
        Commands::Detect {
            file,
            json,
            min_cases,
            cell_size,
            ..
        } => {
            assert_eq!(file, Path::new("cases.json"));
            assert!(json);
            assert_eq!(min_cases, Some(3));
            assert_eq!(cell_size, None);
        }
        _ => panic!("expected detect command"),
    }
}

#[test]
fn cli_parses_cache_subcommands() {
    let cli = Cli::try_parse_from(["sentinel", "--cache-path", "/tmp/c.json", "cache", "clear"])
        .unwrap();
    assert!(matches!(
        cli.command,
        Commands::Cache {
            action: CacheAction::Clear
        }
    ));
    assert_eq!(cli.cache_path.as_deref(), Some(Path::new("/tmp/c.json")));
}

#[test]
fn completions_mention_binary_name() {
    let script = String::from_utf8(render_completions(CompletionShell::Bash)).unwrap();
    assert!(script.contains("sentinel"));
}

#[test]
fn run_mode_flags_map_to_start_mode() {
    let cli = Cli::try_parse_from(["sentinel", "run", "--online"]).unwrap();
    match cli.command {
        Commands::Run {
            offline, online, ..
        } => assert_eq!(StartMode::from_flags(offline, online), StartMode::Online),
        _ => panic!("expected run command"),
    }
    assert_eq!(StartMode::from_flags(false, false), StartMode::Restore);
    assert_eq!(StartMode::from_flags(true, false), StartMode::Offline);
}

#[test]
fn run_rejects_offline_with_online() {
    assert!(Cli::try_parse_from(["sentinel", "run", "--offline", "--online"]).is_err());
}
