//! Directory scanning: find run summaries, read them and build a collection.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use fmrc_inventory::{CollectionBuilder, FmrcCollection, FmrcDefinition, RunSummary};
use serde::Serialize;
use tracing::{debug, info, info_span, warn};
use walkdir::WalkDir;

use crate::config::ScanConfig;

/// File-level counters; run-level ones live in the collection's stats.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanStats {
    pub files_found: usize,
    pub files_unreadable: usize,
}

/// Result of one scan.
#[derive(Debug)]
pub struct ScanResult {
    pub collection: FmrcCollection,
    pub stats: ScanStats,
}

/// Summary files under `dir` whose names end in one of `suffixes`, sorted
/// by path.
pub fn find_summaries(dir: &Path, suffixes: &[String]) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for entry in WalkDir::new(dir).follow_links(true) {
        let entry = entry.with_context(|| format!("Failed to walk {:?}", dir))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if suffixes.iter().any(|s| name.ends_with(s.as_str())) {
            paths.push(entry.into_path());
        }
    }
    paths.sort();
    Ok(paths)
}

/// Read one summary. YAML by extension, JSON otherwise.
pub fn read_summary(path: &Path) -> Result<RunSummary> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;
    let is_yaml = matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    );
    let summary: RunSummary = if is_yaml {
        serde_yaml::from_str(&content).with_context(|| format!("Invalid YAML summary {:?}", path))?
    } else {
        serde_json::from_str(&content).with_context(|| format!("Invalid JSON summary {:?}", path))?
    };
    Ok(summary.with_source(path.display().to_string()))
}

/// Load the definition named by `config`, if any.
pub fn load_definition(config: &ScanConfig) -> Result<Option<Arc<FmrcDefinition>>> {
    let Some(path) = &config.definition else {
        return Ok(None);
    };
    let definition = FmrcDefinition::read_xml(path)
        .with_context(|| format!("Failed to load definition {:?}", path))?;
    info!(
        path = %path.display(),
        variables = definition.variables().count(),
        run_sequences = definition.run_seqs().len(),
        "Loaded definition"
    );
    Ok(Some(Arc::new(definition)))
}

/// Suffixes to scan for: the definition's filter wins over the config.
pub fn effective_suffixes(config: &ScanConfig, definition: Option<&FmrcDefinition>) -> Vec<String> {
    match definition.and_then(FmrcDefinition::suffix_filter) {
        Some(filter) => vec![filter.to_string()],
        None => config.suffixes.clone(),
    }
}

/// Scan `config.data_dir` and build the collection.
///
/// Unreadable files and malformed summaries are logged and skipped; only a
/// missing directory or an unloadable definition fails the scan.
pub fn scan(config: &ScanConfig, definition: Option<Arc<FmrcDefinition>>) -> Result<ScanResult> {
    anyhow::ensure!(
        config.data_dir.is_dir(),
        "Data directory {:?} does not exist",
        config.data_dir
    );

    let suffixes = effective_suffixes(config, definition.as_deref());
    let paths = find_summaries(&config.data_dir, &suffixes)?;
    info!(
        dir = %config.data_dir.display(),
        suffixes = ?suffixes,
        files = paths.len(),
        "Scanning run summaries"
    );

    let span = info_span!(
        "fmrc_collection",
        collection = %config.name,
        dir = %config.data_dir.display()
    );
    let mut builder = CollectionBuilder::new(&config.name)
        .with_config(config.inventory.clone())
        .with_span(span);
    if let Some(definition) = definition {
        builder = builder.with_definition(definition);
    }

    let mut stats = ScanStats {
        files_found: paths.len(),
        ..ScanStats::default()
    };
    for path in &paths {
        match read_summary(path) {
            Ok(summary) => match builder.add_run(&summary) {
                Ok(outcome) => {
                    debug!(path = %path.display(), variables = outcome.variables_added, "Read summary");
                }
                Err(e) => {
                    // Already logged by the builder
                    let err = e.into_fmrc_error(summary.source_name());
                    debug!(error = %err, recoverable = err.is_recoverable(), "Rejected summary");
                }
            },
            Err(e) => {
                warn!(path = %path.display(), error = %format!("{:#}", e), "Skipping unreadable summary");
                stats.files_unreadable += 1;
            }
        }
    }

    let collection = builder.finish();
    info!(
        files = stats.files_found,
        unreadable = stats.files_unreadable,
        runs = collection.axes().run_times().len(),
        variables = collection.grids().len(),
        "Scan complete"
    );
    Ok(ScanResult { collection, stats })
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_utils::{
        daily_runs, definitions, run_time, scalar_run, schedules, summary_dir, write_summary_yaml,
    };

    fn config_for(dir: &Path) -> ScanConfig {
        ScanConfig::for_dir("test", dir)
    }

    #[test]
    fn test_find_summaries_recurses_and_filters() {
        let dir = summary_dir(&daily_runs(1, 2, &[0], schedules::SYNOPTIC, &["T"]));
        let nested = dir.path().join("2024").join("01");
        fs::create_dir_all(&nested).unwrap();
        write_summary_yaml(&nested, &scalar_run(run_time(3, 0), schedules::SYNOPTIC, &["T"]));
        fs::write(dir.path().join("notes.txt"), "ignore me").unwrap();

        let suffixes = vec![".json".to_string(), ".yaml".to_string()];
        let paths = find_summaries(dir.path(), &suffixes).unwrap();
        assert_eq!(paths.len(), 3);
        assert!(paths.windows(2).all(|w| w[0] < w[1]));

        let only_json = find_summaries(dir.path(), &[".json".to_string()]).unwrap();
        assert_eq!(only_json.len(), 2);
    }

    #[test]
    fn test_read_summary_records_source() {
        let run = scalar_run(run_time(1, 0), schedules::SYNOPTIC, &["T"]);
        let dir = tempfile::tempdir().unwrap();
        let path = write_summary_yaml(dir.path(), &run);
        let read = read_summary(&path).unwrap();
        assert_eq!(read.run_time, run.run_time);
        assert_eq!(read.source.as_deref(), Some(path.display().to_string().as_str()));
    }

    #[test]
    fn test_scan_skips_unreadable_and_malformed_files() {
        let dir = summary_dir(&daily_runs(1, 2, &[0], schedules::SYNOPTIC, &["T"]));
        fs::write(dir.path().join("broken.json"), "{ not json").unwrap();
        fs::write(
            dir.path().join("unordered.json"),
            r#"{"run_time": "2024-01-05T00:00:00Z", "offsets": [6.0, 0.0], "variables": [{"name": "T"}]}"#,
        )
        .unwrap();

        let result = scan(&config_for(dir.path()), None).unwrap();
        assert_eq!(result.stats.files_found, 4);
        assert_eq!(result.stats.files_unreadable, 1);
        assert_eq!(result.collection.stats().runs_added, 2);
        assert_eq!(result.collection.stats().runs_skipped, 1);
        assert_eq!(result.collection.axes().run_times().len(), 2);
    }

    #[test]
    fn test_scan_missing_dir_fails() {
        let config = config_for(Path::new("/nonexistent/fmrc/scan/dir"));
        assert!(scan(&config, None).is_err());
    }

    #[test]
    fn test_definition_suffix_filter_replaces_config_suffixes() {
        let definition = FmrcDefinition::from_xml_str(definitions::SIX_HOURLY_CYCLE).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let config = config_for(dir.path());
        assert_eq!(effective_suffixes(&config, Some(&definition)), vec![".json"]);
        assert_eq!(effective_suffixes(&config, None), config.suffixes);

        let run = scalar_run(run_time(1, 0), schedules::SYNOPTIC, &["P"]);
        write_summary_yaml(dir.path(), &run);
        let result = scan(&config, Some(Arc::new(definition))).unwrap();
        assert_eq!(result.stats.files_found, 0);
        assert!(result.collection.runs().is_empty());
        assert!(result.collection.grid("P").unwrap().is_definition_only());
    }

    #[test]
    fn test_load_definition_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("def.xml");
        fs::write(&path, definitions::SYNOPTIC_ALL_USE).unwrap();

        let mut config = config_for(dir.path());
        assert!(load_definition(&config).unwrap().is_none());
        config.definition = Some(path);
        let definition = load_definition(&config).unwrap().unwrap();
        assert!(definition.has_variable("T"));

        config.definition = Some(dir.path().join("missing.xml"));
        assert!(load_definition(&config).is_err());
    }
}
