//! Helpers that lay out run summaries on disk.

use std::fs;
use std::path::{Path, PathBuf};

use fmrc_inventory::RunSummary;
use tempfile::TempDir;

/// File stem for a summary, e.g. `run_2024010112`.
pub fn summary_stem(summary: &RunSummary) -> String {
    format!("run_{}", summary.run_time.format("%Y%m%d%H"))
}

/// Write `summary` as JSON into `dir` and return the path.
pub fn write_summary_json(dir: &Path, summary: &RunSummary) -> PathBuf {
    let path = dir.join(format!("{}.json", summary_stem(summary)));
    let json = serde_json::to_string_pretty(summary).expect("summary serializes");
    fs::write(&path, json).expect("write summary");
    path
}

/// Write `summary` as YAML into `dir` and return the path.
pub fn write_summary_yaml(dir: &Path, summary: &RunSummary) -> PathBuf {
    let path = dir.join(format!("{}.yaml", summary_stem(summary)));
    let yaml = serde_yaml::to_string(summary).expect("summary serializes");
    fs::write(&path, yaml).expect("write summary");
    path
}

/// A temporary directory holding `summaries` as JSON files.
pub fn summary_dir(summaries: &[RunSummary]) -> TempDir {
    let dir = TempDir::new().expect("create temp dir");
    for summary in summaries {
        write_summary_json(dir.path(), summary);
    }
    dir
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{run_time, scalar_run};

    #[test]
    fn test_summary_dir_writes_one_file_per_run() {
        let runs = vec![
            scalar_run(run_time(1, 0), &[0.0], &["T"]),
            scalar_run(run_time(1, 12), &[0.0], &["T"]),
        ];
        let dir = summary_dir(&runs);
        assert!(dir.path().join("run_2024010100.json").exists());
        assert!(dir.path().join("run_2024010112.json").exists());
    }

    #[test]
    fn test_yaml_summary_reads_back() {
        let dir = TempDir::new().unwrap();
        let run = scalar_run(run_time(3, 6), &[0.0, 3.0], &["P"]);
        let path = write_summary_yaml(dir.path(), &run);
        let back: RunSummary = serde_yaml::from_str(&fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(back, run);
    }
}
