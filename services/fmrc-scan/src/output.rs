//! Rendering reports for the terminal or a file.

use std::fmt::Write as _;
use std::fs;
use std::io::Write as _;
use std::path::Path;

use anyhow::{Context, Result};
use fmrc_common::{format_run_time, ValidTime};
use fmrc_inventory::{
    CellSummary, CollectionReport, Completeness, MatrixReport, OffsetHourReport, RunExpected,
    VariableReport,
};
use serde::Serialize;

use crate::scan::ScanStats;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Json,
    Yaml,
    Text,
}

impl Format {
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "yaml" | "yml" => Ok(Self::Yaml),
            "text" => Ok(Self::Text),
            other => anyhow::bail!("Unsupported output format: {}", other),
        }
    }
}

/// A collection report with the scanner's file counters alongside.
#[derive(Debug, Serialize)]
struct ScanReport<'a> {
    scan: &'a ScanStats,
    #[serde(flatten)]
    report: &'a CollectionReport,
}

fn serialize<T: Serialize>(value: &T, format: Format) -> Result<Option<String>> {
    match format {
        Format::Json => Ok(Some(
            serde_json::to_string_pretty(value).context("Failed to serialize report as JSON")?,
        )),
        Format::Yaml => Ok(Some(
            serde_yaml::to_string(value).context("Failed to serialize report as YAML")?,
        )),
        Format::Text => Ok(None),
    }
}

pub fn render_collection(
    report: &CollectionReport,
    stats: &ScanStats,
    format: Format,
) -> Result<String> {
    if let Some(out) = serialize(&ScanReport { scan: stats, report }, format)? {
        return Ok(out);
    }

    let mut out = String::new();
    writeln!(out, "Collection {}", report.name)?;
    writeln!(
        out,
        "  files: {} found, {} unreadable; runs: {} added, {} skipped",
        stats.files_found, stats.files_unreadable, report.stats.runs_added, report.stats.runs_skipped
    )?;
    if report.has_definition {
        writeln!(
            out,
            "  variables skipped: {}; definition-only: {}",
            report.stats.variables_skipped, report.stats.definition_only_variables
        )?;
    }
    writeln!(out)?;
    for var in &report.variables {
        writeln!(
            out,
            "  {:<16} {:<10} {:<12} {}",
            var.name,
            var.run_seq,
            var.vert_coord.as_deref().unwrap_or("-"),
            cell_text(&var.total)
        )?;
    }
    writeln!(out)?;
    out.push_str(&matrix_table(&report.matrix)?);
    Ok(out)
}

pub fn render_variable(report: &VariableReport, format: Format) -> Result<String> {
    if let Some(out) = serialize(report, format)? {
        return Ok(out);
    }

    let mut out = String::new();
    writeln!(out, "Variable {} ({})", report.name, report.run_seq)?;
    if let Some(vc) = &report.vert_coord {
        let levels: Vec<String> = report.levels.iter().map(|l| l.to_string()).collect();
        writeln!(out, "  {}: {}", vc, levels.join(" "))?;
    }
    if report.definition_only {
        writeln!(out, "  in definition, never produced")?;
    } else if !report.in_definition {
        writeln!(out, "  not in definition")?;
    }
    writeln!(out)?;
    out.push_str(&matrix_table(&report.matrix)?);
    Ok(out)
}

pub fn render_offset_hour(report: &OffsetHourReport, format: Format) -> Result<String> {
    Ok(serialize(report, format)?.unwrap_or_else(|| report.to_string()))
}

/// One variable's inventory for one run, offset by offset.
#[derive(Debug, Serialize)]
pub struct RunInventory {
    pub variable: String,
    pub run_time: String,
    pub offsets: Vec<OffsetInventory>,
    pub total: CellSummary,
}

#[derive(Debug, Serialize)]
pub struct OffsetInventory {
    pub offset_hour: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid_time: Option<String>,
    #[serde(flatten)]
    pub cell: CellSummary,
}

impl RunInventory {
    pub fn new(variable: &str, entry: &RunExpected) -> Self {
        let mut offsets = entry.offsets();
        offsets.sort_by(f64::total_cmp);
        let offsets = offsets
            .into_iter()
            .map(|h| OffsetInventory {
                offset_hour: h,
                valid_time: ValidTime::new(entry.run_time(), h)
                    .valid_datetime()
                    .map(format_run_time),
                cell: CellSummary::new(Completeness::new(
                    entry.count_inventory(h),
                    entry.count_expected(h),
                )),
            })
            .collect();
        Self {
            variable: variable.to_string(),
            run_time: format_run_time(entry.run_time()),
            offsets,
            total: CellSummary::new(entry.completeness()),
        }
    }
}

pub fn render_run_inventory(inventory: &RunInventory, format: Format) -> Result<String> {
    if let Some(out) = serialize(inventory, format)? {
        return Ok(out);
    }

    let mut out = String::new();
    writeln!(out, "Inventory of {} for run {}", inventory.variable, inventory.run_time)?;
    for entry in &inventory.offsets {
        writeln!(
            out,
            "  {:>8}  {}  {}",
            format!("+{}h", entry.offset_hour),
            entry.valid_time.as_deref().unwrap_or("-"),
            cell_text(&entry.cell)
        )?;
    }
    writeln!(out, "  {:>8}  {:<17}  {}", "total", "", cell_text(&inventory.total))?;
    Ok(out)
}

/// Runs down, offset hours across.
fn matrix_table(matrix: &MatrixReport) -> Result<String> {
    let mut out = String::new();
    write!(out, "{:<18}", "run")?;
    for offset in &matrix.offsets {
        write!(out, " {:>9}", offset)?;
    }
    writeln!(out, " {:>12}", "total")?;
    for row in &matrix.by_run {
        write!(out, "{:<18}", row.run_time)?;
        for cell in &row.cells {
            write!(out, " {:>9}", cell.count.as_deref().unwrap_or("-"))?;
        }
        writeln!(out, " {:>12}", cell_text(&row.total))?;
    }
    writeln!(out, "{:<18} {}", "total", cell_text(&matrix.total))?;
    Ok(out)
}

fn cell_text(cell: &CellSummary) -> String {
    match (&cell.count, cell.percent) {
        (None, _) => "-".to_string(),
        (Some(count), Some(percent)) if percent < 100 => format!("{} ({}%)", count, percent),
        (Some(count), _) => count.clone(),
    }
}

/// Write to `path`, or stdout when `None`.
pub fn write_output(content: &str, path: Option<&Path>) -> Result<()> {
    match path {
        Some(path) => {
            fs::write(path, content).with_context(|| format!("Failed to write {:?}", path))
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(content.as_bytes())?;
            if !content.ends_with('\n') {
                stdout.write_all(b"\n")?;
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fmrc_inventory::CollectionBuilder;
    use test_utils::{daily_runs, schedules, with_missing};

    fn report() -> CollectionReport {
        let mut runs = daily_runs(1, 2, &[0], schedules::SYNOPTIC, &["T"]);
        runs[1] = with_missing(runs[1].clone(), "T", 2, 0);
        let mut builder = CollectionBuilder::new("test");
        builder.add_runs(&runs);
        builder.finish().report()
    }

    #[test]
    fn test_format_parse() {
        assert_eq!(Format::parse("JSON").unwrap(), Format::Json);
        assert_eq!(Format::parse("yml").unwrap(), Format::Yaml);
        assert!(Format::parse("csv").is_err());
    }

    #[test]
    fn test_json_includes_scan_counters() {
        let stats = ScanStats {
            files_found: 3,
            files_unreadable: 1,
        };
        let json = render_collection(&report(), &stats, Format::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["scan"]["files_unreadable"], 1);
        assert_eq!(value["name"], "test");
        assert_eq!(value["total"]["count"], "5/6");
    }

    #[test]
    fn test_text_table() {
        let text = render_collection(&report(), &ScanStats::default(), Format::Text).unwrap();
        assert!(text.starts_with("Collection test"));
        let newest = text
            .lines()
            .find(|l| l.starts_with("2024-01-02T00:00Z"))
            .unwrap();
        assert!(newest.contains("2/3 (66%)"));
        assert!(text.lines().any(|l| l.starts_with("total") && l.contains("5/6 (83%)")));
    }

    #[test]
    fn test_cell_text() {
        assert_eq!(cell_text(&CellSummary::new(Completeness::new(0, 0))), "-");
        assert_eq!(cell_text(&CellSummary::new(Completeness::new(3, 3))), "3");
        assert_eq!(cell_text(&CellSummary::new(Completeness::new(1, 2))), "1/2 (50%)");
        assert_eq!(cell_text(&CellSummary::counts_only(Completeness::new(1, 2))), "1/2");
    }

    #[test]
    fn test_run_inventory_lists_valid_times() {
        let mut runs = daily_runs(1, 1, &[12], schedules::SYNOPTIC, &["T"]);
        runs[0] = with_missing(runs[0].clone(), "T", 1, 0);
        let mut builder = CollectionBuilder::new("test");
        builder.add_runs(&runs);
        let collection = builder.finish();
        let entry = collection.inventory("T", runs[0].run_time).unwrap();

        let inventory = RunInventory::new("T", entry);
        assert_eq!(inventory.run_time, "2024-01-01T12:00Z");
        assert_eq!(inventory.offsets.len(), 3);
        assert_eq!(inventory.offsets[2].valid_time.as_deref(), Some("2024-01-02T00:00Z"));
        assert_eq!(inventory.offsets[1].cell.count.as_deref(), Some("0/1"));

        let text = render_run_inventory(&inventory, Format::Text).unwrap();
        assert!(text.starts_with("Inventory of T for run 2024-01-01T12:00Z"));
        assert!(text.contains("+6h  2024-01-01T18:00Z  0/1 (0%)"));

        let value: serde_json::Value =
            serde_json::from_str(&render_run_inventory(&inventory, Format::Json).unwrap()).unwrap();
        assert_eq!(value["offsets"][0]["actual"], 1);
        assert_eq!(value["total"]["count"], "2/3");
    }

    #[test]
    fn test_write_output_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.txt");
        write_output("hello", Some(&path)).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "hello");
    }
}
