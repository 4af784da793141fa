//! Collections built against an expected-inventory definition.

use std::sync::Arc;

use fmrc_inventory::{
    CollectionBuilder, FmrcCollection, FmrcDefinition, GridSummary, InventoryConfig, RunSchedule,
    RunSummary, UnknownVariablePolicy,
};
use test_utils::{
    assert_approx_eq, assert_completeness, definitions, levels, run_time, scalar_run, schedules,
};

fn load(xml: &str) -> Arc<FmrcDefinition> {
    Arc::new(FmrcDefinition::from_xml_str(xml).expect("fixture definition parses"))
}

fn build_with(
    definition: Arc<FmrcDefinition>,
    config: InventoryConfig,
    summaries: &[RunSummary],
) -> FmrcCollection {
    let mut builder = CollectionBuilder::new("test")
        .with_definition(definition)
        .with_config(config);
    builder.add_runs(summaries);
    builder.finish()
}

/// T on all three pressure levels but only out to 6 h, P complete, plus an
/// undeclared Q.
fn synoptic_runs() -> Vec<RunSummary> {
    [1, 2]
        .into_iter()
        .map(|day| {
            RunSummary::new(run_time(day, 0), schedules::SYNOPTIC.to_vec())
                .with_variable(
                    GridSummary::with_levels("T", "isobaric", Some("hPa"), levels::ISOBARIC.to_vec())
                        .with_offsets(vec![0.0, 6.0]),
                )
                .with_variable(GridSummary::scalar("P"))
                .with_variable(GridSummary::scalar("Q"))
        })
        .collect()
}

// ============================================================================
// All-use run sequence
// ============================================================================

#[test]
fn test_short_run_is_measured_against_definition() {
    let collection = build_with(
        load(definitions::SYNOPTIC_ALL_USE),
        InventoryConfig::default(),
        &synoptic_runs(),
    );

    let t = collection.inventory("T", run_time(1, 0)).unwrap();
    assert!(t.has_expectation());
    assert_eq!(t.count_inventory(12.0), 0);
    assert_eq!(t.count_expected(12.0), 3);
    assert_completeness!(t.completeness(), 6, 9);
    assert_completeness!(collection.completeness_by_variable("T").unwrap(), 12, 18);
    assert_completeness!(collection.completeness_by_variable("P").unwrap(), 6, 6);

    // The expected-only offset still gets a column
    assert_eq!(collection.axes().offsets(), schedules::SYNOPTIC);
    assert_completeness!(collection.completeness_by_offset(12.0).unwrap(), 2, 8);
}

#[test]
fn test_undeclared_variable_is_skipped_by_default() {
    let collection = build_with(
        load(definitions::SYNOPTIC_ALL_USE),
        InventoryConfig::default(),
        &synoptic_runs(),
    );
    assert!(collection.grid("Q").is_none());
    assert_eq!(collection.stats().variables_skipped, 2);
    assert_eq!(collection.stats().runs_added, 2);
}

#[test]
fn test_undeclared_variable_tracked_without_completeness() {
    let config = InventoryConfig {
        unknown_variables: UnknownVariablePolicy::Track,
        ..InventoryConfig::default()
    };
    let collection = build_with(load(definitions::SYNOPTIC_ALL_USE), config, &synoptic_runs());

    let q = collection.grid("Q").unwrap();
    assert!(!q.in_definition());
    assert!(!collection.counts_toward_completeness(q));
    assert!(q.runs().iter().all(|re| !re.has_expectation()));
    assert_completeness!(q.totals(), 6, 6);

    // T (12/18) and P (6/6) only
    assert_completeness!(collection.matrix().total(), 18, 24);

    let report = collection.report();
    let row = report.variables.iter().find(|v| v.name == "Q").unwrap();
    assert_eq!(row.total.percent, None);
    assert_eq!(row.total.count.as_deref(), Some("6"));
    let row = report.variables.iter().find(|v| v.name == "T").unwrap();
    assert_eq!(row.total.percent, Some(66));
}

// ============================================================================
// Definition-only variables
// ============================================================================

#[test]
fn test_definition_only_variable_has_zero_inventory() {
    let runs = vec![
        scalar_run(run_time(1, 0), schedules::SYNOPTIC, &["P"]),
        scalar_run(run_time(2, 0), schedules::SYNOPTIC, &["P"]),
    ];
    let collection = build_with(
        load(definitions::SYNOPTIC_ALL_USE),
        InventoryConfig::default(),
        &runs,
    );

    let t = collection.grid("T").unwrap();
    assert!(t.is_definition_only());
    assert!(t.runs().iter().all(|re| re.run().is_none()));
    assert_completeness!(t.totals(), 0, 18);
    assert_eq!(collection.stats().definition_only_variables, 1);
    assert_ne!(t.run_seq(), collection.grid("P").unwrap().run_seq());

    let report = collection.variable_report("T").unwrap();
    assert!(report.definition_only);
    assert_eq!(report.matrix.total.count.as_deref(), Some("0/18"));
    assert_eq!(report.matrix.total.percent, Some(0));
}

#[test]
fn test_definition_only_variables_can_be_disabled() {
    let config = InventoryConfig {
        include_definition_only_variables: false,
        ..InventoryConfig::default()
    };
    let runs = vec![scalar_run(run_time(1, 0), schedules::SYNOPTIC, &["P"])];
    let collection = build_with(load(definitions::SYNOPTIC_ALL_USE), config, &runs);
    assert!(collection.grid("T").is_none());
    assert_eq!(collection.stats().definition_only_variables, 0);
}

// ============================================================================
// Run-hour cycle
// ============================================================================

#[test]
fn test_cycle_repeats_declared_run_hours() {
    let definition = load(definitions::SIX_HOURLY_CYCLE);
    assert_eq!(definition.suffix_filter(), Some(".json"));

    let runs = vec![
        scalar_run(run_time(1, 0), schedules::SYNOPTIC, &["P"]),
        scalar_run(run_time(1, 6), schedules::SHORT, &["P"]),
        scalar_run(run_time(1, 12), schedules::SYNOPTIC, &["P"]),
        scalar_run(run_time(1, 18), &[0.0], &["P"]),
    ];
    let collection = build_with(definition, InventoryConfig::default(), &runs);

    let at = |hour| collection.inventory("P", run_time(1, hour)).unwrap().completeness();
    assert_completeness!(at(0), 3, 3);
    assert_completeness!(at(6), 2, 2);
    assert_completeness!(at(12), 3, 3);
    assert_completeness!(at(18), 1, 2);

    let late = collection.inventory("P", run_time(1, 18)).unwrap();
    assert_eq!(late.expected_time().unwrap().id(), "time1");
    assert_eq!(late.count_expected(3.0), 1);
}

#[test]
fn test_off_cycle_run_falls_back_to_actual() {
    let runs = vec![scalar_run(run_time(1, 3), schedules::SHORT, &["P"])];
    let collection = build_with(
        load(definitions::SIX_HOURLY_CYCLE),
        InventoryConfig::default(),
        &runs,
    );
    let re = collection.inventory("P", run_time(1, 3)).unwrap();
    assert!(re.expected_time().is_none());
    assert!(!re.has_expectation());
    assert_completeness!(re.completeness(), 2, 2);
}

// ============================================================================
// Level restrictions
// ============================================================================

#[test]
fn test_restricted_levels_set_expected_counts() {
    let mut grid =
        GridSummary::with_levels("T", "isobaric", Some("hPa"), levels::ISOBARIC.to_vec());
    for (t, v) in [(1, 1), (1, 2), (2, 1), (2, 2)] {
        grid = grid.with_missing(t, v);
    }
    let runs = vec![RunSummary::new(run_time(1, 0), schedules::SYNOPTIC.to_vec()).with_variable(grid)];
    let collection = build_with(
        load(definitions::RESTRICTED_LEVELS),
        InventoryConfig::default(),
        &runs,
    );

    let re = collection.inventory("T", run_time(1, 0)).unwrap();
    assert_eq!(re.count_expected(0.0), 3);
    assert_eq!(re.count_expected(6.0), 1);
    assert_eq!(re.count_expected(12.0), 1);
    assert_completeness!(collection.completeness_by_variable("T").unwrap(), 5, 5);

    let report = collection.offset_hour_report("T", 6.0).unwrap();
    assert_eq!(report.rows.len(), 1);
    assert_eq!(report.rows[0].actual, vec!["1000", "missing", "missing"]);
    assert_eq!(report.rows[0].expected, Some(vec![1000.0]));
    let text = report.to_string();
    assert!(text.starts_with("Inventory for T at offset 6 hours"));
    assert!(text.contains("expected: 1000"));
}

#[test]
fn test_layer_levels_count_once_each() {
    let definition = load(
        r#"<fmrcDefinition dataset="soil">
  <vertCoord id="layer" name="depth_below_surface_layer" units="cm">0,10 10,40</vertCoord>
  <offsetHours id="time">0 6</offsetHours>
  <runSequence allUseSeq="time">
    <variable name="SoilT" vertCoord="layer"/>
  </runSequence>
</fmrcDefinition>"#,
    );
    let upper = definition.vert_coords()[0].upper_bounds().unwrap();
    assert_approx_eq!(upper[1], 40.0);

    let runs = vec![RunSummary::new(run_time(1, 0), vec![0.0, 6.0]).with_variable(
        GridSummary::with_levels("SoilT", "depth_below_surface_layer", Some("cm"), vec![0.0, 10.0]),
    )];
    let collection = build_with(definition, InventoryConfig::default(), &runs);

    let re = collection.inventory("SoilT", run_time(1, 0)).unwrap();
    assert_eq!(re.count_expected(0.0), 2);
    assert_completeness!(re.completeness(), 4, 4);
}

// ============================================================================
// Offsets outside the date range
// ============================================================================

#[test]
fn test_definition_offset_beyond_date_range_does_not_abort_build() {
    let definition = load(
        r#"<fmrcDefinition dataset="far">
  <offsetHours id="time">0 6 1e10</offsetHours>
  <runSequence allUseSeq="time">
    <variable name="P"/>
  </runSequence>
</fmrcDefinition>"#,
    );
    let runs = vec![scalar_run(run_time(1, 0), &[0.0, 6.0], &["P"])];
    let collection = build_with(definition, InventoryConfig::default(), &runs);

    assert_eq!(collection.axes().run_times().len(), 1);
    assert_eq!(collection.axes().offsets(), &[0.0, 6.0]);
    assert_eq!(collection.axes().forecast_times().len(), 2);
    assert_completeness!(collection.matrix().total(), 2, 2);
}

#[test]
fn test_summary_offset_beyond_date_range_is_skipped() {
    let runs = vec![
        scalar_run(run_time(1, 0), schedules::SYNOPTIC, &["P"]),
        scalar_run(run_time(2, 0), &[0.0, 1.0e10], &["P"]),
    ];
    let collection = build_with(
        load(definitions::SYNOPTIC_ALL_USE),
        InventoryConfig::default(),
        &runs,
    );
    assert_eq!(collection.stats().runs_skipped, 1);
    assert_eq!(collection.axes().run_times(), &[run_time(1, 0)]);
}

// ============================================================================
// Persistence and derivation
// ============================================================================

#[test]
fn test_definition_survives_write_and_read() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cycle.xml");

    let original = FmrcDefinition::from_xml_str(definitions::SIX_HOURLY_CYCLE).unwrap();
    original.write_xml(&path).unwrap();
    let reread = FmrcDefinition::read_xml(&path).unwrap();

    assert_eq!(reread.name(), Some("cycle"));
    assert_eq!(reread.suffix_filter(), Some(".json"));
    assert_eq!(reread.variables().collect::<Vec<_>>(), vec!["P"]);
    assert_eq!(reread.run_seqs()[0].cycle().len(), 4);
    assert_eq!(
        reread.expected_time_coord("P", run_time(1, 18)).unwrap().id(),
        "time1"
    );
}

#[test]
fn test_reading_malformed_xml_fails() {
    let xml = r#"<fmrcDefinition dataset="broken"><runSequence allUseSeq="time"></fmrcDefinition>"#;
    assert!(FmrcDefinition::from_xml_str(xml).is_err());
}

#[test]
fn test_derived_definition_expects_what_was_produced() {
    let mut runs = Vec::new();
    for day in [1, 2] {
        for (hour, offsets) in [(0, schedules::SYNOPTIC), (12, schedules::SHORT)] {
            runs.push(
                RunSummary::new(run_time(day, hour), offsets.to_vec())
                    .with_variable(GridSummary::scalar("P"))
                    .with_variable(GridSummary::with_levels(
                        "T",
                        "isobaric",
                        Some("hPa"),
                        levels::ISOBARIC.to_vec(),
                    )),
            );
        }
    }

    let mut builder = CollectionBuilder::new("derived");
    builder.add_runs(&runs);
    let derived = builder.finish().derive_definition();

    assert_eq!(derived.name(), Some("derived"));
    assert_eq!(derived.run_seqs().len(), 1);
    match derived.run_seqs()[0].schedule() {
        RunSchedule::ByRunHour(declared) => {
            let hours: Vec<f64> = declared.iter().map(|r| r.run_hour).collect();
            assert_eq!(hours, vec![0.0, 12.0]);
        }
        other => panic!("expected per-hour schedule, got {:?}", other),
    }
    assert_eq!(derived.find_grid("T").unwrap().vert_coord_id(), Some("isobaric"));

    // Through XML and back, then measure the same runs against it
    let xml = derived.to_xml_string().unwrap();
    let definition = Arc::new(FmrcDefinition::from_xml_str(&xml).unwrap());
    let collection = build_with(definition, InventoryConfig::default(), &runs);

    for grid in collection.grids() {
        assert!(grid.runs().iter().all(|re| re.has_expectation()));
        let totals = grid.totals();
        assert_eq!(totals.actual, totals.expected, "variable {}", grid.name());
    }
    assert_completeness!(collection.completeness_by_variable("T").unwrap(), 30, 30);
}
