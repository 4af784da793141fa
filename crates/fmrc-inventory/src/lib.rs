//! Inventory engine for Forecast Model Run Collections (FMRC).
//!
//! Catalogs which grids exist across a set of model runs, each valid at a
//! sparse and possibly irregular set of forecast offsets and vertical levels.
//!
//! # Architecture
//!
//! Construction is a two-phase batch:
//!
//! - [`CollectionBuilder`] ingests one [`RunSummary`] at a time, interning
//!   time and vertical coordinates and tracking per-variable inventory
//!   against an optional [`FmrcDefinition`].
//! - [`CollectionBuilder::finish`] consumes the builder, groups runs into
//!   [`RunSeq`] equivalence classes, computes vertical-coordinate unions and
//!   returns an immutable [`FmrcCollection`].
//!
//! The finished collection answers completeness queries and produces the
//! summary matrices and reports without going back to the data files.

pub mod builder;
pub mod collection;
pub mod config;
pub mod coord;
pub mod definition;
pub mod error;
pub mod grid;
pub mod interner;
pub mod matrix;
pub mod report;
pub mod run;
pub mod summary;

// Re-exports
pub use builder::{CollectionBuilder, IngestStats, RunOutcome};
pub use collection::{Axes, FmrcCollection};
pub use config::{InventoryConfig, UnknownVariablePolicy};
pub use coord::{LevelSchedule, TimeCoord, TimeCoordId, VertCoord, VertCoordId};
pub use definition::{
    DefGrid, DefRunSeq, DefTimeCoord, DefVertCoord, DefinitionDocument, FmrcDefinition,
    LevelRestriction, RunSchedule, ScheduledRun,
};
pub use error::{DefinitionError, DefinitionResult, SummaryError};
pub use grid::{ActualGrid, LevelSlot, RunExpected, UberGrid};
pub use interner::CoordInterner;
pub use matrix::{Completeness, CountMatrix, TimeMatrixDataset};
pub use report::{
    CellSummary, CollectionReport, ForecastRow, MatrixReport, OffsetHourReport, OffsetHourRow,
    RunRow, VariableReport, VariableRow,
};
pub use run::{InventoryEntry, Run, RunId, RunSeq, RunSeqGrouper, RunSeqId};
pub use summary::{GridSummary, MissingSlot, RunSummary, VertSummary};
