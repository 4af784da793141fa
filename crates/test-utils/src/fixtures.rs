//! Common test fixtures for fmrc tests.
//!
//! This module provides pre-defined schedules, levels and definition
//! documents that represent common operational setups.

use chrono::{DateTime, TimeZone, Utc};

/// Run time on a day of January 2024.
pub fn run_time(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, day, hour, 0, 0)
        .single()
        .unwrap_or_else(|| panic!("invalid fixture run time: day {} hour {}", day, hour))
}

/// Forecast offset schedules, in hours.
pub mod schedules {
    /// Three synoptic steps
    pub const SYNOPTIC: &[f64] = &[0.0, 6.0, 12.0];

    /// Three-hourly steps out to 9 hours
    pub const THREE_HOURLY: &[f64] = &[0.0, 3.0, 6.0, 9.0];

    /// Short-range schedule used by off-hour runs
    pub const SHORT: &[f64] = &[0.0, 3.0];

    /// Extended schedule with an extra day
    pub const EXTENDED: &[f64] = &[0.0, 6.0, 12.0, 18.0, 24.0];
}

/// Vertical level sets.
pub mod levels {
    /// Mandatory pressure levels (hPa)
    pub const ISOBARIC: &[f64] = &[1000.0, 850.0, 500.0];

    /// Upper-air subset (hPa)
    pub const UPPER: &[f64] = &[500.0, 250.0];

    /// 2 m above ground
    pub const HEIGHT_2M: &[f64] = &[2.0];
}

/// Definition documents.
pub mod definitions {
    /// All runs use the synoptic schedule; `T` on pressure levels, `P` scalar.
    pub const SYNOPTIC_ALL_USE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<fmrcDefinition dataset="synoptic">
  <vertCoord id="isobaric" name="isobaric" units="hPa">1000.0 850.0 500.0</vertCoord>
  <offsetHours id="time">0.0 6.0 12.0</offsetHours>
  <runSequence allUseSeq="time">
    <variable name="T" vertCoord="isobaric"/>
    <variable name="P"/>
  </runSequence>
</fmrcDefinition>
"#;

    /// 00Z runs go to 12 h, 06Z runs only to 3 h; the pattern repeats at
    /// 12Z and 18Z.
    pub const SIX_HOURLY_CYCLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<fmrcDefinition dataset="cycle" suffixFilter=".json">
  <offsetHours id="time">0.0 6.0 12.0</offsetHours>
  <offsetHours id="time1">0.0 3.0</offsetHours>
  <runSequence>
    <run runHour="0.0" offsetHourSeq="time"/>
    <run runHour="6.0" offsetHourSeq="time1"/>
    <variable name="P"/>
  </runSequence>
</fmrcDefinition>
"#;

    /// Upper levels are only expected at the 12 h offset.
    pub const RESTRICTED_LEVELS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<fmrcDefinition dataset="restricted">
  <vertCoord id="isobaric" name="isobaric" units="hPa">1000.0 850.0 500.0</vertCoord>
  <offsetHours id="time">0.0 6.0 12.0</offsetHours>
  <runSequence allUseSeq="time">
    <variable name="T" vertCoord="isobaric">
      <vertTimeCoord restrict="1000.0">6.0 12.0</vertTimeCoord>
    </variable>
  </runSequence>
</fmrcDefinition>
"#;
}
