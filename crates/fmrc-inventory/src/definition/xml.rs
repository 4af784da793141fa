//! XML form of an FMRC definition.
//!
//! ```xml
//! <fmrcDefinition dataset="NAM_CONUS_80km" suffixFilter=".grib1">
//!   <vertCoord id="isobaric" name="isobaric" units="hPa">1000.0 850.0 500.0</vertCoord>
//!   <offsetHours id="time">0.0 6.0 12.0</offsetHours>
//!   <runSequence allUseSeq="time">
//!     <variable name="Temperature" vertCoord="isobaric">
//!       <vertTimeCoord restrict="1000.0">12.0</vertTimeCoord>
//!     </variable>
//!   </runSequence>
//!   <runSequence>
//!     <run runHour="0.0" offsetHourSeq="time"/>
//!     <run runHour="12.0" offsetHourSeq="time1"/>
//!     <variable name="Precipitation"/>
//!   </runSequence>
//! </fmrcDefinition>
//! ```
//!
//! The document types mirror the XML one to one; numeric lists stay as text
//! until [`super::FmrcDefinition::from_document`] resolves them so that one bad
//! token only affects the entries that use it.

use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::Path;

use quick_xml::se::Serializer;
use serde::{Deserialize, Serialize};

use crate::error::{DefinitionError, DefinitionResult};

const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename = "fmrcDefinition")]
pub struct DefinitionDocument {
    #[serde(
        rename = "@dataset",
        alias = "@name",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub dataset: Option<String>,

    #[serde(rename = "@suffixFilter", default, skip_serializing_if = "Option::is_none")]
    pub suffix_filter: Option<String>,

    #[serde(rename = "vertCoord", default)]
    pub vert_coords: Vec<VertCoordElement>,

    #[serde(rename = "offsetHours", default)]
    pub offset_hours: Vec<OffsetHoursElement>,

    #[serde(rename = "runSequence", default)]
    pub run_sequences: Vec<RunSequenceElement>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VertCoordElement {
    #[serde(rename = "@id")]
    pub id: String,
    #[serde(rename = "@name")]
    pub name: String,
    #[serde(rename = "@units", default, skip_serializing_if = "Option::is_none")]
    pub units: Option<String>,
    #[serde(rename = "$text", default)]
    pub values: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OffsetHoursElement {
    #[serde(rename = "@id")]
    pub id: String,
    #[serde(rename = "$text", default)]
    pub values: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSequenceElement {
    #[serde(rename = "@allUseSeq", default, skip_serializing_if = "Option::is_none")]
    pub all_use_seq: Option<String>,

    #[serde(rename = "run", default)]
    pub runs: Vec<RunElement>,

    #[serde(rename = "variable", default)]
    pub variables: Vec<VariableElement>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunElement {
    #[serde(rename = "@runHour")]
    pub run_hour: String,
    #[serde(rename = "@offsetHourSeq")]
    pub offset_hour_seq: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableElement {
    #[serde(rename = "@name")]
    pub name: String,

    #[serde(rename = "@vertCoord", default, skip_serializing_if = "Option::is_none")]
    pub vert_coord: Option<String>,

    #[serde(rename = "vertTimeCoord", default)]
    pub restrictions: Vec<RestrictionElement>,
}

/// Levels available only at the listed offset hours.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestrictionElement {
    #[serde(rename = "@restrict")]
    pub levels: String,
    #[serde(rename = "$text", default)]
    pub hours: String,
}

impl DefinitionDocument {
    pub fn from_xml_str(xml: &str) -> DefinitionResult<Self> {
        Ok(quick_xml::de::from_str(xml)?)
    }

    pub fn read_xml(path: impl AsRef<Path>) -> DefinitionResult<Self> {
        let mut reader = BufReader::new(File::open(path)?);
        let mut xml = String::new();
        reader.read_to_string(&mut xml)?;
        Self::from_xml_str(&xml)
    }

    /// Pretty-printed XML with a declaration line.
    pub fn to_xml_string(&self) -> DefinitionResult<String> {
        let mut body = String::new();
        let mut ser = Serializer::new(&mut body);
        ser.indent(' ', 2);
        self.serialize(ser)?;
        Ok(format!("{}\n{}\n", XML_DECLARATION, body))
    }

    pub fn write_xml(&self, path: impl AsRef<Path>) -> DefinitionResult<()> {
        let xml = self.to_xml_string()?;
        let mut file = File::create(path)?;
        file.write_all(xml.as_bytes())?;
        Ok(())
    }
}

/// Split a numeric list on whitespace.
pub(crate) fn parse_numbers(text: &str, context: &str) -> DefinitionResult<Vec<f64>> {
    text.split_whitespace()
        .map(|token| parse_number(token, context))
        .collect()
}

/// Split a level list on whitespace. A `lower,upper` token is one layer;
/// plain tokens in a layered list get an upper bound of zero.
pub(crate) fn parse_levels(
    text: &str,
    context: &str,
) -> DefinitionResult<(Vec<f64>, Option<Vec<f64>>)> {
    let mut lower = Vec::new();
    let mut upper = Vec::new();
    let mut layered = false;
    for token in text.split_whitespace() {
        match token.split_once(',') {
            Some((a, b)) => {
                lower.push(parse_number(a, context)?);
                upper.push(parse_number(b, context)?);
                layered = true;
            }
            None => {
                lower.push(parse_number(token, context)?);
                upper.push(0.0);
            }
        }
    }
    Ok((lower, layered.then_some(upper)))
}

fn parse_number(token: &str, context: &str) -> DefinitionResult<f64> {
    match token.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(DefinitionError::InvalidNumber {
            context: context.to_string(),
            token: token.to_string(),
        }),
    }
}

pub(crate) fn format_numbers(values: &[f64]) -> String {
    values
        .iter()
        .map(|v| format!("{:?}", v))
        .collect::<Vec<_>>()
        .join(" ")
}

pub(crate) fn format_levels(lower: &[f64], upper: Option<&[f64]>) -> String {
    match upper {
        Some(upper) => lower
            .iter()
            .zip(upper)
            .map(|(a, b)| format!("{:?},{:?}", a, b))
            .collect::<Vec<_>>()
            .join(" "),
        None => format_numbers(lower),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<fmrcDefinition dataset="NAM" suffixFilter=".grib2">
  <vertCoord id="isobaric" name="isobaric" units="hPa">1000.0 850.0 500.0</vertCoord>
  <offsetHours id="time">0.0 6.0 12.0</offsetHours>
  <offsetHours id="time1">0.0 3.0</offsetHours>
  <runSequence allUseSeq="time">
    <variable name="T" vertCoord="isobaric">
      <vertTimeCoord restrict="1000.0">12.0</vertTimeCoord>
    </variable>
  </runSequence>
  <runSequence>
    <run runHour="0.0" offsetHourSeq="time"/>
    <run runHour="12.0" offsetHourSeq="time1"/>
    <variable name="P"/>
  </runSequence>
</fmrcDefinition>
"#;

    #[test]
    fn test_parse_document() {
        let doc = DefinitionDocument::from_xml_str(SAMPLE).unwrap();
        assert_eq!(doc.dataset.as_deref(), Some("NAM"));
        assert_eq!(doc.suffix_filter.as_deref(), Some(".grib2"));
        assert_eq!(doc.vert_coords.len(), 1);
        assert_eq!(doc.vert_coords[0].units.as_deref(), Some("hPa"));
        assert_eq!(doc.offset_hours.len(), 2);
        assert_eq!(doc.run_sequences[0].all_use_seq.as_deref(), Some("time"));
        assert_eq!(doc.run_sequences[0].variables[0].restrictions[0].hours, "12.0");
        assert_eq!(doc.run_sequences[1].runs.len(), 2);
        assert_eq!(doc.run_sequences[1].variables[0].vert_coord, None);
    }

    #[test]
    fn test_write_then_read_keeps_document() {
        let doc = DefinitionDocument::from_xml_str(SAMPLE).unwrap();
        let xml = doc.to_xml_string().unwrap();
        assert!(xml.starts_with(XML_DECLARATION));
        assert_eq!(DefinitionDocument::from_xml_str(&xml).unwrap(), doc);
    }

    #[test]
    fn test_syntax_error_is_reported() {
        let err = DefinitionDocument::from_xml_str("<fmrcDefinition><vertCoord").unwrap_err();
        assert!(matches!(err, DefinitionError::Xml(_)));
    }

    #[test]
    fn test_parse_numbers() {
        assert_eq!(parse_numbers(" 0 6.5\n12 ", "t").unwrap(), vec![0.0, 6.5, 12.0]);
        assert!(matches!(
            parse_numbers("0 6,12", "t"),
            Err(DefinitionError::InvalidNumber { token, .. }) if token == "6,12"
        ));
        assert!(matches!(
            parse_numbers("0 six", "t"),
            Err(DefinitionError::InvalidNumber { token, .. }) if token == "six"
        ));
        assert!(parse_numbers("NaN", "t").is_err());
        assert_eq!(format_numbers(&[0.0, 6.5]), "0.0 6.5");
    }

    #[test]
    fn test_layer_token_is_one_level() {
        let (lower, upper) = parse_levels("0,10 10,40", "v").unwrap();
        assert_eq!(lower, vec![0.0, 10.0]);
        assert_eq!(upper, Some(vec![10.0, 40.0]));
        assert_eq!(format_levels(&lower, upper.as_deref()), "0.0,10.0 10.0,40.0");

        let (lower, upper) = parse_levels("2 10,40", "v").unwrap();
        assert_eq!(lower, vec![2.0, 10.0]);
        assert_eq!(upper, Some(vec![0.0, 40.0]));

        let (lower, upper) = parse_levels("1000 850", "v").unwrap();
        assert_eq!(lower, vec![1000.0, 850.0]);
        assert_eq!(upper, None);
        assert!(parse_levels("0,x", "v").is_err());
    }
}
