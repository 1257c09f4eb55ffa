//! Batch evaluation of transducer settings from CSV.
//!
//! Each input row is an independent recompute. A row that is malformed or
//! fails validation is written out with placeholders and its message; it
//! never aborts the run.

use crate::engine::{evaluate, Evaluation};
use crate::format::Readout;
use crate::{Defaults, RawInputs, Result, UnknownUnit};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

/// A row in the CSV input
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct InputRow {
    frequency_mhz: Option<String>,
    depth_cm: Option<String>,
    peak_negative_pressure_mpa: Option<String>,
    pulse_duration: Option<String>,
    pulse_duration_unit: Option<String>,
    prf: Option<String>,
    prf_unit: Option<String>,
    insertion_loss_db: Option<String>,
    skull_thickness_mm: Option<String>,
    impedance: Option<String>,
    custom_impedance_mrayl: Option<String>,
}

impl InputRow {
    /// Copy what can be recovered from a record that failed to deserialize,
    /// matching cells to headers by position
    fn salvage(headers: &csv::StringRecord, record: &csv::StringRecord) -> Self {
        let mut row = InputRow::default();
        for (name, cell) in headers.iter().zip(record.iter()) {
            let value = (!cell.is_empty()).then(|| cell.to_string());
            match name {
                "frequency_mhz" => row.frequency_mhz = value,
                "depth_cm" => row.depth_cm = value,
                "peak_negative_pressure_mpa" => row.peak_negative_pressure_mpa = value,
                "pulse_duration" => row.pulse_duration = value,
                "pulse_duration_unit" => row.pulse_duration_unit = value,
                "prf" => row.prf = value,
                "prf_unit" => row.prf_unit = value,
                "insertion_loss_db" => row.insertion_loss_db = value,
                "skull_thickness_mm" => row.skull_thickness_mm = value,
                "impedance" => row.impedance = value,
                "custom_impedance_mrayl" => row.custom_impedance_mrayl = value,
                _ => {}
            }
        }
        row
    }
}

fn non_blank(raw: &Option<String>) -> Option<String> {
    raw.as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

fn selector<T>(raw: &Option<String>) -> std::result::Result<T, UnknownUnit>
where
    T: std::str::FromStr<Err = UnknownUnit> + Default,
{
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(T::default()),
        Some(s) => s.parse(),
    }
}

impl TryFrom<&InputRow> for RawInputs {
    type Error = UnknownUnit;

    fn try_from(row: &InputRow) -> std::result::Result<Self, Self::Error> {
        Ok(RawInputs {
            frequency_mhz: row.frequency_mhz.clone(),
            depth_cm: row.depth_cm.clone(),
            peak_negative_pressure_mpa: row.peak_negative_pressure_mpa.clone(),
            pulse_duration: row.pulse_duration.clone(),
            pulse_duration_unit: selector(&row.pulse_duration_unit)?,
            prf: row.prf.clone(),
            prf_unit: selector(&row.prf_unit)?,
            insertion_loss_db: row.insertion_loss_db.clone(),
            skull_thickness_mm: row.skull_thickness_mm.clone(),
            impedance: selector(&row.impedance)?,
            custom_impedance_mrayl: row.custom_impedance_mrayl.clone(),
        })
    }
}

/// Row status in the CSV output
#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RowStatus {
    Ok,
    Warning,
    Invalid,
}

/// A row in the CSV output
#[derive(Debug, Serialize)]
struct OutputRow {
    frequency_mhz: Option<String>,
    depth_cm: Option<String>,
    peak_negative_pressure_mpa: Option<String>,
    pulse_duration: Option<String>,
    pulse_duration_unit: String,
    prf: Option<String>,
    prf_unit: String,
    duty_factor: String,
    derated_pressure: String,
    mechanical_index: String,
    skull_summary: String,
    in_situ_pressure: String,
    in_situ_mechanical_index: String,
    spatial_peak_intensity: String,
    spatial_average_intensity: String,
    status: RowStatus,
    message: String,
}

impl OutputRow {
    fn new(raw: &RawInputs, readout: Readout, status: RowStatus, message: String) -> Self {
        OutputRow {
            frequency_mhz: raw.frequency_mhz.clone(),
            depth_cm: raw.depth_cm.clone(),
            peak_negative_pressure_mpa: raw.peak_negative_pressure_mpa.clone(),
            pulse_duration: raw.pulse_duration.clone(),
            pulse_duration_unit: raw.pulse_duration_unit.label().to_string(),
            prf: raw.prf.clone(),
            prf_unit: raw.prf_unit.label().to_string(),
            duty_factor: readout.duty_factor,
            derated_pressure: readout.derated_pressure,
            mechanical_index: readout.mechanical_index,
            skull_summary: readout.skull_summary,
            in_situ_pressure: readout.in_situ_pressure,
            in_situ_mechanical_index: readout.in_situ_mechanical_index,
            spatial_peak_intensity: readout.spatial_peak_intensity,
            spatial_average_intensity: readout.spatial_average_intensity,
            status,
            message,
        }
    }

    /// A row that never reached the engine; inputs and units are echoed as given
    fn rejected(row: &InputRow, message: String) -> Self {
        let raw = RawInputs {
            frequency_mhz: row.frequency_mhz.clone(),
            depth_cm: row.depth_cm.clone(),
            peak_negative_pressure_mpa: row.peak_negative_pressure_mpa.clone(),
            pulse_duration: row.pulse_duration.clone(),
            prf: row.prf.clone(),
            ..Default::default()
        };
        let mut out = Self::new(&raw, Readout::unavailable(), RowStatus::Invalid, message);
        if let Some(unit) = non_blank(&row.pulse_duration_unit) {
            out.pulse_duration_unit = unit;
        }
        if let Some(unit) = non_blank(&row.prf_unit) {
            out.prf_unit = unit;
        }
        out
    }

    fn from_row(row: &InputRow, line: usize, defaults: &Defaults) -> Self {
        match RawInputs::try_from(row) {
            Ok(raw) => {
                let eval = evaluate(&raw, defaults);
                Self::from_evaluation(&raw, eval)
            }
            Err(e) => {
                tracing::warn!("Row {}: {}", line, e);
                Self::rejected(row, e.to_string())
            }
        }
    }

    fn from_evaluation(raw: &RawInputs, eval: Evaluation) -> Self {
        match eval {
            Evaluation::Ready {
                readout,
                advisories,
                ..
            } => {
                let status = if advisories.is_empty() {
                    RowStatus::Ok
                } else {
                    RowStatus::Warning
                };
                let message = advisories
                    .iter()
                    .map(|a| a.to_string())
                    .collect::<Vec<_>>()
                    .join(" ");
                Self::new(raw, readout, status, message)
            }
            Evaluation::Invalid {
                readout, message, ..
            } => Self::new(raw, readout, RowStatus::Invalid, message),
        }
    }
}

/// Counts reported after a batch run
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub rows: usize,
    pub ok: usize,
    pub warnings: usize,
    pub invalid: usize,
}

impl BatchSummary {
    fn record(&mut self, status: RowStatus) {
        self.rows += 1;
        match status {
            RowStatus::Ok => self.ok += 1,
            RowStatus::Warning => self.warnings += 1,
            RowStatus::Invalid => self.invalid += 1,
        }
    }
}

/// Evaluate every CSV row from `input` and write results to `output`
pub fn evaluate_csv<R: Read, W: Write>(
    input: R,
    output: W,
    defaults: &Defaults,
) -> Result<BatchSummary> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(input);
    let headers = reader.headers()?.clone();
    let mut writer = csv::Writer::from_writer(output);
    let mut summary = BatchSummary::default();

    for (index, record) in reader.records().enumerate() {
        let line = index + 1;
        let out = match record {
            // A failing reader will not recover; anything else is one bad row.
            Err(e) if e.is_io_error() => return Err(e.into()),
            Err(e) => {
                tracing::warn!("Row {}: {}", line, e);
                OutputRow::rejected(&InputRow::default(), e.to_string())
            }
            Ok(record) => match record.deserialize::<InputRow>(Some(&headers)) {
                Ok(row) => OutputRow::from_row(&row, line, defaults),
                Err(e) => {
                    tracing::warn!("Row {}: {}", line, e);
                    OutputRow::rejected(&InputRow::salvage(&headers, &record), e.to_string())
                }
            },
        };
        summary.record(out.status);
        writer.serialize(out)?;
    }

    writer.flush()?;
    tracing::info!(
        "Evaluated {} rows ({} ok, {} warnings, {} invalid)",
        summary.rows,
        summary.ok,
        summary.warnings,
        summary.invalid
    );
    Ok(summary)
}

/// File-to-file variant of [`evaluate_csv`]; the output is synced to disk
pub fn evaluate_csv_file(
    input_path: &Path,
    output_path: &Path,
    defaults: &Defaults,
) -> Result<BatchSummary> {
    let input = File::open(input_path)?;

    if let Some(parent) = output_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let output = File::create(output_path)?;
    let summary = evaluate_csv(input, &output, defaults)?;
    output.sync_all()?;

    tracing::info!("Wrote batch results to {:?}", output_path);
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    const INPUT: &str = "\
frequency_mhz,depth_cm,peak_negative_pressure_mpa,pulse_duration,pulse_duration_unit,prf,prf_unit,insertion_loss_db,skull_thickness_mm,impedance,custom_impedance_mrayl
1.5,2,1.0,2,us,1,khz,,,water,
1.5,2,1.0,1.5,ms,1,khz,,,water,
0,2,1.0,2,us,1,khz,,,water,
1.5,2,1.0,2,fortnights,1,khz,,,water,
";

    fn run(input: &str) -> (BatchSummary, Vec<csv::StringRecord>) {
        let mut out = Vec::new();
        let summary = evaluate_csv(input.as_bytes(), &mut out, &Defaults::default()).unwrap();
        let mut reader = csv::Reader::from_reader(out.as_slice());
        let records = reader.records().map(|r| r.unwrap()).collect();
        (summary, records)
    }

    #[test]
    fn test_batch_statuses() {
        let (summary, records) = run(INPUT);
        assert_eq!(
            summary,
            BatchSummary {
                rows: 4,
                ok: 1,
                warnings: 1,
                invalid: 2
            }
        );
        assert_eq!(records.len(), 4);
        assert_eq!(&records[0][15], "ok");
        assert_eq!(&records[1][15], "warning");
        assert_eq!(&records[2][15], "invalid");
        assert!(records[3][16].contains("fortnights"));
    }

    #[test]
    fn test_unknown_units_are_echoed() {
        let (_, records) = run(INPUT);
        assert_eq!(&records[3][4], "fortnights");
        assert_eq!(&records[3][6], "khz");
        assert_eq!(&records[0][4], "µs");
        assert_eq!(&records[0][6], "kHz");
    }

    #[test]
    fn test_short_row_does_not_abort_batch() {
        let input = "frequency_mhz,depth_cm,peak_negative_pressure_mpa,pulse_duration,prf\n\
                     1,0,1,1,1\n\
                     1,0,1\n\
                     1.5,2,1,2,1\n";
        let (summary, records) = run(input);
        assert_eq!(
            summary,
            BatchSummary {
                rows: 3,
                ok: 2,
                warnings: 0,
                invalid: 1
            }
        );
        assert_eq!(records.len(), 3);
        assert_eq!(&records[0][15], "ok");
        assert_eq!(&records[1][15], "invalid");
        assert_eq!(&records[1][0], "1");
        assert!(!records[1][16].is_empty());
        assert_eq!(&records[2][15], "ok");
        assert_eq!(&records[2][0], "1.5");
    }

    #[test]
    fn test_long_row_is_evaluated() {
        let input = "frequency_mhz,depth_cm,peak_negative_pressure_mpa,pulse_duration,prf\n\
                     1,0,1,1,1,extra\n";
        let (summary, records) = run(input);
        assert_eq!(summary.rows, 1);
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn test_batch_uses_same_strings_as_readout() {
        let (_, records) = run(INPUT);
        assert_eq!(&records[0][7], "0.200%  (f=0.002000)");
        assert_eq!(&records[0][8], "0.9016 MPa");
        assert_eq!(&records[0][10], "6.00 dB  •  7.00 mm");
        assert_eq!(&records[2][8], "—");
    }

    #[test]
    fn test_missing_optional_columns_use_defaults() {
        let input = "frequency_mhz,depth_cm,peak_negative_pressure_mpa,pulse_duration,prf\n1,0,1,1,1\n";
        let (summary, records) = run(input);
        assert_eq!(summary.ok, 1);
        assert_eq!(&records[0][4], "µs");
        assert_eq!(&records[0][6], "Hz");
    }

    #[test]
    fn test_evaluate_csv_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let input_path = temp_dir.path().join("settings.csv");
        let output_path = temp_dir.path().join("out").join("results.csv");
        std::fs::write(&input_path, INPUT).unwrap();

        let summary = evaluate_csv_file(&input_path, &output_path, &Defaults::default()).unwrap();
        assert_eq!(summary.rows, 4);

        let reader = csv::Reader::from_path(&output_path).unwrap();
        assert_eq!(reader.into_records().count(), 4);
    }
}
