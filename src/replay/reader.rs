//! Sensor CSV reader.
//!
//! Plain comma-separated values with a header row. Columns are looked up by
//! name so extra or reordered columns are accepted. No quoting support: the
//! sensor files never contain commas inside a field.

use std::io::ErrorKind;
use std::path::Path;

use tracing::debug;

use super::record::{TelemetryRecord, COLUMNS};
use crate::error::{ReplayError, Result};

/// Read every record from `path`.
pub fn read_records(path: impl AsRef<Path>) -> Result<Vec<TelemetryRecord>> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => ReplayError::NotFound(path.to_path_buf()).into(),
        _ => crate::Error::from(e),
    })?;

    let records = parse_records(&content)?;
    debug!(path = %path.display(), rows = records.len(), "Loaded sensor file");
    Ok(records)
}

/// Parse CSV text.
pub fn parse_records(content: &str) -> Result<Vec<TelemetryRecord>> {
    let mut lines = content
        .lines()
        .map(|line| line.trim_end_matches('\r'))
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty());

    let (_, header) = lines.next().ok_or(ReplayError::Empty)?;
    let header: Vec<&str> = header.split(',').map(str::trim).collect();

    let mut index = [0usize; COLUMNS.len()];
    for (slot, name) in index.iter_mut().zip(COLUMNS) {
        *slot = header
            .iter()
            .position(|h| *h == name)
            .ok_or(ReplayError::MissingColumn(name))?;
    }

    let mut records = Vec::new();
    for (line_no, line) in lines {
        // 1-based, counting the header
        let row = line_no + 1;
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        if fields.len() != header.len() {
            return Err(ReplayError::FieldCount {
                row,
                expected: header.len(),
                found: fields.len(),
            }
            .into());
        }

        let mut values = [0f64; COLUMNS.len() - 1];
        for (value, (&col, &name)) in values
            .iter_mut()
            .zip(index[1..].iter().zip(&COLUMNS[1..]))
        {
            *value = fields[col]
                .parse()
                .map_err(|_| ReplayError::InvalidNumber {
                    row,
                    column: name,
                    value: fields[col].to_string(),
                })?;
        }

        records.push(TelemetryRecord::from_columns(
            fields[index[0]].to_string(),
            values,
        ));
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::io::Write;

    const HEADER: &str =
        "Time,Bus_Voltage,Bus_Current,RPM,Torque,Current_U,Current_V,Current_W,Throttle_Voltage,SOC";

    #[test]
    fn test_parse_rows() {
        let csv = format!(
            "{HEADER}\n2025-01-01 10:00:00.000,90.1,12.5,1500,80.25,10,-5.5,20,2.5,76.4\r\n\
             2025-01-01 10:00:00.100,90.2,12.4,1510,80.5,11,-5,21,2.6,76.4\n"
        );
        let records = parse_records(&csv).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].time, "2025-01-01 10:00:00.000");
        assert_eq!(records[0].motor_data.bus_voltage, 90.1);
        assert_eq!(records[1].motor_data.rpm, 1510.0);
        assert_eq!(records[1].system_status.soc, 76.4);
    }

    #[test]
    fn test_columns_by_name() {
        let csv = "SOC,Time,RPM,Torque,Bus_Current,Bus_Voltage,Current_W,Current_V,Current_U,Throttle_Voltage\n\
                   50,t0,1000,20,3,91,1,2,3,1.5\n";
        let records = parse_records(csv).unwrap();
        assert_eq!(records[0].time, "t0");
        assert_eq!(records[0].system_status.soc, 50.0);
        assert_eq!(records[0].motor_data.bus_voltage, 91.0);
        assert_eq!(records[0].phase_currents.w, 1.0);
    }

    #[test]
    fn test_empty_file() {
        assert!(matches!(
            parse_records("\n\n"),
            Err(Error::Replay(ReplayError::Empty))
        ));
    }

    #[test]
    fn test_missing_column() {
        let err = parse_records("Time,Bus_Voltage\n").unwrap_err();
        assert!(matches!(
            err,
            Error::Replay(ReplayError::MissingColumn("Bus_Current"))
        ));
    }

    #[test]
    fn test_invalid_number_names_row_and_column() {
        let csv = format!("{HEADER}\nt0,90,1,2,3,4,5,6,7,8\nt1,90,1,fast,3,4,5,6,7,8\n");
        match parse_records(&csv).unwrap_err() {
            Error::Replay(ReplayError::InvalidNumber { row, column, value }) => {
                assert_eq!(row, 3);
                assert_eq!(column, "RPM");
                assert_eq!(value, "fast");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_field_count() {
        let csv = format!("{HEADER}\nt0,90,1\n");
        assert!(matches!(
            parse_records(&csv),
            Err(Error::Replay(ReplayError::FieldCount {
                row: 2,
                expected: 10,
                found: 3
            }))
        ));
    }

    #[test]
    fn test_read_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{HEADER}").unwrap();
        writeln!(file, "t0,90,1,2,3,4,5,6,7,8").unwrap();

        let records = read_records(file.path()).unwrap();
        assert_eq!(records.len(), 1);

        let err = read_records("/nonexistent/sensor_data.csv").unwrap_err();
        assert!(matches!(err, Error::Replay(ReplayError::NotFound(_))));
    }
}
