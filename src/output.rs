use std::io::Write;
use std::path::Path;

use crate::dataset::ObservationTable;
use crate::types::{DashboardSummary, Result};

/// Write a summary manifest to a JSON file
pub fn write_json_file(summary: &DashboardSummary, path: &Path) -> Result<()> {
    let file = std::fs::File::create(path)?;
    let writer = std::io::BufWriter::new(file);
    serde_json::to_writer_pretty(writer, summary)?;
    Ok(())
}

/// Render a summary manifest as a JSON string
pub fn to_json_string(summary: &DashboardSummary) -> Result<String> {
    Ok(serde_json::to_string_pretty(summary)?)
}

/// Write a summary manifest to stdout
pub fn write_json_stdout(summary: &DashboardSummary) -> Result<()> {
    let json = to_json_string(summary)?;
    let stdout = std::io::stdout();
    let mut handle = stdout.lock();
    writeln!(handle, "{}", json)?;
    Ok(())
}

/// Write an observation table as CSV: numeric fields in schema order, then
/// wind direction, then station. Missing entries become empty cells.
pub fn write_observations_csv<W: Write>(table: &ObservationTable, writer: W) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(table.header())?;

    for i in 0..table.len() {
        let mut record: Vec<String> = table
            .numeric_columns()
            .map(|(_, column)| match column[i] {
                Some(v) => format!("{v}"),
                None => String::new(),
            })
            .collect();
        record.push(table.wind_directions()[i].clone().unwrap_or_default());
        record.push(table.stations()[i].clone());
        csv_writer.write_record(&record)?;
    }

    csv_writer.flush()?;
    Ok(())
}

/// Write an observation table to a CSV file
pub fn write_observations_file(table: &ObservationTable, path: &Path) -> Result<()> {
    let file = std::fs::File::create(path)?;
    write_observations_csv(table, std::io::BufWriter::new(file))
}

/// Write an observation table to stdout as CSV
pub fn write_observations_stdout(table: &ObservationTable) -> Result<()> {
    let stdout = std::io::stdout();
    write_observations_csv(table, stdout.lock())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::correlation_matrix;
    use crate::types::{PivotSummary, SummaryOptions};

    fn sample_summary() -> DashboardSummary {
        DashboardSummary {
            version: "1.0.0".to_string(),
            generated_at: "2025-01-01T00:00:00+00:00".to_string(),
            files: Vec::new(),
            columns: Vec::new(),
            correlation: correlation_matrix(&[]),
            pollution_pivot: PivotSummary {
                dimension_fields: Vec::new(),
                index: Vec::new(),
                columns: Vec::new(),
                values: Vec::new(),
            },
            weather_pivot: PivotSummary {
                dimension_fields: Vec::new(),
                index: Vec::new(),
                columns: Vec::new(),
                values: Vec::new(),
            },
            warnings: Vec::new(),
            options: SummaryOptions::default(),
        }
    }

    #[test]
    fn test_json_serialization() {
        let summary = sample_summary();
        let json = to_json_string(&summary).unwrap();

        assert!(json.contains("\"version\": \"1.0.0\""));
        assert!(json.contains("\"pivot_min_total\": 2500"));
        // Empty warnings are omitted entirely
        assert!(!json.contains("warnings"));
    }

    #[test]
    fn test_json_round_trip() {
        let summary = sample_summary();
        let json = to_json_string(&summary).unwrap();
        let parsed: DashboardSummary = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.version, summary.version);
        assert!(parsed.warnings.is_empty());
    }

    #[test]
    fn test_write_observations_csv() {
        let mut table = ObservationTable::new(vec!["PM2.5".to_string(), "TEMP".to_string()]);
        table.push_row(
            "Shunyi".to_string(),
            Some("N".to_string()),
            vec![Some(10.5), None],
        );
        table.push_row("Dongsi".to_string(), None, vec![Some(8.0), Some(-3.0)]);

        let mut buffer = Vec::new();
        write_observations_csv(&table, &mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();

        assert_eq!(
            text,
            "PM2.5,TEMP,wd,station\n10.5,,N,Shunyi\n8,-3,,Dongsi\n"
        );
    }
}
