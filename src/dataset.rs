use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use csv::StringRecord;
use once_cell::sync::OnceCell;

use crate::error::Error;
use crate::parse::{is_missing, parse_count, parse_numeric};
use crate::stats::{forward_fill, winsorize, ClipBounds};
use crate::types::{
    Result, POLLUTANT_FIELDS, POLLUTION_CATEGORY_FIELDS, STATION_FIELD, WEATHER_CATEGORY_FIELDS,
    WEATHER_FIELDS, WIND_DIRECTION_FIELD,
};

/// File names of the four dashboard tables inside a data directory
pub const COMBINED_FILE: &str = "CombinedData_better.csv";
pub const CLEAN_FILE: &str = "CombinedData_clean.csv";
pub const POLLUTION_GROUPS_FILE: &str = "Pollution_Groups.csv";
pub const WEATHER_GROUPS_FILE: &str = "Weather_Groups.csv";

/// Placeholder shown for missing cells in table previews
const MISSING_DISPLAY: &str = "NA";

/// Column-major table of station sensor readings
#[derive(Debug, Clone, Default)]
pub struct ObservationTable {
    /// Numeric field names, in schema order
    fields: Vec<String>,
    /// One column per field, all aligned with `stations`
    columns: Vec<Vec<Option<f64>>>,
    /// Station identifier per row
    stations: Vec<String>,
    /// Wind direction per row
    wind_directions: Vec<Option<String>>,
}

impl ObservationTable {
    pub fn new(fields: Vec<String>) -> Self {
        let columns = vec![Vec::new(); fields.len()];
        Self {
            fields,
            columns,
            stations: Vec::new(),
            wind_directions: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }

    pub fn stations(&self) -> &[String] {
        &self.stations
    }

    pub fn wind_directions(&self) -> &[Option<String>] {
        &self.wind_directions
    }

    /// One numeric column by field name
    pub fn column(&self, field: &str) -> Option<&[Option<f64>]> {
        let idx = self.fields.iter().position(|f| f == field)?;
        Some(&self.columns[idx])
    }

    /// All numeric columns, in schema order
    pub fn numeric_columns<'a>(&'a self) -> impl Iterator<Item = (&'a str, &'a [Option<f64>])> + 'a {
        self.fields
            .iter()
            .zip(&self.columns)
            .map(|(name, col)| (name.as_str(), col.as_slice()))
    }

    /// Append a row. `values` must be aligned with `fields`.
    pub fn push_row(&mut self, station: String, wind_direction: Option<String>, values: Vec<Option<f64>>) {
        debug_assert_eq!(values.len(), self.fields.len());
        for (column, value) in self.columns.iter_mut().zip(values) {
            column.push(value);
        }
        self.stations.push(station);
        self.wind_directions.push(wind_direction);
    }

    /// Distinct station names, sorted
    pub fn distinct_stations(&self) -> Vec<String> {
        let set: BTreeSet<&String> = self.stations.iter().collect();
        set.into_iter().cloned().collect()
    }

    /// One field's values restricted to the rows of one station
    pub fn column_for_station(&self, field: &str, station: &str) -> Option<Vec<Option<f64>>> {
        let column = self.column(field)?;
        Some(
            self.stations
                .iter()
                .zip(column)
                .filter(|(s, _)| s.as_str() == station)
                .map(|(_, v)| *v)
                .collect(),
        )
    }

    /// Display header: numeric fields, then wind direction, then station
    pub fn header(&self) -> Vec<String> {
        let mut header = self.fields.clone();
        header.push(WIND_DIRECTION_FIELD.to_string());
        header.push(STATION_FIELD.to_string());
        header
    }

    /// First `n` rows as display strings, aligned with `header()`
    pub fn head(&self, n: usize) -> Vec<Vec<String>> {
        (0..self.len().min(n))
            .map(|i| {
                let mut row: Vec<String> = self
                    .columns
                    .iter()
                    .map(|col| match col[i] {
                        Some(v) => format!("{v}"),
                        None => MISSING_DISPLAY.to_string(),
                    })
                    .collect();
                row.push(
                    self.wind_directions[i]
                        .clone()
                        .unwrap_or_else(|| MISSING_DISPLAY.to_string()),
                );
                row.push(self.stations[i].clone());
                row
            })
            .collect()
    }

    /// Count of missing entries per column, wind direction last
    pub fn missing_counts(&self) -> Vec<(String, u64)> {
        let mut counts: Vec<(String, u64)> = self
            .numeric_columns()
            .map(|(name, col)| {
                (
                    name.to_string(),
                    col.iter().filter(|v| v.is_none()).count() as u64,
                )
            })
            .collect();
        counts.push((
            WIND_DIRECTION_FIELD.to_string(),
            self.wind_directions.iter().filter(|v| v.is_none()).count() as u64,
        ));
        counts
    }

    /// One-time wrangling pass: winsorize every numeric column and
    /// forward-fill the wind direction. The receiver is left untouched.
    pub fn wrangled(&self) -> WrangledTable {
        let mut table = self.clone();
        let mut field_bounds = Vec::with_capacity(self.fields.len());
        for (idx, field) in self.fields.iter().enumerate() {
            let result = winsorize(&self.columns[idx]);
            table.columns[idx] = result.values;
            field_bounds.push(FieldBounds {
                field: field.clone(),
                bounds: result.bounds,
            });
        }
        table.wind_directions = forward_fill(&self.wind_directions);
        WrangledTable { table, field_bounds }
    }
}

/// Clip bounds computed for one field during wrangling.
/// `bounds` is None when the field had no complete values.
#[derive(Debug, Clone)]
pub struct FieldBounds {
    pub field: String,
    pub bounds: Option<ClipBounds>,
}

/// Result of the wrangling pass over an observation table
#[derive(Debug, Clone)]
pub struct WrangledTable {
    pub table: ObservationTable,
    pub field_bounds: Vec<FieldBounds>,
}

/// Bucketed category combinations with occurrence counts per station
#[derive(Debug, Clone)]
pub struct CategoryTable {
    /// Dimension field names, in schema order
    pub dimension_fields: Vec<String>,
    pub rows: Vec<CategoryRow>,
}

#[derive(Debug, Clone)]
pub struct CategoryRow {
    pub station: String,
    /// One label per dimension field
    pub labels: Vec<String>,
    pub count: u64,
}

impl CategoryTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Display header: station, dimensions, count
    pub fn header(&self) -> Vec<String> {
        let mut header = vec![STATION_FIELD.to_string()];
        header.extend(self.dimension_fields.iter().cloned());
        header.push(crate::types::COUNT_FIELD.to_string());
        header
    }

    /// First `n` rows as display strings, aligned with `header()`
    pub fn head(&self, n: usize) -> Vec<Vec<String>> {
        self.rows
            .iter()
            .take(n)
            .map(|row| {
                let mut cells = vec![row.station.clone()];
                cells.extend(row.labels.iter().cloned());
                cells.push(row.count.to_string());
                cells
            })
            .collect()
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown")
        .to_string()
}

fn column_index(headers: &StringRecord, field: &str) -> Option<usize> {
    headers.iter().position(|h| h.trim() == field)
}

fn require_column(headers: &StringRecord, field: &str, file: &str) -> Result<usize> {
    column_index(headers, field).ok_or_else(|| Error::MissingColumn {
        file: file.to_string(),
        column: field.to_string(),
    })
}

/// Read a combined-readings CSV. All pollutant and weather fields, the
/// station column, and the wind-direction column must be present; unknown
/// columns are ignored. A non-missing cell that fails to parse is fatal.
pub fn read_observations(path: &Path) -> Result<ObservationTable> {
    let file_name = display_name(path);
    let mut reader = csv::Reader::from_path(path)?;
    let headers = reader.headers()?.clone();

    let expected: Vec<&str> = POLLUTANT_FIELDS
        .iter()
        .chain(WEATHER_FIELDS.iter())
        .copied()
        .collect();
    let mut field_indices = Vec::with_capacity(expected.len());
    for field in &expected {
        field_indices.push(require_column(&headers, field, &file_name)?);
    }
    let station_idx = require_column(&headers, STATION_FIELD, &file_name)?;
    let wd_idx = require_column(&headers, WIND_DIRECTION_FIELD, &file_name)?;

    let mut table = ObservationTable::new(expected.iter().map(|f| f.to_string()).collect());

    for (row_idx, record) in reader.records().enumerate() {
        let record = record?;
        // Data rows start on line 2, after the header
        let line = row_idx + 2;

        let mut values = Vec::with_capacity(field_indices.len());
        for (field, &idx) in expected.iter().zip(&field_indices) {
            let raw = record.get(idx).unwrap_or("");
            if is_missing(raw) {
                values.push(None);
            } else {
                let parsed = parse_numeric(raw).ok_or_else(|| Error::MalformedRow {
                    file: file_name.clone(),
                    row: line,
                    reason: format!("value '{raw}' in column '{field}' is not numeric"),
                })?;
                values.push(Some(parsed));
            }
        }

        let station = record.get(station_idx).unwrap_or("").trim().to_string();
        if station.is_empty() {
            return Err(Error::MalformedRow {
                file: file_name,
                row: line,
                reason: "empty station identifier".to_string(),
            });
        }

        let wd_raw = record.get(wd_idx).unwrap_or("");
        let wind = if is_missing(wd_raw) {
            None
        } else {
            Some(wd_raw.trim().to_string())
        };

        table.push_row(station, wind, values);
    }

    Ok(table)
}

/// Read a category pivot source CSV with the given dimension schema
pub fn read_categories(path: &Path, dimension_fields: &[&str]) -> Result<CategoryTable> {
    let file_name = display_name(path);
    let mut reader = csv::Reader::from_path(path)?;
    let headers = reader.headers()?.clone();

    let station_idx = require_column(&headers, STATION_FIELD, &file_name)?;
    let count_idx = require_column(&headers, crate::types::COUNT_FIELD, &file_name)?;
    let mut dim_indices = Vec::with_capacity(dimension_fields.len());
    for field in dimension_fields {
        dim_indices.push(require_column(&headers, field, &file_name)?);
    }

    let mut rows = Vec::new();
    for (row_idx, record) in reader.records().enumerate() {
        let record = record?;
        let line = row_idx + 2;

        let station = record.get(station_idx).unwrap_or("").trim().to_string();
        if station.is_empty() {
            return Err(Error::MalformedRow {
                file: file_name,
                row: line,
                reason: "empty station identifier".to_string(),
            });
        }

        let mut labels = Vec::with_capacity(dim_indices.len());
        for (field, &idx) in dimension_fields.iter().zip(&dim_indices) {
            let raw = record.get(idx).unwrap_or("");
            if is_missing(raw) {
                return Err(Error::MalformedRow {
                    file: file_name,
                    row: line,
                    reason: format!("missing label in column '{field}'"),
                });
            }
            labels.push(raw.trim().to_string());
        }

        let count_raw = record.get(count_idx).unwrap_or("");
        let count = parse_count(count_raw).ok_or_else(|| Error::MalformedRow {
            file: file_name.clone(),
            row: line,
            reason: format!("value '{count_raw}' in column 'Count' is not a count"),
        })?;

        rows.push(CategoryRow {
            station,
            labels,
            count,
        });
    }

    Ok(CategoryTable {
        dimension_fields: dimension_fields.iter().map(|f| f.to_string()).collect(),
        rows,
    })
}

/// The four precomputed tables backing the dashboard
#[derive(Debug, Clone)]
pub struct DatasetBundle {
    pub combined: ObservationTable,
    pub clean: ObservationTable,
    pub pollution_groups: CategoryTable,
    pub weather_groups: CategoryTable,
}

/// Where the dashboard tables come from. The directory source is the only
/// production implementation; tests substitute their own.
pub trait TableSource {
    fn load(&self) -> Result<DatasetBundle>;
}

/// Loads the four CSV files from a data directory
#[derive(Debug, Clone)]
pub struct DirSource {
    dir: PathBuf,
}

impl DirSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn combined_path(&self) -> PathBuf {
        self.dir.join(COMBINED_FILE)
    }

    pub fn clean_path(&self) -> PathBuf {
        self.dir.join(CLEAN_FILE)
    }

    pub fn pollution_groups_path(&self) -> PathBuf {
        self.dir.join(POLLUTION_GROUPS_FILE)
    }

    pub fn weather_groups_path(&self) -> PathBuf {
        self.dir.join(WEATHER_GROUPS_FILE)
    }
}

impl TableSource for DirSource {
    fn load(&self) -> Result<DatasetBundle> {
        Ok(DatasetBundle {
            combined: read_observations(&self.combined_path())?,
            clean: read_observations(&self.clean_path())?,
            pollution_groups: read_categories(
                &self.pollution_groups_path(),
                POLLUTION_CATEGORY_FIELDS,
            )?,
            weather_groups: read_categories(&self.weather_groups_path(), WEATHER_CATEGORY_FIELDS)?,
        })
    }
}

/// Process-lifetime cache of the loaded tables. The source is consulted on
/// the first get only; recomputation requires a process restart.
#[derive(Debug, Default)]
pub struct DatasetCache {
    cell: OnceCell<DatasetBundle>,
}

impl DatasetCache {
    pub const fn new() -> Self {
        Self {
            cell: OnceCell::new(),
        }
    }

    pub fn get_or_load(&self, source: &dyn TableSource) -> Result<&DatasetBundle> {
        self.cell.get_or_try_init(|| source.load())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::NamedTempFile;

    const OBSERVATION_HEADER: &str = "PM2.5,PM10,SO2,NO2,CO,O3,TEMP,PRES,DEWP,RAIN,WSPM,wd,station";

    fn create_test_csv(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::with_suffix(".csv").unwrap();
        write!(file, "{}", content).unwrap();
        file
    }

    fn observation_csv(rows: &[&str]) -> NamedTempFile {
        let mut content = String::from(OBSERVATION_HEADER);
        content.push('\n');
        for row in rows {
            content.push_str(row);
            content.push('\n');
        }
        create_test_csv(&content)
    }

    #[test]
    fn test_read_observations_basic() {
        let file = observation_csv(&[
            "10,20,3,4,500,60,12.5,1012,-3,0,2.1,N,Shunyi",
            "11,21,3,4,510,61,13.0,1011,-2,0,1.8,NE,Dongsi",
        ]);
        let table = read_observations(file.path()).unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(table.header().len(), 13);
        assert_eq!(table.column("PM2.5").unwrap(), &[Some(10.0), Some(11.0)]);
        assert_eq!(table.column("WSPM").unwrap(), &[Some(2.1), Some(1.8)]);
        assert_eq!(table.stations(), &["Shunyi", "Dongsi"]);
        assert_eq!(
            table.wind_directions(),
            &[Some("N".to_string()), Some("NE".to_string())]
        );
    }

    #[test]
    fn test_read_observations_missing_tokens() {
        let file = observation_csv(&[
            "NA,20,3,4,500,60,12.5,1012,-3,0,2.1,,Shunyi",
            ",21,3,4,510,61,13.0,1011,-2,0,1.8,NA,Dongsi",
        ]);
        let table = read_observations(file.path()).unwrap();

        assert_eq!(table.column("PM2.5").unwrap(), &[None, None]);
        assert_eq!(table.wind_directions(), &[None, None]);
    }

    #[test]
    fn test_read_observations_ignores_unknown_columns() {
        let mut content = String::from("No,year,");
        content.push_str(OBSERVATION_HEADER);
        content.push('\n');
        content.push_str("1,2014,10,20,3,4,500,60,12.5,1012,-3,0,2.1,N,Shunyi\n");
        let file = create_test_csv(&content);

        let table = read_observations(file.path()).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.column("PM2.5").unwrap(), &[Some(10.0)]);
    }

    #[test]
    fn test_read_observations_missing_column_is_fatal() {
        let file = create_test_csv("PM2.5,station\n10,Shunyi\n");
        let err = read_observations(file.path()).unwrap_err();

        match err {
            Error::MissingColumn { column, .. } => assert_eq!(column, "PM10"),
            other => panic!("expected MissingColumn, got {other:?}"),
        }
    }

    #[test]
    fn test_read_observations_malformed_cell_is_fatal() {
        let file = observation_csv(&["ten,20,3,4,500,60,12.5,1012,-3,0,2.1,N,Shunyi"]);
        let err = read_observations(file.path()).unwrap_err();

        match err {
            Error::MalformedRow { row, .. } => assert_eq!(row, 2),
            other => panic!("expected MalformedRow, got {other:?}"),
        }
    }

    #[test]
    fn test_column_for_station() {
        let file = observation_csv(&[
            "10,20,3,4,500,60,12.5,1012,-3,0,2.1,N,Shunyi",
            "30,21,3,4,510,61,13.0,1011,-2,0,1.8,NE,Dongsi",
            "50,22,3,4,520,62,13.5,1010,-1,0,1.5,E,Shunyi",
        ]);
        let table = read_observations(file.path()).unwrap();

        assert_eq!(
            table.column_for_station("PM2.5", "Shunyi").unwrap(),
            vec![Some(10.0), Some(50.0)]
        );
        assert_eq!(table.distinct_stations(), vec!["Dongsi", "Shunyi"]);
    }

    #[test]
    fn test_wrangled_clips_and_fills() {
        let file = observation_csv(&[
            "1,20,3,4,500,60,12.5,1012,-3,0,2.1,N,Shunyi",
            "2,21,3,4,510,61,13.0,1011,-2,0,1.8,,Shunyi",
            "3,22,3,4,520,62,13.5,1010,-1,0,1.5,,Shunyi",
            "4,23,3,4,530,63,14.0,1009,0,0,1.2,SW,Shunyi",
            "5,24,3,4,540,64,14.5,1008,1,0,0.9,,Shunyi",
            "100,25,3,4,550,65,15.0,1007,2,0,0.6,W,Shunyi",
        ]);
        let table = read_observations(file.path()).unwrap();
        let wrangled = table.wrangled();

        // The PM2.5 outlier is clipped to its upper bound
        assert_eq!(
            wrangled.table.column("PM2.5").unwrap(),
            &[
                Some(1.0),
                Some(2.0),
                Some(3.0),
                Some(4.0),
                Some(5.0),
                Some(8.5)
            ]
        );
        // Wind direction is forward-filled
        assert_eq!(
            wrangled.table.wind_directions(),
            &[
                Some("N".to_string()),
                Some("N".to_string()),
                Some("N".to_string()),
                Some("SW".to_string()),
                Some("SW".to_string()),
                Some("W".to_string()),
            ]
        );
        assert_eq!(wrangled.field_bounds.len(), 11);
        assert!(wrangled.field_bounds.iter().all(|fb| fb.bounds.is_some()));
        // The source table is untouched
        assert_eq!(table.column("PM2.5").unwrap()[5], Some(100.0));
    }

    #[test]
    fn test_missing_counts() {
        let file = observation_csv(&[
            "NA,20,3,4,500,60,12.5,1012,-3,0,2.1,,Shunyi",
            "11,21,3,4,510,61,13.0,1011,-2,0,1.8,NE,Dongsi",
        ]);
        let table = read_observations(file.path()).unwrap();
        let counts = table.missing_counts();

        assert_eq!(counts[0], ("PM2.5".to_string(), 1));
        assert_eq!(counts.last().unwrap(), &("wd".to_string(), 1));
    }

    #[test]
    fn test_read_categories() {
        let file = create_test_csv(
            "station,TEMP_Category,PRES_Category,DEWP_Category,WSPM_Category,Count\n\
             Shunyi,Cold,Normal,Dry,Calm,2600\n\
             Dongsi,Mild,Low,Humid,Breezy,120\n",
        );
        let table = read_categories(file.path(), WEATHER_CATEGORY_FIELDS).unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(table.rows[0].station, "Shunyi");
        assert_eq!(table.rows[0].labels, vec!["Cold", "Normal", "Dry", "Calm"]);
        assert_eq!(table.rows[0].count, 2600);
    }

    #[test]
    fn test_read_categories_rejects_bad_count() {
        let file = create_test_csv(
            "station,TEMP_Category,PRES_Category,DEWP_Category,WSPM_Category,Count\n\
             Shunyi,Cold,Normal,Dry,Calm,many\n",
        );
        let err = read_categories(file.path(), WEATHER_CATEGORY_FIELDS).unwrap_err();
        assert!(matches!(err, Error::MalformedRow { row: 2, .. }));
    }

    #[test]
    fn test_head_and_header() {
        let file = observation_csv(&["10,20,3,4,500,60,12.5,1012,-3,0,2.1,N,Shunyi"]);
        let table = read_observations(file.path()).unwrap();

        let header = table.header();
        assert_eq!(header.first().map(String::as_str), Some("PM2.5"));
        assert_eq!(header.last().map(String::as_str), Some("station"));

        let head = table.head(5);
        assert_eq!(head.len(), 1);
        assert_eq!(head[0].len(), header.len());
        assert_eq!(head[0].last().map(String::as_str), Some("Shunyi"));
    }

    struct CountingSource {
        loads: AtomicUsize,
    }

    impl TableSource for CountingSource {
        fn load(&self) -> Result<DatasetBundle> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            Ok(DatasetBundle {
                combined: ObservationTable::default(),
                clean: ObservationTable::default(),
                pollution_groups: CategoryTable {
                    dimension_fields: Vec::new(),
                    rows: Vec::new(),
                },
                weather_groups: CategoryTable {
                    dimension_fields: Vec::new(),
                    rows: Vec::new(),
                },
            })
        }
    }

    #[test]
    fn test_dataset_cache_loads_once() {
        let cache = DatasetCache::new();
        let source = CountingSource {
            loads: AtomicUsize::new(0),
        };

        cache.get_or_load(&source).unwrap();
        cache.get_or_load(&source).unwrap();
        cache.get_or_load(&source).unwrap();

        assert_eq!(source.loads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_dir_source_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = DirSource::new(dir.path()).load().unwrap_err();
        assert!(matches!(err, Error::Io(_) | Error::Csv(_)));
    }
}
