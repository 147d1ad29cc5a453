use std::collections::{BTreeSet, HashMap};

use crate::dataset::CategoryTable;

/// Station-by-category-tuple cross-tabulation of summed counts
#[derive(Debug, Clone, PartialEq)]
pub struct PivotTable {
    /// Dimension field names the column tuples are drawn from
    pub dimension_fields: Vec<String>,

    /// Row keys: distinct stations, sorted
    pub index: Vec<String>,

    /// Column keys: distinct label tuples, sorted lexicographically
    pub columns: Vec<Vec<String>>,

    /// values[row][column]; 0 where no input rows match
    pub values: Vec<Vec<u64>>,
}

impl PivotTable {
    /// True when there is nothing to display
    pub fn is_empty(&self) -> bool {
        self.index.is_empty() || self.columns.is_empty()
    }

    /// Total of one column summed across all stations
    pub fn column_total(&self, col: usize) -> u64 {
        self.values.iter().map(|row| row[col]).sum()
    }

    /// Joined display label for one column tuple
    pub fn column_label(&self, col: usize) -> String {
        self.columns[col].join("-")
    }

    /// Largest cell value, for color scaling
    pub fn max_value(&self) -> u64 {
        self.values
            .iter()
            .flat_map(|row| row.iter().copied())
            .max()
            .unwrap_or(0)
    }

    /// Drop columns whose summed count is below `min_total`, preserving the
    /// relative column order. Rows are kept even when every column is dropped.
    pub fn retain_frequent(&self, min_total: u64) -> PivotTable {
        let kept: Vec<usize> = (0..self.columns.len())
            .filter(|&c| self.column_total(c) >= min_total)
            .collect();

        PivotTable {
            dimension_fields: self.dimension_fields.clone(),
            index: self.index.clone(),
            columns: kept.iter().map(|&c| self.columns[c].clone()).collect(),
            values: self
                .values
                .iter()
                .map(|row| kept.iter().map(|&c| row[c]).collect())
                .collect(),
        }
    }
}

/// Cross-tabulate a category table: one row per distinct station, one column
/// per distinct label tuple, cells holding the summed `Count`. Absent
/// (station, tuple) combinations hold 0. A table with no rows pivots to an
/// empty table.
pub fn pivot_counts(table: &CategoryTable) -> PivotTable {
    let stations: BTreeSet<&String> = table.rows.iter().map(|r| &r.station).collect();
    let tuples: BTreeSet<&Vec<String>> = table.rows.iter().map(|r| &r.labels).collect();

    let index: Vec<String> = stations.iter().map(|s| (*s).clone()).collect();
    let columns: Vec<Vec<String>> = tuples.iter().map(|t| (*t).clone()).collect();

    let row_of: HashMap<&String, usize> =
        stations.iter().enumerate().map(|(i, s)| (*s, i)).collect();
    let col_of: HashMap<&Vec<String>, usize> =
        tuples.iter().enumerate().map(|(i, t)| (*t, i)).collect();

    let mut values = vec![vec![0u64; columns.len()]; index.len()];
    for row in &table.rows {
        values[row_of[&row.station]][col_of[&row.labels]] += row.count;
    }

    PivotTable {
        dimension_fields: table.dimension_fields.clone(),
        index,
        columns,
        values,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::CategoryRow;

    fn category_table(rows: &[(&str, &[&str], u64)]) -> CategoryTable {
        CategoryTable {
            dimension_fields: vec!["A_Category".to_string(), "B_Category".to_string()],
            rows: rows
                .iter()
                .map(|(station, labels, count)| CategoryRow {
                    station: station.to_string(),
                    labels: labels.iter().map(|l| l.to_string()).collect(),
                    count: *count,
                })
                .collect(),
        }
    }

    #[test]
    fn test_pivot_sums_and_zero_fill() {
        let table = category_table(&[
            ("Shunyi", &["High", "Low"], 10),
            ("Shunyi", &["High", "Low"], 5),
            ("Dongsi", &["Low", "Low"], 7),
        ]);
        let pivot = pivot_counts(&table);

        // Rows sorted, columns sorted lexicographically by tuple
        assert_eq!(pivot.index, vec!["Dongsi", "Shunyi"]);
        assert_eq!(
            pivot.columns,
            vec![
                vec!["High".to_string(), "Low".to_string()],
                vec!["Low".to_string(), "Low".to_string()],
            ]
        );
        // Duplicated (station, tuple) rows sum; absent combinations are 0
        assert_eq!(pivot.values, vec![vec![0, 7], vec![15, 0]]);
    }

    #[test]
    fn test_pivot_column_helpers() {
        let table = category_table(&[("Tiantan", &["Normal", "High"], 3)]);
        let pivot = pivot_counts(&table);

        assert_eq!(pivot.column_label(0), "Normal-High");
        assert_eq!(pivot.column_total(0), 3);
        assert_eq!(pivot.max_value(), 3);
    }

    #[test]
    fn test_retain_frequent_drops_rare_columns() {
        let table = category_table(&[
            ("Shunyi", &["High", "Low"], 2000),
            ("Dongsi", &["High", "Low"], 600),
            ("Shunyi", &["Low", "Low"], 2499),
        ]);
        let pivot = pivot_counts(&table).retain_frequent(2500);

        // "High-Low" totals 2600 and survives; "Low-Low" totals 2499 and drops
        assert_eq!(pivot.columns.len(), 1);
        assert_eq!(pivot.column_label(0), "High-Low");
        assert_eq!(pivot.values, vec![vec![600], vec![2000]]);
    }

    #[test]
    fn test_retain_frequent_keeps_exact_threshold_total() {
        let table = category_table(&[
            ("Shunyi", &["High", "Low"], 2000),
            ("Dongsi", &["High", "Low"], 500),
            ("Shunyi", &["Low", "Low"], 2499),
        ]);
        let pivot = pivot_counts(&table).retain_frequent(2500);

        // A total of exactly 2500 sits on the boundary and is retained
        assert_eq!(pivot.columns.len(), 1);
        assert_eq!(pivot.column_label(0), "High-Low");
        assert_eq!(pivot.column_total(0), 2500);
    }

    #[test]
    fn test_retain_frequent_preserves_order() {
        let table = category_table(&[
            ("S", &["A", "A"], 5000),
            ("S", &["B", "A"], 100),
            ("S", &["C", "A"], 5000),
        ]);
        let pivot = pivot_counts(&table).retain_frequent(2500);

        assert_eq!(pivot.column_label(0), "A-A");
        assert_eq!(pivot.column_label(1), "C-A");
    }

    #[test]
    fn test_retain_frequent_can_empty_the_table() {
        let table = category_table(&[("S", &["A", "A"], 10)]);
        let pivot = pivot_counts(&table).retain_frequent(2500);

        assert!(pivot.is_empty());
        assert_eq!(pivot.index, vec!["S"]); // rows survive, columns do not
        assert_eq!(pivot.values, vec![Vec::<u64>::new()]);
    }

    #[test]
    fn test_pivot_zero_rows_is_empty_not_error() {
        let table = category_table(&[]);
        let pivot = pivot_counts(&table);

        assert!(pivot.is_empty());
        assert!(pivot.index.is_empty());
        assert!(pivot.columns.is_empty());
        assert_eq!(pivot.max_value(), 0);
    }
}
