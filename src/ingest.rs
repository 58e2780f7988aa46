// 📥 Plan ingestion
// Uploaded table → schema-checked rows → validated plans → one bulk write
//
// Validation of the whole batch happens inside the write transaction and
// before the first insert, so a rejected batch leaves the store untouched.

use crate::calendar::parse_day_first;
use crate::db;
use crate::error::{Error, Result, ValidationError};
use crate::models::NewPlanEntry;
use calamine::{Data, Reader, Xlsx};
use chrono::{Datelike, NaiveDate};
use rusqlite::Connection;
use std::collections::HashSet;
use std::io::Cursor;
use tracing::{info, warn};

pub const REQUIRED_COLUMNS: [&str; 3] = ["period", "category", "sum"];

// ============================================================================
// TABLE FORMAT
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    Xlsx,
    Csv,
    Tsv,
}

impl TableFormat {
    /// Pick the format from the uploaded file name's extension.
    pub fn from_file_name(file_name: &str) -> Result<TableFormat> {
        let lower = file_name.trim().to_lowercase();
        if lower.ends_with(".xlsx") {
            Ok(TableFormat::Xlsx)
        } else if lower.ends_with(".csv") {
            Ok(TableFormat::Csv)
        } else if lower.ends_with(".tsv") {
            Ok(TableFormat::Tsv)
        } else {
            Err(Error::UnsupportedFile(file_name.to_string()))
        }
    }
}

// ============================================================================
// PLAN ROW
// ============================================================================

/// One data row of an uploaded plan table, cells still as text.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PlanRow {
    /// 1-based data row number (header excluded)
    pub line: usize,
    pub period: Option<String>,
    pub category: Option<String>,
    pub sum: Option<String>,
}

impl PlanRow {
    fn is_blank(&self) -> bool {
        self.period.is_none() && self.category.is_none() && self.sum.is_none()
    }
}

/// Column positions of the required fields, found in the header row.
struct ColumnMap {
    period: usize,
    category: usize,
    sum: usize,
}

impl ColumnMap {
    fn from_headers<'a>(headers: impl IntoIterator<Item = &'a str>) -> Result<ColumnMap> {
        let headers: Vec<String> = headers.into_iter().map(|h| h.trim().to_string()).collect();
        let position = |name: &str| headers.iter().position(|h| h == name);

        let missing: Vec<String> = REQUIRED_COLUMNS
            .iter()
            .filter(|name| position(name).is_none())
            .map(|name| name.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(Error::MissingColumns(missing));
        }

        Ok(ColumnMap {
            period: position("period").unwrap_or_default(),
            category: position("category").unwrap_or_default(),
            sum: position("sum").unwrap_or_default(),
        })
    }

    fn row(&self, line: usize, cells: &[Option<String>]) -> PlanRow {
        let cell = |idx: usize| cells.get(idx).cloned().flatten();
        PlanRow {
            line,
            period: cell(self.period),
            category: cell(self.category),
            sum: cell(self.sum),
        }
    }
}

fn non_empty(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Read an uploaded plan table, checking the required columns first.
pub fn read_plan_table(file_name: &str, bytes: &[u8]) -> Result<Vec<PlanRow>> {
    let rows = match TableFormat::from_file_name(file_name)? {
        TableFormat::Xlsx => read_xlsx(bytes)?,
        TableFormat::Csv => read_delimited(bytes, b',')?,
        TableFormat::Tsv => read_delimited(bytes, b'\t')?,
    };
    Ok(rows.into_iter().filter(|row| !row.is_blank()).collect())
}

fn read_delimited(bytes: &[u8], delimiter: u8) -> Result<Vec<PlanRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(bytes);

    let columns = ColumnMap::from_headers(reader.headers()?.iter())?;

    let mut rows = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        let record = record?;
        let cells: Vec<Option<String>> = record.iter().map(non_empty).collect();
        rows.push(columns.row(idx + 1, &cells));
    }
    Ok(rows)
}

/// Render a spreadsheet cell as text; dates become ISO strings.
fn cell_text(cell: &Data) -> Option<String> {
    match cell {
        Data::Empty | Data::Error(_) => None,
        Data::String(s) => non_empty(s),
        Data::Float(f) => Some(f.to_string()),
        Data::Int(i) => Some(i.to_string()),
        Data::Bool(b) => Some(b.to_string()),
        Data::DateTime(dt) => dt
            .as_datetime()
            .map(|d| d.date().format("%Y-%m-%d").to_string()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => non_empty(s),
    }
}

fn read_xlsx(bytes: &[u8]) -> Result<Vec<PlanRow>> {
    let mut workbook: Xlsx<_> = Xlsx::new(Cursor::new(bytes.to_vec()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| Error::MalformedTable("workbook has no sheets".to_string()))??;

    let mut sheet_rows = range.rows();
    let header: Vec<String> = match sheet_rows.next() {
        Some(cells) => cells.iter().map(|c| cell_text(c).unwrap_or_default()).collect(),
        None => return Err(Error::MissingColumns(REQUIRED_COLUMNS.iter().map(|c| c.to_string()).collect())),
    };
    let columns = ColumnMap::from_headers(header.iter().map(String::as_str))?;

    Ok(sheet_rows
        .enumerate()
        .map(|(idx, cells)| {
            let cells: Vec<Option<String>> = cells.iter().map(cell_text).collect();
            columns.row(idx + 1, &cells)
        })
        .collect())
}

// ============================================================================
// VALIDATION
// ============================================================================

fn parse_sum(line: usize, raw: &str) -> std::result::Result<f64, ValidationError> {
    let normalized: String = raw
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| if c == ',' { '.' } else { c })
        .collect();
    match normalized.parse::<f64>() {
        // plan targets are never negative
        Ok(value) if value.is_finite() && value >= 0.0 => Ok(value),
        _ => Err(ValidationError::InvalidSum {
            line,
            value: raw.to_string(),
        }),
    }
}

/// Validate every row against the store, in row order.
///
/// Checks per row: period is a first-of-month date, sum is present, category
/// exists by exact name, and no plan exists for (period, category) in the
/// store or earlier in the batch.
pub fn validate_plan_rows(conn: &Connection, rows: &[PlanRow]) -> Result<Vec<NewPlanEntry>> {
    let mut validated = Vec::with_capacity(rows.len());
    let mut seen: HashSet<(NaiveDate, i64)> = HashSet::new();

    for row in rows {
        let raw_period = row.period.as_deref().unwrap_or_default();
        let period = parse_day_first(raw_period).ok_or_else(|| ValidationError::InvalidPeriod {
            line: row.line,
            value: raw_period.to_string(),
        })?;
        if period.day() != 1 {
            return Err(ValidationError::PeriodNotFirstOfMonth {
                line: row.line,
                period,
            }
            .into());
        }

        let sum = match row.sum.as_deref() {
            Some(raw) => parse_sum(row.line, raw)?,
            None => return Err(ValidationError::MissingSum { line: row.line }.into()),
        };

        let category_name = row.category.as_deref().unwrap_or_default();
        let category = db::find_category_by_name(conn, category_name)?.ok_or_else(|| {
            ValidationError::UnknownCategory {
                line: row.line,
                name: category_name.to_string(),
            }
        })?;

        if !seen.insert((period, category.id)) || db::plan_exists(conn, period, category.id)? {
            return Err(ValidationError::DuplicatePlan {
                line: row.line,
                period,
                category: category.name,
            }
            .into());
        }

        validated.push(NewPlanEntry {
            period,
            sum,
            category_id: category.id,
        });
    }

    Ok(validated)
}

/// Validate the batch and insert it; returns the number of inserted plans.
pub fn insert_plan_rows(conn: &Connection, rows: &[PlanRow]) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;

    let plans = match validate_plan_rows(&tx, rows) {
        Ok(plans) => plans,
        Err(e) => {
            warn!(error = %e, rows = rows.len(), "rejected plan batch");
            return Err(e);
        }
    };

    let inserted = db::insert_plans(&tx, &plans)?;
    tx.commit()?;

    info!(inserted, "inserted plans");
    Ok(inserted)
}

/// Read an uploaded file and insert its plans.
pub fn import_plan_file(conn: &Connection, file_name: &str, bytes: &[u8]) -> Result<usize> {
    let rows = read_plan_table(file_name, bytes)?;
    insert_plan_rows(conn, &rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::tests::{date, test_store};

    fn row(line: usize, period: &str, category: &str, sum: Option<&str>) -> PlanRow {
        PlanRow {
            line,
            period: non_empty(period),
            category: non_empty(category),
            sum: sum.and_then(non_empty),
        }
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(TableFormat::from_file_name("plans.xlsx").unwrap(), TableFormat::Xlsx);
        assert_eq!(TableFormat::from_file_name("PLANS.CSV").unwrap(), TableFormat::Csv);
        assert_eq!(TableFormat::from_file_name("plans.tsv").unwrap(), TableFormat::Tsv);
        assert!(matches!(
            TableFormat::from_file_name("plans.xls"),
            Err(Error::UnsupportedFile(_))
        ));
    }

    #[test]
    fn test_read_csv_table() {
        let csv = "period,category,sum,comment\n01.03.2024,видача,10000,q1\n,,,\n01/04/2024,збір,,\n";
        let rows = read_plan_table("plans.csv", csv.as_bytes()).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], row(1, "01.03.2024", "видача", Some("10000")));
        assert_eq!(rows[1].line, 3);
        assert_eq!(rows[1].sum, None);
    }

    #[test]
    fn test_read_tsv_table_reordered_columns() {
        let tsv = "sum\tperiod\tcategory\n500\t01/02/2024\tзбір\n";
        let rows = read_plan_table("plans.tsv", tsv.as_bytes()).unwrap();
        assert_eq!(rows, vec![row(1, "01/02/2024", "збір", Some("500"))]);
    }

    #[test]
    fn test_missing_columns_rejected_before_rows() {
        let csv = "period,sum\n01/02/2024,500\n";
        let err = read_plan_table("plans.csv", csv.as_bytes()).unwrap_err();
        match &err {
            Error::MissingColumns(columns) => assert_eq!(columns, &vec!["category".to_string()]),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(err.to_string(), "file must contain the columns: category");
    }

    #[test]
    fn test_read_xlsx_table() {
        let bytes = include_bytes!("../data/fixtures/plans.xlsx");
        let rows = read_plan_table("plans.xlsx", bytes).unwrap();

        assert_eq!(rows.len(), 2);
        // date-formatted serial cell comes back as an ISO date
        assert_eq!(rows[0], row(1, "2024-03-01", "видача", Some("10000")));
        assert_eq!(rows[1], row(2, "01/04/2024", "збір", Some("2500.5")));
    }

    #[test]
    fn test_import_xlsx_file() {
        let conn = test_store();
        let bytes = include_bytes!("../data/fixtures/plans.xlsx");

        assert_eq!(import_plan_file(&conn, "plans.xlsx", bytes).unwrap(), 2);
        assert_eq!(db::plans_for_period(&conn, date(2024, 3, 1)).unwrap().len(), 1);
        let april = db::plans_for_period(&conn, date(2024, 4, 1)).unwrap();
        assert_eq!(april[0].sum, 2500.5);
    }

    #[test]
    fn test_xlsx_missing_columns() {
        let bytes = include_bytes!("../data/fixtures/plans_without_sum.xlsx");
        let err = read_plan_table("plans.xlsx", bytes).unwrap_err();
        match err {
            Error::MissingColumns(columns) => assert_eq!(columns, vec!["sum".to_string()]),
            other => panic!("unexpected error: {other}"),
        }

        let bytes = include_bytes!("../data/fixtures/empty.xlsx");
        let err = read_plan_table("plans.xlsx", bytes).unwrap_err();
        match err {
            Error::MissingColumns(columns) => assert_eq!(columns.len(), REQUIRED_COLUMNS.len()),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_valid_batch_inserted() {
        let conn = test_store();
        let rows = vec![
            row(1, "01/03/2024", "видача", Some("10000")),
            row(2, "2024-03-01", "збір", Some("2500,50")),
        ];

        let inserted = insert_plan_rows(&conn, &rows).unwrap();
        assert_eq!(inserted, 2);

        let plans = db::plans_for_period(&conn, date(2024, 3, 1)).unwrap();
        assert_eq!(plans.len(), 2);
        assert_eq!(plans[1].sum, 2500.5);
    }

    #[test]
    fn test_period_must_be_first_of_month() {
        let conn = test_store();
        let rows = vec![row(1, "15/03/2024", "видача", Some("10000"))];

        let err = insert_plan_rows(&conn, &rows).unwrap_err();
        assert!(matches!(
            err,
            Error::Validation(ValidationError::PeriodNotFirstOfMonth { line: 1, .. })
        ));
        assert!(err.to_string().contains("period must be first of month"));
        assert_eq!(db::count_plans(&conn).unwrap(), 0);
    }

    #[test]
    fn test_checks_run_in_order() {
        let conn = test_store();

        // bad period wins over the missing sum and unknown category
        let err = validate_plan_rows(&conn, &[row(1, "not a date", "nope", None)]).unwrap_err();
        assert!(matches!(err, Error::Validation(ValidationError::InvalidPeriod { .. })));

        let err = validate_plan_rows(&conn, &[row(1, "01/03/2024", "nope", None)]).unwrap_err();
        assert!(matches!(err, Error::Validation(ValidationError::MissingSum { line: 1 })));

        let err = validate_plan_rows(&conn, &[row(1, "01/03/2024", "nope", Some("x1"))]).unwrap_err();
        assert!(matches!(err, Error::Validation(ValidationError::InvalidSum { .. })));

        let err = validate_plan_rows(&conn, &[row(1, "01/03/2024", "Видача", Some("1"))]).unwrap_err();
        assert!(matches!(err, Error::Validation(ValidationError::UnknownCategory { .. })));
    }

    #[test]
    fn test_negative_sum_rejected() {
        let conn = test_store();
        let rows = vec![
            row(1, "01/03/2024", "видача", Some("10000")),
            row(2, "01/03/2024", "збір", Some("-500")),
        ];

        let err = insert_plan_rows(&conn, &rows).unwrap_err();
        assert!(matches!(
            err,
            Error::Validation(ValidationError::InvalidSum { line: 2, .. })
        ));
        assert_eq!(db::count_plans(&conn).unwrap(), 0);

        assert_eq!(parse_sum(1, "0").unwrap(), 0.0);
    }

    #[test]
    fn test_batch_is_all_or_nothing() {
        let conn = test_store();
        let rows = vec![
            row(1, "01/01/2024", "видача", Some("100")),
            row(2, "01/02/2024", "видача", Some("200")),
            row(3, "01/03/2024", "unknown", Some("300")),
        ];

        let err = insert_plan_rows(&conn, &rows).unwrap_err();
        assert!(matches!(
            err,
            Error::Validation(ValidationError::UnknownCategory { line: 3, .. })
        ));
        assert_eq!(db::count_plans(&conn).unwrap(), 0);
    }

    #[test]
    fn test_duplicate_plan_rejected() {
        let conn = test_store();
        let rows = vec![row(1, "01/01/2024", "видача", Some("10000"))];

        assert_eq!(insert_plan_rows(&conn, &rows).unwrap(), 1);
        let err = insert_plan_rows(&conn, &rows).unwrap_err();
        assert!(matches!(
            err,
            Error::Validation(ValidationError::DuplicatePlan { .. })
        ));
        assert_eq!(db::count_plans(&conn).unwrap(), 1);
    }

    #[test]
    fn test_duplicate_within_batch_rejected() {
        let conn = test_store();
        let rows = vec![
            row(1, "01/01/2024", "збір", Some("100")),
            row(2, "2024-01-01", "збір", Some("200")),
        ];

        let err = insert_plan_rows(&conn, &rows).unwrap_err();
        assert!(matches!(
            err,
            Error::Validation(ValidationError::DuplicatePlan { line: 2, .. })
        ));
        assert_eq!(db::count_plans(&conn).unwrap(), 0);
    }

    #[test]
    fn test_import_plan_file() {
        let conn = test_store();
        let csv = "period,category,sum\n01/05/2024,видача,7000\n01/05/2024,збір,3000\n";
        assert_eq!(import_plan_file(&conn, "may.csv", csv.as_bytes()).unwrap(), 2);
        assert!(matches!(
            import_plan_file(&conn, "may.txt", csv.as_bytes()),
            Err(Error::UnsupportedFile(_))
        ));
    }
}
