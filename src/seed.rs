// 🌱 Seed loader
// Bulk loads the tab-separated reference data: users, dictionary, credits,
// payments and plans. Dates are written day-first.

use crate::calendar::parse_day_first;
use crate::db;
use crate::error::{Error, Result};
use crate::models::{CategoryEntry, Credit, Payment, PlanEntry, User};
use chrono::NaiveDate;
use rusqlite::Connection;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Deserialize)]
struct UserRecord {
    id: i64,
    login: String,
    registration_date: String,
}

#[derive(Debug, Deserialize)]
struct CategoryRecord {
    id: i64,
    name: String,
}

#[derive(Debug, Deserialize)]
struct CreditRecord {
    id: i64,
    user_id: i64,
    issuance_date: String,
    #[serde(default)]
    return_date: Option<String>,
    #[serde(default)]
    actual_return_date: Option<String>,
    body: f64,
    percent: f64,
}

#[derive(Debug, Deserialize)]
struct PaymentRecord {
    id: i64,
    credit_id: i64,
    payment_date: String,
    type_id: i64,
    sum: f64,
}

#[derive(Debug, Deserialize)]
struct PlanRecord {
    id: i64,
    period: String,
    sum: f64,
    category_id: i64,
}

/// Counts of rows loaded per table.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SeedSummary {
    pub users: usize,
    pub categories: usize,
    pub credits: usize,
    pub payments: usize,
    pub plans: usize,
}

/// Parses one seed table, keeping track of the line for error messages.
struct SeedTable<'a> {
    file: &'a str,
}

impl<'a> SeedTable<'a> {
    fn records<T: DeserializeOwned, R: Read>(&self, reader: R) -> Result<Vec<(usize, T)>> {
        let mut rdr = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut records = Vec::new();
        for (idx, result) in rdr.deserialize().enumerate() {
            // header is line 1
            let line = idx + 2;
            let record: T = result.map_err(|e| self.error(line, e.to_string()))?;
            records.push((line, record));
        }
        Ok(records)
    }

    fn date(&self, line: usize, value: &str) -> Result<NaiveDate> {
        parse_day_first(value).ok_or_else(|| self.error(line, format!("invalid date '{}'", value)))
    }

    fn optional_date(&self, line: usize, value: Option<&str>) -> Result<Option<NaiveDate>> {
        match value.map(str::trim) {
            None | Some("") => Ok(None),
            Some(text) => self.date(line, text).map(Some),
        }
    }

    fn error(&self, line: usize, message: String) -> Error {
        Error::Seed {
            file: self.file.to_string(),
            line,
            message,
        }
    }
}

pub fn parse_users<R: Read>(file: &str, reader: R) -> Result<Vec<User>> {
    let table = SeedTable { file };
    table
        .records::<UserRecord, _>(reader)?
        .into_iter()
        .map(|(line, r)| {
            Ok(User {
                id: r.id,
                login: r.login,
                registration_date: table.date(line, &r.registration_date)?,
            })
        })
        .collect()
}

pub fn parse_categories<R: Read>(file: &str, reader: R) -> Result<Vec<CategoryEntry>> {
    let table = SeedTable { file };
    Ok(table
        .records::<CategoryRecord, _>(reader)?
        .into_iter()
        .map(|(_, r)| CategoryEntry { id: r.id, name: r.name })
        .collect())
}

pub fn parse_credits<R: Read>(file: &str, reader: R) -> Result<Vec<Credit>> {
    let table = SeedTable { file };
    table
        .records::<CreditRecord, _>(reader)?
        .into_iter()
        .map(|(line, r)| {
            Ok(Credit {
                id: r.id,
                user_id: r.user_id,
                issuance_date: table.date(line, &r.issuance_date)?,
                return_date: table.optional_date(line, r.return_date.as_deref())?,
                actual_return_date: table.optional_date(line, r.actual_return_date.as_deref())?,
                body: r.body,
                percent: r.percent,
            })
        })
        .collect()
}

pub fn parse_payments<R: Read>(file: &str, reader: R) -> Result<Vec<Payment>> {
    let table = SeedTable { file };
    table
        .records::<PaymentRecord, _>(reader)?
        .into_iter()
        .map(|(line, r)| {
            Ok(Payment {
                id: r.id,
                credit_id: r.credit_id,
                payment_date: table.date(line, &r.payment_date)?,
                type_id: r.type_id,
                sum: r.sum,
            })
        })
        .collect()
}

pub fn parse_plans<R: Read>(file: &str, reader: R) -> Result<Vec<PlanEntry>> {
    let table = SeedTable { file };
    table
        .records::<PlanRecord, _>(reader)?
        .into_iter()
        .map(|(line, r)| {
            Ok(PlanEntry {
                id: r.id,
                period: table.date(line, &r.period)?,
                sum: r.sum,
                category_id: r.category_id,
            })
        })
        .collect()
}

/// Find `<dir>/<name>.tsv`, falling back to `<dir>/<name>.csv`.
fn seed_file(dir: &Path, name: &str) -> Option<PathBuf> {
    ["tsv", "csv"]
        .iter()
        .map(|ext| dir.join(format!("{}.{}", name, ext)))
        .find(|path| path.exists())
}

fn open(dir: &Path, name: &str) -> Result<Option<(String, std::fs::File)>> {
    match seed_file(dir, name) {
        Some(path) => {
            let file = std::fs::File::open(&path)?;
            Ok(Some((path.display().to_string(), file)))
        }
        None => Ok(None),
    }
}

/// Load every seed file present in `dir`, in dependency order.
///
/// Each table is written in its own transaction; a missing file is skipped.
pub fn load_seed_dir(conn: &Connection, dir: &Path) -> Result<SeedSummary> {
    let mut summary = SeedSummary::default();

    if let Some((name, file)) = open(dir, "users")? {
        let users = parse_users(&name, file)?;
        let tx = conn.unchecked_transaction()?;
        summary.users = db::insert_users(&tx, &users)?;
        tx.commit()?;
    }

    if let Some((name, file)) = open(dir, "dictionary")? {
        let entries = parse_categories(&name, file)?;
        let tx = conn.unchecked_transaction()?;
        summary.categories = db::insert_categories(&tx, &entries)?;
        tx.commit()?;
    }

    if let Some((name, file)) = open(dir, "credits")? {
        let credits = parse_credits(&name, file)?;
        let tx = conn.unchecked_transaction()?;
        summary.credits = db::insert_credits(&tx, &credits)?;
        tx.commit()?;
    }

    if let Some((name, file)) = open(dir, "payments")? {
        let payments = parse_payments(&name, file)?;
        let tx = conn.unchecked_transaction()?;
        summary.payments = db::insert_payments(&tx, &payments)?;
        tx.commit()?;
    }

    if let Some((name, file)) = open(dir, "plans")? {
        let plans = parse_plans(&name, file)?;
        let tx = conn.unchecked_transaction()?;
        summary.plans = db::insert_plan_entries(&tx, &plans)?;
        tx.commit()?;
    }

    info!(
        users = summary.users,
        categories = summary.categories,
        credits = summary.credits,
        payments = summary.payments,
        plans = summary.plans,
        "seed data loaded"
    );
    Ok(summary)
}
