use crate::dictionary::CategoryDictionary;
use crate::error::Result;
use crate::models::{CategoryEntry, Credit, NewPlanEntry, Payment, PlanEntry, User};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::debug;

pub fn setup_database(conn: &Connection) -> Result<()> {
    // WAL keeps readers unblocked while a plan batch is written
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;

    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY,
            login TEXT NOT NULL,
            registration_date TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS dictionary (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS credits (
            id INTEGER PRIMARY KEY,
            user_id INTEGER NOT NULL REFERENCES users(id),
            issuance_date TEXT NOT NULL,
            return_date TEXT,
            actual_return_date TEXT,
            body REAL NOT NULL,
            percent REAL NOT NULL
        );

        CREATE TABLE IF NOT EXISTS payments (
            id INTEGER PRIMARY KEY,
            credit_id INTEGER NOT NULL REFERENCES credits(id),
            payment_date TEXT NOT NULL,
            type_id INTEGER NOT NULL REFERENCES dictionary(id),
            sum REAL NOT NULL
        );

        CREATE TABLE IF NOT EXISTS plans (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            period TEXT NOT NULL,
            sum REAL NOT NULL,
            category_id INTEGER NOT NULL REFERENCES dictionary(id)
        );

        CREATE INDEX IF NOT EXISTS idx_credits_user ON credits(user_id);
        CREATE INDEX IF NOT EXISTS idx_credits_issuance ON credits(issuance_date);
        CREATE INDEX IF NOT EXISTS idx_payments_credit ON payments(credit_id);
        CREATE INDEX IF NOT EXISTS idx_payments_date ON payments(payment_date);
        CREATE UNIQUE INDEX IF NOT EXISTS idx_plans_period_category ON plans(period, category_id);",
    )?;

    Ok(())
}

// ============================================================================
// Row mappers
// ============================================================================

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        login: row.get(1)?,
        registration_date: row.get(2)?,
    })
}

fn credit_from_row(row: &Row<'_>) -> rusqlite::Result<Credit> {
    Ok(Credit {
        id: row.get(0)?,
        user_id: row.get(1)?,
        issuance_date: row.get(2)?,
        return_date: row.get(3)?,
        actual_return_date: row.get(4)?,
        body: row.get(5)?,
        percent: row.get(6)?,
    })
}

fn payment_from_row(row: &Row<'_>) -> rusqlite::Result<Payment> {
    Ok(Payment {
        id: row.get(0)?,
        credit_id: row.get(1)?,
        payment_date: row.get(2)?,
        type_id: row.get(3)?,
        sum: row.get(4)?,
    })
}

fn plan_from_row(row: &Row<'_>) -> rusqlite::Result<PlanEntry> {
    Ok(PlanEntry {
        id: row.get(0)?,
        period: row.get(1)?,
        sum: row.get(2)?,
        category_id: row.get(3)?,
    })
}

const CREDIT_COLUMNS: &str =
    "id, user_id, issuance_date, return_date, actual_return_date, body, percent";
const PAYMENT_COLUMNS: &str = "id, credit_id, payment_date, type_id, sum";
const PLAN_COLUMNS: &str = "id, period, sum, category_id";

// ============================================================================
// Bulk writes
//
// None of these open a transaction: callers decide the unit of work.
// ============================================================================

pub fn insert_users(conn: &Connection, users: &[User]) -> Result<usize> {
    let mut stmt = conn.prepare_cached(
        "INSERT INTO users (id, login, registration_date) VALUES (?1, ?2, ?3)",
    )?;
    for user in users {
        stmt.execute(params![user.id, user.login, user.registration_date])?;
    }
    Ok(users.len())
}

pub fn insert_categories(conn: &Connection, entries: &[CategoryEntry]) -> Result<usize> {
    let mut stmt = conn.prepare_cached("INSERT INTO dictionary (id, name) VALUES (?1, ?2)")?;
    for entry in entries {
        stmt.execute(params![entry.id, entry.name])?;
    }
    Ok(entries.len())
}

pub fn insert_credits(conn: &Connection, credits: &[Credit]) -> Result<usize> {
    let mut stmt = conn.prepare_cached(
        "INSERT INTO credits (
            id, user_id, issuance_date, return_date, actual_return_date, body, percent
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    )?;
    for credit in credits {
        stmt.execute(params![
            credit.id,
            credit.user_id,
            credit.issuance_date,
            credit.return_date,
            credit.actual_return_date,
            credit.body,
            credit.percent,
        ])?;
    }
    Ok(credits.len())
}

pub fn insert_payments(conn: &Connection, payments: &[Payment]) -> Result<usize> {
    let mut stmt = conn.prepare_cached(
        "INSERT INTO payments (id, credit_id, payment_date, type_id, sum)
         VALUES (?1, ?2, ?3, ?4, ?5)",
    )?;
    for payment in payments {
        stmt.execute(params![
            payment.id,
            payment.credit_id,
            payment.payment_date,
            payment.type_id,
            payment.sum,
        ])?;
    }
    Ok(payments.len())
}

/// Insert plans that already carry their ids (seed files).
pub fn insert_plan_entries(conn: &Connection, plans: &[PlanEntry]) -> Result<usize> {
    let mut stmt = conn.prepare_cached(
        "INSERT INTO plans (id, period, sum, category_id) VALUES (?1, ?2, ?3, ?4)",
    )?;
    for plan in plans {
        stmt.execute(params![plan.id, plan.period, plan.sum, plan.category_id])?;
    }
    Ok(plans.len())
}

/// Insert validated plans, letting the store assign ids.
pub fn insert_plans(conn: &Connection, plans: &[NewPlanEntry]) -> Result<usize> {
    let mut stmt = conn.prepare_cached(
        "INSERT INTO plans (period, sum, category_id) VALUES (?1, ?2, ?3)",
    )?;
    for plan in plans {
        stmt.execute(params![plan.period, plan.sum, plan.category_id])?;
    }
    Ok(plans.len())
}

// ============================================================================
// Reads
// ============================================================================

pub fn find_user(conn: &Connection, user_id: i64) -> Result<Option<User>> {
    let user = conn
        .query_row(
            "SELECT id, login, registration_date FROM users WHERE id = ?1",
            [user_id],
            user_from_row,
        )
        .optional()?;
    Ok(user)
}

pub fn credits_for_user(conn: &Connection, user_id: i64) -> Result<Vec<Credit>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {CREDIT_COLUMNS} FROM credits WHERE user_id = ?1 ORDER BY issuance_date, id"
    ))?;
    let credits = stmt
        .query_map([user_id], credit_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(credits)
}

pub fn payments_for_credit(conn: &Connection, credit_id: i64) -> Result<Vec<Payment>> {
    let mut stmt = conn.prepare_cached(&format!(
        "SELECT {PAYMENT_COLUMNS} FROM payments WHERE credit_id = ?1 ORDER BY payment_date, id"
    ))?;
    let payments = stmt
        .query_map([credit_id], payment_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(payments)
}

pub fn all_categories(conn: &Connection) -> Result<Vec<CategoryEntry>> {
    let mut stmt = conn.prepare("SELECT id, name FROM dictionary ORDER BY id")?;
    let entries = stmt
        .query_map([], |row| {
            Ok(CategoryEntry {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(entries)
}

pub fn load_dictionary(conn: &Connection) -> Result<CategoryDictionary> {
    Ok(CategoryDictionary::new(all_categories(conn)?))
}

/// Exact (case-sensitive) name lookup.
pub fn find_category_by_name(conn: &Connection, name: &str) -> Result<Option<CategoryEntry>> {
    let entry = conn
        .query_row(
            "SELECT id, name FROM dictionary WHERE name = ?1 ORDER BY id LIMIT 1",
            [name],
            |row| {
                Ok(CategoryEntry {
                    id: row.get(0)?,
                    name: row.get(1)?,
                })
            },
        )
        .optional()?;
    Ok(entry)
}

pub fn plan_exists(conn: &Connection, period: NaiveDate, category_id: i64) -> Result<bool> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM plans WHERE period = ?1 AND category_id = ?2)",
        params![period, category_id],
        |row| row.get(0),
    )?;
    Ok(exists)
}

pub fn plans_for_period(conn: &Connection, period: NaiveDate) -> Result<Vec<PlanEntry>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {PLAN_COLUMNS} FROM plans WHERE period = ?1 ORDER BY category_id, id"
    ))?;
    let plans = stmt
        .query_map([period], plan_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(plans)
}

/// Plans with `period` in `[from, to]`.
pub fn plans_between(conn: &Connection, from: NaiveDate, to: NaiveDate) -> Result<Vec<PlanEntry>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {PLAN_COLUMNS} FROM plans WHERE period BETWEEN ?1 AND ?2 ORDER BY period, category_id"
    ))?;
    let plans = stmt
        .query_map(params![from, to], plan_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    debug!(count = plans.len(), %from, %to, "fetched plans");
    Ok(plans)
}

/// Credits with `issuance_date` in `[from, to]`.
pub fn credits_issued_between(
    conn: &Connection,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<Vec<Credit>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {CREDIT_COLUMNS} FROM credits
         WHERE issuance_date BETWEEN ?1 AND ?2
         ORDER BY issuance_date, id"
    ))?;
    let credits = stmt
        .query_map(params![from, to], credit_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    debug!(count = credits.len(), %from, %to, "fetched credits");
    Ok(credits)
}

/// Payments with `payment_date` in `[from, to]`.
pub fn payments_between(conn: &Connection, from: NaiveDate, to: NaiveDate) -> Result<Vec<Payment>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {PAYMENT_COLUMNS} FROM payments
         WHERE payment_date BETWEEN ?1 AND ?2
         ORDER BY payment_date, id"
    ))?;
    let payments = stmt
        .query_map(params![from, to], payment_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    debug!(count = payments.len(), %from, %to, "fetched payments");
    Ok(payments)
}

pub fn sum_credits_issued_between(conn: &Connection, from: NaiveDate, to: NaiveDate) -> Result<f64> {
    let total: f64 = conn.query_row(
        "SELECT COALESCE(SUM(body), 0.0) FROM credits WHERE issuance_date BETWEEN ?1 AND ?2",
        params![from, to],
        |row| row.get(0),
    )?;
    Ok(total)
}

pub fn sum_payments_between(conn: &Connection, from: NaiveDate, to: NaiveDate) -> Result<f64> {
    let total: f64 = conn.query_row(
        "SELECT COALESCE(SUM(sum), 0.0) FROM payments WHERE payment_date BETWEEN ?1 AND ?2",
        params![from, to],
        |row| row.get(0),
    )?;
    Ok(total)
}

pub fn count_plans(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM plans", [], |row| row.get(0))?;
    Ok(count)
}
