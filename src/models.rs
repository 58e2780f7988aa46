// 🧾 Record kinds stored by the reporting API
// Users, credits, payments and plans are plain rows keyed by integer ids

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub login: String,
    pub registration_date: NaiveDate,
}

/// A loan issued to one user.
///
/// A credit is closed once `actual_return_date` is recorded, open otherwise,
/// even when the planned `return_date` has already passed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credit {
    pub id: i64,
    pub user_id: i64,
    pub issuance_date: NaiveDate,
    pub return_date: Option<NaiveDate>,
    pub actual_return_date: Option<NaiveDate>,
    /// Principal
    pub body: f64,
    /// Interest
    pub percent: f64,
}

impl Credit {
    pub fn is_closed(&self) -> bool {
        self.actual_return_date.is_some()
    }

    /// Days past the planned return date as of `today`, 0 if not yet due.
    pub fn overdue_days(&self, today: NaiveDate) -> i64 {
        match self.return_date {
            Some(due) if today > due => (today - due).num_days(),
            _ => 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: i64,
    pub credit_id: i64,
    pub payment_date: NaiveDate,
    /// Dictionary id classifying the payment (principal or interest)
    pub type_id: i64,
    pub sum: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryEntry {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanEntry {
    pub id: i64,
    /// Always the first day of a month
    pub period: NaiveDate,
    pub sum: f64,
    pub category_id: i64,
}

/// A validated plan row waiting for insertion.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPlanEntry {
    pub period: NaiveDate,
    pub sum: f64,
    pub category_id: i64,
}
