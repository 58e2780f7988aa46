// 📊 Reporting Engine - plan vs actual
// Credit summaries per user, monthly plan completion and the yearly breakdown
//
// Every percentage goes through calendar::percentage, so an empty plan or an
// empty year reports 0 instead of dividing by zero.

use crate::calendar::{month_label, month_start, percentage, round2, year_months};
use crate::db;
use crate::dictionary::{CategoryKind, COLLECTION_CATEGORY_ID, ISSUANCE_CATEGORY_ID};
use crate::error::{Error, Result};
use crate::models::{Credit, Payment, PlanEntry};
use chrono::{Datelike, Local, NaiveDate};
use rusqlite::Connection;
use serde::ser::{SerializeStruct, Serializer};
use serde::Serialize;
use tracing::debug;

// ============================================================================
// CREDIT VIEW
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct ClosedCredit {
    pub issuance_date: NaiveDate,
    pub actual_return_date: NaiveDate,
    pub body: f64,
    pub percent: f64,
    pub total_payments: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OpenCredit {
    pub issuance_date: NaiveDate,
    pub return_date: Option<NaiveDate>,
    pub overdue_days: i64,
    pub body: f64,
    pub percent: f64,
    /// Paid towards principal
    pub body_payments: f64,
    /// Paid towards interest
    pub percent_payments: f64,
}

/// One credit of a user: repaid (closed) or still outstanding (open).
///
/// Serialized flat with an `is_closed` flag; fields of the other variant are
/// absent rather than null.
#[derive(Debug, Clone, PartialEq)]
pub enum CreditView {
    Closed(ClosedCredit),
    Open(OpenCredit),
}

impl CreditView {
    pub fn is_closed(&self) -> bool {
        matches!(self, CreditView::Closed(_))
    }

    pub fn issuance_date(&self) -> NaiveDate {
        match self {
            CreditView::Closed(c) => c.issuance_date,
            CreditView::Open(c) => c.issuance_date,
        }
    }

    /// Build the view of `credit` from its payments as of `today`.
    pub fn build(
        credit: &Credit,
        payments: &[Payment],
        kind_of: impl Fn(i64) -> Option<CategoryKind>,
        today: NaiveDate,
    ) -> CreditView {
        match credit.actual_return_date {
            Some(actual_return_date) => CreditView::Closed(ClosedCredit {
                issuance_date: credit.issuance_date,
                actual_return_date,
                body: credit.body,
                percent: credit.percent,
                total_payments: payments.iter().map(|p| p.sum).sum(),
            }),
            None => {
                let paid = |kind: CategoryKind| -> f64 {
                    payments
                        .iter()
                        .filter(|p| kind_of(p.type_id) == Some(kind))
                        .map(|p| p.sum)
                        .sum()
                };
                CreditView::Open(OpenCredit {
                    issuance_date: credit.issuance_date,
                    return_date: credit.return_date,
                    overdue_days: credit.overdue_days(today),
                    body: credit.body,
                    percent: credit.percent,
                    body_payments: paid(CategoryKind::Principal),
                    percent_payments: paid(CategoryKind::Interest),
                })
            }
        }
    }
}

impl Serialize for CreditView {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            CreditView::Closed(c) => {
                let mut s = serializer.serialize_struct("CreditView", 6)?;
                s.serialize_field("issuance_date", &c.issuance_date)?;
                s.serialize_field("is_closed", &true)?;
                s.serialize_field("actual_return_date", &c.actual_return_date)?;
                s.serialize_field("body", &c.body)?;
                s.serialize_field("percent", &c.percent)?;
                s.serialize_field("total_payments", &c.total_payments)?;
                s.end()
            }
            CreditView::Open(c) => {
                let mut s = serializer.serialize_struct("CreditView", 8)?;
                s.serialize_field("issuance_date", &c.issuance_date)?;
                s.serialize_field("is_closed", &false)?;
                match c.return_date {
                    Some(return_date) => s.serialize_field("return_date", &return_date)?,
                    None => s.skip_field("return_date")?,
                }
                s.serialize_field("overdue_days", &c.overdue_days)?;
                s.serialize_field("body", &c.body)?;
                s.serialize_field("percent", &c.percent)?;
                s.serialize_field("body_payments", &c.body_payments)?;
                s.serialize_field("percent_payments", &c.percent_payments)?;
                s.end()
            }
        }
    }
}

// ============================================================================
// PLAN PERFORMANCE VIEWS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanPerformanceView {
    /// `YYYY-MM`
    pub month: String,
    pub category: String,
    pub planned_sum: f64,
    pub actual_sum: f64,
    pub percent_completion: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyPerformanceView {
    /// `YYYY-MM`
    pub month: String,

    pub credits_count: usize,
    pub planned_credits_sum: f64,
    pub actual_credits_sum: f64,
    pub credits_completion_percent: f64,
    /// Month's share of the year's issued principal
    pub credits_share_percent: f64,

    pub payments_count: usize,
    pub planned_payments_sum: f64,
    pub actual_payments_sum: f64,
    pub payments_completion_percent: f64,
    /// Month's share of the year's collected payments
    pub payments_share_percent: f64,
}

// ============================================================================
// OPERATIONS
// ============================================================================

/// Credit summaries of a user; empty when the user does not exist.
pub fn get_user_credits(conn: &Connection, user_id: i64) -> Result<Vec<CreditView>> {
    get_user_credits_at(conn, user_id, Local::now().date_naive())
}

/// Same as [`get_user_credits`], with overdue days counted up to `today`.
pub fn get_user_credits_at(
    conn: &Connection,
    user_id: i64,
    today: NaiveDate,
) -> Result<Vec<CreditView>> {
    if db::find_user(conn, user_id)?.is_none() {
        debug!(user_id, "user not found");
        return Ok(Vec::new());
    }

    let dictionary = db::load_dictionary(conn)?;
    let mut views = Vec::new();

    for credit in db::credits_for_user(conn, user_id)? {
        let payments = db::payments_for_credit(conn, credit.id)?;
        views.push(CreditView::build(
            &credit,
            &payments,
            |type_id| dictionary.kind_of(type_id),
            today,
        ));
    }

    Ok(views)
}

/// Plan completion for the month of `check_date`, counting activity from the
/// first of the month up to and including `check_date`.
pub fn get_plans_performance(
    conn: &Connection,
    check_date: NaiveDate,
) -> Result<Vec<PlanPerformanceView>> {
    let first = month_start(check_date);
    let dictionary = db::load_dictionary(conn)?;

    let mut views = Vec::new();
    for plan in db::plans_for_period(conn, first)? {
        // every payment counts towards collection, whatever its type
        let actual_sum = match dictionary.kind_of(plan.category_id) {
            Some(CategoryKind::Issuance) => db::sum_credits_issued_between(conn, first, check_date)?,
            Some(CategoryKind::Collection) => db::sum_payments_between(conn, first, check_date)?,
            _ => 0.0,
        };

        views.push(PlanPerformanceView {
            month: month_label(plan.period),
            category: dictionary
                .name_of(plan.category_id)
                .unwrap_or_default()
                .to_string(),
            planned_sum: plan.sum,
            actual_sum,
            percent_completion: percentage(actual_sum, plan.sum),
        });
    }

    Ok(views)
}

/// Month-by-month plan vs actual for `year`, always twelve entries.
///
/// A year whose months cannot all be represented is rejected with
/// [`Error::InvalidYear`] before the store is queried.
pub fn get_year_performance(conn: &Connection, year: i32) -> Result<Vec<MonthlyPerformanceView>> {
    let months = year_months(year).ok_or(Error::InvalidYear(year))?;
    let (from, to) = (months[0].0, months[11].1);

    let plans = db::plans_between(conn, from, to)?;
    let credits = db::credits_issued_between(conn, from, to)?;
    let payments = db::payments_between(conn, from, to)?;

    year_performance(year, &plans, &credits, &payments)
}

/// Pure part of [`get_year_performance`] over already fetched rows.
pub fn year_performance(
    year: i32,
    plans: &[PlanEntry],
    credits: &[Credit],
    payments: &[Payment],
) -> Result<Vec<MonthlyPerformanceView>> {
    let months = year_months(year).ok_or(Error::InvalidYear(year))?;
    let total_credits_sum: f64 = credits.iter().map(|c| c.body).sum();
    let total_payments_sum: f64 = payments.iter().map(|p| p.sum).sum();

    debug!(year, plans = plans.len(), credits = credits.len(), "building year report");
    Ok(months
        .into_iter()
        .map(|(first, last)| {
            let in_month = |d: NaiveDate| d >= first && d <= last;
            let planned = |category_id: i64| -> f64 {
                plans
                    .iter()
                    .filter(|p| p.category_id == category_id && in_month(p.period))
                    .map(|p| p.sum)
                    .sum()
            };

            let month_credits: Vec<&Credit> =
                credits.iter().filter(|c| in_month(c.issuance_date)).collect();
            let month_payments: Vec<&Payment> =
                payments.iter().filter(|p| in_month(p.payment_date)).collect();

            let planned_credits_sum = planned(ISSUANCE_CATEGORY_ID);
            let planned_payments_sum = planned(COLLECTION_CATEGORY_ID);
            let actual_credits_sum: f64 = month_credits.iter().map(|c| c.body).sum();
            let actual_payments_sum: f64 = month_payments.iter().map(|p| p.sum).sum();

            MonthlyPerformanceView {
                month: month_label(first),
                credits_count: month_credits.len(),
                planned_credits_sum: round2(planned_credits_sum),
                actual_credits_sum: round2(actual_credits_sum),
                credits_completion_percent: percentage(actual_credits_sum, planned_credits_sum),
                credits_share_percent: percentage(actual_credits_sum, total_credits_sum),
                payments_count: month_payments.len(),
                planned_payments_sum: round2(planned_payments_sum),
                actual_payments_sum: round2(actual_payments_sum),
                payments_completion_percent: percentage(actual_payments_sum, planned_payments_sum),
                payments_share_percent: percentage(actual_payments_sum, total_payments_sum),
            }
        })
        .collect())
}

/// Month number (1..=12) of a `YYYY-MM` label.
pub fn month_number(view: &MonthlyPerformanceView) -> Option<u32> {
    NaiveDate::parse_from_str(&format!("{}-01", view.month), "%Y-%m-%d")
        .ok()
        .map(|d| d.month())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::tests::{create_test_credit, create_test_payment, date, test_store};
    use crate::ingest::{insert_plan_rows, PlanRow};
    use crate::models::NewPlanEntry;

    fn plan(period: NaiveDate, category_id: i64, sum: f64) -> NewPlanEntry {
        NewPlanEntry {
            period,
            sum,
            category_id,
        }
    }

    // ------------------------------------------------------------------------
    // get_user_credits
    // ------------------------------------------------------------------------

    #[test]
    fn test_unknown_user_has_no_credits() {
        let conn = test_store();
        assert!(get_user_credits(&conn, 404).unwrap().is_empty());
    }

    #[test]
    fn test_closed_and_open_credits() {
        let conn = test_store();

        let mut repaid = create_test_credit(1, date(2024, 1, 10), 1000.0);
        repaid.actual_return_date = Some(date(2024, 2, 1));
        let mut outstanding = create_test_credit(2, date(2024, 3, 1), 2000.0);
        outstanding.return_date = Some(date(2024, 4, 1));
        db::insert_credits(&conn, &[repaid, outstanding]).unwrap();

        db::insert_payments(
            &conn,
            &[
                create_test_payment(1, 1, date(2024, 1, 20), 1, 600.0),
                create_test_payment(2, 1, date(2024, 2, 1), 2, 500.0),
                create_test_payment(3, 2, date(2024, 3, 15), 1, 300.0),
                create_test_payment(4, 2, date(2024, 3, 20), 2, 80.0),
                create_test_payment(5, 2, date(2024, 3, 25), 2, 20.0),
            ],
        )
        .unwrap();

        let views = get_user_credits_at(&conn, 1, date(2024, 4, 11)).unwrap();
        assert_eq!(views.len(), 2);

        match &views[0] {
            CreditView::Closed(c) => {
                assert_eq!(c.actual_return_date, date(2024, 2, 1));
                assert_eq!(c.total_payments, 1100.0);
            }
            other => panic!("expected closed credit, got {:?}", other),
        }

        match &views[1] {
            CreditView::Open(c) => {
                assert_eq!(c.overdue_days, 10);
                assert_eq!(c.body_payments, 300.0);
                assert_eq!(c.percent_payments, 100.0);
            }
            other => panic!("expected open credit, got {:?}", other),
        }
    }

    #[test]
    fn test_open_credit_not_yet_due() {
        let conn = test_store();
        let mut credit = create_test_credit(1, date(2024, 3, 1), 2000.0);
        credit.return_date = Some(date(2024, 4, 1));
        db::insert_credits(&conn, &[credit]).unwrap();

        let views = get_user_credits_at(&conn, 1, date(2024, 4, 1)).unwrap();
        match &views[0] {
            CreditView::Open(c) => {
                assert_eq!(c.overdue_days, 0);
                assert_eq!(c.body_payments, 0.0);
            }
            other => panic!("expected open credit, got {:?}", other),
        }
    }

    #[test]
    fn test_credit_view_serialization_omits_other_branch() {
        let closed = CreditView::Closed(ClosedCredit {
            issuance_date: date(2024, 1, 10),
            actual_return_date: date(2024, 2, 1),
            body: 1000.0,
            percent: 100.0,
            total_payments: 1100.0,
        });
        let json = serde_json::to_value(&closed).unwrap();
        assert_eq!(json["is_closed"], true);
        assert_eq!(json["actual_return_date"], "2024-02-01");
        assert!(json.get("overdue_days").is_none());
        assert!(json.get("body_payments").is_none());

        let open = CreditView::Open(OpenCredit {
            issuance_date: date(2024, 3, 1),
            return_date: None,
            overdue_days: 0,
            body: 2000.0,
            percent: 200.0,
            body_payments: 0.0,
            percent_payments: 0.0,
        });
        let json = serde_json::to_value(&open).unwrap();
        assert_eq!(json["is_closed"], false);
        assert!(json.get("return_date").is_none());
        assert!(json.get("actual_return_date").is_none());
        assert!(json.get("total_payments").is_none());
        assert_eq!(json["overdue_days"], 0);
    }

    // ------------------------------------------------------------------------
    // get_plans_performance
    // ------------------------------------------------------------------------

    #[test]
    fn test_issuance_plan_performance() {
        let conn = test_store();
        db::insert_plans(&conn, &[plan(date(2024, 3, 1), ISSUANCE_CATEGORY_ID, 10000.0)]).unwrap();
        db::insert_credits(
            &conn,
            &[
                create_test_credit(1, date(2024, 3, 15), 4000.0),
                // after the check date
                create_test_credit(2, date(2024, 3, 25), 9000.0),
                // previous month
                create_test_credit(3, date(2024, 2, 28), 9000.0),
            ],
        )
        .unwrap();

        let views = get_plans_performance(&conn, date(2024, 3, 20)).unwrap();
        assert_eq!(
            views,
            vec![PlanPerformanceView {
                month: "2024-03".into(),
                category: "видача".into(),
                planned_sum: 10000.0,
                actual_sum: 4000.0,
                percent_completion: 40.0,
            }]
        );
    }

    #[test]
    fn test_collection_plan_performance() {
        let conn = test_store();
        db::insert_plans(&conn, &[plan(date(2024, 3, 1), COLLECTION_CATEGORY_ID, 300.0)]).unwrap();
        db::insert_credits(&conn, &[create_test_credit(1, date(2024, 2, 1), 1000.0)]).unwrap();
        db::insert_payments(
            &conn,
            &[
                create_test_payment(1, 1, date(2024, 3, 1), 1, 100.0),
                create_test_payment(2, 1, date(2024, 3, 10), 2, 50.0),
                create_test_payment(3, 1, date(2024, 3, 11), 1, 500.0),
            ],
        )
        .unwrap();

        let views = get_plans_performance(&conn, date(2024, 3, 10)).unwrap();
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].actual_sum, 150.0);
        assert_eq!(views[0].percent_completion, 50.0);
    }

    #[test]
    fn test_zero_plan_never_divides() {
        let conn = test_store();
        db::insert_plans(
            &conn,
            &[
                plan(date(2024, 3, 1), ISSUANCE_CATEGORY_ID, 0.0),
                // principal is not a plan category: actual stays 0
                plan(date(2024, 3, 1), 1, 500.0),
            ],
        )
        .unwrap();
        db::insert_credits(&conn, &[create_test_credit(1, date(2024, 3, 2), 4000.0)]).unwrap();

        let views = get_plans_performance(&conn, date(2024, 3, 31)).unwrap();
        assert_eq!(views.len(), 2);
        assert_eq!(views[0].category, "тіло");
        assert_eq!(views[0].actual_sum, 0.0);
        assert_eq!(views[0].percent_completion, 0.0);
        assert_eq!(views[1].actual_sum, 4000.0);
        assert_eq!(views[1].percent_completion, 0.0);
    }

    #[test]
    fn test_plans_performance_through_ingestion() {
        let conn = test_store();
        let rows = vec![PlanRow {
            line: 1,
            period: Some("01/03/2024".into()),
            category: Some("видача".into()),
            sum: Some("10000".into()),
        }];
        insert_plan_rows(&conn, &rows).unwrap();
        db::insert_credits(&conn, &[create_test_credit(1, date(2024, 3, 15), 4000.0)]).unwrap();

        let views = get_plans_performance(&conn, date(2024, 3, 20)).unwrap();
        assert_eq!(views[0].actual_sum, 4000.0);
        assert_eq!(views[0].percent_completion, 40.0);
    }

    // ------------------------------------------------------------------------
    // get_year_performance
    // ------------------------------------------------------------------------

    #[test]
    fn test_empty_year_has_twelve_zero_months() {
        let conn = test_store();
        let months = get_year_performance(&conn, 2023).unwrap();

        assert_eq!(months.len(), 12);
        for (idx, m) in months.iter().enumerate() {
            assert_eq!(month_number(m), Some(idx as u32 + 1));
            assert_eq!(m.credits_completion_percent, 0.0);
            assert_eq!(m.credits_share_percent, 0.0);
            assert_eq!(m.payments_completion_percent, 0.0);
            assert_eq!(m.payments_share_percent, 0.0);
        }
        assert_eq!(months[0].month, "2023-01");
        assert_eq!(months[11].month, "2023-12");
    }

    #[test]
    fn test_year_performance_breakdown() {
        let conn = test_store();
        db::insert_plans(
            &conn,
            &[
                plan(date(2024, 1, 1), ISSUANCE_CATEGORY_ID, 10000.0),
                plan(date(2024, 1, 1), COLLECTION_CATEGORY_ID, 1000.0),
                plan(date(2024, 2, 1), ISSUANCE_CATEGORY_ID, 5000.0),
                // other year
                plan(date(2025, 1, 1), ISSUANCE_CATEGORY_ID, 99999.0),
            ],
        )
        .unwrap();
        db::insert_credits(
            &conn,
            &[
                create_test_credit(1, date(2024, 1, 1), 3000.0),
                create_test_credit(2, date(2024, 1, 31), 3000.0),
                create_test_credit(3, date(2024, 2, 29), 2000.0),
                create_test_credit(4, date(2025, 1, 5), 7000.0),
            ],
        )
        .unwrap();
        db::insert_payments(
            &conn,
            &[
                create_test_payment(1, 1, date(2024, 1, 20), 1, 250.0),
                create_test_payment(2, 1, date(2024, 3, 1), 2, 750.0),
            ],
        )
        .unwrap();

        let months = get_year_performance(&conn, 2024).unwrap();
        assert_eq!(months.len(), 12);

        let jan = &months[0];
        assert_eq!(jan.credits_count, 2);
        assert_eq!(jan.planned_credits_sum, 10000.0);
        assert_eq!(jan.actual_credits_sum, 6000.0);
        assert_eq!(jan.credits_completion_percent, 60.0);
        assert_eq!(jan.credits_share_percent, 75.0);
        assert_eq!(jan.payments_count, 1);
        assert_eq!(jan.planned_payments_sum, 1000.0);
        assert_eq!(jan.payments_completion_percent, 25.0);
        assert_eq!(jan.payments_share_percent, 25.0);

        // leap day belongs to February
        let feb = &months[1];
        assert_eq!(feb.credits_count, 1);
        assert_eq!(feb.credits_completion_percent, 40.0);
        assert_eq!(feb.credits_share_percent, 25.0);

        let mar = &months[2];
        assert_eq!(mar.planned_payments_sum, 0.0);
        assert_eq!(mar.actual_payments_sum, 750.0);
        assert_eq!(mar.payments_completion_percent, 0.0);
        assert_eq!(mar.payments_share_percent, 75.0);
    }

    #[test]
    fn test_year_performance_pure() {
        let credits = vec![create_test_credit(1, date(2023, 2, 28), 100.0)];
        let months = year_performance(2023, &[], &credits, &[]).unwrap();

        assert_eq!(months.len(), 12);
        assert_eq!(months[1].actual_credits_sum, 100.0);
        assert_eq!(months[1].credits_share_percent, 100.0);
        assert_eq!(months[2].actual_credits_sum, 0.0);
    }

    #[test]
    fn test_unrepresentable_year_rejected() {
        let conn = test_store();

        for year in [999_999, NaiveDate::MAX.year(), -300_000] {
            let err = get_year_performance(&conn, year).unwrap_err();
            assert!(matches!(err, Error::InvalidYear(y) if y == year));
            assert!(err.is_client_error());
        }
        assert!(year_performance(999_999, &[], &[], &[]).is_err());

        // last year with a complete December
        let months = get_year_performance(&conn, NaiveDate::MAX.year() - 1).unwrap();
        assert_eq!(months.len(), 12);
    }
}
