use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use rusqlite::Connection;
use std::env;
use std::path::Path;

use credit_plans::config::Config;
use credit_plans::logging::init_tracing;
use credit_plans::{
    db, get_plans_performance, get_user_credits, get_year_performance, import_plan_file,
    load_seed_dir, setup_database,
};

const USAGE: &str = "Usage:
  credit-plans init
  credit-plans seed <data_dir>
  credit-plans import-plans <file.xlsx|file.csv|file.tsv>
  credit-plans user <user_id>
  credit-plans plans <DD/MM/YYYY>
  credit-plans year <YYYY>";

fn main() -> Result<()> {
    let config = Config::from_env()?;
    init_tracing(config.log_format);

    let args: Vec<String> = env::args().skip(1).collect();
    let command = args.first().map(String::as_str).unwrap_or("");
    let arg = args.get(1).map(String::as_str);

    let conn = Connection::open(&config.db_path)
        .with_context(|| format!("Failed to open database {}", config.db_path))?;
    setup_database(&conn)?;

    match (command, arg) {
        ("init", _) => println!("✓ Database initialized at {}", config.db_path),
        ("seed", Some(dir)) => run_seed(&conn, Path::new(dir))?,
        ("import-plans", Some(file)) => run_import_plans(&conn, Path::new(file))?,
        ("user", Some(id)) => {
            let user_id: i64 = id.parse().context("user_id must be an integer")?;
            let credits = get_user_credits(&conn, user_id)?;
            if credits.is_empty() {
                println!("No credits for user {}", user_id);
            } else {
                println!("{}", serde_json::to_string_pretty(&credits)?);
            }
        }
        ("plans", Some(date)) => {
            let check_date = NaiveDate::parse_from_str(date, "%d/%m/%Y")
                .context("check date must be DD/MM/YYYY")?;
            for view in get_plans_performance(&conn, check_date)? {
                println!(
                    "{}  {:<12} plan {:>14.2}  actual {:>14.2}  {:>7.2}%",
                    view.month, view.category, view.planned_sum, view.actual_sum, view.percent_completion
                );
            }
        }
        ("year", Some(year)) => {
            let year: i32 = year.parse().context("year must be an integer")?;
            run_year(&conn, year)?;
        }
        _ => {
            eprintln!("{}", USAGE);
            bail!("unknown or incomplete command");
        }
    }

    Ok(())
}

fn run_seed(conn: &Connection, dir: &Path) -> Result<()> {
    println!("🌱 Loading seed data from {}", dir.display());

    let summary = load_seed_dir(conn, dir)?;

    println!("✓ Users:      {}", summary.users);
    println!("✓ Dictionary: {}", summary.categories);
    println!("✓ Credits:    {}", summary.credits);
    println!("✓ Payments:   {}", summary.payments);
    println!("✓ Plans:      {}", summary.plans);
    Ok(())
}

fn run_import_plans(conn: &Connection, path: &Path) -> Result<()> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();

    let before = db::count_plans(conn)?;
    let inserted = import_plan_file(conn, file_name, &bytes)?;
    let after = db::count_plans(conn)?;

    println!("✓ Inserted {} plans ({} → {})", inserted, before, after);
    Ok(())
}

fn run_year(conn: &Connection, year: i32) -> Result<()> {
    println!(
        "{:<8} {:>6} {:>14} {:>14} {:>8} {:>6} {:>14} {:>14} {:>8}",
        "month", "cred#", "plan cred", "issued", "done%", "pay#", "plan pay", "collected", "done%"
    );
    for m in get_year_performance(conn, year)? {
        println!(
            "{:<8} {:>6} {:>14.2} {:>14.2} {:>8.2} {:>6} {:>14.2} {:>14.2} {:>8.2}",
            m.month,
            m.credits_count,
            m.planned_credits_sum,
            m.actual_credits_sum,
            m.credits_completion_percent,
            m.payments_count,
            m.planned_payments_sum,
            m.actual_payments_sum,
            m.payments_completion_percent,
        );
    }
    Ok(())
}
