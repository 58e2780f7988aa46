// Credit Plans - Core Library
// Exposes all modules for use in CLI, API server, and tests

pub mod calendar;
pub mod config;
pub mod db;
pub mod dictionary;
pub mod error;
pub mod ingest;
pub mod logging;
pub mod models;
pub mod reports;
pub mod seed;

#[cfg(feature = "server")]
pub mod api;

// Re-export commonly used types
pub use db::setup_database;
pub use dictionary::{CategoryDictionary, CategoryKind};
pub use error::{Error, Result, ValidationError};
pub use ingest::{import_plan_file, insert_plan_rows, read_plan_table, PlanRow};
pub use models::{CategoryEntry, Credit, NewPlanEntry, Payment, PlanEntry, User};
pub use reports::{
    get_plans_performance, get_user_credits, get_year_performance, CreditView,
    MonthlyPerformanceView, PlanPerformanceView,
};
pub use seed::{load_seed_dir, SeedSummary};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
