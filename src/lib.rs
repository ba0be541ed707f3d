pub mod config;
pub mod db;
pub mod error;
pub mod jobs;
pub mod models;
pub mod rates;
pub mod routes;
pub mod schedule;
pub mod state;
pub mod subscriptions;
pub mod validation;

pub use config::Config;
pub use db::{init_pool, run_migrations};
pub use error::{ApiError, ApiResult, RateError, StorageError, ValidationError};
pub use rates::{HttpRateSource, RateCache, RateSource, RateTable};
pub use routes::create_router;
pub use schedule::{check_schedule, ConflictCheck, ConflictPolicy, ProposedSlot, SessionSource};
pub use state::AppState;
