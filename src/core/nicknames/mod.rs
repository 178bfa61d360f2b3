// Bulk nickname replacement.
//
// - `nickname_models` = members, planned changes, reports
// - `nickname_planner` = works out which nicknames change and to what
// - `batch_runner` = applies changes in rate-limit friendly batches
// - `operation_guard` = one replacement run per guild at a time

pub mod batch_runner;
pub mod nickname_models;
pub mod nickname_planner;
pub mod nickname_service;
pub mod operation_guard;

pub use batch_runner::*;
pub use nickname_models::*;
pub use nickname_service::*;
