// Duty shift tracking: start, breaks, end, and time reports.

pub mod shift_models;
pub mod shift_service;

pub use shift_models::*;
pub use shift_service::*;
