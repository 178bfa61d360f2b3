// Citation and arrest logging.

pub mod record_models;
pub mod record_service;

pub use record_models::*;
pub use record_service::*;
