// Leave of absence (LOA) administration.

pub mod leave_models;
pub mod leave_service;

pub use leave_models::*;
pub use leave_service::*;
