//! Business logic services.
//!
//! Services contain core business logic separated from HTTP handlers.
//! They handle database transactions, validation, and existence checks.

pub mod correlation_service;
pub mod datasource_service;
pub mod playlist_service;
pub mod uid;
