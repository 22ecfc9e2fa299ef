//! API request handlers.

pub mod audit;
pub mod health;
pub mod metrics;
pub mod privacy;
pub mod readings;
pub mod session;
pub mod users;
