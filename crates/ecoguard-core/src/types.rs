//! Core domain types for EcoGuard Pro.

pub mod sensor;
pub mod user;

pub use sensor::*;
pub use user::*;
