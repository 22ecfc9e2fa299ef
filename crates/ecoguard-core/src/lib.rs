//! EcoGuard Core Library
//!
//! Shared types, local storage backends, clocks and configuration for the
//! EcoGuard Pro security and monitoring services.

pub mod clock;
pub mod config;
pub mod error;
pub mod storage;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use error::{Error, Result};
pub use storage::{FileStore, KeyValueStore, MemoryStore};
