#![forbid(unsafe_code)]

//! Guest messaging automation and WhatsApp delivery queue for hospitality
//! properties.

pub mod automation;
pub mod config;
pub mod delivery;
pub mod errors;
pub mod models;
pub mod persistence;
pub mod reconcile;
pub mod webhook;

pub use config::GlobalConfig;
pub use errors::{AppError, Result};
