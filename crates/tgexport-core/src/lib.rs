//! Core domain + application logic for the Telegram channel file exporter.
//!
//! This crate is intentionally framework-agnostic. The Telegram client lives
//! behind ports (traits) implemented in adapter crates.

pub mod config;
pub mod domain;
pub mod errors;
pub mod export;
pub mod filter;
pub mod logging;
pub mod naming;
pub mod pacing;
pub mod ports;
pub mod sink;

#[cfg(test)]
mod test_support;

pub use errors::{Error, Result};
