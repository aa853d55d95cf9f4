//! Core domain + application logic for the pull-zone publishing bot.
//!
//! This crate is framework-agnostic. Telegram and the FTP client live behind
//! ports (traits) implemented in adapter crates.

pub mod audit;
pub mod config;
pub mod credentials;
pub mod domain;
pub mod errors;
pub mod logging;
pub mod menu;
pub mod messaging;
pub mod publish;
pub mod render;
pub mod sanitize;
pub mod store;
pub mod wizard;

pub use errors::{Error, Result};
