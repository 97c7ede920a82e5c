//! Core domain + application logic for KeLink, a Telegram link-moderation bot.
//!
//! This crate is framework-agnostic. Telegram and Redis live behind ports
//! (traits) implemented in adapter crates.

pub mod audit;
pub mod clock;
pub mod config;
pub mod domain;
pub mod errors;
pub mod formatting;
pub mod links;
pub mod logging;
pub mod messaging;
pub mod moderation;
pub mod store;
pub mod token;

pub use errors::{Error, Result};
