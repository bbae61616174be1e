//! # SingScore Common Library
//!
//! Shared code for the SingScore services:
//! - Error type
//! - Configuration file discovery and TOML loading
//! - Analysis stage events and the EventBus

pub mod config;
pub mod error;
pub mod events;

pub use error::{Error, Result};
