//! # Clubcard Common Library
//!
//! Shared code for the clubcard member registry:
//! - Error types
//! - Configuration loading
//! - Membership date parsing/formatting
//! - Clock utilities

pub mod config;
pub mod dates;
pub mod error;
pub mod time;

pub use error::{Error, Result};
