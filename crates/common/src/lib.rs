//! Shared utilities, configuration, and error handling for SkillSpring
//!
//! This crate provides common functionality used across the SkillSpring
//! front ends:
//! - Configuration management following 12-factor principles
//! - Error types and handling
//! - Request-body validation extractor

pub mod config;
pub mod error;
pub mod extractors;

pub use config::{Config, Deployment};
pub use error::{Error, Result};
pub use extractors::ValidatedJson;
