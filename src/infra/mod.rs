//! Infrastructure layer for cross-cutting concerns.
//!
//! Provides foundational infrastructure including:
//! - Configuration and policy knobs
//! - Error handling and result types
//! - The observer side channel for live findings

pub mod config;
pub mod error;
pub mod observer;
