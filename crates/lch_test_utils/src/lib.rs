//! # LCH Test Utilities
//!
//! Shared testing utilities for all crates:
//! - Reference weapons, units and squads
//! - Battlefield and game builders
//! - Determinism test harness
//! - Property-based testing strategies

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod determinism;
pub mod fixtures;

/// Re-export proptest for convenience.
pub use proptest;
