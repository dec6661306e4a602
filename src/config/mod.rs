//! # Configuration Module
//!
//! The record format has no runtime knobs: every value that shapes a record on
//! disk is a compile-time constant, co-located with the constants it depends on.
//!
//! ## Module Organization
//!
//! - [`constants`]: Layout constants with dependency documentation

pub mod constants;
pub use constants::*;
