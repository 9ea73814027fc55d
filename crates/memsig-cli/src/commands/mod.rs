//! CLI command implementations.
//!
//! This module contains the implementation of each CLI command.

pub mod compile;
pub mod image;
pub mod resolve;
pub mod scan;
