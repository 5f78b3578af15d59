//! nar-docgen library
//!
//! This module exports the internal components of the generator for testing purposes.

pub mod config;
pub mod generate;
