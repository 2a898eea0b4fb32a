//! Common test utilities for geomhist-core
//!
//! Fixtures for versions and timestamps, and a builder for `.osh` documents.

#![allow(dead_code)]

mod builders;
mod fixtures;

pub use builders::*;
pub use fixtures::*;
