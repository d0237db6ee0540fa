//! Pattern registry for classifying catalog records.
//!
//! This module provides a registry-based approach to recognizing the kind of
//! each row or line in a catalog table. Pattern groups are registered per
//! record kind and evaluated in declaration order, so a more specific group is
//! never shadowed by a more general one.

mod config;
mod core;
mod types;

pub use config::{create_rev4_classifier, create_rev5_classifier};
pub use core::RowClassifier;
pub use types::{RowKind, RowMatch};
