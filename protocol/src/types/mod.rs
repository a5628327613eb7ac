//! # Domain Values
//!
//! Typed stand-ins for everything a caller hands the session layer:
//! party identities, the shape of the published data, and the buyer's
//! demand (byte-addressed ranges or keyword lookups, optionally hidden in a
//! phantom superset).
//!
//! Every constructor validates at the boundary, so once a value exists it
//! is well-formed. Sessions never re-check these invariants.

pub mod demand;
pub mod identity;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use demand::{KeywordSet, PhantomKeywords, PhantomRanges, Query, Range, RangeSet};
pub use identity::{IdWidth, Identity};

/// How a published dataset is addressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataMode {
    /// Fixed-size records cut from an arbitrary byte source.
    Plain,
    /// One record per row of a delimited table, with indexed key columns.
    Table,
}

impl fmt::Display for DataMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataMode::Plain => write!(f, "plain"),
            DataMode::Table => write!(f, "table"),
        }
    }
}
