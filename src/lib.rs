//! Retrieval and per-year schema harmonisation of Australian election and
//! boundary datasets.
//!
//! Each dataset family (polling-place coordinates, postal vote applications,
//! pre-poll and overseas votes, candidates, party representation, division
//! codes) changes layout from one event to the next. [`harmonise`] maps any
//! recognised year onto one canonical table, [`combine`] stacks years, and
//! [`boundaries`] moves results between SA1 and division vintages.
#[macro_use]
extern crate serde_derive;

pub mod boundaries;
pub mod cache;
pub mod candidates;
pub mod combine;
pub mod config;
pub mod coords;
pub mod data;
pub mod diag;
pub mod divisions;
pub mod error;
pub mod harmonise;
pub mod overseas;
pub mod postal;
pub mod prepoll;
pub mod representation;
pub mod table;
pub mod utils;

pub use error::{Error, Result};
