//! Classification and statistics over a reconciled result table.
//!
//! Rows are first tagged by snapping quality and road warnings, then the
//! clean rows are screened for cross-provider outliers before pairwise
//! errors and accuracy scores are computed.

pub mod accuracy;
pub mod analyzer;
pub mod differences;
pub mod outliers;
pub mod snapping;
pub mod types;
pub mod utility;
