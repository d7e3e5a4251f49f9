//! Scores how twisty roads are from OpenStreetMap data.
//!
//! Raw ways are joined into contiguous collections by the [`collector`], then
//! a configurable [`pipeline`] of stages segments them, measures turn radii,
//! weights the curves into a curvature score and filters, splits and sorts the
//! result for renderers.

pub mod collector;
pub mod config;
pub mod curvature;
pub mod data;
pub mod errors;
pub mod etl;
pub mod geometry;
pub mod pipeline;
