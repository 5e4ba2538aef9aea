//! Persistence for the NextSpin working dataset.
//!
//! The dataset is a CSV file with one row per record. See [`Dataset`].

pub mod dataset;

pub use dataset::{Column, Dataset, LoadStats, TAG_SEPARATOR};
