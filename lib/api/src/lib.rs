//! JSON HTTP API over the current recommendation snapshot.

pub mod rest;

pub use rest::{AppState, RestApi};
