//! Greenboard report server library.
//!
//! Reads CI job results from the document store's map/reduce views and
//! serves per-build job lists, missing jobs, breakdowns and timelines.

pub mod api;
pub mod config;
pub mod error;
pub mod middleware;
pub mod models;
pub mod services;
pub mod views;
