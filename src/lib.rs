//! `salary-predictor` library crate.
//!
//! The binary (`salary`) is a thin wrapper around this library so that:
//!
//! - core logic is testable without spawning processes
//! - the serving path and the training path share one implementation of
//!   feature assembly (`features`) and bundle loading (`io`)
//! - code stays easy to navigate as the project grows

pub mod app;
pub mod cli;
pub mod confidence;
pub mod data;
pub mod domain;
pub mod error;
pub mod features;
pub mod io;
pub mod math;
pub mod models;
pub mod report;
pub mod service;
pub mod training;
