//! Boxworld application support
//!
//! The simulation itself lives in the `boxworld_*` crates; this crate adds
//! layered configuration for the demo binary.

pub mod config;
