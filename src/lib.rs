//! NFT Analytics Gateway Library
//!
//! Time-bucketed analytics over NFT marketplace events. The core is pure:
//! [`domain::resolve`] turns a symbolic window (`24h`, `7d`, `30d`, `3m`,
//! `1y`, `all`) into a cutoff and bucket granularity, and [`domain::densify`]
//! fills every missing bucket of a sparse series from a per-field policy.
//!
//! This library exposes the modules for use by the server binary, benchmarks
//! and tests.

pub mod api;
pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
