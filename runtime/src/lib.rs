// Copyright 2026 ZoneAtlas Contributors
// SPDX-License-Identifier: MIT

//! ZoneAtlas runtime: source acquisition, caching, persistence and the CLI.
//!
//! The pure pipeline (validation, canonicalization, spatial resolution)
//! lives in the `zoneatlas` crate; this crate supplies the I/O around it.

pub mod acquisition;
pub mod audit;
pub mod batch;
pub mod cache;
pub mod cli;
pub mod config;
pub mod renderer;
pub mod resolver;
pub mod store;
pub mod throttle;
