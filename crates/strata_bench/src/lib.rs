//! Benchmark support crate for Strata.
//!
//! The benchmarks live under `benches/`; this crate body exists only to
//! anchor them in the workspace.

#![deny(unsafe_code)]
#![warn(missing_docs)]
