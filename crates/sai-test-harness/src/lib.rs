//! Traffic test infrastructure for SAI topologies
//!
//! Builds on [`sai_sim::SimSwitch`] to check that a topology built by
//! `sai-topology` forwards the way a conformance test expects:
//!
//! - [`fixtures`]: frames, peer devices and layouts
//! - [`TrafficVerifier`]: send frames and assert on egress port and rewrite,
//!   ECMP balance and excluded ports

pub mod fixtures;
mod verification;

pub use verification::*;
