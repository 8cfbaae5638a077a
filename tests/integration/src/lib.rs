//! Integration tests for the Vigil gateway
//!
//! These suites exercise the crates together:
//! - inbound messages through fusion, hysteresis and the actuators
//! - device presence via the router, sweep and heartbeat loops
//! - switch coalescing and shutdown ordering
//! - the full gateway over real sockets

pub mod test_utils;

#[cfg(test)]
mod actuation_tests;

#[cfg(test)]
mod fusion_pipeline_tests;

#[cfg(test)]
mod gateway_tests;

#[cfg(test)]
mod presence_tests;
