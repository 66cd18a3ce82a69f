//! rigcat-test-harness: Test utilities for rigcat.
//!
//! This crate provides [`MockPort`] for deterministic unit testing of the
//! transaction engine and dialect modules without real radio hardware.

pub mod mock_port;

pub use mock_port::MockPort;
