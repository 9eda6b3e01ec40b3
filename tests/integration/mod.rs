//! Integration test suite for taskpilot.
//!
//! These tests drive whole orchestration cycles through the public API:
//! stores, readiness, batching, the trigger handshake and completion.
//!
//! # Test Categories
//!
//! - `cycle_e2e`: Project lifecycle from first cycle to completion
//! - `trigger_retry`: Attempt numbering, rejection budget and pausing
//! - `http_engine`: The HTTP engine against a mock webhook
//! - `file_store`: Cycles persisted through the JSON file store
//!
//! # CI Compatibility
//!
//! The workflow engine is either an in-process fake or a local wiremock
//! server, so nothing leaves the machine.


mod cycle_e2e;
mod file_store;
mod http_engine;
