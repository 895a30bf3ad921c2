//! Common test utilities for HTTP integration tests.

// Not every test binary uses every helper
#![allow(dead_code)]

pub mod harness;

pub use harness::{TestServer, assert_json_error, secret_body};
