//! Test utilities for data proxy integration tests.
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::missing_panics_doc,
    clippy::must_use_candidate
)]

pub mod harness;
mod mock;
pub mod request;
pub mod response;

pub use harness::{AppHarness, AppHarnessBuilder};
pub use mock::{MockBody, MockResponse, MockUpstream, RecordedRequest};
pub use request::RequestCase;
pub use response::TestResponse;
