//! Test support and protocol-level tests
//!
//! `mocks` provides the scripted transport behind the `Transport` seam;
//! `utils` provides token and client fixtures. `client_protocol` exercises
//! the refresh/retry ordering contracts end to end against the mock.

pub mod utils;

mod client_protocol;
