//! Shared protocol types for the parq smart-parking client
//!
//! The `common` module holds types reused across endpoint families (token
//! claims, the user projection). The `api` module holds request/response
//! DTOs organized by backend domain.

pub mod api;
pub mod common;

pub use api::*;
pub use common::*;
