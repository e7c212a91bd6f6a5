//! Test helpers module
//!
//! Database setup, a mock Daraja server, and builders for settings and
//! request payloads shared by the integration tests.

#![allow(dead_code)]

pub mod database_helper;
pub mod mpesa_mock;
pub mod test_data;

pub use database_helper::*;
pub use mpesa_mock::*;
pub use test_data::*;
