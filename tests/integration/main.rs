//! Integration Tests
//!
//! Cross-crate tests organized by behavior:
//! - Scenario: the correction scenario on every backend
//! - Versioning: head writes, corrections, identity stability
//! - Immutability: content-addressed records
//! - Polymorphism: subtype reads and late union members
//! - Remote: stores over the HTTP facade
//! - Config: `vellum.toml` and audit rows

#[path = "../common/mod.rs"]
mod common;

mod config;
mod immutability;
mod polymorphism;
mod remote;
mod scenario;
mod versioning;
