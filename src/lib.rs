//! KIZZY: pool/spread betting and reward-claiming agent
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod types;
pub mod platforms;
pub mod storage;
pub mod strategy;
pub mod engine;
