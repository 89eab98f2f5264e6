//! Core engine: fetch, filter, size, submit and claim, per account.

pub mod scanner;
pub mod filter;
pub mod executor;
pub mod rewards;
pub mod report;
pub mod session;
pub mod orchestrator;
