//! wurl core library
//!
//! Fetches a single URL over HTTP(S) into a local file or standard output,
//! continuing partial files with byte ranges and retrying transient failures
//! under a bounded budget.
//!
//! # Architecture
//!
//! - [`transfer`] - request model, range prober, transfer executor, retry
//!   scheduler and outcome reporter
//!
//! The `wurl` binary adds flag parsing, the config file, logging setup and
//! exit-code mapping on top.

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod transfer;
mod user_agent;

// Re-export commonly used types
pub use transfer::{
    BackoffStrategy, RetryPolicy, Sink, TransferController, TransferError, TransferOutcome,
    TransferRequest, TransferStatus, run_transfer,
};
