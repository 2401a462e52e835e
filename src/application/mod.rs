//! Application layer containing the transfer orchestration.
//!
//! This module defines the `TransferCoordinator`, the primary entry point for
//! moving funds, the interchangeable `TransferStrategy` implementations it
//! delegates to, and an explicit caller-side `RetryPolicy`.

pub mod coordinator;
pub mod retry;
pub mod strategy;
