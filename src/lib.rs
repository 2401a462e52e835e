//! A funds-transfer engine for two-party transfers under concurrent access.
//!
//! Three interchangeable concurrency-control strategies move balances between
//! accounts: optimistic versioning, pessimistic row holds acquired in
//! ascending id order, and a single conditional debit-then-credit statement.
//! The [`TransferCoordinator`](application::coordinator::TransferCoordinator)
//! wraps each transfer in a store scope, committing on success and rolling
//! back otherwise.

pub mod application;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod interfaces;
pub mod telemetry;
