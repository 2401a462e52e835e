//! Domain layer: account value objects, transfer requests and outcomes, and
//! the storage ports the application layer depends on.

pub mod account;
pub mod ports;
pub mod transfer;
