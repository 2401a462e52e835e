//! Input and output adapters for the driver.

pub mod csv;
