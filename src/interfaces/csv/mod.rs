//! CSV readers for account seeds and transfer requests, and the account report writer.

pub mod account_reader;
pub mod account_writer;
pub mod transfer_reader;

use std::io::Read;

/// Header-driven reader shared by the inputs: fields are trimmed and short
/// rows surface as per-row deserialization errors.
fn input_reader<R: Read>(source: R) -> ::csv::Reader<R> {
    ::csv::ReaderBuilder::new()
        .trim(::csv::Trim::All)
        .flexible(true)
        .from_reader(source)
}
