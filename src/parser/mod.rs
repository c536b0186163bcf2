//! Header parsing: address lists, encoded-word display names and dates.

pub mod address;
pub mod date;
pub mod header;
