//! `mailias`: builds a mutt alias file from the recipients of your mail.
//!
//! This crate provides the core library: address-list splitting, display-name
//! decoding, alias token derivation, merging into an existing alias file and
//! atomic publication of the result.

pub mod alias;
pub mod config;
pub mod error;
pub mod harvest;
pub mod model;
pub mod parser;
pub mod store;
