//! Core data model types for addresses and alias-file lines.

pub mod address;
pub mod alias;
