//! Alias construction and the alias file: token derivation, ASCII folding,
//! the impersonal-address heuristic, merging and publication.

pub mod file;
pub mod filter;
pub mod fold;
pub mod merge;
pub mod name;
