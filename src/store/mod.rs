//! Mail sources.

pub mod maildir;
