//! Diff extraction from git repositories.
//!
//! Opens a repository with git2, resolves the two sides of a comparison
//! (two revisions, or HEAD against the working tree) and turns the result
//! into a [`DiffSet`](diffsentry_core::DiffSet) of per-file patches.

pub mod extract;

pub use extract::{diff_between, working_tree_diff};
