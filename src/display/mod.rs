//! Terminal output helpers for the CLI.

pub mod progress;
pub mod tables;

pub use progress::create_progress_bar;
pub use tables::{collection_table, search_results_table};
