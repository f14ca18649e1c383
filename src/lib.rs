pub mod accumulator;
pub mod backend;
pub mod collect;
pub mod compare;
pub mod engine;
pub mod i18n;
pub mod options;
pub mod report;
pub mod types;

// Re-export the message lookup functions
pub use crate::i18n::{t, t_with_args};
