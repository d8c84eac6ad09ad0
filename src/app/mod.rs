//! Binary-side flow: terminal rendering, progress UI and the run loop.

pub(crate) mod progress_manager;
pub(crate) mod results_table;
pub(crate) mod runtime;
