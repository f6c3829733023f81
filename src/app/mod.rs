//! Binary-side plumbing: config resolution, input collection and the
//! progress bar.

pub(crate) mod config_manager;
pub(crate) mod input_processor;
pub(crate) mod progress_manager;
