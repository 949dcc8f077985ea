//! Utility functions and types

pub mod data_loader;
pub mod datasets;

pub use data_loader::{save_csv, DataLoader, NULL_MARKERS};
pub use datasets::{DatasetManager, DEFAULT_DATASET};
