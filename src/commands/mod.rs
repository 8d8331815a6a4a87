//! CLI command implementations.

mod config;
mod scan;

pub use config::ConfigCmd;
pub use scan::ScanCmd;
