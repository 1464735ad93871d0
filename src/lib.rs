pub mod config;
pub mod connectivity;
pub mod error;
pub mod present;
pub mod update;

pub use config::Config;
pub use update::{Outcome, UpdateCoordinator};
