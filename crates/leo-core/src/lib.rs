pub mod config;
pub mod directive;
pub mod error;
pub mod gate;
pub mod io;
pub mod paths;
pub mod store;
pub mod types;
pub mod workflow;

pub use error::{LeoError, Result};
