pub mod config;
pub mod detectors;
pub mod error;
pub mod filters;
pub mod io;
pub mod metrics;
pub mod pipeline;
pub mod plot;
pub mod signal;

pub use config::*;
pub use detectors::*;
pub use error::{AnsError, Result};
pub use filters::*;
pub use pipeline::*;
pub use signal::*;
