pub mod collector;
pub mod config;
pub mod error;
pub mod params;

pub use collector::{Collector, GcSummary};
pub use config::GcConfig;
pub use error::GcError;
pub use params::{GcJobParams, JobParameters, ParamsError};
