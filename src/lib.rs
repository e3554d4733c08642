mod client;
mod error;
mod logger;
mod mapping;
mod protocol;
mod types;

pub use client::{ConnectionConfig, Hydrawise, HydrawiseBuilder};
pub use error::{CommandError, Error, Result};
pub use logger::MessageLogMode;
pub use protocol::{QueryParams, CLOUD_URL, MANUAL_PERIOD_ID};
pub use types::*;
