pub mod config;
pub mod error;
pub mod events;
pub mod types;

pub use config::LensConfig;
pub use error::{LensError, Result};
pub use events::SessionEvent;
pub use types::*;
