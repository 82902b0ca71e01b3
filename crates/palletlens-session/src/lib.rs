//! PalletLens Session crate - per-slot capture sessions and credential lifecycle.
//!
//! A capture session moves through Idle -> ImageReady -> Analyzing ->
//! Completed, with a generation counter guarding against late results.
//! Shared state is held in `Arc<Mutex<>>` and never locked across an await.

pub mod credential;
pub mod error;
pub mod session;
pub mod state;

pub use credential::{CredentialLifecycle, CredentialStore};
pub use error::SessionError;
pub use session::{CaptureSession, ImageSource, SessionView};
pub use state::{Phase, SessionState};
