pub mod api;
pub mod config;
pub mod tracking;

pub use api::{media_type, ApiError, BackendClient, MediaKind};
pub use config::{ClientConfig, ConfigError};
pub use tracking::{track_submission, TokioTimer, INLINE_TASK_ID};
