pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod pairing;
pub mod progress;
pub mod storage;

pub use config::ShareConfig;
pub use error::ShareError;
pub use lifecycle::{Lifecycle, SHUTDOWN_GRACE, ShareServer};
pub use storage::{SharedFile, Storage};
