pub mod rppg;

// Re-export the surface a host needs to drive a session.
pub use rppg::config::RppgConfig;
pub use rppg::errors::{ConfigError, FaceSourceError};
pub use rppg::sampler::{FaceSource, Frame, PixelSource};
pub use rppg::session::Session;
pub use rppg::types::{BpmDisplay, FaceDetection, SignalQuality, TickOutput};
