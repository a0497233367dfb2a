//! Notification adapters.
//!
//! - `RegistryPushNotifier` - realtime push routed through the connection registry
//! - `TracingFallbackNotifier` - logs fallback notifications
//! - `RecordingFallbackNotifier` - captures fallback notifications in tests

mod fallback;
mod push;

pub use fallback::{RecordingFallbackNotifier, SentFallback, TracingFallbackNotifier};
pub use push::RegistryPushNotifier;
