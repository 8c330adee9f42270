//! Capture session core
//!
//! One worker thread owns the camera device, the live capture session, the
//! recorder and the telemetry log. The controlling thread talks to it only
//! through a [`CaptureHandle`], and hardware results arrive on the same
//! queue as commands.

mod dispatcher;
mod events;
mod handle;
mod manager;
pub mod messages;
mod state;

pub use dispatcher::{CaptureRoute, DiscardReason};
pub use events::{Diagnostic, Notifier, SessionEvent, StatusSnapshot};
pub use handle::CaptureHandle;
pub use manager::{Flow, SessionManager, SessionParts};
pub use messages::{Command, Message};
