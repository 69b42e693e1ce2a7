//! Touch event capture.
//!
//! This module turns the Down/Up touch events of an input session into the
//! feature set that gets scored and enrolled.

pub mod active;
pub mod input;
pub mod session;
pub mod types;

// Re-export commonly used types
pub use input::{InputSource, ReplayInput};
pub use session::{CaptureError, CaptureState, SessionCapture};
pub use types::{Acquisition, Keystroke, RawTouchEvent, SensorType, TouchEventKind};
