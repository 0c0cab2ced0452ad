//! Editing sessions tying recovery, auto-save and submission together.

pub mod editor;

pub use editor::{EditingSession, SessionError, SubmitReceipt};
