//! Presentation of session state.
//!
//! - [`terminal`]: styled terminal output for [`crate::session::ViewUpdate`]s

pub mod terminal;

pub use terminal::TerminalView;
