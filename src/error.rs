//! Error types for editing commands.
//!
//! Only selection problems are hard errors; everything else in the crate
//! degrades to a logged no-op so a host UI never crashes over a missing
//! element or handler.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EditError {
    /// The command needs a non-collapsed text selection.
    #[error("a text selection is required")]
    SelectionRequired,
}
