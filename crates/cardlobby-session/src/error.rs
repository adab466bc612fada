//! Error types for the session layer.

use cardlobby_protocol::NAME_SEPARATOR;

/// Reasons a display name is refused.
///
/// Both variants are recoverable: the client is told the reason and may
/// retry with another name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// The name contains the manifest field separator.
    #[error("names may not contain '{}'", NAME_SEPARATOR)]
    ForbiddenCharacter,

    #[error("name must not be empty")]
    EmptyName,
}
