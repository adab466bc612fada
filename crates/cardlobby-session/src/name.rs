//! Display-name rules.

use cardlobby_protocol::NAME_SEPARATOR;

use crate::SessionError;

/// Checks that `name` may be registered.
///
/// A name is refused when it is empty or when it contains
/// [`NAME_SEPARATOR`], which would split the player manifest handed to the
/// core process. Uniqueness is the registry's concern, not this one.
pub fn validate_name(name: &str) -> Result<(), SessionError> {
    if name.is_empty() {
        return Err(SessionError::EmptyName);
    }
    if name.contains(NAME_SEPARATOR) {
        return Err(SessionError::ForbiddenCharacter);
    }
    Ok(())
}
