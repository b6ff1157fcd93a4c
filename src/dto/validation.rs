//! Validation helpers for DTOs.

use validator::ValidationError;

/// Longest display name a player may choose.
pub const MAX_PLAYER_NAME_LEN: usize = 32;

/// Validates that a player name is not blank and at most [`MAX_PLAYER_NAME_LEN`] characters.
///
/// # Examples
///
/// ```ignore
/// validate_player_name("ana")   // Ok
/// validate_player_name("   ")   // Err - blank
/// ```
pub fn validate_player_name(name: &str) -> Result<(), ValidationError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        let mut err = ValidationError::new("player_name_blank");
        err.message = Some("Player name must not be blank".into());
        return Err(err);
    }

    let len = trimmed.chars().count();
    if len > MAX_PLAYER_NAME_LEN {
        let mut err = ValidationError::new("player_name_length");
        err.message = Some(
            format!("Player name must be at most {MAX_PLAYER_NAME_LEN} characters (got {len})")
                .into(),
        );
        return Err(err);
    }

    Ok(())
}

/// Validates that free text (chat message, guess) is not blank.
pub fn validate_not_blank(text: &str) -> Result<(), ValidationError> {
    if text.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("Text must not be blank".into());
        return Err(err);
    }
    Ok(())
}
