//! Engagement write-path domain rules.
//!
//! Validation happens here and is invoked by the store on every create/update,
//! so an invalid engagement can never reach a table regardless of which route
//! produced it.

use thiserror::Error;

/// Minimum trimmed length of an annotation text.
pub const MIN_ANNOTATION_TEXT_LEN: usize = 5;

/// Maximum number of track URIs accepted by playlist creation.
pub const MAX_PLAYLIST_URIS: usize = 200;

#[derive(Debug, Error)]
pub enum EngagementError {
    #[error("{0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("not the owner of this {0}")]
    NotOwner(&'static str),

    #[error("{0}")]
    Conflict(&'static str),

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl EngagementError {
    pub fn validation<S: Into<String>>(message: S) -> Self {
        EngagementError::Validation(message.into())
    }
}

impl From<rusqlite::Error> for EngagementError {
    fn from(err: rusqlite::Error) -> Self {
        EngagementError::Storage(err.into())
    }
}

/// Trims and validates an annotation (or review) text body.
pub fn validate_annotation_text(text: &str) -> Result<String, EngagementError> {
    let trimmed = text.trim();
    if trimmed.len() < MIN_ANNOTATION_TEXT_LEN {
        return Err(EngagementError::validation(format!(
            "text must be at least {} characters",
            MIN_ANNOTATION_TEXT_LEN
        )));
    }
    Ok(trimmed.to_string())
}

/// An annotation timestamp is a position in the track, in seconds.
pub fn validate_timestamp(timestamp: f64) -> Result<(), EngagementError> {
    if !timestamp.is_finite() || timestamp < 0.0 {
        return Err(EngagementError::validation(
            "timestamp must be a non-negative number of seconds",
        ));
    }
    Ok(())
}

/// Ratings go from 0 to 5 stars in half-star steps.
pub fn validate_rating(rating: f64) -> Result<(), EngagementError> {
    let doubled = rating * 2.0;
    if !rating.is_finite() || !(0.0..=5.0).contains(&rating) || doubled.fract() != 0.0 {
        return Err(EngagementError::validation(
            "rating must be between 0 and 5 in steps of 0.5",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_rejected() {
        let err = validate_annotation_text("  hi  ").unwrap_err();
        assert!(err.to_string().contains("at least 5 characters"));
    }

    #[test]
    fn text_is_trimmed() {
        assert_eq!(
            validate_annotation_text("  nice bridge  ").unwrap(),
            "nice bridge"
        );
    }

    #[test]
    fn whitespace_does_not_count_towards_length() {
        assert!(validate_annotation_text("a    \t").is_err());
    }

    #[test]
    fn negative_timestamp_is_rejected() {
        assert!(validate_timestamp(-0.1).is_err());
        assert!(validate_timestamp(f64::NAN).is_err());
        assert!(validate_timestamp(0.0).is_ok());
        assert!(validate_timestamp(42.5).is_ok());
    }

    #[test]
    fn rating_must_be_half_steps_in_range() {
        assert!(validate_rating(0.0).is_ok());
        assert!(validate_rating(3.5).is_ok());
        assert!(validate_rating(5.0).is_ok());
        assert!(validate_rating(5.5).is_err());
        assert!(validate_rating(-0.5).is_err());
        assert!(validate_rating(3.2).is_err());
        assert!(validate_rating(f64::INFINITY).is_err());
    }
}
