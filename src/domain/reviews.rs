//! Input rules for books and reviews.

use super::error::DomainError;

pub const MIN_RATING: i16 = 1;
pub const MAX_RATING: i16 = 5;
pub const MAX_TITLE_LEN: usize = 255;

pub fn validate_rating(rating: i16) -> Result<i16, DomainError> {
    if !(MIN_RATING..=MAX_RATING).contains(&rating) {
        return Err(DomainError::validation(
            "rating",
            format!("must be between {MIN_RATING} and {MAX_RATING}, got {rating}"),
        ));
    }
    Ok(rating)
}

/// Trim review text and reject blank bodies.
pub fn normalize_review_text(text: &str) -> Result<String, DomainError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation("review", "must not be empty"));
    }
    Ok(trimmed.to_string())
}

pub fn normalize_title(title: &str) -> Result<String, DomainError> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation("title", "must not be empty"));
    }
    if trimmed.chars().count() > MAX_TITLE_LEN {
        return Err(DomainError::validation(
            "title",
            format!("must be at most {MAX_TITLE_LEN} characters"),
        ));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rating_bounds() {
        assert!(validate_rating(0).is_err());
        assert_eq!(validate_rating(1).ok(), Some(1));
        assert_eq!(validate_rating(5).ok(), Some(5));
        assert!(validate_rating(6).is_err());
    }

    #[test]
    fn review_text_is_trimmed() {
        assert_eq!(
            normalize_review_text("  great read \n").ok().as_deref(),
            Some("great read")
        );
        assert!(matches!(
            normalize_review_text("   "),
            Err(DomainError::Validation { field: "review", .. })
        ));
    }

    #[test]
    fn title_rejects_blank_and_overlong() {
        assert!(normalize_title("").is_err());
        assert!(normalize_title(&"x".repeat(MAX_TITLE_LEN + 1)).is_err());
        assert_eq!(normalize_title(" Dune ").ok().as_deref(), Some("Dune"));
    }
}
