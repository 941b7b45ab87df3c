//! Result type alias for migration operations

use super::errors::MigrationError;

/// Result type alias using [`MigrationError`]
///
/// # Examples
///
/// ```
/// use ferry::domain::result::Result;
/// use ferry::domain::errors::MigrationError;
///
/// fn failing_function() -> Result<()> {
///     Err(MigrationError::Validation("Invalid input".to_string()))
/// }
///
/// assert!(failing_function().is_err());
/// ```
pub type Result<T> = std::result::Result<T, MigrationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_with_question_mark() -> Result<()> {
        fn inner() -> Result<i32> {
            Ok(42)
        }

        let value = inner()?;
        assert_eq!(value, 42);
        Ok(())
    }
}
