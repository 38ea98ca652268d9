//! Extent store errors

#[derive(Debug, thiserror::Error)]
pub enum ExtentError {
    #[error("fileName is required")]
    EmptyName,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(ExtentError::EmptyName.to_string(), "fileName is required");

        let err: ExtentError = std::io::Error::other("disk gone").into();
        assert_eq!(err.to_string(), "I/O error: disk gone");
    }
}
