use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Module not found: {0}")]
    ModuleNotFound(String),

    #[error("Failed to query module {module}: {message}")]
    ModuleQueryFailed { module: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Check if this error is a "file not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Io(e) if e.kind() == std::io::ErrorKind::NotFound)
    }

    /// Check if this error means the target module itself is unavailable
    pub fn is_module_error(&self) -> bool {
        matches!(
            self,
            Error::ModuleNotFound(_) | Error::ModuleQueryFailed { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_is_not_found() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = Error::Io(io_err);
        assert!(err.is_not_found());
        assert!(!err.is_module_error());

        let other_io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err2 = Error::Io(other_io_err);
        assert!(!err2.is_not_found());
    }

    #[test]
    fn test_module_error_display() {
        let err = Error::ModuleQueryFailed {
            module: "libgame.so".to_string(),
            message: "no PT_LOAD segments".to_string(),
        };
        assert!(err.is_module_error());
        assert_eq!(
            err.to_string(),
            "Failed to query module libgame.so: no PT_LOAD segments"
        );
    }
}
