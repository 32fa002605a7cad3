//! Where the persisted session id comes from.
//!
//! The backend authenticates by the raw session id in the `Authorization`
//! header. The id is written by the sign-in flow, which is outside this
//! crate; the client only reads it back each time a header refresh is asked
//! for, so a session written after startup is picked up on the next action.

use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use crate::error::{ApiError, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SessionSource {
    /// No persisted credentials. Requests go out unauthenticated.
    #[default]
    None,
    /// A session id given directly.
    Value(String),
    /// A file whose trimmed contents are the session id.
    File(PathBuf),
}

impl SessionSource {
    /// Read the current session id.
    ///
    /// A missing file or blank contents mean "no session", not an error.
    pub fn read(&self) -> Result<Option<String>> {
        let raw = match self {
            Self::None => return Ok(None),
            Self::Value(value) => value.clone(),
            Self::File(path) => match fs::read_to_string(path) {
                Ok(contents) => contents,
                Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
                Err(source) => {
                    return Err(ApiError::Session {
                        path: path.clone(),
                        source,
                    })
                }
            },
        };

        let trimmed = raw.trim();
        Ok((!trimmed.is_empty()).then(|| trimmed.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_is_trimmed() {
        let source = SessionSource::Value("  abc123\n".into());
        assert_eq!(source.read().unwrap(), Some("abc123".to_string()));
    }

    #[test]
    fn test_blank_value_is_no_session() {
        assert_eq!(SessionSource::Value("   ".into()).read().unwrap(), None);
        assert_eq!(SessionSource::None.read().unwrap(), None);
    }

    #[test]
    fn test_file_is_reread_on_every_call() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session");
        let source = SessionSource::File(path.clone());

        assert_eq!(source.read().unwrap(), None);

        fs::write(&path, "first-session\n").unwrap();
        assert_eq!(source.read().unwrap(), Some("first-session".to_string()));

        fs::write(&path, "second-session").unwrap();
        assert_eq!(source.read().unwrap(), Some("second-session".to_string()));
    }

    #[test]
    fn test_unreadable_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let source = SessionSource::File(dir.path().to_path_buf());

        assert!(matches!(source.read(), Err(ApiError::Session { .. })));
    }
}
