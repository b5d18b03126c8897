//! Token storage.
//!
//! Reads/writes `<config dir>/gridsync/auth.json` (0600 on Unix).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::client::SheetError;

pub const DEFAULT_API_BASE: &str = "https://api.smartsheet.com/2.0";

/// Authentication credentials stored locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthCredentials {
    /// Bearer token for the sheet API
    pub token: String,
    /// API base URL
    #[serde(default = "default_api_base")]
    pub api_base: String,
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

impl AuthCredentials {
    pub fn new(token: String, api_base: String) -> Self {
        Self { token, api_base }
    }

    /// Credentials against the public API.
    pub fn with_token(token: String) -> Self {
        Self::new(token, default_api_base())
    }
}

/// Returns the path to the auth credentials file.
pub fn auth_file_path() -> Option<PathBuf> {
    dirs::config_dir().map(|c| c.join("gridsync/auth.json"))
}

/// Load saved auth credentials from disk.
/// Returns None if no credentials are saved or if the file is invalid.
pub fn load_auth() -> Option<AuthCredentials> {
    load_auth_from(&auth_file_path()?)
}

pub fn load_auth_from(path: &Path) -> Option<AuthCredentials> {
    let contents = std::fs::read_to_string(path).ok()?;
    serde_json::from_str(&contents).ok()
}

/// Save auth credentials to the default location.
pub fn save_auth(creds: &AuthCredentials) -> Result<PathBuf, SheetError> {
    let path = auth_file_path()
        .ok_or_else(|| SheetError::Io("could not determine config directory".into()))?;
    save_auth_to(&path, creds)?;
    Ok(path)
}

/// Creates the parent directory if it doesn't exist.
/// Sets 0600 permissions on Unix.
pub fn save_auth_to(path: &Path, creds: &AuthCredentials) -> Result<(), SheetError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| SheetError::Io(format!("failed to create config directory: {e}")))?;
    }

    let contents = serde_json::to_string_pretty(creds)
        .map_err(|e| SheetError::Parse(format!("failed to serialize credentials: {e}")))?;

    std::fs::write(path, &contents)
        .map_err(|e| SheetError::Io(format!("failed to write auth file: {e}")))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let permissions = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(path, permissions)
            .map_err(|e| SheetError::Io(format!("failed to set file permissions: {e}")))?;
    }

    Ok(())
}

/// Delete saved auth credentials. Returns whether a file was removed.
pub fn delete_auth() -> Result<bool, SheetError> {
    let Some(path) = auth_file_path() else {
        return Ok(false);
    };
    delete_auth_at(&path)
}

pub fn delete_auth_at(path: &Path) -> Result<bool, SheetError> {
    if !path.exists() {
        return Ok(false);
    }
    std::fs::remove_file(path)
        .map_err(|e| SheetError::Io(format!("failed to delete auth file: {e}")))?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_credentials_roundtrip() {
        let creds = AuthCredentials::new("test-token".into(), "https://sheets.test/2.0".into());
        let json = serde_json::to_string_pretty(&creds).unwrap();
        let parsed: AuthCredentials = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, creds);
    }

    #[test]
    fn test_missing_api_base_defaults() {
        let parsed: AuthCredentials = serde_json::from_str(r#"{"token":"tok"}"#).unwrap();
        assert_eq!(parsed.token, "tok");
        assert_eq!(parsed.api_base, DEFAULT_API_BASE);
    }

    #[test]
    fn test_auth_file_path_exists() {
        let path = auth_file_path().unwrap();
        assert!(path.to_string_lossy().contains("gridsync"));
        assert!(path.to_string_lossy().ends_with("auth.json"));
    }

    #[test]
    fn test_save_load_delete() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/auth.json");

        let creds = AuthCredentials::with_token("tok123".into());
        save_auth_to(&path, &creds).unwrap();
        assert_eq!(load_auth_from(&path), Some(creds));

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }

        assert!(delete_auth_at(&path).unwrap());
        assert!(!delete_auth_at(&path).unwrap());
        assert_eq!(load_auth_from(&path), None);
    }

    #[test]
    fn test_invalid_file_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("auth.json");
        std::fs::write(&path, "not json").unwrap();
        assert_eq!(load_auth_from(&path), None);
    }
}
