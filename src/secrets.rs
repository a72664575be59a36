//! Per-account secret material.
//!
//! Each login maps to `<dir>/<login>.maFile`, a JSON document that carries the
//! authenticator secrets the change operation needs. The bundle is loaded
//! fresh for every job and dropped as soon as the job resolves.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::BatchError;

/// Default directory holding the `.maFile` documents.
pub const DEFAULT_SECRETS_DIR: &str = "maFiles";

const SECRET_FILE_EXTENSION: &str = "maFile";

/// Authentication material for a single account.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretBundle {
    pub shared_secret: String,
    pub identity_secret: String,
    pub device_id: String,
    pub steam_id: u64,
}

impl std::fmt::Debug for SecretBundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretBundle")
            .field("shared_secret", &"<redacted>")
            .field("identity_secret", &"<redacted>")
            .field("device_id", &self.device_id)
            .field("steam_id", &self.steam_id)
            .finish()
    }
}

/// Account ids show up both as JSON numbers and as numeric strings.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawId {
    Number(u64),
    Text(String),
}

impl RawId {
    fn value(&self) -> Option<u64> {
        match self {
            RawId::Number(n) => Some(*n),
            RawId::Text(s) => s.trim().parse().ok(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawSession {
    #[serde(rename = "SteamID", default)]
    steam_id: Option<RawId>,
}

/// On-disk layout; unknown keys are ignored.
#[derive(Debug, Deserialize)]
struct RawSecretFile {
    #[serde(default)]
    shared_secret: Option<String>,
    #[serde(default)]
    identity_secret: Option<String>,
    #[serde(default)]
    device_id: Option<String>,
    #[serde(default)]
    steamid: Option<RawId>,
    #[serde(rename = "Session", default)]
    session: Option<RawSession>,
}

impl RawSecretFile {
    fn into_bundle(self, path: &Path) -> Result<SecretBundle, BatchError> {
        let invalid = |reason: &str| BatchError::InvalidSecrets {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        };

        let shared_secret =
            non_empty(self.shared_secret).ok_or_else(|| invalid("missing shared_secret"))?;
        let identity_secret =
            non_empty(self.identity_secret).ok_or_else(|| invalid("missing identity_secret"))?;
        let device_id = non_empty(self.device_id).ok_or_else(|| invalid("missing device_id"))?;

        // Top-level id wins; the session block is the fallback.
        let steam_id = self
            .steamid
            .as_ref()
            .and_then(RawId::value)
            .or_else(|| {
                self.session
                    .as_ref()
                    .and_then(|s| s.steam_id.as_ref())
                    .and_then(RawId::value)
            })
            .ok_or_else(|| invalid("missing steamid"))?;

        Ok(SecretBundle {
            shared_secret,
            identity_secret,
            device_id,
            steam_id,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Locates and loads secret bundles from a fixed directory.
#[derive(Debug, Clone)]
pub struct SecretResolver {
    dir: PathBuf,
}

impl SecretResolver {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Where the secret material for `login` is expected to live.
    ///
    /// Logins that would escape `dir` are refused.
    pub fn path_for(&self, login: &str) -> Result<PathBuf, BatchError> {
        let unsafe_login = login.is_empty()
            || login == "."
            || login == ".."
            || login.contains(['/', '\\'])
            || login.contains('\0');
        if unsafe_login {
            return Err(BatchError::UnsafeLogin {
                login: login.to_string(),
            });
        }
        Ok(self.dir.join(format!("{login}.{SECRET_FILE_EXTENSION}")))
    }

    /// Loads the bundle for `login`.
    ///
    /// A missing file yields [`BatchError::MissingSecrets`]; an unreadable or
    /// incomplete document yields [`BatchError::InvalidSecrets`]; a login that
    /// is not a plain file name yields [`BatchError::UnsafeLogin`]. Callers
    /// treat all of them as "this job cannot be processed".
    pub fn resolve(&self, login: &str) -> Result<SecretBundle, BatchError> {
        let path = self.path_for(login)?;
        let contents = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(BatchError::MissingSecrets {
                    login: login.to_string(),
                    path,
                });
            }
            Err(e) => {
                return Err(BatchError::InvalidSecrets {
                    path,
                    reason: e.to_string(),
                });
            }
        };

        let raw: RawSecretFile =
            serde_json::from_str(&contents).map_err(|e| BatchError::InvalidSecrets {
                path: path.clone(),
                reason: e.to_string(),
            })?;
        raw.into_bundle(&path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &TempDir, login: &str, body: &str) {
        std::fs::write(dir.path().join(format!("{login}.maFile")), body).unwrap();
    }

    #[test]
    fn path_follows_naming_convention() {
        let resolver = SecretResolver::new("maFiles");
        assert_eq!(
            resolver.path_for("alice").unwrap(),
            PathBuf::from("maFiles").join("alice.maFile")
        );
    }

    #[test]
    fn logins_leaving_the_directory_are_refused() {
        let dir = TempDir::new().unwrap();
        let inner = dir.path().join("maFiles");
        std::fs::create_dir(&inner).unwrap();
        std::fs::write(dir.path().join("escape.maFile"), "{}").unwrap();

        let resolver = SecretResolver::new(&inner);
        for login in ["../escape", "..", ".", "a/b", "a\\b", "/etc/passwd"] {
            let err = resolver.resolve(login).unwrap_err();
            assert!(
                matches!(err, BatchError::UnsafeLogin { .. }),
                "{login}: {err:?}"
            );
        }
        assert!(resolver.path_for("alice..bob").is_ok());
    }

    #[test]
    fn resolves_top_level_steamid() {
        let dir = TempDir::new().unwrap();
        write(
            &dir,
            "alice",
            r#"{
                "shared_secret": "c2hhcmVk",
                "identity_secret": "aWRlbnRpdHk=",
                "device_id": "android:1234",
                "steamid": 76561198000000001,
                "account_name": "alice"
            }"#,
        );

        let bundle = SecretResolver::new(dir.path()).resolve("alice").unwrap();
        assert_eq!(bundle.shared_secret, "c2hhcmVk");
        assert_eq!(bundle.identity_secret, "aWRlbnRpdHk=");
        assert_eq!(bundle.device_id, "android:1234");
        assert_eq!(bundle.steam_id, 76561198000000001);
    }

    #[test]
    fn falls_back_to_session_steamid() {
        let dir = TempDir::new().unwrap();
        write(
            &dir,
            "alice",
            r#"{
                "shared_secret": "s",
                "identity_secret": "i",
                "device_id": "d",
                "Session": { "SteamID": "76561198000000002", "SessionID": "abc" }
            }"#,
        );

        let bundle = SecretResolver::new(dir.path()).resolve("alice").unwrap();
        assert_eq!(bundle.steam_id, 76561198000000002);
    }

    #[test]
    fn missing_file_is_missing_secrets() {
        let dir = TempDir::new().unwrap();
        let err = SecretResolver::new(dir.path()).resolve("bob").unwrap_err();
        match err {
            BatchError::MissingSecrets { login, path } => {
                assert_eq!(login, "bob");
                assert!(path.ends_with("bob.maFile"));
            }
            other => panic!("expected MissingSecrets, got {other:?}"),
        }
    }

    #[test]
    fn incomplete_document_is_invalid() {
        let dir = TempDir::new().unwrap();
        write(&dir, "carol", r#"{ "shared_secret": "s", "device_id": "d", "steamid": 1 }"#);
        let err = SecretResolver::new(dir.path()).resolve("carol").unwrap_err();
        assert!(matches!(err, BatchError::InvalidSecrets { .. }));
        assert!(err.to_string().contains("identity_secret"));
    }

    #[test]
    fn garbage_document_is_invalid() {
        let dir = TempDir::new().unwrap();
        write(&dir, "carol", "not json");
        let err = SecretResolver::new(dir.path()).resolve("carol").unwrap_err();
        assert!(matches!(err, BatchError::InvalidSecrets { .. }));
    }

    #[test]
    fn missing_steamid_everywhere_is_invalid() {
        let dir = TempDir::new().unwrap();
        write(
            &dir,
            "erin",
            r#"{ "shared_secret": "s", "identity_secret": "i", "device_id": "d", "Session": {} }"#,
        );
        let err = SecretResolver::new(dir.path()).resolve("erin").unwrap_err();
        assert!(err.to_string().contains("steamid"));
    }

    #[test]
    fn debug_redacts_secrets() {
        let bundle = SecretBundle {
            shared_secret: "topsecret".into(),
            identity_secret: "alsosecret".into(),
            device_id: "android:1".into(),
            steam_id: 7,
        };
        let debug = format!("{bundle:?}");
        assert!(!debug.contains("topsecret"));
        assert!(!debug.contains("alsosecret"));
        assert!(debug.contains("android:1"));
    }
}
