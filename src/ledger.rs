//! Outcome ledger for one batch run.
//!
//! Two append-only lists, written out once at the end of the batch as
//! `login:password` lines. Both files are staged next to their destination
//! and only renamed into place after both were written. If the second rename
//! fails, the first destination is restored from a backup taken before the
//! commit, so a failed flush leaves neither destination changed.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::BatchError;
use crate::state_machine::{JobResult, JobStatus};

/// One `login:password` line of a ledger file.
#[derive(Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    pub login: String,
    pub credential: String,
}

impl LedgerEntry {
    pub fn line(&self) -> String {
        format!("{}:{}", self.login, self.credential)
    }
}

impl std::fmt::Debug for LedgerEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedgerEntry")
            .field("login", &self.login)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Default)]
pub struct Ledger {
    succeeded: Vec<LedgerEntry>,
    failed: Vec<LedgerEntry>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&mut self, login: &str, new_credential: &str) {
        self.succeeded.push(LedgerEntry {
            login: login.to_string(),
            credential: new_credential.to_string(),
        });
    }

    pub fn record_failure(&mut self, login: &str, last_known_credential: &str) {
        self.failed.push(LedgerEntry {
            login: login.to_string(),
            credential: last_known_credential.to_string(),
        });
    }

    /// Routes a finished job to the list matching its status.
    pub fn record(&mut self, result: &JobResult) {
        match result.status {
            JobStatus::Succeeded => self.record_success(&result.login, &result.credential),
            JobStatus::Failed => self.record_failure(&result.login, &result.credential),
        }
    }

    pub fn succeeded(&self) -> &[LedgerEntry] {
        &self.succeeded
    }

    pub fn failed(&self) -> &[LedgerEntry] {
        &self.failed
    }

    /// Writes both lists. Existing destination files are replaced.
    pub fn flush(&self, success_path: &Path, failed_path: &Path) -> Result<(), BatchError> {
        let staged_success = stage(success_path, &self.succeeded)?;
        let staged_failed = match stage(failed_path, &self.failed) {
            Ok(p) => p,
            Err(e) => {
                let _ = fs::remove_file(&staged_success);
                return Err(e);
            }
        };

        let backup = match backup(success_path) {
            Ok(b) => b,
            Err(e) => {
                let _ = fs::remove_file(&staged_success);
                let _ = fs::remove_file(&staged_failed);
                return Err(e);
            }
        };

        if let Err(e) = commit(&staged_success, success_path) {
            let _ = fs::remove_file(&staged_success);
            let _ = fs::remove_file(&staged_failed);
            discard(backup.as_deref());
            return Err(e);
        }

        if let Err(e) = commit(&staged_failed, failed_path) {
            let _ = fs::remove_file(&staged_failed);
            restore(backup.as_deref(), success_path);
            return Err(e);
        }
        discard(backup.as_deref());

        info!(
            succeeded = self.succeeded.len(),
            failed = self.failed.len(),
            success_file = %success_path.display(),
            failed_file = %failed_path.display(),
            "ledger flushed"
        );
        Ok(())
    }
}

fn sibling_path(dest: &Path, suffix: &str) -> PathBuf {
    let mut name = dest
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(suffix);
    dest.with_file_name(name)
}

fn staging_path(dest: &Path) -> PathBuf {
    sibling_path(dest, ".partial")
}

fn backup_path(dest: &Path) -> PathBuf {
    sibling_path(dest, ".previous")
}

/// Copies an existing destination aside. `None` when there was nothing to keep.
fn backup(dest: &Path) -> Result<Option<PathBuf>, BatchError> {
    if !dest.is_file() {
        return Ok(None);
    }
    let path = backup_path(dest);
    fs::copy(dest, &path).map_err(|source| BatchError::Ledger {
        path: path.clone(),
        source,
    })?;
    Ok(Some(path))
}

/// Puts the destination back the way it was before the commit started.
fn restore(backup: Option<&Path>, dest: &Path) {
    let restored = match backup {
        Some(b) => fs::rename(b, dest),
        None => fs::remove_file(dest),
    };
    if let Err(e) = restored {
        warn!(path = %dest.display(), error = %e, "could not restore ledger file");
    }
}

fn discard(backup: Option<&Path>) {
    if let Some(b) = backup {
        let _ = fs::remove_file(b);
    }
}

fn stage(dest: &Path, entries: &[LedgerEntry]) -> Result<PathBuf, BatchError> {
    let path = staging_path(dest);
    let ledger_err = |source| BatchError::Ledger {
        path: path.clone(),
        source,
    };

    let mut file = fs::File::create(&path).map_err(ledger_err)?;
    for entry in entries {
        writeln!(file, "{}", entry.line()).map_err(ledger_err)?;
    }
    file.sync_all().map_err(ledger_err)?;
    Ok(path)
}

fn commit(staged: &Path, dest: &Path) -> Result<(), BatchError> {
    fs::rename(staged, dest).map_err(|source| BatchError::Ledger {
        path: dest.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn records_in_insertion_order() {
        let mut ledger = Ledger::new();
        ledger.record_success("alice", "new1");
        ledger.record_failure("bob", "old2");
        ledger.record_success("carol", "new3");

        let lines: Vec<_> = ledger.succeeded().iter().map(LedgerEntry::line).collect();
        assert_eq!(lines, vec!["alice:new1", "carol:new3"]);
        assert_eq!(ledger.failed()[0].line(), "bob:old2");
    }

    #[test]
    fn record_routes_by_status() {
        let mut ledger = Ledger::new();
        ledger.record(&JobResult {
            login: "alice".into(),
            credential: "newpw".into(),
            status: JobStatus::Succeeded,
            attempts: 1,
            last_error: None,
        });
        ledger.record(&JobResult {
            login: "carol".into(),
            credential: "oldpw".into(),
            status: JobStatus::Failed,
            attempts: 5,
            last_error: Some("timeout".into()),
        });
        assert_eq!(ledger.succeeded().len(), 1);
        assert_eq!(ledger.failed().len(), 1);
        assert_eq!(ledger.failed()[0].line(), "carol:oldpw");
    }

    #[test]
    fn flush_writes_both_files() {
        let dir = TempDir::new().unwrap();
        let success = dir.path().join("success.txt");
        let failed = dir.path().join("failed.txt");

        let mut ledger = Ledger::new();
        ledger.record_success("alice", "newpw");
        ledger.record_failure("bob", "oldpw");
        ledger.record_failure("carol", "oldpw");
        ledger.flush(&success, &failed).unwrap();

        assert_eq!(fs::read_to_string(&success).unwrap(), "alice:newpw\n");
        assert_eq!(
            fs::read_to_string(&failed).unwrap(),
            "bob:oldpw\ncarol:oldpw\n"
        );
        assert!(!staging_path(&success).exists());
        assert!(!staging_path(&failed).exists());
    }

    #[test]
    fn empty_list_produces_empty_file() {
        let dir = TempDir::new().unwrap();
        let success = dir.path().join("success.txt");
        let failed = dir.path().join("failed.txt");
        fs::write(&failed, "stale:entry\n").unwrap();

        let mut ledger = Ledger::new();
        ledger.record_success("alice", "newpw");
        ledger.flush(&success, &failed).unwrap();

        assert_eq!(fs::read_to_string(&failed).unwrap(), "");
    }

    #[test]
    fn failed_staging_leaves_destinations_untouched() {
        let dir = TempDir::new().unwrap();
        let success = dir.path().join("success.txt");
        let failed = dir.path().join("missing-dir").join("failed.txt");
        fs::write(&success, "previous:run\n").unwrap();

        let mut ledger = Ledger::new();
        ledger.record_success("alice", "newpw");
        let err = ledger.flush(&success, &failed).unwrap_err();

        assert!(matches!(err, BatchError::Ledger { .. }));
        assert_eq!(fs::read_to_string(&success).unwrap(), "previous:run\n");
        assert!(!staging_path(&success).exists());
    }

    #[test]
    fn failed_commit_restores_first_destination() {
        let dir = TempDir::new().unwrap();
        let success = dir.path().join("success.txt");
        let failed = dir.path().join("failed.txt");
        fs::write(&success, "previous:run\n").unwrap();
        // A directory in the way makes the second rename fail after staging succeeded.
        fs::create_dir(&failed).unwrap();

        let mut ledger = Ledger::new();
        ledger.record_success("alice", "newpw");
        ledger.record_failure("bob", "oldpw");
        let err = ledger.flush(&success, &failed).unwrap_err();

        assert!(matches!(err, BatchError::Ledger { .. }));
        assert_eq!(fs::read_to_string(&success).unwrap(), "previous:run\n");
        assert!(failed.is_dir());
        assert!(!staging_path(&success).exists());
        assert!(!staging_path(&failed).exists());
        assert!(!backup_path(&success).exists());
    }

    #[test]
    fn failed_commit_removes_new_first_destination() {
        let dir = TempDir::new().unwrap();
        let success = dir.path().join("success.txt");
        let failed = dir.path().join("failed.txt");
        fs::create_dir(&failed).unwrap();

        let mut ledger = Ledger::new();
        ledger.record_success("alice", "newpw");
        assert!(ledger.flush(&success, &failed).is_err());

        assert!(!success.exists());
        assert!(!staging_path(&failed).exists());
    }

    #[test]
    fn successful_flush_leaves_no_backup() {
        let dir = TempDir::new().unwrap();
        let success = dir.path().join("success.txt");
        let failed = dir.path().join("failed.txt");
        fs::write(&success, "previous:run\n").unwrap();

        let mut ledger = Ledger::new();
        ledger.record_success("alice", "newpw");
        ledger.flush(&success, &failed).unwrap();

        assert_eq!(fs::read_to_string(&success).unwrap(), "alice:newpw\n");
        assert!(!backup_path(&success).exists());
    }

    #[test]
    fn staging_path_is_a_sibling() {
        assert_eq!(
            staging_path(Path::new("out/success.txt")),
            PathBuf::from("out/success.txt.partial")
        );
    }
}
