//! Job input parsing.
//!
//! The input is a UTF-8 text file with one `login:old_password:new_password`
//! entry per line. Surrounding whitespace is trimmed and blank lines are
//! ignored. Lines that don't split into exactly three non-empty fields are
//! reported as [`BatchError::MalformedLine`] and skipped; they never abort
//! the batch.

use std::path::Path;

use crate::error::BatchError;

/// A pending credential change for one account.
#[derive(Clone, PartialEq, Eq)]
pub struct JobRecord {
    /// 1-based position among the non-blank entries of the input.
    pub position: usize,
    pub login: String,
    pub old_password: String,
    pub new_password: String,
}

impl std::fmt::Debug for JobRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobRecord")
            .field("position", &self.position)
            .field("login", &self.login)
            .finish_non_exhaustive()
    }
}

/// Parses one trimmed, non-blank entry.
pub fn parse_line(position: usize, line: &str) -> Result<JobRecord, BatchError> {
    let malformed = || BatchError::MalformedLine {
        position,
        content: line.to_string(),
    };

    let mut fields = line.split(':');
    let (Some(login), Some(old), Some(new), None) =
        (fields.next(), fields.next(), fields.next(), fields.next())
    else {
        return Err(malformed());
    };

    if login.is_empty() || old.is_empty() || new.is_empty() {
        return Err(malformed());
    }

    Ok(JobRecord {
        position,
        login: login.to_string(),
        old_password: old.to_string(),
        new_password: new.to_string(),
    })
}

/// Owns the raw job text; every call to [`JobSource::entries`] restarts
/// from the top.
#[derive(Debug, Clone)]
pub struct JobSource {
    text: String,
}

impl JobSource {
    pub fn from_text(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn from_path(path: &Path) -> Result<Self, BatchError> {
        let text = std::fs::read_to_string(path).map_err(|source| BatchError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::from_text(text))
    }

    /// Trimmed, non-blank lines in input order.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.text.lines().map(str::trim).filter(|l| !l.is_empty())
    }

    /// Number of non-blank entries, malformed ones included.
    pub fn len(&self) -> usize {
        self.lines().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Lazily parses each entry.
    pub fn entries(&self) -> impl Iterator<Item = Result<JobRecord, BatchError>> + '_ {
        self.lines()
            .enumerate()
            .map(|(i, line)| parse_line(i + 1, line))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_valid_line() {
        let record = parse_line(1, "alice:oldpw:newpw").unwrap();
        assert_eq!(record.login, "alice");
        assert_eq!(record.old_password, "oldpw");
        assert_eq!(record.new_password, "newpw");
        assert_eq!(record.position, 1);
    }

    #[test]
    fn rejects_empty_field() {
        let err = parse_line(2, "dave::newpw").unwrap_err();
        match err {
            BatchError::MalformedLine { position, content } => {
                assert_eq!(position, 2);
                assert_eq!(content, "dave::newpw");
            }
            other => panic!("expected MalformedLine, got {other:?}"),
        }
    }

    #[test]
    fn rejects_wrong_field_count() {
        assert!(parse_line(1, "alice:oldpw").is_err());
        assert!(parse_line(1, "alice:old:new:extra").is_err());
        assert!(parse_line(1, "alice").is_err());
    }

    #[test]
    fn blank_lines_and_whitespace_are_dropped() {
        let source = JobSource::from_text("\n  alice:a:b  \n\n\t\nbob:c:d\n   \n");
        let lines: Vec<_> = source.lines().collect();
        assert_eq!(lines, vec!["alice:a:b", "bob:c:d"]);
        assert_eq!(source.len(), 2);
    }

    #[test]
    fn job_count_excludes_malformed_and_blank_lines() {
        let text = "alice:oldpw:newpw\n\ndave::newpw\ncarol:oldpw:newpw\nbroken\n";
        let source = JobSource::from_text(text);
        let (records, rejected): (Vec<_>, Vec<_>) = source.entries().partition(Result::is_ok);
        let records: Vec<JobRecord> = records.into_iter().map(Result::unwrap).collect();

        let total_lines = text.lines().count();
        let blank = text.lines().filter(|l| l.trim().is_empty()).count();
        assert_eq!(records.len(), total_lines - rejected.len() - blank);
        assert_eq!(
            records.iter().map(|r| r.login.as_str()).collect::<Vec<_>>(),
            vec!["alice", "carol"]
        );
        assert_eq!(records[1].position, 3);
    }

    #[test]
    fn entries_restart_on_each_call() {
        let source = JobSource::from_text("alice:a:b\nbob:c:d");
        assert_eq!(source.entries().count(), 2);
        assert_eq!(source.entries().count(), 2);
    }

    #[test]
    fn debug_hides_passwords() {
        let record = parse_line(1, "alice:hunter2:correcthorse").unwrap();
        let debug = format!("{record:?}");
        assert!(debug.contains("alice"));
        assert!(!debug.contains("hunter2"));
        assert!(!debug.contains("correcthorse"));
    }

    #[test]
    fn from_path_reports_missing_file() {
        let err = JobSource::from_path(Path::new("/definitely/not/here.txt")).unwrap_err();
        assert!(matches!(err, BatchError::Io { .. }));
    }
}
