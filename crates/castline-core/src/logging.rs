//! Transport transcript.
//!
//! An optional append-only file recording every transport request and its
//! result, one timestamped line each. Separate from the `log` output.

use std::{
    fs::{File, OpenOptions},
    io::Write,
    path::Path,
    sync::{Arc, Mutex},
};

use chrono::{SecondsFormat, Utc};

/// Cheap-to-clone handle to a transcript file. Disabled when no file is open.
#[derive(Clone, Default)]
pub struct Transcript {
    file: Arc<Mutex<Option<File>>>,
}

impl Transcript {
    /// A transcript that discards everything.
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Open (or create) `{log_dir}/{log_id}.log`.
    ///
    /// Falls back to a disabled transcript if the file can't be opened.
    pub fn open(log_dir: Option<&Path>, log_id: &str) -> Self {
        let file = log_dir.and_then(|dir| {
            if let Err(e) = std::fs::create_dir_all(dir) {
                log::warn!("Cannot create transcript dir {}: {}", dir.display(), e);
                return None;
            }
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(dir.join(format!("{}.log", log_id)))
                .map_err(|e| log::warn!("Cannot open transcript for {}: {}", log_id, e))
                .ok()
        });
        Self {
            file: Arc::new(Mutex::new(file)),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.file.lock().map(|guard| guard.is_some()).unwrap_or(false)
    }

    /// Append `[timestamp] DIRECTION: data`.
    pub fn record(&self, direction: &str, data: &str) {
        if let Ok(mut guard) = self.file.lock() {
            if let Some(ref mut file) = *guard {
                let ts = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
                let _ = writeln!(file, "[{}] {}: {}", ts, direction, data);
                let _ = file.flush();
            }
        }
    }

    /// Record an outgoing request.
    pub fn request(&self, operation: &str) {
        self.record("OUT", operation);
    }

    /// Record the result of a request.
    pub fn response<T: std::fmt::Debug, E: std::fmt::Display>(
        &self,
        operation: &str,
        result: &Result<T, E>,
    ) {
        match result {
            Ok(value) => self.record("IN", &format!("{} ok {:?}", operation, value)),
            Err(e) => self.record("ERR", &format!("{} failed: {}", operation, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn read(path: &Path) -> String {
        std::fs::read_to_string(path).unwrap()
    }

    #[test]
    fn open_creates_file() {
        let dir = tempdir().unwrap();
        let transcript = Transcript::open(Some(dir.path()), "session-1");

        assert!(transcript.is_enabled());
        assert!(dir.path().join("session-1.log").exists());
    }

    #[test]
    fn open_without_dir_is_disabled() {
        let transcript = Transcript::open(None, "session-1");
        assert!(!transcript.is_enabled());
        // Should not panic
        transcript.request("connect");
    }

    #[test]
    fn open_creates_missing_dirs() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        let transcript = Transcript::open(Some(&nested), "s");
        assert!(transcript.is_enabled());
        assert!(nested.join("s.log").exists());
    }

    #[test]
    fn request_and_response_lines() {
        let dir = tempdir().unwrap();
        let transcript = Transcript::open(Some(dir.path()), "s");

        transcript.request("connect");
        transcript.response::<_, String>("connect", &Ok("Studio"));
        transcript.response::<(), _>("disconnect", &Err("socket closed"));

        let contents = read(&dir.path().join("s.log"));
        let lines: Vec<_> = contents.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].ends_with("OUT: connect"));
        assert!(lines[1].ends_with("IN: connect ok \"Studio\""));
        assert!(lines[2].ends_with("ERR: disconnect failed: socket closed"));
        assert!(lines[0].starts_with('['));
        assert!(lines[0].contains("Z]"));
    }

    #[test]
    fn clones_share_the_file() {
        let dir = tempdir().unwrap();
        let transcript = Transcript::open(Some(dir.path()), "s");
        let clone = transcript.clone();

        transcript.request("connect");
        clone.request("disconnect");

        assert_eq!(read(&dir.path().join("s.log")).lines().count(), 2);
    }
}
