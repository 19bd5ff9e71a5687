//! Last-resort recording of unhandled failures.

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Local;

pub const CRASH_FILE: &str = "crash.log";

/// Renders the record appended for one fatal failure.
pub fn format_crash_record(message: &str) -> String {
    format!(
        "[{}] Unhandled failure\n{}\n\n",
        Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
        message.trim_end()
    )
}

/// Appends `text` to `<dir>/crash.log`. If that fails, writes a fresh
/// timestamped file in `dir`, then in the temp dir. Returns the path written,
/// or `None` if nothing could be written. Never panics.
pub fn write_crash_record(dir: &Path, text: &str) -> Option<PathBuf> {
    let _ = std::fs::create_dir_all(dir);

    let primary = dir.join(CRASH_FILE);
    if append(&primary, text).is_ok() {
        return Some(primary);
    }

    let name = fallback_name();
    for candidate in [dir.join(&name), std::env::temp_dir().join(&name)] {
        if std::fs::write(&candidate, text).is_ok() {
            return Some(candidate);
        }
    }
    None
}

/// Records a fatal failure under `dir` and logs where it went.
pub fn report_fatal(dir: &Path, message: &str) -> Option<PathBuf> {
    let written = write_crash_record(dir, &format_crash_record(message));
    match &written {
        Some(path) => tracing::error!(path = %path.display(), "crash record written"),
        None => tracing::error!("crash record could not be written"),
    }
    written
}

fn fallback_name() -> String {
    format!("crash_{}.log", Local::now().format("%Y%m%d_%H%M%S_%3f"))
}

fn append(path: &Path, text: &str) -> std::io::Result<()> {
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    file.write_all(text.as_bytes())?;
    file.flush()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_appends_to_primary() {
        let tmp = tempfile::tempdir().unwrap();
        let first = write_crash_record(tmp.path(), "one\n").unwrap();
        let second = write_crash_record(tmp.path(), "two\n").unwrap();
        assert_eq!(first, tmp.path().join(CRASH_FILE));
        assert_eq!(first, second);
        assert_eq!(std::fs::read_to_string(first).unwrap(), "one\ntwo\n");
    }

    #[test]
    fn test_falls_back_when_primary_unwritable() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir(tmp.path().join(CRASH_FILE)).unwrap();

        let path = write_crash_record(tmp.path(), "boom").unwrap();
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("crash_"), "{name}");
        assert!(name.ends_with(".log"));
        assert_eq!(path.parent(), Some(tmp.path()));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "boom");
    }

    #[test]
    fn test_record_contains_message() {
        let rec = format_crash_record("panicked at 'x'\n");
        assert!(rec.contains("Unhandled failure"));
        assert!(rec.ends_with("panicked at 'x'\n\n"));
    }
}
