use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

use crate::runner::LogEvent;

/// Ordered, append-only record of everything shown for a session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transcript {
    events: Vec<LogEvent>,
}

impl Transcript {
    pub fn push(&mut self, event: LogEvent) {
        self.events.push(event);
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn events(&self) -> &[LogEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Every event rendered on its own newline-terminated line.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for ev in &self.events {
            out.push_str(&ev.render());
            out.push('\n');
        }
        out
    }

    /// Writes the rendered transcript to `<dir>/session_YYYYMMDD_HHMMSS.log`.
    pub fn save_to(&self, dir: &Path, now: DateTime<Local>) -> std::io::Result<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(format!("session_{}.log", now.format("%Y%m%d_%H%M%S")));
        let mut file = std::fs::File::create(&path)?;
        file.write_all(self.render().as_bytes())?;
        file.flush()?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::runner::LogChannel;

    fn event(channel: LogChannel, msg: &str, s: u32) -> LogEvent {
        let mut ev = LogEvent::new(channel, msg);
        ev.at = Local.with_ymd_and_hms(2026, 5, 2, 10, 0, s).unwrap();
        ev
    }

    #[test]
    fn test_render_and_save() {
        let mut t = Transcript::default();
        t.push(event(LogChannel::Notice, "Starting calibration...", 1));
        t.push(event(LogChannel::Stdout, "found window", 2));
        t.push(event(LogChannel::Stderr, "warning: low fps", 3));

        let expected = "[10:00:01] Starting calibration...\n\
                        [10:00:02] found window\n\
                        [10:00:03] [error] warning: low fps\n";
        assert_eq!(t.render(), expected);

        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("logs");
        let now = Local.with_ymd_and_hms(2026, 5, 2, 10, 1, 30).unwrap();
        let path = t.save_to(&dir, now).unwrap();

        assert_eq!(path, dir.join("session_20260502_100130.log"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), expected);
    }

    #[test]
    fn test_clear_empties() {
        let mut t = Transcript::default();
        t.push(event(LogChannel::Stdout, "x", 0));
        assert_eq!(t.len(), 1);
        t.clear();
        assert!(t.is_empty());
        assert_eq!(t.render(), "");
    }
}
