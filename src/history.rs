//! The persisted command history and its append cursor.

use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;

/// In-memory history buffer with file persistence.
///
/// The buffer is the authority for what gets written to disk; the line
/// editor keeps its own copy purely for arrow-key recall. `appended` counts
/// how many leading entries have already been flushed by an append, so
/// repeated appends never duplicate lines.
#[derive(Debug, Default)]
pub struct History {
    entries: Vec<String>,
    appended: usize,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    /// Adds one typed line. Blank lines are not recorded.
    pub fn record(&mut self, line: &str) {
        if line.trim().is_empty() {
            return;
        }
        self.entries.push(line.to_string());
    }

    /// Reads `path` line by line, appending to the buffer.
    pub fn load(&mut self, path: &Path) -> io::Result<usize> {
        let file = File::open(path)?;
        let mut loaded = 0;
        for line in BufReader::new(file).lines() {
            self.entries.push(line?);
            loaded += 1;
        }
        Ok(loaded)
    }

    /// Startup variant of [`load`](Self::load): entries that came from disk
    /// are already persisted, so the append cursor jumps past them.
    pub fn load_startup(&mut self, path: &Path) -> io::Result<usize> {
        let loaded = self.load(path)?;
        self.appended = self.entries.len();
        Ok(loaded)
    }

    /// Overwrites `path` with the whole buffer, one entry per line.
    pub fn write_to(&mut self, path: &Path) -> io::Result<()> {
        let mut file = File::create(path)?;
        for entry in &self.entries {
            writeln!(file, "{entry}")?;
        }
        self.appended = self.entries.len();
        Ok(())
    }

    /// Appends entries not yet flushed, then advances the cursor.
    pub fn append_to(&mut self, path: &Path) -> io::Result<()> {
        let mut file = OpenOptions::new().append(true).create(true).open(path)?;
        for entry in &self.entries[self.appended..] {
            writeln!(file, "{entry}")?;
        }
        self.appended = self.entries.len();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_lines_are_not_recorded() {
        let mut history = History::new();
        history.record("echo hi");
        history.record("   ");
        history.record("");
        history.record("\t");
        assert_eq!(history.entries(), ["echo hi"]);
    }

    #[test]
    fn append_flushes_only_new_entries() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let mut history = History::new();
        history.record("first");
        history.record("second");
        history.append_to(file.path()).unwrap();
        history.record("third");
        history.append_to(file.path()).unwrap();

        let written = std::fs::read_to_string(file.path()).unwrap();
        assert_eq!(written, "first\nsecond\nthird\n");
    }

    #[test]
    fn write_resets_cursor_to_buffer_length() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let mut history = History::new();
        history.record("one");
        history.write_to(file.path()).unwrap();
        // Nothing new since the write, so an append adds nothing.
        history.append_to(file.path()).unwrap();
        let written = std::fs::read_to_string(file.path()).unwrap();
        assert_eq!(written, "one\n");
    }

    #[test]
    fn startup_load_marks_entries_as_flushed() {
        let seed = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(seed.path(), "old one\nold two\n").unwrap();

        let mut history = History::new();
        assert_eq!(history.load_startup(seed.path()).unwrap(), 2);

        let target = tempfile::NamedTempFile::new().unwrap();
        history.append_to(target.path()).unwrap();
        assert_eq!(std::fs::read_to_string(target.path()).unwrap(), "");
    }

    #[test]
    fn plain_load_leaves_cursor_alone() {
        let seed = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(seed.path(), "imported\n").unwrap();

        let mut history = History::new();
        history.load(seed.path()).unwrap();

        let target = tempfile::NamedTempFile::new().unwrap();
        history.append_to(target.path()).unwrap();
        assert_eq!(
            std::fs::read_to_string(target.path()).unwrap(),
            "imported\n"
        );
    }

    #[test]
    fn write_then_load_reproduces_buffer() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let mut history = History::new();
        history.record("a");
        history.record("b");
        history.write_to(file.path()).unwrap();
        history.load(file.path()).unwrap();
        assert_eq!(history.entries(), ["a", "b", "a", "b"]);
    }
}
