//! Command sinks: observers of every command the dispatcher transmits

use chrono::Local;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

/// Receives each formatted command after validation, immediately before it
/// is written to the control channel.
pub trait CommandSink: Send {
    fn record(&mut self, command: &str) -> io::Result<()>;
}

/// Writes issued commands to a text file, one per line, so a session can be
/// replayed later.
pub struct ProgramRecorder {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl ProgramRecorder {
    pub fn create(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut writer = BufWriter::new(File::create(&path)?);
        writeln!(writer, "# recorded {}", Local::now().to_rfc3339())?;
        writer.flush()?;
        info!("Recording commands to {}", path.display());
        Ok(Self { path, writer })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CommandSink for ProgramRecorder {
    fn record(&mut self, command: &str) -> io::Result<()> {
        writeln!(self.writer, "{}", command)?;
        self.writer.flush()
    }
}
