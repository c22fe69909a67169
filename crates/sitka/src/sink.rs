//! Output sinks shared by the explain dump, the derivation printer and the
//! action trace.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

/// Where auxiliary output (explain dumps, DOT derivations, action traces)
/// should be written.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum OutputSink {
    /// Discard the output entirely.
    #[default]
    Off,
    /// Write to standard output.
    Stdout,
    /// Write to the given file, truncating it first.
    File(PathBuf),
}

impl OutputSink {
    /// Open a writer for this sink, or `None` when the sink is off.
    pub(crate) fn writer(&self) -> io::Result<Option<Box<dyn Write>>> {
        match self {
            Self::Off => Ok(None),
            Self::Stdout => Ok(Some(Box::new(io::stdout()))),
            Self::File(path) => {
                let file = File::create(path)?;
                Ok(Some(Box::new(BufWriter::new(file))))
            }
        }
    }

    /// Whether anything will be written.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        !matches!(self, Self::Off)
    }
}
