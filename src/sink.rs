// Row-oriented text output: one header line, then one line per row.

use crate::error::{Result, SamplerError};
use crate::models::Row;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

pub const FIELD_SEPARATOR: &str = ", ";

/// Where a sampler writes its rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    Stdout,
    File(PathBuf),
}

impl Destination {
    /// `None` means standard output.
    pub fn from_path(path: Option<PathBuf>) -> Self {
        path.map_or(Self::Stdout, Self::File)
    }
}

impl std::fmt::Display for Destination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stdout => f.write_str("<stdout>"),
            Self::File(path) => write!(f, "{}", path.display()),
        }
    }
}

pub struct RowWriter {
    target: String,
    out: Option<BufWriter<Box<dyn Write>>>,
    columns: usize,
    flush_each: bool,
}

impl RowWriter {
    /// Opens (truncating) the destination and writes the header.
    pub fn create(dest: &Destination, header: &[String], flush_each: bool) -> Result<Self> {
        let inner: Box<dyn Write> = match dest {
            Destination::Stdout => Box::new(std::io::stdout()),
            Destination::File(path) => Box::new(File::create(path).map_err(|source| {
                SamplerError::OpenOutput {
                    path: path.clone(),
                    source,
                }
            })?),
        };
        Self::from_writer(dest.to_string(), inner, header, flush_each)
    }

    fn from_writer(
        target: impl Into<String>,
        inner: Box<dyn Write>,
        header: &[String],
        flush_each: bool,
    ) -> Result<Self> {
        let mut writer = Self {
            target: target.into(),
            out: Some(BufWriter::new(inner)),
            columns: header.len(),
            flush_each,
        };
        writer.write_line(header)?;
        Ok(writer)
    }

    /// Appends one data row. The row must have exactly as many fields as the header.
    pub fn write_row(&mut self, row: &Row) -> Result<()> {
        if row.len() != self.columns {
            return Err(SamplerError::RowArity {
                target: self.target.clone(),
                expected: self.columns,
                got: row.len(),
            });
        }
        self.write_line(row.fields())
    }

    fn write_line(&mut self, fields: &[String]) -> Result<()> {
        let Some(out) = self.out.as_mut() else {
            return Err(SamplerError::Write {
                target: self.target.clone(),
                source: std::io::Error::new(std::io::ErrorKind::BrokenPipe, "output closed"),
            });
        };
        // Assemble the full line first so a row is handed to the buffer in one piece.
        let mut line = fields.join(FIELD_SEPARATOR);
        line.push('\n');
        let wrap = |source| SamplerError::Write {
            target: self.target.clone(),
            source,
        };
        out.write_all(line.as_bytes()).map_err(wrap)?;
        if self.flush_each {
            out.flush().map_err(wrap)?;
        }
        Ok(())
    }

    /// Flushes and releases the output. Further calls are no-ops.
    pub fn close(&mut self) -> Result<()> {
        if let Some(mut out) = self.out.take() {
            out.flush().map_err(|source| SamplerError::Write {
                target: self.target.clone(),
                source,
            })?;
        }
        Ok(())
    }
}

impl Drop for RowWriter {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!(error = %e, "output flush on drop failed");
        }
    }
}
