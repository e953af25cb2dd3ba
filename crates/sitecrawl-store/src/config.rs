use std::fs;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CsvSinkConfig {
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
    #[serde(default = "default_terminator")]
    pub terminator: CsvTerminator,
    #[serde(default)]
    pub file_mode: FileMode,
}

impl Default for CsvSinkConfig {
    fn default() -> Self {
        Self {
            delimiter: default_delimiter(),
            terminator: default_terminator(),
            file_mode: FileMode::default(),
        }
    }
}

fn default_delimiter() -> char {
    ','
}

fn default_terminator() -> CsvTerminator {
    CsvTerminator::Any('\n')
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum CsvTerminator {
    CRLF,
    Any(char),
}

impl From<CsvTerminator> for csv::Terminator {
    fn from(source: CsvTerminator) -> Self {
        match source {
            CsvTerminator::CRLF => Self::CRLF,
            CsvTerminator::Any(c) => Self::Any(c as u8),
        }
    }
}

/// How an existing output file is treated on connect.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileMode {
    #[default]
    Truncate,
    Append,
}

impl From<FileMode> for fs::OpenOptions {
    fn from(mode: FileMode) -> Self {
        let mut opts = fs::OpenOptions::new();
        opts.create(true);
        match mode {
            FileMode::Truncate => opts.write(true).truncate(true),
            FileMode::Append => opts.append(true),
        };
        opts
    }
}

impl CsvSinkConfig {
    /// Builder for a writer that emits the header row only when `header` is set.
    pub(crate) fn writer_builder(&self, header: bool) -> csv::WriterBuilder {
        let mut builder = csv::WriterBuilder::new();
        builder
            .delimiter(self.delimiter as u8)
            .terminator(self.terminator.into())
            .has_headers(header);
        builder
    }

    pub(crate) fn reader_builder(&self) -> csv::ReaderBuilder {
        let mut builder = csv::ReaderBuilder::new();
        builder
            .delimiter(self.delimiter as u8)
            .terminator(self.terminator.into())
            .has_headers(true);
        builder
    }
}
