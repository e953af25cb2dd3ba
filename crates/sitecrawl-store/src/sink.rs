use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::Path;

use anyhow::{bail, Context};
use async_trait::async_trait;
use parking_lot::Mutex;
use sitecrawl_crawler::{CrawlContent, DocumentSink};

use crate::config::CsvSinkConfig;

/// Connection string that sends rows to the standard output.
pub const STDOUT: &str = "-";

enum CsvWriter {
    File(csv::Writer<fs::File>),
    Stdout(csv::Writer<io::Stdout>),
}

impl CsvWriter {
    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::File(wtr) => wtr.flush(),
            Self::Stdout(wtr) => wtr.flush(),
        }
    }

    fn write(&mut self, content: &CrawlContent) -> csv::Result<()> {
        match self {
            Self::File(wtr) => wtr.serialize(content),
            Self::Stdout(wtr) => wtr.serialize(content),
        }
    }
}

/// Document sink writing one CSV row per page: `title,body,path,added_at`.
///
/// The connection string is the output file path, or [`STDOUT`]. A header row is written
/// whenever the output starts empty. Paths are unique: a page whose path is already stored,
/// including in the rows of a file opened in [`FileMode::Append`](crate::FileMode::Append),
/// is refused.
pub struct CsvSink {
    config: CsvSinkConfig,
    output: Mutex<Option<Output>>,
}

struct Output {
    writer: CsvWriter,
    paths: HashSet<String>,
}

impl CsvSink {
    pub fn new(config: CsvSinkConfig) -> Self {
        Self {
            config,
            output: Mutex::new(None),
        }
    }

    fn open(&self, credential: &str) -> anyhow::Result<Output> {
        if credential == STDOUT {
            let wtr = self.config.writer_builder(true).from_writer(io::stdout());
            return Ok(Output {
                writer: CsvWriter::Stdout(wtr),
                paths: HashSet::new(),
            });
        }

        let path = Path::new(credential);
        let opts: fs::OpenOptions = self.config.file_mode.into();
        let file = opts
            .open(path)
            .with_context(|| format!("Couldn't open {}", path.display()))?;
        let empty = file.metadata()?.len() == 0;
        let paths = if empty {
            HashSet::new()
        } else {
            self.stored_paths(path)?
        };
        let wtr = self.config.writer_builder(empty).from_writer(file);
        Ok(Output {
            writer: CsvWriter::File(wtr),
            paths,
        })
    }

    fn stored_paths(&self, path: &Path) -> anyhow::Result<HashSet<String>> {
        let mut rdr = self
            .config
            .reader_builder()
            .from_path(path)
            .with_context(|| format!("Couldn't read {}", path.display()))?;
        let column = rdr
            .headers()?
            .iter()
            .position(|h| h == "path")
            .with_context(|| format!("No `path` column in {}", path.display()))?;
        let paths = rdr
            .records()
            .map(|rec| rec.map(|rec| rec.get(column).unwrap_or_default().to_string()))
            .collect::<Result<_, _>>()?;
        Ok(paths)
    }
}

impl Default for CsvSink {
    fn default() -> Self {
        Self::new(CsvSinkConfig::default())
    }
}

#[async_trait]
impl DocumentSink for CsvSink {
    async fn connect(&mut self, credential: &str) -> anyhow::Result<()> {
        if credential.trim().is_empty() {
            bail!("Missing CSV output location");
        }
        let output = self.open(credential)?;
        log::info!(
            "Writing crawled content to {credential} ({} pages already stored)",
            output.paths.len()
        );
        *self.output.get_mut() = Some(output);
        Ok(())
    }

    async fn add_content(&self, content: CrawlContent) -> anyhow::Result<()> {
        let mut output = self.output.lock();
        let Some(out) = output.as_mut() else {
            bail!("CSV sink is not connected");
        };
        if out.paths.contains(&content.path) {
            bail!("Duplicate path {}", content.path);
        }
        out.writer
            .write(&content)
            .with_context(|| format!("Couldn't write {}", content.path))?;
        out.writer.flush()?;
        log::debug!("Saved {} ({})", content.path, content.title);
        out.paths.insert(content.path);
        Ok(())
    }

    async fn close(&self) -> anyhow::Result<()> {
        if let Some(mut out) = self.output.lock().take() {
            out.writer.flush()?;
        }
        Ok(())
    }
}
