//! dcmscan - find DICOM files and print their identifying tags
//!
//! Entry point for the CLI application.

use std::io::{self, Write};
use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use dcmscan::config::{CliArgs, Command, PutSampleArgs, ScanConfig};
use dcmscan::dicom::{Part10Reader, Tag, TagReader};
use dcmscan::report::{write_diagnostics, Reporter};
use dcmscan::store::{file_document, sample_document, JsonLinesStore, RecordStore};
use dcmscan::{CancelToken, Diagnostic, EntryKind};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Exit code when the scan root could not be classified at all.
const EXIT_ROOT_UNUSABLE: u8 = 2;

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<ExitCode> {
    let args = CliArgs::parse();

    setup_logging(args.verbose);

    match args.command {
        Command::Scan(scan) => {
            let config = ScanConfig::from_args(scan).context("Invalid configuration")?;
            run_scan(config)
        }
        Command::PutSample(put) => put_sample(put),
    }
}

/// Scan, then read and report each file as it is handed out.
fn run_scan(config: ScanConfig) -> Result<ExitCode> {
    let token = CancelToken::new();
    let handler_token = token.clone();
    ctrlc::set_handler(move || {
        eprintln!("\nInterrupt received, stopping scan...");
        handler_token.cancel();
    })
    .context("Failed to set signal handler")?;

    let mut sink = FileSink {
        reader:   Part10Reader,
        tags:     &config.tags,
        store:    config.store.as_ref().map(JsonLinesStore::new),
        reporter: Reporter::new(io::stdout().lock()),
        skipped:  0,
    };

    let builder = config.builder().cancel_token(token);
    let root_kind = match config.chunk_size {
        Some(_) => {
            let mut chunks = builder.chunks().context("Scan failed")?;
            for chunk in chunks.by_ref() {
                sink.reporter.chunk_header(chunk.index, chunk.files.len())?;
                for file in &chunk.files {
                    sink.file(file.path())?;
                }
                sink.diagnostics(&chunk.diagnostics)?;
            }
            chunks.cursor().root_kind()
        }
        None => {
            let results = builder.run().context("Scan failed")?;
            for file in &results.files {
                sink.file(file.path())?;
            }
            sink.diagnostics(&results.diagnostics)?;
            if !results.completed {
                info!("Scan was interrupted before completion");
            }
            results.root_kind
        }
    };

    let skipped = sink.skipped;
    sink.reporter.summary(skipped)?;

    if root_kind == EntryKind::Missing {
        return Ok(ExitCode::from(EXIT_ROOT_UNUSABLE));
    }
    Ok(ExitCode::SUCCESS)
}

/// Where discovered files go: tag reader, console, optional store.
struct FileSink<'a, W: Write> {
    reader:   Part10Reader,
    tags:     &'a [Tag],
    store:    Option<JsonLinesStore>,
    reporter: Reporter<W>,
    skipped:  usize,
}

impl<W: Write> FileSink<'_, W> {
    fn file(&mut self, path: &Path) -> Result<()> {
        if self.tags.is_empty() {
            self.reporter.path_only(path)?;
            return Ok(());
        }

        let result = self.reader.read_tags(path, self.tags);
        if let Err(e) = &result {
            warn!(path = %path.display(), error = %e, "cannot read tags");
        }
        self.reporter.file(path, result.as_ref())?;

        let failed = match (&self.store, &result) {
            (Some(store), Ok(values)) => store.put(&file_document(path, values)).err(),
            _ => None,
        };
        if let Some(e) = failed {
            // Reported once; the rest of the scan runs without the store.
            error!(error = %e, "record store failed");
            self.store = None;
        }
        Ok(())
    }

    fn diagnostics(&mut self, diagnostics: &[Diagnostic]) -> Result<()> {
        self.skipped += diagnostics.len();
        write_diagnostics(io::stderr().lock(), diagnostics)?;
        Ok(())
    }
}

fn put_sample(args: PutSampleArgs) -> Result<ExitCode> {
    let store = JsonLinesStore::new(&args.store);
    info!(path = %args.store.display(), "writing sample document");
    store
        .put(&sample_document())
        .context("Failed to write sample document")?;
    println!("Written document to {}", args.store.display());
    Ok(ExitCode::SUCCESS)
}

fn setup_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("dcmscan=debug,warn")
        } else {
            EnvFilter::new("dcmscan=info,warn")
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}
