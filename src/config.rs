//! Command-line arguments and the validated configuration built from them.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use thiserror::Error;

use crate::builder::{ScanBuilder, DEFAULT_PATTERN};
use crate::dicom::{Tag, DEFAULT_TAGS};

/// Upper bound on scan threads.
const MAX_THREADS: usize = 256;

/// Find DICOM files and print their identifying tags
#[derive(Parser, Debug, Clone)]
#[command(
    name = "dcmscan",
    version,
    about = "Find DICOM files and print their identifying tags",
    long_about = "Walks a directory tree looking for files whose names match a glob, then \
                  reads patient and series tags from each match.\n\n\
                  Unreadable directories are skipped and reported on stderr; the scan \
                  carries on with the rest of the tree.",
    after_help = "EXAMPLES:\n    \
        dcmscan scan /data/incoming\n    \
        dcmscan scan /archive --pattern 'IM_*' --chunk-size 1000\n    \
        dcmscan scan /data --tag PatientID --tag 0008,0060 --store records.jsonl\n    \
        dcmscan put-sample --store records.jsonl"
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Command,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Scan a directory tree and report tags for every matching file
    Scan(ScanArgs),

    /// Write one sample document to a record store
    PutSample(PutSampleArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ScanArgs {
    /// Directory to scan
    #[arg(value_name = "ROOT")]
    pub root: PathBuf,

    /// File name glob
    #[arg(short, long, default_value = DEFAULT_PATTERN, value_name = "GLOB")]
    pub pattern: String,

    /// Report results in chunks of at most N files
    #[arg(long, value_name = "N")]
    pub chunk_size: Option<usize>,

    /// Threads listing directories (0 = one per CPU)
    #[arg(short = 'j', long, default_value_t = 1, value_name = "NUM")]
    pub threads: usize,

    /// Descend into symlinked directories
    #[arg(long)]
    pub follow_links: bool,

    /// Tag to report, as a keyword or GGGG,EEEE (repeatable)
    #[arg(long = "tag", value_name = "TAG")]
    pub tags: Vec<Tag>,

    /// List matching files without reading them
    #[arg(long, conflicts_with = "tags")]
    pub no_tags: bool,

    /// Also append one JSON document per file to FILE
    #[arg(long, value_name = "FILE")]
    pub store: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct PutSampleArgs {
    /// JSON lines file to append to
    #[arg(long, value_name = "FILE")]
    pub store: PathBuf,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid chunk size {0}: must be at least 1")]
    InvalidChunkSize(usize),

    #[error("Invalid thread count {count}: must be at most {max}")]
    InvalidThreadCount { count: usize, max: usize },

    #[error("Chunked scans run on a single thread; drop --threads or --chunk-size")]
    ChunkedParallel,
}

/// A validated scan configuration.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub root:         PathBuf,
    pub pattern:      String,
    pub chunk_size:   Option<usize>,
    pub threads:      usize,
    pub follow_links: bool,
    /// Empty when tags should not be read.
    pub tags:         Vec<Tag>,
    pub store:        Option<PathBuf>,
}

impl ScanConfig {
    pub fn from_args(args: ScanArgs) -> Result<Self, ConfigError> {
        if let Some(0) = args.chunk_size {
            return Err(ConfigError::InvalidChunkSize(0));
        }
        if args.threads > MAX_THREADS {
            return Err(ConfigError::InvalidThreadCount {
                count: args.threads,
                max: MAX_THREADS,
            });
        }
        if args.chunk_size.is_some() && args.threads != 1 {
            return Err(ConfigError::ChunkedParallel);
        }

        let tags = if args.no_tags {
            Vec::new()
        } else if args.tags.is_empty() {
            DEFAULT_TAGS.to_vec()
        } else {
            let mut tags = Vec::with_capacity(args.tags.len());
            for tag in args.tags {
                if !tags.contains(&tag) {
                    tags.push(tag);
                }
            }
            tags
        };

        Ok(Self {
            root: args.root,
            pattern: args.pattern,
            chunk_size: args.chunk_size,
            threads: args.threads,
            follow_links: args.follow_links,
            tags,
            store: args.store,
        })
    }

    /// A builder carrying everything but the cancel token.
    pub fn builder(&self) -> ScanBuilder {
        let builder = crate::scan(&self.root)
            .pattern(self.pattern.clone())
            .threads(self.threads)
            .follow_links(self.follow_links);
        match self.chunk_size {
            Some(n) => builder.chunk_size(n),
            None    => builder,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> ScanArgs {
        let mut full = vec!["dcmscan", "scan"];
        full.extend_from_slice(argv);
        match CliArgs::parse_from(full).command {
            Command::Scan(args) => args,
            other => panic!("expected scan, got {other:?}"),
        }
    }

    #[test]
    fn defaults() {
        let config = ScanConfig::from_args(parse(&["/data"])).unwrap();
        assert_eq!(config.root, PathBuf::from("/data"));
        assert_eq!(config.pattern, "*.dcm");
        assert_eq!(config.threads, 1);
        assert_eq!(config.tags, DEFAULT_TAGS);
        assert!(config.chunk_size.is_none());
    }

    #[test]
    fn explicit_tags_replace_defaults_without_duplicates() {
        let config = ScanConfig::from_args(parse(&[
            "/data", "--tag", "PatientID", "--tag", "0008,0060", "--tag", "0010,0020",
        ]))
        .unwrap();
        assert_eq!(config.tags, vec![Tag::PATIENT_ID, Tag::new(0x0008, 0x0060)]);
    }

    #[test]
    fn no_tags_empties_the_list() {
        let config = ScanConfig::from_args(parse(&["/data", "--no-tags"])).unwrap();
        assert!(config.tags.is_empty());
    }

    #[test]
    fn rejects_zero_chunk_size() {
        let err = ScanConfig::from_args(parse(&["/data", "--chunk-size", "0"])).unwrap_err();
        assert_eq!(err, ConfigError::InvalidChunkSize(0));
    }

    #[test]
    fn rejects_chunked_parallel() {
        let err = ScanConfig::from_args(parse(&["/data", "--chunk-size", "5", "-j", "4"])).unwrap_err();
        assert_eq!(err, ConfigError::ChunkedParallel);
    }

    #[test]
    fn bad_tag_is_a_parse_error() {
        let res = CliArgs::try_parse_from(["dcmscan", "scan", "/data", "--tag", "nonsense"]);
        assert!(res.is_err());
    }
}
