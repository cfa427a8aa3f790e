//! Command-line interface definition.
//!
//! This module defines the CLI structure using `clap` derive macros,
//! providing a familiar interface similar to the standard `unzip` utility.

use clap::Parser;

/// Command-line arguments for the remotezip utility.
#[derive(Parser, Debug)]
#[command(name = "remotezip")]
#[command(version)]
#[command(about = "List and extract ZIP archives from files or HTTP URLs", long_about = None)]
#[command(after_help = "Examples:\n  \
  remotezip -l archive.zip                     list files from a local ZIP\n  \
  remotezip -l https://example.com/app.appx    list files from a remote archive\n  \
  remotezip app.appx AppxManifest.xml          extract one file\n  \
  remotezip -p foo.zip notes.txt | less        send an entry into a pipe")]
pub struct Cli {
    /// ZIP file path or HTTP(S) URL.
    ///
    /// When an HTTP URL is given, the archive is read with Range requests
    /// and extraction fetches all requested entries in a single request.
    #[arg(value_name = "FILE")]
    pub file: String,

    /// Entry names to extract (default: all files).
    #[arg(value_name = "ENTRIES")]
    pub entries: Vec<String>,

    /// List files (short format).
    #[arg(short = 'l')]
    pub list: bool,

    /// List files verbosely (sizes, timestamps, CRCs).
    #[arg(short = 'v')]
    pub verbose: bool,

    /// Extract entries to stdout, no messages.
    #[arg(short = 'p')]
    pub pipe: bool,

    /// Extract entries into this directory.
    #[arg(short = 'd', value_name = "DIR")]
    pub extract_dir: Option<String>,

    /// Overwrite existing files without prompting.
    #[arg(short = 'o')]
    pub overwrite: bool,

    /// Quiet mode.
    #[arg(short = 'q', action = clap::ArgAction::Count)]
    pub quiet: u8,
}

impl Cli {
    /// True if the input is an HTTP/HTTPS URL rather than a local path.
    pub fn is_http_url(&self) -> bool {
        self.file.starts_with("http://") || self.file.starts_with("https://")
    }

    /// True if informational messages should be suppressed.
    ///
    /// Quiet mode is enabled either by `-q` or by pipe mode (`-p`).
    pub fn is_quiet(&self) -> bool {
        self.quiet > 0 || self.pipe
    }
}
