//! Command-line arguments.

use clap::Parser;
use std::path::PathBuf;

/// Build an LXD image from an lxfile.
#[derive(Debug, Parser)]
#[command(name = "lxb", version, about)]
pub struct Cli {
    /// Lxfile to build; `-` or a missing file reads standard input
    #[arg(short = 'f', long = "lxfile", default_value = "lxfile.yml")]
    pub lxfile: PathBuf,

    /// Directory that file and template sources are relative to
    #[arg(short = 'c', long = "context", default_value = "./")]
    pub context: PathBuf,

    /// Keep the build container after publishing
    #[arg(short = 'k', long)]
    pub keep: bool,

    /// Debug logging
    #[arg(long)]
    pub verbose: bool,

    /// Remote the base image is resolved against
    #[arg(long, env = "LXB_REMOTE")]
    pub remote: Option<String>,

    /// Appended to the generated container name
    #[arg(long)]
    pub suffix: Option<String>,
}

impl Cli {
    /// Whether the lxfile should come from standard input.
    pub fn reads_stdin(&self) -> bool {
        self.lxfile.as_os_str() == "-" || !self.lxfile.exists()
    }
}
