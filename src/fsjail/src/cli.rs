use clap::*;
use std::path::PathBuf;

#[derive(Debug, Parser, Clone)]
#[command(name = "fsjail")]
pub struct CliOptions {
    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Directory the guest sees as `/`. Nothing outside it can be reached.
    #[arg(long, value_name = "DIR")]
    pub root: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Print a file to stdout
    Cat { path: String },

    /// Write TEXT, or stdin if it's missing, to a file, creating it if needed
    Write {
        path: String,

        text: Option<String>,

        /// Append instead of truncating
        #[arg(long)]
        append: bool,
    },

    /// Show the status of a file
    Stat { path: String },

    /// List a directory
    Ls {
        #[arg(default_value = ".")]
        path: String,
    },

    /// Create a directory
    Mkdir {
        path: String,

        /// Create missing parents, and don't fail if the directory exists
        #[arg(short, long)]
        parents: bool,
    },

    /// Copy a file, or a directory and everything in it
    Cp { src: String, dst: String },

    /// Remove a file or directory
    Rm {
        path: String,

        /// Remove directories and their contents
        #[arg(short, long)]
        recursive: bool,

        /// Remove empty directories
        #[arg(short, long)]
        dir: bool,
    },
}

impl CliOptions {
    pub fn log_level(&self) -> log::LevelFilter {
        match self.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        }
    }
}
