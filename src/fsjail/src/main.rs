mod cli;
mod execute;

use crate::{cli::CliOptions, execute::execute};
use clap::Parser;
use env_logger::Env;
use rawposix::init::rawposix_shutdown;

/// Entry point of the fsjail executable.
///
/// Sets up a single cage rooted at `--root` and runs one subcommand through the guest bridge,
/// exactly as a sandboxed program would:
///
///     fsjail --root DIR [-v...] <cat|write|stat|ls|mkdir|cp|rm> PATH...
///
/// Paths are guest paths: `/` is `DIR`, and `..`, absolute symlinks, or symlinks that climb out
/// of `DIR` are refused.
fn main() -> anyhow::Result<()> {
    let fsjail_cli = CliOptions::parse();

    let default_level = fsjail_cli.log_level();
    let mut builder =
        env_logger::Builder::from_env(Env::default().default_filter_or(default_level.as_str()));
    builder.format_timestamp_millis();
    let _ = builder.try_init();

    let res = execute(&fsjail_cli);

    // every cage is gone before the process exits, so all guest descriptors get closed
    rawposix_shutdown();

    res
}
