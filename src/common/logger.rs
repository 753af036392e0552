use std::fs::File;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::Local;
use env_logger::{Builder, Target};
use log::LevelFilter;

/// Set up the process-wide logger: `--verbose` enables debug output,
/// `--silent` keeps errors only, and `--log-file` redirects everything from
/// stdout into the given file.
pub fn init(verbose: bool, silent: bool, log_file: Option<&Path>) -> Result<()> {
    let level = if verbose {
        LevelFilter::Debug
    } else if silent {
        LevelFilter::Error
    } else {
        LevelFilter::Info
    };

    let mut builder = Builder::new();
    builder.filter_level(level);
    builder.format(|buf, record| {
        writeln!(
            buf,
            "[{}] [{}] {}",
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            record.level(),
            record.args()
        )
    });

    match log_file {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("creating log file {}", path.display()))?;
            builder.target(Target::Pipe(Box::new(file)));
        }
        None => {
            builder.target(Target::Stdout);
        }
    }

    builder.init();
    Ok(())
}
