use std::env;
use std::io::Write as _;

use env_logger::Builder;
use log::LevelFilter;

/// Sets the global log level from `verbose`/`quiet` flags, the same way
/// as the rest of the toolchain: `verbose` wins ties with `quiet`, and
/// `RUST_LOG` overrides both when present.
pub fn set_log_level(verbose: bool, quiet: bool) {
    let mut log_level = LevelFilter::Info;
    if quiet {
        log_level = LevelFilter::Error;
    }
    if verbose {
        log_level = LevelFilter::Debug;
    }
    let mut builder = Builder::new();
    builder.filter_level(log_level);
    if let Ok(filters) = env::var("RUST_LOG") {
        builder.parse_filters(&filters);
    }
    if builder.try_init().is_err() {
        panic!("failed to set log level - has it been initialized twice?");
    }
    log::info!("localanc version {}", env!("CARGO_PKG_VERSION"));
}

/// Accumulates the run summary lines written to `<out>.log`: one run, start
/// to finish, independent of the `log` crate's line-by-line stderr stream.
#[derive(Debug, Default)]
pub struct RunLog {
    lines: Vec<String>,
}

impl RunLog {
    pub fn new() -> RunLog {
        RunLog::default()
    }

    pub fn record(&mut self, line: impl Into<String>) {
        let line = line.into();
        log::info!("{}", line);
        self.lines.push(line);
    }

    pub fn write_to(&self, path: &str) -> std::io::Result<()> {
        let mut file = std::fs::File::create(path)?;
        for line in &self.lines {
            writeln!(file, "{}", line)?;
        }
        Ok(())
    }
}
