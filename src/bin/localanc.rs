use std::env;

use localanc::cli::{build_cli, parse_key_value_args};
use localanc::config::RunConfig;
use localanc::engine::pipeline;
use localanc::logging::{set_log_level, RunLog};

fn main() {
    let app = build_cli();
    let matches = app.get_matches();
    let raw_args: Vec<String> = matches
        .get_many::<String>("args")
        .map(|vals| vals.cloned().collect())
        .unwrap_or_default();

    if let Err(e) = run(&raw_args) {
        eprintln!("localanc: {}", e);
        std::process::exit(1);
    }
}

fn run(raw_args: &[String]) -> anyhow::Result<()> {
    let args = parse_key_value_args(raw_args)?;

    if let Some(shell) = args.get("shell-completion") {
        let stdout = std::io::stdout();
        localanc::cli::write_shell_completion(shell, stdout.lock())?;
        return Ok(());
    }

    let verbose = args.get("verbose").map(|v| v == "true").unwrap_or(false);
    let quiet = args.get("quiet").map(|v| v == "true").unwrap_or(false);
    set_log_level(verbose, quiet);

    let mut run_log = RunLog::new();
    run_log.record(format!("command line: {}", env::args().collect::<Vec<_>>().join(" ")));

    let config = RunConfig::from_args(&args)?;
    pipeline::run(&config, &mut run_log)?;
    log::info!("run complete, output written to {}.*", config.out_prefix);
    Ok(())
}
