use clap::Parser;
use probtrader::cli::{load_config, run, Cli};
use probtrader::ports::config_port::ConfigPort;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::from(&err);
        }
    };
    let level = config
        .get_string("logging", "level")
        .unwrap_or_else(|| "info".to_string());
    init_tracing(&level);
    run(&cli, &config)
}
