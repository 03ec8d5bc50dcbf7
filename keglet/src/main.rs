// keglet/src/main.rs
use std::fs;
use std::process;

use clap::Parser;
use colored::Colorize;
use keglet_common::config::Config;
use keglet_common::error::{KegletError, Result as KegletResult};
use tracing::debug;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

mod cli;
mod ui;

use cli::CliArgs;

fn level_filter(verbose: u8) -> LevelFilter {
    match verbose {
        0 => LevelFilter::INFO,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

fn env_filter(verbose: u8) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(level_filter(verbose).into())
        .with_env_var("KEGLET_LOG")
        .from_env_lossy()
}

/// Loads the config under a stderr-only subscriber; the log directory is
/// not known until the config exists.
fn load_config(verbose: u8) -> KegletResult<Config> {
    load_config_logged_to(verbose, std::io::stderr)
}

fn load_config_logged_to<W>(verbose: u8, writer: W) -> KegletResult<Config>
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let bootstrap = tracing_subscriber::fmt()
        .with_env_filter(env_filter(verbose))
        .with_writer(writer)
        .with_ansi(true)
        .without_time()
        .finish();
    tracing::subscriber::with_default(bootstrap, Config::load)
        .map_err(|e| KegletError::Config(format!("Could not load config: {e}")))
}

fn init_logging(config: &Config, verbose: u8) {
    let max_log_level = level_filter(verbose)
        .into_level()
        .unwrap_or(tracing::Level::INFO);
    let env_filter = env_filter(verbose);

    let log_dir = config.logs_dir();
    if verbose > 0 && fs::create_dir_all(&log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::daily(&log_dir, "keglet.log");
        let (non_blocking_appender, guard) = tracing_appender::non_blocking(file_appender);

        let stderr_writer = std::io::stderr.with_max_level(max_log_level);
        let file_writer = non_blocking_appender.with_max_level(max_log_level);

        let _ = tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(stderr_writer.and(file_writer))
            .with_ansi(true)
            .without_time()
            .try_init();

        // The appender flushes on drop; keep it for the life of the process.
        Box::leak(Box::new(guard));

        debug!(
            "Verbose logging enabled. Writing logs to: {}/keglet.log",
            log_dir.display()
        );
    } else {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .with_ansi(true)
            .without_time()
            .try_init();
    }
}

#[tokio::main]
async fn main() -> KegletResult<()> {
    let cli_args = CliArgs::parse();

    let config = load_config(cli_args.verbose)?;
    init_logging(&config, cli_args.verbose);

    if let Err(e) = cli_args.command.run(&config).await {
        tracing::error!("Command failed: {:#}", e);
        eprintln!("{}: {:#}", "Error".red().bold(), e);
        process::exit(1);
    }

    debug!("Command completed successfully.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::{Arc, Mutex};

    use super::*;

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn config_loading_is_logged_when_verbose() {
        let captured = Captured::default();
        let writer = captured.clone();
        load_config_logged_to(1, move || writer.clone()).unwrap();

        let output = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("Loading keglet configuration"), "{output}");
    }

    #[test]
    fn quiet_config_loading_hides_debug_lines() {
        let captured = Captured::default();
        let writer = captured.clone();
        load_config_logged_to(0, move || writer.clone()).unwrap();

        let output = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert!(!output.contains("Loading keglet configuration"), "{output}");
    }
}
