//! cmdgen CLI - Main entry point
//!
//! 자연어 요청 → 검증된 한 줄 셸 명령어. 명령어는 stdout/클립보드/프롬프트로
//! 전달만 하고 절대 실행하지 않는다.

mod cli;
mod clipboard;
mod delivery;
mod display;

use clap::Parser;
use cmdgen_foundation::{exit_code, Error, StatePaths};
use display::Display;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// 로그 필터 환경 변수 (RUST_LOG 문법)
const ENV_LOG: &str = "CMDGEN_LOG";

/// cmdgen - turn a natural-language request into a vetted shell command
#[derive(Parser, Debug)]
#[command(name = "cmdgen")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// What you want to do, in plain words (read from stdin when omitted)
    pub request: Vec<String>,

    /// Only accept read-only commands
    #[arg(short, long)]
    pub safe: bool,

    /// Print the command to stdout without prefill or clipboard delivery
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Delivery mode: auto, prefill, clipboard, stdout
    #[arg(short, long, value_name = "MODE")]
    pub output: Option<String>,

    /// Skip the cache for this request
    #[arg(long)]
    pub no_cache: bool,

    /// Remove every cached command and exit
    #[arg(long, conflicts_with_all = ["stats", "request"])]
    pub clear_cache: bool,

    /// Summarise the audit log and exit
    #[arg(long, conflicts_with = "request")]
    pub stats: bool,

    /// Backend timeout in seconds (1-600)
    #[arg(short, long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Config file (default: <config_dir>/cmdgen/config.json)
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Disable colored stderr output
    #[arg(long)]
    pub no_color: bool,

    /// Enable debug logging
    #[arg(short, long)]
    pub debug: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let code = match run(args).await {
        Ok(()) => exit_code::SUCCESS,
        Err(e) => e.exit_code(),
    };
    std::process::exit(code);
}

async fn run(args: Args) -> Result<(), Error> {
    let paths = match StatePaths::from_env() {
        Ok(paths) => paths,
        Err(e) => {
            Display::new(true).error(&e);
            return Err(e);
        }
    };

    let config = match cli::load_config(&args, &paths) {
        Ok(config) => config,
        Err(e) => {
            Display::new(!args.no_color).error(&e);
            return Err(e);
        }
    };

    let display = Display::new(config.color_output);
    if let Err(e) = init_logging(config.debug) {
        display.notice(&format!("logging disabled: {:#}", e));
    }
    tracing::debug!(?paths, safe_mode = config.safe_mode, "Starting cmdgen");

    cli::sweep_locks(&paths);

    let result = if args.clear_cache {
        cli::clear_cache(&config, &paths.cache_dir, &display)
    } else if args.stats {
        cli::show_stats(&paths.audit_log, &display)
    } else {
        cli::generate(&args, config, &paths, &display).await
    };

    if let Err(e) = &result {
        display.error(e);
        if let Some(secs) = e.retry_after_secs() {
            display.notice(&format!("retry in {}s", secs));
        }
    }
    result
}

/// stderr 로깅 (stdout은 명령어 전용)
fn init_logging(debug: bool) -> anyhow::Result<()> {
    let default_level = if debug { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env(ENV_LOG).unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .try_init()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cmdgen_foundation::{CmdgenConfig, OutputMode};
    use tempfile::TempDir;

    fn parse(argv: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("cmdgen").chain(argv.iter().copied())).unwrap()
    }

    #[test]
    fn test_request_words_and_flags() {
        let args = parse(&["--safe", "-n", "list", "all", "python", "files"]);
        assert!(args.safe);
        assert!(args.dry_run);
        assert_eq!(args.request.join(" "), "list all python files");
    }

    #[test]
    fn test_clear_cache_conflicts_with_request() {
        let result = Args::try_parse_from(["cmdgen", "--clear-cache", "list", "files"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_flags_override_config_file() {
        let temp = TempDir::new().unwrap();
        let paths = StatePaths::under(temp.path());
        std::fs::write(
            &paths.config_file,
            r#"{"timeout": 10, "outputMode": "clipboard"}"#,
        )
        .unwrap();

        let args = parse(&[
            "--config",
            paths.config_file.to_str().unwrap(),
            "--timeout",
            "45",
            "--output",
            "stdout",
            "--safe",
        ]);
        let config = cli::load_config(&args, &paths).unwrap();

        assert_eq!(config.timeout, 45);
        assert_eq!(config.output_mode, OutputMode::Stdout);
        assert!(config.safe_mode);
    }

    #[test]
    fn test_invalid_settings_are_config_errors() {
        let temp = TempDir::new().unwrap();
        let paths = StatePaths::under(temp.path());
        let config_file = paths.config_file.to_str().unwrap().to_string();

        let args = parse(&["--config", &config_file, "--timeout", "0"]);
        let err = cli::load_config(&args, &paths).unwrap_err();
        assert_eq!(err.exit_code(), exit_code::CONFIG_ERROR);

        let args = parse(&["--config", &config_file, "--output", "fax"]);
        let err = cli::load_config(&args, &paths).unwrap_err();
        assert_eq!(err.exit_code(), exit_code::CONFIG_ERROR);

        std::fs::write(&paths.config_file, r#"{"unknownKey": true}"#).unwrap();
        let args = parse(&["--config", &config_file]);
        let err = cli::load_config(&args, &paths).unwrap_err();
        assert_eq!(err.exit_code(), exit_code::CONFIG_ERROR);
    }

    #[test]
    fn test_default_config_when_file_missing() {
        let temp = TempDir::new().unwrap();
        let paths = StatePaths::under(temp.path());
        let config_file = paths.config_file.to_str().unwrap().to_string();

        let config = cli::load_config(&parse(&["--config", &config_file]), &paths).unwrap();
        assert_eq!(config.timeout, CmdgenConfig::default().timeout);
    }
}
