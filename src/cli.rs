use clap::{Args, Parser, Subcommand};
use latexpad::classify::needs_advanced;
use latexpad::config::{AppConfig, FileConfig};
use latexpad::editor::collapse_double_backslashes;
use latexpad::logging::{LogConfig, LogFormat, init_logging};
use latexpad::raster::RasterRenderer;
use latexpad::typeset::MathmlTypesetter;
use std::net::SocketAddr;
use std::path::PathBuf;
use time::Duration;

pub(crate) struct Launch {
    pub(crate) addr: SocketAddr,
    pub(crate) config: AppConfig,
}

#[allow(clippy::large_enum_variant)]
pub(crate) enum RunOutcome {
    Serve(Launch),
    Exit(i32),
}

pub(crate) fn run() -> RunOutcome {
    let cli = Cli::parse();
    init_logging(&LogConfig::from_verbosity(cli.verbose).with_format(cli.log_format));

    let config = match resolve_config(&cli) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("error: {err}");
            return RunOutcome::Exit(2);
        }
    };

    if let Some(Command::Render(args)) = cli.command {
        let code = run_render(args, &config);
        return RunOutcome::Exit(code);
    }

    RunOutcome::Serve(Launch {
        addr: cli.bind,
        config,
    })
}

#[derive(Parser, Debug)]
#[command(name = "latexpad", version, about = "Interactive LaTeX formula editor")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
    #[arg(long, env = "LATEXPAD_BIND", default_value = "127.0.0.1:3000")]
    bind: SocketAddr,
    #[arg(long, default_value = "latexpad")]
    app_name: String,
    /// TOML file with style defaults and the initial formula.
    #[arg(long, env = "LATEXPAD_CONFIG")]
    config: Option<PathBuf>,
    /// Idle time before a session is dropped, as <number>[s|m|h|d].
    #[arg(long, env = "LATEXPAD_SESSION_TTL")]
    session_ttl: Option<String>,
    #[arg(long, value_enum, default_value = "pretty")]
    log_format: LogFormat,
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render one formula to a file with the configured style and exit.
    Render(RenderArgs),
}

#[derive(Args, Debug)]
struct RenderArgs {
    tex: String,
    #[arg(long, default_value = "png")]
    format: String,
    /// Defaults to latex.png or latex.svg in the current directory.
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn run_render(args: RenderArgs, config: &AppConfig) -> i32 {
    if needs_advanced(&args.tex) {
        eprintln!("error: this formula needs the browser renderer; open it in the editor instead");
        return 1;
    }

    let renderer = RasterRenderer::new(MathmlTypesetter);
    let tex = collapse_double_backslashes(&args.tex);
    let image = match renderer.render(&tex, &args.format, &config.style) {
        Ok(image) => image,
        Err(err) => {
            eprintln!("error: {err}");
            return 1;
        }
    };

    let output = args
        .output
        .unwrap_or_else(|| PathBuf::from(image.filename()));
    if let Err(err) = std::fs::write(&output, &image.bytes) {
        eprintln!("failed to write {}: {err}", output.display());
        return 1;
    }
    tracing::info!(path = %output.display(), bytes = image.bytes.len(), "wrote image");
    0
}

fn resolve_config(cli: &Cli) -> Result<AppConfig, String> {
    let app_name = cli.app_name.trim();
    if app_name.is_empty() {
        return Err("app name cannot be empty".to_string());
    }

    let mut config = AppConfig {
        app_name: app_name.to_string(),
        ..AppConfig::default()
    };

    if let Some(raw) = cli.session_ttl.as_deref() {
        config.session_ttl = parse_session_ttl(raw)?;
    }

    if let Some(path) = cli.config.as_ref() {
        FileConfig::load(path)
            .and_then(|file| file.apply_to(&mut config))
            .map_err(|err| format!("{}: {err}", path.display()))?;
        tracing::debug!(path = %path.display(), "loaded config file");
    }

    Ok(config)
}

fn parse_session_ttl(raw: &str) -> Result<Duration, String> {
    let value = raw.trim();
    if value.is_empty() {
        return Err("session ttl cannot be empty".to_string());
    }

    let (amount, unit) = match value.chars().last() {
        Some(ch) if ch.is_ascii_alphabetic() => {
            (&value[..value.len() - 1], ch.to_ascii_lowercase())
        }
        _ => (value, 's'),
    };

    let amount: i64 = amount
        .parse()
        .map_err(|_| format!("invalid session ttl '{value}'; expected <number>[s|m|h|d]"))?;

    if amount <= 0 {
        return Err("session ttl must be greater than 0".to_string());
    }

    match unit {
        's' => Ok(Duration::seconds(amount)),
        'm' => Ok(Duration::minutes(amount)),
        'h' => Ok(Duration::hours(amount)),
        'd' => Ok(Duration::days(amount)),
        _ => Err(format!(
            "invalid session ttl '{value}'; expected <number>[s|m|h|d]"
        )),
    }
}
