//! Installs the `tracing-subscriber` global subscriber used for human-readable CLI output.
use color_eyre::eyre;
use termcolor::ColorChoice;
use tracing_subscriber::layer::SubscriberExt;

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord, clap::ValueEnum)]
pub enum LogFormat {
    Json,
    PrettyCompact,
    Pretty,
}

impl std::str::FromStr for LogFormat {
    type Err = eyre::Report;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            s if s.eq_ignore_ascii_case("json") => Ok(LogFormat::Json),
            s if s.eq_ignore_ascii_case("pretty") => Ok(LogFormat::Pretty),
            s if s.eq_ignore_ascii_case("pretty-compact") => Ok(LogFormat::PrettyCompact),
            other => Err(eyre::eyre!("unknown log format: {other:?}")),
        }
    }
}

/// Install the global tracing subscriber, returning whether color output was enabled.
///
/// # Errors
/// Returns an error if the log-level directive fails to parse or a subscriber is already
/// installed.
pub fn setup(log_level: Option<tracing::metadata::Level>, log_format: LogFormat, color_choice: ColorChoice) -> eyre::Result<bool> {
    let default_log_level = log_level.unwrap_or(tracing::metadata::Level::INFO);
    let default_log_directive = format!("none,bumpversion={}", default_log_level.to_string().to_ascii_lowercase());
    let default_env_filter = tracing_subscriber::filter::EnvFilter::builder()
        .with_regex(true)
        .with_default_directive(default_log_level.into())
        .parse(default_log_directive)?;

    let env_filter = match std::env::var("RUST_LOG") {
        Ok(directive) => tracing_subscriber::filter::EnvFilter::builder()
            .parse(directive)
            .unwrap_or(default_env_filter),
        Err(_) => default_env_filter,
    };

    let use_color = match color_choice {
        ColorChoice::Always | ColorChoice::AlwaysAnsi => true,
        ColorChoice::Never => false,
        ColorChoice::Auto => {
            use std::io::IsTerminal;
            std::io::stdout().is_terminal()
        }
    };

    let fmt_layer_pretty = tracing_subscriber::fmt::Layer::new()
        .pretty()
        .without_time()
        .with_ansi(use_color)
        .fmt_fields(tracing_subscriber::fmt::format::PrettyFields::new())
        .with_writer(std::io::stderr);
    let fmt_layer_pretty_compact = tracing_subscriber::fmt::Layer::new()
        .compact()
        .without_time()
        .with_ansi(use_color)
        .with_writer(std::io::stderr);
    let fmt_layer_json = tracing_subscriber::fmt::Layer::new()
        .json()
        .compact()
        .without_time()
        .with_ansi(use_color)
        .with_writer(std::io::stderr);

    let subscriber = tracing_subscriber::registry()
        .with((log_format == LogFormat::Json).then_some(fmt_layer_json))
        .with((log_format == LogFormat::PrettyCompact).then_some(fmt_layer_pretty_compact))
        .with((log_format == LogFormat::Pretty).then_some(fmt_layer_pretty))
        .with(env_filter);
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(use_color)
}
