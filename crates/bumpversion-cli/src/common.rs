//! Wires parsed CLI [`options::Options`] into [`bumpversion::BumpVersion`] and runs one bump.
use crate::options;
use bumpversion::{config, logging::Verbosity};
use color_eyre::eyre::{self, WrapErr};

pub async fn bumpversion(mut options: options::Options) -> eyre::Result<()> {
    let start = std::time::Instant::now();

    let color_choice = options.color_choice.unwrap_or(termcolor::ColorChoice::Auto);
    let log_format = options.log_format.unwrap_or(crate::logging::LogFormat::PrettyCompact);
    let use_color = crate::logging::setup(options.log_level, log_format, color_choice)?;
    colored::control::set_override(use_color && options.list != Some(true));

    let cwd = std::env::current_dir().wrap_err("could not determine current working directory")?;
    let dir = options.dir.as_deref().unwrap_or(&cwd).canonicalize().wrap_err("invalid --dir")?;

    let cli_overrides = options::global_cli_config(&options)?;

    // Discover the configured version components before touching positional arguments, so
    // `parse_positional_arguments` can validate the bump target against the real schema.
    let (_, _, probe_config) = bumpversion::find_config(&dir, options.config_file.as_deref())?.ok_or_else(|| eyre::eyre!("missing config file"))?;
    let components = probe_config.finalize().components;
    let (bump, cli_files) = options::parse_positional_arguments(&mut options, &components)?;

    let verbosity = if options.verbosity.quiet > 0 {
        Verbosity::Off
    } else {
        Verbosity::from(options.verbosity.verbose)
    };

    if options.list == Some(true) {
        let logger = crate::verbose::ListLogger;
        run(&dir, &options, cli_overrides, cli_files, bump, logger).await?;
    } else {
        let logger = crate::verbose::Logger::new(verbosity);
        run(&dir, &options, cli_overrides, cli_files, bump, logger).await?;
    }

    tracing::info!(elapsed = ?start.elapsed(), "done");
    Ok(())
}

async fn run<L>(
    dir: &std::path::Path,
    options: &options::Options,
    cli_overrides: config::GlobalConfig,
    cli_files: Vec<std::path::PathBuf>,
    bump: Option<String>,
    logger: L,
) -> eyre::Result<()>
where
    L: bumpversion::logging::Log,
{
    let mut cli_overrides = cli_overrides;
    if !cli_files.is_empty() {
        cli_overrides.included_paths = Some(cli_files);
    }
    let dry_run = options.dry_run.unwrap_or(false);

    let manager = bumpversion::BumpVersion::<bumpversion::vcs::git::GitRepository, L>::new(
        dir,
        options.config_file.as_deref(),
        cli_overrides,
        logger,
    )
    .await
    .map_err(|err| eyre::eyre!("{err}"))?
    .with_dry_run(dry_run);

    let bump = if let Some(new_version) = options.new_version.as_deref() {
        bumpversion::Bump::NewVersion(new_version)
    } else {
        let bump = bump.as_deref().ok_or_else(|| eyre::eyre!("missing version component to bump"))?;
        bumpversion::Bump::Component(bump)
    };

    manager.bump(bump).await.map_err(|err| eyre::eyre!("{err}"))
}
