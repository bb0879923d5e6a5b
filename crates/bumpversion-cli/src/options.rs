//! Command-line argument definitions and translation into [`bumpversion::config::GlobalConfig`].
use bumpversion::config;
use clap::Parser;
use color_eyre::eyre;
use std::path::PathBuf;

/// Turns `Option<bool>` into its logical inverse, preserving `None` (flag not passed).
pub trait Invert {
    fn invert(self) -> Self;
}

impl Invert for Option<bool> {
    fn invert(self) -> Self {
        self.map(|value| !value)
    }
}

#[derive(Parser, Debug, Clone)]
pub enum BumpCommand {
    #[clap(name = "major")]
    Major,
    #[clap(name = "minor")]
    Minor,
    #[clap(name = "patch")]
    Patch,
}

impl AsRef<str> for BumpCommand {
    fn as_ref(&self) -> &str {
        match self {
            BumpCommand::Major => "major",
            BumpCommand::Minor => "minor",
            BumpCommand::Patch => "patch",
        }
    }
}

/// Logging verbosity flags, `#[command(flatten)]`-ed into [`Options`].
#[derive(clap::Args, Debug, Clone, Copy, Default)]
pub struct Verbosity {
    #[arg(
        long,
        short = 'v',
        action = clap::ArgAction::Count,
        global = true,
        help = "Increase logging verbosity",
        long_help = None,
    )]
    pub verbose: u8,

    #[arg(
        long,
        short = 'q',
        action = clap::ArgAction::Count,
        global = true,
        help = "Decrease logging verbosity",
        long_help = None,
        conflicts_with = "verbose",
    )]
    pub quiet: u8,
}

#[derive(Parser, Debug, Clone)]
#[clap(
    name = "bumpversion",
    version = option_env!("CARGO_PKG_VERSION").unwrap_or("unknown"),
    about = "bump version numbers in files and commit the result",
)]
pub struct Options {
    #[clap(long = "dir", help = "repository directory to run bumpversion in", env = "BUMPVERSION_DIR")]
    pub dir: Option<PathBuf>,

    #[clap(
        long = "config-file",
        help = "config file to read most of the variables from",
        env = "BUMPVERSION_CONFIG_FILE"
    )]
    pub config_file: Option<PathBuf>,

    #[arg(long = "color", env = "BUMPVERSION_COLOR", help = "enable or disable color")]
    pub color_choice: Option<termcolor::ColorChoice>,

    #[arg(
        long = "log-format",
        env = "BUMPVERSION_LOG_FORMAT",
        help = "presentation format for log output (pretty, pretty-compact, json)"
    )]
    pub log_format: Option<crate::logging::LogFormat>,

    #[command(flatten)]
    pub verbosity: Verbosity,

    #[arg(
        long = "log",
        env = "BUMPVERSION_LOG_LEVEL",
        aliases = ["log-level"],
        help = "log level; overridden by RUST_LOG when set"
    )]
    pub log_level: Option<tracing::metadata::Level>,

    #[clap(
        long = "list",
        help = "emit machine-readable key=value lines instead of human-readable logging",
        action = clap::ArgAction::SetTrue,
    )]
    pub list: Option<bool>,

    #[clap(
        long = "allow-dirty",
        help = "don't abort if the working directory is dirty",
        env = "BUMPVERSION_ALLOW_DIRTY",
        action = clap::ArgAction::SetTrue,
    )]
    pub allow_dirty: Option<bool>,

    #[clap(
        long = "no-allow-dirty",
        help = "explicitly abort if the working directory is dirty",
        env = "BUMPVERSION_NO_ALLOW_DIRTY",
        action = clap::ArgAction::SetTrue,
    )]
    pub no_allow_dirty: Option<bool>,

    #[clap(long = "current-version", help = "version that needs to be updated", env = "BUMPVERSION_CURRENT_VERSION")]
    pub current_version: Option<String>,

    #[clap(long = "new-version", help = "new version that should be in the files", env = "BUMPVERSION_NEW_VERSION")]
    pub new_version: Option<String>,

    #[clap(long = "parse", help = "regex parsing the version string", env = "BUMPVERSION_PARSE")]
    pub parse_version_pattern: Option<String>,

    #[clap(
        long = "serialize",
        help = "how to format what is parsed back into a version (repeatable)",
        env = "BUMPVERSION_SERIALIZE"
    )]
    pub serialize_version_patterns: Option<Vec<String>>,

    #[clap(long = "search", help = "template for the string to search for", env = "BUMPVERSION_SEARCH")]
    pub search: Option<String>,

    #[clap(long = "replace", help = "template for the string to replace it with", env = "BUMPVERSION_REPLACE")]
    pub replace: Option<String>,

    #[clap(long = "regex", help = "treat the search parameter as a regular expression", env = "BUMPVERSION_REGEX")]
    pub regex: Option<bool>,

    #[clap(
        long = "no-regex",
        help = "explicitly do not treat the search parameter as a regular expression",
        env = "BUMPVERSION_NO_REGEX"
    )]
    pub no_regex: Option<bool>,

    #[clap(
        long = "no-configured-files",
        help = "only replace the version in files given on the command line, ignoring the configured ones",
        env = "BUMPVERSION_NO_CONFIGURED_FILES",
        action = clap::ArgAction::SetTrue,
    )]
    pub no_configured_files: Option<bool>,

    #[clap(
        long = "ignore-missing-files",
        help = "ignore any missing files when searching and replacing",
        env = "BUMPVERSION_IGNORE_MISSING_FILES",
        action = clap::ArgAction::SetTrue,
    )]
    pub ignore_missing_files: Option<bool>,

    #[clap(
        long = "no-ignore-missing-files",
        help = "error on any missing files when searching and replacing",
        env = "BUMPVERSION_NO_IGNORE_MISSING_FILES",
        action = clap::ArgAction::SetTrue,
    )]
    pub no_ignore_missing_files: Option<bool>,

    #[clap(
        long = "ignore-missing-version",
        help = "ignore a missing version when searching and replacing",
        env = "BUMPVERSION_IGNORE_MISSING_VERSION",
        action = clap::ArgAction::SetTrue,
    )]
    pub ignore_missing_version: Option<bool>,

    #[clap(
        long = "no-ignore-missing-version",
        help = "error on a missing version when searching and replacing",
        env = "BUMPVERSION_NO_IGNORE_MISSING_VERSION",
        action = clap::ArgAction::SetTrue,
    )]
    pub no_ignore_missing_version: Option<bool>,

    #[clap(
        short = 'n',
        long = "dry-run",
        help = "don't write any files, just report what would happen",
        env = "BUMPVERSION_DRY_RUN",
        action = clap::ArgAction::SetTrue,
    )]
    pub dry_run: Option<bool>,

    #[clap(long = "commit", help = "commit to version control", env = "BUMPVERSION_COMMIT", action = clap::ArgAction::SetTrue)]
    pub commit: Option<bool>,

    #[clap(
        long = "no-commit",
        help = "do not commit to version control",
        env = "BUMPVERSION_NO_COMMIT",
        action = clap::ArgAction::SetTrue,
    )]
    pub no_commit: Option<bool>,

    #[clap(long = "tag", help = "create a tag in version control", env = "BUMPVERSION_TAG", action = clap::ArgAction::SetTrue)]
    pub tag: Option<bool>,

    #[clap(
        long = "no-tag",
        help = "do not create a tag in version control",
        env = "BUMPVERSION_NO_TAG",
        action = clap::ArgAction::SetTrue,
    )]
    pub no_tag: Option<bool>,

    #[clap(long = "sign-tags", help = "sign tags if created", env = "BUMPVERSION_SIGN_TAGS", action = clap::ArgAction::SetTrue)]
    pub sign_tags: Option<bool>,

    #[clap(
        long = "no-sign-tags",
        help = "do not sign tags if created",
        env = "BUMPVERSION_NO_SIGN_TAGS",
        action = clap::ArgAction::SetTrue,
    )]
    pub no_sign_tag: Option<bool>,

    #[clap(long = "tag-name", help = "tag name template (only used with --tag)", env = "BUMPVERSION_TAG_NAME")]
    pub tag_name: Option<String>,

    #[clap(long = "tag-message", help = "tag message template", env = "BUMPVERSION_TAG_MESSAGE")]
    pub tag_message: Option<String>,

    #[clap(short = 'm', long = "message", help = "commit message template", env = "BUMPVERSION_MESSAGE")]
    pub commit_message: Option<String>,

    #[clap(long = "commit-args", help = "extra arguments passed to the commit command", env = "BUMPVERSION_COMMIT_ARGS")]
    pub commit_args: Option<String>,

    #[clap(subcommand)]
    pub bump: Option<BumpCommand>,

    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

/// Clap v4's `ArgAction::SetTrue` sets unset flags to `Some(false)` rather than `None`; since
/// these flags can never be explicitly set to `false` on the command line, `Some(false)` always
/// means "not passed" and is normalized back to `None` so three-tier precedence in
/// [`global_cli_config`] can tell "not passed" apart from "file says false".
pub fn fix(options: &mut Options) {
    for boolean_option in [
        &mut options.list,
        &mut options.allow_dirty,
        &mut options.no_allow_dirty,
        &mut options.regex,
        &mut options.no_regex,
        &mut options.no_configured_files,
        &mut options.ignore_missing_files,
        &mut options.no_ignore_missing_files,
        &mut options.ignore_missing_version,
        &mut options.no_ignore_missing_version,
        &mut options.dry_run,
        &mut options.commit,
        &mut options.no_commit,
        &mut options.tag,
        &mut options.no_tag,
        &mut options.sign_tags,
        &mut options.no_sign_tag,
    ] {
        if *boolean_option != Some(true) {
            *boolean_option = None;
        }
    }
}

/// Split `options.args` into the version-part-to-bump (when `--new-version` isn't used and no
/// `bump` subcommand was given) and the trailing list of files to additionally rewrite.
///
/// # Errors
/// Returns an error if a leftover argument looks like an unrecognized flag, or the first
/// positional argument doesn't name one of `components`.
pub fn parse_positional_arguments(
    options: &mut Options,
    components: &config::VersionComponentConfigs,
) -> eyre::Result<(Option<String>, Vec<PathBuf>)> {
    let mut cli_files = vec![];
    let mut bump: Option<String> = options.bump.as_ref().map(AsRef::as_ref).map(ToString::to_string);

    for arg in &options.args {
        if arg.starts_with("--") {
            eyre::bail!("unknown flag {arg:?}");
        }
    }

    if !options.args.is_empty() {
        if options.bump.is_none() {
            let component = options.args.remove(0);
            if components.contains_key(&component) {
                bump = Some(component);
                cli_files.extend(options.args.drain(..).map(PathBuf::from));
            } else {
                eyre::bail!(
                    "first argument must be one of the version components {:?}",
                    components.keys().collect::<Vec<_>>()
                );
            }
        } else {
            cli_files.extend(options.args.drain(..).map(PathBuf::from));
        }
    }
    Ok((bump, cli_files))
}

/// Translate CLI flags into a [`config::GlobalConfig`] suitable for layering over file config in
/// [`bumpversion::BumpVersion::new`].
///
/// # Errors
/// Returns an error if a regex/format-string flag fails to compile.
pub fn global_cli_config(options: &Options) -> eyre::Result<config::GlobalConfig> {
    let search_as_regex = options.regex.or(options.no_regex.invert()).unwrap_or(false);

    let search = options
        .search
        .as_ref()
        .map(|search| {
            let format_string = bumpversion::f_string::PythonFormatString::parse(search)?;
            let search = if search_as_regex {
                config::RegexTemplate::Regex(format_string)
            } else {
                config::RegexTemplate::Escaped(format_string)
            };
            Ok::<_, eyre::Report>(search)
        })
        .transpose()?;

    let parse_version_pattern = options
        .parse_version_pattern
        .as_deref()
        .map(config::Regex::try_from)
        .transpose()?;

    let serialize_version_patterns = options
        .serialize_version_patterns
        .as_ref()
        .map(|patterns| {
            patterns
                .iter()
                .map(String::as_str)
                .map(bumpversion::f_string::PythonFormatString::parse)
                .collect::<Result<Vec<_>, _>>()
        })
        .transpose()?;

    let tag_name = options
        .tag_name
        .as_deref()
        .map(bumpversion::f_string::PythonFormatString::parse)
        .transpose()?;

    let tag_message = options
        .tag_message
        .as_deref()
        .map(bumpversion::f_string::PythonFormatString::parse)
        .transpose()?;

    let commit_message = options
        .commit_message
        .as_deref()
        .map(bumpversion::f_string::PythonFormatString::parse)
        .transpose()?;

    Ok(config::GlobalConfig {
        allow_dirty: options.allow_dirty.or(options.no_allow_dirty.invert()),
        current_version: options.current_version.clone(),
        parse_version_pattern,
        serialize_version_patterns,
        search,
        replace: options.replace.clone(),
        no_configured_files: options.no_configured_files,
        ignore_missing_files: options.ignore_missing_files.or(options.no_ignore_missing_files.invert()),
        ignore_missing_version: options.ignore_missing_version.or(options.no_ignore_missing_version.invert()),
        dry_run: options.dry_run,
        commit: options.commit.or(options.no_commit.invert()),
        tag: options.tag.or(options.no_tag.invert()),
        sign_tags: options.sign_tags.or(options.no_sign_tag.invert()),
        tag_name,
        tag_message,
        commit_message,
        commit_args: options.commit_args.clone(),
        ..config::GlobalConfig::empty()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invert_preserves_none() {
        assert_eq!(None::<bool>.invert(), None);
        assert_eq!(Some(true).invert(), Some(false));
        assert_eq!(Some(false).invert(), Some(true));
    }

    #[test]
    fn fix_clears_unset_set_true_flags() {
        let mut options = Options::parse_from(["bumpversion", "patch"]);
        assert_eq!(options.commit, Some(false));
        fix(&mut options);
        assert_eq!(options.commit, None);
        assert_eq!(options.dry_run, None);
    }

    #[test]
    fn fix_keeps_flags_that_were_passed() {
        let mut options = Options::parse_from(["bumpversion", "--dry-run", "--tag", "patch"]);
        fix(&mut options);
        assert_eq!(options.dry_run, Some(true));
        assert_eq!(options.tag, Some(true));
        assert_eq!(options.commit, None);
    }

    #[test]
    fn positional_bump_component_and_files() {
        let components: config::VersionComponentConfigs =
            [("major".to_string(), config::VersionComponentSpec::default()), ("minor".to_string(), config::VersionComponentSpec::default())]
                .into_iter()
                .collect();
        let mut options = Options::parse_from(["bumpversion", "minor", "VERSION", "README.md"]);
        let (bump, files) = parse_positional_arguments(&mut options, &components).unwrap();
        assert_eq!(bump.as_deref(), Some("minor"));
        assert_eq!(files, vec![PathBuf::from("VERSION"), PathBuf::from("README.md")]);
    }

    #[test]
    fn positional_rejects_unknown_component() {
        let components: config::VersionComponentConfigs = [("major".to_string(), config::VersionComponentSpec::default())].into_iter().collect();
        let mut options = Options::parse_from(["bumpversion", "bogus"]);
        assert!(parse_positional_arguments(&mut options, &components).is_err());
    }
}
