//! Core version-bumping engine: configuration discovery, the version/bump algebra, template
//! rendering, file rewriting, VCS integration, and the `BumpVersion` orchestrator that ties them
//! together for a single bump.
pub mod command;
pub mod config;
pub mod context;
pub mod f_string;
pub mod files;
pub mod hooks;
pub mod logging;
pub mod vcs;
pub mod version;

use crate::{
    config::{Config, ConfigFile, FileChange, GlobalConfig, MergeWith, VersionComponentConfigs},
    files::FileMap,
    logging::{Log, LogExt, Verbosity},
    vcs::{TagAndRevision, VersionControlSystem},
    version::{Version, VersionSpec},
};
use colored::Color;
use futures::stream::{self, StreamExt, TryStreamExt};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

/// Errors raised while locating and parsing a configuration file.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Toml(#[from] config::toml::ParseError),
    #[error(transparent)]
    Ini(#[from] config::ini::ParseError),
}

fn parse_config_contents(kind: ConfigFile, contents: &str) -> Result<Option<Config>, ConfigError> {
    Ok(match kind {
        ConfigFile::BumpversionToml => config::toml::parse(contents, &[])?,
        ConfigFile::PyProject => config::toml::parse(contents, &["tool"])?,
        ConfigFile::CargoToml => config::toml::parse(contents, &["package", "metadata"])?,
        ConfigFile::BumpversionCfg | ConfigFile::SetupCfg => config::ini::parse(contents, true)?,
    })
}

/// Guess which [`ConfigFile`] kind an arbitrary path should be parsed/rewritten as, from its file
/// name alone. Used for `--config-file`, where the user may point at a file under a name that
/// doesn't match any of the default candidate locations.
fn config_file_kind(path: &Path) -> ConfigFile {
    match path.file_name().and_then(|name| name.to_str()) {
        Some("Cargo.toml") => ConfigFile::CargoToml,
        Some("pyproject.toml") => ConfigFile::PyProject,
        _ if path.extension().and_then(|ext| ext.to_str()) == Some("toml") => ConfigFile::BumpversionToml,
        _ => ConfigFile::BumpversionCfg,
    }
}

/// Locate the bumpversion configuration to use.
///
/// With `explicit` set (`--config-file`), that exact path is read and parsed according to its
/// file name, and a missing file is an error. Otherwise, each candidate location under `dir` is
/// tried in turn and the first one that parses into a non-empty `bumpversion` configuration wins.
///
/// `.bumpversion.toml` reads its table from the document root (`[bumpversion]`), matching the
/// bare-root shape the INI readers use; `pyproject.toml` nests it under `[tool.bumpversion]`,
/// and `Cargo.toml` under `[package.metadata.bumpversion]`.
///
/// # Errors
/// Returns `ConfigError` if `explicit` names a file that doesn't exist or fails to parse, or if a
/// default candidate exists but fails to parse.
pub fn find_config(dir: &Path, explicit: Option<&Path>) -> Result<Option<(ConfigFile, PathBuf, Config)>, ConfigError> {
    if let Some(path) = explicit {
        let kind = config_file_kind(path);
        let contents = std::fs::read_to_string(path)?;
        return Ok(parse_config_contents(kind, &contents)?.map(|config| (kind, path.to_path_buf(), config)));
    }

    for location in config::config_file_locations(dir) {
        let path = location.path(dir);
        let Ok(contents) = std::fs::read_to_string(&path) else {
            continue;
        };
        if let Some(config) = parse_config_contents(location, &contents)? {
            tracing::debug!(?path, "found configuration");
            return Ok(Some((location, path, config)));
        }
    }
    Ok(None)
}

/// What to bump: a named part of the current version, or a literal replacement version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bump<'a> {
    Component(&'a str),
    NewVersion(&'a str),
}

/// Errors raised while constructing a [`BumpVersion`].
#[derive(thiserror::Error, Debug)]
pub enum NewError<VCS: VersionControlSystem> {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("no bumpversion configuration found")]
    ConfigNotFound,
    #[error(transparent)]
    Files(#[from] files::Error),
    #[error("repository has uncommitted changes in {0:?} (pass allow_dirty to proceed anyway)")]
    DirtyWorkingDirectory(Vec<PathBuf>),
    #[error(transparent)]
    Vcs(VCS::Error),
}

/// Errors raised while performing a bump.
#[derive(thiserror::Error, Debug)]
pub enum BumpError<VCS: VersionControlSystem> {
    #[error("no current_version configured")]
    MissingCurrentVersion,
    #[error("current_version {0:?} does not match the configured parse pattern")]
    UnparsableCurrentVersion(String),
    #[error("new version {0:?} does not match the configured parse pattern")]
    UnparsableNewVersion(String),
    #[error(transparent)]
    Hook(#[from] hooks::Error),
    #[error(transparent)]
    Bump(#[from] version::BumpError),
    #[error(transparent)]
    Serialize(#[from] version::SerializeError),
    #[error(transparent)]
    ReplaceVersion(#[from] color_eyre::eyre::Report),
    #[error(transparent)]
    UpdateConfigToml(#[from] config::toml::Error),
    #[error(transparent)]
    UpdateConfigIni(#[from] config::ini::Error),
    #[error("repository has uncommitted changes in {0:?} (pass allow_dirty to proceed anyway)")]
    DirtyWorkingDirectory(Vec<PathBuf>),
    #[error(transparent)]
    Vcs(VCS::Error),
}

/// Ties a VCS backend, a resolved configuration, and a logger together to perform one bump.
///
/// Generic over the VCS implementation and the logger so tests can swap in
/// [`vcs::temp::GitRepository`]/a collecting logger without touching the orchestration logic.
pub struct BumpVersion<VCS, L> {
    pub(crate) repo: VCS,
    pub(crate) config: config::FinalizedConfig,
    pub(crate) logger: L,
    pub(crate) tag_and_revision: TagAndRevision,
    pub(crate) file_map: FileMap,
    pub(crate) components: VersionComponentConfigs,
    pub(crate) config_file: Option<(ConfigFile, PathBuf)>,
    pub(crate) dry_run: bool,
}

impl<VCS, L> BumpVersion<VCS, L>
where
    VCS: VersionControlSystem,
    L: Log,
{
    /// Discover a configuration file under `dir` (or read `config_file` directly, when given),
    /// layer `cli_overrides` on top (CLI always wins), open the VCS repository, and resolve every
    /// configured file/glob into a [`FileMap`], ready for [`Self::bump`].
    ///
    /// # Errors
    /// Returns [`NewError::ConfigNotFound`] if no configuration file is found,
    /// [`NewError::DirtyWorkingDirectory`] if the repository has uncommitted changes and
    /// `allow_dirty` is not set, or propagates parsing/VCS/glob-resolution errors.
    pub async fn new(
        dir: &Path,
        config_file: Option<&Path>,
        cli_overrides: GlobalConfig,
        logger: L,
    ) -> Result<Self, NewError<VCS>> {
        let (config_kind, config_path, mut config) = find_config(dir, config_file)?.ok_or(NewError::ConfigNotFound)?;

        let mut global = cli_overrides;
        global.merge_with(&config.global);
        config.global = global;

        let finalized = config.clone().finalize();

        let repo = VCS::open(dir).map_err(NewError::Vcs)?;
        let tag_and_revision = repo
            .latest_tag_and_revision(&finalized.global.tag_name, &finalized.global.parse_version_pattern)
            .await
            .map_err(NewError::Vcs)?;

        if !finalized.global.allow_dirty {
            let dirty = repo.dirty_files().await.map_err(NewError::Vcs)?;
            if !dirty.is_empty() {
                return Err(NewError::DirtyWorkingDirectory(dirty));
            }
        }

        let mut files_config = config.clone();
        files_config.files = files_config.clone().merge_file_configs_with_global_config();
        let file_map = files::resolve_files_from_config(&mut files_config, &finalized.components, Some(repo.path()))?;

        Ok(Self {
            repo,
            components: finalized.components.clone(),
            config: finalized,
            logger,
            tag_and_revision,
            file_map,
            config_file: Some((config_kind, config_path)),
            dry_run: false,
        })
    }

    /// Honor the configured (or CLI-overridden) `dry_run` flag from now on.
    #[must_use]
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run || self.config.global.dry_run;
        self
    }

    fn files_to_touch(&self, component: Option<&str>) -> Vec<(&PathBuf, Vec<FileChange>)> {
        let excluded: HashSet<&PathBuf> = self.config.global.excluded_paths.iter().collect();
        let included_extra: HashSet<&PathBuf> = self.config.global.included_paths.iter().collect();
        let configured: HashSet<&PathBuf> = self
            .file_map
            .keys()
            .collect::<HashSet<&PathBuf>>()
            .difference(&excluded)
            .copied()
            .collect();

        included_extra
            .union(&configured)
            .copied()
            .filter_map(|path| self.file_map.get_key_value(path))
            .map(|(path, changes)| {
                let changes: Vec<FileChange> = changes
                    .iter()
                    .filter(|change| component.map_or(true, |part| change.will_bump_component(part)))
                    .cloned()
                    .collect();
                (path, changes)
            })
            .filter(|(_, changes)| !changes.is_empty())
            .collect()
    }

    /// Perform one bump: parse the current version, run hooks, compute and serialize the new
    /// version, rewrite every configured file, update the config file's `current_version`, and
    /// commit/tag if configured.
    ///
    /// # Errors
    /// See [`BumpError`] variants.
    pub async fn bump(&self, bump: Bump<'_>) -> Result<(), BumpError<VCS>> {
        let version_spec = VersionSpec::from_components(self.components.clone());
        let ordering: Vec<String> = version_spec.component_names().map(str::to_string).collect();

        let current_version_str = self
            .config
            .global
            .current_version
            .clone()
            .ok_or(BumpError::MissingCurrentVersion)?;
        let current_version = Version::parse(
            &current_version_str,
            &self.config.global.parse_version_pattern,
            &version_spec,
        )
        .ok_or(BumpError::UnparsableCurrentVersion(current_version_str.clone()))?;

        self.logger.log(
            Verbosity::Low,
            &format!("current version: {}", logging::format_version(&current_version, Color::Yellow)),
        );

        self.run_setup_hooks(Some(&current_version)).await?;

        let new_version = match bump {
            Bump::Component(part) => current_version.bump(part, &ordering)?,
            Bump::NewVersion(raw) => {
                Version::parse(raw, &self.config.global.parse_version_pattern, &version_spec)
                    .ok_or_else(|| BumpError::UnparsableNewVersion(raw.to_string()))?
            }
        };

        let ctx: HashMap<String, String> =
            context::get_context(Some(&self.tag_and_revision), Some(&current_version), Some(&new_version), None, None)
                .collect();

        let current_version_serialized = current_version.serialize(&self.config.global.serialize_version_patterns, &ctx)?;
        let new_version_serialized = new_version.serialize(&self.config.global.serialize_version_patterns, &ctx)?;

        self.logger.log(
            Verbosity::Low,
            &format!("new version: {}", logging::format_version(&new_version, Color::Green)),
        );
        // Plain, uncolored lines at high verbosity for machine consumers (e.g. `--list`) that
        // want the serialized strings rather than the per-component breakdown above.
        self.logger
            .log(Verbosity::High, &format!("current_version={current_version_serialized}"));
        self.logger.log(Verbosity::High, &format!("new_version={new_version_serialized}"));

        if current_version_serialized == new_version_serialized {
            self.logger.log(Verbosity::Low, "version unchanged, nothing to do");
            return Ok(());
        }

        let full_ctx: HashMap<String, String> = context::get_context(
            Some(&self.tag_and_revision),
            Some(&current_version),
            Some(&new_version),
            Some(current_version_serialized.as_str()),
            Some(new_version_serialized.as_str()),
        )
        .collect();

        let component = match bump {
            Bump::Component(part) => Some(part),
            Bump::NewVersion(_) => None,
        };

        // Pre-flight: read and verify every configured file, independently and concurrently, but
        // write none of them yet. If any file fails verification, `?` below returns before a
        // single byte on disk has changed.
        let mut modifications: Vec<(PathBuf, Option<(String, String)>)> =
            stream::iter(self.files_to_touch(component))
                .map(|(path, changes)| {
                    let path = path.clone();
                    let current_version = &current_version;
                    let new_version = &new_version;
                    let full_ctx = &full_ctx;
                    async move {
                        files::read_and_verify_file(&path, &changes, current_version, new_version, full_ctx)
                            .await
                            .map(|modification| (path, modification))
                    }
                })
                .buffer_unordered(8)
                .try_collect()
                .await?;

        modifications.sort_by(|(a, _), (b, _)| a.cmp(b));

        // Only now, with every file verified, write the changes back, one file at a time.
        for (path, modification) in &modifications {
            if let Some((before, after)) = modification {
                files::write_file_change(path, before, after, self.dry_run).await?;
                self.logger.log_modification(path, before, Some(after));
            }
        }

        if let Some((config_kind, config_path)) = &self.config_file {
            self.update_config_file(*config_kind, config_path, &new_version_serialized).await?;
        }

        self.run_pre_commit_hooks(Some(&current_version), Some(&new_version), &new_version_serialized)
            .await?;

        self.commit_changes(&current_version_serialized, &new_version_serialized, &full_ctx, &modifications)
            .await?;

        self.run_post_commit_hooks(Some(&current_version), Some(&new_version), &new_version_serialized)
            .await?;

        Ok(())
    }

    async fn update_config_file(&self, config_file: ConfigFile, path: &Path, new_version: &str) -> Result<(), BumpError<VCS>> {
        let modification = match config_file {
            ConfigFile::BumpversionCfg | ConfigFile::SetupCfg => {
                config::ini::replace_version(path, new_version, self.dry_run).await?
            }
            ConfigFile::BumpversionToml => {
                config::toml::replace_version(path, &["bumpversion", "current_version"], new_version, self.dry_run)
                    .await?
            }
            ConfigFile::PyProject => {
                config::toml::replace_version(
                    path,
                    &["tool", "bumpversion", "current_version"],
                    new_version,
                    self.dry_run,
                )
                .await?
            }
            ConfigFile::CargoToml => {
                config::toml::replace_version(
                    path,
                    &["package", "metadata", "bumpversion", "current_version"],
                    new_version,
                    self.dry_run,
                )
                .await?
            }
        };
        if let Some((before, after)) = modification {
            self.logger.log_modification(path, &before, Some(&after));
        }
        Ok(())
    }

    async fn commit_changes(
        &self,
        current_version_serialized: &str,
        new_version_serialized: &str,
        ctx: &HashMap<String, String>,
        modifications: &[(PathBuf, Option<(String, String)>)],
    ) -> Result<(), BumpError<VCS>> {
        if !self.config.global.commit {
            return Ok(());
        }

        let changed_files: Vec<PathBuf> = modifications
            .iter()
            .filter(|(_, modification)| matches!(modification, Some((before, after)) if before != after))
            .map(|(path, _)| path.clone())
            .collect();

        if self.dry_run {
            self.logger.log(
                Verbosity::Low,
                &format!("would commit {} file(s)", changed_files.len()),
            );
            return Ok(());
        }

        self.repo.add(changed_files).await.map_err(BumpError::Vcs)?;

        let message = self
            .config
            .global
            .commit_message
            .format(ctx, false)
            .unwrap_or_else(|_| format!("Bump version: {current_version_serialized} → {new_version_serialized}"));

        let env = [
            ("BUMPVERSION_CURRENT_VERSION".to_string(), current_version_serialized.to_string()),
            ("BUMPVERSION_NEW_VERSION".to_string(), new_version_serialized.to_string()),
            ("HGENCODING".to_string(), "utf-8".to_string()),
        ];
        let extra_args = self
            .config
            .global
            .commit_args
            .as_deref()
            .and_then(shlex::split)
            .unwrap_or_default();
        self.repo.commit(&message, extra_args, env).await.map_err(BumpError::Vcs)?;

        if self.config.global.tag {
            let tag_name = self.config.global.tag_name.format(ctx, false).unwrap_or_default();
            let existing_tags = self.repo.tags().await.map_err(BumpError::Vcs)?;
            if !existing_tags.contains(&tag_name) {
                let tag_message = self.config.global.tag_message.format(ctx, false).ok();
                self.repo
                    .tag(&tag_name, tag_message.as_deref(), self.config.global.sign_tags)
                    .await
                    .map_err(BumpError::Vcs)?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vcs::{git::GitRepository, temp};

    async fn init_repo_with_config(config_contents: &str, file_name: &str, file_body: &str) -> temp::GitRepository<GitRepository> {
        let repo = temp::GitRepository::<GitRepository>::new().await.unwrap();
        tokio::fs::write(repo.path().join(".bumpversion.toml"), config_contents)
            .await
            .unwrap();
        tokio::fs::write(repo.path().join(file_name), file_body).await.unwrap();
        repo.add(&[".bumpversion.toml", file_name]).await.unwrap();
        repo
    }

    // `init_repo_with_config` stages but never commits, so the freshly-initialized repo always
    // has staged changes; allow that instead of asserting a clean working tree in these tests.
    fn overrides_allowing_dirty() -> GlobalConfig {
        GlobalConfig {
            allow_dirty: Some(true),
            ..GlobalConfig::empty()
        }
    }

    #[tokio::test]
    async fn bump_rewrites_configured_file_and_config() {
        let repo = init_repo_with_config(
            "[bumpversion]\ncurrent_version = \"1.2.3\"\n\n[[files]]\nfilename = \"VERSION\"\n",
            "VERSION",
            "1.2.3\n",
        )
        .await;

        let bv = BumpVersion::<GitRepository, crate::logging::NoOpLogger>::new(
            repo.path(),
            None,
            overrides_allowing_dirty(),
            crate::logging::NoOpLogger {},
        )
        .await
        .unwrap();

        bv.bump(Bump::Component("patch")).await.unwrap();

        let version_file = tokio::fs::read_to_string(repo.path().join("VERSION")).await.unwrap();
        assert_eq!(version_file, "1.2.4\n");

        let config_file = tokio::fs::read_to_string(repo.path().join(".bumpversion.toml")).await.unwrap();
        assert!(config_file.contains("current_version = \"1.2.4\""));
    }

    #[tokio::test]
    async fn bump_is_noop_when_serialized_version_is_unchanged() {
        let repo = init_repo_with_config(
            "[bumpversion]\ncurrent_version = \"1.2.3\"\n",
            "VERSION",
            "1.2.3\n",
        )
        .await;

        let bv = BumpVersion::<GitRepository, crate::logging::NoOpLogger>::new(
            repo.path(),
            None,
            overrides_allowing_dirty(),
            crate::logging::NoOpLogger {},
        )
        .await
        .unwrap();

        // Bumping "build" (an unconfigured, always-default-0 part appended via the same
        // current_version string) would error as unknown; instead confirm a same-valued new
        // version string is a true no-op.
        bv.bump(Bump::NewVersion("1.2.3")).await.unwrap();

        let version_file = tokio::fs::read_to_string(repo.path().join("VERSION")).await.unwrap();
        assert_eq!(version_file, "1.2.3\n");
    }

    #[tokio::test]
    async fn new_errors_without_a_config_file() {
        let repo = temp::GitRepository::<GitRepository>::new().await.unwrap();
        let result = BumpVersion::<GitRepository, crate::logging::NoOpLogger>::new(
            repo.path(),
            None,
            GlobalConfig::empty(),
            crate::logging::NoOpLogger {},
        )
        .await;
        assert!(matches!(result, Err(NewError::ConfigNotFound)));
    }
}
