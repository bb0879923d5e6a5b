//! Configuration loading: discovers a config file in a directory, parses it (TOML, INI, or
//! `Cargo.toml` metadata), and merges file-level overrides down onto the global defaults.
pub mod change;
pub mod file;
pub mod global;
pub mod ini;
pub mod regex;
pub mod toml;
pub mod version;

pub use self::regex::{Regex, RegexTemplate};
pub use change::FileChange;
pub use file::FileConfig;
pub use global::GlobalConfig;
pub use version::{VersionComponentConfigs, VersionComponentSpec};

use indexmap::IndexMap;
use std::path::{Path, PathBuf};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Toml(#[from] self::toml::ParseError),
    #[error(transparent)]
    Ini(#[from] self::ini::ParseError),
    #[error("failed to join blocking config-parse task: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// The set of file names checked, in priority order, for bumpversion configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFile {
    BumpversionToml,
    BumpversionCfg,
    PyProject,
    SetupCfg,
    CargoToml,
}

impl ConfigFile {
    #[must_use]
    pub fn path(self, dir: &Path) -> PathBuf {
        let name = match self {
            Self::BumpversionToml => ".bumpversion.toml",
            Self::BumpversionCfg => ".bumpversion.cfg",
            Self::PyProject => "pyproject.toml",
            Self::SetupCfg => "setup.cfg",
            Self::CargoToml => "Cargo.toml",
        };
        dir.join(name)
    }
}

/// Yield every config file location to check, in the order they should be tried.
pub fn config_file_locations(dir: &Path) -> impl Iterator<Item = ConfigFile> + '_ {
    [
        ConfigFile::BumpversionToml,
        ConfigFile::BumpversionCfg,
        ConfigFile::PyProject,
        ConfigFile::SetupCfg,
        ConfigFile::CargoToml,
    ]
    .into_iter()
}

/// Layer configuration: the already-set side wins, the other side only fills in `None`s.
pub trait MergeWith<T> {
    fn merge_with(&mut self, other: T);
}

impl<'a, T> MergeWith<Option<&'a T>> for Option<T>
where
    T: Clone,
{
    fn merge_with(&mut self, other: Option<&'a T>) {
        if self.is_none() {
            *self = other.cloned();
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputFile {
    Path(PathBuf),
    GlobPattern {
        pattern: String,
        exclude_patterns: Vec<String>,
    },
}

impl InputFile {
    #[must_use]
    pub fn glob(pattern: impl Into<String>) -> Self {
        Self::GlobPattern {
            pattern: pattern.into(),
            exclude_patterns: Vec::new(),
        }
    }

    #[must_use]
    pub fn as_path(&self) -> Option<&Path> {
        match self {
            Self::Path(path) => Some(path),
            Self::GlobPattern { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub global: GlobalConfig,
    pub files: Vec<(InputFile, FileConfig)>,
    pub components: VersionComponentConfigs,
}

#[derive(Debug, Clone)]
pub struct FinalizedConfig {
    pub global: global::GlobalConfigFinalized,
    pub files: Vec<(InputFile, file::FinalizedFileConfig)>,
    pub components: VersionComponentConfigs,
}

impl Config {
    /// Merge each file-level override down onto a clone of the global config, so later lookups
    /// can finalize each file independently without re-walking the merge chain.
    #[must_use]
    pub fn merge_file_configs_with_global_config(self) -> Vec<(InputFile, FileConfig)> {
        self.files
            .into_iter()
            .map(|(input, mut file_config)| {
                file_config.merge_with(&self.global);
                (input, file_config)
            })
            .collect()
    }

    #[must_use]
    pub fn finalize(self) -> FinalizedConfig {
        let components = version::version_component_configs(
            &self
                .global
                .parse_version_pattern
                .clone()
                .map(|r| r.0)
                .unwrap_or_else(|| file::PARSE_VERSION_REGEX.clone()),
            &self.components,
        );
        let global = self.global.clone();
        let files = self
            .clone()
            .merge_file_configs_with_global_config()
            .into_iter()
            .map(|(input, file_config)| (input, file_config.finalize()))
            .collect();
        FinalizedConfig {
            global: global.finalize(),
            files,
            components,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_file_locations_try_bumpversion_toml_first() {
        let dir = Path::new("/tmp/project");
        let mut locations = config_file_locations(dir);
        assert_eq!(locations.next(), Some(ConfigFile::BumpversionToml));
        assert_eq!(locations.next(), Some(ConfigFile::BumpversionCfg));
    }

    #[test]
    fn finalize_produces_default_global_when_empty() {
        let config = Config::default();
        let finalized = config.finalize();
        assert!(!finalized.global.commit);
        assert_eq!(finalized.global.serialize_version_patterns.len(), 1);
    }

    #[test]
    fn merge_file_configs_pulls_in_global_search_default() {
        let mut config = Config::default();
        config.files.push((InputFile::Path(PathBuf::from("README.md")), FileConfig::empty()));
        config.global.replace = Some("replaced".to_string());
        let merged = config.merge_file_configs_with_global_config();
        assert_eq!(merged[0].1.replace.as_deref(), Some("replaced"));
    }
}
