//! Per-file configuration overrides, merged against [`super::global::GlobalConfig`] defaults.
use super::global::GlobalConfig;
use super::regex::RegexTemplate;
use super::MergeWith;
use crate::f_string::PythonFormatString;
use once_cell::sync::Lazy;

pub static PARSE_VERSION_REGEX: Lazy<regex::Regex> =
    Lazy::new(|| regex::Regex::new(r"(?P<major>\d+)\.(?P<minor>\d+)\.(?P<patch>\d+)").unwrap());

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileConfig {
    pub parse_version_pattern: Option<super::Regex>,
    pub serialize_version_patterns: Option<Vec<PythonFormatString>>,
    pub search: Option<RegexTemplate>,
    pub replace: Option<String>,
    pub ignore_missing_version: Option<bool>,
    pub ignore_missing_file: Option<bool>,
}

impl FileConfig {
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalizedFileConfig {
    pub parse_version_pattern: super::Regex,
    pub serialize_version_patterns: Vec<PythonFormatString>,
    pub search: RegexTemplate,
    pub replace: String,
    pub ignore_missing_version: bool,
    pub ignore_missing_file: bool,
}

impl Default for FinalizedFileConfig {
    fn default() -> Self {
        Self {
            parse_version_pattern: PARSE_VERSION_REGEX.clone().into(),
            serialize_version_patterns: vec![PythonFormatString::parse("{major}.{minor}.{patch}").unwrap()],
            search: RegexTemplate::Escaped(PythonFormatString::parse("{current_version}").unwrap()),
            replace: "{new_version}".to_string(),
            ignore_missing_version: false,
            ignore_missing_file: false,
        }
    }
}

impl FileConfig {
    #[must_use]
    pub fn finalize(self) -> FinalizedFileConfig {
        let default = FinalizedFileConfig::default();
        FinalizedFileConfig {
            parse_version_pattern: self.parse_version_pattern.unwrap_or(default.parse_version_pattern),
            serialize_version_patterns: self
                .serialize_version_patterns
                .unwrap_or(default.serialize_version_patterns),
            search: self.search.unwrap_or(default.search),
            replace: self.replace.unwrap_or(default.replace),
            ignore_missing_version: self.ignore_missing_version.unwrap_or(default.ignore_missing_version),
            ignore_missing_file: self.ignore_missing_file.unwrap_or(default.ignore_missing_file),
        }
    }
}

impl MergeWith<&GlobalConfig> for FileConfig {
    fn merge_with(&mut self, other: &GlobalConfig) {
        self.parse_version_pattern.merge_with(other.parse_version_pattern.as_ref());
        self.serialize_version_patterns
            .merge_with(other.serialize_version_patterns.as_ref());
        self.search.merge_with(other.search.as_ref());
        self.replace.merge_with(other.replace.as_ref());
        self.ignore_missing_version.merge_with(other.ignore_missing_version.as_ref());
        self.ignore_missing_file.merge_with(other.ignore_missing_files.as_ref());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finalize_fills_in_defaults() {
        let finalized = FileConfig::empty().finalize();
        assert_eq!(finalized.replace, "{new_version}");
        assert!(finalized.search.is_escaped());
    }

    #[test]
    fn merge_pulls_unset_fields_from_global() {
        let mut file = FileConfig::empty();
        let mut global = GlobalConfig::empty();
        global.replace = Some("REPLACED".to_string());
        file.merge_with(&global);
        assert_eq!(file.replace.as_deref(), Some("REPLACED"));
    }

    #[test]
    fn merge_does_not_override_explicit_file_value() {
        let mut file = FileConfig {
            replace: Some("KEEP".to_string()),
            ..FileConfig::empty()
        };
        let mut global = GlobalConfig::empty();
        global.replace = Some("REPLACED".to_string());
        file.merge_with(&global);
        assert_eq!(file.replace.as_deref(), Some("KEEP"));
    }
}
