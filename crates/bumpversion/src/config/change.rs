//! A single configured file-change: where to search, what to replace it with, and which
//! version-part bumps should or should not trigger a rewrite.
use super::file::FinalizedFileConfig;
use super::regex::RegexTemplate;
use super::VersionComponentConfigs;
use crate::f_string::PythonFormatString;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    pub parse_version_pattern: super::Regex,
    pub serialize_version_patterns: Vec<PythonFormatString>,
    pub search: RegexTemplate,
    pub replace: String,
    pub ignore_missing_version: bool,
    pub ignore_missing_file: bool,
    pub include_bumps: Option<Vec<String>>,
    pub exclude_bumps: Option<Vec<String>>,
}

impl FileChange {
    #[must_use]
    pub fn new(file_config: FinalizedFileConfig, _components: &VersionComponentConfigs) -> Self {
        Self {
            parse_version_pattern: file_config.parse_version_pattern,
            serialize_version_patterns: file_config.serialize_version_patterns,
            search: file_config.search,
            replace: file_config.replace,
            ignore_missing_version: file_config.ignore_missing_version,
            ignore_missing_file: file_config.ignore_missing_file,
            include_bumps: None,
            exclude_bumps: None,
        }
    }

    /// Whether a bump of `part` should trigger this file change, given its include/exclude lists.
    /// With no lists configured every part bump applies.
    #[must_use]
    pub fn will_bump_component(&self, part: &str) -> bool {
        if let Some(exclude) = &self.exclude_bumps {
            if exclude.iter().any(|p| p == part) {
                return false;
            }
        }
        match &self.include_bumps {
            Some(include) => include.iter().any(|p| p == part),
            None => true,
        }
    }

    #[must_use]
    pub fn will_not_bump_component(&self, part: &str) -> bool {
        !self.will_bump_component(part)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn change(include: Option<Vec<&str>>, exclude: Option<Vec<&str>>) -> FileChange {
        FileChange {
            parse_version_pattern: regex::Regex::new(r"(?P<major>\d+)").unwrap().into(),
            serialize_version_patterns: vec![PythonFormatString::parse("{major}").unwrap()],
            search: RegexTemplate::Escaped(PythonFormatString::parse("{current_version}").unwrap()),
            replace: "{new_version}".to_string(),
            ignore_missing_version: false,
            ignore_missing_file: false,
            include_bumps: include.map(|v| v.into_iter().map(String::from).collect()),
            exclude_bumps: exclude.map(|v| v.into_iter().map(String::from).collect()),
        }
    }

    #[test]
    fn no_lists_bumps_every_part() {
        let change = change(None, None);
        assert!(change.will_bump_component("major"));
        assert!(change.will_bump_component("minor"));
    }

    #[test]
    fn include_list_restricts_to_named_parts() {
        let change = change(Some(vec!["major"]), None);
        assert!(change.will_bump_component("major"));
        assert!(change.will_not_bump_component("minor"));
    }

    #[test]
    fn exclude_list_overrides_include() {
        let change = change(Some(vec!["major", "minor"]), Some(vec!["minor"]));
        assert!(change.will_bump_component("major"));
        assert!(change.will_not_bump_component("minor"));
    }
}
