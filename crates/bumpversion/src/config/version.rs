//! Per-part schema configuration (`[bumpversion:part:NAME]` sections).
use indexmap::IndexMap;

pub type VersionComponentConfigs = IndexMap<String, VersionComponentSpec>;

/// Configuration of a single version part, as read from the config file or CLI overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VersionComponentSpec {
    /// Is this part independent of the others (never reset by a bump of another part)?
    pub independent: Option<bool>,

    /// The value that is optional to include in a serialization.
    ///
    /// Defaults to `first_value`, or `"0"` for a Numeric part with no explicit `first_value`.
    pub optional_value: Option<String>,

    /// The possible values of an Enumerated part. Empty means the part is Numeric.
    pub values: Vec<String>,

    /// The first value to start or reset to.
    pub first_value: Option<String>,

    /// Bump this part even when it was not the part requested, once per run.
    pub always_increment: bool,

    /// The name of another part this one is considered to depend on.
    ///
    /// Currently recorded for configuration completeness; the reset cascade itself is driven
    /// purely by schema ordering and `independent`, as specified.
    pub depends_on: Option<String>,
}

impl VersionComponentSpec {
    /// The first/reset value for this part, resolved without validating an Enumerated part's
    /// `values` list. Cheap and infallible; the full membership checks happen in `bump::BumpFunction::from_spec`
    /// which is only invoked when a part is actually bumped.
    #[must_use]
    pub fn resolved_first_value(&self) -> String {
        self.first_value
            .clone()
            .or_else(|| self.values.first().cloned())
            .unwrap_or_else(|| "0".to_string())
    }

    /// The value that marks this part as elidable from a shorter serialization.
    #[must_use]
    pub fn resolved_optional_value(&self) -> String {
        self.optional_value
            .clone()
            .unwrap_or_else(|| self.resolved_first_value())
    }
}

/// Build one [`VersionComponentSpec`] per named capture group in the parse regex, in capture
/// order, falling back to a bare default (Numeric, dependent) for groups with no explicit
/// `[bumpversion:part:NAME]` section. Capture-group names starting with `$` are treated as
/// independent by default, matching the upstream convention for "sticky" build-metadata parts.
#[must_use]
pub fn version_component_configs(
    parse_version_pattern: &regex::Regex,
    declared: &VersionComponentConfigs,
) -> VersionComponentConfigs {
    parse_version_pattern
        .capture_names()
        .flatten()
        .map(|label| {
            let is_independent = label.starts_with('$');
            let mut spec = declared.get(label).cloned().unwrap_or_default();
            if spec.independent.is_none() {
                spec.independent = Some(is_independent);
            }
            (label.to_string(), spec)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_numeric_dependent_part() {
        let re = regex::Regex::new(r"(?P<major>\d+)\.(?P<minor>\d+)").unwrap();
        let configs = version_component_configs(&re, &IndexMap::new());
        assert_eq!(configs.keys().collect::<Vec<_>>(), vec!["major", "minor"]);
        assert_eq!(configs["major"].independent, Some(false));
    }

    #[test]
    fn explicit_independent_flag_overrides_default() {
        let re = regex::Regex::new(r"(?P<major>\d+)-(?P<build>[a-z]+)").unwrap();
        let mut declared = IndexMap::new();
        declared.insert(
            "build".to_string(),
            VersionComponentSpec {
                independent: Some(true),
                ..Default::default()
            },
        );
        let configs = version_component_configs(&re, &declared);
        assert_eq!(configs["build"].independent, Some(true));
        assert_eq!(configs["major"].independent, Some(false));
    }

    #[test]
    fn resolved_values_fall_back_through_first_value() {
        let spec = VersionComponentSpec {
            values: vec!["alpha".to_string(), "beta".to_string()],
            ..Default::default()
        };
        assert_eq!(spec.resolved_first_value(), "alpha");
        assert_eq!(spec.resolved_optional_value(), "alpha");
    }
}
