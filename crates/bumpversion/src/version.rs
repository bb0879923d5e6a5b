//! Version values, bump functions, the bump algebra, and the serialization chooser.
use crate::config::version::VersionComponentSpec;
use crate::f_string::PythonFormatString;
use indexmap::IndexMap;
use std::collections::{HashMap, HashSet};

/// The Numeric bump function: increments the first maximal digit run in a value,
/// preserving any non-digit prefix and suffix.
pub mod numeric {
    use once_cell::sync::Lazy;
    use regex::Regex;

    static FIRST_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").expect("valid regex"));

    #[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
    pub enum Error {
        #[error("first value {0:?} does not contain any digits")]
        InvalidFirstValue(String),
        #[error("value {0:?} does not contain any digits to bump")]
        MissingDigit(String),
        #[error("digit run in {0:?} overflowed")]
        Overflow(String),
    }

    #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub struct NumericFunction {
        pub first_value: String,
        pub optional_value: String,
    }

    impl NumericFunction {
        /// # Errors
        /// Returns [`Error::InvalidFirstValue`] if `first_value` contains no digits.
        pub fn new(first_value: String, optional_value: String) -> Result<Self, Error> {
            if !FIRST_NUMBER.is_match(&first_value) {
                return Err(Error::InvalidFirstValue(first_value));
            }
            Ok(Self {
                first_value,
                optional_value,
            })
        }

        /// # Errors
        /// Returns [`Error::MissingDigit`] if `value` has no digit run, or
        /// [`Error::Overflow`] if incrementing would overflow a `u64`.
        pub fn bump(&self, value: &str) -> Result<String, Error> {
            let m = FIRST_NUMBER
                .find(value)
                .ok_or_else(|| Error::MissingDigit(value.to_string()))?;
            let number: u64 = m
                .as_str()
                .parse()
                .map_err(|_| Error::MissingDigit(value.to_string()))?;
            let bumped = number
                .checked_add(1)
                .ok_or_else(|| Error::Overflow(value.to_string()))?;
            Ok(format!("{}{}{}", &value[..m.start()], bumped, &value[m.end()..]))
        }
    }
}

/// The Enumerated bump function: cycles through an ordered list of string values.
pub mod enumerated {
    #[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
    pub enum Error {
        #[error("no values configured for this part")]
        EmptyValues,
        #[error("first value {0:?} is not one of the configured values")]
        InvalidFirstValue(String),
        #[error("optional value {0:?} is not one of the configured values")]
        InvalidOptionalValue(String),
        #[error("value {0:?} is not one of the configured values")]
        UnknownValue(String),
        #[error("cannot bump past the terminal value {0:?}")]
        TerminalValue(String),
    }

    #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub struct EnumeratedFunction {
        pub values: Vec<String>,
        pub first_value: String,
        pub optional_value: String,
    }

    impl EnumeratedFunction {
        /// # Errors
        /// Returns an error if `values` is empty, or if `first_value`/`optional_value` are not
        /// members of `values`.
        pub fn new(
            values: Vec<String>,
            first_value: String,
            optional_value: String,
        ) -> Result<Self, Error> {
            if values.is_empty() {
                return Err(Error::EmptyValues);
            }
            if !values.contains(&first_value) {
                return Err(Error::InvalidFirstValue(first_value));
            }
            if !values.contains(&optional_value) {
                return Err(Error::InvalidOptionalValue(optional_value));
            }
            Ok(Self {
                values,
                first_value,
                optional_value,
            })
        }

        /// # Errors
        /// Returns [`Error::UnknownValue`] if `value` is not configured, or
        /// [`Error::TerminalValue`] if `value` is the last element.
        pub fn bump(&self, value: &str) -> Result<String, Error> {
            let index = self
                .values
                .iter()
                .position(|v| v == value)
                .ok_or_else(|| Error::UnknownValue(value.to_string()))?;
            self.values
                .get(index + 1)
                .cloned()
                .ok_or_else(|| Error::TerminalValue(value.to_string()))
        }
    }
}

/// Errors raised while bumping a [`Version`] or a single [`Component`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum BumpError {
    #[error(transparent)]
    Numeric(#[from] numeric::Error),
    #[error(transparent)]
    Enumerated(#[from] enumerated::Error),
    #[error("unknown version part {0:?}")]
    UnknownPart(String),
}

enum BumpFunction {
    Numeric(numeric::NumericFunction),
    Enumerated(enumerated::EnumeratedFunction),
}

impl BumpFunction {
    fn from_spec(spec: &VersionComponentSpec) -> Result<Self, BumpError> {
        if spec.values.is_empty() {
            Ok(Self::Numeric(numeric::NumericFunction::new(
                spec.resolved_first_value(),
                spec.resolved_optional_value(),
            )?))
        } else {
            Ok(Self::Enumerated(enumerated::EnumeratedFunction::new(
                spec.values.clone(),
                spec.resolved_first_value(),
                spec.resolved_optional_value(),
            )?))
        }
    }

    fn bump(&self, value: &str) -> Result<String, BumpError> {
        match self {
            Self::Numeric(f) => Ok(f.bump(value)?),
            Self::Enumerated(f) => Ok(f.bump(value)?),
        }
    }
}

/// One named part of a [`Version`], carrying its own schema so it can bump and report
/// optionality without a global lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Component {
    value: Option<String>,
    spec: VersionComponentSpec,
    first_value: String,
    optional_value: String,
}

impl Component {
    #[must_use]
    pub fn new(value: Option<String>, spec: VersionComponentSpec) -> Self {
        let first_value = spec.resolved_first_value();
        let optional_value = spec.resolved_optional_value();
        Self {
            value,
            spec,
            first_value,
            optional_value,
        }
    }

    #[must_use]
    pub fn spec(&self) -> &VersionComponentSpec {
        &self.spec
    }

    /// A falsy (missing or explicitly `false`) `independent` config value means "dependent".
    #[must_use]
    pub fn is_independent(&self) -> bool {
        self.spec.independent.unwrap_or(false)
    }

    #[must_use]
    pub fn first(&self) -> &str {
        &self.first_value
    }

    /// The value of this part, falling back to its `optional_value` when absent.
    #[must_use]
    pub fn value(&self) -> Option<&str> {
        Some(self.value.as_deref().unwrap_or(&self.optional_value))
    }

    /// Whether this part currently carries its optional (elidable) value.
    #[must_use]
    pub fn is_optional(&self) -> bool {
        self.value() == Some(self.optional_value.as_str())
    }

    /// # Errors
    /// Returns a configuration error if this part's schema is invalid, an unknown-value error
    /// if the current value is not a member of an Enumerated part's list, or a terminal-value
    /// error if the current value is the last element of that list.
    pub fn bump(&self) -> Result<Self, BumpError> {
        let bump_fn = BumpFunction::from_spec(&self.spec)?;
        let current = self.value.as_deref().unwrap_or(&self.optional_value);
        let bumped = bump_fn.bump(current)?;
        Ok(Self {
            value: Some(bumped),
            ..self.clone()
        })
    }

    #[must_use]
    pub fn reset(&self) -> Self {
        Self {
            value: Some(self.first_value.clone()),
            ..self.clone()
        }
    }
}

/// The schema for a whole version: one [`VersionComponentSpec`] per named part, in
/// capture-group order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionSpec {
    components: IndexMap<String, VersionComponentSpec>,
    dependents: HashMap<String, Vec<String>>,
    always_increment: Vec<String>,
}

impl VersionSpec {
    #[must_use]
    pub fn from_components(components: IndexMap<String, VersionComponentSpec>) -> Self {
        let mut dependents: HashMap<String, Vec<String>> = HashMap::new();
        let mut always_increment = Vec::new();
        for (name, spec) in &components {
            if let Some(dep) = &spec.depends_on {
                dependents.entry(dep.clone()).or_default().push(name.clone());
            }
            if spec.always_increment {
                always_increment.push(name.clone());
            }
        }
        Self {
            components,
            dependents,
            always_increment,
        }
    }

    /// Parts that depend on `name`, i.e. declared `depends_on = "name"`.
    #[must_use]
    pub fn dependents(&self, name: &str) -> &[String] {
        self.dependents
            .get(name)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Part names in schema (capture-group) order.
    pub fn component_names(&self) -> impl Iterator<Item = &str> {
        self.components.keys().map(String::as_str)
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&VersionComponentSpec> {
        self.components.get(name)
    }

    /// Build a [`Version`] directly from raw string values (used when there is no single
    /// source string to parse, e.g. constructing a version for tests or `--current-version`
    /// combined with explicit `--serialize`-only parts).
    #[must_use]
    pub fn build(&self, raw: &HashMap<&str, &str>) -> Version {
        let parts = self
            .components
            .iter()
            .map(|(name, spec)| {
                let value = raw.get(name.as_str()).map(|v| (*v).to_string());
                (name.clone(), Component::new(value, spec.clone()))
            })
            .collect();
        Version {
            parts,
            spec: self.clone(),
            original: None,
        }
    }
}

/// A parsed version: an ordered mapping from part-name to part-value, plus the literal string
/// it was parsed from (used by the file rewriter as a fallback search target).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Version {
    parts: IndexMap<String, Component>,
    spec: VersionSpec,
    original: Option<String>,
}

impl Version {
    /// Search `value` with `regex` and build a `Version` from the named captures found,
    /// according to `spec`. Returns `None` if `regex` does not match `value` anywhere
    /// (an "unparsed" sentinel per the parsing contract: this is not fatal on its own).
    #[must_use]
    pub fn parse(value: &str, regex: &regex::Regex, spec: &VersionSpec) -> Option<Self> {
        let captures = regex.captures(value)?;
        let parts = spec
            .components
            .iter()
            .map(|(name, component_spec)| {
                let raw = captures.name(name).map(|m| m.as_str().to_string());
                (name.clone(), Component::new(raw, component_spec.clone()))
            })
            .collect();
        Some(Self {
            parts,
            spec: spec.clone(),
            original: Some(value.to_string()),
        })
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Component> {
        self.parts.get(name)
    }

    pub fn iter(&self) -> indexmap::map::Iter<'_, String, Component> {
        self.parts.iter()
    }

    /// The literal string this version was parsed from, if any.
    #[must_use]
    pub fn original(&self) -> Option<&str> {
        self.original.as_deref()
    }

    /// Part names whose value must appear in a serialization template for it to be
    /// "complete": the longest prefix (in schema order) that includes every non-optional part.
    #[must_use]
    pub fn required_component_names(&self) -> Vec<&str> {
        let names: Vec<&str> = self.parts.keys().map(String::as_str).collect();
        let last_non_optional = self
            .parts
            .values()
            .enumerate()
            .filter(|(_, component)| !component.is_optional())
            .map(|(i, _)| i)
            .max();
        match last_non_optional {
            Some(idx) => names[..=idx].to_vec(),
            None => Vec::new(),
        }
    }

    /// Increment `part_name` and reset every dependent part per the bump algebra (§4.B/§4.E):
    /// parts ordered before (or equal to) `part_name` in `ordering`, and any `independent`
    /// part, are left unchanged; every other part resets to its `first_value`.
    ///
    /// Parts configured with `always_increment` are additionally bumped once, independent of
    /// the reset cascade, matching the config schema carried over from the source tool.
    ///
    /// # Errors
    /// Returns [`BumpError::UnknownPart`] if `part_name` is not a part of this version, or
    /// propagates the bump function's own error (terminal-value, invalid configuration).
    pub fn bump(&self, part_name: &str, ordering: &[String]) -> Result<Self, BumpError> {
        if !self.parts.contains_key(part_name) {
            return Err(BumpError::UnknownPart(part_name.to_string()));
        }

        let mut bumped = false;
        let mut new_parts = IndexMap::new();
        for name in ordering {
            let Some(component) = self.parts.get(name) else {
                continue;
            };
            let new_component = if name == part_name {
                let next = component.bump()?;
                bumped = true;
                next
            } else if bumped && !component.is_independent() {
                component.reset()
            } else {
                component.clone()
            };
            new_parts.insert(name.clone(), new_component);
        }
        // Defensive: carry over any part present in the schema but absent from `ordering`.
        for (name, component) in &self.parts {
            new_parts.entry(name.clone()).or_insert_with(|| component.clone());
        }

        let mut result = Self {
            parts: new_parts,
            spec: self.spec.clone(),
            original: None,
        };
        for name in self.spec.always_increment.clone() {
            if name == part_name {
                continue;
            }
            if let Some(component) = result.parts.get(&name) {
                let bumped_component = component.bump()?;
                result.parts.insert(name, bumped_component);
            }
        }
        Ok(result)
    }

    /// Choose the shortest serialization template that can represent every currently
    /// non-optional part, per §4.D. `context` supplies any extra template keys (environment
    /// variables, `current_version`, timestamps, ...); this version's own part values are
    /// merged on top.
    ///
    /// # Errors
    /// Returns [`SerializeError::MissingValue`] if every template references a key that is
    /// entirely absent from the merged context.
    pub fn serialize(
        &self,
        templates: &[PythonFormatString],
        context: &HashMap<String, String>,
    ) -> Result<String, SerializeError> {
        let required = self.required_component_names();

        let mut values = context.clone();
        for (name, component) in &self.parts {
            if let Some(v) = component.value() {
                values.insert(name.clone(), v.to_string());
            }
        }

        let mut best_complete: Option<(usize, String)> = None;
        let mut first_renderable: Option<String> = None;
        let mut last_missing: Option<crate::f_string::MissingArgumentError> = None;

        for template in templates {
            match template.format(&values, true) {
                Err(err) => last_missing = Some(err),
                Ok(rendered) => {
                    if first_renderable.is_none() {
                        first_renderable = Some(rendered.clone());
                    }
                    let labels: HashSet<&str> = template.named_arguments().collect();
                    let is_complete = required.iter().all(|r| labels.contains(r));
                    if is_complete {
                        let num_labels = labels.len();
                        let better = best_complete
                            .as_ref()
                            .map_or(true, |(best, _)| num_labels < *best);
                        if better {
                            best_complete = Some((num_labels, rendered));
                        }
                    }
                }
            }
        }

        if let Some((_, rendered)) = best_complete {
            return Ok(rendered);
        }
        // Open question (preserved, see SPEC_FULL.md §9): when every template is incomplete,
        // pick the first one tried rather than erroring.
        if let Some(rendered) = first_renderable {
            return Ok(rendered);
        }
        Err(last_missing
            .map(|e| SerializeError::MissingValue(e.to_string()))
            .unwrap_or(SerializeError::NoTemplates))
    }
}

impl IntoIterator for Version {
    type Item = (String, Component);
    type IntoIter = indexmap::map::IntoIter<String, Component>;

    fn into_iter(self) -> Self::IntoIter {
        self.parts.into_iter()
    }
}

/// Errors raised by the serialization chooser.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SerializeError {
    #[error("missing value: {0}")]
    MissingValue(String),
    #[error("no serialization template configured")]
    NoTemplates,
}

/// Free-function form of [`Version::serialize`], grouped here for callers that prefer to reach
/// for a function rather than a method (matches how the spec frames the chooser as a standalone
/// component).
///
/// # Errors
/// See [`Version::serialize`].
pub fn serialize_version(
    version: &Version,
    templates: &[PythonFormatString],
    context: &HashMap<String, String>,
) -> Result<String, SerializeError> {
    version.serialize(templates, context)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn semver_spec() -> VersionSpec {
        let mut components = IndexMap::new();
        components.insert("major".to_string(), VersionComponentSpec::default());
        components.insert("minor".to_string(), VersionComponentSpec::default());
        components.insert("patch".to_string(), VersionComponentSpec::default());
        VersionSpec::from_components(components)
    }

    #[test]
    fn numeric_bump_preserves_prefix_and_suffix() {
        let f = numeric::NumericFunction::new("0".to_string(), "0".to_string()).unwrap();
        assert_eq!(f.bump("r3-001").unwrap(), "r4-001");
    }

    #[test]
    fn numeric_bump_first_value() {
        let spec = VersionComponentSpec::default();
        let component = Component::new(None, spec);
        assert_eq!(component.first(), "0");
        let bumped = component.bump().unwrap();
        assert_eq!(bumped.value(), Some("1"));
    }

    #[test]
    fn values_bump_cycles_and_errors_at_terminal_value() {
        let spec = VersionComponentSpec {
            values: vec!["alpha".to_string(), "beta".to_string(), "gamma".to_string()],
            ..Default::default()
        };
        let component = Component::new(Some("alpha".to_string()), spec);
        let beta = component.bump().unwrap();
        assert_eq!(beta.value(), Some("beta"));
        let gamma = beta.bump().unwrap();
        assert_eq!(gamma.value(), Some("gamma"));
        assert!(gamma.bump().is_err());
    }

    #[test]
    fn values_optional_value_defaults_missing_value() {
        let spec = VersionComponentSpec {
            values: vec!["alpha".to_string(), "beta".to_string(), "gamma".to_string()],
            optional_value: Some("gamma".to_string()),
            ..Default::default()
        };
        let missing = Component::new(None, spec.clone());
        assert_eq!(missing.value(), Some("gamma"));
        assert!(missing.bump().is_err(), "bumping the optional (terminal) value must fail");

        let explicit = Component::new(Some("alpha".to_string()), spec);
        assert_eq!(explicit.bump().unwrap().value(), Some("beta"));
    }

    #[test]
    fn reset_to_first_value_numeric() {
        let component = Component::new(Some("5".to_string()), VersionComponentSpec::default());
        assert_eq!(component.reset().value(), Some("0"));
    }

    #[test]
    fn reset_to_first_value_enumerated() {
        let spec = VersionComponentSpec {
            values: vec!["dev".to_string(), "rc".to_string(), "final".to_string()],
            ..Default::default()
        };
        let component = Component::new(Some("final".to_string()), spec);
        assert_eq!(component.reset().value(), Some("dev"));
    }

    #[test]
    fn parse_version_empty() {
        let spec = semver_spec();
        let regex = regex::Regex::new(r"(?P<major>\d+)\.(?P<minor>\d+)\.(?P<patch>\d+)").unwrap();
        assert!(Version::parse("", &regex, &spec).is_none());
    }

    #[test]
    fn parse_version_semver() {
        let spec = semver_spec();
        let regex = regex::Regex::new(r"(?P<major>\d+)\.(?P<minor>\d+)\.(?P<patch>\d+)").unwrap();
        let version = Version::parse("1.2.3", &regex, &spec).unwrap();
        assert_eq!(version.get("major").unwrap().value(), Some("1"));
        assert_eq!(version.get("minor").unwrap().value(), Some("2"));
        assert_eq!(version.get("patch").unwrap().value(), Some("3"));
    }

    #[test]
    fn bump_algebra_resets_trailing_dependent_parts() {
        let spec = semver_spec();
        let mut raw = HashMap::new();
        raw.insert("major", "1");
        raw.insert("minor", "2");
        raw.insert("patch", "3");
        let version = spec.build(&raw);
        let ordering: Vec<String> = spec.component_names().map(str::to_string).collect();
        let bumped = version.bump("minor", &ordering).unwrap();
        assert_eq!(bumped.get("major").unwrap().value(), Some("1"));
        assert_eq!(bumped.get("minor").unwrap().value(), Some("3"));
        assert_eq!(bumped.get("patch").unwrap().value(), Some("0"));
    }

    #[test]
    fn bump_algebra_never_resets_independent_parts() {
        let mut components = IndexMap::new();
        components.insert("major".to_string(), VersionComponentSpec::default());
        components.insert("minor".to_string(), VersionComponentSpec::default());
        components.insert(
            "build".to_string(),
            VersionComponentSpec {
                independent: Some(true),
                ..Default::default()
            },
        );
        let spec = VersionSpec::from_components(components);
        let mut raw = HashMap::new();
        raw.insert("major", "2");
        raw.insert("minor", "1");
        raw.insert("build", "5123");
        let version = spec.build(&raw);
        let ordering: Vec<String> = spec.component_names().map(str::to_string).collect();
        let bumped = version.bump("major", &ordering).unwrap();
        assert_eq!(bumped.get("major").unwrap().value(), Some("3"));
        assert_eq!(bumped.get("minor").unwrap().value(), Some("0"));
        assert_eq!(bumped.get("build").unwrap().value(), Some("5123"));
    }

    #[test]
    fn bump_unknown_part_errors() {
        let spec = semver_spec();
        let version = spec.build(&HashMap::new());
        let ordering: Vec<String> = spec.component_names().map(str::to_string).collect();
        assert!(matches!(
            version.bump("nonexistent", &ordering),
            Err(BumpError::UnknownPart(_))
        ));
    }

    #[test]
    fn serialize_format_selection_picks_full_template() {
        let spec = semver_spec();
        let mut raw = HashMap::new();
        raw.insert("major", "1");
        raw.insert("minor", "2");
        raw.insert("patch", "3");
        let version = spec.build(&raw);
        let patterns: Vec<PythonFormatString> = vec![
            "{major}.{minor}.{patch}".parse().unwrap(),
            "{major}.{minor}".parse().unwrap(),
            "{major}".parse().unwrap(),
        ];
        let ctx = HashMap::new();
        assert_eq!(version.serialize(&patterns, &ctx).unwrap(), "1.2.3");
    }

    #[test]
    fn serialize_format_selection_prefers_shorter_when_patch_is_optional() {
        let spec = semver_spec();
        let mut raw = HashMap::new();
        raw.insert("major", "1");
        raw.insert("minor", "2");
        raw.insert("patch", "0");
        let version = spec.build(&raw);
        let patterns: Vec<PythonFormatString> = vec![
            "{major}.{minor}.{patch}".parse().unwrap(),
            "{major}.{minor}".parse().unwrap(),
            "{major}".parse().unwrap(),
        ];
        let ctx = HashMap::new();
        assert_eq!(version.serialize(&patterns, &ctx).unwrap(), "1.2");
    }

    #[test]
    fn serialize_format_selection_shortest() {
        let spec = semver_spec();
        let mut raw = HashMap::new();
        raw.insert("major", "1");
        raw.insert("minor", "0");
        raw.insert("patch", "0");
        let version = spec.build(&raw);
        let patterns: Vec<PythonFormatString> = vec![
            "{major}.{minor}.{patch}".parse().unwrap(),
            "{major}.{minor}".parse().unwrap(),
            "{major}".parse().unwrap(),
        ];
        let ctx = HashMap::new();
        assert_eq!(version.serialize(&patterns, &ctx).unwrap(), "1");
    }

    #[test]
    fn serialize_preserves_newlines() {
        let spec = semver_spec();
        let mut raw = HashMap::new();
        raw.insert("major", "31");
        raw.insert("minor", "0");
        raw.insert("patch", "3");
        let version = spec.build(&raw);
        let patterns = vec![PythonFormatString::parse("MAJOR={major}\nMINOR={minor}\nPATCH={patch}\n").unwrap()];
        let ctx = HashMap::new();
        assert_eq!(
            version.serialize(&patterns, &ctx).unwrap(),
            "MAJOR=31\nMINOR=0\nPATCH=3\n"
        );
    }
}
