//! Reads `.bumpversion.cfg` / `setup.cfg`-style INI configuration.
//!
//! A small hand-rolled line scanner (section headers, `key = value` pairs, indented
//! continuation lines joined with `\n`, `;`/`#` comments) feeding the same
//! `bumpversion[:kind:name]` section grammar the TOML loader uses.
use super::{
    change::FileChange, file::FileConfig, global::GlobalConfig, regex::RegexTemplate, Config,
    InputFile, VersionComponentSpec,
};
use crate::f_string::PythonFormatString;
use indexmap::IndexMap;
use std::path::PathBuf;

#[derive(thiserror::Error, Debug)]
pub enum ParseError {
    #[error("line {line}: expected `[section]` or `key = value`, got {text:?}")]
    MalformedLine { line: usize, text: String },
    #[error("invalid format string in key {key:?}: {source}")]
    InvalidFormatString {
        key: String,
        #[source]
        source: crate::f_string::ParseError,
    },
    #[error("invalid regular expression in key {key:?}: {source}")]
    InvalidRegex {
        key: String,
        #[source]
        source: regex::Error,
    },
    #[error("key {key:?} is not a valid boolean: {value:?}")]
    InvalidBool { key: String, value: String },
}

/// One `[section]` with its `key = value` entries, in file order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Section {
    name: String,
    entries: IndexMap<String, String>,
}

fn scan(input: &str) -> Result<Vec<Section>, ParseError> {
    let mut sections: Vec<Section> = Vec::new();
    let mut last_key: Option<String> = None;

    for (lineno, raw_line) in input.lines().enumerate() {
        let trimmed = raw_line.trim_end();
        if trimmed.trim().is_empty() {
            continue;
        }
        if trimmed.trim_start().starts_with(';') || trimmed.trim_start().starts_with('#') {
            continue;
        }

        let is_continuation = raw_line.starts_with(' ') || raw_line.starts_with('\t');
        if is_continuation {
            if let (Some(section), Some(key)) = (sections.last_mut(), last_key.as_ref()) {
                if let Some(existing) = section.entries.get_mut(key) {
                    existing.push('\n');
                    existing.push_str(trimmed.trim());
                    continue;
                }
            }
            return Err(ParseError::MalformedLine {
                line: lineno + 1,
                text: raw_line.to_string(),
            });
        }

        let line = trimmed.trim();
        if let Some(name) = line.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
            sections.push(Section {
                name: name.trim().to_string(),
                entries: IndexMap::new(),
            });
            last_key = None;
            continue;
        }

        if let Some((key, value)) = line.split_once('=') {
            let key = key.trim().to_string();
            let value = value.trim().to_string();
            let Some(section) = sections.last_mut() else {
                return Err(ParseError::MalformedLine {
                    line: lineno + 1,
                    text: raw_line.to_string(),
                });
            };
            section.entries.insert(key.clone(), value);
            last_key = Some(key);
            continue;
        }

        return Err(ParseError::MalformedLine {
            line: lineno + 1,
            text: raw_line.to_string(),
        });
    }

    Ok(sections)
}

fn as_bool(key: &str, value: &str) -> Result<bool, ParseError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" | "on" => Ok(true),
        "false" | "no" | "0" | "off" => Ok(false),
        _ => Err(ParseError::InvalidBool {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

fn as_format_string(key: &str, value: &str) -> Result<PythonFormatString, ParseError> {
    PythonFormatString::parse(value).map_err(|source| ParseError::InvalidFormatString {
        key: key.to_string(),
        source,
    })
}

fn as_regex(key: &str, value: &str) -> Result<super::Regex, ParseError> {
    regex::Regex::new(value)
        .map(Into::into)
        .map_err(|source| ParseError::InvalidRegex {
            key: key.to_string(),
            source,
        })
}

fn as_string_array(value: &str, allow_single_value: bool) -> Vec<String> {
    if value.contains('\n') {
        value
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(ToString::to_string)
            .collect()
    } else if value.contains(',') {
        value
            .split(',')
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(ToString::to_string)
            .collect()
    } else if allow_single_value {
        vec![value.to_string()]
    } else {
        Vec::new()
    }
}

fn as_optional(value: &str) -> Option<&str> {
    if value == "None" {
        None
    } else {
        Some(value)
    }
}

fn parse_search(
    entries: &IndexMap<String, String>,
    is_regex: Option<bool>,
) -> Result<Option<RegexTemplate>, ParseError> {
    let search_is_regex = entries
        .get("regex")
        .and_then(|v| as_optional(v))
        .map(|v| as_bool("regex", v))
        .transpose()?
        .or(is_regex);
    entries
        .get("search")
        .and_then(|v| as_optional(v))
        .map(|value| {
            let format_string = as_format_string("search", value)?;
            Ok(if search_is_regex == Some(true) {
                RegexTemplate::Regex(format_string)
            } else {
                RegexTemplate::Escaped(format_string)
            })
        })
        .transpose()
}

fn parse_part_config(entries: &IndexMap<String, String>) -> Result<VersionComponentSpec, ParseError> {
    let independent = entries
        .get("independent")
        .map(|v| as_bool("independent", v))
        .transpose()?;
    let optional_value = entries
        .get("optional_value")
        .and_then(|v| as_optional(v))
        .map(ToString::to_string);
    let values = entries
        .get("values")
        .map(|v| as_string_array(v, false))
        .unwrap_or_default();
    Ok(VersionComponentSpec {
        independent,
        optional_value,
        values,
        ..VersionComponentSpec::default()
    })
}

fn parse_global(entries: &IndexMap<String, String>) -> Result<GlobalConfig, ParseError> {
    let search = parse_search(entries, None)?;
    Ok(GlobalConfig {
        allow_dirty: entries
            .get("allow_dirty")
            .map(|v| as_bool("allow_dirty", v))
            .transpose()?,
        current_version: entries.get("current_version").cloned(),
        parse_version_pattern: entries
            .get("parse")
            .map(|v| as_regex("parse", v))
            .transpose()?,
        serialize_version_patterns: entries
            .get("serialize")
            .map(|v| as_string_array(v, true))
            .map(|patterns| {
                patterns
                    .iter()
                    .map(|p| as_format_string("serialize", p))
                    .collect::<Result<Vec<_>, _>>()
            })
            .transpose()?,
        search,
        replace: entries.get("replace").cloned(),
        no_configured_files: entries
            .get("no_configured_files")
            .map(|v| as_bool("no_configured_files", v))
            .transpose()?,
        ignore_missing_files: entries
            .get("ignore_missing_files")
            .map(|v| as_bool("ignore_missing_files", v))
            .transpose()?,
        ignore_missing_version: entries
            .get("ignore_missing_version")
            .map(|v| as_bool("ignore_missing_version", v))
            .transpose()?,
        dry_run: entries
            .get("dry_run")
            .map(|v| as_bool("dry_run", v))
            .transpose()?,
        commit: entries.get("commit").map(|v| as_bool("commit", v)).transpose()?,
        tag: entries.get("tag").map(|v| as_bool("tag", v)).transpose()?,
        sign_tags: entries
            .get("sign_tags")
            .or_else(|| entries.get("sign_tag"))
            .map(|v| as_bool("sign_tags", v))
            .transpose()?,
        tag_name: entries
            .get("tag_name")
            .map(|v| as_format_string("tag_name", v))
            .transpose()?,
        tag_message: entries
            .get("tag_message")
            .map(|v| as_format_string("tag_message", v))
            .transpose()?,
        commit_message: entries
            .get("commit_message")
            .or_else(|| entries.get("message"))
            .map(|v| as_format_string("commit_message", v))
            .transpose()?,
        commit_args: entries.get("commit_args").cloned(),
        setup_hooks: entries.get("setup_hooks").map(|v| as_string_array(v, true)),
        pre_commit_hooks: entries
            .get("pre_commit_hooks")
            .map(|v| as_string_array(v, true)),
        post_commit_hooks: entries
            .get("post_commit_hooks")
            .map(|v| as_string_array(v, true)),
        included_paths: entries
            .get("included_paths")
            .map(|v| as_string_array(v, true))
            .map(|v| v.into_iter().map(PathBuf::from).collect()),
        excluded_paths: entries
            .get("excluded_paths")
            .map(|v| as_string_array(v, true))
            .map(|v| v.into_iter().map(PathBuf::from).collect()),
        additional_files: None,
    })
}

fn parse_file(
    entries: &IndexMap<String, String>,
    search_is_regex: Option<bool>,
) -> Result<FileConfig, ParseError> {
    Ok(FileConfig {
        parse_version_pattern: entries
            .get("parse")
            .map(|v| as_regex("parse", v))
            .transpose()?,
        serialize_version_patterns: entries
            .get("serialize")
            .map(|v| as_string_array(v, true))
            .map(|patterns| {
                patterns
                    .iter()
                    .map(|p| as_format_string("serialize", p))
                    .collect::<Result<Vec<_>, _>>()
            })
            .transpose()?,
        search: parse_search(entries, search_is_regex)?,
        replace: entries.get("replace").cloned(),
        ignore_missing_file: entries
            .get("ignore_missing_file")
            .or_else(|| entries.get("ignore_missing_files"))
            .map(|v| as_bool("ignore_missing_file", v))
            .transpose()?,
        ignore_missing_version: entries
            .get("ignore_missing_version")
            .map(|v| as_bool("ignore_missing_version", v))
            .transpose()?,
    })
}

/// Parse an INI document (`.bumpversion.cfg` or `setup.cfg`) into a [`Config`].
///
/// `allow_unknown` suppresses nothing here (unlike the spanned parser this replaces, there is
/// no diagnostics channel) but still controls whether non-`bumpversion` sections are skipped
/// silently, matching `setup.cfg`'s permissive parsing.
///
/// # Errors
/// Returns `ParseError` for malformed lines or invalid values inside `bumpversion` sections.
pub fn parse(input: &str, _allow_unknown: bool) -> Result<Option<Config>, ParseError> {
    let sections = scan(input)?;
    let mut out = Config::default();
    let mut found = false;
    let mut search_is_regex = None;

    for section in &sections {
        if !section.name.starts_with("bumpversion") {
            continue;
        }
        found = true;
        let parts: Vec<&str> = section.name.split(':').map(str::trim).collect();
        match parts.as_slice() {
            ["bumpversion"] => {
                out.global = parse_global(&section.entries)?;
                search_is_regex = out.global.search.as_ref().map(RegexTemplate::is_regex);
            }
            ["bumpversion", prefix, value] => {
                if prefix.starts_with("file") {
                    let config = parse_file(&section.entries, search_is_regex)?;
                    out.files.push((InputFile::Path(PathBuf::from(*value)), config));
                } else if prefix.starts_with("glob") {
                    let config = parse_file(&section.entries, search_is_regex)?;
                    out.files.push((InputFile::glob(*value), config));
                } else if prefix.starts_with("part") {
                    let config = parse_part_config(&section.entries)?;
                    out.components.insert((*value).to_string(), config);
                }
            }
            _ => {}
        }
    }

    Ok(found.then_some(out))
}

/// File-change view used when rewriting `setup.cfg`-style INI config, mirroring the
/// `FileChange` shape the main rewriter works with for ordinary tracked files.
#[must_use]
pub fn describe_section(file: &InputFile, _change: &FileChange) -> String {
    match file {
        InputFile::Path(path) => format!("bumpversion:file:{}", path.display()),
        InputFile::GlobPattern { pattern, .. } => format!("bumpversion:glob:{pattern}"),
    }
}

/// Rewrite the `current_version` entry inside the `[bumpversion]` section, preserving every
/// other line verbatim. Returns `None` if the file has no `[bumpversion]` section or no
/// `current_version` key.
///
/// # Errors
/// Returns `ParseError` if the file does not parse, or an I/O error if reading/writing fails.
pub async fn replace_version(
    path: &std::path::Path,
    new_version: &str,
    dry_run: bool,
) -> Result<Option<(String, String)>, Error> {
    let before = tokio::fs::read_to_string(path).await?;
    scan(&before)?;

    let mut in_bumpversion_section = false;
    let mut changed = false;
    let mut after = String::with_capacity(before.len());
    for line in before.split_inclusive('\n') {
        let trimmed = line.trim();
        if let Some(name) = trimmed.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
            in_bumpversion_section = name.trim() == "bumpversion";
            after.push_str(line);
            continue;
        }
        if in_bumpversion_section {
            if let Some((key, _)) = trimmed.split_once('=') {
                if key.trim() == "current_version" {
                    let ending = if line.ends_with("\r\n") { "\r\n" } else if line.ends_with('\n') { "\n" } else { "" };
                    after.push_str(&format!("current_version = {new_version}{ending}"));
                    changed = true;
                    continue;
                }
            }
        }
        after.push_str(line);
    }

    if !changed {
        return Ok(None);
    }
    if !dry_run {
        tokio::fs::write(path, after.as_bytes()).await?;
    }
    Ok(Some((before, after)))
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Parse(#[from] ParseError),
}
