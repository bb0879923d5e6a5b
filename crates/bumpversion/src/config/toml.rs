//! Reads `pyproject.toml`'s `[tool.bumpversion]` table and `Cargo.toml`'s
//! `[package.metadata.bumpversion]` table, and rewrites `current_version` in place.
use super::{
    file::FileConfig, global::GlobalConfig, regex::RegexTemplate, Config, InputFile,
    VersionComponentSpec,
};
use crate::f_string::PythonFormatString;
use indexmap::IndexMap;
use std::path::{Path, PathBuf};
use toml_edit::{Item, Table, Value};

#[derive(thiserror::Error, Debug)]
pub enum ParseError {
    #[error(transparent)]
    Toml(#[from] toml_edit::TomlError),
    #[error("key {key:?} must be a {expected}")]
    UnexpectedType { key: String, expected: &'static str },
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
    #[error("file table must specify exactly one of `filename` or `glob`")]
    InvalidFileEntry,
}

fn as_str<'a>(key: &str, item: &'a Item) -> Result<&'a str, ParseError> {
    item.as_str().ok_or_else(|| ParseError::UnexpectedType {
        key: key.to_string(),
        expected: "string",
    })
}

fn as_string(key: &str, item: &Item) -> Result<String, ParseError> {
    as_str(key, item).map(ToString::to_string)
}

fn as_bool(key: &str, item: &Item) -> Result<bool, ParseError> {
    item.as_bool().ok_or_else(|| ParseError::UnexpectedType {
        key: key.to_string(),
        expected: "boolean",
    })
}

fn as_format_string(key: &str, item: &Item) -> Result<PythonFormatString, ParseError> {
    let s = as_str(key, item)?;
    PythonFormatString::parse(s).map_err(|source| ParseError::InvalidFormatString {
        key: key.to_string(),
        source,
    })
}

fn as_regex(key: &str, item: &Item) -> Result<super::Regex, ParseError> {
    let s = as_str(key, item)?;
    regex::Regex::new(s)
        .map(Into::into)
        .map_err(|source| ParseError::InvalidRegex {
            key: key.to_string(),
            source,
        })
}

fn as_string_array(key: &str, item: &Item) -> Result<Vec<String>, ParseError> {
    if let Some(s) = item.as_str() {
        return Ok(vec![s.to_string()]);
    }
    item.as_array()
        .ok_or_else(|| ParseError::UnexpectedType {
            key: key.to_string(),
            expected: "string or array of strings",
        })?
        .iter()
        .map(|v| {
            v.as_str()
                .map(ToString::to_string)
                .ok_or_else(|| ParseError::UnexpectedType {
                    key: key.to_string(),
                    expected: "array of strings",
                })
        })
        .collect()
}

fn parse_search(table: &Table, is_regex: Option<bool>) -> Result<Option<RegexTemplate>, ParseError> {
    let search_is_regex = table
        .get("regex")
        .map(|v| as_bool("regex", v))
        .transpose()?
        .or(is_regex);
    table
        .get("search")
        .map(|v| {
            let format_string = as_format_string("search", v)?;
            Ok(if search_is_regex == Some(true) {
                RegexTemplate::Regex(format_string)
            } else {
                RegexTemplate::Escaped(format_string)
            })
        })
        .transpose()
}

fn parse_global(table: &Table) -> Result<(Option<bool>, GlobalConfig), ParseError> {
    let search = parse_search(table, None)?;
    let is_regex = table.get("regex").map(|v| as_bool("regex", v)).transpose()?;
    Ok((
        is_regex,
        GlobalConfig {
            allow_dirty: table.get("allow_dirty").map(|v| as_bool("allow_dirty", v)).transpose()?,
            current_version: table.get("current_version").map(|v| as_string("current_version", v)).transpose()?,
            parse_version_pattern: table.get("parse").map(|v| as_regex("parse", v)).transpose()?,
            serialize_version_patterns: table
                .get("serialize")
                .map(|v| as_string_array("serialize", v))
                .transpose()?
                .map(|patterns| {
                    patterns
                        .iter()
                        .map(|p| as_format_string_literal("serialize", p))
                        .collect::<Result<Vec<_>, _>>()
                })
                .transpose()?,
            search,
            replace: table.get("replace").map(|v| as_string("replace", v)).transpose()?,
            no_configured_files: table
                .get("no_configured_files")
                .map(|v| as_bool("no_configured_files", v))
                .transpose()?,
            ignore_missing_files: table
                .get("ignore_missing_files")
                .map(|v| as_bool("ignore_missing_files", v))
                .transpose()?,
            ignore_missing_version: table
                .get("ignore_missing_version")
                .map(|v| as_bool("ignore_missing_version", v))
                .transpose()?,
            dry_run: table.get("dry_run").map(|v| as_bool("dry_run", v)).transpose()?,
            commit: table.get("commit").map(|v| as_bool("commit", v)).transpose()?,
            tag: table.get("tag").map(|v| as_bool("tag", v)).transpose()?,
            sign_tags: table
                .get("sign_tags")
                .or_else(|| table.get("sign_tag"))
                .map(|v| as_bool("sign_tags", v))
                .transpose()?,
            tag_name: table.get("tag_name").map(|v| as_format_string("tag_name", v)).transpose()?,
            tag_message: table
                .get("tag_message")
                .map(|v| as_format_string("tag_message", v))
                .transpose()?,
            commit_message: table
                .get("commit_message")
                .or_else(|| table.get("message"))
                .map(|v| as_format_string("commit_message", v))
                .transpose()?,
            commit_args: table.get("commit_args").map(|v| as_string("commit_args", v)).transpose()?,
            setup_hooks: table.get("setup_hooks").map(|v| as_string_array("setup_hooks", v)).transpose()?,
            pre_commit_hooks: table
                .get("pre_commit_hooks")
                .map(|v| as_string_array("pre_commit_hooks", v))
                .transpose()?,
            post_commit_hooks: table
                .get("post_commit_hooks")
                .map(|v| as_string_array("post_commit_hooks", v))
                .transpose()?,
            included_paths: table
                .get("included_paths")
                .map(|v| as_string_array("included_paths", v))
                .transpose()?
                .map(|v| v.into_iter().map(PathBuf::from).collect()),
            excluded_paths: table
                .get("excluded_paths")
                .map(|v| as_string_array("excluded_paths", v))
                .transpose()?
                .map(|v| v.into_iter().map(PathBuf::from).collect()),
            additional_files: None,
        },
    ))
}

fn as_format_string_literal(key: &str, value: &str) -> Result<PythonFormatString, ParseError> {
    PythonFormatString::parse(value).map_err(|source| ParseError::InvalidFormatString {
        key: key.to_string(),
        source,
    })
}

fn parse_file_config(table: &Table, search_is_regex: Option<bool>) -> Result<FileConfig, ParseError> {
    Ok(FileConfig {
        parse_version_pattern: table.get("parse").map(|v| as_regex("parse", v)).transpose()?,
        serialize_version_patterns: table
            .get("serialize")
            .map(|v| as_string_array("serialize", v))
            .transpose()?
            .map(|patterns| {
                patterns
                    .iter()
                    .map(|p| as_format_string_literal("serialize", p))
                    .collect::<Result<Vec<_>, _>>()
            })
            .transpose()?,
        search: parse_search(table, search_is_regex)?,
        replace: table.get("replace").map(|v| as_string("replace", v)).transpose()?,
        ignore_missing_file: table
            .get("ignore_missing_files")
            .or_else(|| table.get("ignore_missing_file"))
            .map(|v| as_bool("ignore_missing_file", v))
            .transpose()?,
        ignore_missing_version: table
            .get("ignore_missing_version")
            .map(|v| as_bool("ignore_missing_version", v))
            .transpose()?,
    })
}

fn parse_file_entry(item: &Item, search_is_regex: Option<bool>) -> Result<(InputFile, FileConfig), ParseError> {
    let table = item.as_table_like().ok_or_else(|| ParseError::UnexpectedType {
        key: "files".to_string(),
        expected: "table",
    })?;
    let filename = table.get("filename").map(|v| as_string("filename", v)).transpose()?;
    let glob = table.get("glob").map(|v| as_string("glob", v)).transpose()?;
    let input_file = match (filename, glob) {
        (Some(path), None) => InputFile::Path(PathBuf::from(path)),
        (None, Some(pattern)) => InputFile::glob(pattern),
        _ => return Err(ParseError::InvalidFileEntry),
    };
    // Build a `Table` view for the shared field-parsing helpers above.
    let mut owned = Table::new();
    for (k, v) in table.iter() {
        owned.insert(k, v.clone());
    }
    let file_config = parse_file_config(&owned, search_is_regex)?;
    Ok((input_file, file_config))
}

fn bumpversion_table<'a>(doc: &'a toml_edit::DocumentMut, root_path: &[&str]) -> Option<&'a Table> {
    let mut table = doc.as_table();
    for key in root_path {
        table = table.get(key).and_then(Item::as_table)?;
    }
    table.get("bumpversion").and_then(Item::as_table)
}

/// Parse a TOML document for a `[tool.bumpversion]` (pyproject.toml, `.bumpversion.toml` with
/// `root_path = ["tool"]`) or `[package.metadata.bumpversion]` (Cargo.toml, `root_path =
/// ["package", "metadata"]`) table.
///
/// # Errors
/// Returns `ParseError` if the document does not parse, or a `bumpversion` key has the wrong
/// shape (e.g. `current_version` is not a string).
pub fn parse(input: &str, root_path: &[&str]) -> Result<Option<Config>, ParseError> {
    let doc: toml_edit::DocumentMut = input.parse()?;
    let Some(table) = bumpversion_table(&doc, root_path) else {
        return Ok(None);
    };
    if table.is_empty() {
        return Ok(None);
    }

    let (is_regex, global) = parse_global(table)?;

    let files = match table.get("files") {
        None => Vec::new(),
        Some(item) => item
            .as_array_of_tables()
            .ok_or_else(|| ParseError::UnexpectedType {
                key: "files".to_string(),
                expected: "array of tables",
            })?
            .iter()
            .map(|entry| parse_file_entry(&Item::Table(entry.clone()), is_regex))
            .collect::<Result<Vec<_>, _>>()?,
    };

    let components = match table.get("parts") {
        None => IndexMap::new(),
        Some(item) => {
            let parts_table = item.as_table().ok_or_else(|| ParseError::UnexpectedType {
                key: "parts".to_string(),
                expected: "table",
            })?;
            parts_table
                .iter()
                .map(|(name, value)| {
                    let part_table = value.as_table().ok_or_else(|| ParseError::UnexpectedType {
                        key: name.to_string(),
                        expected: "table",
                    })?;
                    let independent = part_table
                        .get("independent")
                        .map(|v| as_bool("independent", v))
                        .transpose()?;
                    let optional_value = part_table
                        .get("optional_value")
                        .map(|v| as_string("optional_value", v))
                        .transpose()?;
                    let values = part_table
                        .get("values")
                        .map(|v| as_string_array("values", v))
                        .transpose()?
                        .unwrap_or_default();
                    Ok((
                        name.to_string(),
                        VersionComponentSpec {
                            independent,
                            optional_value,
                            values,
                            ..VersionComponentSpec::default()
                        },
                    ))
                })
                .collect::<Result<IndexMap<_, _>, ParseError>>()?
        }
    };

    Ok(Some(Config {
        global,
        files,
        components,
    }))
}

/// Rewrite the `current_version` key at `key_path` (e.g. `["tool", "bumpversion",
/// "current_version"]`) in place, preserving the rest of the document's formatting.
///
/// # Errors
/// Returns `ParseError` if the document does not parse.
pub fn replace_current_version(
    contents: &str,
    key_path: &[&str],
    new_version: &str,
) -> Result<Option<String>, ParseError> {
    let mut doc: toml_edit::DocumentMut = contents.parse()?;
    let mut item: &mut Item = doc.as_item_mut();
    for key in key_path {
        let Some(next) = item.get_mut(key) else {
            return Ok(None);
        };
        item = next;
    }
    let Some(Value::String(value)) = item.as_value_mut() else {
        return Ok(None);
    };
    *value = toml_edit::Formatted::new(new_version.to_string());
    Ok(Some(doc.to_string()))
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// Read `path`, rewrite its `current_version` key at `key_path`, and either write the result
/// back or (in `dry_run`) leave the file untouched. Returns `None` if the key path is absent.
///
/// # Errors
/// Returns `Error::Io` for read/write failures or `Error::Parse` if the document does not parse.
pub async fn replace_version(
    path: &Path,
    key_path: &[&str],
    new_version: &str,
    dry_run: bool,
) -> Result<Option<(String, String)>, Error> {
    let before = tokio::fs::read_to_string(path).await?;
    let Some(after) = replace_current_version(&before, key_path, new_version)? else {
        return Ok(None);
    };
    if !dry_run {
        tokio::fs::write(path, after.as_bytes()).await?;
    }
    Ok(Some((before, after)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tool_bumpversion_table() {
        let toml = "[tool.bumpversion]\ncurrent_version = \"1.2.3\"\ncommit = true\n";
        let config = parse(toml, &["tool"]).unwrap().unwrap();
        assert_eq!(config.global.current_version.as_deref(), Some("1.2.3"));
        assert_eq!(config.global.commit, Some(true));
    }

    #[test]
    fn parses_file_entries_and_parts() {
        let toml = r#"
[tool.bumpversion]
current_version = "1.0.0"

[[tool.bumpversion.files]]
filename = "CHANGELOG.md"
search = "Unreleased"

[tool.bumpversion.parts.release]
values = ["dev", "gamma"]
optional_value = "gamma"
"#;
        let config = parse(toml, &["tool"]).unwrap().unwrap();
        assert_eq!(config.files.len(), 1);
        assert_eq!(config.components["release"].values, vec!["dev", "gamma"]);
    }

    #[test]
    fn no_bumpversion_table_returns_none() {
        let toml = "[project]\nname = \"x\"\n";
        assert!(parse(toml, &["tool"]).unwrap().is_none());
    }

    #[test]
    fn reads_cargo_toml_metadata_table() {
        let toml = "[package]\nname = \"x\"\n\n[package.metadata.bumpversion]\ncurrent_version = \"0.1.0\"\n";
        let config = parse(toml, &["package", "metadata"]).unwrap().unwrap();
        assert_eq!(config.global.current_version.as_deref(), Some("0.1.0"));
    }

    #[test]
    fn replace_current_version_preserves_formatting() {
        let toml = "[tool.bumpversion]\ncurrent_version = \"1.2.3\" # pinned\n";
        let updated = replace_current_version(toml, &["tool", "bumpversion", "current_version"], "1.2.4")
            .unwrap()
            .unwrap();
        assert!(updated.contains("current_version = \"1.2.4\" # pinned"));
    }

    #[tokio::test]
    async fn replace_version_writes_file_unless_dry_run() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pyproject.toml");
        tokio::fs::write(&path, "[tool.bumpversion]\ncurrent_version = \"1.0.0\"\n")
            .await
            .unwrap();

        let key_path = ["tool", "bumpversion", "current_version"];
        replace_version(&path, &key_path, "1.0.1", true).await.unwrap();
        let unchanged = tokio::fs::read_to_string(&path).await.unwrap();
        assert!(unchanged.contains("1.0.0"));

        replace_version(&path, &key_path, "1.0.1", false).await.unwrap();
        let changed = tokio::fs::read_to_string(&path).await.unwrap();
        assert!(changed.contains("1.0.1"));
    }
}
