//! Locates the files a bump should touch and rewrites their contents.
use crate::{
    config::{Config, FileChange, InputFile, VersionComponentConfigs},
    f_string::PythonFormatString,
    version::Version,
};
use color_eyre::eyre::{self, Context};
use indexmap::IndexMap;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

/// Does `search_pattern` match anywhere in `contents`? Matching is multi-line: a pattern may
/// span several lines of a file, so callers build `search_pattern` with `(?m)`/`multi_line`.
fn contains_pattern(contents: &str, search_pattern: &regex::Regex) -> bool {
    let Some(m) = search_pattern.captures_iter(contents).next() else {
        return false;
    };
    let Some(m) = m.iter().next().flatten() else {
        return false;
    };
    let line_num = contents[..m.start()].chars().filter(|c| *c == '\n').count() + 1;
    tracing::info!(
        pattern = search_pattern.as_str(),
        line_num,
        matched = m.as_str(),
        "found search pattern"
    );
    true
}

/// Does `contents` already contain the rendered `current_version`, under either the file's own
/// search template or (failing that) the literal originally-parsed version string?
///
/// The fallback against `version.original` only applies when the file change still uses the
/// unmodified default search template — a file with its own custom `search` is assumed to know
/// what it's looking for, and a silent fallback there would risk matching the wrong thing.
fn should_contain_version(
    contents: &str,
    change: &FileChange,
    search_regex: &regex::Regex,
    current_version: &Version,
) -> eyre::Result<bool> {
    if contains_pattern(contents, search_regex) {
        return Ok(true);
    }

    let Some(original) = current_version.original() else {
        return Ok(false);
    };
    let uses_default_search = change.search.is_escaped()
        && change.search.as_ref().to_string() == "{current_version}";
    if !uses_default_search {
        return Ok(false);
    }

    let literal = regex::RegexBuilder::new(&regex::escape(original))
        .multi_line(true)
        .build()?;
    Ok(contains_pattern(contents, &literal))
}

/// `pyproject.toml`'s `version = "..."` assignment is special-cased: the search pattern is
/// anchored to the start of a `version = ` line and must sit inside matching quotes, rather than
/// matched anywhere in the file — otherwise a dependency pinned at the same version string would
/// get corrupted too. The `regex` crate has no backreferences, so the opening/closing quote can't
/// be expressed as a single pattern the way the original `(?P=quote)` does; each quote character
/// is tried in turn instead.
fn replace_pyproject_assignment(contents: &str, search_expr: &str, replacement: &str) -> eyre::Result<Option<String>> {
    for quote in ['"', '\''] {
        let pattern = regex::RegexBuilder::new(&format!(
            r"^(version\s*=\s*){q}{search_expr}{q}",
            q = regex::escape(&quote.to_string()),
        ))
        .multi_line(true)
        .build()?;
        if pattern.is_match(contents) {
            let replaced = pattern.replace_all(contents, |caps: &regex::Captures| format!("{}{quote}{replacement}{quote}", &caps[1]));
            return Ok(Some(replaced.into_owned()));
        }
    }
    Ok(None)
}

/// Apply every configured change to `before`, returning the rewritten contents.
///
/// # Errors
/// Returns an error if a template fails to render, or (unless `ignore_missing_version` is set on
/// the offending change) if a change's search pattern is not found anywhere in `before`.
pub fn replace_version<K, V>(
    path: &Path,
    before: &str,
    changes: &[FileChange],
    current_version: &Version,
    new_version: &Version,
    ctx: &HashMap<K, V>,
) -> eyre::Result<String>
where
    K: std::borrow::Borrow<str> + std::hash::Hash + Eq + std::fmt::Debug,
    V: AsRef<str> + std::fmt::Debug,
{
    let is_pyproject = path.file_name().and_then(|name| name.to_str()) == Some("pyproject.toml");
    let mut after = before.to_string();
    for change in changes {
        let current_version_serialized =
            current_version.serialize(&change.serialize_version_patterns, ctx)?;
        let new_version_serialized = new_version.serialize(&change.serialize_version_patterns, ctx)?;

        let merged_ctx: HashMap<&str, &str> = ctx
            .iter()
            .map(|(k, v)| (k.borrow(), v.as_ref()))
            .chain([
                ("current_version", current_version_serialized.as_str()),
                ("new_version", new_version_serialized.as_str()),
            ])
            .collect();

        let search_regex = change.search.format(&merged_ctx, true)?;
        let replace = PythonFormatString::parse(&change.replace)?;
        let replacement = replace
            .format(&merged_ctx, true)
            .wrap_err_with(|| eyre::eyre!("invalid replace format string"))?;

        if !should_contain_version(&after, change, &search_regex, current_version)? {
            if change.ignore_missing_version {
                tracing::warn!(pattern = search_regex.as_str(), "did not find search pattern");
                continue;
            }
            eyre::bail!("did not find {:?} in file contents", search_regex.as_str());
        }

        let pyproject_replaced = if is_pyproject {
            replace_pyproject_assignment(&after, search_regex.as_str(), replacement.as_str())?
        } else {
            None
        };
        let mut replaced = match pyproject_replaced {
            Some(replaced) => replaced,
            None => search_regex.replace_all(&after, replacement.as_str()).to_string(),
        };

        if replaced == after {
            if let Some(original) = current_version.original() {
                replaced = replaced.replace(original, replacement.as_str());
            }
        }
        after = replaced;
    }
    Ok(after)
}

/// Read `path` and apply `changes`, returning `(before, after)` without writing anything back.
/// Callers should run this across every configured file before writing any of them, so a later
/// file failing verification never leaves an earlier file already modified on disk.
///
/// # Errors
/// Returns an error if the file is missing and some change does not ignore a missing file, if a
/// template fails to render, or if a change's search pattern isn't found and isn't ignored.
pub async fn read_and_verify_file<K, V>(
    path: &Path,
    changes: &[FileChange],
    current_version: &Version,
    new_version: &Version,
    ctx: &HashMap<K, V>,
) -> eyre::Result<Option<(String, String)>>
where
    K: std::borrow::Borrow<str> + std::hash::Hash + Eq + std::fmt::Debug,
    V: AsRef<str> + std::fmt::Debug,
{
    if !tokio::fs::try_exists(path).await.unwrap_or(false) {
        if changes.iter().all(|change| change.ignore_missing_file) {
            tracing::info!(?path, "file not found");
            return Ok(None);
        }
        eyre::bail!("file not found {:?}", path);
    }

    let before = tokio::fs::read_to_string(path).await?;
    let after = replace_version(path, &before, changes, current_version, new_version, ctx)?;
    if before == after {
        tracing::warn!(?path, "no change after version replacement");
    }
    Ok(Some((before, after)))
}

/// Write `after` to `path` if it differs from `before`, unless `dry_run`.
///
/// # Errors
/// Returns an error if writing the file fails.
pub async fn write_file_change(path: &Path, before: &str, after: &str, dry_run: bool) -> eyre::Result<()> {
    if before == after || dry_run {
        return Ok(());
    }
    tokio::fs::write(path, after.as_bytes()).await?;
    Ok(())
}

#[derive(thiserror::Error, Debug)]
pub enum GlobError {
    #[error(transparent)]
    Pattern(#[from] glob::PatternError),
    #[error(transparent)]
    Glob(#[from] glob::GlobError),
}

#[derive(thiserror::Error, Debug)]
#[error("io error for {path:?}")]
pub struct IoError {
    #[source]
    source: std::io::Error,
    path: PathBuf,
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Glob(#[from] GlobError),
    #[error(transparent)]
    Io(#[from] IoError),
}

fn resolve_glob_files(pattern: &str, exclude_patterns: &[String]) -> Result<Vec<PathBuf>, GlobError> {
    let options = glob::MatchOptions {
        case_sensitive: false,
        require_literal_separator: false,
        require_literal_leading_dot: false,
    };
    let included: HashSet<PathBuf> = glob::glob_with(pattern, options)?.collect::<Result<_, _>>()?;

    let excluded: HashSet<PathBuf> = exclude_patterns
        .iter()
        .map(|pattern| glob::glob_with(pattern, options))
        .collect::<Result<Vec<_>, _>>()?
        .into_iter()
        .flatten()
        .collect::<Result<_, _>>()?;

    Ok(included.difference(&excluded).cloned().collect())
}

pub type FileMap = IndexMap<PathBuf, Vec<FileChange>>;

/// Expand every configured file (literal path or glob) into a map of absolute path to the list
/// of changes that apply to it.
///
/// # Errors
/// Returns an error if a glob pattern fails to compile or a non-absolute path fails to
/// canonicalize against `base_dir`.
pub fn resolve_files_from_config(
    config: &mut Config,
    parts: &VersionComponentConfigs,
    base_dir: Option<&Path>,
) -> Result<FileMap, Error> {
    let files = config.files.drain(..);
    let resolved: Vec<_> = files
        .map(|(file, file_config)| {
            let new_files = match file {
                InputFile::GlobPattern { pattern, exclude_patterns } => {
                    resolve_glob_files(&pattern, &exclude_patterns)
                }
                InputFile::Path(path) => Ok(vec![path]),
            }?;

            let file_change = FileChange::new(file_config.finalize(), parts);
            Ok(new_files
                .into_iter()
                .map(|file| {
                    if file.is_absolute() {
                        Ok(file)
                    } else if let Some(base_dir) = base_dir {
                        let file = base_dir.join(&file);
                        file.canonicalize().map_err(|source| IoError { source, path: file })
                    } else {
                        Ok(file)
                    }
                })
                .map(move |file| file.map(|file| (file, file_change.clone())))
                .collect::<Vec<_>>())
        })
        .collect::<Result<Vec<_>, Error>>()?;

    resolved.into_iter().flatten().try_fold(FileMap::new(), |mut acc, res| {
        let (file, change) = res?;
        acc.entry(file).or_default().push(change);
        Ok::<_, Error>(acc)
    })
}

/// Filter `file_map` down to the files that should actually be touched, honoring
/// `global.excluded_paths`/`global.included_paths`.
pub fn files_to_modify<'a>(
    config: &'a Config,
    file_map: &'a FileMap,
) -> impl Iterator<Item = (&'a PathBuf, &'a Vec<FileChange>)> {
    let excluded: HashSet<&'a PathBuf> = config
        .global
        .excluded_paths
        .as_deref()
        .unwrap_or_default()
        .iter()
        .collect();
    let included_extra: HashSet<&'a PathBuf> = config
        .global
        .included_paths
        .as_deref()
        .unwrap_or_default()
        .iter()
        .collect();

    let configured: HashSet<&'a PathBuf> = file_map
        .keys()
        .collect::<HashSet<&'a PathBuf>>()
        .difference(&excluded)
        .copied()
        .collect();

    included_extra
        .union(&configured)
        .copied()
        .collect::<HashSet<_>>()
        .into_iter()
        .filter_map(|file| file_map.get_key_value(file))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::regex::RegexTemplate;

    fn semver_change() -> FileChange {
        FileChange {
            parse_version_pattern: regex::Regex::new(r"(?P<major>\d+)\.(?P<minor>\d+)\.(?P<patch>\d+)")
                .unwrap()
                .into(),
            serialize_version_patterns: vec![PythonFormatString::parse("{major}.{minor}.{patch}").unwrap()],
            search: RegexTemplate::Escaped(PythonFormatString::parse("{current_version}").unwrap()),
            replace: "{new_version}".to_string(),
            ignore_missing_version: false,
            ignore_missing_file: false,
            include_bumps: None,
            exclude_bumps: None,
        }
    }

    fn versions(current: &str, new: &str) -> (Version, Version) {
        let spec = crate::version::VersionSpec::from_components(IndexMap::from([
            ("major".to_string(), Default::default()),
            ("minor".to_string(), Default::default()),
            ("patch".to_string(), Default::default()),
        ]));
        let re = regex::Regex::new(r"(?P<major>\d+)\.(?P<minor>\d+)\.(?P<patch>\d+)").unwrap();
        (
            Version::parse(current, &re, &spec).unwrap(),
            Version::parse(new, &re, &spec).unwrap(),
        )
    }

    #[test]
    fn replaces_literal_version_occurrence() {
        let change = semver_change();
        let (current, new) = versions("1.2.3", "1.2.4");
        let ctx: HashMap<&str, &str> = HashMap::new();
        let path = Path::new("VERSION");
        let after = replace_version(path, "version = \"1.2.3\"\n", &[change], &current, &new, &ctx).unwrap();
        assert_eq!(after, "version = \"1.2.4\"\n");
    }

    #[test]
    fn missing_version_errors_unless_ignored() {
        let (current, new) = versions("1.2.3", "1.2.4");
        let ctx: HashMap<&str, &str> = HashMap::new();
        let path = Path::new("VERSION");
        let strict = semver_change();
        assert!(replace_version(path, "no version here", &[strict], &current, &new, &ctx).is_err());

        let lenient = FileChange {
            ignore_missing_version: true,
            ..semver_change()
        };
        let after = replace_version(path, "no version here", &[lenient], &current, &new, &ctx).unwrap();
        assert_eq!(after, "no version here");
    }

    #[test]
    fn pyproject_version_assignment_is_anchored_and_quote_aware() {
        let change = semver_change();
        let (current, new) = versions("1.2.3", "1.2.4");
        let ctx: HashMap<&str, &str> = HashMap::new();
        let path = Path::new("pyproject.toml");
        let before = "[project]\nname = \"demo\"\nversion = \"1.2.3\"\ndependencies = [\"demo-plugin==1.2.3\"]\n";
        let after = replace_version(path, before, &[change], &current, &new, &ctx).unwrap();
        assert_eq!(
            after,
            "[project]\nname = \"demo\"\nversion = \"1.2.4\"\ndependencies = [\"demo-plugin==1.2.3\"]\n",
            "only the version assignment should change, not a dependency pinned at the same version"
        );
    }

    #[test]
    fn pyproject_version_assignment_honors_single_quotes() {
        let change = semver_change();
        let (current, new) = versions("1.2.3", "1.2.4");
        let ctx: HashMap<&str, &str> = HashMap::new();
        let path = Path::new("pyproject.toml");
        let after = replace_version(path, "version = '1.2.3'\n", &[change], &current, &new, &ctx).unwrap();
        assert_eq!(after, "version = '1.2.4'\n");
    }

    #[test]
    fn falls_back_to_original_literal_when_custom_serialize_misses_default_search() {
        // `change`'s own serialize pattern renders `current_version`/`new_version` with a `v`
        // prefix the file itself doesn't use, so the default `{current_version}` search can't
        // find its rendered form; `should_contain_version` still accepts the file because the
        // literal originally-parsed version string ("1.2.3") is present, but a plain search/
        // replace leaves the content untouched. The fallback must then perform the replacement
        // against that literal string instead of silently reporting success with no rewrite.
        let (current, new) = versions("1.2.3", "1.2.4");
        let ctx: HashMap<&str, &str> = HashMap::new();
        let path = Path::new("CHANGELOG.md");
        let change = FileChange {
            serialize_version_patterns: vec![PythonFormatString::parse("v{major}.{minor}.{patch}").unwrap()],
            ..semver_change()
        };
        let before = "latest release: 1.2.3\n";
        let after = replace_version(path, before, &[change], &current, &new, &ctx).unwrap();
        assert_eq!(after, "latest release: v1.2.4\n");
    }

    #[test]
    fn files_to_modify_respects_excluded_paths() {
        let mut config = Config::default();
        config.global.excluded_paths = Some(vec![PathBuf::from("skip.txt")]);
        let mut file_map = FileMap::new();
        file_map.insert(PathBuf::from("keep.txt"), vec![semver_change()]);
        file_map.insert(PathBuf::from("skip.txt"), vec![semver_change()]);
        let kept: Vec<_> = files_to_modify(&config, &file_map).map(|(path, _)| path.clone()).collect();
        assert_eq!(kept, vec![PathBuf::from("keep.txt")]);
    }
}
