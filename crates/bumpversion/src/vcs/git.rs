//! Git-backed implementation of [`super::VersionControlSystem`].
use crate::{
    command::run_command,
    f_string::PythonFormatString,
    vcs::{RevisionInfo, TagAndRevision, TagInfo, VersionControlSystem},
};
use async_process::Command;
use std::path::{Path, PathBuf};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Command(#[from] crate::command::Error),

    #[error(transparent)]
    Regex(#[from] regex::Error),

    #[error(transparent)]
    InvalidTag(#[from] InvalidTagError),

    #[error("failed to render tag name template")]
    MissingArgument(#[from] crate::f_string::MissingArgumentError),
}

#[derive(thiserror::Error, Debug)]
pub enum InvalidTagError {
    #[error("tag {0:?} is missing commit SHA")]
    MissingCommitSha(String),
    #[error("tag {0:?} is missing distance to latest tag")]
    MissingDistanceToLatestTag(String),
    #[error("invalid distance to latest tag for {tag:?}")]
    InvalidDistanceToLatestTag {
        #[source]
        source: std::num::ParseIntError,
        tag: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GitRepository {
    path: PathBuf,
}

static FLAG_PATTERN: once_cell::sync::Lazy<regex::Regex> =
    once_cell::sync::Lazy::new(|| regex::RegexBuilder::new(r"^(\(\?[aiLmsux]+\))").build().unwrap());

static BRANCH_NAME_REGEX: once_cell::sync::Lazy<regex::Regex> =
    once_cell::sync::Lazy::new(|| regex::RegexBuilder::new(r"([^a-zA-Z0-9]*)").build().unwrap());

/// Split a regex pattern into `(pattern_without_leading_flags, flags)`.
fn extract_regex_flags(pattern: &str) -> (&str, &str) {
    let bits: Vec<_> = FLAG_PATTERN.splitn(pattern, 2).collect();
    if bits.len() < 2 {
        (pattern, "")
    } else {
        (bits[1], bits[0])
    }
}

/// Find the version embedded in a git tag, given the template used to produce tags and the
/// regex used to parse versions elsewhere in the config.
fn version_from_tag<'a>(
    tag: &'a str,
    tag_name: &PythonFormatString,
    parse_version_regex: &regex::Regex,
) -> Result<Option<&'a str>, Error> {
    let (version_pattern, regex_flags) = extract_regex_flags(parse_version_regex.as_str());

    let placeholder = "new_version";
    let names: Vec<&str> = tag_name.named_arguments().collect();
    let (prefix, suffix) = if names.iter().any(|n| *n == placeholder) {
        let mut values: std::collections::HashMap<&str, &str> = std::collections::HashMap::new();
        values.insert(placeholder, "\u{0}SPLIT\u{0}");
        let rendered = tag_name.format(&values, false).unwrap_or_default();
        rendered
            .split_once("\u{0}SPLIT\u{0}")
            .map(|(p, s)| (p.to_string(), s.to_string()))
            .unwrap_or_default()
    } else {
        (String::new(), String::new())
    };

    let pattern = format!(
        "{regex_flags}{}(?P<current_version>{version_pattern}){}",
        regex::escape(&prefix),
        regex::escape(&suffix),
    );
    let tag_regex = regex::RegexBuilder::new(&pattern).build()?;
    Ok(tag_regex
        .captures_iter(tag)
        .filter_map(|m| m.name("current_version"))
        .map(|m| m.as_str())
        .next())
}

impl GitRepository {
    async fn revision_info(&self) -> Result<Option<RevisionInfo>, Error> {
        let mut cmd = Command::new("git");
        cmd.args(["rev-parse", "--show-toplevel", "--abbrev-ref", "HEAD"])
            .current_dir(&self.path);

        let res = run_command(&mut cmd).await?;
        let mut lines = res.stdout.lines().map(str::trim);
        let Some(repository_root) = lines.next().map(PathBuf::from) else {
            return Ok(None);
        };
        let Some(branch_name) = lines.next() else {
            return Ok(None);
        };
        let short_branch_name: String = BRANCH_NAME_REGEX
            .replace_all(branch_name, "")
            .to_lowercase()
            .chars()
            .take(20)
            .collect();

        Ok(Some(RevisionInfo {
            branch_name: branch_name.to_string(),
            short_branch_name,
            repository_root,
        }))
    }

    async fn latest_tag_info(
        &self,
        tag_name: &PythonFormatString,
        parse_version_regex: &regex::Regex,
    ) -> Result<Option<TagInfo>, Error> {
        let mut glob_values = std::collections::HashMap::new();
        glob_values.insert("new_version", "*");
        let tag_pattern = tag_name.format(&glob_values, true)?;

        let match_tag_pattern_flag = format!("--match={tag_pattern}");
        let mut cmd = Command::new("git");
        cmd.args(["describe", "--dirty", "--tags", "--long", "--abbrev=40", &match_tag_pattern_flag])
            .current_dir(&self.path);

        match run_command(&mut cmd).await {
            Ok(tag_info) => {
                let raw_tag = tag_info.stdout.trim().to_string();
                let mut tag_parts: Vec<&str> = raw_tag.split('-').collect();

                let dirty = tag_parts.last().is_some_and(|t| t.trim().eq_ignore_ascii_case("dirty"));
                if dirty {
                    let _ = tag_parts.pop();
                }

                let commit_sha = tag_parts
                    .pop()
                    .ok_or_else(|| InvalidTagError::MissingCommitSha(raw_tag.clone()))?
                    .trim_start_matches('g')
                    .to_string();

                let distance_to_latest_tag = tag_parts
                    .pop()
                    .ok_or_else(|| InvalidTagError::MissingDistanceToLatestTag(raw_tag.clone()))?
                    .parse::<usize>()
                    .map_err(|source| InvalidTagError::InvalidDistanceToLatestTag {
                        source,
                        tag: raw_tag.clone(),
                    })?;
                let current_tag = tag_parts.join("-");
                let version = version_from_tag(&current_tag, tag_name, parse_version_regex)?;
                let current_numeric_version = current_tag.trim_start_matches('v').to_string();
                let current_version = version.unwrap_or(current_numeric_version.as_str()).to_string();

                tracing::debug!(dirty, commit_sha, distance_to_latest_tag, current_tag, current_version, "latest tag");

                Ok(Some(TagInfo {
                    dirty,
                    commit_sha,
                    distance_to_latest_tag,
                    current_tag,
                    current_version,
                }))
            }
            Err(err) => {
                if let crate::command::Error::Failed { ref output, .. } = err {
                    if output.stderr.contains("No names found, cannot describe anything") {
                        return Ok(None);
                    }
                }
                Err(err.into())
            }
        }
    }
}

impl VersionControlSystem for GitRepository {
    type Error = Error;

    fn open(path: impl Into<PathBuf>) -> Result<Self, Error> {
        Ok(Self { path: path.into() })
    }

    fn path(&self) -> &Path {
        &self.path
    }

    async fn add<P>(&self, files: impl IntoIterator<Item = P>) -> Result<(), Error>
    where
        P: AsRef<std::ffi::OsStr>,
    {
        let mut cmd = Command::new("git");
        cmd.arg("add").arg("--update").args(files).current_dir(&self.path);
        run_command(&mut cmd).await?;
        Ok(())
    }

    async fn commit<A, E, AS, EK, EV>(&self, message: &str, extra_args: A, env: E) -> Result<(), Error>
    where
        A: IntoIterator<Item = AS>,
        E: IntoIterator<Item = (EK, EV)>,
        AS: AsRef<std::ffi::OsStr>,
        EK: AsRef<std::ffi::OsStr>,
        EV: AsRef<std::ffi::OsStr>,
    {
        use std::io::Write;

        let tmp = tempfile::TempDir::new()?;
        let tmp_file_path = tmp.path().join("commit-message.txt");
        let mut tmp_file = std::fs::File::create(&tmp_file_path)?;
        tmp_file.write_all(message.as_bytes())?;

        let mut cmd = Command::new("git");
        cmd.arg("commit").arg("-F").arg(&tmp_file_path);
        cmd.args(extra_args);
        cmd.envs(env);
        cmd.current_dir(&self.path);
        run_command(&mut cmd).await?;
        Ok(())
    }

    async fn tag(&self, name: &str, message: Option<&str>, sign: bool) -> Result<(), Error> {
        let mut cmd = Command::new("git");
        cmd.current_dir(&self.path);
        cmd.args(["tag", name]);
        if sign {
            cmd.arg("--sign");
        }
        if let Some(message) = message {
            cmd.args(["--message", message]);
        }
        run_command(&mut cmd).await?;
        Ok(())
    }

    async fn tags(&self) -> Result<Vec<String>, Error> {
        let mut cmd = Command::new("git");
        cmd.current_dir(&self.path);
        cmd.args(["tag", "--list"]);
        let output = run_command(&mut cmd).await?;
        Ok(output.stdout.lines().map(|line| line.trim().to_string()).collect())
    }

    async fn dirty_files(&self) -> Result<Vec<PathBuf>, Error> {
        let mut cmd = Command::new("git");
        cmd.args(["status", "-u", "--porcelain"]).current_dir(&self.path);

        let status_output = run_command(&mut cmd).await?;
        let dirty = status_output
            .stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .filter(|line| !line.starts_with("??"))
            .filter_map(|line| line.split_once(' '))
            .map(|(_, file)| self.path().join(file))
            .collect();
        Ok(dirty)
    }

    async fn latest_tag_and_revision(
        &self,
        tag_name: &PythonFormatString,
        parse_version_regex: &regex::Regex,
    ) -> Result<TagAndRevision, Error> {
        let mut cmd = Command::new("git");
        cmd.args(["update-index", "--refresh", "-q"]).current_dir(&self.path);
        if let Err(err) = run_command(&mut cmd).await {
            tracing::debug!("failed to update git index: {err}");
        }

        let tag = self.latest_tag_info(tag_name, parse_version_regex).await?;
        let revision = self.revision_info().await.ok().flatten();

        Ok(TagAndRevision { tag, revision })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_regex_flags_splits_leading_flag_group() {
        let (pattern, flags) = extract_regex_flags(r"(?i)v\d+");
        assert_eq!(flags, "(?i)");
        assert_eq!(pattern, r"v\d+");
    }

    #[test]
    fn extract_regex_flags_passes_through_plain_pattern() {
        let (pattern, flags) = extract_regex_flags(r"\d+\.\d+\.\d+");
        assert_eq!(flags, "");
        assert_eq!(pattern, r"\d+\.\d+\.\d+");
    }

    #[test]
    fn version_from_tag_extracts_current_version() {
        let tag_name = PythonFormatString::parse("v{new_version}").unwrap();
        let parse_re = regex::Regex::new(r"\d+\.\d+\.\d+").unwrap();
        let version = version_from_tag("v1.2.3", &tag_name, &parse_re).unwrap();
        assert_eq!(version, Some("1.2.3"));
    }
}
