use super::About;
use crate::Result;
use ohno::IntoAppError;
use regex::Regex;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;

static README_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)^readme(?:\.(.+))?$").expect("invalid regex"));

const MARKDOWN: &str = "text/markdown";
const PLAIN_TEXT: &str = "text/plain";

/// Content type for a README file name, or `None` when the name is not a README
#[must_use]
pub fn readme_content_type(file_name: &str) -> Option<&'static str> {
    let captures = README_REGEX.captures(file_name)?;
    let is_markdown = captures
        .get(1)
        .is_some_and(|ext| ext.as_str().eq_ignore_ascii_case("md") || ext.as_str().eq_ignore_ascii_case("markdown"));

    Some(if is_markdown { MARKDOWN } else { PLAIN_TEXT })
}

/// Find the README at the top of a checked-out tree.
///
/// Candidates are considered in file name order so the choice is stable when a repository has several.
pub fn find_readme(dir: &Path) -> Result<Option<About>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(dir).into_app_err_with(|| format!("unable to list '{}'", dir.display()))? {
        let entry = entry.into_app_err_with(|| format!("unable to list '{}'", dir.display()))?;
        if !entry.file_type().is_ok_and(|t| t.is_file()) {
            continue;
        }

        if let Ok(name) = entry.file_name().into_string() {
            names.push(name);
        }
    }

    names.sort();

    for name in names {
        let Some(content_type) = readme_content_type(&name) else {
            continue;
        };

        let path = dir.join(&name);
        let data = fs::read(&path).into_app_err_with(|| format!("unable to read '{}'", path.display()))?;
        return Ok(Some(About {
            content: String::from_utf8_lossy(&data).into_owned(),
            content_type: content_type.to_string(),
        }));
    }

    Ok(None)
}
