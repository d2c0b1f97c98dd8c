//! Environment tag provider.
//!
//! CI-provider detection matrices and CODEOWNERS parsing live outside this
//! crate; what we read here is the generic, explicitly-provided subset:
//! git metadata variables and a free-form `VIGIL_TAGS` list. The set is
//! read once per process and applied to every span.

use std::collections::HashMap;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;

use crate::tags;

/// Free-form extra tags, `key:value` pairs separated by commas.
pub const ENV_TAGS: &str = "VIGIL_TAGS";
/// Repository URL of the checkout under test.
pub const ENV_GIT_REPOSITORY_URL: &str = "VIGIL_GIT_REPOSITORY_URL";
/// Branch under test.
pub const ENV_GIT_BRANCH: &str = "VIGIL_GIT_BRANCH";
/// Commit under test.
pub const ENV_GIT_COMMIT_SHA: &str = "VIGIL_GIT_COMMIT_SHA";

static ENV_TAGS_CACHE: OnceLock<HashMap<String, String>> = OnceLock::new();

/// Environment tags applied to every span, read once per process.
pub fn env_tags() -> &'static HashMap<String, String> {
    ENV_TAGS_CACHE.get_or_init(collect_env_tags)
}

fn collect_env_tags() -> HashMap<String, String> {
    let mut out = HashMap::new();

    for (var, tag) in [
        (ENV_GIT_REPOSITORY_URL, tags::GIT_REPOSITORY_URL),
        (ENV_GIT_BRANCH, tags::GIT_BRANCH),
        (ENV_GIT_COMMIT_SHA, tags::GIT_COMMIT_SHA),
    ] {
        if let Ok(value) = std::env::var(var) {
            if !value.is_empty() {
                out.insert(tag.to_string(), value);
            }
        }
    }

    if let Ok(extra) = std::env::var(ENV_TAGS) {
        for (key, value) in parse_tag_list(&extra) {
            out.insert(key, value);
        }
    }

    out
}

/// Parse a `key:value,key:value` list; entries without a colon are skipped.
fn parse_tag_list(raw: &str) -> Vec<(String, String)> {
    raw.split(',')
        .filter_map(|entry| {
            let (key, value) = entry.split_once(':')?;
            let key = key.trim();
            let value = value.trim();
            if key.is_empty() || value.is_empty() {
                None
            } else {
                Some((key.to_string(), value.to_string()))
            }
        })
        .collect()
}

/// Derive a service name from a repository URL: the final path segment
/// with any `.git` suffix removed.
pub fn service_name_from_repository(url: &str) -> Option<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r"/([a-zA-Z0-9\-_.]*)$").expect("repository name pattern is valid")
    });
    let name = re.captures(url)?.get(1)?.as_str().trim_end_matches(".git");
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

/// Make `path` relative to the source root (the current working directory)
/// when it lies inside it; absolute paths outside come back unchanged.
pub fn relative_to_source_root(path: &str) -> String {
    let p = Path::new(path);
    if let Ok(cwd) = std::env::current_dir() {
        if let Ok(stripped) = p.strip_prefix(&cwd) {
            return stripped.to_string_lossy().into_owned();
        }
    }
    path.to_string()
}
