//! Canonical project keys.
//!
//! A canonical key names a logical project independently of the source that
//! reports it: `host:owner/repo`, lowercase, no trailing slash, no `.git`
//! suffix. Every source goes through this module before an identifier is
//! minted, so `Owner/Repo` and `owner/repo` always land on the same key.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{IdentityError, IdentityResult};

/// Host label used for GitHub projects.
pub const GITHUB_HOST: &str = "github";

/// Known forge domains and the host label they map to.
const KNOWN_HOSTS: &[(&str, &str)] = &[
    ("github.com", GITHUB_HOST),
    ("gitlab.com", "gitlab"),
    ("bitbucket.org", "bitbucket"),
    ("codeberg.org", "codeberg"),
];

/// Normalized `host:owner/repo` key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CanonicalKey(String);

impl CanonicalKey {
    /// Build a key from its parts, normalizing each of them.
    pub fn new(host: &str, owner: &str, repo: &str) -> IdentityResult<Self> {
        let raw = format!("{}:{}/{}", host, owner, repo);
        let host = normalize_segment(host, &raw, "host")?;
        let owner = normalize_segment(owner, &raw, "owner")?;
        let repo = normalize_segment(&strip_git_suffix(repo.trim()), &raw, "repo")?;
        Ok(Self(format!("{}:{}/{}", host, owner, repo)))
    }

    /// Parse an already-formed key such as `GitHub:Acme/Widget/`.
    pub fn parse(input: &str) -> IdentityResult<Self> {
        let trimmed = input.trim();
        let (host, path) = trimmed
            .split_once(':')
            .ok_or_else(|| IdentityError::invalid_key(input, "expected host:owner/repo"))?;

        let path = path.trim_matches('/');
        let (owner, repo) = path
            .split_once('/')
            .ok_or_else(|| IdentityError::invalid_key(input, "expected owner/repo after host"))?;

        if repo.trim_end_matches('/').contains('/') {
            return Err(IdentityError::invalid_key(input, "too many path segments"));
        }

        Self::new(host, owner, repo.trim_end_matches('/'))
    }

    /// Derive a key from a repository URL.
    ///
    /// Accepts `https://`, `http://`, scheme-less and `git@host:` forms.
    pub fn from_url(url: &str) -> IdentityResult<Self> {
        let trimmed = url.trim();
        let lowered = trimmed.to_lowercase();

        let rest = if let Some(ssh) = lowered.strip_prefix("git@") {
            ssh.replacen(':', "/", 1)
        } else {
            lowered
                .trim_start_matches("https://")
                .trim_start_matches("http://")
                .trim_start_matches("ssh://")
                .trim_start_matches("git@")
                .to_string()
        };

        let mut parts = rest.split('/').filter(|s| !s.is_empty());
        let domain = parts
            .next()
            .ok_or_else(|| IdentityError::invalid_key(url, "no host in URL"))?;
        let owner = parts
            .next()
            .ok_or_else(|| IdentityError::invalid_key(url, "no owner in URL"))?;
        let repo = parts
            .next()
            .ok_or_else(|| IdentityError::invalid_key(url, "no repository in URL"))?;

        let domain = domain.trim_start_matches("www.");
        let domain = domain.split(':').next().unwrap_or(domain);
        let host = KNOWN_HOSTS
            .iter()
            .find(|(d, _)| *d == domain)
            .map(|(_, label)| *label)
            .unwrap_or(domain);

        Self::new(host, owner, repo)
    }

    /// Parse either a key or a URL, whichever the input looks like.
    pub fn detect(input: &str) -> IdentityResult<Self> {
        let trimmed = input.trim();
        if trimmed.contains("://") || trimmed.starts_with("git@") || !trimmed.contains(':') {
            Self::from_url(trimmed)
        } else {
            Self::parse(trimmed)
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn host(&self) -> &str {
        self.0.split_once(':').map(|(h, _)| h).unwrap_or("")
    }

    pub fn owner(&self) -> &str {
        self.path().split_once('/').map(|(o, _)| o).unwrap_or("")
    }

    pub fn repo(&self) -> &str {
        self.path().split_once('/').map(|(_, r)| r).unwrap_or("")
    }

    fn path(&self) -> &str {
        self.0.split_once(':').map(|(_, p)| p).unwrap_or("")
    }
}

fn strip_git_suffix(repo: &str) -> String {
    let repo = repo.trim_end_matches('/').to_lowercase();
    match repo.strip_suffix(".git") {
        Some(stripped) => stripped.to_string(),
        None => repo,
    }
}

fn normalize_segment(segment: &str, raw: &str, what: &str) -> IdentityResult<String> {
    let segment = segment.trim().trim_matches('/').to_lowercase();
    if segment.is_empty() {
        return Err(IdentityError::invalid_key(raw, format!("empty {}", what)));
    }
    if segment.chars().any(|c| c.is_whitespace() || c == ':' || c == '/') {
        return Err(IdentityError::invalid_key(
            raw,
            format!("{} contains whitespace, ':' or '/'", what),
        ));
    }
    Ok(segment)
}

impl fmt::Display for CanonicalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for CanonicalKey {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for CanonicalKey {
    type Error = IdentityError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<CanonicalKey> for String {
    fn from(key: CanonicalKey) -> Self {
        key.0
    }
}

impl AsRef<str> for CanonicalKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_and_trailing_slash_normalize() {
        let a = CanonicalKey::parse("GitHub:Acme/Widget/").unwrap();
        let b = CanonicalKey::parse("github:acme/widget").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "github:acme/widget");
        assert_eq!(a.host(), "github");
        assert_eq!(a.owner(), "acme");
        assert_eq!(a.repo(), "widget");
    }

    #[test]
    fn test_git_suffix_stripped_in_any_case() {
        let expected = CanonicalKey::parse("github:acme/widget").unwrap();
        for input in [
            "github:acme/Widget.Git",
            "github:acme/widget.GIT",
            "https://github.com/Acme/Widget.gIt/",
        ] {
            assert_eq!(CanonicalKey::detect(input).unwrap(), expected, "{}", input);
        }
    }

    #[test]
    fn test_new_matches_parse() {
        let built = CanonicalKey::new("github", " Acme ", "Widget.git").unwrap();
        assert_eq!(built, CanonicalKey::parse("github:acme/widget").unwrap());
    }

    #[test]
    fn test_from_url_variants() {
        let expected = CanonicalKey::parse("github:acme/widget").unwrap();
        for url in [
            "https://github.com/Acme/Widget",
            "https://github.com/acme/widget/",
            "http://www.github.com/acme/widget.git",
            "github.com/ACME/widget",
            "git@github.com:Acme/Widget.git",
            "https://github.com/acme/widget/tree/main",
        ] {
            assert_eq!(CanonicalKey::from_url(url).unwrap(), expected, "{}", url);
        }
    }

    #[test]
    fn test_other_hosts() {
        let gitlab = CanonicalKey::from_url("https://gitlab.com/Group/Proj").unwrap();
        assert_eq!(gitlab.as_str(), "gitlab:group/proj");

        let custom = CanonicalKey::from_url("https://git.example.org/team/tool").unwrap();
        assert_eq!(custom.as_str(), "git.example.org:team/tool");
    }

    #[test]
    fn test_detect_prefers_key_form() {
        assert_eq!(
            CanonicalKey::detect("github:Acme/Widget").unwrap().as_str(),
            "github:acme/widget"
        );
        assert_eq!(
            CanonicalKey::detect("https://github.com/Acme/Widget").unwrap().as_str(),
            "github:acme/widget"
        );
    }

    #[test]
    fn test_rejects_malformed_keys() {
        assert!(CanonicalKey::parse("acme/widget").is_err());
        assert!(CanonicalKey::parse("github:acme").is_err());
        assert!(CanonicalKey::parse("github:/widget").is_err());
        assert!(CanonicalKey::parse("github:acme/wid get").is_err());
        assert!(CanonicalKey::parse("github:a/b/c").is_err());
        assert!(CanonicalKey::from_url("https://github.com/acme").is_err());
    }

    #[test]
    fn test_serde_normalizes_on_read() {
        let key: CanonicalKey = serde_json::from_str("\"GitHub:Acme/Widget\"").unwrap();
        assert_eq!(key.as_str(), "github:acme/widget");
        assert_eq!(serde_json::to_string(&key).unwrap(), "\"github:acme/widget\"");
        assert!(serde_json::from_str::<CanonicalKey>("\"nope\"").is_err());
    }
}
