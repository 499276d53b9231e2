use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

#[cfg(test)]
#[path = "./input.test.rs"]
mod input_tests;

#[derive(thiserror::Error, Clone, Debug)]
pub enum InputRefError {
    #[error("Invalid input reference ({0})")]
    SyntaxError(String),

    #[error("Input reference is not locked ({0})")]
    NotLocked(String),
}

static GITHUB_REF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^github:([A-Za-z0-9._-]+)/([A-Za-z0-9._-]+)(?:/([^/#]+))?$").unwrap()
});

static REVISION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9a-f]{40}$").unwrap()
});

/// True for strings that look like a full git revision rather than a
/// branch or tag name.
pub fn is_revision<P: AsRef<str>>(treeish: P) -> bool {
    REVISION.is_match(treeish.as_ref())
}

/// A reference to a package source.
///
/// The unlocked form may point at a mutable reference (a branch, a tag, a
/// directory that can change); the locked form pins a revision (or, for
/// `path:` sources, a content fingerprint). Locking is idempotent.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum InputRef {
    Github {
        owner: String,
        repo: String,

        #[serde(default)]
        #[serde(rename = "ref")]
        #[serde(skip_serializing_if = "Option::is_none")]
        reference: Option<String>,

        #[serde(default)]
        #[serde(skip_serializing_if = "Option::is_none")]
        rev: Option<String>,
    },

    Git {
        url: String,

        #[serde(default)]
        #[serde(rename = "ref")]
        #[serde(skip_serializing_if = "Option::is_none")]
        reference: Option<String>,

        #[serde(default)]
        #[serde(skip_serializing_if = "Option::is_none")]
        rev: Option<String>,
    },

    Path {
        path: String,

        #[serde(default)]
        #[serde(skip_serializing_if = "Option::is_none")]
        fingerprint: Option<String>,
    },
}

impl InputRef {
    pub fn is_locked(&self) -> bool {
        match self {
            InputRef::Github { rev, .. } => rev.is_some(),
            InputRef::Git { rev, .. } => rev.is_some(),
            InputRef::Path { fingerprint, .. } => fingerprint.is_some(),
        }
    }

    /// Returns a copy of this reference pinned to `revision`.
    pub fn pin<P: AsRef<str>>(&self, revision: P) -> InputRef {
        let revision = revision.as_ref().to_string();

        match self {
            InputRef::Github { owner, repo, reference, .. } => InputRef::Github {
                owner: owner.clone(),
                repo: repo.clone(),
                reference: reference.clone(),
                rev: Some(revision),
            },

            InputRef::Git { url, reference, .. } => InputRef::Git {
                url: url.clone(),
                reference: reference.clone(),
                rev: Some(revision),
            },

            InputRef::Path { path, .. } => InputRef::Path {
                path: path.clone(),
                fingerprint: Some(revision),
            },
        }
    }

    /// The canonical URL string for this reference. Locked references
    /// embed their revision; unlocked ones their mutable reference.
    pub fn url(&self) -> String {
        match self {
            InputRef::Github { owner, repo, reference, rev } => {
                match rev.as_ref().or(reference.as_ref()) {
                    Some(treeish) => format!("github:{}/{}/{}", owner, repo, treeish),
                    None => format!("github:{}/{}", owner, repo),
                }
            },

            InputRef::Git { url, reference, rev } => {
                match rev.as_ref().or(reference.as_ref()) {
                    Some(treeish) => format!("git+{}#{}", url, treeish),
                    None => format!("git+{}", url),
                }
            },

            InputRef::Path { path, fingerprint } => {
                match fingerprint {
                    Some(fingerprint) => format!("path:{}#{}", path, fingerprint),
                    None => format!("path:{}", path),
                }
            },
        }
    }

    /// The locked projection of this reference, if it is locked.
    pub fn locked(&self) -> Option<LockedInputRef> {
        let rev = match self {
            InputRef::Github { rev, .. } => rev.clone(),
            InputRef::Git { rev, .. } => rev.clone(),
            InputRef::Path { fingerprint, .. } => fingerprint.clone(),
        };

        rev.map(|rev| LockedInputRef {
            url: self.url(),
            rev,
        })
    }
}

impl FromStr for InputRef {
    type Err = InputRefError;

    fn from_str(src: &str) -> Result<InputRef, InputRefError> {
        if let Some(captures) = GITHUB_REF.captures(src) {
            let treeish
                = captures.get(3).map(|m| m.as_str().to_string());

            let (reference, rev) = match treeish {
                Some(treeish) if is_revision(&treeish) => (None, Some(treeish)),
                other => (other, None),
            };

            return Ok(InputRef::Github {
                owner: captures[1].to_string(),
                repo: captures[2].to_string(),
                reference,
                rev,
            });
        }

        if let Some(rest) = src.strip_prefix("git+") {
            let (url, treeish) = match rest.split_once('#') {
                Some((url, treeish)) => (url, Some(treeish.to_string())),
                None => (rest, None),
            };

            if url.is_empty() {
                return Err(InputRefError::SyntaxError(src.to_string()));
            }

            let (reference, rev) = match treeish {
                Some(treeish) if is_revision(&treeish) => (None, Some(treeish)),
                other => (other, None),
            };

            return Ok(InputRef::Git {
                url: url.to_string(),
                reference,
                rev,
            });
        }

        if let Some(rest) = src.strip_prefix("path:") {
            let (path, fingerprint) = match rest.split_once('#') {
                Some((path, fingerprint)) => (path, Some(fingerprint.to_string())),
                None => (rest, None),
            };

            if path.is_empty() {
                return Err(InputRefError::SyntaxError(src.to_string()));
            }

            return Ok(InputRef::Path {
                path: path.to_string(),
                fingerprint,
            });
        }

        Err(InputRefError::SyntaxError(src.to_string()))
    }
}

impl fmt::Display for InputRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url())
    }
}

/// The content-pinned form of an input reference, as recorded in locked
/// packages. Two locked refs are the same source iff they compare equal.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LockedInputRef {
    pub url: String,
    pub rev: String,
}

impl LockedInputRef {
    /// Reconstructs the full input reference from the canonical URL.
    pub fn to_input_ref(&self) -> Result<InputRef, InputRefError> {
        let input = InputRef::from_str(&self.url)?;

        if !input.is_locked() {
            return Err(InputRefError::NotLocked(self.url.clone()));
        }

        Ok(input)
    }
}

impl fmt::Display for LockedInputRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)
    }
}
