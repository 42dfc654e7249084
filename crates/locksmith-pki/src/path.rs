//! Slugs and CA chain path resolution.
//!
//! A CA chain such as `"Example Root/Example ICA"` (or the pre-slugged
//! `"example-root/example-ica"`) maps onto the nested directory
//! `example-root/intermed-ca/example-ica/` below `<pki_root>/roots/`.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Directory holding the children of a CA.
pub const INTERMEDIATE_DIR: &str = "intermed-ca";

/// Normalizes free text into a filesystem and URL safe identifier.
///
/// Slugging an existing slug returns it unchanged.
#[must_use]
pub fn slugify(text: &str) -> String {
    slug::slugify(text)
}

/// Resolves a `/`-delimited chain of names or slugs into a relative path.
///
/// Returns an empty string for empty input, which callers must treat as a
/// missing path rather than the roots directory.
#[must_use]
pub fn resolve(chain: &str) -> String {
    let lowered = chain.to_lowercase();
    let trimmed = lowered.trim_matches('/');
    if trimmed.is_empty() {
        return String::new();
    }
    let parts: Vec<&str> = trimmed.split('/').collect();
    let mut path = String::new();
    for (i, part) in parts.iter().enumerate() {
        path.push_str(&slugify(part));
        path.push('/');
        if i != parts.len() - 1 {
            path.push_str(INTERMEDIATE_DIR);
            path.push('/');
        }
    }
    path
}

/// A validated CA chain: the slugs from the root down to the addressed CA.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CaPath {
    slugs: Vec<String>,
}

impl CaPath {
    /// Parses a chain of names or slugs.
    ///
    /// Fails with [`Error::MissingPath`] for empty input and
    /// [`Error::InvalidPath`] when an element slugs to nothing.
    pub fn parse(chain: &str) -> Result<Self> {
        let trimmed = chain.trim().trim_matches('/');
        if trimmed.is_empty() {
            return Err(Error::MissingPath);
        }
        let slugs = trimmed
            .split('/')
            .map(|part| {
                let slug = slugify(&part.to_lowercase());
                if slug.is_empty() {
                    Err(Error::InvalidPath(format!("empty element in '{chain}'")))
                } else {
                    Ok(slug)
                }
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { slugs })
    }

    /// Path of a root CA with the given slug.
    #[must_use]
    pub fn root(slug: impl Into<String>) -> Self {
        Self {
            slugs: vec![slug.into()],
        }
    }

    /// Path of a child of this CA.
    #[must_use]
    pub fn child(&self, slug: impl Into<String>) -> Self {
        let mut slugs = self.slugs.clone();
        slugs.push(slug.into());
        Self { slugs }
    }

    /// Path of the parent CA, if this is not a root.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        (self.slugs.len() > 1).then(|| Self {
            slugs: self.slugs[..self.slugs.len() - 1].to_vec(),
        })
    }

    /// Slug of the addressed CA.
    #[must_use]
    pub fn slug(&self) -> &str {
        self.slugs.last().map_or("", String::as_str)
    }

    /// True for a root CA.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.slugs.len() == 1
    }

    /// Relative directory below `roots/`, in the [`resolve`] form.
    #[must_use]
    pub fn relative(&self) -> PathBuf {
        let mut path = PathBuf::new();
        for (i, slug) in self.slugs.iter().enumerate() {
            if i > 0 {
                path.push(INTERMEDIATE_DIR);
            }
            path.push(slug);
        }
        path
    }

    /// Absolute directory of this CA below the PKI root.
    #[must_use]
    pub fn directory(&self, pki_root: &Path) -> PathBuf {
        pki_root.join("roots").join(self.relative())
    }
}

impl fmt::Display for CaPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.slugs.join("/"))
    }
}
