//! Script minification collaborator
//!
//! The bundler does not minify by itself; it hands script content to an
//! implementation of [`Minifier`] and only relies on getting back valid code
//! with license comments preserved.

use std::sync::LazyLock;

use anyhow::Result;
use regex::Regex;

/// Comments matching this pattern must survive minification
pub static COPYRIGHT_COMMENTS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)copyright|\(c\)(?:[0-9]+|\s+[0-9a-z])|released under|license|\u{00a9}|^@ui5-bundle-raw-include |^@ui5-bundle ",
    )
    .expect("COPYRIGHT_COMMENTS pattern is valid")
});

#[derive(Debug, Clone, Copy)]
pub struct MinifyOptions<'r> {
    /// Comments to keep
    pub preserve_comments: &'r Regex,
}

impl Default for MinifyOptions<'static> {
    fn default() -> Self {
        Self {
            preserve_comments: &COPYRIGHT_COMMENTS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MinifyOutput {
    pub code: String,
}

impl MinifyOutput {
    /// Byte length of the minified code
    pub fn len(&self) -> usize {
        self.code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }
}

pub trait Minifier: Send + Sync {
    fn minify(&self, module: &str, code: &str, options: &MinifyOptions<'_>) -> Result<MinifyOutput>;
}

impl<F> Minifier for F
where
    F: Fn(&str, &str) -> Result<String> + Send + Sync,
{
    fn minify(&self, module: &str, code: &str, _options: &MinifyOptions<'_>) -> Result<MinifyOutput> {
        self(module, code).map(|code| MinifyOutput { code })
    }
}
