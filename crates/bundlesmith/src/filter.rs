//! Ordered include/exclude patterns that select the modules of a section
//!
//! Patterns are evaluated left to right. A bare pattern includes matching
//! names, `!pattern` excludes them and `+pattern` includes them again after an
//! earlier exclude. Patterns without `*` match directory-style: the name
//! itself or anything below it. Patterns with `*` are globs where `*` stays
//! within one path segment and `**` spans segments.

use anyhow::{Context, Result};
use globset::{GlobBuilder, GlobMatcher};

#[derive(Debug, Clone)]
enum PatternMatcher {
    Directory(String),
    Glob(GlobMatcher),
}

impl PatternMatcher {
    fn parse(pattern: &str) -> Result<Self> {
        if !pattern.contains('*') {
            return Ok(Self::Directory(pattern.to_owned()));
        }
        let pattern = if pattern.ends_with('/') {
            format!("{pattern}**")
        } else {
            pattern.to_owned()
        };
        let glob = GlobBuilder::new(&pattern)
            .literal_separator(true)
            .build()
            .with_context(|| format!("Invalid module filter pattern '{pattern}'"))?;
        Ok(Self::Glob(glob.compile_matcher()))
    }

    fn is_match(&self, name: &str) -> bool {
        match self {
            Self::Directory(prefix) => {
                if prefix.is_empty() {
                    return false;
                }
                if prefix.ends_with('/') {
                    return name.starts_with(prefix.as_str());
                }
                name.strip_prefix(prefix.as_str())
                    .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
            }
            Self::Glob(glob) => glob.is_match(name),
        }
    }
}

#[derive(Debug, Clone)]
struct Filter {
    include: bool,
    matcher: PatternMatcher,
}

#[derive(Debug, Clone, Default)]
pub struct FilterList {
    filters: Vec<Filter>,
}

impl FilterList {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let filters = patterns
            .iter()
            .map(|pattern| {
                let pattern = pattern.as_ref();
                let (include, pattern) = match pattern.as_bytes().first() {
                    Some(b'!') => (false, &pattern[1..]),
                    Some(b'+') => (true, &pattern[1..]),
                    _ => (true, pattern),
                };
                Ok(Filter {
                    include,
                    matcher: PatternMatcher::parse(pattern)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { filters })
    }

    /// Decide whether `name` belongs to the section
    ///
    /// `required` is the initial state: a module reached by following a
    /// dependency is accepted unless a matching exclude says otherwise, while a
    /// root candidate needs a matching include.
    pub fn matches(&self, name: &str, required: bool) -> bool {
        self.filters.iter().fold(required, |accepted, filter| {
            if accepted != filter.include && filter.matcher.is_match(name) {
                filter.include
            } else {
                accepted
            }
        })
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// The listed resource names, if every pattern is a plain include of one
    /// resource (a name whose last segment has an extension)
    pub fn explicit_names(&self) -> Option<Vec<&str>> {
        self.filters
            .iter()
            .map(|filter| match &filter.matcher {
                PatternMatcher::Directory(name)
                    if filter.include
                        && name
                            .rsplit('/')
                            .next()
                            .is_some_and(|file_name| file_name.contains('.')) =>
                {
                    Some(name.as_str())
                }
                _ => None,
            })
            .collect::<Option<Vec<_>>>()
            .filter(|names| !names.is_empty())
    }
}
