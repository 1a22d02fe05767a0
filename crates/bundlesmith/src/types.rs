//! Shared type definitions for the bundlesmith crate
//!
//! Ordered collections used wherever output order must follow insertion
//! order, and the classification of resources by file extension.

use indexmap::{IndexMap, IndexSet};
use rustc_hash::FxBuildHasher;

/// Insertion-ordered map with the Fx hasher
pub type FxIndexMap<K, V> = IndexMap<K, V, FxBuildHasher>;

/// Insertion-ordered set with the Fx hasher
pub type FxIndexSet<T> = IndexSet<T, FxBuildHasher>;

/// Classification of a resource based on its file extension
///
/// The kind decides how a module is measured by the splitter and how it is
/// embedded into a preload section by the builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// Script modules (`.js`), embedded as functions
    Script,

    /// XML views, fragments and HTML (`.xml`, `.html`)
    Markup,

    /// JSON documents (`.json`)
    Json,

    /// Java-style properties files (`.properties`), read as ISO-8859-1
    Properties,

    /// Plain text (`.txt`)
    Text,

    /// Anything else; cannot be embedded into a preload section
    Unknown,
}

impl ResourceKind {
    /// Classify a resource by its name
    pub fn from_name(name: &str) -> Self {
        let file_name = name.rsplit('/').next().unwrap_or(name);
        let Some((_, extension)) = file_name.rsplit_once('.') else {
            return Self::Unknown;
        };
        match extension {
            "js" => Self::Script,
            "xml" | "html" | "htm" => Self::Markup,
            "json" => Self::Json,
            "properties" => Self::Properties,
            "txt" => Self::Text,
            _ => Self::Unknown,
        }
    }

    /// Check if this is a script module
    pub fn is_script(&self) -> bool {
        matches!(self, Self::Script)
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Script => write!(f, "script"),
            Self::Markup => write!(f, "markup"),
            Self::Json => write!(f, "json"),
            Self::Properties => write!(f, "properties"),
            Self::Text => write!(f, "text"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}
