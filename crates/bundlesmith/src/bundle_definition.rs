//! Declarative input of a bundle build
//!
//! A definition names the output module and lists the sections that decide
//! which modules are selected and how each of them is emitted.

use serde::{Deserialize, Serialize};

use crate::types::FxIndexMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SectionMode {
    /// Modules that are already available at runtime; they are resolved
    /// (and thereby excluded from later sections) but never emitted
    Provided,
    /// Modules concatenated verbatim
    Raw,
    /// Modules embedded for later execution through the loader
    Preload,
    /// Modules announced to the loader as contained in another bundle
    #[serde(alias = "bundle-info")]
    BundleInfo,
    /// Modules required synchronously at the end of the bundle
    Require,
}

impl std::fmt::Display for SectionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Provided => write!(f, "provided"),
            Self::Raw => write!(f, "raw"),
            Self::Preload => write!(f, "preload"),
            Self::BundleInfo => write!(f, "bundleInfo"),
            Self::Require => write!(f, "require"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SectionDefinition {
    pub mode: SectionMode,
    pub name: Option<String>,
    /// `!pattern` excludes, `+pattern` re-includes, a bare pattern includes
    pub filters: Vec<String>,
    /// Follow static dependencies
    pub resolve: bool,
    /// Also follow conditional dependencies
    pub resolve_conditional: bool,
    /// Also select the `<Name>Renderer.js` sibling of each module
    pub renderer: bool,
    /// Raw sections only: order modules by their static dependencies
    pub sort: bool,
    pub declare_raw_modules: bool,
}

impl Default for SectionDefinition {
    fn default() -> Self {
        Self {
            mode: SectionMode::Preload,
            name: None,
            filters: Vec::new(),
            resolve: false,
            resolve_conditional: false,
            renderer: false,
            sort: false,
            declare_raw_modules: false,
        }
    }
}

impl SectionDefinition {
    pub fn new<I, S>(mode: SectionMode, filters: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            mode,
            filters: filters.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn resolving(mut self) -> Self {
        self.resolve = true;
        self
    }

    #[must_use]
    pub fn resolving_conditional(mut self) -> Self {
        self.resolve = true;
        self.resolve_conditional = true;
        self
    }

    #[must_use]
    pub fn with_renderers(mut self) -> Self {
        self.renderer = true;
        self
    }

    #[must_use]
    pub fn sorted(mut self) -> Self {
        self.sort = true;
        self
    }

    #[must_use]
    pub fn declaring_raw_modules(mut self) -> Self {
        self.declare_raw_modules = true;
        self
    }
}

/// Loader configuration emitted before any module executes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BundleConfiguration {
    /// Merged into the global configuration object
    pub properties: FxIndexMap<String, serde_json::Value>,
    /// Namespace prefix -> URL prefix
    pub resource_roots: FxIndexMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BundleDefinition {
    /// Output module name, may contain the `__part__` placeholder
    pub name: String,
    pub configuration: Option<BundleConfiguration>,
    pub sections: Vec<SectionDefinition>,
}

impl BundleDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_section(mut self, section: SectionDefinition) -> Self {
        self.sections.push(section);
        self
    }

    #[must_use]
    pub fn with_configuration(mut self, configuration: BundleConfiguration) -> Self {
        self.configuration = Some(configuration);
        self
    }
}
