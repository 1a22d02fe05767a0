//! Lookup of modules by name
//!
//! The pool is read-only from the bundler's point of view and may be shared
//! by concurrent builds, hence the `Send + Sync` bound.

use std::{
    borrow::Cow,
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{Context, Result};
use log::debug;
use walkdir::WalkDir;

use crate::{error::PoolError, module_info::ModuleInfo, types::FxIndexMap};

/// File name of the optional metadata manifest of a [`DirectoryPool`]
pub const MODULE_INFO_MANIFEST: &str = ".module-info.json";

/// A named resource with its content and, when known, its metadata
#[derive(Debug, Clone)]
pub struct Resource {
    pub name: String,
    pub path: Option<PathBuf>,
    content: Vec<u8>,
    info: Option<ModuleInfo>,
}

impl Resource {
    pub fn new(name: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            path: None,
            content: content.into(),
            info: None,
        }
    }

    #[must_use]
    pub fn with_info(mut self, info: ModuleInfo) -> Self {
        self.info = Some(info);
        self
    }

    #[must_use]
    pub fn with_path(mut self, path: PathBuf) -> Self {
        self.path = Some(path);
        self
    }

    pub fn buffer(&self) -> &[u8] {
        &self.content
    }

    pub fn info(&self) -> Option<&ModuleInfo> {
        self.info.as_ref()
    }

    /// Content decoded as UTF-8, replacing invalid sequences
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.content)
    }

    /// Content decoded as ISO-8859-1, the encoding of properties files
    pub fn latin1_text(&self) -> String {
        self.content.iter().map(|&byte| char::from(byte)).collect()
    }
}

pub trait ModulePool: Send + Sync {
    /// Names of all known resources, in a stable order
    fn resource_names(&self) -> Vec<String>;

    fn find_resource(&self, name: &str) -> Result<Arc<Resource>, PoolError>;

    /// Like [`Self::find_resource`], but the returned resource carries metadata
    fn find_resource_with_info(&self, name: &str) -> Result<Arc<Resource>, PoolError> {
        let resource = self.find_resource(name)?;
        if resource.info.is_some() {
            return Ok(resource);
        }
        let info = ModuleInfo::new(name);
        Ok(Arc::new(Resource::clone(&resource).with_info(info)))
    }

    fn get_module_info(&self, name: &str) -> Result<ModuleInfo, PoolError> {
        let resource = self.find_resource_with_info(name)?;
        Ok(resource
            .info()
            .cloned()
            .unwrap_or_else(|| ModuleInfo::new(name)))
    }

    fn contains(&self, name: &str) -> bool {
        self.find_resource(name).is_ok()
    }
}

/// In-memory pool; insertion order is the enumeration order
#[derive(Debug, Default)]
pub struct MemoryPool {
    resources: FxIndexMap<String, Arc<Resource>>,
}

impl MemoryPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a resource; metadata defaults to an empty record with the resource name
    pub fn add(&mut self, resource: Resource) {
        let resource = if resource.info.is_some() {
            resource
        } else {
            let info = ModuleInfo::new(resource.name.clone());
            resource.with_info(info)
        };
        self.resources
            .insert(resource.name.clone(), Arc::new(resource));
    }

    /// Add a module with its content and metadata
    pub fn add_module(&mut self, info: ModuleInfo, content: &str) {
        let resource = Resource::new(info.name.clone(), content).with_info(info);
        self.add(resource);
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

impl ModulePool for MemoryPool {
    fn resource_names(&self) -> Vec<String> {
        self.resources.keys().cloned().collect()
    }

    fn find_resource(&self, name: &str) -> Result<Arc<Resource>, PoolError> {
        self.resources
            .get(name)
            .cloned()
            .ok_or_else(|| PoolError::not_found(name))
    }

    fn contains(&self, name: &str) -> bool {
        self.resources.contains_key(name)
    }
}

/// Pool over all files below a directory
///
/// Resources are named by their slash-separated path relative to the root.
/// Metadata is read from an optional [`MODULE_INFO_MANIFEST`] at the root,
/// a JSON object keyed by resource name.
#[derive(Debug)]
pub struct DirectoryPool {
    root: PathBuf,
    /// Resource name -> file path, sorted by name
    files: FxIndexMap<String, PathBuf>,
    infos: FxIndexMap<String, ModuleInfo>,
}

impl DirectoryPool {
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let mut files = FxIndexMap::default();

        for entry in WalkDir::new(&root).sort_by_file_name() {
            let entry = entry
                .with_context(|| format!("Failed to scan resource directory {}", root.display()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry
                .path()
                .strip_prefix(&root)
                .with_context(|| format!("{} is outside of the pool root", entry.path().display()))?;
            let name = relative
                .components()
                .map(|component| component.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            if name == MODULE_INFO_MANIFEST {
                continue;
            }
            files.insert(name, entry.path().to_path_buf());
        }
        files.sort_keys();

        let manifest = root.join(MODULE_INFO_MANIFEST);
        let infos = if manifest.is_file() {
            let text = fs::read_to_string(&manifest)
                .with_context(|| format!("Failed to read {}", manifest.display()))?;
            let mut infos: FxIndexMap<String, ModuleInfo> = serde_json::from_str(&text)
                .with_context(|| format!("Failed to parse {}", manifest.display()))?;
            for (name, info) in &mut infos {
                if info.name.is_empty() {
                    info.name.clone_from(name);
                }
            }
            infos
        } else {
            FxIndexMap::default()
        };

        debug!(
            "Opened resource pool {} with {} resources ({} with metadata)",
            root.display(),
            files.len(),
            infos.len()
        );
        Ok(Self { root, files, infos })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ModulePool for DirectoryPool {
    fn resource_names(&self) -> Vec<String> {
        self.files.keys().cloned().collect()
    }

    fn find_resource(&self, name: &str) -> Result<Arc<Resource>, PoolError> {
        let path = self
            .files
            .get(name)
            .ok_or_else(|| PoolError::not_found(name))?;
        let content = fs::read(path).map_err(|source| PoolError::Io {
            name: name.to_owned(),
            path: path.clone(),
            source,
        })?;
        let info = self
            .infos
            .get(name)
            .cloned()
            .unwrap_or_else(|| ModuleInfo::new(name));
        Ok(Arc::new(
            Resource::new(name, content)
                .with_path(path.clone())
                .with_info(info),
        ))
    }

    fn contains(&self, name: &str) -> bool {
        self.files.contains_key(name)
    }
}
