//! Pre-computed static metadata of a module
//!
//! The record is produced by an external analysis step and only consumed
//! here. The same shape doubles as the aggregated metadata of a generated
//! bundle, see [`ModuleInfo::add_sub_module`].

use serde::{Deserialize, Serialize};

use crate::{module_name::to_resource_name, types::FxIndexSet};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ModuleInfo {
    pub name: String,
    /// Static dependencies in declaration order
    pub dependencies: FxIndexSet<String>,
    /// Subset of `dependencies` that is only required under a runtime condition
    pub conditional_dependencies: FxIndexSet<String>,
    /// Modules embedded in this one; non-empty only for prebuilt bundles
    pub sub_modules: Vec<String>,
    pub size: Option<u64>,
    pub compressed_size: Option<u64>,
    /// Module must be evaluated in global scope and cannot be function-wrapped
    pub requires_top_level_scope: bool,
    /// Names the module declares as globals
    pub exposed_global_names: Vec<String>,
    /// Module does not register itself with the loader
    pub raw_module: bool,
}

impl ModuleInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Record a dependency
    ///
    /// Embedded sub-modules and the module itself are never dependencies. An
    /// unconditional dependency wins over a conditional one.
    pub fn add_dependency(&mut self, dependency: &str, conditional: bool) {
        if dependency == self.name || self.sub_modules.iter().any(|sub| sub == dependency) {
            return;
        }
        if conditional {
            if !self.dependencies.contains(dependency) {
                self.conditional_dependencies.insert(dependency.to_owned());
            }
        } else {
            self.conditional_dependencies.shift_remove(dependency);
        }
        self.dependencies.insert(dependency.to_owned());
    }

    pub fn is_conditional_dependency(&self, dependency: &str) -> bool {
        self.conditional_dependencies.contains(dependency)
    }

    /// Merge an embedded module into this (bundle) record
    ///
    /// The sub-module's dependencies become dependencies of the bundle unless
    /// they are embedded as well; a dependency on the sub-module itself is
    /// dropped. Names are compared as resource names, so `lib/b` and
    /// `lib/b.js` denote the same module.
    pub fn add_sub_module(&mut self, sub_module: &Self) {
        let name = to_resource_name(&sub_module.name);
        if self.sub_modules.iter().any(|sub| sub.as_str() == name) {
            return;
        }
        self.dependencies.shift_remove(name.as_ref());
        self.conditional_dependencies.shift_remove(name.as_ref());
        self.sub_modules.push(name.into_owned());

        for dependency in &sub_module.dependencies {
            self.add_dependency(
                &to_resource_name(dependency),
                sub_module.is_conditional_dependency(dependency),
            );
        }
        for global in &sub_module.exposed_global_names {
            if !self.exposed_global_names.contains(global) {
                self.exposed_global_names.push(global.clone());
            }
        }
        self.requires_top_level_scope |= sub_module.requires_top_level_scope;
    }
}
