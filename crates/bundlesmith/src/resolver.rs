//! Resolution of a bundle definition into concrete, ordered module lists
//!
//! Each section walks the pool depth-first: every resource name accepted by
//! the section filters is a root, taken in pool order or, for a plain list of
//! module names, in the listed order. Depending on the section flags, static
//! dependencies, conditional dependencies and renderer siblings are followed.
//! A module selected by one section is never selected again by a later one,
//! except for `require` sections, which resolve in a namespace of their own.

use anyhow::{Result, bail};
use log::{debug, error, trace};
use rustc_hash::FxHashSet;

use crate::{
    bundle_definition::{BundleConfiguration, BundleDefinition, SectionDefinition, SectionMode},
    bundle_format::{CORE_MODULE, GLOBAL_BOOTSTRAP_MODULE},
    dependency_graph::ModuleGraph,
    filter::FilterList,
    module_info::ModuleInfo,
    module_name::{is_library_descriptor, renderer_name, to_resource_name},
    pool::ModulePool,
    types::FxIndexSet,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSection {
    pub definition: SectionDefinition,
    pub modules: Vec<String>,
}

impl ResolvedSection {
    pub fn mode(&self) -> SectionMode {
        self.definition.mode
    }

    pub fn name(&self) -> Option<&str> {
        self.definition.name.as_deref()
    }

    pub fn declare_raw_modules(&self) -> bool {
        self.definition.declare_raw_modules
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedBundleDefinition {
    definition: BundleDefinition,
    sections: Vec<ResolvedSection>,
}

impl ResolvedBundleDefinition {
    pub fn name(&self) -> &str {
        &self.definition.name
    }

    pub fn definition(&self) -> &BundleDefinition {
        &self.definition
    }

    pub fn configuration(&self) -> Option<&BundleConfiguration> {
        self.definition.configuration.as_ref()
    }

    pub fn sections(&self) -> &[ResolvedSection] {
        &self.sections
    }

    /// Whether `module` is executed when the bundle is loaded
    ///
    /// Only raw and require sections execute their modules; preloaded modules
    /// merely get registered.
    pub fn executes(&self, module: &str) -> bool {
        self.sections.iter().any(|section| {
            matches!(section.mode(), SectionMode::Raw | SectionMode::Require)
                && section.modules.iter().any(|name| name == module)
        })
    }

    pub fn contains_core(&self) -> bool {
        self.executes(CORE_MODULE)
    }

    pub fn contains_global(&self) -> bool {
        self.executes(GLOBAL_BOOTSTRAP_MODULE)
    }

    /// Aggregated metadata of the bundle
    ///
    /// Require sections contribute dependencies, raw and preload sections
    /// contribute embedded sub-modules. Provided and bundle-info sections
    /// do not put any code into the bundle and are skipped.
    pub fn create_module_info(&self, pool: &dyn ModulePool) -> ModuleInfo {
        let mut info = ModuleInfo::new(self.name());
        for section in &self.sections {
            match section.mode() {
                SectionMode::Provided | SectionMode::BundleInfo => {}
                SectionMode::Require => {
                    for module in &section.modules {
                        info.add_dependency(module, false);
                    }
                }
                SectionMode::Raw | SectionMode::Preload => {
                    if section.mode() == SectionMode::Raw && !section.modules.is_empty() {
                        info.raw_module = true;
                    }
                    for module in &section.modules {
                        let mut sub_info = pool.get_module_info(module).unwrap_or_else(|err| {
                            debug!("No metadata for embedded module {module}: {err}");
                            ModuleInfo::new(module.as_str())
                        });
                        if sub_info.name.is_empty() {
                            sub_info.name.clone_from(module);
                        }
                        info.add_sub_module(&sub_info);
                    }
                }
            }
        }
        info
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ResolverOptions {
    /// Log missing dependencies instead of failing the resolution
    pub ignore_missing_modules: bool,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            ignore_missing_modules: true,
        }
    }
}

/// Visited and selected modules of one resolution
#[derive(Debug, Default)]
struct TraversalContext {
    visited: FxHashSet<String>,
    /// Selected modules in selection order
    selected: FxIndexSet<String>,
    repeated_visits: usize,
}

/// The section being walked together with its compiled filters
struct SectionWalk<'s> {
    section: &'s SectionDefinition,
    filters: FilterList,
}

#[derive(Clone, Copy)]
pub struct Resolver<'a> {
    pool: &'a dyn ModulePool,
    options: ResolverOptions,
}

impl std::fmt::Debug for Resolver<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl<'a> Resolver<'a> {
    pub fn new(pool: &'a dyn ModulePool) -> Self {
        Self::with_options(pool, ResolverOptions::default())
    }

    pub fn with_options(pool: &'a dyn ModulePool, options: ResolverOptions) -> Self {
        Self { pool, options }
    }

    pub fn pool(&self) -> &'a dyn ModulePool {
        self.pool
    }

    pub fn resolve(&self, definition: &BundleDefinition) -> Result<ResolvedBundleDefinition> {
        debug!("Resolving bundle {}", definition.name);
        let roots = self.pool.resource_names();
        let mut context = TraversalContext::default();

        let sections = definition
            .sections
            .iter()
            .map(|section| {
                let modules = self.collect_modules_for_section(&mut context, section, &roots)?;
                Ok(ResolvedSection {
                    definition: section.clone(),
                    modules,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        if context.repeated_visits > 0 {
            trace!(
                "{} repeated visits while resolving {}",
                context.repeated_visits, definition.name
            );
        }

        Ok(ResolvedBundleDefinition {
            definition: definition.clone(),
            sections,
        })
    }

    fn collect_modules_for_section(
        &self,
        context: &mut TraversalContext,
        section: &SectionDefinition,
        roots: &[String],
    ) -> Result<Vec<String>> {
        let walk = SectionWalk {
            section,
            filters: FilterList::new(&section.filters)?,
        };
        // a plain list of module names is walked in the listed order
        let explicit_roots: Vec<String>;
        let roots = match walk.filters.explicit_names() {
            Some(names) => {
                explicit_roots = names.into_iter().map(str::to_owned).collect();
                explicit_roots.as_slice()
            }
            None => roots,
        };

        let modules: Vec<String> = if section.mode == SectionMode::Require {
            let mut isolated = TraversalContext::default();
            self.walk_roots(&mut isolated, &walk, roots)?;
            context.repeated_visits += isolated.repeated_visits;
            isolated.selected.into_iter().collect()
        } else {
            let previously_selected = context.selected.len();
            self.walk_roots(context, &walk, roots)?;
            context
                .selected
                .iter()
                .skip(previously_selected)
                .cloned()
                .collect()
        };

        let modules = if section.mode == SectionMode::Raw && section.sort {
            ModuleGraph::from_pool(self.pool, &modules)?.stable_topological_order()
        } else {
            modules
        };

        debug!(
            "Resolved {} section{}: {} modules",
            section.mode,
            section
                .name
                .as_deref()
                .map(|name| format!(" '{name}'"))
                .unwrap_or_default(),
            modules.len()
        );
        Ok(modules)
    }

    fn walk_roots(
        &self,
        context: &mut TraversalContext,
        walk: &SectionWalk<'_>,
        roots: &[String],
    ) -> Result<()> {
        for root in roots {
            self.check_and_add(context, walk, root, 0, None)?;
        }
        Ok(())
    }

    /// Visit `name` and, if it is selected, whatever the section follows from it
    ///
    /// `missing_message` is logged when the module cannot be found; `None`
    /// makes the absence silent.
    fn check_and_add(
        &self,
        context: &mut TraversalContext,
        walk: &SectionWalk<'_>,
        name: &str,
        depth: usize,
        missing_message: Option<&str>,
    ) -> Result<()> {
        if context.visited.contains(name) {
            if depth > 0 {
                context.repeated_visits += 1;
            }
            return Ok(());
        }
        if !walk.filters.matches(name, depth > 0) {
            return Ok(());
        }
        context.visited.insert(name.to_owned());

        let resource = match self.pool.find_resource_with_info(name) {
            Ok(resource) => resource,
            Err(err) => {
                match missing_message {
                    Some(message) if !self.options.ignore_missing_modules => {
                        bail!("{message}: {err}")
                    }
                    Some(message) => error!("{message}"),
                    None => debug!("Skipping unavailable module {name}: {err}"),
                }
                return Ok(());
            }
        };
        let default_info;
        let info = if let Some(info) = resource.info() {
            info
        } else {
            default_info = ModuleInfo::new(name);
            &default_info
        };

        if self.is_decomposable(name, info) {
            debug!(
                "Unpacking bundle {name} into its {} sub-modules",
                info.sub_modules.len()
            );
            for sub_module in &info.sub_modules {
                let sub_module = to_resource_name(sub_module);
                self.check_and_add(context, walk, &sub_module, depth + 1, None)?;
            }
            return Ok(());
        }

        context.selected.insert(name.to_owned());

        if walk.section.resolve {
            for dependency in &info.dependencies {
                if !walk.section.resolve_conditional && info.is_conditional_dependency(dependency)
                {
                    continue;
                }
                let dependency = to_resource_name(dependency);
                let message = format!("missing module {dependency}, required by {name}");
                self.check_and_add(context, walk, &dependency, depth + 1, Some(&message))?;
            }
        }

        if walk.section.renderer
            && let Some(renderer) = renderer_name(name)
        {
            self.check_and_add(context, walk, &renderer, depth + 1, None)?;
        }

        Ok(())
    }

    /// A prebuilt bundle can be unpacked when at least one of its sub-modules
    /// also exists on its own; otherwise it is kept as one opaque module.
    fn is_decomposable(&self, name: &str, info: &ModuleInfo) -> bool {
        !info.sub_modules.is_empty()
            && !is_library_descriptor(name)
            && info
                .sub_modules
                .iter()
                .any(|sub_module| self.pool.contains(&to_resource_name(sub_module)))
    }
}
