//! Size-balanced splitting of one bundle definition into several parts
//!
//! The definition is resolved once, every module is measured, and the
//! preload content is re-partitioned into `number_of_parts` definitions of
//! roughly equal size. The produced definitions list their modules
//! explicitly and no longer follow dependencies.

use anyhow::{Context, Result};
use log::{debug, info};

use crate::{
    bundle_definition::{BundleDefinition, SectionDefinition, SectionMode},
    code_generator::embedding::{escape_properties, minify_markup},
    minifier::{Minifier, MinifyOptions},
    module_name::{part_name, part_name_template, to_require_name},
    resolver::{ResolvedSection, Resolver},
    types::{FxIndexMap, ResourceKind},
};

/// Rough size of an emitted configuration block
const CONFIGURATION_SIZE_ESTIMATE: usize = 1024;

/// Length of a synchronous require statement without the module name
const REQUIRE_STATEMENT_OVERHEAD: usize = "sap.ui.requireSync('');".len();

#[derive(Debug, Clone, Copy)]
pub struct SplitOptions {
    pub number_of_parts: usize,
    /// Measure scripts after minification
    pub optimize: bool,
}

pub struct AutoSplitter<'a> {
    resolver: Resolver<'a>,
    minifier: Option<&'a dyn Minifier>,
}

impl std::fmt::Debug for AutoSplitter<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AutoSplitter")
            .field("resolver", &self.resolver)
            .field("has_minifier", &self.minifier.is_some())
            .finish()
    }
}

/// The part currently being filled
struct PartBuilder {
    definition: BundleDefinition,
    size: usize,
}

impl<'a> AutoSplitter<'a> {
    pub fn new(resolver: Resolver<'a>, minifier: Option<&'a dyn Minifier>) -> Self {
        Self { resolver, minifier }
    }

    pub fn run(
        &self,
        definition: &BundleDefinition,
        options: SplitOptions,
    ) -> Result<Vec<BundleDefinition>> {
        let number_of_parts = options.number_of_parts.max(1);
        let resolved = self.resolver.resolve(definition)?;

        let mut module_sizes: FxIndexMap<&str, usize> = FxIndexMap::default();
        let mut total_size = 0;
        if resolved.configuration().is_some() {
            total_size += CONFIGURATION_SIZE_ESTIMATE;
        }
        for section in resolved.sections() {
            match section.mode() {
                SectionMode::Provided => {}
                SectionMode::Raw | SectionMode::Preload => {
                    for module in &section.modules {
                        let size = self.estimate_size(module, options.optimize)?;
                        module_sizes.insert(module, size);
                        total_size += size;
                    }
                }
                SectionMode::Require => {
                    total_size += section
                        .modules
                        .iter()
                        .map(|module| require_statement_size(module))
                        .sum::<usize>();
                }
                SectionMode::BundleInfo => total_size += bundle_info_size(section),
            }
        }

        let part_size = total_size / number_of_parts;
        info!(
            "Splitting {}: total size of modules {total_size} (chars), target size for each of the {number_of_parts} parts: {part_size} (chars)",
            definition.name
        );

        let template = part_name_template(&definition.name);
        let mut parts: Vec<BundleDefinition> = Vec::new();
        let mut current = PartBuilder {
            definition: BundleDefinition {
                name: part_name(&template, 0),
                configuration: definition.configuration.clone(),
                sections: Vec::new(),
            },
            size: if definition.configuration.is_some() {
                CONFIGURATION_SIZE_ESTIMATE
            } else {
                0
            },
        };
        let mut require_sections: Vec<SectionDefinition> = Vec::new();

        for section in resolved.sections() {
            match section.mode() {
                // already-available modules need no mention once resolved
                SectionMode::Provided => {}
                SectionMode::Raw => {
                    // raw sections are never split
                    let mut raw = explicit_section(section);
                    raw.declare_raw_modules = section.definition.declare_raw_modules;
                    raw.sort = section.definition.sort;
                    current.size += section
                        .modules
                        .iter()
                        .map(|module| module_sizes.get(module.as_str()).copied().unwrap_or(0))
                        .sum::<usize>();
                    current.definition.sections.push(raw);
                }
                SectionMode::Preload => {
                    let mut preload = explicit_section(section);
                    preload.filters.clear();
                    for module in &section.modules {
                        let module_size = module_sizes.get(module.as_str()).copied().unwrap_or(0);
                        // current + module_size / 2 > total_size / number_of_parts, without rounding
                        if parts.len() + 1 < number_of_parts
                            && number_of_parts * (2 * current.size + module_size) > 2 * total_size
                        {
                            if !preload.filters.is_empty() {
                                current.definition.sections.push(preload.clone());
                            }
                            preload.filters.clear();
                            let index = parts.len() + 1;
                            let finished = std::mem::replace(
                                &mut current,
                                PartBuilder {
                                    definition: BundleDefinition::new(part_name(&template, index)),
                                    size: 0,
                                },
                            );
                            debug!(
                                "Closing part {} at {} (chars)",
                                finished.definition.name, finished.size
                            );
                            parts.push(finished.definition);
                        }
                        preload.filters.push(module.clone());
                        current.size += module_size;
                    }
                    if !preload.filters.is_empty() {
                        current.definition.sections.push(preload);
                    }
                }
                SectionMode::Require => {
                    let require = explicit_section(section);
                    current.size += section
                        .modules
                        .iter()
                        .map(|module| require_statement_size(module))
                        .sum::<usize>();
                    current.definition.sections.push(require.clone());
                    require_sections.push(require);
                }
                SectionMode::BundleInfo => {
                    current.size += bundle_info_size(section);
                    current.definition.sections.push(explicit_section(section));
                }
            }
        }
        debug!(
            "Closing part {} at {} (chars)",
            current.definition.name, current.size
        );
        parts.push(current.definition);

        // every part re-declares the same require obligations
        for part in &mut parts {
            for require in &require_sections {
                if !part.sections.contains(require) {
                    part.sections.push(require.clone());
                }
            }
        }

        info!("Split {} into {} parts", definition.name, parts.len());
        Ok(parts)
    }

    /// Estimated contribution of `module` to the generated bundle
    ///
    /// Unknown modules count as empty. Minifier failures are fatal.
    pub fn estimate_size(&self, module: &str, optimize: bool) -> Result<usize> {
        let resource = match self.resolver.pool().find_resource_with_info(module) {
            Ok(resource) => resource,
            Err(err) => {
                debug!("Cannot measure {module}: {err}");
                return Ok(0);
            }
        };

        if let Some(info) = resource.info()
            && let Some(compressed_size) = info.compressed_size
            && info.size != Some(compressed_size)
        {
            return Ok(compressed_size as usize);
        }

        let size = match ResourceKind::from_name(module) {
            ResourceKind::Script => match self.minifier {
                Some(minifier) if optimize => minifier
                    .minify(module, &resource.text(), &MinifyOptions::default())
                    .with_context(|| format!("Failed to minify {module}"))?
                    .len(),
                _ => resource.buffer().len(),
            },
            ResourceKind::Properties => escape_properties(&resource.latin1_text()).len(),
            ResourceKind::Markup if optimize => minify_markup(&resource.text()).len(),
            _ => resource.buffer().len(),
        };
        Ok(size)
    }
}

/// Section that lists the resolved modules of `section` as its filters
fn explicit_section(section: &ResolvedSection) -> SectionDefinition {
    SectionDefinition {
        mode: section.mode(),
        name: section.definition.name.clone(),
        filters: section.modules.clone(),
        ..SectionDefinition::default()
    }
}

fn require_statement_size(module: &str) -> usize {
    REQUIRE_STATEMENT_OVERHEAD + to_require_name(module).len()
}

/// Quoted names plus separators
fn bundle_info_size(section: &ResolvedSection) -> usize {
    section.modules.iter().map(|module| module.len() + 3).sum()
}
