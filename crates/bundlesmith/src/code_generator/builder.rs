//! Generation of bundle files from bundle definitions
//!
//! The [`Builder`] resolves a definition, then streams every section into a
//! [`SegmentWriter`] in the dialect of the detected [`BundleFormat`]. Each
//! embedded module is written inside its own segment.

use anyhow::{Context, Result, bail};
use log::{debug, error, info, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{
    auto_splitter::{AutoSplitter, SplitOptions},
    bundle_definition::{BundleConfiguration, BundleDefinition, SectionMode},
    bundle_format::{BundleFormat, GLOBAL_BOOTSTRAP_MODULE},
    code_generator::{
        embedding::{
            escape_properties, make_string_literal, minify_markup, normalize_json, quoted_name,
        },
        predefine,
    },
    minifier::{Minifier, MinifyOptions},
    module_info::ModuleInfo,
    module_name::to_legacy_name,
    pool::{ModulePool, Resource},
    resolver::{ResolvedSection, Resolver, ResolverOptions},
    types::ResourceKind,
    writer::{Segment, SegmentWriter},
};

const OPTIMIZED_MARKER: &str = "window[\"sap-ui-optimized\"] = true;";
const BOOT_CORE: &str = "sap.ui.getCore().boot && sap.ui.getCore().boot();";
/// Raw content using this API needs all pending declarations to be in place
const LEGACY_API_PREFIX: &str = "jQuery.sap.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildOptions {
    /// Minify scripts, normalise JSON and minify markup
    pub optimize: bool,
    /// Mark bootstrap bundles as optimized
    pub decorate_bootstrap_module: bool,
    /// Wrap decorated bundles so a loader restart can unwind them
    pub add_try_catch_restart_wrapper: bool,
    /// Embed single registration modules as predefine calls
    pub use_predefine_calls: bool,
    /// Parenthesise embedded factories to request eager compilation
    pub avoid_lazy_parsing: bool,
    pub number_of_parts: usize,
    pub ignore_missing_modules: bool,
    pub optimized_sources_available: bool,
    pub debug_mode: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            optimize: false,
            decorate_bootstrap_module: true,
            add_try_catch_restart_wrapper: false,
            use_predefine_calls: false,
            avoid_lazy_parsing: false,
            number_of_parts: 1,
            ignore_missing_modules: true,
            optimized_sources_available: false,
            debug_mode: false,
        }
    }
}

/// One generated bundle file
#[derive(Debug, Clone, Serialize)]
pub struct BundleResult {
    pub name: String,
    pub content: String,
    pub bundle_info: ModuleInfo,
    /// Byte ranges contributed by the embedded modules
    pub segments: Vec<Segment>,
}

pub struct Builder<'a> {
    pool: &'a dyn ModulePool,
    minifier: Option<&'a dyn Minifier>,
    format: BundleFormat,
}

impl std::fmt::Debug for Builder<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Builder")
            .field("format", &self.format)
            .field("has_minifier", &self.minifier.is_some())
            .finish_non_exhaustive()
    }
}

impl<'a> Builder<'a> {
    pub fn new(pool: &'a dyn ModulePool) -> Self {
        Self {
            pool,
            minifier: None,
            format: BundleFormat::detect(pool),
        }
    }

    #[must_use]
    pub fn with_minifier(mut self, minifier: &'a dyn Minifier) -> Self {
        self.minifier = Some(minifier);
        self
    }

    pub fn format(&self) -> BundleFormat {
        self.format
    }

    /// Build `definition`, split into `number_of_parts` files when more than one
    /// part is requested
    pub fn create_bundle(
        &self,
        definition: &BundleDefinition,
        options: &BuildOptions,
    ) -> Result<Vec<BundleResult>> {
        let resolver = Resolver::with_options(
            self.pool,
            ResolverOptions {
                ignore_missing_modules: options.ignore_missing_modules,
            },
        );

        if options.number_of_parts <= 1 {
            return Ok(vec![self.build(&resolver, definition, options)?]);
        }

        let parts = AutoSplitter::new(resolver, self.minifier).run(
            definition,
            SplitOptions {
                number_of_parts: options.number_of_parts,
                optimize: options.optimize,
            },
        )?;
        parts
            .par_iter()
            .map(|part| {
                self.build(&resolver, part, options)
                    .with_context(|| format!("Failed to build part {}", part.name))
            })
            .collect()
    }

    fn build(
        &self,
        resolver: &Resolver<'_>,
        definition: &BundleDefinition,
        options: &BuildOptions,
    ) -> Result<BundleResult> {
        let resolved = resolver.resolve(definition)?;

        let decorate = options.decorate_bootstrap_module
            && ((options.optimized_sources_available && !options.debug_mode) || options.optimize)
            && self.format.should_decorate(&resolved);
        let wrap_in_try_catch = decorate && options.add_try_catch_restart_wrapper;

        let mut emitter = BundleEmitter {
            pool: self.pool,
            minifier: self.minifier,
            format: self.format,
            options,
            writer: SegmentWriter::new(),
            missing_raw_declarations: Vec::new(),
        };

        if decorate {
            emitter.writer.writeln(&[OPTIMIZED_MARKER]);
            if wrap_in_try_catch {
                emitter.writer.writeln(&["try {"]);
            }
        }

        if let Some(configuration) = resolved.configuration() {
            emitter.write_configuration(configuration);
        }

        for section in resolved.sections() {
            match section.mode() {
                SectionMode::Provided => {}
                SectionMode::Raw => emitter.write_raw(section)?,
                SectionMode::Preload => emitter.write_preload(section)?,
                SectionMode::BundleInfo => emitter.write_bundle_info(section)?,
                SectionMode::Require => emitter.write_require(section),
            }
        }
        emitter.write_missing_raw_declarations();

        if resolved.contains_core() {
            emitter.writer.ensure_new_line();
            emitter.writer.writeln(&[BOOT_CORE]);
        }
        if wrap_in_try_catch {
            emitter.writer.ensure_new_line();
            emitter.writer.writeln(&["} catch(oError) {"]);
            emitter
                .writer
                .writeln(&["if (oError.name != \"Restart\") { throw oError; }"]);
            emitter.writer.writeln(&["}"]);
        }

        let mut bundle_info = resolved.create_module_info(self.pool);
        let (content, segments) = emitter.writer.into_parts();
        bundle_info.size = Some(content.len() as u64);
        info!(
            "Created bundle {} ({} bytes, {} segments)",
            resolved.name(),
            content.len(),
            segments.len()
        );

        Ok(BundleResult {
            name: resolved.name().to_owned(),
            content,
            bundle_info,
            segments,
        })
    }
}

/// Output state of one bundle
struct BundleEmitter<'b> {
    pool: &'b dyn ModulePool,
    minifier: Option<&'b dyn Minifier>,
    format: BundleFormat,
    options: &'b BuildOptions,
    writer: SegmentWriter,
    /// Raw modules whose legacy declaration is still pending
    missing_raw_declarations: Vec<String>,
}

impl BundleEmitter<'_> {
    fn write_configuration(&mut self, configuration: &BundleConfiguration) {
        let writer = &mut self.writer;
        writer.writeln(&["(function(window){"]);
        writer.writeln(&["\tvar cfg=window['sap-ui-config']=window['sap-ui-config']||{},"]);
        writer.writeln(&["\t\troots=cfg.resourceRoots=cfg.resourceRoots||{};"]);
        for (property, value) in &configuration.properties {
            writer.writeln(&["\tcfg[", &quoted_name(property), "]=", &value.to_string(), ";"]);
        }
        for (namespace, url) in &configuration.resource_roots {
            writer.writeln(&["\troots[", &quoted_name(namespace), "]=", &quoted_name(url), ";"]);
        }
        writer.writeln(&["}(window));"]);
    }

    fn write_raw(&mut self, section: &ResolvedSection) -> Result<()> {
        for module in &section.modules {
            let resource = match self.pool.find_resource(module) {
                Ok(resource) => resource,
                Err(err) => {
                    error!("Cannot embed raw module {module}: {err}");
                    continue;
                }
            };
            let content = self.script_content(module, &resource)?;
            if content.contains(LEGACY_API_PREFIX) {
                self.write_missing_raw_declarations();
            }

            self.writer.ensure_new_line();
            self.writer.start_segment(module)?;
            self.writer.write(&[&content]);
            self.writer.end_segment()?;
            self.writer.ensure_new_line();

            if section.declare_raw_modules() {
                self.missing_raw_declarations.push(module.clone());
            }
            if module == GLOBAL_BOOTSTRAP_MODULE {
                self.write_missing_raw_declarations();
            }
        }
        Ok(())
    }

    fn write_missing_raw_declarations(&mut self) {
        if self.missing_raw_declarations.is_empty() {
            return;
        }
        self.writer.ensure_new_line();
        for module in std::mem::take(&mut self.missing_raw_declarations) {
            self.writer.writeln(&[
                "jQuery.sap.declare(",
                &make_string_literal(&to_legacy_name(&module)),
                ", false);",
            ]);
        }
    }

    fn write_preload(&mut self, section: &ResolvedSection) -> Result<()> {
        let mut modules: Vec<&str> = section.modules.iter().map(String::as_str).collect();
        modules.sort_unstable();

        let mut remaining = Vec::with_capacity(modules.len());
        for module in modules {
            if self.options.use_predefine_calls
                && ResourceKind::from_name(module).is_script()
                && self.write_predefine(module)?
            {
                continue;
            }
            remaining.push(module);
        }
        if remaining.is_empty() {
            return Ok(());
        }

        self.writer.ensure_new_line();
        self.format.before_preloads(&mut self.writer, section);
        let mut separator = "";
        for module in remaining {
            let resource = match self.pool.find_resource_with_info(module) {
                Ok(resource) => resource,
                Err(err) => {
                    error!("Cannot embed module {module}: {err}");
                    continue;
                }
            };
            let kind = ResourceKind::from_name(module);
            if kind == ResourceKind::Unknown {
                error!("Cannot embed module {module}: unsupported resource type");
                continue;
            }
            self.writer.write(&[separator]);
            separator = ",\n";
            self.writer.start_segment(module)?;
            self.writer.write(&[&quoted_name(module), ":"]);
            self.write_embedding(module, kind, &resource)?;
            self.writer.end_segment()?;
        }
        self.writer.ensure_new_line();
        self.format.after_preloads(&mut self.writer, section);
        Ok(())
    }

    /// Emit `module` as a predefine call; `false` if it cannot be rewritten
    fn write_predefine(&mut self, module: &str) -> Result<bool> {
        let resource = match self.pool.find_resource(module) {
            Ok(resource) => resource,
            Err(err) => {
                debug!("Cannot rewrite {module}: {err}");
                return Ok(false);
            }
        };
        let content = self.script_content(module, &resource)?;
        let Some(rewritten) =
            predefine::try_rewrite(module, &content, self.options.avoid_lazy_parsing)
        else {
            return Ok(false);
        };

        self.writer.ensure_new_line();
        self.writer.start_segment(module)?;
        self.writer.write(&[&rewritten.code]);
        self.writer.end_segment()?;
        self.writer.ensure_new_line();
        Ok(true)
    }

    fn write_embedding(
        &mut self,
        module: &str,
        kind: ResourceKind,
        resource: &Resource,
    ) -> Result<()> {
        match kind {
            ResourceKind::Script => {
                let content = self.script_content(module, resource)?;
                let info = resource.info();
                if info.is_some_and(|info| info.requires_top_level_scope) {
                    warn!(
                        "Module {module} requires top level scope and can only be embedded as a string (requires 'eval')"
                    );
                    self.writer.write(&[&make_string_literal(&content)]);
                    return Ok(());
                }
                let (open, close) = if self.options.avoid_lazy_parsing {
                    ("(function(){\n", "})")
                } else {
                    ("function(){\n", "}")
                };
                self.writer.write(&[open, &content]);
                let globals = info.map_or(&[][..], |info| info.exposed_global_names.as_slice());
                for global in globals {
                    self.writer.ensure_new_line();
                    self.writer.write(&["this.", global, "=", global, ";"]);
                }
                self.writer.ensure_new_line();
                self.writer.write(&[close]);
            }
            ResourceKind::Properties => {
                let text = resource.latin1_text();
                self.writer
                    .write(&[&make_string_literal(&escape_properties(&text))]);
            }
            ResourceKind::Json => {
                let text = resource.text();
                let json = if self.options.optimize {
                    normalize_json(module, &text).into_owned()
                } else {
                    text.into_owned()
                };
                self.writer.write(&[&make_string_literal(&json)]);
            }
            ResourceKind::Markup => {
                let text = resource.text();
                let markup = if self.options.optimize {
                    minify_markup(&text).into_owned()
                } else {
                    text.into_owned()
                };
                self.writer.write(&[&make_string_literal(&markup)]);
            }
            ResourceKind::Text => {
                self.writer.write(&[&make_string_literal(&resource.text())]);
            }
            ResourceKind::Unknown => bail!("Cannot embed module {module}: unsupported resource type"),
        }
        Ok(())
    }

    fn write_bundle_info(&mut self, section: &ResolvedSection) -> Result<()> {
        let name = section
            .name()
            .context("A bundleInfo section requires a name")?;
        if !name.ends_with(".js") {
            bail!("Bundle info name {name} is missing the .js file extension");
        }
        let modules: Vec<String> = section.modules.iter().map(|module| quoted_name(module)).collect();
        self.writer.ensure_new_line();
        self.writer.writeln(&[
            "sap.ui.loader.config({bundlesUI5:{",
            &quoted_name(name),
            ":[",
            &modules.join(","),
            "]}});",
        ]);
        Ok(())
    }

    fn write_require(&mut self, section: &ResolvedSection) {
        for module in &section.modules {
            self.writer.ensure_new_line();
            self.format.require_sync(&mut self.writer, module);
        }
    }

    /// Script content, minified when optimizing with a minifier at hand
    fn script_content(&self, module: &str, resource: &Resource) -> Result<String> {
        let text = resource.text();
        match self.minifier {
            Some(minifier) if self.options.optimize => Ok(minifier
                .minify(module, &text, &MinifyOptions::default())
                .with_context(|| format!("Failed to minify {module}"))?
                .code),
            _ => Ok(text.into_owned()),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{bundle_definition::SectionDefinition, pool::MemoryPool};

    #[test]
    fn test_configuration_block() {
        let pool = MemoryPool::new();
        let mut configuration = BundleConfiguration::default();
        configuration
            .properties
            .insert("theme".to_owned(), serde_json::Value::from("sap_fiori_3"));
        configuration
            .resource_roots
            .insert("my.app".to_owned(), "./".to_owned());
        let definition = BundleDefinition::new("boot.js").with_configuration(configuration);

        let results = Builder::new(&pool)
            .create_bundle(&definition, &BuildOptions::default())
            .unwrap();
        assert_eq!(
            results[0].content,
            "(function(window){\n\
             \tvar cfg=window['sap-ui-config']=window['sap-ui-config']||{},\n\
             \t\troots=cfg.resourceRoots=cfg.resourceRoots||{};\n\
             \tcfg[\"theme\"]=\"sap_fiori_3\";\n\
             \troots[\"my.app\"]=\"./\";\n\
             }(window));\n"
        );
    }

    #[test]
    fn test_require_section_and_boot() {
        let mut pool = MemoryPool::new();
        pool.add(Resource::new("sap/ui/core/Core.js", "sap.ui.define([], function(){});"));
        let definition = BundleDefinition::new("boot.js").with_section(SectionDefinition::new(
            SectionMode::Require,
            ["sap/ui/core/Core.js"],
        ));

        let results = Builder::new(&pool)
            .create_bundle(&definition, &BuildOptions::default())
            .unwrap();
        assert_eq!(
            results[0].content,
            "sap.ui.requireSync(\"sap/ui/core/Core\");\n\
             sap.ui.getCore().boot && sap.ui.getCore().boot();\n"
        );
        assert!(results[0].segments.is_empty());
        assert!(
            results[0]
                .bundle_info
                .dependencies
                .contains("sap/ui/core/Core.js")
        );
    }

    #[test]
    fn test_exposed_globals_inside_wrapper() {
        let mut pool = MemoryPool::new();
        let mut info = ModuleInfo::new("lib/legacy.js");
        info.exposed_global_names.push("Legacy".to_owned());
        pool.add_module(info, "var Legacy = {};");
        let definition = BundleDefinition::new("b.js")
            .with_section(SectionDefinition::new(SectionMode::Preload, ["lib/"]));

        let results = Builder::new(&pool)
            .create_bundle(&definition, &BuildOptions::default())
            .unwrap();
        assert_eq!(
            results[0].content,
            "jQuery.sap.registerPreloadedModules({\n\
             \"version\":\"2.0\",\n\
             \"modules\":{\n\
             \"lib/legacy.js\":function(){\n\
             var Legacy = {};\n\
             this.Legacy=Legacy;\n\
             }\n\
             }});\n"
        );
    }
}
