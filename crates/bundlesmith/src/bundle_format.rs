//! Output dialects for the two generations of the runtime loader
//!
//! The dialect is chosen once per builder by probing the pool for the modern
//! loader module.

use log::debug;

use crate::{
    code_generator::embedding::quoted_name,
    module_name::to_require_name,
    pool::ModulePool,
    resolver::{ResolvedBundleDefinition, ResolvedSection},
    writer::SegmentWriter,
};

/// The modern loader; its presence selects [`BundleFormat::Modern`]
pub const LOADER_MODULE: &str = "ui5loader.js";
pub const LOADER_AUTOCONFIG_MODULE: &str = "ui5loader-autoconfig.js";
/// Legacy bootstrap that installs the global `jQuery.sap` API
pub const GLOBAL_BOOTSTRAP_MODULE: &str = "jquery.sap.global.js";
pub const LEGACY_LOADER_MODULE: &str = "jquery.sap.loader.js";
/// Core module; bundles executing it trigger the boot sequence
pub const CORE_MODULE: &str = "sap/ui/core/Core.js";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BundleFormat {
    /// Registration through `jQuery.sap.registerPreloadedModules`
    Legacy,
    /// Registration through `sap.ui.require.preload`
    Modern,
}

impl BundleFormat {
    pub fn detect(pool: &dyn ModulePool) -> Self {
        let format = if pool.contains(LOADER_MODULE) {
            Self::Modern
        } else {
            Self::Legacy
        };
        debug!("Using {format:?} bundle format");
        format
    }

    pub fn before_preloads(self, writer: &mut SegmentWriter, section: &ResolvedSection) {
        match self {
            Self::Legacy => {
                writer.writeln(&["jQuery.sap.registerPreloadedModules({"]);
                if let Some(name) = section.name() {
                    writer.writeln(&["\"name\":", &quoted_name(name), ","]);
                }
                writer.writeln(&["\"version\":\"2.0\","]);
                writer.writeln(&["\"modules\":{"]);
            }
            Self::Modern => writer.writeln(&["sap.ui.require.preload({"]),
        }
    }

    pub fn after_preloads(self, writer: &mut SegmentWriter, section: &ResolvedSection) {
        match self {
            Self::Legacy => writer.writeln(&["}});"]),
            Self::Modern => {
                writer.write(&["}"]);
                if let Some(name) = section.name() {
                    writer.write(&[",", &quoted_name(name)]);
                }
                writer.writeln(&[");"]);
            }
        }
    }

    pub fn require_sync(self, writer: &mut SegmentWriter, module: &str) {
        writer.writeln(&[
            "sap.ui.requireSync(",
            &quoted_name(to_require_name(module)),
            ");",
        ]);
    }

    /// Whether the bundle gets the "optimized" marker (and restart wrapper)
    pub fn should_decorate(self, resolved: &ResolvedBundleDefinition) -> bool {
        match self {
            Self::Legacy => resolved.executes(GLOBAL_BOOTSTRAP_MODULE),
            Self::Modern => [
                LOADER_MODULE,
                LOADER_AUTOCONFIG_MODULE,
                GLOBAL_BOOTSTRAP_MODULE,
                CORE_MODULE,
            ]
            .iter()
            .any(|module| resolved.executes(module)),
        }
    }
}
