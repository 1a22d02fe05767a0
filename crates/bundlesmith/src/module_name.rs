//! Conversions between the different spellings of a module name
//!
//! Resources are addressed by their slash-separated file name
//! (`sap/m/Button.js`). The loader addresses modules by their require name
//! (`sap/m/Button`), and the legacy global API by a dotted name
//! (`sap.m.Button`).

use std::borrow::Cow;

use cow_utils::CowUtils;

/// Placeholder in a bundle name that is replaced by the part index
pub const PART_PLACEHOLDER: &str = "__part__";

const SCRIPT_EXTENSION: &str = ".js";
const RENDERER_SUFFIX: &str = "Renderer.js";

/// Strip the `.js` extension: `a/b/c.js` becomes `a/b/c`
pub fn to_require_name(name: &str) -> &str {
    name.strip_suffix(SCRIPT_EXTENSION).unwrap_or(name)
}

/// Dotted name used by the legacy global API: `a/b/c.js` becomes `a.b.c`
pub fn to_legacy_name(name: &str) -> Cow<'_, str> {
    to_require_name(name).cow_replace('/', ".")
}

/// Name of the renderer sibling of a control module
///
/// Returns `None` for non-script resources and for modules that already are
/// renderers.
pub fn renderer_name(name: &str) -> Option<String> {
    if name.ends_with(RENDERER_SUFFIX) {
        return None;
    }
    name.strip_suffix(SCRIPT_EXTENSION)
        .map(|base| format!("{base}{RENDERER_SUFFIX}"))
}

/// Normalise a module reference to a resource name
///
/// Sub-module lists of prebuilt bundles may use require names; those get
/// the script extension appended so they can be looked up in the pool.
pub fn to_resource_name(name: &str) -> Cow<'_, str> {
    let file_name = name.rsplit('/').next().unwrap_or(name);
    if file_name.contains('.') {
        Cow::Borrowed(name)
    } else {
        Cow::Owned(format!("{name}{SCRIPT_EXTENSION}"))
    }
}

/// Whether the resource is a library descriptor (`library.js`)
///
/// Descriptors list the modules of their library as sub-modules but are
/// never unpacked.
pub fn is_library_descriptor(name: &str) -> bool {
    name == "library.js" || name.ends_with("/library.js")
}

/// Name template for the parts of a split bundle
///
/// Names that lack the placeholder get one inserted before the extension of
/// their last path segment.
pub fn part_name_template(name: &str) -> String {
    if name.contains(PART_PLACEHOLDER) {
        return name.to_owned();
    }
    let dir_end = name.rfind('/').map_or(0, |idx| idx + 1);
    match name[dir_end..].find('.') {
        Some(dot) => {
            let (stem, extension) = name.split_at(dir_end + dot);
            format!("{stem}-{PART_PLACEHOLDER}{extension}")
        }
        None => format!("{name}-{PART_PLACEHOLDER}"),
    }
}

/// Concrete name of the part with the given index
pub fn part_name(template: &str, index: usize) -> String {
    template.replacen(PART_PLACEHOLDER, &index.to_string(), 1)
}
