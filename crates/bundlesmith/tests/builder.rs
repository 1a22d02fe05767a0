use anyhow::{Result, bail};
use bundlesmith::{
    bundle_definition::{BundleDefinition, SectionDefinition, SectionMode},
    bundle_format::{BundleFormat, GLOBAL_BOOTSTRAP_MODULE, LOADER_MODULE},
    code_generator::{BuildOptions, Builder, BundleResult},
    module_info::ModuleInfo,
    pool::{MemoryPool, Resource},
};
use pretty_assertions::assert_eq;

fn build(pool: &MemoryPool, definition: &BundleDefinition, options: &BuildOptions) -> BundleResult {
    let mut results = Builder::new(pool).create_bundle(definition, options).unwrap();
    assert_eq!(results.len(), 1);
    results.remove(0)
}

fn segment_text<'r>(result: &'r BundleResult, module: &str) -> &'r str {
    let segment = result
        .segments
        .iter()
        .find(|segment| segment.module == module)
        .unwrap();
    &result.content[segment.start_index..segment.end_index]
}

#[test]
fn test_legacy_preload_bundle() {
    let mut pool = MemoryPool::new();
    pool.add(Resource::new("app/b.js", "var b;"));
    pool.add(Resource::new("app/a.js", "var a;"));
    pool.add(Resource::new("app/notes.txt", "it's"));
    let definition = BundleDefinition::new("app/Component-preload.js").with_section(
        SectionDefinition::new(SectionMode::Preload, ["app/"]).named("app/Component-preload"),
    );

    let result = build(&pool, &definition, &BuildOptions::default());
    assert_eq!(
        result.content,
        "jQuery.sap.registerPreloadedModules({\n\
         \"name\":\"app/Component-preload\",\n\
         \"version\":\"2.0\",\n\
         \"modules\":{\n\
         \"app/a.js\":function(){\n\
         var a;\n\
         },\n\
         \"app/b.js\":function(){\n\
         var b;\n\
         },\n\
         \"app/notes.txt\":'it\\'s'\n\
         }});\n"
    );
    assert_eq!(segment_text(&result, "app/a.js"), "\"app/a.js\":function(){\nvar a;\n}");
    assert_eq!(segment_text(&result, "app/notes.txt"), "\"app/notes.txt\":'it\\'s'");
    assert_eq!(result.bundle_info.size, Some(result.content.len() as u64));
    assert_eq!(
        result.bundle_info.sub_modules,
        vec!["app/b.js", "app/a.js", "app/notes.txt"]
    );
}

#[test]
fn test_modern_preload_bundle_with_predefine_calls() {
    let mut pool = MemoryPool::new();
    pool.add(Resource::new(LOADER_MODULE, "var loader;"));
    pool.add(Resource::new(
        "app/Main.js",
        "sap.ui.define([\"app/Util\"], function(Util){ return Util; });",
    ));
    pool.add(Resource::new("app/legacy.js", "window.legacy = true;"));
    let definition = BundleDefinition::new("app/bundle.js").with_section(
        SectionDefinition::new(SectionMode::Preload, ["app/"]).named("app-bundle"),
    );
    let options = BuildOptions {
        use_predefine_calls: true,
        ..BuildOptions::default()
    };

    assert_eq!(Builder::new(&pool).format(), BundleFormat::Modern);
    let result = build(&pool, &definition, &options);
    assert_eq!(
        result.content,
        "sap.ui.predefine(\"app/Main\", [\"app/Util\"], function(Util){ return Util; });\n\
         sap.ui.require.preload({\n\
         \"app/legacy.js\":function(){\n\
         window.legacy = true;\n\
         }\n\
         },\"app-bundle\");\n"
    );
    assert_eq!(
        segment_text(&result, "app/Main.js"),
        "sap.ui.predefine(\"app/Main\", [\"app/Util\"], function(Util){ return Util; });"
    );
}

#[test]
fn test_all_modules_rewritten_skips_preload_wrapper() {
    let mut pool = MemoryPool::new();
    pool.add(Resource::new("app/Main.js", "define(function(){});"));
    let definition = BundleDefinition::new("app/bundle.js")
        .with_section(SectionDefinition::new(SectionMode::Preload, ["app/"]));
    let options = BuildOptions {
        use_predefine_calls: true,
        avoid_lazy_parsing: true,
        ..BuildOptions::default()
    };

    let result = build(&pool, &definition, &options);
    assert_eq!(
        result.content,
        "sap.ui.predefine(\"app/Main\", (function(){}));\n"
    );
}

#[test]
fn test_eager_function_wrapper_and_top_level_scope() {
    let mut pool = MemoryPool::new();
    pool.add(Resource::new("lib/eager.js", "var x;"));
    let mut info = ModuleInfo::new("lib/global.js");
    info.requires_top_level_scope = true;
    pool.add_module(info, "var y = 'g';");
    let definition = BundleDefinition::new("lib/bundle.js")
        .with_section(SectionDefinition::new(SectionMode::Preload, ["lib/"]));
    let options = BuildOptions {
        avoid_lazy_parsing: true,
        ..BuildOptions::default()
    };

    let result = build(&pool, &definition, &options);
    assert_eq!(
        segment_text(&result, "lib/eager.js"),
        "\"lib/eager.js\":(function(){\nvar x;\n})"
    );
    assert_eq!(
        segment_text(&result, "lib/global.js"),
        "\"lib/global.js\":'var y = \\'g\\';'"
    );
}

#[test]
fn test_unknown_resource_types_are_skipped() {
    let mut pool = MemoryPool::new();
    pool.add(Resource::new("app/logo.png", vec![0x89, b'P', b'N', b'G']));
    pool.add(Resource::new("app/a.js", "var a;"));
    let definition = BundleDefinition::new("app/bundle.js")
        .with_section(SectionDefinition::new(SectionMode::Preload, ["app/"]));

    let result = build(&pool, &definition, &BuildOptions::default());
    assert!(!result.content.contains("logo.png"));
    let modules: Vec<&str> = result
        .segments
        .iter()
        .map(|segment| segment.module.as_str())
        .collect();
    assert_eq!(modules, vec!["app/a.js"]);
}

#[test]
fn test_optimized_resources() {
    let mut pool = MemoryPool::new();
    pool.add(Resource::new("app/data.json", "{\n  \"a\": 1\n}"));
    pool.add(Resource::new("app/i18n.properties", vec![b'k', b'=', 0xFC]));
    pool.add(Resource::new(
        "app/Main.view.xml",
        "<View>\n  <!-- note -->\n  <Text/>\n</View>\n",
    ));
    pool.add(Resource::new("app/Main.js", "var main  =  1;"));
    let definition = BundleDefinition::new("app/bundle.js")
        .with_section(SectionDefinition::new(SectionMode::Preload, ["app/"]));
    let options = BuildOptions {
        optimize: true,
        ..BuildOptions::default()
    };
    let minifier = |_: &str, code: &str| -> Result<String> { Ok(code.replace("  ", "")) };

    let mut results = Builder::new(&pool)
        .with_minifier(&minifier)
        .create_bundle(&definition, &options)
        .unwrap();
    let result = results.remove(0);
    assert_eq!(segment_text(&result, "app/data.json"), "\"app/data.json\":'{\\\"a\\\":1}'");
    assert_eq!(
        segment_text(&result, "app/i18n.properties"),
        "\"app/i18n.properties\":'k=\\\\u00FC'"
    );
    assert_eq!(
        segment_text(&result, "app/Main.view.xml"),
        "\"app/Main.view.xml\":'<View><Text/></View>'"
    );
    assert_eq!(
        segment_text(&result, "app/Main.js"),
        "\"app/Main.js\":function(){\nvar main=1;\n}"
    );
}

#[test]
fn test_minifier_failure_is_fatal() {
    let mut pool = MemoryPool::new();
    pool.add(Resource::new("app/a.js", "var a;"));
    let definition = BundleDefinition::new("app/bundle.js")
        .with_section(SectionDefinition::new(SectionMode::Preload, ["app/"]));
    let options = BuildOptions {
        optimize: true,
        ..BuildOptions::default()
    };
    let minifier = |_: &str, _: &str| -> Result<String> { bail!("unexpected token") };

    let err = Builder::new(&pool)
        .with_minifier(&minifier)
        .create_bundle(&definition, &options)
        .unwrap_err();
    assert!(format!("{err:#}").contains("Failed to minify app/a.js"));
}

#[test]
fn test_decorated_bootstrap_with_restart_wrapper() {
    let mut pool = MemoryPool::new();
    pool.add(Resource::new(GLOBAL_BOOTSTRAP_MODULE, "var jQuery = {};"));
    let definition = BundleDefinition::new("sap-ui-core.js").with_section(
        SectionDefinition::new(SectionMode::Raw, [GLOBAL_BOOTSTRAP_MODULE]),
    );
    let options = BuildOptions {
        optimize: true,
        add_try_catch_restart_wrapper: true,
        ..BuildOptions::default()
    };

    let result = build(&pool, &definition, &options);
    assert_eq!(
        result.content,
        "window[\"sap-ui-optimized\"] = true;\n\
         try {\n\
         var jQuery = {};\n\
         } catch(oError) {\n\
         if (oError.name != \"Restart\") { throw oError; }\n\
         }\n"
    );
    assert_eq!(segment_text(&result, GLOBAL_BOOTSTRAP_MODULE), "var jQuery = {};");
    assert!(result.bundle_info.raw_module);

    // unoptimized builds are not decorated
    let plain = build(&pool, &definition, &BuildOptions::default());
    assert_eq!(plain.content, "var jQuery = {};\n");
}

#[test]
fn test_deferred_raw_declarations() {
    let mut pool = MemoryPool::new();
    pool.add(Resource::new("lib/a.js", "var a;"));
    pool.add(Resource::new("lib/b.js", "jQuery.sap.require('x');"));
    pool.add(Resource::new("lib/c.js", "var c;"));
    let definition = BundleDefinition::new("lib/raw.js").with_section(
        SectionDefinition::new(SectionMode::Raw, ["lib/"]).declaring_raw_modules(),
    );

    let result = build(&pool, &definition, &BuildOptions::default());
    assert_eq!(
        result.content,
        "var a;\n\
         jQuery.sap.declare('lib.a', false);\n\
         jQuery.sap.require('x');\n\
         var c;\n\
         jQuery.sap.declare('lib.b', false);\n\
         jQuery.sap.declare('lib.c', false);\n"
    );
}

#[test]
fn test_bundle_info_section() {
    let mut pool = MemoryPool::new();
    pool.add(Resource::new("app/a.js", "var a;"));
    pool.add(Resource::new("lib/x.js", "var x;"));
    pool.add(Resource::new("lib/y.js", "var y;"));
    let definition = BundleDefinition::new("app/bundle.js")
        .with_section(
            SectionDefinition::new(SectionMode::BundleInfo, ["lib/"]).named("lib/library-preload.js"),
        )
        .with_section(SectionDefinition::new(SectionMode::Raw, ["app/"]));

    let result = build(&pool, &definition, &BuildOptions::default());
    assert_eq!(
        result.content,
        "sap.ui.loader.config({bundlesUI5:{\"lib/library-preload.js\":[\"lib/x.js\",\"lib/y.js\"]}});\n\
         var a;\n"
    );
    assert_eq!(result.bundle_info.sub_modules, vec!["app/a.js"]);
}

#[test]
fn test_invalid_bundle_info_section() {
    let mut pool = MemoryPool::new();
    pool.add(Resource::new("lib/x.js", "var x;"));

    let unnamed = BundleDefinition::new("app/bundle.js")
        .with_section(SectionDefinition::new(SectionMode::BundleInfo, ["lib/"]));
    assert!(
        Builder::new(&pool)
            .create_bundle(&unnamed, &BuildOptions::default())
            .is_err()
    );

    let without_extension = BundleDefinition::new("app/bundle.js").with_section(
        SectionDefinition::new(SectionMode::BundleInfo, ["lib/"]).named("lib/library-preload"),
    );
    let err = Builder::new(&pool)
        .create_bundle(&without_extension, &BuildOptions::default())
        .unwrap_err();
    assert!(err.to_string().contains(".js"));
}

#[test]
fn test_split_build_keeps_execution_order() {
    let mut pool = MemoryPool::new();
    pool.add(Resource::new("lib/Dep.js", "var dep;"));
    let mut main = ModuleInfo::new("app/Main.js");
    main.add_dependency("lib/Dep.js", false);
    pool.add_module(main, "var main;");
    for idx in 0..4 {
        pool.add(Resource::new(format!("app/p{idx}.js"), "x".repeat(100)));
    }
    let definition = BundleDefinition::new("app/bundle.js")
        .with_section(SectionDefinition::new(SectionMode::Raw, ["app/Main.js"]).resolving())
        .with_section(SectionDefinition::new(SectionMode::Preload, ["app/p*.js"]))
        .with_section(SectionDefinition::new(SectionMode::Require, ["app/Main.js"]).resolving());
    let modules = |result: &BundleResult| -> Vec<String> {
        result
            .segments
            .iter()
            .map(|segment| segment.module.clone())
            .collect()
    };
    let requires = "sap.ui.requireSync(\"app/Main\");\nsap.ui.requireSync(\"lib/Dep\");\n";

    let unsplit = build(&pool, &definition, &BuildOptions::default());
    assert_eq!(modules(&unsplit)[..2].to_vec(), vec!["app/Main.js", "lib/Dep.js"]);
    assert!(unsplit.content.contains(requires));

    let options = BuildOptions {
        number_of_parts: 2,
        ..BuildOptions::default()
    };
    let parts = Builder::new(&pool).create_bundle(&definition, &options).unwrap();
    assert_eq!(parts.len(), 2);
    assert_eq!(modules(&parts[0])[..2].to_vec(), vec!["app/Main.js", "lib/Dep.js"]);
    for part in &parts {
        assert!(part.content.contains(requires));
    }
}

#[test]
fn test_multi_part_build() {
    let mut pool = MemoryPool::new();
    for idx in 0..4 {
        pool.add(Resource::new(format!("app/m{idx}.js"), "x".repeat(100)));
    }
    pool.add(Resource::new("sap/ui/core/Core.js", "var core;"));
    let definition = BundleDefinition::new("app/bundle.js")
        .with_section(SectionDefinition::new(SectionMode::Preload, ["app/"]))
        .with_section(SectionDefinition::new(SectionMode::Require, ["sap/ui/core/Core.js"]));
    let options = BuildOptions {
        number_of_parts: 2,
        ..BuildOptions::default()
    };

    let results = Builder::new(&pool).create_bundle(&definition, &options).unwrap();
    let names: Vec<&str> = results.iter().map(|result| result.name.as_str()).collect();
    assert_eq!(names, vec!["app/bundle-0.js", "app/bundle-1.js"]);
    for result in &results {
        assert_eq!(result.segments.len(), 2);
        assert!(
            result
                .content
                .ends_with("sap.ui.requireSync(\"sap/ui/core/Core\");\nsap.ui.getCore().boot && sap.ui.getCore().boot();\n")
        );
    }
    assert_eq!(segment_text(&results[1], "app/m3.js"), format!("\"app/m3.js\":function(){{\n{}\n}}", "x".repeat(100)));
}
