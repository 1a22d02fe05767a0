//! Rewrite of module registrations into their predefine form
//!
//! A module whose whole content is one `define(...)` or `sap.ui.define(...)`
//! call is embedded as `sap.ui.predefine("name", ...)`: registered with the
//! loader under an explicit name, but not executed until it is required.
//!
//! The rewrite works on byte spans of the parsed program and splices text
//! into the original source, so everything outside the edited positions
//! stays byte-identical.

use log::{debug, error};
use oxc_allocator::Allocator;
use oxc_ast::ast::{Argument, CallExpression, Expression, Statement};
use oxc_parser::Parser;
use oxc_span::{GetSpan, SourceType};

use crate::{code_generator::embedding::quoted_name, module_name::to_require_name};

const PREDEFINE_CALLEE: &str = "sap.ui.predefine";

/// Outcome of a successful rewrite
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewrittenModule {
    pub code: String,
    /// The module name had to be injected as first argument
    pub injected_name: bool,
}

/// A text insertion or replacement at a byte range of the source
#[derive(Debug)]
struct Edit {
    start: usize,
    end: usize,
    text: String,
}

impl Edit {
    fn insert(at: usize, text: impl Into<String>) -> Self {
        Self {
            start: at,
            end: at,
            text: text.into(),
        }
    }
}

/// Try to rewrite `source` of `module_name` into a predefine call
///
/// Returns `None` when the source is not a single registration call or
/// cannot be parsed; the caller then embeds the module generically.
pub fn try_rewrite(
    module_name: &str,
    source: &str,
    avoid_lazy_parsing: bool,
) -> Option<RewrittenModule> {
    let allocator = Allocator::default();
    let parsed = Parser::new(&allocator, source, SourceType::cjs()).parse();
    if parsed.panicked || !parsed.errors.is_empty() {
        let messages: Vec<String> = parsed.errors.iter().map(ToString::to_string).collect();
        error!(
            "Error while parsing {module_name}, embedding it without rewrite: {}",
            messages.join("; ")
        );
        return None;
    }

    let mut statements = parsed.program.body.iter();
    let (Some(Statement::ExpressionStatement(statement)), None) =
        (statements.next(), statements.next())
    else {
        return None;
    };
    let Expression::CallExpression(call) = &statement.expression else {
        return None;
    };
    let callee_edit = callee_edit(call)?;

    let mut edits = vec![callee_edit];
    let injected_name = !matches!(call.arguments.first(), Some(Argument::StringLiteral(_)));
    if injected_name {
        let name = quoted_name(to_require_name(module_name));
        match call.arguments.first() {
            // `define()`: insert just before the closing parenthesis
            None => edits.push(Edit::insert(call.span.end as usize - 1, name)),
            Some(first) => edits.push(Edit::insert(
                first.span().start as usize,
                format!("{name}, "),
            )),
        }
    }

    if avoid_lazy_parsing && let Some(factory) = factory_argument(call) {
        let span = factory.span();
        edits.push(Edit::insert(span.start as usize, "("));
        edits.push(Edit::insert(span.end as usize, ")"));
    }

    debug!("Rewrote registration of {module_name} to {PREDEFINE_CALLEE}");
    Some(RewrittenModule {
        code: apply_edits(source, edits),
        injected_name,
    })
}

/// Edit that turns the callee into the predefine form, if it is a
/// recognised registration function
fn callee_edit(call: &CallExpression<'_>) -> Option<Edit> {
    match &call.callee {
        Expression::Identifier(ident) if ident.name.as_str() == "define" => Some(Edit {
            start: ident.span.start as usize,
            end: ident.span.end as usize,
            text: PREDEFINE_CALLEE.to_owned(),
        }),
        Expression::StaticMemberExpression(member) if member.property.name.as_str() == "define" => {
            let Expression::StaticMemberExpression(namespace) = &member.object else {
                return None;
            };
            let Expression::Identifier(root) = &namespace.object else {
                return None;
            };
            (root.name.as_str() == "sap" && namespace.property.name.as_str() == "ui")
                .then(|| Edit::insert(member.property.span.start as usize, "pre"))
        }
        _ => None,
    }
}

/// The factory function, skipping a leading name and dependency array
fn factory_argument<'c, 'a>(call: &'c CallExpression<'a>) -> Option<&'c Argument<'a>> {
    let mut arguments = call.arguments.iter().peekable();
    arguments.next_if(|arg| matches!(arg, Argument::StringLiteral(_)));
    arguments.next_if(|arg| matches!(arg, Argument::ArrayExpression(_)));
    arguments.next().filter(|arg| {
        matches!(
            arg,
            Argument::FunctionExpression(_) | Argument::ArrowFunctionExpression(_)
        )
    })
}

/// Apply edits back to front so earlier offsets stay valid
///
/// Of two insertions at the same offset, the one recorded first ends up
/// first in the output.
fn apply_edits(source: &str, edits: Vec<Edit>) -> String {
    let mut ordered: Vec<(usize, Edit)> = edits.into_iter().enumerate().collect();
    ordered.sort_by(|(a_idx, a), (b_idx, b)| b.start.cmp(&a.start).then(b_idx.cmp(a_idx)));
    let mut code = source.to_owned();
    for (_, edit) in ordered {
        code.replace_range(edit.start..edit.end, &edit.text);
    }
    code
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rewrite(name: &str, source: &str) -> Option<String> {
        try_rewrite(name, source, false).map(|rewritten| rewritten.code)
    }

    #[test]
    fn test_bare_define_gets_name_and_predefine_callee() {
        let rewritten = try_rewrite("a/b.js", "define([], function(){});", false).unwrap();
        assert_eq!(
            rewritten.code,
            "sap.ui.predefine(\"a/b\", [], function(){});"
        );
        assert!(rewritten.injected_name);
    }

    #[test]
    fn test_namespaced_define() {
        assert_eq!(
            rewrite(
                "my/app/Component.js",
                "sap.ui.define([\"sap/ui/core/UIComponent\"], function(UIComponent) {\n\treturn UIComponent;\n});\n"
            )
            .unwrap(),
            "sap.ui.predefine(\"my/app/Component\", [\"sap/ui/core/UIComponent\"], function(UIComponent) {\n\treturn UIComponent;\n});\n"
        );
    }

    #[test]
    fn test_existing_name_is_kept() {
        let rewritten =
            try_rewrite("x/y.js", "sap.ui.define('other/name', [], function(){});", false)
                .unwrap();
        assert_eq!(
            rewritten.code,
            "sap.ui.predefine('other/name', [], function(){});"
        );
        assert!(!rewritten.injected_name);
    }

    #[test]
    fn test_define_without_arguments() {
        assert_eq!(
            rewrite("a/empty.js", "sap.ui.define();").unwrap(),
            "sap.ui.predefine(\"a/empty\");"
        );
    }

    #[test]
    fn test_avoid_lazy_parsing_wraps_factory() {
        let rewritten =
            try_rewrite("a/b.js", "define(\"a/b\", [\"c\"], function(c){ return c; });", true)
                .unwrap();
        assert_eq!(
            rewritten.code,
            "sap.ui.predefine(\"a/b\", [\"c\"], (function(c){ return c; }));"
        );

        let rewritten = try_rewrite("a/c.js", "define(() => 1);", true).unwrap();
        assert_eq!(rewritten.code, "sap.ui.predefine(\"a/c\", (() => 1));");
    }

    #[test]
    fn test_leading_comments_are_preserved() {
        assert_eq!(
            rewrite("a/b.js", "/*!\n * (c) Copyright\n */\ndefine([], function(){});").unwrap(),
            "/*!\n * (c) Copyright\n */\nsap.ui.predefine(\"a/b\", [], function(){});"
        );
    }

    #[test]
    fn test_non_registration_content_is_not_rewritten() {
        assert_eq!(rewrite("a.js", "var x = 1;"), None);
        assert_eq!(rewrite("a.js", "define([], function(){}); foo();"), None);
        assert_eq!(rewrite("a.js", "require([], function(){});"), None);
        assert_eq!(rewrite("a.js", "my.ns.define([], function(){});"), None);
        assert_eq!(rewrite("a.js", ""), None);
    }

    #[test]
    fn test_parse_failure_is_not_fatal() {
        assert_eq!(rewrite("broken.js", "define([], function({);"), None);
    }
}
