//! Compile-time constant replacement (`define`).
//!
//! Keys are global identifiers or member chains (`process.env.NODE_ENV`),
//! values are JavaScript expressions. Keys written as `typeof name` replace
//! `typeof name` of an unbound `name`.

use indexmap::IndexMap;
use oxc_allocator::Allocator;
use oxc_ast::ast::{Expression, Program, UnaryOperator};
use oxc_ast_visit::{VisitMut, walk_mut};
use oxc_semantic::Scoping;
use oxc_transformer_plugins::{ReplaceGlobalDefines, ReplaceGlobalDefinesConfig};

use super::snippet::Snippets;

#[derive(Debug, Clone, Default)]
pub struct Defines {
    plain: Vec<(String, String)>,
    typeofs: IndexMap<String, String>,
}

impl Defines {
    pub fn new(define: &IndexMap<String, String>) -> Self {
        let mut defines = Self::default();
        for (key, value) in define {
            match key.strip_prefix("typeof ") {
                Some(name) => {
                    defines.typeofs.insert(name.trim().to_string(), value.clone());
                }
                None => defines.plain.push((key.clone(), value.clone())),
            }
        }
        defines
    }

    pub fn is_empty(&self) -> bool {
        self.plain.is_empty() && self.typeofs.is_empty()
    }

    /// Replace every define in `program`. Returns the updated scoping.
    pub fn apply<'a>(
        &self,
        allocator: &'a Allocator,
        program: &mut Program<'a>,
        scoping: Scoping,
    ) -> Result<Scoping, String> {
        let mut scoping = scoping;
        if !self.plain.is_empty() {
            let config = ReplaceGlobalDefinesConfig::new(&self.plain).map_err(|errors| {
                errors
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("\n")
            })?;
            scoping = ReplaceGlobalDefines::new(allocator, config)
                .build(scoping, program)
                .scoping;
        }

        if !self.typeofs.is_empty() {
            let mut replace = ReplaceTypeof {
                snippets: Snippets::new(allocator),
                scoping: &scoping,
                typeofs: &self.typeofs,
                error: None,
            };
            replace.visit_program(program);
            if let Some(error) = replace.error {
                return Err(error);
            }
        }
        Ok(scoping)
    }
}

struct ReplaceTypeof<'a, 'd> {
    snippets: Snippets<'a>,
    scoping: &'d Scoping,
    typeofs: &'d IndexMap<String, String>,
    error: Option<String>,
}

impl ReplaceTypeof<'_, '_> {
    fn replacement(&self, expression: &Expression<'_>) -> Option<&'_ String> {
        let Expression::UnaryExpression(unary) = expression else {
            return None;
        };
        if unary.operator != UnaryOperator::Typeof {
            return None;
        }
        let Expression::Identifier(ident) = &unary.argument else {
            return None;
        };
        let bound = ident
            .reference_id
            .get()
            .and_then(|id| self.scoping.get_reference(id).symbol_id())
            .is_some();
        if bound {
            return None;
        }
        self.typeofs.get(ident.name.as_str())
    }
}

impl<'a> VisitMut<'a> for ReplaceTypeof<'a, '_> {
    fn visit_expression(&mut self, it: &mut Expression<'a>) {
        if let Some(value) = self.replacement(it).cloned() {
            match self.snippets.expression(&value) {
                Ok(expression) => *it = expression,
                Err(error) => self.error = Some(error),
            }
            return;
        }
        walk_mut::walk_expression(self, it);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxc_codegen::Codegen;
    use oxc_parser::Parser;
    use oxc_semantic::SemanticBuilder;
    use oxc_span::SourceType;

    fn run(source: &str, define: &[(&str, &str)]) -> String {
        let allocator = Allocator::default();
        let mut program = Parser::new(&allocator, source, SourceType::mjs())
            .parse()
            .program;
        let scoping = SemanticBuilder::new()
            .build(&program)
            .semantic
            .into_scoping();
        let define: IndexMap<String, String> = define
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Defines::new(&define)
            .apply(&allocator, &mut program, scoping)
            .unwrap();
        Codegen::new().build(&program).code
    }

    #[test]
    fn replaces_member_chains() {
        let out = run(
            "if (process.env.NODE_ENV === 'production') log(VERSION);",
            &[("process.env.NODE_ENV", "'production'"), ("VERSION", "\"1.0.0\"")],
        );
        assert!(out.contains("\"production\" === \"production\""), "{out}");
        assert!(out.contains("log(\"1.0.0\")"), "{out}");
    }

    #[test]
    fn replaces_typeof_of_globals_only() {
        let out = run(
            "const a = typeof window; function f(window) { return typeof window; }",
            &[("typeof window", "\"object\"")],
        );
        assert!(out.contains("const a = \"object\""), "{out}");
        assert!(out.contains("return typeof window"), "{out}");
    }

    #[test]
    fn split_keys() {
        let define = IndexMap::from([
            ("typeof window".to_string(), "\"object\"".to_string()),
            ("__DEV__".to_string(), "false".to_string()),
        ]);
        let defines = Defines::new(&define);
        assert_eq!(defines.plain.len(), 1);
        assert!(defines.typeofs.contains_key("window"));
        assert!(!defines.is_empty());
    }
}
