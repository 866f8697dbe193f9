//! Small pieces of JavaScript parsed straight into the program's arena.
//!
//! Generated code is written as text and parsed in the same allocator as the
//! program it is spliced into. Spans are reset so the generated nodes carry
//! no source mapping and never pick up comments of the real file. Text is
//! parsed as a module so `import` declarations and `import.meta` are allowed.

use oxc_allocator::{Allocator, Vec as ArenaVec};
use oxc_ast::ast::{Directive, Expression, Program, Statement};
use oxc_ast_visit::{VisitMut, walk_mut};
use oxc_parser::Parser;
use oxc_span::{SPAN, SourceType, Span};

/// Identifier replaced by [`fill_placeholder`].
pub const PLACEHOLDER: &str = "__lecp_placeholder__";

#[derive(Clone, Copy)]
pub struct Snippets<'a> {
    allocator: &'a Allocator,
}

impl<'a> Snippets<'a> {
    pub fn new(allocator: &'a Allocator) -> Self {
        Self { allocator }
    }

    fn program(&self, text: &str) -> Result<Program<'a>, String> {
        let text = self.allocator.alloc_str(text);
        let ret = Parser::new(self.allocator, text, SourceType::mjs()).parse();
        if let Some(error) = ret.errors.first() {
            return Err(format!("generated code does not parse: {error}\n{text}"));
        }
        let mut program = ret.program;
        ResetSpans.visit_program(&mut program);
        Ok(program)
    }

    pub fn statements(&self, text: &str) -> Result<ArenaVec<'a, Statement<'a>>, String> {
        Ok(self.program(text)?.body)
    }

    pub fn directives(&self, text: &str) -> Result<ArenaVec<'a, Directive<'a>>, String> {
        Ok(self.program(text)?.directives)
    }

    pub fn expression(&self, text: &str) -> Result<Expression<'a>, String> {
        let text = self.allocator.alloc_str(text);
        let mut expression = Parser::new(self.allocator, text, SourceType::mjs())
            .parse_expression()
            .map_err(|errors| {
                let message = errors
                    .first()
                    .map(ToString::to_string)
                    .unwrap_or_default();
                format!("generated expression does not parse: {message}\n{text}")
            })?;
        ResetSpans.visit_expression(&mut expression);
        Ok(expression)
    }
}

struct ResetSpans;

impl<'a> VisitMut<'a> for ResetSpans {
    fn visit_span(&mut self, span: &mut Span) {
        *span = SPAN;
    }
}

/// Replace the first [`PLACEHOLDER`] identifier inside `target` with `value`.
/// Returns whether the placeholder was found.
pub fn fill_placeholder<'a>(target: &mut Statement<'a>, value: Expression<'a>) -> bool {
    let mut fill = FillPlaceholder { value: Some(value) };
    fill.visit_statement(target);
    fill.value.is_none()
}

/// Expression counterpart of [`fill_placeholder`].
pub fn fill_expression_placeholder<'a>(target: &mut Expression<'a>, value: Expression<'a>) -> bool {
    let mut fill = FillPlaceholder { value: Some(value) };
    fill.visit_expression(target);
    fill.value.is_none()
}

struct FillPlaceholder<'a> {
    value: Option<Expression<'a>>,
}

impl<'a> VisitMut<'a> for FillPlaceholder<'a> {
    fn visit_expression(&mut self, it: &mut Expression<'a>) {
        if let Expression::Identifier(ident) = it {
            if ident.name == PLACEHOLDER {
                if let Some(value) = self.value.take() {
                    *it = value;
                }
                return;
            }
        }
        if self.value.is_some() {
            walk_mut::walk_expression(self, it);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxc_codegen::Codegen;

    fn print<'a>(allocator: &'a Allocator, body: ArenaVec<'a, Statement<'a>>) -> String {
        let mut program = Parser::new(allocator, "", SourceType::cjs()).parse().program;
        program.body = body;
        Codegen::new().build(&program).code
    }

    #[test]
    fn parses_statements_without_spans() {
        let allocator = Allocator::default();
        let snippets = Snippets::new(&allocator);
        let body = snippets.statements("var _a = require(\"a\");").unwrap();
        assert_eq!(body.len(), 1);
        assert!(matches!(&body[0], Statement::VariableDeclaration(decl) if decl.span == SPAN));
    }

    #[test]
    fn fills_placeholder() {
        let allocator = Allocator::default();
        let snippets = Snippets::new(&allocator);
        let mut body = snippets
            .statements(&format!("var _default = {PLACEHOLDER};"))
            .unwrap();
        let value = snippets.expression("1 + 2").unwrap();
        assert!(fill_placeholder(&mut body[0], value));
        assert_eq!(print(&allocator, body), "var _default = 1 + 2;\n");
    }

    #[test]
    fn invalid_text_is_an_error() {
        let allocator = Allocator::default();
        assert!(Snippets::new(&allocator).statements("var = ;").is_err());
    }
}
