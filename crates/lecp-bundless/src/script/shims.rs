//! Node globals that differ between module systems.
//!
//! ESM output gets `import.meta` equivalents of `__dirname`, `__filename`
//! and `require`. CommonJS output gets the reverse for `import.meta.*`.

use oxc_allocator::{Allocator, Vec as ArenaVec};
use oxc_ast::ast::{Expression, IdentifierReference, Program, Statement};
use oxc_ast_visit::{VisitMut, walk_mut};
use oxc_semantic::Scoping;

use super::snippet::Snippets;
use crate::plan::ModuleFormat;

const FILE_URL_TO_PATH: &str = "__lecp_fileURLToPath";
const PATH_DIRNAME: &str = "__lecp_dirname";
const CREATE_REQUIRE: &str = "__lecp_createRequire";

#[derive(Debug, Clone, Copy)]
pub struct Shims {
    pub format: ModuleFormat,
    pub legacy: bool,
}

impl Shims {
    pub fn apply<'a>(
        &self,
        allocator: &'a Allocator,
        program: &mut Program<'a>,
        scoping: &Scoping,
    ) -> Result<(), String> {
        let snippets = Snippets::new(allocator);
        match self.format {
            ModuleFormat::Esm => {
                let mut shim = EsmShims {
                    snippets,
                    scoping,
                    legacy: self.legacy,
                    uses_path: false,
                    uses_require: false,
                    error: None,
                };
                shim.visit_program(program);
                if let Some(error) = shim.error {
                    return Err(error);
                }
                let header = shim.header();
                if !header.is_empty() {
                    let imports = snippets.statements(&header)?;
                    prepend(allocator, &mut program.body, imports);
                }
                Ok(())
            }
            ModuleFormat::Cjs | ModuleFormat::Umd => {
                let mut shim = CjsShims {
                    snippets,
                    error: None,
                };
                shim.visit_program(program);
                shim.error.map_or(Ok(()), Err)
            }
        }
    }
}

pub(crate) fn prepend<'a>(
    allocator: &'a Allocator,
    body: &mut ArenaVec<'a, Statement<'a>>,
    head: ArenaVec<'a, Statement<'a>>,
) {
    let rest = std::mem::replace(body, ArenaVec::new_in(allocator));
    for statement in head.into_iter().chain(rest) {
        body.push(statement);
    }
}

fn is_unbound(scoping: &Scoping, ident: &IdentifierReference<'_>) -> bool {
    ident
        .reference_id
        .get()
        .and_then(|id| scoping.get_reference(id).symbol_id())
        .is_none()
}

struct EsmShims<'a, 's> {
    snippets: Snippets<'a>,
    scoping: &'s Scoping,
    legacy: bool,
    uses_path: bool,
    uses_require: bool,
    error: Option<String>,
}

impl EsmShims<'_, '_> {
    fn replacement(&mut self, name: &str) -> Option<String> {
        match (name, self.legacy) {
            ("__dirname", false) => Some("import.meta.dirname".to_string()),
            ("__filename", false) => Some("import.meta.filename".to_string()),
            ("__dirname", true) => {
                self.uses_path = true;
                Some(format!("{PATH_DIRNAME}({FILE_URL_TO_PATH}(import.meta.url))"))
            }
            ("__filename", true) => {
                self.uses_path = true;
                Some(format!("{FILE_URL_TO_PATH}(import.meta.url)"))
            }
            _ => None,
        }
    }

    fn header(&self) -> String {
        let mut header = String::new();
        if self.uses_path {
            header.push_str(&format!(
                "import {{ fileURLToPath as {FILE_URL_TO_PATH} }} from \"node:url\";\n\
                 import {{ dirname as {PATH_DIRNAME} }} from \"node:path\";\n"
            ));
        }
        if self.uses_require {
            header.push_str(&format!(
                "import {{ createRequire as {CREATE_REQUIRE} }} from \"node:module\";\n\
                 const require = {CREATE_REQUIRE}(import.meta.url);\n"
            ));
        }
        header
    }
}

impl<'a> VisitMut<'a> for EsmShims<'a, '_> {
    fn visit_expression(&mut self, it: &mut Expression<'a>) {
        if let Expression::Identifier(ident) = it {
            if is_unbound(self.scoping, ident) {
                if ident.name == "require" {
                    self.uses_require = true;
                } else if let Some(text) = self.replacement(ident.name.as_str()) {
                    match self.snippets.expression(&text) {
                        Ok(expression) => *it = expression,
                        Err(error) => self.error = Some(error),
                    }
                }
            }
            return;
        }
        walk_mut::walk_expression(self, it);
    }
}

struct CjsShims<'a> {
    snippets: Snippets<'a>,
    error: Option<String>,
}

fn import_meta_property<'b>(expression: &'b Expression<'_>) -> Option<&'b str> {
    let Expression::StaticMemberExpression(member) = expression else {
        return None;
    };
    let Expression::MetaProperty(meta) = &member.object else {
        return None;
    };
    (meta.meta.name == "import" && meta.property.name == "meta")
        .then(|| member.property.name.as_str())
}

impl<'a> VisitMut<'a> for CjsShims<'a> {
    fn visit_expression(&mut self, it: &mut Expression<'a>) {
        let replacement = match import_meta_property(it) {
            Some("dirname") => Some("__dirname"),
            Some("filename") => Some("__filename"),
            Some("url") => Some("require(\"url\").pathToFileURL(__filename).toString()"),
            _ => None,
        };
        if let Some(text) = replacement {
            match self.snippets.expression(text) {
                Ok(expression) => *it = expression,
                Err(error) => self.error = Some(error),
            }
            return;
        }
        walk_mut::walk_expression(self, it);
    }
}
