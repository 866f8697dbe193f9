//! ESM to CommonJS / UMD projection.
//!
//! The transformer only lowers syntax, so module records are rewritten here.
//! Imports become `require` calls hoisted into a generated header, imported
//! bindings are rewritten to member accesses on the required module (which
//! keeps them live), and exports are published through getters on
//! `exports`. UMD output is the CommonJS body moved into a factory function.

use oxc_allocator::{Allocator, Box as ArenaBox, TakeIn, Vec as ArenaVec};
use oxc_ast::AstBuilder;
use oxc_ast::ast::{
    Argument, Declaration, ExportDefaultDeclarationKind, Expression, IdentifierReference,
    ImportDeclarationSpecifier, ObjectProperty, Program, Statement,
};
use oxc_ast_visit::{VisitMut, walk_mut};
use oxc_semantic::{Scoping, SymbolId};
use oxc_span::SPAN;
use rustc_hash::{FxHashMap, FxHashSet};

use super::shims::prepend;
use super::snippet::{PLACEHOLDER, Snippets, fill_expression_placeholder, fill_placeholder};

const RUNTIME_HELPERS: &str = "@oxc-project/runtime/helpers";

const INTEROP_REQUIRE_DEFAULT: &str = "function _interop_require_default(obj) {
    return obj && obj.__esModule ? obj : { default: obj };
}
";

const INTEROP_REQUIRE_WILDCARD: &str = "function _interop_require_wildcard(obj) {
    if (obj && obj.__esModule) return obj;
    if (obj === null || (typeof obj !== \"object\" && typeof obj !== \"function\")) return { default: obj };
    var newObj = { __proto__: null };
    for (var key in obj) {
        if (key !== \"default\" && Object.prototype.hasOwnProperty.call(obj, key)) newObj[key] = obj[key];
    }
    newObj.default = obj;
    return newObj;
}
";

const EXPORT: &str = "function _export(target, all) {
    for (var name in all) Object.defineProperty(target, name, { enumerable: true, get: all[name] });
}
";

const EXPORT_STAR: &str = "function _export_star(from, to) {
    Object.keys(from).forEach(function (k) {
        if (k !== \"default\" && !Object.prototype.hasOwnProperty.call(to, k)) {
            Object.defineProperty(to, k, { enumerable: true, get: function () { return from[k]; } });
        }
    });
    return from;
}
";

/// Settings of one projection.
#[derive(Debug, Clone, Default)]
pub struct ModuleFormatOptions {
    /// Require interop helpers from the runtime package instead of inlining.
    pub external_helpers: bool,
    /// UMD global name; `None` produces plain CommonJS.
    pub umd_name: Option<String>,
}

/// How a required module is exposed to the importing code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Interop {
    /// `require(s);`
    SideEffect,
    /// `var m = require(s);`
    Plain,
    Default,
    Wildcard,
}

#[derive(Debug)]
struct ModuleRecord {
    specifier: String,
    var: Option<String>,
    default: bool,
    named: bool,
    namespace: bool,
    star: bool,
}

impl ModuleRecord {
    fn interop(&self) -> Interop {
        match (self.var.is_some(), self.namespace, self.default, self.named) {
            (false, ..) => Interop::SideEffect,
            (true, true, _, _) | (true, false, true, true) => Interop::Wildcard,
            (true, false, true, false) => Interop::Default,
            (true, false, false, _) => Interop::Plain,
        }
    }
}

/// Fresh top-level names that collide with nothing in the module.
struct Names {
    taken: FxHashSet<String>,
}

impl Names {
    fn new(scoping: &Scoping) -> Self {
        Self {
            taken: scoping.symbol_names().map(str::to_string).collect(),
        }
    }

    fn fresh(&mut self, base: &str) -> String {
        let mut name = base.to_string();
        let mut n = 1;
        while self.taken.contains(&name) {
            name = format!("{base}{n}");
            n += 1;
        }
        self.taken.insert(name.clone());
        name
    }
}

fn module_var_base(specifier: &str) -> String {
    let last = specifier
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(specifier);
    let stem = last.split('.').next().unwrap_or(last);
    let mut base: String = stem
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    if base.is_empty() || base.starts_with(|c: char| c.is_ascii_digit()) {
        base.insert(0, '_');
    }
    format!("_{base}")
}

fn is_identifier_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c == '_' || c == '$' || c.is_ascii_alphabetic())
        && chars.all(|c| c == '_' || c == '$' || c.is_ascii_alphanumeric())
}

fn member(object: &str, name: &str) -> String {
    if is_identifier_name(name) {
        format!("{object}.{name}")
    } else {
        format!("{object}[{}]", quote(name))
    }
}

fn quote(text: &str) -> String {
    serde_json::to_string(text).unwrap_or_else(|_| format!("\"{text}\""))
}

fn property_key(name: &str) -> String {
    if is_identifier_name(name) {
        name.to_string()
    } else {
        quote(name)
    }
}

/// Module records and binding replacements gathered from the import graph
/// of one program.
struct Records {
    modules: Vec<ModuleRecord>,
    by_specifier: FxHashMap<String, usize>,
    /// Imported symbol to replacement text.
    bindings: FxHashMap<SymbolId, String>,
    /// Imported local name to replacement text, for `export { local }`.
    by_name: FxHashMap<String, String>,
}

impl Records {
    fn new() -> Self {
        Self {
            modules: Vec::new(),
            by_specifier: FxHashMap::default(),
            bindings: FxHashMap::default(),
            by_name: FxHashMap::default(),
        }
    }

    fn record(&mut self, specifier: &str) -> usize {
        if let Some(index) = self.by_specifier.get(specifier) {
            return *index;
        }
        let index = self.modules.len();
        self.modules.push(ModuleRecord {
            specifier: specifier.to_string(),
            var: None,
            default: false,
            named: false,
            namespace: false,
            star: false,
        });
        self.by_specifier.insert(specifier.to_string(), index);
        index
    }

    fn var(&mut self, index: usize, names: &mut Names) -> String {
        let module = &mut self.modules[index];
        match &module.var {
            Some(var) => var.clone(),
            None => {
                let var = names.fresh(&module_var_base(&module.specifier));
                module.var = Some(var.clone());
                var
            }
        }
    }

    /// Text for `imported` read from module `index`.
    fn access(&mut self, index: usize, imported: Option<&str>, names: &mut Names) -> String {
        let var = self.var(index, names);
        let module = &mut self.modules[index];
        match imported {
            None => {
                module.namespace = true;
                var
            }
            Some("default") => {
                module.default = true;
                member(&var, "default")
            }
            Some(name) => {
                module.named = true;
                member(&var, name)
            }
        }
    }

    fn collect(&mut self, body: &[Statement<'_>], names: &mut Names) {
        for statement in body {
            match statement {
                Statement::ImportDeclaration(import) => {
                    if import.import_kind.is_type() {
                        continue;
                    }
                    let index = self.record(import.source.value.as_str());
                    for specifier in import.specifiers.iter().flatten() {
                        let (local, text) = match specifier {
                            ImportDeclarationSpecifier::ImportSpecifier(s) => {
                                if s.import_kind.is_type() {
                                    continue;
                                }
                                let imported = s.imported.name();
                                (&s.local, self.access(index, Some(imported.as_str()), names))
                            }
                            ImportDeclarationSpecifier::ImportDefaultSpecifier(s) => {
                                (&s.local, self.access(index, Some("default"), names))
                            }
                            ImportDeclarationSpecifier::ImportNamespaceSpecifier(s) => {
                                (&s.local, self.access(index, None, names))
                            }
                        };
                        if let Some(symbol) = local.symbol_id.get() {
                            self.bindings.insert(symbol, text.clone());
                        }
                        self.by_name.insert(local.name.to_string(), text);
                    }
                }
                Statement::ExportNamedDeclaration(export) if !export.export_kind.is_type() => {
                    if let Some(source) = &export.source {
                        let index = self.record(source.value.as_str());
                        for specifier in &export.specifiers {
                            if !specifier.export_kind.is_type() {
                                let local = specifier.local.name();
                                self.access(index, Some(local.as_str()), names);
                            }
                        }
                    }
                }
                Statement::ExportAllDeclaration(export) if !export.export_kind.is_type() => {
                    let index = self.record(export.source.value.as_str());
                    if export.exported.is_some() {
                        self.access(index, None, names);
                    } else {
                        self.modules[index].star = true;
                    }
                }
                _ => {}
            }
        }
    }
}

/// Rewrites references to imported bindings and dynamic imports.
struct RewriteReferences<'a, 's> {
    allocator: &'a Allocator,
    snippets: Snippets<'a>,
    scoping: &'s Scoping,
    bindings: &'s FxHashMap<SymbolId, String>,
    needs_wildcard: bool,
    error: Option<String>,
}

impl<'a> RewriteReferences<'a, '_> {
    fn lookup(&self, ident: &IdentifierReference<'_>) -> Option<String> {
        let reference = ident.reference_id.get()?;
        let symbol = self.scoping.get_reference(reference).symbol_id()?;
        self.bindings.get(&symbol).cloned()
    }

    fn parse(&mut self, text: &str) -> Option<Expression<'a>> {
        match self.snippets.expression(text) {
            Ok(expression) => Some(expression),
            Err(error) => {
                self.error = Some(error);
                None
            }
        }
    }

    /// Call targets lose their `this` binding the way ESM imports do.
    fn unbound_callee(&mut self, callee: &mut Expression<'a>) {
        if let Expression::Identifier(ident) = callee {
            if let Some(text) = self.lookup(ident) {
                if let Some(expression) = self.parse(&format!("(0, {text})")) {
                    *callee = expression;
                }
            }
        }
    }
}

impl<'a> VisitMut<'a> for RewriteReferences<'a, '_> {
    fn visit_expression(&mut self, it: &mut Expression<'a>) {
        match it {
            Expression::Identifier(ident) => {
                if let Some(text) = self.lookup(ident) {
                    if let Some(expression) = self.parse(&text) {
                        *it = expression;
                    }
                }
                return;
            }
            Expression::CallExpression(call) => self.unbound_callee(&mut call.callee),
            Expression::TaggedTemplateExpression(tagged) => self.unbound_callee(&mut tagged.tag),
            _ => {}
        }

        walk_mut::walk_expression(self, it);

        if let Expression::ImportExpression(import) = it {
            let source = import.source.take_in(self.allocator);
            self.needs_wildcard = true;
            let wrapper = format!(
                "Promise.resolve().then(function () {{ return _interop_require_wildcard(require({PLACEHOLDER})); }})"
            );
            if let Some(mut expression) = self.parse(&wrapper) {
                fill_expression_placeholder(&mut expression, source);
                *it = expression;
            }
        }
    }

    fn visit_object_property(&mut self, it: &mut ObjectProperty<'a>) {
        if it.shorthand {
            if let Expression::Identifier(ident) = &it.value {
                if self.lookup(ident).is_some() {
                    it.shorthand = false;
                }
            }
        }
        walk_mut::walk_object_property(self, it);
    }
}

/// Names a declaration introduces at the top level.
fn declared_names(declaration: &Declaration<'_>) -> Vec<String> {
    match declaration {
        Declaration::VariableDeclaration(var) => var
            .declarations
            .iter()
            .flat_map(|d| d.id.get_binding_identifiers())
            .map(|id| id.name.to_string())
            .collect(),
        Declaration::FunctionDeclaration(func) => {
            func.id.iter().map(|id| id.name.to_string()).collect()
        }
        Declaration::ClassDeclaration(class) => {
            class.id.iter().map(|id| id.name.to_string()).collect()
        }
        _ => Vec::new(),
    }
}

/// Project an ESM program onto CommonJS (or UMD) in place.
pub fn to_commonjs<'a>(
    allocator: &'a Allocator,
    program: &mut Program<'a>,
    scoping: &Scoping,
    options: &ModuleFormatOptions,
) -> Result<(), String> {
    let snippets = Snippets::new(allocator);
    let ast = AstBuilder::new(allocator);
    let mut names = Names::new(scoping);

    let mut records = Records::new();
    records.collect(&program.body, &mut names);

    let mut rewrite = RewriteReferences {
        allocator,
        snippets,
        scoping,
        bindings: &records.bindings,
        needs_wildcard: false,
        error: None,
    };
    rewrite.visit_program(program);
    if let Some(error) = rewrite.error {
        return Err(error);
    }
    let needs_wildcard = rewrite.needs_wildcard;

    // exported name -> expression text
    let mut exports: Vec<(String, String)> = Vec::new();
    let mut body = ArenaVec::new_in(allocator);
    for statement in program.body.take_in(allocator) {
        match statement {
            Statement::ImportDeclaration(_) | Statement::ExportAllDeclaration(_) => {}
            Statement::ExportNamedDeclaration(mut export) => {
                if export.export_kind.is_type() {
                    continue;
                }
                if let Some(source) = &export.source {
                    let var = records
                        .by_specifier
                        .get(source.value.as_str())
                        .and_then(|index| records.modules[*index].var.clone());
                    let Some(var) = var else { continue };
                    for specifier in export.specifiers.iter().filter(|s| !s.export_kind.is_type()) {
                        let local = specifier.local.name();
                        exports.push((
                            specifier.exported.name().to_string(),
                            member(&var, local.as_str()),
                        ));
                    }
                    continue;
                }
                for specifier in export.specifiers.iter().filter(|s| !s.export_kind.is_type()) {
                    let local = specifier.local.name().to_string();
                    let text = records.by_name.get(&local).cloned().unwrap_or(local);
                    exports.push((specifier.exported.name().to_string(), text));
                }
                if let Some(declaration) = export.declaration.take() {
                    if declaration.is_typescript_syntax() {
                        continue;
                    }
                    for name in declared_names(&declaration) {
                        exports.push((name.clone(), name));
                    }
                    body.push(Statement::from(declaration));
                }
            }
            Statement::ExportDefaultDeclaration(export) => {
                let export = ArenaBox::unbox(export);
                match export.declaration {
                    ExportDefaultDeclarationKind::FunctionDeclaration(mut func) => {
                        let name = match &func.id {
                            Some(id) => id.name.to_string(),
                            None => {
                                let name = names.fresh("_default");
                                func.id = Some(ast.binding_identifier(SPAN, allocator.alloc_str(&name)));
                                name
                            }
                        };
                        exports.push(("default".to_string(), name));
                        body.push(Statement::FunctionDeclaration(func));
                    }
                    ExportDefaultDeclarationKind::ClassDeclaration(mut class) => {
                        let name = match &class.id {
                            Some(id) => id.name.to_string(),
                            None => {
                                let name = names.fresh("_default");
                                class.id = Some(ast.binding_identifier(SPAN, allocator.alloc_str(&name)));
                                name
                            }
                        };
                        exports.push(("default".to_string(), name));
                        body.push(Statement::ClassDeclaration(class));
                    }
                    ExportDefaultDeclarationKind::TSInterfaceDeclaration(_) => {}
                    kind => {
                        let expression = kind.into_expression();
                        let name = names.fresh("_default");
                        let statements =
                            snippets.statements(&format!("var {name} = {PLACEHOLDER};"))?;
                        let Some(mut declaration) = statements.into_iter().next() else {
                            return Err("default export snippet is empty".to_string());
                        };
                        fill_placeholder(&mut declaration, expression);
                        body.push(declaration);
                        exports.push(("default".to_string(), name));
                    }
                }
            }
            other => body.push(other),
        }
    }
    program.body = body;

    let has_star = records.modules.iter().any(|m| m.star);
    let header = header_text(&records, &exports, has_star, needs_wildcard, options);
    if !header.is_empty() {
        let statements = snippets.statements(&header)?;
        prepend(allocator, &mut program.body, statements);
    }

    match &options.umd_name {
        Some(name) => wrap_umd(allocator, program, name),
        None => {
            if !program.directives.iter().any(|d| d.directive == "use strict") {
                let mut directives = snippets.directives("\"use strict\";")?;
                for directive in program.directives.take_in(allocator) {
                    directives.push(directive);
                }
                program.directives = directives;
            }
            Ok(())
        }
    }
}

fn helper(name: &str, runtime: &str, inline: &str, external: bool) -> String {
    if external {
        format!("var {name} = require(\"{RUNTIME_HELPERS}/{runtime}\");\n")
    } else {
        inline.to_string()
    }
}

fn header_text(
    records: &Records,
    exports: &[(String, String)],
    has_star: bool,
    needs_wildcard: bool,
    options: &ModuleFormatOptions,
) -> String {
    let mut text = String::new();
    if !exports.is_empty() || has_star {
        text.push_str("Object.defineProperty(exports, \"__esModule\", { value: true });\n");
    }

    let uses = |interop: Interop| records.modules.iter().any(|m| m.interop() == interop);
    if uses(Interop::Default) {
        text.push_str(&helper(
            "_interop_require_default",
            "interopRequireDefault",
            INTEROP_REQUIRE_DEFAULT,
            options.external_helpers,
        ));
    }
    if needs_wildcard || uses(Interop::Wildcard) {
        text.push_str(&helper(
            "_interop_require_wildcard",
            "interopRequireWildcard",
            INTEROP_REQUIRE_WILDCARD,
            options.external_helpers,
        ));
    }
    if has_star {
        text.push_str(EXPORT_STAR);
    }

    if !exports.is_empty() {
        text.push_str(EXPORT);
        text.push_str("_export(exports, {\n");
        for (name, local) in exports {
            text.push_str(&format!(
                "    {}: function () {{ return {local}; }},\n",
                property_key(name)
            ));
        }
        text.push_str("});\n");
    }

    for module in &records.modules {
        let require = format!("require({})", quote(&module.specifier));
        match (module.interop(), &module.var) {
            (Interop::SideEffect, _) | (_, None) => {
                if !module.star {
                    text.push_str(&format!("{require};\n"));
                }
            }
            (Interop::Plain, Some(var)) => text.push_str(&format!("var {var} = {require};\n")),
            (Interop::Default, Some(var)) => text.push_str(&format!(
                "var {var} = _interop_require_default({require});\n"
            )),
            (Interop::Wildcard, Some(var)) => text.push_str(&format!(
                "var {var} = _interop_require_wildcard({require});\n"
            )),
        }
        if module.star {
            text.push_str(&format!("_export_star({require}, exports);\n"));
        }
    }
    text
}

/// Move the CommonJS body into a UMD factory.
fn wrap_umd<'a>(allocator: &'a Allocator, program: &mut Program<'a>, name: &str) -> Result<(), String> {
    let global = quote(name);
    let wrapper = format!(
        "(function (global, factory) {{
    if (typeof exports === \"object\" && typeof module !== \"undefined\") factory(exports, require);
    else if (typeof define === \"function\" && define.amd) define([\"exports\", \"require\"], factory);
    else {{
        global = typeof globalThis !== \"undefined\" ? globalThis : global || self;
        factory(global[{global}] = {{}}, function (id) {{ return global[id]; }});
    }}
}})(this, function (exports, require) {{
    \"use strict\";
}});"
    );
    let mut statements = Snippets::new(allocator).statements(&wrapper)?;

    let factory_body = statements.first_mut().and_then(|statement| {
        let Statement::ExpressionStatement(statement) = statement else {
            return None;
        };
        let Expression::CallExpression(call) = &mut statement.expression else {
            return None;
        };
        let Some(Argument::FunctionExpression(factory)) = call.arguments.get_mut(1) else {
            return None;
        };
        factory.body.as_mut()
    });
    let Some(factory_body) = factory_body else {
        return Err("malformed UMD wrapper".to_string());
    };

    for statement in program.body.take_in(allocator) {
        factory_body.statements.push(statement);
    }
    program.directives = ArenaVec::new_in(allocator);
    program.body = statements;
    Ok(())
}
