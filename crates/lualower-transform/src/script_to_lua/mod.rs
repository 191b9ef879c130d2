/*! Lower a resolved source tree to Lua statements.
 *
 * The front-end hands over syntax plus a resolver backed by its checker; this
 * pipeline walks the tree and rebuilds it in Lua terms. Classes become
 * prototype tables, destructuring becomes explicit extraction, spreads become
 * vararg forwarding or runtime unpacking, and declarations used ahead of their
 * position get hoisted. Runtime helpers are requested per feature and bundled
 * ahead of the output.
 */

mod builtins;
mod classes;
mod context;
mod enums;
mod errors;
mod expressions;
mod functions;
mod lualib;
mod scope;
mod spread;
mod statements;
mod variables;

use anyhow::Result;
use lualower_ast::{Diagnostic, Resolver, SourceFile};
use lualower_core::{format_block, Block, Statement};
use lualower_runtime::{bundle, LuaLibFeature};
use scope::ScopeKind;

pub use context::{LoweringContext, LoweringOptions};
pub use errors::TransformError;

/// Result of lowering one source file: the Lua statements, the diagnostics
/// the pass accumulated, and the runtime features the output depends on.
#[derive(Debug)]
pub struct LoweredFile {
    pub statements: Vec<Statement>,
    pub diagnostics: Vec<Diagnostic>,
    pub features: Vec<LuaLibFeature>,
}

impl LoweredFile {
    /// Renders the complete output chunk: the runtime bundle for the requested
    /// features followed by the lowered statements.
    pub fn lua_source(&self) -> String {
        let mut output = bundle(&self.features);
        output.push_str(&format_block(&Block::new(self.statements.clone())));
        output
    }
}

pub struct LoweringPipeline<'a> {
    resolver: &'a dyn Resolver,
    options: LoweringOptions,
}

impl<'a> LoweringPipeline<'a> {
    pub fn new(resolver: &'a dyn Resolver) -> Self {
        Self {
            resolver,
            options: LoweringOptions::default(),
        }
    }

    pub fn with_options(mut self, options: LoweringOptions) -> Self {
        self.options = options;
        self
    }

    pub fn lower(self, file: &SourceFile) -> Result<LoweredFile> {
        let mut context = LoweringContext::with_options(self.resolver, self.options);
        context.push_scope(ScopeKind::File);
        let lowered = statements::lower_statement_list(&mut context, &file.statements);
        let file_scope = context.pop_scope()?;
        let lowered = lowered?;
        let statements = scope::perform_hoisting(self.resolver, &file_scope, lowered);

        let features: Vec<LuaLibFeature> = context.used_features().collect();
        tracing::debug!(
            statements = statements.len(),
            diagnostics = context.diagnostics.len(),
            ?features,
            "file lowering complete"
        );
        Ok(LoweredFile {
            statements,
            diagnostics: context.diagnostics,
            features,
        })
    }
}

pub fn lower_source_file(resolver: &dyn Resolver, file: &SourceFile) -> Result<LoweredFile> {
    LoweringPipeline::new(resolver).lower(file)
}
