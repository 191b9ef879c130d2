/*! Unified interface for the lualower engine.
 *
 * Single import for everything you need: the source tree and resolver
 * interface, the lowering pipeline, the target AST with its formatter, and
 * the runtime feature bundle.
 */

pub use lualower_ast as ast;
pub use lualower_core as core;
pub use lualower_runtime as runtime;
pub use lualower_transform as transform;

pub use lualower_ast::{
    AstBuilder, Diagnostic, DiagnosticKind, ResolutionTable, Resolver, SourceFile,
};

pub use lualower_core::{format_block, format_expression, format_statement, Pos, SymbolId};

pub use lualower_runtime::{bundle, LuaLibFeature, Promise, PromiseState};

pub use lualower_transform::{
    lower_source_file, LoweredFile, LoweringOptions, LoweringPipeline, TransformError,
};
