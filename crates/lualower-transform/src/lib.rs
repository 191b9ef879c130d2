/*! Lowering engine from a typed, class-based source tree to Lua.
 *
 * The front-end hands over a resolved source tree plus a [`lualower_ast::Resolver`]
 * backed by its type checker. This crate walks that tree and produces Lua
 * statements: classes become prototype tables, destructuring becomes explicit
 * extraction, `async` functions become coroutine wrappers, and out-of-order
 * locals get hoisted so Lua's sequential scoping matches the source semantics.
 * Runtime helpers the output depends on are requested as
 * [`lualower_runtime::LuaLibFeature`]s and bundled ahead of the lowered code.
 */

pub mod script_to_lua;

pub use script_to_lua::{
    lower_source_file, LoweredFile, LoweringContext, LoweringOptions, LoweringPipeline,
    TransformError,
};
