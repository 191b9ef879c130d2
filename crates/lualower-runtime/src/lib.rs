/*! Runtime semantics the lualower engine emits alongside lowered code.
 *
 * Two things live here. First, the table of `LuaLibFeature`s: fixed Lua
 * source chunks the lowering engine requests by name, bundled at most once
 * per compilation unit ahead of the lowered output. Second, a Rust model of
 * the non-trivial chunks (the Promise state machine and the async-function
 * driver) so their ordering and adoption laws are testable without a Lua
 * interpreter. The model and the chunks implement the same semantics; when
 * one changes the other must follow.
 */

pub mod features;
pub mod promise;
pub mod task;

pub use features::{bundle, resolve_feature_order, LuaLibFeature};
pub use promise::{FulfillHandler, Handled, Promise, PromiseState, RejectHandler};
pub use task::{drive, Resumable, ResumeOutcome, Yielded};
