/*! Spread lowering and the vararg forwarding optimization.
 *
 * A spread in final position normally materializes through a runtime helper.
 * When the spread source is the governing function's own rest parameter (or
 * the file vararg constant at file level) and nothing else has touched it, the
 * helper is skipped and the native `...` is forwarded directly.
 */

use super::context::LoweringContext;
use super::errors::TransformError;
use super::expressions::lower_expression;
use super::lualib::lua_lib_call;
use super::scope::ScopeKind;
use lualower_ast::{self as ast, Diagnostic};
use lualower_core::{Expression, SymbolId};
use lualower_runtime::LuaLibFeature;

/// Whether a spread of `symbol` may forward the native vararg. The governing
/// scope is the nearest function, try, catch, or file region; try and catch
/// bodies run inside a `pcall` closure where the outer `...` is out of reach,
/// so they never qualify.
pub fn is_optimized_vararg_spread(context: &LoweringContext, symbol: SymbolId) -> bool {
    let scope = match context.find_scope(&[
        ScopeKind::Function,
        ScopeKind::Try,
        ScopeKind::Catch,
        ScopeKind::File,
    ]) {
        Some(scope) => scope,
        None => return false,
    };

    if context.resolver.is_global_vararg_constant(symbol) {
        return scope.kind == ScopeKind::File;
    }

    scope.kind == ScopeKind::Function
        && scope.rest_parameter == Some(symbol)
        && !scope.referenced_symbols.contains_key(&symbol)
        && !scope.has_referenced_undefined_local_function()
}

pub fn lower_spread_element(
    context: &mut LoweringContext,
    expression: &ast::Expression,
) -> Result<Expression, TransformError> {
    if let Some(text) = expression.as_identifier_text() {
        if context.resolver.has_vararg_annotation(expression.id) {
            context.add_diagnostic(Diagnostic::annotation_removed(expression.pos, text));
        }
        if let Some(symbol) = context.resolver.resolve_symbol(expression.id) {
            if is_optimized_vararg_spread(context, symbol) {
                // Not recorded as a reference: the optimized spread never
                // touches the materialized table.
                return Ok(Expression::Dots);
            }
        }
    }

    if expression.is_call() && context.resolver.is_multi_return_call(expression.id) {
        // Native multiple values already expand in final position.
        return lower_expression(context, expression);
    }

    let lowered = lower_expression(context, expression)?;
    if context.resolver.is_array_type(expression.id) {
        Ok(lua_lib_call(context, LuaLibFeature::Unpack, vec![lowered]))
    } else {
        Ok(lua_lib_call(context, LuaLibFeature::Spread, vec![lowered]))
    }
}
