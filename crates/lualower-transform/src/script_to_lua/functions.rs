/*! Function lowering.
 *
 * Parameters with defaults gain nil guards at the top of the body. A rest
 * parameter becomes the native `...`, materialized into a named table only
 * when the body uses it as a plain value. Async bodies are wrapped in a
 * runtime awaiter closure; because the outer vararg is unreachable from that
 * closure, an async rest parameter is always materialized.
 */

use super::context::LoweringContext;
use super::errors::TransformError;
use super::expressions::lower_expression;
use super::lualib::lua_lib_call;
use super::scope::{perform_hoisting, ScopeKind};
use super::statements::lower_statement_list;
use lualower_ast as ast;
use lualower_core::{
    BinaryOperator, Block, Expression, FunctionExpression, Identifier, Pos, Statement, SymbolId,
    TableField,
};
use lualower_runtime::LuaLibFeature;
use std::collections::HashSet;

pub fn lower_function_expression(
    context: &mut LoweringContext,
    function: &ast::FunctionExpression,
) -> Result<FunctionExpression, TransformError> {
    let (lowered, _) = lower_function_parts(context, function)?;
    Ok(lowered)
}

/// Lowers a function and also returns the symbols its body referenced, which
/// the enclosing scope needs for its hoisting decisions.
pub fn lower_function_parts(
    context: &mut LoweringContext,
    function: &ast::FunctionExpression,
) -> Result<(FunctionExpression, HashSet<SymbolId>), TransformError> {
    context.push_scope(ScopeKind::Function);

    let mut params = Vec::new();
    let mut has_dots = false;
    let mut prologue: Vec<Statement> = Vec::new();
    let mut rest: Option<(SymbolId, Identifier)> = None;

    for parameter in &function.parameters {
        if parameter.is_rest {
            has_dots = true;
            if let Some(symbol) = context.resolver.resolve_symbol(parameter.name.id) {
                if !function.is_async {
                    context.set_rest_parameter(symbol)?;
                }
                rest = Some((
                    symbol,
                    Identifier::with_symbol(parameter.name.text.clone(), symbol)
                        .at(parameter.name.pos),
                ));
            }
            continue;
        }

        let identifier = parameter_identifier(context, &parameter.name);
        if let Some(default) = &parameter.default {
            lower_parameter_default(context, &identifier, default, &mut prologue)?;
        }
        params.push(identifier);
    }

    let lowered_body = lower_statement_list(context, &function.body.statements);
    let scope = context.pop_scope()?;
    let lowered_body = lowered_body?;

    let referenced: HashSet<SymbolId> = scope.referenced_symbols.keys().copied().collect();
    let hoisted = perform_hoisting(context.resolver, &scope, lowered_body);

    let mut body = prologue;
    if let Some((symbol, identifier)) = rest {
        let materialize = if function.is_async {
            scope.referenced_symbols.contains_key(&symbol)
        } else {
            scope.rest_referenced_plainly
        };
        if materialize {
            body.push(Statement::variable_declaration(
                vec![identifier],
                Some(vec![Expression::Table(vec![TableField::Value(
                    Expression::Dots,
                )])]),
            ));
        }
    }

    if function.is_async {
        let awaiter = lua_lib_call(
            context,
            LuaLibFeature::AsyncAwaiter,
            vec![Expression::Function(FunctionExpression::new(
                Vec::new(),
                false,
                Block::new(hoisted),
            ))],
        );
        body.push(Statement::ret(vec![awaiter]));
    } else {
        body.extend(hoisted);
    }

    Ok((
        FunctionExpression::new(params, has_dots, Block::new(body)),
        referenced,
    ))
}

pub fn lower_function_declaration(
    context: &mut LoweringContext,
    name: &ast::Identifier,
    function: &ast::FunctionExpression,
    pos: Pos,
) -> Result<Statement, TransformError> {
    let symbol = context
        .resolver
        .resolve_symbol(name.id)
        .ok_or_else(|| TransformError::MissingResolution(name.text.clone()))?;
    let (lowered, referenced) = lower_function_parts(context, function)?;
    let statement = Statement::local_function(
        Identifier::with_symbol(name.text.clone(), symbol).at(name.pos),
        lowered,
    )
    .at(pos);
    context
        .current_scope_mut()?
        .record_function_definition(symbol, referenced, statement.clone());
    Ok(statement)
}

fn parameter_identifier(context: &LoweringContext, name: &ast::Identifier) -> Identifier {
    match context.resolver.resolve_symbol(name.id) {
        Some(symbol) => Identifier::with_symbol(name.text.clone(), symbol).at(name.pos),
        None => Identifier::new(name.text.clone()).at(name.pos),
    }
}

fn lower_parameter_default(
    context: &mut LoweringContext,
    parameter: &Identifier,
    default: &ast::Expression,
    prologue: &mut Vec<Statement>,
) -> Result<(), TransformError> {
    context.push_preceding_statements();
    let result = lower_expression(context, default);
    let mut preceding = context.pop_preceding_statements();
    let fallback = result?;
    prologue.append(&mut preceding);
    prologue.push(Statement::if_then(
        Expression::binary(
            BinaryOperator::Equal,
            parameter.clone().expression(),
            Expression::Nil,
        ),
        Block::new(vec![Statement::assignment(
            vec![parameter.clone().expression()],
            vec![fallback],
        )]),
        None,
    ));
    Ok(())
}
