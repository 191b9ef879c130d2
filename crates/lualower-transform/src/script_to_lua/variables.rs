/*! Variable declarations and destructuring.
 *
 * Simple name bindings stay single `local` statements so hoisting can still
 * rewrite them. Array patterns bind through multiple assignment when the
 * initializer cooperates and fall back to indexed extraction otherwise; object
 * patterns always extract per key. Rest elements route through the runtime's
 * slice and key-exclusion helpers.
 */

use super::context::LoweringContext;
use super::errors::TransformError;
use super::expressions::lower_expression;
use super::lualib::lua_lib_call;
use lualower_ast::{self as ast, DeclarationKind, Diagnostic, ExpressionKind};
use lualower_core::{BinaryOperator, Block, Expression, Identifier, Pos, Statement, TableField};
use lualower_runtime::LuaLibFeature;

pub fn lower_variable_declaration(
    context: &mut LoweringContext,
    declaration: &ast::VariableDeclaration,
    pos: Pos,
) -> Result<Vec<Statement>, TransformError> {
    if declaration.kind == DeclarationKind::Var {
        context.add_diagnostic(Diagnostic::unsupported_var_declaration(pos));
    }

    let mut statements = Vec::new();
    for declarator in &declaration.declarators {
        lower_declarator(context, declarator, &mut statements)?;
    }
    Ok(statements)
}

fn lower_declarator(
    context: &mut LoweringContext,
    declarator: &ast::VariableDeclarator,
    statements: &mut Vec<Statement>,
) -> Result<(), TransformError> {
    match &declarator.pattern {
        ast::BindingPattern::Name(name) => {
            let identifier = resolve_declared(context, name)?;
            let right = match &declarator.initializer {
                Some(initializer) => Some(vec![lower_expression(context, initializer)?]),
                None => None,
            };
            push_declaration(context, identifier, right, declarator.pos, statements)?;
        }
        ast::BindingPattern::Array(elements) => {
            let initializer = require_initializer(declarator)?;
            if let Some(statement) =
                lower_trivial_array_pattern(context, elements, initializer, declarator.pos)?
            {
                context
                    .current_scope_mut()?
                    .record_variable_declaration(statement.clone());
                statements.push(statement);
            } else {
                let root = pattern_root(context, initializer, statements, declarator.pos)?;
                destructure_array(context, elements, &root, statements, declarator.pos)?;
            }
        }
        ast::BindingPattern::Object(elements) => {
            let initializer = require_initializer(declarator)?;
            let root = pattern_root(context, initializer, statements, declarator.pos)?;
            destructure_object(context, elements, &root, statements, declarator.pos)?;
        }
    }
    Ok(())
}

fn require_initializer(
    declarator: &ast::VariableDeclarator,
) -> Result<&ast::Expression, TransformError> {
    declarator.initializer.as_ref().ok_or_else(|| {
        TransformError::UnsupportedFeature(
            "destructuring declaration without an initializer".into(),
        )
    })
}

fn resolve_declared(
    context: &LoweringContext,
    name: &ast::Identifier,
) -> Result<Identifier, TransformError> {
    let symbol = context
        .resolver
        .resolve_symbol(name.id)
        .ok_or_else(|| TransformError::MissingResolution(name.text.clone()))?;
    Ok(Identifier::with_symbol(name.text.clone(), symbol).at(name.pos))
}

fn push_declaration(
    context: &mut LoweringContext,
    identifier: Identifier,
    right: Option<Vec<Expression>>,
    pos: Pos,
    statements: &mut Vec<Statement>,
) -> Result<(), TransformError> {
    let statement = Statement::variable_declaration(vec![identifier], right).at(pos);
    context
        .current_scope_mut()?
        .record_variable_declaration(statement.clone());
    statements.push(statement);
    Ok(())
}

/// An array pattern of plain names without defaults or rest binds through one
/// multiple assignment: directly from a multi-return call, element-wise from a
/// spread-free array literal, through `unpack` otherwise.
fn lower_trivial_array_pattern(
    context: &mut LoweringContext,
    elements: &[ast::BindingElement],
    initializer: &ast::Expression,
    pos: Pos,
) -> Result<Option<Statement>, TransformError> {
    if elements.is_empty()
        || elements.iter().any(|element| {
            element.is_rest || element.default.is_some() || element.pattern.as_name().is_none()
        })
    {
        return Ok(None);
    }

    let mut left = Vec::with_capacity(elements.len());
    for element in elements {
        let name = match element.pattern.as_name() {
            Some(name) => name,
            None => return Ok(None),
        };
        left.push(resolve_declared(context, name)?);
    }

    if initializer.is_call() && context.resolver.is_multi_return_call(initializer.id) {
        let call = lower_expression(context, initializer)?;
        return Ok(Some(
            Statement::variable_declaration(left, Some(vec![call])).at(pos),
        ));
    }

    if let ExpressionKind::Array(values) = &initializer.kind {
        if values.iter().all(|value| !value.spread) {
            let mut right = Vec::with_capacity(values.len());
            for value in values {
                right.push(lower_expression(context, &value.expression)?);
            }
            let right = if right.is_empty() { None } else { Some(right) };
            return Ok(Some(Statement::variable_declaration(left, right).at(pos)));
        }
    }

    let lowered = lower_expression(context, initializer)?;
    let unpack = lua_lib_call(context, LuaLibFeature::Unpack, vec![lowered]);
    Ok(Some(
        Statement::variable_declaration(left, Some(vec![unpack])).at(pos),
    ))
}

/// Evaluates the initializer once. A bare name is indexed directly; anything
/// else lands in a temporary first.
fn pattern_root(
    context: &mut LoweringContext,
    initializer: &ast::Expression,
    statements: &mut Vec<Statement>,
    pos: Pos,
) -> Result<Expression, TransformError> {
    let lowered = lower_expression(context, initializer)?;
    if lowered.as_identifier().is_some() {
        return Ok(lowered);
    }
    let temp = context.fresh_temp();
    statements.push(
        Statement::variable_declaration(vec![temp.clone()], Some(vec![lowered])).at(pos),
    );
    Ok(temp.expression())
}

fn destructure_array(
    context: &mut LoweringContext,
    elements: &[ast::BindingElement],
    root: &Expression,
    statements: &mut Vec<Statement>,
    pos: Pos,
) -> Result<(), TransformError> {
    for (index, element) in elements.iter().enumerate() {
        if element.is_rest {
            let name = element.pattern.as_name().ok_or_else(|| {
                TransformError::UnsupportedFeature("rest element with a nested pattern".into())
            })?;
            let identifier = resolve_declared(context, name)?;
            let slice = lua_lib_call(
                context,
                LuaLibFeature::ArraySlice,
                vec![root.clone(), Expression::number(index as f64)],
            );
            push_declaration(context, identifier, Some(vec![slice]), pos, statements)?;
            continue;
        }
        let access = Expression::index(root.clone(), Expression::number((index + 1) as f64));
        bind_pattern_element(
            context,
            &element.pattern,
            element.default.as_ref(),
            access,
            statements,
            pos,
        )?;
    }
    Ok(())
}

fn destructure_object(
    context: &mut LoweringContext,
    elements: &[ast::ObjectBindingElement],
    root: &Expression,
    statements: &mut Vec<Statement>,
    pos: Pos,
) -> Result<(), TransformError> {
    for element in elements {
        if element.is_rest {
            let name = element.pattern.as_name().ok_or_else(|| {
                TransformError::UnsupportedFeature("rest element with a nested pattern".into())
            })?;
            let identifier = resolve_declared(context, name)?;
            let excluded = elements
                .iter()
                .filter(|sibling| !sibling.is_rest)
                .map(|sibling| {
                    element_key(sibling).map(|key| TableField::KeyValue {
                        key: Expression::string(key),
                        value: Expression::Boolean(true),
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            let rest = lua_lib_call(
                context,
                LuaLibFeature::ObjectRest,
                vec![root.clone(), Expression::Table(excluded)],
            );
            push_declaration(context, identifier, Some(vec![rest]), pos, statements)?;
            continue;
        }
        let key = element_key(element)?;
        let access = Expression::property(root.clone(), key);
        bind_pattern_element(
            context,
            &element.pattern,
            element.default.as_ref(),
            access,
            statements,
            pos,
        )?;
    }
    Ok(())
}

fn element_key(element: &ast::ObjectBindingElement) -> Result<String, TransformError> {
    if let Some(property) = &element.property {
        return Ok(property.clone());
    }
    element
        .pattern
        .as_name()
        .map(|name| name.text.clone())
        .ok_or_else(|| {
            TransformError::UnsupportedFeature("object pattern element without a key".into())
        })
}

fn bind_pattern_element(
    context: &mut LoweringContext,
    pattern: &ast::BindingPattern,
    default: Option<&ast::Expression>,
    access: Expression,
    statements: &mut Vec<Statement>,
    pos: Pos,
) -> Result<(), TransformError> {
    match pattern {
        ast::BindingPattern::Name(name) => {
            let identifier = resolve_declared(context, name)?;
            push_declaration(
                context,
                identifier.clone(),
                Some(vec![access]),
                pos,
                statements,
            )?;
            if let Some(default) = default {
                statements.push(nil_guard(context, identifier.expression(), default, pos)?);
            }
        }
        ast::BindingPattern::Array(elements) => {
            let target = nested_target(context, access, default, statements, pos)?;
            destructure_array(context, elements, &target, statements, pos)?;
        }
        ast::BindingPattern::Object(elements) => {
            let target = nested_target(context, access, default, statements, pos)?;
            destructure_object(context, elements, &target, statements, pos)?;
        }
    }
    Ok(())
}

fn nested_target(
    context: &mut LoweringContext,
    access: Expression,
    default: Option<&ast::Expression>,
    statements: &mut Vec<Statement>,
    pos: Pos,
) -> Result<Expression, TransformError> {
    let temp = context.fresh_temp();
    statements.push(
        Statement::variable_declaration(vec![temp.clone()], Some(vec![access])).at(pos),
    );
    let target = temp.expression();
    if let Some(default) = default {
        statements.push(nil_guard(context, target.clone(), default, pos)?);
    }
    Ok(target)
}

fn nil_guard(
    context: &mut LoweringContext,
    target: Expression,
    default: &ast::Expression,
    pos: Pos,
) -> Result<Statement, TransformError> {
    let default = lower_expression(context, default)?;
    Ok(Statement::if_then(
        Expression::binary(BinaryOperator::Equal, target.clone(), Expression::Nil),
        Block::new(vec![Statement::assignment(vec![target], vec![default])]),
        None,
    )
    .at(pos))
}
