/*! Expression lowering.
 *
 * Every source expression maps to exactly one Lua expression; forms that need
 * extra statements (receiver temporaries, spread materialization) emit them
 * through the context's preceding-statement buffer.
 */

use super::builtins;
use super::classes;
use super::context::LoweringContext;
use super::errors::TransformError;
use super::functions;
use super::lualib::{feature_identifier, lua_lib_binding_call, lua_lib_call};
use super::spread;
use lualower_ast::{
    self as ast, EnumMemberValue, ExpressionKind, NodeId, ObjectProperty, StandardLibraryKind,
};
use lualower_core::{
    is_valid_lua_name, BinaryOperator, Expression, Identifier, Pos, Statement, TableField,
    UnaryOperator,
};
use lualower_runtime::LuaLibFeature;

pub fn lower_expression(
    context: &mut LoweringContext,
    expression: &ast::Expression,
) -> Result<Expression, TransformError> {
    match &expression.kind {
        ExpressionKind::Undefined => Ok(Expression::Nil),
        ExpressionKind::Boolean(value) => Ok(Expression::Boolean(*value)),
        ExpressionKind::Number(value) => Ok(Expression::Number(*value)),
        ExpressionKind::StringLiteral(text) => Ok(Expression::string(text.clone())),
        ExpressionKind::Identifier(text) => lower_identifier(context, expression, text),
        ExpressionKind::This => Ok(Expression::name("self")),
        ExpressionKind::Super => lower_super(context, expression.pos),
        ExpressionKind::Array(elements) => lower_array_literal(context, elements),
        ExpressionKind::ObjectLiteral(properties) => lower_object_literal(context, properties),
        ExpressionKind::PropertyAccess { object, property } => {
            lower_property_access(context, expression, object, property)
        }
        ExpressionKind::ElementAccess { object, index } => {
            lower_element_access(context, object, index)
        }
        ExpressionKind::Call { callee, arguments } => {
            lower_call(context, expression, callee, arguments)
        }
        ExpressionKind::New { callee, arguments } => lower_new(context, callee, arguments),
        ExpressionKind::Function(function) => Ok(Expression::Function(
            functions::lower_function_expression(context, function)?,
        )),
        ExpressionKind::Class(class) => classes::lower_class_expression(context, class),
        ExpressionKind::Binary { op, left, right } => {
            let left = lower_expression(context, left)?;
            let right = lower_expression(context, right)?;
            Ok(Expression::binary(lower_binary_operator(*op), left, right))
        }
        ExpressionKind::Unary { op, operand } => {
            let operand = lower_expression(context, operand)?;
            Ok(Expression::Unary {
                op: lower_unary_operator(*op),
                operand: Box::new(operand),
            })
        }
        ExpressionKind::Await(inner) => {
            let inner = lower_expression(context, inner)?;
            Ok(lua_lib_call(context, LuaLibFeature::Await, vec![inner]))
        }
    }
}

fn lower_identifier(
    context: &mut LoweringContext,
    expression: &ast::Expression,
    text: &str,
) -> Result<Expression, TransformError> {
    if let Some(lowered) = builtins::lower_builtin_identifier(context, expression.id) {
        return Ok(lowered);
    }
    lower_identifier_reference(context, expression.id, text, expression.pos)
}

/// Lowers a resolved identifier use. Unresolved names pass through as globals;
/// resolved ones are recorded as references so hoisting and the vararg
/// optimization can see them.
pub fn lower_identifier_reference(
    context: &mut LoweringContext,
    node: NodeId,
    text: &str,
    pos: Pos,
) -> Result<Expression, TransformError> {
    let symbol = match context.resolver.resolve_symbol(node) {
        Some(symbol) => symbol,
        None => return Ok(Expression::name(text)),
    };
    context.mark_symbol_referenced(symbol, pos);
    context.mark_rest_referenced_plainly(symbol);
    if context.resolver.is_global_vararg_constant(symbol) {
        // A plain (non-spread) use of the file vararg materializes it.
        return Ok(Expression::Table(vec![TableField::Value(Expression::Dots)]));
    }
    Ok(Expression::Identifier(
        Identifier::with_symbol(text, symbol).at(pos),
    ))
}

pub(super) fn lower_super(
    context: &LoweringContext,
    pos: Pos,
) -> Result<Expression, TransformError> {
    let frame = context
        .current_super_frame()
        .ok_or(TransformError::SuperOutsideClass(pos))?;
    frame
        .base
        .clone()
        .ok_or(TransformError::SuperOutsideClass(pos))
}

fn lower_array_literal(
    context: &mut LoweringContext,
    elements: &[ast::ArrayElement],
) -> Result<Expression, TransformError> {
    let mut fields = Vec::with_capacity(elements.len());
    for (index, element) in elements.iter().enumerate() {
        let lowered = if element.spread {
            if index + 1 != elements.len() {
                return Err(TransformError::UnsupportedFeature(
                    "spread element before the end of an array literal".into(),
                ));
            }
            spread::lower_spread_element(context, &element.expression)?
        } else {
            lower_expression(context, &element.expression)?
        };
        fields.push(TableField::Value(lowered));
    }
    Ok(Expression::Table(fields))
}

fn lower_object_literal(
    context: &mut LoweringContext,
    properties: &[ObjectProperty],
) -> Result<Expression, TransformError> {
    if !properties
        .iter()
        .any(|property| matches!(property, ObjectProperty::Spread(_)))
    {
        let mut fields = Vec::with_capacity(properties.len());
        for property in properties {
            if let Some(field) = lower_plain_property(context, property)? {
                fields.push(field);
            }
        }
        return Ok(Expression::Table(fields));
    }

    // Spreads split the literal into segments merged onto a fresh table, so
    // later keys still win over earlier ones.
    let mut args = vec![Expression::Table(Vec::new())];
    let mut pending: Vec<TableField> = Vec::new();
    for property in properties {
        match property {
            ObjectProperty::Spread(expression) => {
                if !pending.is_empty() {
                    args.push(Expression::Table(std::mem::take(&mut pending)));
                }
                args.push(lower_expression(context, expression)?);
            }
            other => {
                if let Some(field) = lower_plain_property(context, other)? {
                    pending.push(field);
                }
            }
        }
    }
    if !pending.is_empty() {
        args.push(Expression::Table(pending));
    }
    Ok(lua_lib_call(context, LuaLibFeature::ObjectAssign, args))
}

fn lower_plain_property(
    context: &mut LoweringContext,
    property: &ObjectProperty,
) -> Result<Option<TableField>, TransformError> {
    match property {
        ObjectProperty::KeyValue { key, value } => Ok(Some(TableField::KeyValue {
            key: Expression::string(key.clone()),
            value: lower_expression(context, value)?,
        })),
        ObjectProperty::Shorthand(name) => Ok(Some(TableField::KeyValue {
            key: Expression::string(name.text.clone()),
            value: lower_identifier_reference(context, name.id, &name.text, name.pos)?,
        })),
        ObjectProperty::Spread(_) => Ok(None),
    }
}

fn lower_property_access(
    context: &mut LoweringContext,
    expression: &ast::Expression,
    object: &ast::Expression,
    property: &str,
) -> Result<Expression, TransformError> {
    if !context.options.preserve_const_enums {
        if let Some(value) = context.resolver.enum_member_value(expression.id) {
            return Ok(enum_value_expression(&value));
        }
    }
    if let Some(lowered) = builtins::lower_builtin_property_access(context, object.id, property) {
        return Ok(lowered);
    }
    if matches!(object.kind, ExpressionKind::Super) {
        let base = lower_super(context, object.pos)?;
        return Ok(Expression::property(
            Expression::property(base, "prototype"),
            property,
        ));
    }
    let object = lower_expression(context, object)?;
    Ok(Expression::property(object, property))
}

fn enum_value_expression(value: &EnumMemberValue) -> Expression {
    match value {
        EnumMemberValue::Number(number) => Expression::Number(*number),
        EnumMemberValue::String(text) => Expression::string(text.clone()),
    }
}

fn lower_element_access(
    context: &mut LoweringContext,
    object: &ast::Expression,
    index: &ast::Expression,
) -> Result<Expression, TransformError> {
    let is_array = context.resolver.is_array_type(object.id);
    let table = lower_expression(context, object)?;
    let mut key = lower_expression(context, index)?;
    if is_array {
        key = shift_index(key);
    }
    Ok(Expression::index(table, key))
}

/// Array accesses shift from zero-based to one-based; constant keys fold.
fn shift_index(key: Expression) -> Expression {
    match key {
        Expression::Number(number) => Expression::Number(number + 1.0),
        other => Expression::binary(BinaryOperator::Add, other, Expression::Number(1.0)),
    }
}

fn lower_call(
    context: &mut LoweringContext,
    expression: &ast::Expression,
    callee: &ast::Expression,
    arguments: &[ast::Argument],
) -> Result<Expression, TransformError> {
    if matches!(callee.kind, ExpressionKind::Super) {
        let base = lower_super(context, callee.pos)?;
        let mut args = vec![Expression::name("self")];
        args.extend(lower_arguments(context, arguments)?);
        return Ok(Expression::call(
            Expression::property(Expression::property(base, "prototype"), "____constructor"),
            args,
        ));
    }

    if let ExpressionKind::PropertyAccess { object, property } = &callee.kind {
        if let Some(builtin) = builtins::lower_builtin_property_access(context, object.id, property)
        {
            let args = lower_arguments(context, arguments)?;
            return Ok(Expression::call(builtin, args));
        }
        if matches!(object.kind, ExpressionKind::Super) {
            let base = lower_super(context, object.pos)?;
            let mut args = vec![Expression::name("self")];
            args.extend(lower_arguments(context, arguments)?);
            return Ok(Expression::call(
                Expression::property(Expression::property(base, "prototype"), property),
                args,
            ));
        }
        if context.resolver.is_self_call(expression.id) {
            return lower_method_call(context, object, property, arguments);
        }
        let object = lower_expression(context, object)?;
        let args = lower_arguments(context, arguments)?;
        return Ok(Expression::call(Expression::property(object, property), args));
    }

    let function = lower_expression(context, callee)?;
    let args = lower_arguments(context, arguments)?;
    Ok(Expression::call(function, args))
}

fn lower_method_call(
    context: &mut LoweringContext,
    object: &ast::Expression,
    property: &str,
    arguments: &[ast::Argument],
) -> Result<Expression, TransformError> {
    let lowered_object = lower_expression(context, object)?;
    let args = lower_arguments(context, arguments)?;
    if is_valid_lua_name(property) {
        return Ok(Expression::method_call(lowered_object, property, args));
    }

    // Colon syntax cannot carry a reserved word or exotic name. The receiver
    // is passed explicitly instead, through a temporary unless it is already a
    // plain name, so it evaluates once.
    let receiver = if lowered_object.as_identifier().is_some() {
        lowered_object
    } else {
        let temp = context.fresh_temp();
        context.add_preceding_statement(Statement::variable_declaration(
            vec![temp.clone()],
            Some(vec![lowered_object]),
        ));
        temp.expression()
    };
    let mut full_args = vec![receiver.clone()];
    full_args.extend(args);
    Ok(Expression::call(
        Expression::property(receiver, property),
        full_args,
    ))
}

fn lower_new(
    context: &mut LoweringContext,
    callee: &ast::Expression,
    arguments: &[ast::Argument],
) -> Result<Expression, TransformError> {
    if context.resolver.standard_library_kind(callee.id)
        == Some(StandardLibraryKind::PromiseConstructor)
    {
        context.import_feature(LuaLibFeature::Promise);
        let args = lower_arguments(context, arguments)?;
        return Ok(Expression::call(
            Expression::property(feature_identifier(LuaLibFeature::Promise), "new"),
            args,
        ));
    }
    let class = lower_expression(context, callee)?;
    let mut args = vec![class];
    args.extend(lower_arguments(context, arguments)?);
    Ok(lua_lib_binding_call(
        context,
        LuaLibFeature::Class,
        "__LL_New",
        args,
    ))
}

/// Lowers a call or constructor argument list. A spread is only legal in the
/// final position, where Lua's own multiple-value expansion applies.
pub fn lower_arguments(
    context: &mut LoweringContext,
    arguments: &[ast::Argument],
) -> Result<Vec<Expression>, TransformError> {
    let mut lowered = Vec::with_capacity(arguments.len());
    for (index, argument) in arguments.iter().enumerate() {
        if argument.spread {
            if index + 1 != arguments.len() {
                return Err(TransformError::UnsupportedFeature(
                    "spread argument before the end of an argument list".into(),
                ));
            }
            lowered.push(spread::lower_spread_element(context, &argument.expression)?);
        } else {
            lowered.push(lower_expression(context, &argument.expression)?);
        }
    }
    Ok(lowered)
}

fn lower_binary_operator(op: ast::BinaryOperator) -> BinaryOperator {
    match op {
        ast::BinaryOperator::Add => BinaryOperator::Add,
        ast::BinaryOperator::Sub => BinaryOperator::Sub,
        ast::BinaryOperator::Mul => BinaryOperator::Mul,
        ast::BinaryOperator::Div => BinaryOperator::Div,
        ast::BinaryOperator::Mod => BinaryOperator::Mod,
        ast::BinaryOperator::Equal => BinaryOperator::Equal,
        ast::BinaryOperator::NotEqual => BinaryOperator::NotEqual,
        ast::BinaryOperator::LessThan => BinaryOperator::LessThan,
        ast::BinaryOperator::LessEqual => BinaryOperator::LessEqual,
        ast::BinaryOperator::GreaterThan => BinaryOperator::GreaterThan,
        ast::BinaryOperator::GreaterEqual => BinaryOperator::GreaterEqual,
        ast::BinaryOperator::And => BinaryOperator::And,
        ast::BinaryOperator::Or => BinaryOperator::Or,
    }
}

fn lower_unary_operator(op: ast::UnaryOperator) -> UnaryOperator {
    match op {
        ast::UnaryOperator::Negate => UnaryOperator::Negate,
        ast::UnaryOperator::Not => UnaryOperator::Not,
    }
}

#[cfg(test)]
mod tests {
    use super::super::scope::ScopeKind;
    use super::*;
    use lualower_ast::{AstBuilder, ResolutionTable};
    use lualower_core::format_expression;
    use pretty_assertions::assert_eq;

    fn lower(table: &ResolutionTable, expression: &ast::Expression) -> Expression {
        let mut context = LoweringContext::new(table);
        context.push_scope(ScopeKind::File);
        lower_expression(&mut context, expression).unwrap()
    }

    #[test]
    fn this_lowers_to_self() {
        let mut builder = AstBuilder::new();
        let table = ResolutionTable::new();
        let this = builder.this();

        assert_eq!(format_expression(&lower(&table, &this)), "self");
    }

    #[test]
    fn array_element_access_shifts_to_one_based() {
        let mut builder = AstBuilder::new();
        let mut table = ResolutionTable::new();
        let list = builder.reference("list");
        table.mark_array_type(list.id);
        let index = builder.number(0.0);
        let access = builder.element_access(list, index);

        assert_eq!(format_expression(&lower(&table, &access)), "list[1]");
    }

    #[test]
    fn dynamic_array_index_gains_an_addition() {
        let mut builder = AstBuilder::new();
        let mut table = ResolutionTable::new();
        let list = builder.reference("list");
        table.mark_array_type(list.id);
        let index = builder.reference("i");
        let access = builder.element_access(list, index);

        assert_eq!(format_expression(&lower(&table, &access)), "list[i + 1]");
    }

    #[test]
    fn super_outside_a_class_is_an_error() {
        let mut builder = AstBuilder::new();
        let table = ResolutionTable::new();
        let superclass = builder.superclass();
        let mut context = LoweringContext::new(&table);
        context.push_scope(ScopeKind::File);

        let error = lower_expression(&mut context, &superclass).unwrap_err();
        assert!(matches!(error, TransformError::SuperOutsideClass(_)));
    }

    #[test]
    fn const_enum_access_inlines_its_value() {
        let mut builder = AstBuilder::new();
        let mut table = ResolutionTable::new();
        let owner = builder.reference("Direction");
        let access = builder.property_access(owner, "Up");
        table.set_enum_member_value(access.id, EnumMemberValue::Number(1.0));

        assert_eq!(format_expression(&lower(&table, &access)), "1");
    }

    #[test]
    fn preserved_const_enums_keep_the_table_reference() {
        let mut builder = AstBuilder::new();
        let mut table = ResolutionTable::new();
        let owner = builder.reference("Direction");
        let access = builder.property_access(owner, "Up");
        table.set_enum_member_value(access.id, EnumMemberValue::Number(1.0));

        let options = super::super::context::LoweringOptions {
            preserve_const_enums: true,
        };
        let mut context = LoweringContext::with_options(&table, options);
        context.push_scope(ScopeKind::File);
        let lowered = lower_expression(&mut context, &access).unwrap();
        assert_eq!(format_expression(&lowered), "Direction.Up");
    }

    #[test]
    fn self_call_with_a_plain_name_uses_colon_syntax() {
        let mut builder = AstBuilder::new();
        let mut table = ResolutionTable::new();
        let object = builder.reference("promise");
        let callee = builder.property_access(object, "andThen");
        let argument = builder.reference("handler");
        let call = builder.call(callee, vec![argument]);
        table.mark_self_call(call.id);

        assert_eq!(
            format_expression(&lower(&table, &call)),
            "promise:andThen(handler)"
        );
    }

    #[test]
    fn self_call_with_a_keyword_name_passes_the_receiver_explicitly() {
        let mut builder = AstBuilder::new();
        let mut table = ResolutionTable::new();
        let object = builder.reference("promise");
        let callee = builder.property_access(object, "then");
        let argument = builder.reference("handler");
        let call = builder.call(callee, vec![argument]);
        table.mark_self_call(call.id);

        assert_eq!(
            format_expression(&lower(&table, &call)),
            "promise[\"then\"](promise, handler)"
        );
    }

    #[test]
    fn keyword_method_on_a_call_result_goes_through_a_temporary() {
        let mut builder = AstBuilder::new();
        let mut table = ResolutionTable::new();
        let producer = builder.reference("fetch");
        let object = builder.call(producer, Vec::new());
        let callee = builder.property_access(object, "then");
        let call = builder.call(callee, Vec::new());
        table.mark_self_call(call.id);

        let mut context = LoweringContext::new(&table);
        context.push_scope(ScopeKind::File);
        context.push_preceding_statements();
        let lowered = lower_expression(&mut context, &call).unwrap();
        let preceding = context.pop_preceding_statements();

        assert_eq!(
            format_expression(&lowered),
            "____temp_0[\"then\"](____temp_0)"
        );
        assert_eq!(preceding.len(), 1);
    }

    #[test]
    fn object_spread_merges_segments_in_order() {
        let mut builder = AstBuilder::new();
        let table = ResolutionTable::new();
        let value = builder.number(1.0);
        let spread_source = builder.reference("defaults");
        let object = builder.object(vec![
            ObjectProperty::KeyValue { key: "a".into(), value },
            ObjectProperty::Spread(spread_source),
        ]);

        let mut context = LoweringContext::new(&table);
        context.push_scope(ScopeKind::File);
        let lowered = lower_expression(&mut context, &object).unwrap();
        assert_eq!(
            format_expression(&lowered),
            "__LL_ObjectAssign({}, {a = 1}, defaults)"
        );
        assert_eq!(
            context.used_features().collect::<Vec<_>>(),
            vec![LuaLibFeature::ObjectAssign]
        );
    }

    #[test]
    fn await_routes_through_the_runtime() {
        let mut builder = AstBuilder::new();
        let table = ResolutionTable::new();
        let operand = builder.reference("pending");
        let awaited = builder.await_expression(operand);

        let mut context = LoweringContext::new(&table);
        context.push_scope(ScopeKind::File);
        let lowered = lower_expression(&mut context, &awaited).unwrap();
        assert_eq!(format_expression(&lowered), "__LL_Await(pending)");
        assert_eq!(
            context.used_features().collect::<Vec<_>>(),
            vec![LuaLibFeature::Await]
        );
    }

    #[test]
    fn new_goes_through_the_class_runtime() {
        let mut builder = AstBuilder::new();
        let table = ResolutionTable::new();
        let callee = builder.reference("Point");
        let x = builder.number(1.0);
        let y = builder.number(2.0);
        let instantiation = builder.new_expression(callee, vec![x, y]);

        let mut context = LoweringContext::new(&table);
        context.push_scope(ScopeKind::File);
        let lowered = lower_expression(&mut context, &instantiation).unwrap();
        assert_eq!(format_expression(&lowered), "__LL_New(Point, 1, 2)");
        assert_eq!(
            context.used_features().collect::<Vec<_>>(),
            vec![LuaLibFeature::Class]
        );
    }

    #[test]
    fn new_promise_uses_the_promise_constructor() {
        let mut builder = AstBuilder::new();
        let mut table = ResolutionTable::new();
        let callee = builder.reference("Promise");
        table.mark_standard_library(callee.id, StandardLibraryKind::PromiseConstructor);
        let executor = builder.reference("executor");
        let instantiation = builder.new_expression(callee, vec![executor]);

        let mut context = LoweringContext::new(&table);
        context.push_scope(ScopeKind::File);
        let lowered = lower_expression(&mut context, &instantiation).unwrap();
        assert_eq!(format_expression(&lowered), "__LL_Promise.new(executor)");
        assert_eq!(
            context.used_features().collect::<Vec<_>>(),
            vec![LuaLibFeature::Promise]
        );
    }

    #[test]
    fn vararg_constant_materializes_when_used_plainly() {
        let mut builder = AstBuilder::new();
        let mut table = ResolutionTable::new();
        let reference = builder.reference("args");
        let symbol = table.allocate_symbol();
        table.declare(reference.id, symbol, reference.pos);
        table.mark_vararg_constant(symbol);

        assert_eq!(format_expression(&lower(&table, &reference)), "{...}");
    }

    #[test]
    fn non_final_spread_argument_is_rejected() {
        let mut builder = AstBuilder::new();
        let table = ResolutionTable::new();
        let callee = builder.reference("f");
        let spread_source = builder.reference("list");
        let tail = builder.number(1.0);
        let call = builder.call_with(
            callee,
            vec![ast::Argument::spread(spread_source), ast::Argument::plain(tail)],
        );

        let mut context = LoweringContext::new(&table);
        context.push_scope(ScopeKind::File);
        let error = lower_expression(&mut context, &call).unwrap_err();
        assert!(matches!(error, TransformError::UnsupportedFeature(_)));
    }
}
