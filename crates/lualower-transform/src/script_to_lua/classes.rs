/*! Class lowering.
 *
 * A class becomes a table created by the runtime class helper, wired to its
 * base with the extends helper, and populated member by member. Instance field
 * initializers run inside the constructor, after the base constructor call
 * when the body makes one. A derived class without an explicit constructor and
 * without fields emits none at all; the runtime metatable chain reaches the
 * base constructor directly. Getter and setter pairs land in one descriptor
 * table per property name. Decorators apply bottom-up after the body, member
 * decorators first, class decorators last.
 */

use super::context::{LoweringContext, SuperFrame};
use super::errors::TransformError;
use super::expressions::lower_expression;
use super::functions::lower_function_parts;
use super::lualib::{lua_lib_binding_call, lua_lib_call};
use lualower_ast as ast;
use lualower_core::{
    Block, Expression, FunctionExpression, Identifier, Statement, StatementKind, TableField,
};
use lualower_runtime::LuaLibFeature;

pub fn lower_class_declaration(
    context: &mut LoweringContext,
    class: &ast::ClassDeclaration,
) -> Result<Vec<Statement>, TransformError> {
    let name = class_identifier(context, class);
    lower_class_parts(context, class, name)
}

/// A class expression lowers to an immediately invoked closure that builds the
/// class under a generated name and returns it.
pub fn lower_class_expression(
    context: &mut LoweringContext,
    class: &ast::ClassDeclaration,
) -> Result<Expression, TransformError> {
    let name = class_identifier(context, class);
    let mut statements = lower_class_parts(context, class, name.clone())?;
    statements.push(Statement::ret(vec![name.expression()]));
    Ok(Expression::call(
        Expression::Function(FunctionExpression::new(
            Vec::new(),
            false,
            Block::new(statements),
        )),
        Vec::new(),
    ))
}

fn class_identifier(context: &mut LoweringContext, class: &ast::ClassDeclaration) -> Identifier {
    match &class.name {
        Some(name) => match context.resolver.resolve_symbol(name.id) {
            Some(symbol) => Identifier::with_symbol(name.text.clone(), symbol).at(name.pos),
            None => Identifier::new(name.text.clone()).at(name.pos),
        },
        None => context.fresh_temp(),
    }
}

fn lower_class_parts(
    context: &mut LoweringContext,
    class: &ast::ClassDeclaration,
    name: Identifier,
) -> Result<Vec<Statement>, TransformError> {
    let table = lua_lib_call(
        context,
        LuaLibFeature::Class,
        vec![Expression::string(name.text.clone())],
    );
    let declaration = Statement::variable_declaration(vec![name.clone()], Some(vec![table]))
        .at(class.pos);
    context
        .current_scope_mut()?
        .record_variable_declaration(declaration.clone());
    let mut statements = vec![declaration];

    let base = match &class.extends {
        Some(extends) => {
            let lowered = lower_expression(context, extends)?;
            let base = super_reference(context, extends, &name, &lowered);
            statements.push(Statement::expression(lua_lib_binding_call(
                context,
                LuaLibFeature::Class,
                "__LL_ClassExtends",
                vec![name.clone().expression(), lowered],
            )));
            Some(base)
        }
        None => None,
    };

    context.push_super_frame(SuperFrame {
        class_name: name.clone(),
        base,
    });
    let body = lower_class_body(context, class, &name, &mut statements);
    context.pop_super_frame();
    body?;

    for member in &class.members {
        let member_name = match member.kind.member_name() {
            Some(member_name) => member_name,
            None => continue,
        };
        for decorator in &member.decorators {
            let lowered = lower_expression(context, decorator)?;
            let path = member_path(&name, member_name, member.kind.is_static());
            statements.push(
                Statement::assignment(
                    vec![path.clone()],
                    vec![Expression::call(lowered, vec![path])],
                )
                .at(member.pos),
            );
        }
    }

    for decorator in &class.decorators {
        let lowered = lower_expression(context, decorator)?;
        statements.push(
            Statement::assignment(
                vec![name.clone().expression()],
                vec![Expression::call(lowered, vec![name.clone().expression()])],
            )
            .at(class.pos),
        );
    }

    Ok(statements)
}

/// Expression later `super` references resolve to. A base named by a plain
/// local identifier is referenced directly; anything else goes through the
/// back link the runtime stores on the class table, which also keeps exported
/// bases current when the export table entry is reassigned.
fn super_reference(
    context: &LoweringContext,
    extends: &ast::Expression,
    class_name: &Identifier,
    lowered: &Expression,
) -> Expression {
    if extends.as_identifier_text().is_some() {
        if let Some(symbol) = context.resolver.resolve_symbol(extends.id) {
            if !context.resolver.is_symbol_exported(symbol) {
                return lowered.clone();
            }
        }
    }
    Expression::property(class_name.clone().expression(), "____super")
}

fn lower_class_body(
    context: &mut LoweringContext,
    class: &ast::ClassDeclaration,
    name: &Identifier,
    statements: &mut Vec<Statement>,
) -> Result<(), TransformError> {
    let initializers = field_initializers(context, class)?;
    emit_constructor(context, class, name, initializers, statements)?;

    let mut emitted_accessors: Vec<(String, bool)> = Vec::new();
    for member in &class.members {
        match &member.kind {
            ast::MemberKind::Constructor { .. } => {}
            ast::MemberKind::Method {
                name: method_name,
                function,
                is_static,
            } => {
                let (mut lowered, _) = lower_function_parts(context, function)?;
                lowered.params.insert(0, Identifier::new("self"));
                statements.push(
                    Statement::assignment(
                        vec![member_path(name, method_name, *is_static)],
                        vec![Expression::Function(lowered)],
                    )
                    .at(member.pos),
                );
            }
            ast::MemberKind::Property {
                name: property_name,
                initializer,
                is_static,
            } => {
                if *is_static {
                    if let Some(initializer) = initializer {
                        let lowered = lower_expression(context, initializer)?;
                        statements.push(
                            Statement::assignment(
                                vec![member_path(name, property_name, true)],
                                vec![lowered],
                            )
                            .at(member.pos),
                        );
                    }
                }
            }
            ast::MemberKind::Getter {
                name: accessor,
                is_static,
                ..
            }
            | ast::MemberKind::Setter {
                name: accessor,
                is_static,
                ..
            } => {
                let key = (accessor.clone(), *is_static);
                if emitted_accessors.contains(&key) {
                    continue;
                }
                emitted_accessors.push(key);
                let descriptor = lower_accessor_pair(context, class, accessor, *is_static)?;
                let target = if *is_static {
                    name.clone().expression()
                } else {
                    Expression::property(name.clone().expression(), "prototype")
                };
                statements.push(
                    Statement::expression(lua_lib_binding_call(
                        context,
                        LuaLibFeature::Descriptors,
                        "__LL_SetDescriptor",
                        vec![
                            target,
                            Expression::string(accessor.clone()),
                            descriptor,
                            Expression::Boolean(*is_static),
                        ],
                    ))
                    .at(member.pos),
                );
            }
        }
    }
    Ok(())
}

fn field_initializers(
    context: &mut LoweringContext,
    class: &ast::ClassDeclaration,
) -> Result<Vec<Statement>, TransformError> {
    let mut assignments = Vec::new();
    for member in &class.members {
        if let ast::MemberKind::Property {
            name,
            initializer: Some(initializer),
            is_static: false,
        } = &member.kind
        {
            let value = lower_expression(context, initializer)?;
            assignments.push(
                Statement::assignment(
                    vec![Expression::property(Expression::name("self"), name.clone())],
                    vec![value],
                )
                .at(member.pos),
            );
        }
    }
    Ok(assignments)
}

/// Emits the constructor assignment. An explicit constructor receives the
/// field initializers right after its base constructor call, or at the top
/// when there is none. Without an explicit constructor, a base class gets an
/// initializer-only body, and a derived class gets a forwarding body only when
/// it has fields to set.
fn emit_constructor(
    context: &mut LoweringContext,
    class: &ast::ClassDeclaration,
    name: &Identifier,
    initializers: Vec<Statement>,
    statements: &mut Vec<Statement>,
) -> Result<(), TransformError> {
    let explicit = class.members.iter().find_map(|member| match &member.kind {
        ast::MemberKind::Constructor {
            parameters,
            body: Some(body),
        } => Some((parameters, body, member.pos)),
        _ => None,
    });

    let constructor = match explicit {
        Some((parameters, body, pos)) => {
            let function = ast::FunctionExpression {
                parameters: parameters.clone(),
                body: body.clone(),
                is_async: false,
            };
            let (mut lowered, _) = lower_function_parts(context, &function)?;
            let insert_at = match super_call_index(&lowered.body.statements) {
                Some(index) => index + 1,
                None => 0,
            };
            for (offset, initializer) in initializers.into_iter().enumerate() {
                lowered.body.statements.insert(insert_at + offset, initializer);
            }
            lowered.params.insert(0, Identifier::new("self"));
            Some((lowered, pos))
        }
        None => synthesize_constructor(context, initializers)?.map(|body| (body, class.pos)),
    };

    if let Some((function, pos)) = constructor {
        statements.push(
            Statement::assignment(
                vec![member_path(name, "____constructor", false)],
                vec![Expression::Function(function)],
            )
            .at(pos),
        );
    }
    Ok(())
}

fn synthesize_constructor(
    context: &LoweringContext,
    initializers: Vec<Statement>,
) -> Result<Option<FunctionExpression>, TransformError> {
    let base = context
        .current_super_frame()
        .and_then(|frame| frame.base.clone());
    match base {
        Some(base) => {
            if initializers.is_empty() {
                return Ok(None);
            }
            let mut body = vec![Statement::expression(Expression::call(
                Expression::property(
                    Expression::property(base, "prototype"),
                    "____constructor",
                ),
                vec![Expression::name("self"), Expression::Dots],
            ))];
            body.extend(initializers);
            Ok(Some(FunctionExpression::new(
                vec![Identifier::new("self")],
                true,
                Block::new(body),
            )))
        }
        None => Ok(Some(FunctionExpression::new(
            vec![Identifier::new("self")],
            false,
            Block::new(initializers),
        ))),
    }
}

/// Position of the base constructor call in a lowered constructor body. The
/// call lowers to `base.prototype.____constructor(self, ...)`, so the match is
/// on the trailing two index keys.
fn super_call_index(statements: &[Statement]) -> Option<usize> {
    statements.iter().position(|statement| {
        if let StatementKind::Expression(Expression::Call { function, .. }) = &statement.kind {
            is_base_constructor_path(function)
        } else {
            false
        }
    })
}

fn is_base_constructor_path(expression: &Expression) -> bool {
    if let Expression::Index { table, key } = expression {
        if let Expression::String(name) = key.as_ref() {
            if name != "____constructor" {
                return false;
            }
            if let Expression::Index { key: inner, .. } = table.as_ref() {
                return matches!(inner.as_ref(), Expression::String(text) if text == "prototype");
            }
        }
    }
    false
}

fn lower_accessor_pair(
    context: &mut LoweringContext,
    class: &ast::ClassDeclaration,
    accessor: &str,
    is_static: bool,
) -> Result<Expression, TransformError> {
    let mut fields = Vec::new();
    for member in &class.members {
        match &member.kind {
            ast::MemberKind::Getter {
                name,
                body,
                is_static: member_static,
            } if name == accessor && *member_static == is_static => {
                let function = ast::FunctionExpression {
                    parameters: Vec::new(),
                    body: body.clone(),
                    is_async: false,
                };
                let (mut lowered, _) = lower_function_parts(context, &function)?;
                lowered.params.insert(0, Identifier::new("self"));
                fields.push(TableField::KeyValue {
                    key: Expression::string("get"),
                    value: Expression::Function(lowered),
                });
            }
            ast::MemberKind::Setter {
                name,
                parameter,
                body,
                is_static: member_static,
            } if name == accessor && *member_static == is_static => {
                let function = ast::FunctionExpression {
                    parameters: vec![ast::Parameter::new(parameter.clone())],
                    body: body.clone(),
                    is_async: false,
                };
                let (mut lowered, _) = lower_function_parts(context, &function)?;
                lowered.params.insert(0, Identifier::new("self"));
                fields.push(TableField::KeyValue {
                    key: Expression::string("set"),
                    value: Expression::Function(lowered),
                });
            }
            _ => {}
        }
    }
    Ok(Expression::Table(fields))
}

fn member_path(class_name: &Identifier, member: &str, is_static: bool) -> Expression {
    if is_static {
        Expression::property(class_name.clone().expression(), member)
    } else {
        Expression::property(
            Expression::property(class_name.clone().expression(), "prototype"),
            member,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::scope::ScopeKind;
    use lualower_ast::{AstBuilder, ExpressionKind, MemberKind, ResolutionTable, Resolver};
    use lualower_core::format_statement;
    use pretty_assertions::assert_eq;

    fn declared(
        builder: &mut AstBuilder,
        table: &mut ResolutionTable,
        text: &str,
    ) -> ast::Identifier {
        let name = builder.identifier(text);
        let symbol = table.allocate_symbol();
        table.declare(name.id, symbol, name.pos);
        name
    }

    fn rendered(statements: &[Statement]) -> String {
        statements.iter().map(format_statement).collect()
    }

    fn lower(
        table: &ResolutionTable,
        class: &ast::ClassDeclaration,
    ) -> (Vec<Statement>, Vec<LuaLibFeature>) {
        let mut context = LoweringContext::new(table);
        context.push_scope(ScopeKind::File);
        let statements = lower_class_declaration(&mut context, class).unwrap();
        (statements, context.used_features().collect())
    }

    #[test]
    fn base_class_gets_table_constructor_and_methods() {
        let mut builder = AstBuilder::new();
        let mut table = ResolutionTable::new();
        let name = declared(&mut builder, &mut table, "Point");
        let this = builder.this();
        let access = builder.property_access(this, "x");
        let ret = builder.ret(Some(access));
        let function = ast::FunctionExpression {
            parameters: Vec::new(),
            body: ast::Block::new(vec![ret]),
            is_async: false,
        };
        let method = builder.class_member(MemberKind::Method {
            name: "getX".to_string(),
            function,
            is_static: false,
        });
        let class = builder.class(name, None, vec![method]);

        let (statements, features) = lower(&table, &class);
        assert_eq!(
            rendered(&statements),
            "local Point = __LL_Class(\"Point\")\nPoint.prototype.____constructor = function(self)\nend\nPoint.prototype.getX = function(self)\n    return self.x\nend\n"
        );
        assert_eq!(features, vec![LuaLibFeature::Class]);
    }

    #[test]
    fn derived_class_without_fields_emits_no_constructor() {
        let mut builder = AstBuilder::new();
        let mut table = ResolutionTable::new();
        let name = declared(&mut builder, &mut table, "Cat");
        let base_name = declared(&mut builder, &mut table, "Animal");
        let base = builder.reference("Animal");
        table.bind(base.id, table.resolve_symbol(base_name.id).unwrap());
        let class = builder.class(name, Some(base), Vec::new());

        let (statements, _) = lower(&table, &class);
        assert_eq!(
            rendered(&statements),
            "local Cat = __LL_Class(\"Cat\")\n__LL_ClassExtends(Cat, Animal)\n"
        );
    }

    #[test]
    fn field_initializers_forward_to_the_base_constructor() {
        let mut builder = AstBuilder::new();
        let mut table = ResolutionTable::new();
        let name = declared(&mut builder, &mut table, "Cat");
        let base_name = declared(&mut builder, &mut table, "Animal");
        let base = builder.reference("Animal");
        table.bind(base.id, table.resolve_symbol(base_name.id).unwrap());
        let nine = builder.number(9.0);
        let field = builder.class_member(MemberKind::Property {
            name: "lives".to_string(),
            initializer: Some(nine),
            is_static: false,
        });
        let class = builder.class(name, Some(base), vec![field]);

        let (statements, _) = lower(&table, &class);
        assert_eq!(
            rendered(&statements),
            "local Cat = __LL_Class(\"Cat\")\n__LL_ClassExtends(Cat, Animal)\nCat.prototype.____constructor = function(self, ...)\n    Animal.prototype.____constructor(self, ...)\n    self.lives = 9\nend\n"
        );
    }

    #[test]
    fn explicit_constructor_runs_initializers_after_the_base_call() {
        let mut builder = AstBuilder::new();
        let mut table = ResolutionTable::new();
        let name = declared(&mut builder, &mut table, "Cat");
        let base_name = declared(&mut builder, &mut table, "Animal");
        let base = builder.reference("Animal");
        table.bind(base.id, table.resolve_symbol(base_name.id).unwrap());

        let parameter = declared(&mut builder, &mut table, "n");
        let parameter_symbol = table.resolve_symbol(parameter.id).unwrap();
        let super_keyword = builder.superclass();
        let forwarded = builder.reference("n");
        table.bind(forwarded.id, parameter_symbol);
        let super_call = builder.call(super_keyword, vec![forwarded]);
        let super_statement = builder.expression_statement(super_call);
        let this = builder.this();
        let target = builder.property_access(this, "name");
        let assigned = builder.reference("n");
        table.bind(assigned.id, parameter_symbol);
        let assignment = builder.assignment(target, assigned);

        let nine = builder.number(9.0);
        let field = builder.class_member(MemberKind::Property {
            name: "lives".to_string(),
            initializer: Some(nine),
            is_static: false,
        });
        let constructor = builder.class_member(MemberKind::Constructor {
            parameters: vec![ast::Parameter::new(parameter)],
            body: Some(ast::Block::new(vec![super_statement, assignment])),
        });
        let class = builder.class(name, Some(base), vec![field, constructor]);

        let (statements, _) = lower(&table, &class);
        assert_eq!(
            rendered(&statements),
            "local Cat = __LL_Class(\"Cat\")\n__LL_ClassExtends(Cat, Animal)\nCat.prototype.____constructor = function(self, n)\n    Animal.prototype.____constructor(self, n)\n    self.lives = 9\n    self.name = n\nend\n"
        );
    }

    #[test]
    fn exported_base_routes_super_through_the_back_link() {
        let mut builder = AstBuilder::new();
        let mut table = ResolutionTable::new();
        let name = declared(&mut builder, &mut table, "Cat");
        let base_name = declared(&mut builder, &mut table, "Base");
        let base_symbol = table.resolve_symbol(base_name.id).unwrap();
        table.mark_exported(base_symbol);
        let base = builder.reference("Base");
        table.bind(base.id, base_symbol);
        let nine = builder.number(9.0);
        let field = builder.class_member(MemberKind::Property {
            name: "lives".to_string(),
            initializer: Some(nine),
            is_static: false,
        });
        let class = builder.class(name, Some(base), vec![field]);

        let (statements, _) = lower(&table, &class);
        assert_eq!(
            rendered(&statements),
            "local Cat = __LL_Class(\"Cat\")\n__LL_ClassExtends(Cat, Base)\nCat.prototype.____constructor = function(self, ...)\n    Cat.____super.prototype.____constructor(self, ...)\n    self.lives = 9\nend\n"
        );
    }

    #[test]
    fn static_members_attach_to_the_class_table() {
        let mut builder = AstBuilder::new();
        let mut table = ResolutionTable::new();
        let name = declared(&mut builder, &mut table, "Counter");
        let zero = builder.number(0.0);
        let count = builder.class_member(MemberKind::Property {
            name: "count".to_string(),
            initializer: Some(zero),
            is_static: true,
        });
        let reset = builder.class_member(MemberKind::Method {
            name: "reset".to_string(),
            function: ast::FunctionExpression {
                parameters: Vec::new(),
                body: ast::Block::default(),
                is_async: false,
            },
            is_static: true,
        });
        let class = builder.class(name, None, vec![count, reset]);

        let (statements, _) = lower(&table, &class);
        assert_eq!(
            rendered(&statements),
            "local Counter = __LL_Class(\"Counter\")\nCounter.prototype.____constructor = function(self)\nend\nCounter.count = 0\nCounter.reset = function(self)\nend\n"
        );
    }

    #[test]
    fn accessor_pair_emits_one_descriptor() {
        let mut builder = AstBuilder::new();
        let mut table = ResolutionTable::new();
        let name = declared(&mut builder, &mut table, "Temp");
        let this = builder.this();
        let read = builder.property_access(this, "v");
        let getter_return = builder.ret(Some(read));
        let getter = builder.class_member(MemberKind::Getter {
            name: "value".to_string(),
            body: ast::Block::new(vec![getter_return]),
            is_static: false,
        });
        let setter_parameter = declared(&mut builder, &mut table, "x");
        let setter_symbol = table.resolve_symbol(setter_parameter.id).unwrap();
        let this = builder.this();
        let target = builder.property_access(this, "v");
        let written = builder.reference("x");
        table.bind(written.id, setter_symbol);
        let setter_body = builder.assignment(target, written);
        let setter = builder.class_member(MemberKind::Setter {
            name: "value".to_string(),
            parameter: setter_parameter,
            body: ast::Block::new(vec![setter_body]),
            is_static: false,
        });
        let class = builder.class(name, None, vec![getter, setter]);

        let (statements, features) = lower(&table, &class);
        assert_eq!(
            rendered(&statements),
            "local Temp = __LL_Class(\"Temp\")\nTemp.prototype.____constructor = function(self)\nend\n__LL_SetDescriptor(Temp.prototype, \"value\", {get = function(self)\n    return self.v\nend, set = function(self, x)\n    self.v = x\nend}, false)\n"
        );
        assert_eq!(
            features,
            vec![LuaLibFeature::Class, LuaLibFeature::Descriptors]
        );
    }

    #[test]
    fn decorators_apply_members_first_then_the_class() {
        let mut builder = AstBuilder::new();
        let mut table = ResolutionTable::new();
        let name = declared(&mut builder, &mut table, "Service");
        let mut run = builder.class_member(MemberKind::Method {
            name: "run".to_string(),
            function: ast::FunctionExpression {
                parameters: Vec::new(),
                body: ast::Block::default(),
                is_async: false,
            },
            is_static: false,
        });
        run.decorators.push(builder.reference("log"));
        let mut class = builder.class(name, None, vec![run]);
        class.decorators.push(builder.reference("register"));

        let (statements, _) = lower(&table, &class);
        assert_eq!(
            rendered(&statements),
            "local Service = __LL_Class(\"Service\")\nService.prototype.____constructor = function(self)\nend\nService.prototype.run = function(self)\nend\nService.prototype.run = log(Service.prototype.run)\nService = register(Service)\n"
        );
    }

    #[test]
    fn class_expression_builds_inside_a_closure() {
        let mut builder = AstBuilder::new();
        let table = ResolutionTable::new();
        let class = ast::ClassDeclaration {
            name: None,
            extends: None,
            members: Vec::new(),
            decorators: Vec::new(),
            id: builder.fresh_id(),
            pos: builder.fresh_pos(),
        };
        let expression = builder.class_expression(class);

        let mut context = LoweringContext::new(&table);
        context.push_scope(ScopeKind::File);
        let lowered = match &expression.kind {
            ExpressionKind::Class(class) => {
                lower_class_expression(&mut context, class).unwrap()
            }
            _ => unreachable!(),
        };
        assert_eq!(
            lualower_core::format_expression(&lowered),
            "(function()\n    local ____temp_0 = __LL_Class(\"____temp_0\")\n    ____temp_0.prototype.____constructor = function(self)\nend\n    return ____temp_0\nend)()"
        );
    }
}
