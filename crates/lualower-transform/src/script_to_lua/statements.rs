/*! Statement lowering.
 *
 * Switch statements become a `repeat ... until true` region with an
 * accumulated condition variable, so `break` leaves the switch and case
 * fallthrough keeps working. Try statements run their body inside a `pcall`
 * closure; returns are tagged with a leading `true` so the caller can tell a
 * completed body from one that fell off the end. An expression statement whose
 * expression is not a call is bound to a throwaway local, since Lua has no
 * bare expression statements.
 */

use super::classes::lower_class_declaration;
use super::context::LoweringContext;
use super::enums::lower_enum_declaration;
use super::errors::TransformError;
use super::expressions::lower_expression;
use super::functions::lower_function_declaration;
use super::scope::{hoist_switch_declarations, perform_hoisting, ScopeKind};
use super::variables::lower_variable_declaration;
use lualower_ast::{self as ast, Diagnostic};
use lualower_core::{
    BinaryOperator, Block, Expression, FunctionExpression, Identifier, Pos, Statement,
    StatementKind, UnaryOperator,
};

pub fn lower_statement_list(
    context: &mut LoweringContext,
    statements: &[ast::Statement],
) -> Result<Vec<Statement>, TransformError> {
    // Announce local functions up front so a reference ahead of the definition
    // is visible to the vararg forwarding check.
    for statement in statements {
        if let ast::StatementKind::FunctionDeclaration { name, .. } = &statement.kind {
            if let Some(symbol) = context.resolver.resolve_symbol(name.id) {
                context.current_scope_mut()?.register_local_function(symbol);
            }
        }
    }

    let mut lowered = Vec::new();
    for statement in statements {
        context.push_preceding_statements();
        let result = lower_statement(context, statement);
        let preceding = context.pop_preceding_statements();
        lowered.extend(preceding);
        lowered.extend(result?);
    }
    Ok(lowered)
}

fn lower_statement(
    context: &mut LoweringContext,
    statement: &ast::Statement,
) -> Result<Vec<Statement>, TransformError> {
    let pos = statement.pos;
    let lowered = match &statement.kind {
        ast::StatementKind::VariableDeclaration(declaration) => {
            lower_variable_declaration(context, declaration, pos)?
        }
        ast::StatementKind::FunctionDeclaration { name, function } => {
            vec![lower_function_declaration(context, name, function, pos)?]
        }
        ast::StatementKind::ClassDeclaration(class) => lower_class_declaration(context, class)?,
        ast::StatementKind::EnumDeclaration(declaration) => {
            lower_enum_declaration(context, declaration)?
        }
        ast::StatementKind::Import { name, module } => lower_import(context, name, module, pos)?,
        ast::StatementKind::Expression(expression) => {
            let lowered = lower_expression(context, expression)?;
            if lowered.is_call() {
                vec![Statement::expression(lowered).at(pos)]
            } else {
                vec![Statement::variable_declaration(
                    vec![Identifier::new("____")],
                    Some(vec![lowered]),
                )
                .at(pos)]
            }
        }
        ast::StatementKind::Assignment { target, value } => {
            require_assignable(target)?;
            let left = lower_expression(context, target)?;
            let right = lower_expression(context, value)?;
            vec![Statement::assignment(vec![left], vec![right]).at(pos)]
        }
        ast::StatementKind::If {
            condition,
            then_branch,
            else_branch,
        } => {
            let condition = lower_expression(context, condition)?;
            let then_block = lower_block_scoped(context, then_branch, ScopeKind::Conditional)?;
            let else_block = match else_branch {
                Some(branch) => Some(lower_block_scoped(context, branch, ScopeKind::Conditional)?),
                None => None,
            };
            vec![Statement::if_then(condition, then_block, else_block).at(pos)]
        }
        ast::StatementKind::While { condition, body } => {
            let condition = lower_expression(context, condition)?;
            let body = lower_block_scoped(context, body, ScopeKind::Loop)?;
            vec![Statement::new(StatementKind::While { condition, body }).at(pos)]
        }
        ast::StatementKind::Switch {
            expression,
            clauses,
        } => lower_switch(context, expression, clauses, pos)?,
        ast::StatementKind::Try { body, catch } => lower_try(context, body, catch, pos)?,
        ast::StatementKind::Throw(expression) => {
            let lowered = lower_expression(context, expression)?;
            vec![
                Statement::expression(Expression::call(Expression::name("error"), vec![lowered]))
                    .at(pos),
            ]
        }
        ast::StatementKind::Return(expression) => {
            let values = match expression {
                Some(expression) => vec![lower_expression(context, expression)?],
                None => Vec::new(),
            };
            vec![Statement::ret(values).at(pos)]
        }
        ast::StatementKind::Break => vec![Statement::new(StatementKind::Break).at(pos)],
        ast::StatementKind::Block(block) => {
            let body = lower_block_scoped(context, block, ScopeKind::Block)?;
            vec![Statement::new(StatementKind::Do(body)).at(pos)]
        }
    };
    Ok(lowered)
}

fn lower_block_scoped(
    context: &mut LoweringContext,
    block: &ast::Block,
    kind: ScopeKind,
) -> Result<Block, TransformError> {
    context.push_scope(kind);
    let lowered = lower_statement_list(context, &block.statements);
    let scope = context.pop_scope()?;
    let lowered = lowered?;
    Ok(Block::new(perform_hoisting(
        context.resolver,
        &scope,
        lowered,
    )))
}

fn lower_import(
    context: &mut LoweringContext,
    name: &ast::Identifier,
    module: &str,
    pos: Pos,
) -> Result<Vec<Statement>, TransformError> {
    let identifier = match context.resolver.resolve_symbol(name.id) {
        Some(symbol) => Identifier::with_symbol(name.text.clone(), symbol),
        None => Identifier::new(name.text.clone()),
    }
    .at(name.pos);
    let statement = Statement::variable_declaration(
        vec![identifier],
        Some(vec![Expression::call(
            Expression::name("require"),
            vec![Expression::string(module)],
        )]),
    )
    .at(pos);
    context
        .current_scope_mut()?
        .record_import(statement.clone());
    Ok(vec![statement])
}

fn require_assignable(target: &ast::Expression) -> Result<(), TransformError> {
    match &target.kind {
        ast::ExpressionKind::Identifier(_)
        | ast::ExpressionKind::PropertyAccess { .. }
        | ast::ExpressionKind::ElementAccess { .. } => Ok(()),
        ast::ExpressionKind::Call { .. } => Err(TransformError::InvalidAssignmentTarget(
            "call result".into(),
        )),
        ast::ExpressionKind::New { .. } => Err(TransformError::InvalidAssignmentTarget(
            "constructor result".into(),
        )),
        _ => Err(TransformError::InvalidAssignmentTarget("expression".into())),
    }
}

fn lower_switch(
    context: &mut LoweringContext,
    expression: &ast::Expression,
    clauses: &[ast::SwitchClause],
    pos: Pos,
) -> Result<Vec<Statement>, TransformError> {
    let discriminant = lower_expression(context, expression)?;

    let id = context.push_scope(ScopeKind::Switch);
    let result = lower_switch_clauses(context, clauses);
    let scope = context.pop_scope()?;
    let (tests, mut blocks) = result?;

    let hoisted = hoist_switch_declarations(&scope, &mut blocks);

    let switch_name = format!("____switch{id}");
    let condition_name = format!("____cond{id}");

    let mut body = vec![Statement::variable_declaration(
        vec![Identifier::new(switch_name.clone())],
        Some(vec![discriminant]),
    )];
    if !hoisted.is_empty() {
        body.push(Statement::variable_declaration(hoisted, None));
    }

    let mut default_body: Option<Block> = None;
    let mut condition_declared = false;
    for (test, block) in tests.into_iter().zip(blocks) {
        let test = match test {
            Some(test) => test,
            None => {
                default_body = Some(block);
                continue;
            }
        };
        let comparison = Expression::binary(
            BinaryOperator::Equal,
            Expression::name(switch_name.clone()),
            test,
        );
        if condition_declared {
            body.push(Statement::assignment(
                vec![Expression::name(condition_name.clone())],
                vec![Expression::binary(
                    BinaryOperator::Or,
                    Expression::name(condition_name.clone()),
                    comparison,
                )],
            ));
        } else {
            body.push(Statement::variable_declaration(
                vec![Identifier::new(condition_name.clone())],
                Some(vec![comparison]),
            ));
            condition_declared = true;
        }
        body.push(Statement::if_then(
            Expression::name(condition_name.clone()),
            block,
            None,
        ));
    }
    if let Some(block) = default_body {
        body.extend(block.statements);
    }

    Ok(vec![
        Statement::repeat_until(Block::new(body), Expression::Boolean(true)).at(pos),
    ])
}

#[allow(clippy::type_complexity)]
fn lower_switch_clauses(
    context: &mut LoweringContext,
    clauses: &[ast::SwitchClause],
) -> Result<(Vec<Option<Expression>>, Vec<Block>), TransformError> {
    let mut tests = Vec::new();
    let mut blocks = Vec::new();
    for (index, clause) in clauses.iter().enumerate() {
        if clause.test.is_none() && index + 1 != clauses.len() {
            // The default body is emitted after every case, so anything that
            // would fall through into the clauses after it is lost.
            context.add_diagnostic(Diagnostic::non_final_default_clause(clause.pos));
        }
        let test = clause
            .test
            .as_ref()
            .map(|test| lower_expression(context, test))
            .transpose()?;
        let body = lower_statement_list(context, &clause.statements)?;
        tests.push(test);
        blocks.push(Block::new(body));
    }
    Ok((tests, blocks))
}

fn lower_try(
    context: &mut LoweringContext,
    body: &ast::Block,
    catch: &Option<ast::CatchClause>,
    pos: Pos,
) -> Result<Vec<Statement>, TransformError> {
    let mut try_block = lower_block_scoped(context, body, ScopeKind::Try)?;
    let mut has_returns = rewrite_returns(&mut try_block);

    let mut result = Vec::new();
    if let Some(clause) = catch {
        let mut catch_block = lower_block_scoped(context, &clause.body, ScopeKind::Catch)?;
        has_returns |= rewrite_returns(&mut catch_block);
        let params = clause
            .parameter
            .as_ref()
            .map(|name| match context.resolver.resolve_symbol(name.id) {
                Some(symbol) => Identifier::with_symbol(name.text.clone(), symbol).at(name.pos),
                None => Identifier::new(name.text.clone()).at(name.pos),
            })
            .into_iter()
            .collect();
        result.push(Statement::local_function(
            Identifier::new("____catch"),
            FunctionExpression::new(params, false, catch_block),
        ));
    }

    let mut names = vec![
        Identifier::new("____success"),
        Identifier::new("____returned"),
    ];
    if has_returns {
        names.push(Identifier::new("____value"));
    }
    result.push(
        Statement::variable_declaration(
            names,
            Some(vec![Expression::call(
                Expression::name("pcall"),
                vec![Expression::Function(FunctionExpression::new(
                    Vec::new(),
                    false,
                    try_block,
                ))],
            )]),
        )
        .at(pos),
    );

    // On failure the second pcall result carries the raised value.
    let on_failure = match catch {
        Some(_) if has_returns => Statement::assignment(
            vec![
                Expression::name("____returned"),
                Expression::name("____value"),
            ],
            vec![Expression::call(
                Expression::name("____catch"),
                vec![Expression::name("____returned")],
            )],
        ),
        Some(_) => Statement::expression(Expression::call(
            Expression::name("____catch"),
            vec![Expression::name("____returned")],
        )),
        None => Statement::expression(Expression::call(
            Expression::name("error"),
            vec![Expression::name("____returned"), Expression::number(0.0)],
        )),
    };
    result.push(Statement::if_then(
        Expression::Unary {
            op: UnaryOperator::Not,
            operand: Box::new(Expression::name("____success")),
        },
        Block::new(vec![on_failure]),
        None,
    ));

    if has_returns {
        result.push(Statement::if_then(
            Expression::name("____returned"),
            Block::new(vec![Statement::ret(vec![Expression::name("____value")])]),
            None,
        ));
    }

    Ok(result)
}

/// Rewrites `return e` into `return true, e` so the value survives the pcall
/// boundary. Recurses into nested blocks but never into function expressions,
/// whose returns belong to themselves.
fn rewrite_returns(block: &mut Block) -> bool {
    let mut rewritten = false;
    for statement in &mut block.statements {
        match &mut statement.kind {
            StatementKind::Return(expressions) => {
                expressions.insert(0, Expression::Boolean(true));
                rewritten = true;
            }
            StatementKind::If {
                then_block,
                else_block,
                ..
            } => {
                rewritten |= rewrite_returns(then_block);
                if let Some(else_block) = else_block {
                    rewritten |= rewrite_returns(else_block);
                }
            }
            StatementKind::While { body, .. } | StatementKind::Repeat { body, .. } => {
                rewritten |= rewrite_returns(body);
            }
            StatementKind::Do(body) => {
                rewritten |= rewrite_returns(body);
            }
            _ => {}
        }
    }
    rewritten
}
