/*! Enum lowering.
 *
 * An enum becomes a table populated member by member, with a reverse entry
 * mapping each numeric value back to its name. Const enums are inlined at
 * their use sites and emit no table unless the lowering is configured to
 * preserve them. Documentation comments survive as Lua comments on the table
 * and its entries.
 */

use super::context::LoweringContext;
use super::errors::TransformError;
use super::expressions::lower_expression;
use lualower_ast::{self as ast, EnumMemberValue};
use lualower_core::{Expression, Identifier, Statement};

pub fn lower_enum_declaration(
    context: &mut LoweringContext,
    declaration: &ast::EnumDeclaration,
) -> Result<Vec<Statement>, TransformError> {
    if declaration.is_const && !context.options.preserve_const_enums {
        tracing::trace!(name = %declaration.name.text, "const enum elided");
        return Ok(Vec::new());
    }

    let symbol = context
        .resolver
        .resolve_symbol(declaration.name.id)
        .ok_or_else(|| TransformError::MissingResolution(declaration.name.text.clone()))?;
    let name =
        Identifier::with_symbol(declaration.name.text.clone(), symbol).at(declaration.name.pos);

    let table = Statement::variable_declaration(
        vec![name.clone()],
        Some(vec![Expression::Table(Vec::new())]),
    )
    .at(declaration.pos)
    .with_comments(clean_doc_comment(&declaration.doc_comment));
    context
        .current_scope_mut()?
        .record_variable_declaration(table.clone());

    let mut statements = vec![table];
    let mut seen_members: Vec<String> = Vec::new();
    let mut next_value = 0.0;

    for member in &declaration.members {
        let value = member_value(context, &name, member, &seen_members, next_value)?;
        let is_numeric = matches!(value, Expression::Number(_));
        if let Expression::Number(number) = &value {
            next_value = number + 1.0;
        }

        statements.push(
            Statement::assignment(
                vec![Expression::property(
                    name.clone().expression(),
                    member.name.text.clone(),
                )],
                vec![value],
            )
            .at(member.pos)
            .with_comments(clean_doc_comment(&member.doc_comment)),
        );

        if is_numeric {
            statements.push(
                Statement::assignment(
                    vec![Expression::index(
                        name.clone().expression(),
                        Expression::property(name.clone().expression(), member.name.text.clone()),
                    )],
                    vec![Expression::string(member.name.text.clone())],
                )
                .at(member.pos),
            );
        }

        seen_members.push(member.name.text.clone());
    }

    Ok(statements)
}

/// Picks the member's value: the checker's computed value when it has one,
/// then a sibling reference or the lowered initializer, then the running
/// auto-increment counter.
fn member_value(
    context: &mut LoweringContext,
    enum_name: &Identifier,
    member: &ast::EnumMember,
    seen_members: &[String],
    next_value: f64,
) -> Result<Expression, TransformError> {
    if let Some(value) = context.resolver.enum_member_value(member.name.id) {
        return Ok(match value {
            EnumMemberValue::Number(number) => Expression::number(number),
            EnumMemberValue::String(text) => Expression::string(text),
        });
    }

    if let Some(initializer) = &member.initializer {
        if let Some(text) = initializer.as_identifier_text() {
            if seen_members.iter().any(|seen| seen == text) {
                return Ok(Expression::property(enum_name.clone().expression(), text));
            }
        }
        return lower_expression(context, initializer);
    }

    Ok(Expression::number(next_value))
}

/// Strips documentation comment markers so the text reads as a plain Lua
/// comment. Lines that carried nothing but markers are dropped.
fn clean_doc_comment(lines: &[String]) -> Vec<String> {
    let mut cleaned = Vec::new();
    for line in lines {
        let mut text = line.trim();
        if let Some(stripped) = text.strip_prefix("/**") {
            text = stripped;
        }
        if let Some(stripped) = text.strip_suffix("*/") {
            text = stripped;
        }
        text = text.trim();
        if let Some(stripped) = text.strip_prefix("///") {
            text = stripped;
        } else if let Some(stripped) = text.strip_prefix("//") {
            text = stripped;
        } else if let Some(stripped) = text.strip_prefix('*') {
            text = stripped;
        }
        let text = text.trim();
        if !text.is_empty() {
            cleaned.push(text.to_string());
        }
    }
    cleaned
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::context::LoweringOptions;
    use super::super::scope::ScopeKind;
    use lualower_ast::{AstBuilder, EnumDeclaration, ResolutionTable};
    use lualower_core::format_statement;
    use pretty_assertions::assert_eq;

    fn declared(builder: &mut AstBuilder, table: &mut ResolutionTable, text: &str) -> ast::Identifier {
        let name = builder.identifier(text);
        let symbol = table.allocate_symbol();
        table.declare(name.id, symbol, name.pos);
        name
    }

    fn rendered(statements: &[Statement]) -> String {
        statements.iter().map(format_statement).collect()
    }

    fn lower(table: &ResolutionTable, statement: &ast::Statement) -> Vec<Statement> {
        let mut context = LoweringContext::new(table);
        context.push_scope(ScopeKind::File);
        match &statement.kind {
            ast::StatementKind::EnumDeclaration(declaration) => {
                lower_enum_declaration(&mut context, declaration).unwrap()
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn members_auto_increment_and_reverse_map() {
        let mut builder = AstBuilder::new();
        let mut table = ResolutionTable::new();
        let name = declared(&mut builder, &mut table, "Direction");
        let up = builder.identifier("Up");
        let down = builder.identifier("Down");
        let members = vec![builder.enum_member(up, None), builder.enum_member(down, None)];
        let statement = builder.enum_declaration(name, members);

        assert_eq!(
            rendered(&lower(&table, &statement)),
            "local Direction = {}\nDirection.Up = 0\nDirection[Direction.Up] = \"Up\"\nDirection.Down = 1\nDirection[Direction.Down] = \"Down\"\n"
        );
    }

    #[test]
    fn string_members_skip_the_reverse_mapping() {
        let mut builder = AstBuilder::new();
        let mut table = ResolutionTable::new();
        let name = declared(&mut builder, &mut table, "Color");
        let red = builder.identifier("Red");
        let value = builder.string("red");
        let members = vec![builder.enum_member(red, Some(value))];
        let statement = builder.enum_declaration(name, members);

        assert_eq!(
            rendered(&lower(&table, &statement)),
            "local Color = {}\nColor.Red = \"red\"\n"
        );
    }

    #[test]
    fn checker_values_override_the_counter() {
        let mut builder = AstBuilder::new();
        let mut table = ResolutionTable::new();
        let name = declared(&mut builder, &mut table, "Direction");
        let up = builder.identifier("Up");
        table.set_enum_member_value(up.id, EnumMemberValue::Number(5.0));
        let down = builder.identifier("Down");
        let members = vec![builder.enum_member(up, None), builder.enum_member(down, None)];
        let statement = builder.enum_declaration(name, members);

        assert_eq!(
            rendered(&lower(&table, &statement)),
            "local Direction = {}\nDirection.Up = 5\nDirection[Direction.Up] = \"Up\"\nDirection.Down = 6\nDirection[Direction.Down] = \"Down\"\n"
        );
    }

    #[test]
    fn sibling_initializers_reference_the_table() {
        let mut builder = AstBuilder::new();
        let mut table = ResolutionTable::new();
        let name = declared(&mut builder, &mut table, "Alias");
        let first = builder.identifier("A");
        let second = builder.identifier("B");
        let sibling = builder.reference("A");
        let members = vec![
            builder.enum_member(first, None),
            builder.enum_member(second, Some(sibling)),
        ];
        let statement = builder.enum_declaration(name, members);

        assert_eq!(
            rendered(&lower(&table, &statement)),
            "local Alias = {}\nAlias.A = 0\nAlias[Alias.A] = \"A\"\nAlias.B = Alias.A\n"
        );
    }

    #[test]
    fn const_enums_emit_nothing_by_default() {
        let mut builder = AstBuilder::new();
        let mut table = ResolutionTable::new();
        let name = declared(&mut builder, &mut table, "Flags");
        let on = builder.identifier("On");
        let members = vec![builder.enum_member(on, None)];
        let declaration = EnumDeclaration {
            name,
            is_const: true,
            members,
            doc_comment: Vec::new(),
            pos: builder.fresh_pos(),
        };

        let mut context = LoweringContext::new(&table);
        context.push_scope(ScopeKind::File);
        assert_eq!(
            lower_enum_declaration(&mut context, &declaration).unwrap(),
            Vec::new()
        );

        let mut context = LoweringContext::with_options(
            &table,
            LoweringOptions {
                preserve_const_enums: true,
            },
        );
        context.push_scope(ScopeKind::File);
        let statements = lower_enum_declaration(&mut context, &declaration).unwrap();
        assert_eq!(
            rendered(&statements),
            "local Flags = {}\nFlags.On = 0\nFlags[Flags.On] = \"On\"\n"
        );
    }

    #[test]
    fn documentation_comments_survive_as_lua_comments() {
        let mut builder = AstBuilder::new();
        let mut table = ResolutionTable::new();
        let name = declared(&mut builder, &mut table, "Direction");
        let up = builder.identifier("Up");
        let mut member = builder.enum_member(up, None);
        member.doc_comment = vec!["/** Toward the top. */".to_string()];
        let declaration = EnumDeclaration {
            name,
            is_const: false,
            members: vec![member],
            doc_comment: vec![
                "/**".to_string(),
                " * Cardinal directions.".to_string(),
                " */".to_string(),
            ],
            pos: builder.fresh_pos(),
        };

        let mut context = LoweringContext::new(&table);
        context.push_scope(ScopeKind::File);
        let statements = lower_enum_declaration(&mut context, &declaration).unwrap();
        assert_eq!(
            rendered(&statements),
            "-- Cardinal directions.\nlocal Direction = {}\n-- Toward the top.\nDirection.Up = 0\nDirection[Direction.Up] = \"Up\"\n"
        );
    }
}
