use crate::ast::{
    BinaryOperator, Block, Expression, FunctionExpression, Statement, StatementKind, TableField,
    UnaryOperator,
};
use std::fmt::Write;

const INDENT: &str = "    ";

pub fn format_block(block: &Block) -> String {
    let mut output = String::new();
    for statement in &block.statements {
        write!(&mut output, "{}", format_statement_indented(statement, 0)).unwrap();
    }
    output
}

pub fn format_statement(statement: &Statement) -> String {
    format_statement_indented(statement, 0)
}

fn format_statement_indented(statement: &Statement, depth: usize) -> String {
    let mut output = String::new();
    let pad = INDENT.repeat(depth);

    for comment in &statement.leading_comments {
        if comment.is_empty() {
            writeln!(&mut output, "{}--", pad).unwrap();
        } else {
            writeln!(&mut output, "{}-- {}", pad, comment).unwrap();
        }
    }

    match &statement.kind {
        StatementKind::VariableDeclaration { left, right } => {
            let names = left
                .iter()
                .map(|id| id.text.clone())
                .collect::<Vec<_>>()
                .join(", ");
            match right {
                Some(expressions) => {
                    let values = format_expression_list(expressions);
                    writeln!(&mut output, "{}local {} = {}", pad, names, values).unwrap();
                }
                None => {
                    writeln!(&mut output, "{}local {}", pad, names).unwrap();
                }
            }
        }
        StatementKind::Assignment { left, right } => {
            let targets = format_expression_list(left);
            let values = format_expression_list(right);
            writeln!(&mut output, "{}{} = {}", pad, targets, values).unwrap();
        }
        StatementKind::Expression(expression) => {
            writeln!(&mut output, "{}{}", pad, format_expression(expression)).unwrap();
        }
        StatementKind::If {
            condition,
            then_block,
            else_block,
        } => {
            writeln!(
                &mut output,
                "{}if {} then",
                pad,
                format_expression(condition)
            )
            .unwrap();
            write!(&mut output, "{}", format_block_indented(then_block, depth + 1)).unwrap();
            if let Some(else_block) = else_block {
                writeln!(&mut output, "{}else", pad).unwrap();
                write!(&mut output, "{}", format_block_indented(else_block, depth + 1)).unwrap();
            }
            writeln!(&mut output, "{}end", pad).unwrap();
        }
        StatementKind::While { condition, body } => {
            writeln!(
                &mut output,
                "{}while {} do",
                pad,
                format_expression(condition)
            )
            .unwrap();
            write!(&mut output, "{}", format_block_indented(body, depth + 1)).unwrap();
            writeln!(&mut output, "{}end", pad).unwrap();
        }
        StatementKind::Repeat { body, condition } => {
            writeln!(&mut output, "{}repeat", pad).unwrap();
            write!(&mut output, "{}", format_block_indented(body, depth + 1)).unwrap();
            writeln!(&mut output, "{}until {}", pad, format_expression(condition)).unwrap();
        }
        StatementKind::Do(body) => {
            writeln!(&mut output, "{}do", pad).unwrap();
            write!(&mut output, "{}", format_block_indented(body, depth + 1)).unwrap();
            writeln!(&mut output, "{}end", pad).unwrap();
        }
        StatementKind::LocalFunction { name, function } => {
            writeln!(
                &mut output,
                "{}local function {}({})",
                pad,
                name.text,
                format_parameter_list(function)
            )
            .unwrap();
            write!(
                &mut output,
                "{}",
                format_block_indented(&function.body, depth + 1)
            )
            .unwrap();
            writeln!(&mut output, "{}end", pad).unwrap();
        }
        StatementKind::Return(expressions) => {
            if expressions.is_empty() {
                writeln!(&mut output, "{}return", pad).unwrap();
            } else {
                let values = format_expression_list(expressions);
                writeln!(&mut output, "{}return {}", pad, values).unwrap();
            }
        }
        StatementKind::Break => {
            writeln!(&mut output, "{}break", pad).unwrap();
        }
    }

    output
}

fn format_block_indented(block: &Block, depth: usize) -> String {
    let mut output = String::new();
    for statement in &block.statements {
        write!(
            &mut output,
            "{}",
            format_statement_indented(statement, depth)
        )
        .unwrap();
    }
    output
}

fn format_expression_list(expressions: &[Expression]) -> String {
    expressions
        .iter()
        .map(format_expression)
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn format_expression(expression: &Expression) -> String {
    match expression {
        Expression::Nil => "nil".to_string(),
        Expression::Dots => "...".to_string(),
        Expression::Boolean(value) => value.to_string(),
        Expression::Number(value) => format_number(*value),
        Expression::String(text) => format!("\"{}\"", escape_string(text)),
        Expression::Identifier(identifier) => identifier.text.clone(),
        Expression::Table(fields) => format_table(fields),
        Expression::Index { table, key } => {
            let base = format_prefix(table);
            match key.as_ref() {
                Expression::String(name) if is_valid_lua_name(name) => {
                    format!("{}.{}", base, name)
                }
                _ => format!("{}[{}]", base, format_expression(key)),
            }
        }
        Expression::Call { function, args } => {
            format!(
                "{}({})",
                format_prefix(function),
                format_expression_list(args)
            )
        }
        Expression::MethodCall { object, name, args } => {
            format!(
                "{}:{}({})",
                format_prefix(object),
                name,
                format_expression_list(args)
            )
        }
        Expression::Function(function) => format_function(function),
        Expression::Binary { op, left, right } => format_binary(*op, left, right),
        Expression::Unary { op, operand } => {
            let text = format_operand(operand, unary_precedence(), false);
            match op {
                UnaryOperator::Negate => format!("-{}", text),
                UnaryOperator::Not => format!("not {}", text),
                UnaryOperator::Length => format!("#{}", text),
            }
        }
    }
}

/// Lua only allows names, index chains, calls and parenthesized expressions in
/// call or index position; everything else must be wrapped.
fn format_prefix(expression: &Expression) -> String {
    match expression {
        Expression::Identifier(_)
        | Expression::Index { .. }
        | Expression::Call { .. }
        | Expression::MethodCall { .. } => format_expression(expression),
        _ => format!("({})", format_expression(expression)),
    }
}

fn format_parameter_list(function: &FunctionExpression) -> String {
    let mut params = function
        .params
        .iter()
        .map(|id| id.text.clone())
        .collect::<Vec<_>>();
    if function.has_dots {
        params.push("...".to_string());
    }
    params.join(", ")
}

fn format_function(function: &FunctionExpression) -> String {
    let mut output = String::new();

    writeln!(&mut output, "function({})", format_parameter_list(function)).unwrap();
    write!(&mut output, "{}", format_block_indented(&function.body, 1)).unwrap();
    write!(&mut output, "end").unwrap();

    output
}

fn format_table(fields: &[TableField]) -> String {
    if fields.is_empty() {
        return "{}".to_string();
    }

    let rendered = fields
        .iter()
        .map(|field| match field {
            TableField::Value(value) => format_expression(value),
            TableField::KeyValue { key, value } => match key {
                Expression::String(name) if is_valid_lua_name(name) => {
                    format!("{} = {}", name, format_expression(value))
                }
                _ => format!("[{}] = {}", format_expression(key), format_expression(value)),
            },
        })
        .collect::<Vec<_>>()
        .join(", ");

    format!("{{{}}}", rendered)
}

fn format_binary(op: BinaryOperator, left: &Expression, right: &Expression) -> String {
    let precedence = binary_precedence(op);
    let right_associative = matches!(op, BinaryOperator::Concat);

    let left_text = format_operand(left, precedence, right_associative);
    let right_text = format_operand(right, precedence, !right_associative);

    format!("{} {} {}", left_text, binary_token(op), right_text)
}

/// Parenthesizes an operand whose own precedence would change the parse. The
/// `strict` side is the one where equal precedence still needs parentheses.
fn format_operand(operand: &Expression, parent_precedence: u8, strict: bool) -> String {
    let own = expression_precedence(operand);
    let needs_parens = if strict {
        own <= parent_precedence
    } else {
        own < parent_precedence
    };
    if needs_parens {
        format!("({})", format_expression(operand))
    } else {
        format_expression(operand)
    }
}

fn expression_precedence(expression: &Expression) -> u8 {
    match expression {
        Expression::Binary { op, .. } => binary_precedence(*op),
        Expression::Unary { .. } => unary_precedence(),
        Expression::Function(_) => 0,
        _ => u8::MAX,
    }
}

fn binary_precedence(op: BinaryOperator) -> u8 {
    match op {
        BinaryOperator::Or => 1,
        BinaryOperator::And => 2,
        BinaryOperator::Equal
        | BinaryOperator::NotEqual
        | BinaryOperator::LessThan
        | BinaryOperator::LessEqual
        | BinaryOperator::GreaterThan
        | BinaryOperator::GreaterEqual => 3,
        BinaryOperator::Concat => 4,
        BinaryOperator::Add | BinaryOperator::Sub => 5,
        BinaryOperator::Mul | BinaryOperator::Div | BinaryOperator::Mod => 6,
    }
}

fn unary_precedence() -> u8 {
    7
}

fn binary_token(op: BinaryOperator) -> &'static str {
    match op {
        BinaryOperator::Add => "+",
        BinaryOperator::Sub => "-",
        BinaryOperator::Mul => "*",
        BinaryOperator::Div => "/",
        BinaryOperator::Mod => "%",
        BinaryOperator::Concat => "..",
        BinaryOperator::Equal => "==",
        BinaryOperator::NotEqual => "~=",
        BinaryOperator::LessThan => "<",
        BinaryOperator::LessEqual => "<=",
        BinaryOperator::GreaterThan => ">",
        BinaryOperator::GreaterEqual => ">=",
        BinaryOperator::And => "and",
        BinaryOperator::Or => "or",
    }
}

fn format_number(value: f64) -> String {
    if value.is_nan() {
        return "(0 / 0)".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 {
            "math.huge".to_string()
        } else {
            "-math.huge".to_string()
        };
    }
    if value == value.trunc() && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

fn escape_string(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            '\t' => escaped.push_str("\\t"),
            '\0' => escaped.push_str("\\0"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

const LUA_KEYWORDS: &[&str] = &[
    "and", "break", "do", "else", "elseif", "end", "false", "for", "function", "goto", "if", "in",
    "local", "nil", "not", "or", "repeat", "return", "then", "true", "until", "while",
];

pub fn is_valid_lua_name(name: &str) -> bool {
    if name.is_empty() || LUA_KEYWORDS.contains(&name) {
        return false;
    }
    let mut chars = name.chars();
    let first = match chars.next() {
        Some(ch) => ch,
        None => return false,
    };
    if !first.is_ascii_alphabetic() && first != '_' {
        return false;
    }
    chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
}
