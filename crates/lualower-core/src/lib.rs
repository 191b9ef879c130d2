/*! Target-language AST and symbol model for the lualower engine.
 *
 * The lowering engine rewrites a class-based, statically-typed source tree into the
 * dynamically-typed, prototype-based shape of Lua. This crate provides the Lua-side
 * building blocks: statements and expressions, stable symbol ids, source positions
 * carried through rewrites, and a textual rendering used by tests and debugging.
 */

pub mod ast;
pub mod format;
pub mod source_position;
pub mod symbols;

pub use ast::{
    BinaryOperator, Block, Expression, FunctionExpression, Identifier, Statement, StatementKind,
    TableField, UnaryOperator,
};
pub use format::{format_block, format_expression, format_statement, is_valid_lua_name};
pub use source_position::Pos;
pub use symbols::SymbolId;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AstError {
    #[error("Invalid assignment target: {0}")]
    InvalidAssignmentTarget(String),
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),
}

pub type Result<T> = std::result::Result<T, AstError>;
