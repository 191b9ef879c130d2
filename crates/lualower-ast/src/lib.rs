/*! Typed source syntax tree and resolution interface for the lualower engine.
 *
 * The front-end that parses and type-checks source text is an external
 * collaborator. This crate defines the tree shape it hands to the lowering
 * engine, the `Resolver` trait through which the engine queries symbol and
 * type facts, a builder that assigns node ids and monotonically increasing
 * source positions, and the diagnostics the engine reports back.
 */

pub mod builder;
pub mod diagnostics;
pub mod resolver;
pub mod tree;

pub use builder::AstBuilder;
pub use diagnostics::{Diagnostic, DiagnosticKind};
pub use resolver::{EnumMemberValue, ResolutionTable, Resolver, StandardLibraryKind};
pub use tree::{
    Argument, ArrayElement, BinaryOperator, BindingElement, BindingPattern, Block, CatchClause,
    ClassDeclaration, ClassMember, DeclarationKind, EnumDeclaration, EnumMember, Expression,
    ExpressionKind, FunctionExpression, Identifier, MemberKind, NodeId, ObjectBindingElement,
    ObjectProperty, Parameter, SourceFile, Statement, StatementKind, SwitchClause, UnaryOperator,
    VariableDeclaration, VariableDeclarator,
};
