use crate::tree::{
    Argument, ArrayElement, BinaryOperator, BindingPattern, Block, CatchClause, ClassDeclaration,
    ClassMember, DeclarationKind, EnumDeclaration, EnumMember, Expression, ExpressionKind,
    FunctionExpression, Identifier, MemberKind, NodeId, ObjectProperty, Parameter, SourceFile,
    Statement, StatementKind, SwitchClause, UnaryOperator, VariableDeclaration, VariableDeclarator,
};
use lualower_core::Pos;

/// Constructs source trees with fresh node ids and monotonically increasing
/// positions, so that nodes created in program order compare in program order.
#[derive(Debug, Default)]
pub struct AstBuilder {
    next_id: u32,
    next_pos: u32,
}

impl AstBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fresh_id(&mut self) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        id
    }

    pub fn fresh_pos(&mut self) -> Pos {
        let pos = Pos(self.next_pos);
        self.next_pos += 1;
        pos
    }

    pub fn identifier(&mut self, text: impl Into<String>) -> Identifier {
        Identifier {
            text: text.into(),
            id: self.fresh_id(),
            pos: self.fresh_pos(),
        }
    }

    pub fn expression(&mut self, kind: ExpressionKind) -> Expression {
        Expression {
            kind,
            id: self.fresh_id(),
            pos: self.fresh_pos(),
        }
    }

    pub fn undefined(&mut self) -> Expression {
        self.expression(ExpressionKind::Undefined)
    }

    pub fn boolean(&mut self, value: bool) -> Expression {
        self.expression(ExpressionKind::Boolean(value))
    }

    pub fn number(&mut self, value: f64) -> Expression {
        self.expression(ExpressionKind::Number(value))
    }

    pub fn string(&mut self, text: impl Into<String>) -> Expression {
        self.expression(ExpressionKind::StringLiteral(text.into()))
    }

    pub fn reference(&mut self, text: impl Into<String>) -> Expression {
        self.expression(ExpressionKind::Identifier(text.into()))
    }

    pub fn this(&mut self) -> Expression {
        self.expression(ExpressionKind::This)
    }

    pub fn superclass(&mut self) -> Expression {
        self.expression(ExpressionKind::Super)
    }

    pub fn array(&mut self, elements: Vec<Expression>) -> Expression {
        let elements = elements
            .into_iter()
            .map(|expression| ArrayElement {
                expression,
                spread: false,
            })
            .collect();
        self.expression(ExpressionKind::Array(elements))
    }

    pub fn array_with(&mut self, elements: Vec<ArrayElement>) -> Expression {
        self.expression(ExpressionKind::Array(elements))
    }

    pub fn object(&mut self, properties: Vec<ObjectProperty>) -> Expression {
        self.expression(ExpressionKind::ObjectLiteral(properties))
    }

    pub fn property_access(&mut self, object: Expression, property: impl Into<String>) -> Expression {
        self.expression(ExpressionKind::PropertyAccess {
            object: Box::new(object),
            property: property.into(),
        })
    }

    pub fn element_access(&mut self, object: Expression, index: Expression) -> Expression {
        self.expression(ExpressionKind::ElementAccess {
            object: Box::new(object),
            index: Box::new(index),
        })
    }

    pub fn call(&mut self, callee: Expression, arguments: Vec<Expression>) -> Expression {
        let arguments = arguments.into_iter().map(Argument::plain).collect();
        self.call_with(callee, arguments)
    }

    pub fn call_with(&mut self, callee: Expression, arguments: Vec<Argument>) -> Expression {
        self.expression(ExpressionKind::Call {
            callee: Box::new(callee),
            arguments,
        })
    }

    pub fn new_expression(&mut self, callee: Expression, arguments: Vec<Expression>) -> Expression {
        let arguments = arguments.into_iter().map(Argument::plain).collect();
        self.expression(ExpressionKind::New {
            callee: Box::new(callee),
            arguments,
        })
    }

    pub fn function(&mut self, parameters: Vec<Parameter>, body: Block) -> Expression {
        self.expression(ExpressionKind::Function(FunctionExpression {
            parameters,
            body,
            is_async: false,
        }))
    }

    pub fn async_function(&mut self, parameters: Vec<Parameter>, body: Block) -> Expression {
        self.expression(ExpressionKind::Function(FunctionExpression {
            parameters,
            body,
            is_async: true,
        }))
    }

    pub fn binary(&mut self, op: BinaryOperator, left: Expression, right: Expression) -> Expression {
        self.expression(ExpressionKind::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    pub fn unary(&mut self, op: UnaryOperator, operand: Expression) -> Expression {
        self.expression(ExpressionKind::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    pub fn await_expression(&mut self, operand: Expression) -> Expression {
        self.expression(ExpressionKind::Await(Box::new(operand)))
    }

    pub fn class_expression(&mut self, class: ClassDeclaration) -> Expression {
        self.expression(ExpressionKind::Class(Box::new(class)))
    }

    pub fn statement(&mut self, kind: StatementKind) -> Statement {
        Statement {
            kind,
            pos: self.fresh_pos(),
        }
    }

    pub fn declarator(
        &mut self,
        pattern: BindingPattern,
        initializer: Option<Expression>,
    ) -> VariableDeclarator {
        VariableDeclarator {
            pattern,
            initializer,
            pos: self.fresh_pos(),
        }
    }

    pub fn variable_declaration(
        &mut self,
        kind: DeclarationKind,
        declarators: Vec<VariableDeclarator>,
    ) -> Statement {
        self.statement(StatementKind::VariableDeclaration(VariableDeclaration {
            kind,
            declarators,
        }))
    }

    /// `let name = initializer` with a single identifier pattern.
    pub fn let_name(&mut self, name: Identifier, initializer: Option<Expression>) -> Statement {
        let declarator = self.declarator(BindingPattern::Name(name), initializer);
        self.variable_declaration(DeclarationKind::Let, vec![declarator])
    }

    pub fn function_declaration(
        &mut self,
        name: Identifier,
        parameters: Vec<Parameter>,
        body: Block,
    ) -> Statement {
        self.statement(StatementKind::FunctionDeclaration {
            name,
            function: FunctionExpression {
                parameters,
                body,
                is_async: false,
            },
        })
    }

    pub fn class_declaration(&mut self, class: ClassDeclaration) -> Statement {
        self.statement(StatementKind::ClassDeclaration(class))
    }

    pub fn class(
        &mut self,
        name: Identifier,
        extends: Option<Expression>,
        members: Vec<ClassMember>,
    ) -> ClassDeclaration {
        ClassDeclaration {
            name: Some(name),
            extends,
            members,
            decorators: Vec::new(),
            id: self.fresh_id(),
            pos: self.fresh_pos(),
        }
    }

    pub fn class_member(&mut self, kind: MemberKind) -> ClassMember {
        ClassMember {
            kind,
            decorators: Vec::new(),
            pos: self.fresh_pos(),
        }
    }

    pub fn enum_declaration(&mut self, name: Identifier, members: Vec<EnumMember>) -> Statement {
        let pos = self.fresh_pos();
        self.statement(StatementKind::EnumDeclaration(EnumDeclaration {
            name,
            is_const: false,
            members,
            doc_comment: Vec::new(),
            pos,
        }))
    }

    pub fn enum_member(&mut self, name: Identifier, initializer: Option<Expression>) -> EnumMember {
        EnumMember {
            name,
            initializer,
            doc_comment: Vec::new(),
            pos: self.fresh_pos(),
        }
    }

    pub fn import(&mut self, name: Identifier, module: impl Into<String>) -> Statement {
        self.statement(StatementKind::Import {
            name,
            module: module.into(),
        })
    }

    pub fn expression_statement(&mut self, expression: Expression) -> Statement {
        self.statement(StatementKind::Expression(expression))
    }

    pub fn assignment(&mut self, target: Expression, value: Expression) -> Statement {
        self.statement(StatementKind::Assignment { target, value })
    }

    pub fn if_statement(
        &mut self,
        condition: Expression,
        then_branch: Block,
        else_branch: Option<Block>,
    ) -> Statement {
        self.statement(StatementKind::If {
            condition,
            then_branch,
            else_branch,
        })
    }

    pub fn while_statement(&mut self, condition: Expression, body: Block) -> Statement {
        self.statement(StatementKind::While { condition, body })
    }

    pub fn switch_statement(
        &mut self,
        expression: Expression,
        clauses: Vec<SwitchClause>,
    ) -> Statement {
        self.statement(StatementKind::Switch {
            expression,
            clauses,
        })
    }

    pub fn switch_clause(
        &mut self,
        test: Option<Expression>,
        statements: Vec<Statement>,
    ) -> SwitchClause {
        SwitchClause {
            test,
            statements,
            pos: self.fresh_pos(),
        }
    }

    pub fn try_statement(&mut self, body: Block, catch: Option<CatchClause>) -> Statement {
        self.statement(StatementKind::Try { body, catch })
    }

    pub fn throw(&mut self, expression: Expression) -> Statement {
        self.statement(StatementKind::Throw(expression))
    }

    pub fn ret(&mut self, expression: Option<Expression>) -> Statement {
        self.statement(StatementKind::Return(expression))
    }

    pub fn break_statement(&mut self) -> Statement {
        self.statement(StatementKind::Break)
    }

    pub fn block_statement(&mut self, statements: Vec<Statement>) -> Statement {
        self.statement(StatementKind::Block(Block::new(statements)))
    }

    pub fn source_file(&mut self, statements: Vec<Statement>) -> SourceFile {
        SourceFile::new(statements)
    }
}

impl Argument {
    pub fn plain(expression: Expression) -> Self {
        Self {
            expression,
            spread: false,
        }
    }

    pub fn spread(expression: Expression) -> Self {
        Self {
            expression,
            spread: true,
        }
    }
}

impl ArrayElement {
    pub fn plain(expression: Expression) -> Self {
        Self {
            expression,
            spread: false,
        }
    }

    pub fn spread(expression: Expression) -> Self {
        Self {
            expression,
            spread: true,
        }
    }
}
