use indexmap::IndexMap;
use lualower_ast::Resolver;
use lualower_core::{Block, Identifier, Pos, Statement, StatementKind, SymbolId};
use std::collections::HashSet;

/// Kind of a lexical region on the scope stack. Hoisting behavior differs per
/// kind: file scopes also hoist imports, switch scopes hoist every declaration
/// because case bodies share one Lua scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    File,
    Function,
    Switch,
    Loop,
    Conditional,
    Block,
    Try,
    Catch,
}

/// A local function recorded in its enclosing scope, together with the symbols
/// its body referenced. The hoisting check walks these to decide whether a
/// use-before-declaration is reachable through a function that is itself
/// called early.
#[derive(Debug, Default)]
pub struct FunctionDefinition {
    pub referenced_symbols: HashSet<SymbolId>,
    pub definition: Option<Statement>,
}

impl FunctionDefinition {
    pub fn definition_pos(&self) -> Option<Pos> {
        self.definition.as_ref().and_then(|statement| statement.pos)
    }
}

#[derive(Debug)]
pub struct Scope {
    pub kind: ScopeKind,
    pub id: u32,
    /// Usage positions per symbol, recorded for every scope the use occurs in.
    pub referenced_symbols: IndexMap<SymbolId, Vec<Pos>>,
    /// Lowered `local` declarations produced in this scope, candidates for
    /// hoisting.
    pub variable_declarations: Vec<Statement>,
    pub function_definitions: IndexMap<SymbolId, FunctionDefinition>,
    pub import_statements: Vec<Statement>,
    /// Rest parameter of a function scope, when one exists. A plain reference
    /// to it forces materialization as `local rest = {...}`.
    pub rest_parameter: Option<SymbolId>,
    pub rest_referenced_plainly: bool,
}

impl Scope {
    pub fn new(kind: ScopeKind, id: u32) -> Self {
        Self {
            kind,
            id,
            referenced_symbols: IndexMap::new(),
            variable_declarations: Vec::new(),
            function_definitions: IndexMap::new(),
            import_statements: Vec::new(),
            rest_parameter: None,
            rest_referenced_plainly: false,
        }
    }

    pub fn mark_referenced(&mut self, symbol: SymbolId, pos: Pos) {
        self.referenced_symbols.entry(symbol).or_default().push(pos);
    }

    pub fn record_variable_declaration(&mut self, statement: Statement) {
        debug_assert!(matches!(
            statement.kind,
            StatementKind::VariableDeclaration { .. }
        ));
        self.variable_declarations.push(statement);
    }

    /// Announces a local function before its definition has been lowered, so
    /// the gap between declaration and definition is observable.
    pub fn register_local_function(&mut self, symbol: SymbolId) {
        self.function_definitions.entry(symbol).or_default();
    }

    pub fn record_function_definition(
        &mut self,
        symbol: SymbolId,
        referenced_symbols: HashSet<SymbolId>,
        definition: Statement,
    ) {
        let entry = self.function_definitions.entry(symbol).or_default();
        entry.referenced_symbols = referenced_symbols;
        entry.definition = Some(definition);
    }

    pub fn record_import(&mut self, statement: Statement) {
        self.import_statements.push(statement);
    }

    /// Whether a local function announced in this scope has been referenced
    /// while its definition is still pending. Such a function may run before
    /// the current statement once hoisted.
    pub fn has_referenced_undefined_local_function(&self) -> bool {
        self.function_definitions
            .iter()
            .any(|(symbol, definition)| {
                definition.definition.is_none() && self.referenced_symbols.contains_key(symbol)
            })
    }
}

/// Whether `symbol` must be hoisted to the top of `scope`: either a recorded
/// use precedes its declaration, or a function defined after the declaration
/// references it and that function is itself hoisted.
pub fn should_hoist_symbol(resolver: &dyn Resolver, symbol: SymbolId, scope: &Scope) -> bool {
    let mut visiting = HashSet::new();
    should_hoist_inner(resolver, symbol, scope, &mut visiting)
}

fn should_hoist_inner(
    resolver: &dyn Resolver,
    symbol: SymbolId,
    scope: &Scope,
    visiting: &mut HashSet<SymbolId>,
) -> bool {
    // Mutually recursive local functions would otherwise send the check in
    // circles; a symbol already being checked cannot justify hoisting itself.
    if !visiting.insert(symbol) {
        return false;
    }

    let declaration_pos = match resolver.first_declaration_position(symbol) {
        Some(pos) => pos,
        None => return false,
    };

    if let Some(usages) = scope.referenced_symbols.get(&symbol) {
        if usages.iter().any(|usage| *usage < declaration_pos) {
            return true;
        }
    }

    for (function_symbol, definition) in &scope.function_definitions {
        if *function_symbol == symbol {
            continue;
        }
        let defined_after = match definition.definition_pos() {
            Some(pos) => declaration_pos < pos,
            None => continue,
        };
        if defined_after
            && definition.referenced_symbols.contains(&symbol)
            && should_hoist_inner(resolver, *function_symbol, scope, visiting)
        {
            return true;
        }
    }

    false
}

/// Reorders `statements` so that declarations used before their point of
/// definition become visible early, without disturbing anything that does not
/// need to move. Function definitions first, then variable declarations, then
/// imports, so imports end up above everything else.
pub fn perform_hoisting(
    resolver: &dyn Resolver,
    scope: &Scope,
    statements: Vec<Statement>,
) -> Vec<Statement> {
    let mut result = statements;
    result = hoist_function_definitions(resolver, scope, result);
    result = hoist_variable_declarations(resolver, scope, result);
    if scope.kind == ScopeKind::File {
        result = hoist_import_statements(scope, result);
    }
    result
}

fn hoist_function_definitions(
    resolver: &dyn Resolver,
    scope: &Scope,
    mut statements: Vec<Statement>,
) -> Vec<Statement> {
    let mut hoisted = Vec::new();
    for (symbol, definition) in &scope.function_definitions {
        let statement = match &definition.definition {
            Some(statement) => statement,
            None => continue,
        };
        if should_hoist_symbol(resolver, *symbol, scope) {
            if let Some(index) = statements.iter().position(|s| s == statement) {
                hoisted.push(statements.remove(index));
            }
        }
    }
    statements.splice(0..0, hoisted);
    statements
}

fn hoist_variable_declarations(
    resolver: &dyn Resolver,
    scope: &Scope,
    mut statements: Vec<Statement>,
) -> Vec<Statement> {
    let mut hoisted_locals: Vec<Identifier> = Vec::new();

    for declaration in &scope.variable_declarations {
        let (left, right) = match declaration.as_variable_declaration() {
            Some(parts) => parts,
            None => continue,
        };
        let symbols: Vec<SymbolId> = left.iter().filter_map(|id| id.symbol_id).collect();
        if !symbols
            .iter()
            .any(|symbol| should_hoist_symbol(resolver, *symbol, scope))
        {
            continue;
        }

        if let Some(index) = statements.iter().position(|s| s == declaration) {
            match right {
                Some(values) => {
                    let assignment = Statement::assignment(
                        left.iter().cloned().map(Identifier::expression).collect(),
                        values.clone(),
                    )
                    .inherit_position(declaration);
                    statements[index] = assignment;
                }
                None => {
                    statements.remove(index);
                }
            }
        }
        hoisted_locals.extend(left.iter().cloned());
    }

    if !hoisted_locals.is_empty() {
        statements.insert(0, Statement::variable_declaration(hoisted_locals, None));
    }
    statements
}

fn hoist_import_statements(scope: &Scope, mut statements: Vec<Statement>) -> Vec<Statement> {
    let mut hoisted = Vec::new();
    for import in &scope.import_statements {
        if let Some(index) = statements.iter().position(|s| s == import) {
            hoisted.push(statements.remove(index));
        }
    }
    statements.splice(0..0, hoisted);
    statements
}

/// Switch bodies share one Lua scope, so every declaration made inside a case
/// is lifted to a bare `local` prefix in front of the lowered switch. The
/// in-case statements become plain assignments where an initializer exists and
/// disappear otherwise.
pub fn hoist_switch_declarations(scope: &Scope, case_blocks: &mut [Block]) -> Vec<Identifier> {
    let mut hoisted_locals: Vec<Identifier> = Vec::new();

    for declaration in &scope.variable_declarations {
        let (left, right) = match declaration.as_variable_declaration() {
            Some(parts) => parts,
            None => continue,
        };

        let replacement = right.as_ref().map(|values| {
            Statement::assignment(
                left.iter().cloned().map(Identifier::expression).collect(),
                values.clone(),
            )
            .inherit_position(declaration)
        });

        for block in case_blocks.iter_mut() {
            if let Some(index) = block.statements.iter().position(|s| s == declaration) {
                match &replacement {
                    Some(assignment) => block.statements[index] = assignment.clone(),
                    None => {
                        block.statements.remove(index);
                    }
                }
                break;
            }
        }

        hoisted_locals.extend(left.iter().cloned());
    }

    hoisted_locals
}

#[cfg(test)]
mod tests {
    use super::*;
    use lualower_ast::ResolutionTable;
    use lualower_core::Expression;
    use pretty_assertions::assert_eq;

    fn local_of(name: &str, symbol: SymbolId, value: Option<f64>) -> Statement {
        Statement::variable_declaration(
            vec![Identifier::with_symbol(name, symbol)],
            value.map(|v| vec![Expression::number(v)]),
        )
    }

    #[test]
    fn use_before_declaration_forces_hoist() {
        let mut table = ResolutionTable::new();
        let symbol = table.allocate_symbol();
        table.declare(lualower_ast::NodeId(0), symbol, Pos(10));

        let mut scope = Scope::new(ScopeKind::Function, 0);
        scope.mark_referenced(symbol, Pos(5));

        assert!(should_hoist_symbol(&table, symbol, &scope));
    }

    #[test]
    fn use_after_declaration_stays_in_place() {
        let mut table = ResolutionTable::new();
        let symbol = table.allocate_symbol();
        table.declare(lualower_ast::NodeId(0), symbol, Pos(10));

        let mut scope = Scope::new(ScopeKind::Function, 0);
        scope.mark_referenced(symbol, Pos(20));

        assert!(!should_hoist_symbol(&table, symbol, &scope));
    }

    #[test]
    fn reference_through_early_called_function_forces_hoist() {
        let mut table = ResolutionTable::new();
        let variable = table.allocate_symbol();
        let function = table.allocate_symbol();
        table.declare(lualower_ast::NodeId(0), variable, Pos(10));
        table.declare(lualower_ast::NodeId(1), function, Pos(30));

        let mut scope = Scope::new(ScopeKind::Function, 0);
        // The function is called at position 5, before both declarations.
        scope.mark_referenced(function, Pos(5));
        let mut referenced = HashSet::new();
        referenced.insert(variable);
        scope.record_function_definition(
            function,
            referenced,
            local_of("f", function, Some(0.0)).at(Pos(30)),
        );

        assert!(should_hoist_symbol(&table, variable, &scope));
    }

    #[test]
    fn mutually_recursive_functions_terminate() {
        let mut table = ResolutionTable::new();
        let first = table.allocate_symbol();
        let second = table.allocate_symbol();
        table.declare(lualower_ast::NodeId(0), first, Pos(10));
        table.declare(lualower_ast::NodeId(1), second, Pos(20));

        let mut scope = Scope::new(ScopeKind::Function, 0);
        let mut refs_first = HashSet::new();
        refs_first.insert(second);
        let mut refs_second = HashSet::new();
        refs_second.insert(first);
        scope.record_function_definition(
            first,
            refs_first,
            local_of("a", first, Some(0.0)).at(Pos(15)),
        );
        scope.record_function_definition(
            second,
            refs_second,
            local_of("b", second, Some(0.0)).at(Pos(25)),
        );

        assert!(!should_hoist_symbol(&table, first, &scope));
        assert!(!should_hoist_symbol(&table, second, &scope));
    }

    #[test]
    fn hoisted_declaration_with_initializer_becomes_assignment() {
        let mut table = ResolutionTable::new();
        let symbol = table.allocate_symbol();
        table.declare(lualower_ast::NodeId(0), symbol, Pos(10));

        let mut scope = Scope::new(ScopeKind::Function, 0);
        scope.mark_referenced(symbol, Pos(5));
        let declaration = local_of("x", symbol, Some(1.0)).at(Pos(10));
        scope.record_variable_declaration(declaration.clone());

        let use_site = Statement::expression(Expression::call(
            Expression::name("print"),
            vec![Expression::name("x")],
        ));
        let statements = perform_hoisting(&table, &scope, vec![use_site.clone(), declaration]);

        assert_eq!(statements.len(), 3);
        assert_eq!(
            statements[0],
            Statement::variable_declaration(vec![Identifier::with_symbol("x", symbol)], None)
        );
        assert_eq!(statements[1], use_site);
        assert_eq!(
            statements[2],
            Statement::assignment(
                vec![Identifier::with_symbol("x", symbol).expression()],
                vec![Expression::number(1.0)],
            )
            .at(Pos(10))
        );
    }

    #[test]
    fn hoisted_declaration_without_initializer_is_removed() {
        let mut table = ResolutionTable::new();
        let symbol = table.allocate_symbol();
        table.declare(lualower_ast::NodeId(0), symbol, Pos(10));

        let mut scope = Scope::new(ScopeKind::Function, 0);
        scope.mark_referenced(symbol, Pos(5));
        let declaration = local_of("x", symbol, None).at(Pos(10));
        scope.record_variable_declaration(declaration.clone());

        let statements = perform_hoisting(&table, &scope, vec![declaration]);

        assert_eq!(
            statements,
            vec![Statement::variable_declaration(
                vec![Identifier::with_symbol("x", symbol)],
                None
            )]
        );
    }

    #[test]
    fn unhoisted_statements_keep_their_order() {
        let table = ResolutionTable::new();
        let scope = Scope::new(ScopeKind::Function, 0);
        let first = Statement::expression(Expression::call(Expression::name("a"), Vec::new()));
        let second = Statement::expression(Expression::call(Expression::name("b"), Vec::new()));

        let statements =
            perform_hoisting(&table, &scope, vec![first.clone(), second.clone()]);

        assert_eq!(statements, vec![first, second]);
    }

    #[test]
    fn imports_move_above_hoisted_functions() {
        let mut table = ResolutionTable::new();
        let function = table.allocate_symbol();
        table.declare(lualower_ast::NodeId(0), function, Pos(20));

        let mut scope = Scope::new(ScopeKind::File, 0);
        scope.mark_referenced(function, Pos(5));
        let definition = local_of("f", function, Some(0.0)).at(Pos(20));
        scope.record_function_definition(function, HashSet::new(), definition.clone());

        let import = Statement::variable_declaration(
            vec![Identifier::new("dep")],
            Some(vec![Expression::call(
                Expression::name("require"),
                vec![Expression::string("dep")],
            )]),
        );
        scope.record_import(import.clone());

        let call_site = Statement::expression(Expression::call(Expression::name("f"), Vec::new()));
        let statements = perform_hoisting(
            &table,
            &scope,
            vec![call_site.clone(), definition.clone(), import.clone()],
        );

        assert_eq!(statements, vec![import, definition, call_site]);
    }

    #[test]
    fn switch_declarations_all_contribute_to_prefix() {
        let mut table = ResolutionTable::new();
        let symbol = table.allocate_symbol();
        table.declare(lualower_ast::NodeId(0), symbol, Pos(10));

        let mut scope = Scope::new(ScopeKind::Switch, 1);
        let declaration = local_of("x", symbol, Some(1.0)).at(Pos(10));
        scope.record_variable_declaration(declaration.clone());

        let mut blocks = vec![Block::new(vec![declaration])];
        let hoisted = hoist_switch_declarations(&scope, &mut blocks);

        assert_eq!(hoisted, vec![Identifier::with_symbol("x", symbol)]);
        assert_eq!(
            blocks[0].statements,
            vec![Statement::assignment(
                vec![Identifier::with_symbol("x", symbol).expression()],
                vec![Expression::number(1.0)],
            )
            .at(Pos(10))]
        );
    }
}
