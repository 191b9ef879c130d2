use super::errors::TransformError;
use super::scope::{Scope, ScopeKind};
use indexmap::IndexSet;
use lualower_ast::{Diagnostic, Resolver};
use lualower_core::{Expression, Identifier, Pos, Statement, SymbolId};
use lualower_runtime::LuaLibFeature;
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct LoweringOptions {
    /// When set, `const enum` declarations still emit their table instead of
    /// being fully inlined at use sites.
    pub preserve_const_enums: bool,
}

/// Active class body, used to resolve `super` references. `base` is absent for
/// classes without an extends clause, where `super` is an error.
#[derive(Debug, Clone)]
pub struct SuperFrame {
    pub class_name: Identifier,
    pub base: Option<Expression>,
}

/// Mutable state threaded through every lowering step: the scope stack,
/// requested runtime features, accumulated diagnostics, and the counters that
/// keep generated names unique.
pub struct LoweringContext<'a> {
    pub resolver: &'a dyn Resolver,
    pub options: LoweringOptions,
    scope_stack: Vec<Scope>,
    super_frames: Vec<SuperFrame>,
    features: IndexSet<LuaLibFeature>,
    pub diagnostics: Vec<Diagnostic>,
    /// First recorded use site per symbol, feeding hoisting decisions.
    symbol_first_seen: HashMap<SymbolId, Pos>,
    preceding_statements: Vec<Vec<Statement>>,
    next_scope_id: u32,
    next_temp: u32,
}

impl<'a> LoweringContext<'a> {
    pub fn new(resolver: &'a dyn Resolver) -> Self {
        Self::with_options(resolver, LoweringOptions::default())
    }

    pub fn with_options(resolver: &'a dyn Resolver, options: LoweringOptions) -> Self {
        Self {
            resolver,
            options,
            scope_stack: Vec::new(),
            super_frames: Vec::new(),
            features: IndexSet::new(),
            diagnostics: Vec::new(),
            symbol_first_seen: HashMap::new(),
            preceding_statements: Vec::new(),
            next_scope_id: 0,
            next_temp: 0,
        }
    }

    pub fn push_scope(&mut self, kind: ScopeKind) -> u32 {
        let id = self.next_scope_id;
        self.next_scope_id += 1;
        tracing::trace!(?kind, id, "entering scope");
        self.scope_stack.push(Scope::new(kind, id));
        id
    }

    pub fn pop_scope(&mut self) -> Result<Scope, TransformError> {
        self.scope_stack.pop().ok_or(TransformError::ScopeUnderflow)
    }

    pub fn current_scope(&self) -> Result<&Scope, TransformError> {
        self.scope_stack.last().ok_or(TransformError::ScopeUnderflow)
    }

    pub fn current_scope_mut(&mut self) -> Result<&mut Scope, TransformError> {
        self.scope_stack
            .last_mut()
            .ok_or(TransformError::ScopeUnderflow)
    }

    /// Nearest enclosing scope whose kind is one of `kinds`.
    pub fn find_scope(&self, kinds: &[ScopeKind]) -> Option<&Scope> {
        self.scope_stack
            .iter()
            .rev()
            .find(|scope| kinds.contains(&scope.kind))
    }

    /// Records a use of `symbol` at `pos` in every scope on the stack, so each
    /// enclosing region can make its own hoisting decision.
    pub fn mark_symbol_referenced(&mut self, symbol: SymbolId, pos: Pos) {
        self.symbol_first_seen.entry(symbol).or_insert(pos);
        for scope in &mut self.scope_stack {
            scope.mark_referenced(symbol, pos);
        }
    }

    pub fn first_seen(&self, symbol: SymbolId) -> Option<Pos> {
        self.symbol_first_seen.get(&symbol).copied()
    }

    pub fn set_rest_parameter(&mut self, symbol: SymbolId) -> Result<(), TransformError> {
        self.current_scope_mut()?.rest_parameter = Some(symbol);
        Ok(())
    }

    /// Marks the function scope owning `symbol` as needing its rest parameter
    /// materialized into a table.
    pub fn mark_rest_referenced_plainly(&mut self, symbol: SymbolId) {
        for scope in self.scope_stack.iter_mut().rev() {
            if scope.kind == ScopeKind::Function {
                if scope.rest_parameter == Some(symbol) {
                    scope.rest_referenced_plainly = true;
                }
                return;
            }
        }
    }

    pub fn push_super_frame(&mut self, frame: SuperFrame) {
        self.super_frames.push(frame);
    }

    pub fn pop_super_frame(&mut self) {
        self.super_frames.pop();
    }

    pub fn current_super_frame(&self) -> Option<&SuperFrame> {
        self.super_frames.last()
    }

    /// Requests a runtime helper; repeated requests are collapsed into one.
    pub fn import_feature(&mut self, feature: LuaLibFeature) {
        if self.features.insert(feature) {
            tracing::debug!(feature = %feature, "runtime feature requested");
        }
    }

    pub fn used_features(&self) -> impl Iterator<Item = LuaLibFeature> + '_ {
        self.features.iter().copied()
    }

    pub fn add_diagnostic(&mut self, diagnostic: Diagnostic) {
        tracing::debug!(message = %diagnostic, "diagnostic");
        self.diagnostics.push(diagnostic);
    }

    pub fn fresh_temp(&mut self) -> Identifier {
        let name = format!("____temp_{}", self.next_temp);
        self.next_temp += 1;
        Identifier::new(name)
    }

    /// Opens a buffer for statements that must execute before the expression
    /// currently being lowered.
    pub fn push_preceding_statements(&mut self) {
        self.preceding_statements.push(Vec::new());
    }

    pub fn pop_preceding_statements(&mut self) -> Vec<Statement> {
        self.preceding_statements.pop().unwrap_or_default()
    }

    pub fn add_preceding_statement(&mut self, statement: Statement) {
        if let Some(buffer) = self.preceding_statements.last_mut() {
            buffer.push(statement);
        }
    }
}
