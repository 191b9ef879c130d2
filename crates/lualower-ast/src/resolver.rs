use crate::tree::NodeId;
use lualower_core::{Pos, SymbolId};
use std::collections::{HashMap, HashSet};

/// Standard-library origin of an identifier or property-access owner, as
/// classified by the front-end's type checker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StandardLibraryKind {
    Math,
    PromiseConstructor,
    ObjectConstructor,
    SymbolConstructor,
    NaN,
    Infinity,
    GlobalThis,
}

/// Constant value of an enum member, as computed by the checker. Members
/// without initializers receive auto-incremented numeric values.
#[derive(Debug, Clone, PartialEq)]
pub enum EnumMemberValue {
    Number(f64),
    String(String),
}

/// Symbol and type facts the engine consumes but never produces.
///
/// Every query is keyed by node id or symbol id; a front-end backs this with
/// its checker, tests back it with a [`ResolutionTable`].
pub trait Resolver {
    fn resolve_symbol(&self, node: NodeId) -> Option<SymbolId>;

    /// Position of the symbol's first declaration in the compilation unit.
    /// Hoisting compares usage sites against this.
    fn first_declaration_position(&self, symbol: SymbolId) -> Option<Pos>;

    fn is_symbol_exported(&self, symbol: SymbolId) -> bool;

    fn is_array_type(&self, node: NodeId) -> bool;

    fn is_function_type(&self, node: NodeId) -> bool;

    /// Whether the call at `node` yields native multiple values.
    fn is_multi_return_call(&self, node: NodeId) -> bool;

    /// Whether the callee's signature at `node` takes the object as an
    /// implicit first parameter, so the call lowers to method syntax.
    fn is_self_call(&self, node: NodeId) -> bool;

    fn standard_library_kind(&self, node: NodeId) -> Option<StandardLibraryKind>;

    /// Whether the symbol is the global constant denoting the file-level
    /// vararg expression.
    fn is_global_vararg_constant(&self, symbol: SymbolId) -> bool;

    /// Whether the identifier at `node` carries a legacy vararg annotation,
    /// which the engine reports as removed.
    fn has_vararg_annotation(&self, node: NodeId) -> bool;

    fn enum_member_value(&self, node: NodeId) -> Option<EnumMemberValue>;
}

/// Table-backed [`Resolver`] populated explicitly, used by tests and by
/// front-ends that precompute their facts.
#[derive(Debug, Default)]
pub struct ResolutionTable {
    symbols: HashMap<NodeId, SymbolId>,
    declaration_positions: HashMap<SymbolId, Pos>,
    exported: HashSet<SymbolId>,
    array_typed: HashSet<NodeId>,
    function_typed: HashSet<NodeId>,
    multi_return_calls: HashSet<NodeId>,
    self_calls: HashSet<NodeId>,
    standard_library: HashMap<NodeId, StandardLibraryKind>,
    vararg_constants: HashSet<SymbolId>,
    vararg_annotations: HashSet<NodeId>,
    enum_member_values: HashMap<NodeId, EnumMemberValue>,
    next_symbol: u32,
}

impl ResolutionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate_symbol(&mut self) -> SymbolId {
        let symbol = SymbolId(self.next_symbol);
        self.next_symbol += 1;
        symbol
    }

    pub fn bind(&mut self, node: NodeId, symbol: SymbolId) {
        self.symbols.insert(node, symbol);
    }

    /// Binds `node` to `symbol` and records `pos` as the symbol's first
    /// declaration position if none is known yet.
    pub fn declare(&mut self, node: NodeId, symbol: SymbolId, pos: Pos) {
        self.bind(node, symbol);
        self.declaration_positions.entry(symbol).or_insert(pos);
    }

    pub fn mark_exported(&mut self, symbol: SymbolId) {
        self.exported.insert(symbol);
    }

    pub fn mark_array_type(&mut self, node: NodeId) {
        self.array_typed.insert(node);
    }

    pub fn mark_function_type(&mut self, node: NodeId) {
        self.function_typed.insert(node);
    }

    pub fn mark_multi_return_call(&mut self, node: NodeId) {
        self.multi_return_calls.insert(node);
    }

    pub fn mark_self_call(&mut self, node: NodeId) {
        self.self_calls.insert(node);
    }

    pub fn mark_standard_library(&mut self, node: NodeId, kind: StandardLibraryKind) {
        self.standard_library.insert(node, kind);
    }

    pub fn mark_vararg_constant(&mut self, symbol: SymbolId) {
        self.vararg_constants.insert(symbol);
    }

    pub fn mark_vararg_annotation(&mut self, node: NodeId) {
        self.vararg_annotations.insert(node);
    }

    pub fn set_enum_member_value(&mut self, node: NodeId, value: EnumMemberValue) {
        self.enum_member_values.insert(node, value);
    }
}

impl Resolver for ResolutionTable {
    fn resolve_symbol(&self, node: NodeId) -> Option<SymbolId> {
        self.symbols.get(&node).copied()
    }

    fn first_declaration_position(&self, symbol: SymbolId) -> Option<Pos> {
        self.declaration_positions.get(&symbol).copied()
    }

    fn is_symbol_exported(&self, symbol: SymbolId) -> bool {
        self.exported.contains(&symbol)
    }

    fn is_array_type(&self, node: NodeId) -> bool {
        self.array_typed.contains(&node)
    }

    fn is_function_type(&self, node: NodeId) -> bool {
        self.function_typed.contains(&node)
    }

    fn is_multi_return_call(&self, node: NodeId) -> bool {
        self.multi_return_calls.contains(&node)
    }

    fn is_self_call(&self, node: NodeId) -> bool {
        self.self_calls.contains(&node)
    }

    fn standard_library_kind(&self, node: NodeId) -> Option<StandardLibraryKind> {
        self.standard_library.get(&node).copied()
    }

    fn is_global_vararg_constant(&self, symbol: SymbolId) -> bool {
        self.vararg_constants.contains(&symbol)
    }

    fn has_vararg_annotation(&self, node: NodeId) -> bool {
        self.vararg_annotations.contains(&node)
    }

    fn enum_member_value(&self, node: NodeId) -> Option<EnumMemberValue> {
        self.enum_member_values.get(&node).cloned()
    }
}
