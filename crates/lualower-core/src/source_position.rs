use serde::{Deserialize, Serialize};

/// Byte offset into the original source text.
///
/// Hoisting decisions compare usage sites against declaration sites, so positions
/// must order the same way the source text reads. Rewritten statements keep the
/// position of the statement they replace for sourcemap fidelity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Pos(pub u32);

impl Pos {
    pub const ZERO: Pos = Pos(0);
}

impl std::fmt::Display for Pos {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "@{}", self.0)
    }
}
