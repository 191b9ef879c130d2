use lualower_core::Pos;
use serde::{Deserialize, Serialize};

/// Recoverable source-level issues the engine reports while continuing with a
/// best-effort lowering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiagnosticKind {
    UnsupportedVarDeclaration,
    AnnotationRemoved,
    NonFinalDefaultClause,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub pos: Pos,
    pub message: String,
}

impl Diagnostic {
    pub fn unsupported_var_declaration(pos: Pos) -> Self {
        Self {
            kind: DiagnosticKind::UnsupportedVarDeclaration,
            pos,
            message: "`var` declarations are not supported; treating as a local binding"
                .to_string(),
        }
    }

    pub fn annotation_removed(pos: Pos, name: &str) -> Self {
        Self {
            kind: DiagnosticKind::AnnotationRemoved,
            pos,
            message: format!("'{name}' annotation is no longer supported and was removed"),
        }
    }

    pub fn non_final_default_clause(pos: Pos) -> Self {
        Self {
            kind: DiagnosticKind::NonFinalDefaultClause,
            pos,
            message: "a default clause before the last case is lowered as if it were final"
                .to_string(),
        }
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.pos, self.message)
    }
}
