pub mod ast;
pub mod ident;
pub mod strings;
pub mod types;

use serde::{Deserialize, Serialize};

pub use ast::{BinaryOp, Decl, Expr, ExprKind, Stmt, UnaryOp};
pub use ident::{IdentId, IdentPool, BEGIN_USER_FUNC};
pub use strings::StringPool;
pub use types::{TypeDesc, TypeId, TypePool, BEGIN_USER_TYPE};

/// The checked translation unit handed from the front end to the code
/// generator: pools plus the declaration tree. Serializable so it can cross
/// a process boundary as a JSON snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Syntax {
    pub types: TypePool,
    pub idents: IdentPool,
    pub strings: StringPool,
    pub tree: Vec<Decl>,
    pub ref_main: Option<IdentId>,
}

impl Syntax {
    pub fn new() -> Self {
        let mut types = TypePool::new();
        let idents = IdentPool::with_builtins(&mut types);
        Self {
            types,
            idents,
            strings: StringPool::new(),
            tree: Vec::new(),
            ref_main: None,
        }
    }

    /// Interns `text` and builds the literal expression for it, typed as an
    /// array of char.
    pub fn string_literal(&mut self, text: &str) -> Expr {
        let index = self.strings.intern(text);
        let ty = self.types.array_of(TypePool::CHAR);
        Expr::new(ExprKind::StringLiteral(index), ty)
    }
}

impl Default for Syntax {
    fn default() -> Self {
        Self::new()
    }
}

/// Target selection recognised by the generator.
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Target {
    #[default]
    X86_64,
    Mipsel,
}

/// Command-line flags relevant to code generation. Flags the generator does
/// not recognise are carried but ignored.
#[derive(Debug, Clone, Default)]
pub struct Workspace {
    flags: Vec<String>,
}

impl Workspace {
    pub fn new(flags: Vec<String>) -> Self {
        Self { flags }
    }

    pub fn is_correct(&self) -> bool {
        self.flags.iter().all(|f| !f.is_empty())
    }

    pub fn target(&self) -> Target {
        for flag in &self.flags {
            match flag.as_str() {
                "--x86_64" => return Target::X86_64,
                "--mipsel" => return Target::Mipsel,
                _ => {}
            }
        }
        Target::X86_64
    }
}
