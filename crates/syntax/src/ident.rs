use serde::{Deserialize, Serialize};

use crate::types::{TypeId, TypePool};

/// Handle into the identifier pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdentId(pub usize);

/// Identifiers below this index are language builtins seeded by
/// `IdentPool::with_builtins`; everything at or above is user-defined.
pub const BEGIN_USER_FUNC: usize = 6;

pub const BI_ASSERT: IdentId = IdentId(0);
pub const BI_PRINTF: IdentId = IdentId(1);
pub const BI_PRINT: IdentId = IdentId(2);
pub const BI_PRINTID: IdentId = IdentId(3);
pub const BI_GETID: IdentId = IdentId(4);
pub const BI_SQRT: IdentId = IdentId(5);

#[derive(Debug, Clone, Serialize, Deserialize)]
struct IdentInfo {
    spelling: String,
    ty: TypeId,
    is_local: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentPool {
    items: Vec<IdentInfo>,
}

impl IdentPool {
    /// Seeds the builtin function identifiers into slots
    /// `[0, BEGIN_USER_FUNC)`, interning their signatures in `types`.
    pub fn with_builtins(types: &mut TypePool) -> Self {
        let char_ptr = types.pointer_to(TypePool::CHAR);
        let builtins: [(&str, TypeId, Vec<TypeId>); BEGIN_USER_FUNC] = [
            ("assert", TypePool::VOID, vec![TypePool::INT, char_ptr]),
            ("printf", TypePool::INT, vec![char_ptr, TypePool::VARARG]),
            ("print", TypePool::VOID, vec![TypePool::VARARG]),
            ("printid", TypePool::VOID, vec![TypePool::VARARG]),
            ("getid", TypePool::VOID, vec![TypePool::VARARG]),
            ("sqrt", TypePool::FLOAT, vec![TypePool::FLOAT]),
        ];

        let mut pool = Self { items: Vec::new() };
        for (name, ret, params) in builtins {
            let ty = types.function(ret, params);
            pool.items.push(IdentInfo {
                spelling: name.to_string(),
                ty,
                is_local: false,
            });
        }
        pool
    }

    pub fn amount(&self) -> usize {
        self.items.len()
    }

    pub fn declare(&mut self, spelling: &str, ty: TypeId, is_local: bool) -> IdentId {
        self.items.push(IdentInfo {
            spelling: spelling.to_string(),
            ty,
            is_local,
        });
        IdentId(self.items.len() - 1)
    }

    pub fn get_type(&self, id: IdentId) -> TypeId {
        self.items[id.0].ty
    }

    pub fn is_local(&self, id: IdentId) -> bool {
        self.items[id.0].is_local
    }

    pub fn get_spelling(&self, id: IdentId) -> &str {
        &self.items[id.0].spelling
    }

    pub fn is_builtin(&self, id: IdentId) -> bool {
        id.0 < BEGIN_USER_FUNC
    }
}
