use serde::{Deserialize, Serialize};

/// Handle into the type pool. Struct types print into the IR by their raw
/// pool index, so indices are stable for the lifetime of a `Syntax`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeId(pub usize);

/// First pool index available to user-defined types; everything below is a
/// predeclared primitive seeded by `TypePool::new`.
pub const BEGIN_USER_TYPE: usize = 8;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TypeDesc {
    Void,
    Bool,
    Char,
    Int,
    Float,
    NullPtr,
    Vararg,
    File,
    Pointer(TypeId),
    Array(TypeId),
    Struct(Vec<TypeId>),
    Function { ret: TypeId, params: Vec<TypeId> },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypePool {
    items: Vec<TypeDesc>,
}

impl TypePool {
    pub const VOID: TypeId = TypeId(0);
    pub const BOOL: TypeId = TypeId(1);
    pub const CHAR: TypeId = TypeId(2);
    pub const INT: TypeId = TypeId(3);
    pub const FLOAT: TypeId = TypeId(4);
    pub const NULL_PTR: TypeId = TypeId(5);
    pub const VARARG: TypeId = TypeId(6);
    pub const FILE: TypeId = TypeId(7);

    pub fn new() -> Self {
        Self {
            items: vec![
                TypeDesc::Void,
                TypeDesc::Bool,
                TypeDesc::Char,
                TypeDesc::Int,
                TypeDesc::Float,
                TypeDesc::NullPtr,
                TypeDesc::Vararg,
                TypeDesc::File,
            ],
        }
    }

    pub fn amount(&self) -> usize {
        self.items.len()
    }

    pub fn get(&self, id: TypeId) -> &TypeDesc {
        &self.items[id.0]
    }

    fn intern(&mut self, desc: TypeDesc) -> TypeId {
        if let Some(pos) = self.items.iter().position(|d| *d == desc) {
            return TypeId(pos);
        }
        self.items.push(desc);
        TypeId(self.items.len() - 1)
    }

    pub fn pointer_to(&mut self, elem: TypeId) -> TypeId {
        self.intern(TypeDesc::Pointer(elem))
    }

    pub fn array_of(&mut self, elem: TypeId) -> TypeId {
        self.intern(TypeDesc::Array(elem))
    }

    pub fn function(&mut self, ret: TypeId, params: Vec<TypeId>) -> TypeId {
        self.intern(TypeDesc::Function { ret, params })
    }

    /// Struct types are nominal: every call mints a fresh pool entry even
    /// for identical field lists.
    pub fn structure(&mut self, fields: Vec<TypeId>) -> TypeId {
        self.items.push(TypeDesc::Struct(fields));
        TypeId(self.items.len() - 1)
    }

    pub fn is_void(&self, id: TypeId) -> bool {
        matches!(self.get(id), TypeDesc::Void)
    }

    pub fn is_integer(&self, id: TypeId) -> bool {
        matches!(self.get(id), TypeDesc::Bool | TypeDesc::Char | TypeDesc::Int)
    }

    pub fn is_character(&self, id: TypeId) -> bool {
        matches!(self.get(id), TypeDesc::Char)
    }

    pub fn is_floating(&self, id: TypeId) -> bool {
        matches!(self.get(id), TypeDesc::Float)
    }

    pub fn is_pointer(&self, id: TypeId) -> bool {
        matches!(self.get(id), TypeDesc::Pointer(_))
    }

    pub fn is_null_ptr(&self, id: TypeId) -> bool {
        matches!(self.get(id), TypeDesc::NullPtr)
    }

    pub fn is_array(&self, id: TypeId) -> bool {
        matches!(self.get(id), TypeDesc::Array(_))
    }

    pub fn is_struct(&self, id: TypeId) -> bool {
        matches!(self.get(id), TypeDesc::Struct(_))
    }

    pub fn is_function(&self, id: TypeId) -> bool {
        matches!(self.get(id), TypeDesc::Function { .. })
    }

    /// A string literal's type: array of char.
    pub fn is_string(&self, id: TypeId) -> bool {
        match self.get(id) {
            TypeDesc::Array(elem) => self.is_character(*elem),
            _ => false,
        }
    }

    /// Element type of a pointer or array; identity for anything else.
    pub fn element(&self, id: TypeId) -> TypeId {
        match self.get(id) {
            TypeDesc::Pointer(elem) | TypeDesc::Array(elem) => *elem,
            _ => id,
        }
    }

    /// Scalar element type at the bottom of an array nest.
    pub fn array_element(&self, id: TypeId) -> TypeId {
        let mut ty = id;
        while self.is_array(ty) {
            ty = self.element(ty);
        }
        ty
    }

    /// Number of array nesting levels of `id`.
    pub fn array_dimensions(&self, id: TypeId) -> usize {
        let mut ty = id;
        let mut dims = 0;
        while self.is_array(ty) {
            ty = self.element(ty);
            dims += 1;
        }
        dims
    }

    pub fn function_return(&self, id: TypeId) -> TypeId {
        match self.get(id) {
            TypeDesc::Function { ret, .. } => *ret,
            _ => id,
        }
    }

    pub fn function_params(&self, id: TypeId) -> &[TypeId] {
        match self.get(id) {
            TypeDesc::Function { params, .. } => params,
            _ => &[],
        }
    }

    pub fn struct_members(&self, id: TypeId) -> &[TypeId] {
        match self.get(id) {
            TypeDesc::Struct(fields) => fields,
            _ => &[],
        }
    }

    /// The usual arithmetic conversions: two integer classes stay integer
    /// (char only when both sides are char); anything else goes floating.
    pub fn usual_arithmetic_conversions(&self, left: TypeId, right: TypeId) -> TypeId {
        if self.is_integer(left) && self.is_integer(right) {
            if self.is_character(left) && self.is_character(right) {
                Self::CHAR
            } else {
                Self::INT
            }
        } else {
            Self::FLOAT
        }
    }
}

impl Default for TypePool {
    fn default() -> Self {
        Self::new()
    }
}
