use fnv::{FnvHashMap as HashMap, FnvHashSet as HashSet};
use spirv_headers as spv;

use crate::Id;

/// Decoded representation of one SPIR-V module. Owns every table built
/// from the instruction stream; construction goes through
/// [`crate::parse_words`].
#[derive(Debug)]
pub struct Module {
    // The raw version word from the module header.
    pub(crate) version: u32,
    pub(crate) entry_points: Vec<EntryPointDef>,
    pub(crate) variables: HashMap<Id, VariableDef>,
    // Global variables in module declaration order.
    pub(crate) variable_order: Vec<Id>,
    pub(crate) types: HashMap<Id, TypeDef>,
    pub(crate) constants: HashMap<Id, ConstantDef>,
    pub(crate) functions: HashMap<Id, FunctionDef>,
    pub(crate) decorations: HashMap<Id, DecorationSet>,
    pub(crate) member_decorations: HashMap<(Id, u32), MemberDecorationSet>,
}

#[derive(Debug, Default)]
pub(crate) struct DecorationSet {
    pub(crate) name: Option<String>,
    pub(crate) set: Option<u32>,
    pub(crate) binding: Option<u32>,
    pub(crate) spec_id: Option<u32>,
    pub(crate) builtin: Option<spv::BuiltIn>,
    pub(crate) array_stride: Option<u32>,
    pub(crate) buffer_block: bool,
}

#[derive(Debug, Default)]
pub(crate) struct MemberDecorationSet {
    pub(crate) name: Option<String>,
    pub(crate) offset: Option<u32>,
    pub(crate) matrix_stride: Option<u32>,
}

#[derive(Debug)]
pub(crate) struct EntryPointDef {
    pub(crate) execution_model: spv::ExecutionModel,
    pub(crate) function: Id,
    pub(crate) name: String,
}

#[derive(Debug)]
pub(crate) struct VariableDef {
    // The variable's pointer type.
    pub(crate) ty: Id,
    pub(crate) storage_class: spv::StorageClass,
}

// Types outside the buffer data model (images, samplers, opaques) are not
// raised; queries against them simply come back empty.
#[derive(Debug)]
pub(crate) enum TypeDef {
    Bool,
    Int { width: u32, signed: bool },
    Float { width: u32 },
    Vector { component: Id, count: u32 },
    Matrix { column: Id, count: u32 },
    Array { element: Id, length: Id },
    RuntimeArray { element: Id },
    Struct { members: Vec<Id> },
    Pointer { pointee: Id },
}

#[derive(Debug)]
pub(crate) struct ConstantDef {
    pub(crate) ty: Id,
    pub(crate) spec: bool,
    // Literal value of 32-bit scalar constants.
    pub(crate) value: Option<u32>,
    // Constituent ids of composite constants.
    pub(crate) constituents: Vec<Id>,
}

#[derive(Debug, Default)]
pub(crate) struct FunctionDef {
    // Global variables referenced anywhere in the body.
    pub(crate) refs: HashSet<Id>,
    pub(crate) calls: Vec<Id>,
    pub(crate) accesses: Vec<Access>,
}

/// A body-level access of a global variable at top-level-member
/// granularity.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Access {
    pub(crate) base: Id,
    /// `None` when the whole variable is read or written.
    pub(crate) member: Option<u32>,
}
