use crate::data::{Module, TypeDef};
use crate::{Error, Id, Result};

// Layout context a struct member inherits from its enclosing struct's
// member decorations.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct MemberCtx {
    pub(crate) matrix_stride: Option<u32>,
}

pub(crate) fn member_offset(module: &Module, struct_id: Id, index: u32)
    -> Result<u32>
{
    module.member_decorations.get(&(struct_id, index))
        .and_then(|decos| decos.offset)
        .ok_or(Error::UnsupportedModule)
}

pub(crate) fn member_size(module: &Module, struct_id: Id, index: u32)
    -> Result<u32>
{
    let members = match module.types.get(&struct_id) {
        Some(TypeDef::Struct { members }) => members,
        _ => return Err(Error::InvalidModule),
    };
    let ty = *members.get(index as usize).ok_or(Error::InvalidModule)?;
    let ctx = MemberCtx {
        matrix_stride: module.member_decorations.get(&(struct_id, index))
            .and_then(|decos| decos.matrix_stride),
    };
    declared_size(module, ty, ctx)
}

/// The declared extent of a type under the layout its decorations pin
/// down: scalars and vectors are tight, matrices span stride × columns,
/// arrays span stride × length, structs extend to their furthest member
/// end.
pub(crate) fn declared_size(module: &Module, ty: Id, ctx: MemberCtx)
    -> Result<u32>
{
    let def = module.types.get(&ty).ok_or(Error::InvalidModule)?;
    Ok(match *def {
        TypeDef::Bool | TypeDef::Pointer { .. } =>
            return Err(Error::UnsupportedModule),
        TypeDef::Int { width, .. } | TypeDef::Float { width } => width / 8,
        TypeDef::Vector { component, count } =>
            count * declared_size(module, component, Default::default())?,
        TypeDef::Matrix { column, count } => {
            let stride = match ctx.matrix_stride {
                Some(stride) => stride,
                None => declared_size(module, column, Default::default())?,
            };
            count * stride
        },
        TypeDef::Array { element, length } => {
            let length = module.constants.get(&length)
                .and_then(|constant| constant.value)
                .ok_or(Error::InvalidModule)?;
            let stride = match module.decorations.get(&ty)
                .and_then(|decos| decos.array_stride)
            {
                Some(stride) => stride,
                None => declared_size(module, element, Default::default())?,
            };
            length * stride
        },
        TypeDef::RuntimeArray { .. } => 0,
        TypeDef::Struct { ref members } => {
            let mut size = 0;
            for index in 0..members.len() as u32 {
                let end = member_offset(module, ty, index)?
                    + member_size(module, ty, index)?;
                size = size.max(end);
            }
            size
        },
    })
}
