use fnv::FnvHashSet as HashSet;
use spirv_headers as spv;

use crate::data;
use crate::layout;
use crate::{Error, Id, Module, Result};

macro_rules! indexed_type {
    ($name:ident, $data_name:ident) => {
        #[derive(Clone, Copy, Debug)]
        pub struct $name<'m> {
            module: &'m Module,
            id: Id,
            inner: &'m data::$data_name,
        }

        impl<'m> $name<'m> {
            pub fn module(&self) -> &'m Module {
                self.module
            }

            pub fn id(&self) -> Id {
                self.id
            }

            fn inner(&self) -> &'m data::$data_name {
                self.inner
            }
        }
    };
}

indexed_type!(Variable, VariableDef);
indexed_type!(Type, TypeDef);
indexed_type!(Constant, ConstantDef);

#[derive(Clone, Copy, Debug)]
pub struct EntryPoint<'m> {
    module: &'m Module,
    inner: &'m data::EntryPointDef,
}

/// A byte range of a buffer-backed block referenced by an entry point, at
/// top-level-member granularity.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct BufferRange {
    pub index: u32,
    pub offset: u32,
    pub range: u32,
}

impl Module {
    pub(crate) fn new(version: u32) -> Self {
        Self {
            version,
            entry_points: Default::default(),
            variables: Default::default(),
            variable_order: Default::default(),
            types: Default::default(),
            constants: Default::default(),
            functions: Default::default(),
            decorations: Default::default(),
            member_decorations: Default::default(),
        }
    }

    /// The SPIR-V version as a `(major, minor)` pair.
    pub fn version(&self) -> (u8, u8) {
        (((self.version >> 16) & 0xff) as u8, ((self.version >> 8) & 0xff) as u8)
    }

    pub fn entry_points(&self) ->
        impl ExactSizeIterator<Item = EntryPoint<'_>>
    {
        self.entry_points.iter()
            .map(move |inner| EntryPoint { module: self, inner })
    }

    pub fn get_entry_point<'m>(&'m self, name: &impl AsRef<str>) ->
        Option<EntryPoint<'m>>
    {
        let name = name.as_ref();
        self.entry_points().find(|entry| entry.name() == name)
    }

    pub fn get_variable(&self, id: Id) -> Option<Variable<'_>> {
        let inner = self.variables.get(&id)?;
        Some(Variable { module: self, id, inner })
    }

    pub fn get_type(&self, id: Id) -> Option<Type<'_>> {
        let inner = self.types.get(&id)?;
        Some(Type { module: self, id, inner })
    }

    pub fn get_constant(&self, id: Id) -> Option<Constant<'_>> {
        let inner = self.constants.get(&id)?;
        Some(Constant { module: self, id, inner })
    }

    /// The constant decorated `BuiltIn WorkgroupSize`, if any.
    pub fn workgroup_size(&self) -> Option<Constant<'_>> {
        let (&id, _) = self.decorations.iter().find(|(_, decos)| {
            decos.builtin == Some(spv::BuiltIn::WorkgroupSize)
        })?;
        self.get_constant(id)
    }

    fn name_of(&self, id: Id) -> Option<&str> {
        self.decorations.get(&id)?.name.as_deref()
    }

    fn member_name_of(&self, id: Id, member: u32) -> Option<&str> {
        self.member_decorations.get(&(id, member))?.name.as_deref()
    }
}

impl<'m> EntryPoint<'m> {
    pub fn module(&self) -> &'m Module {
        self.module
    }

    pub fn name(&self) -> &'m str {
        &self.inner.name
    }

    pub fn execution_model(&self) -> spv::ExecutionModel {
        self.inner.execution_model
    }

    /// Global variables reachable from this entry point's call graph, in
    /// module declaration order.
    pub fn active_variables(&self) -> Vec<Variable<'m>> {
        let module = self.module;
        let mut active: HashSet<Id> = Default::default();
        for function in self.reachable_functions() {
            active.extend(function.refs.iter().copied());
        }
        module.variable_order.iter()
            .filter(|id| active.contains(*id))
            .filter_map(move |&id| module.get_variable(id))
            .collect()
    }

    /// Byte ranges of `variable`'s block that this entry point actually
    /// references. Empty when the variable is declared but never touched.
    pub fn active_ranges(&self, variable: &Variable<'m>) ->
        Result<Vec<BufferRange>>
    {
        let block = variable.resource_type().ok_or(Error::InvalidModule)?;
        let count = block.member_count().ok_or(Error::InvalidModule)? as u32;

        let mut touched = vec![false; count as usize];
        let mut full = false;
        for function in self.reachable_functions() {
            for access in function.accesses.iter() {
                if access.base != variable.id() { continue; }
                match access.member {
                    None => full = true,
                    Some(member) if member < count =>
                        touched[member as usize] = true,
                    Some(_) => return Err(Error::InvalidModule),
                }
            }
        }
        if full {
            for slot in touched.iter_mut() { *slot = true; }
        }

        let mut ranges = Vec::new();
        for index in (0..count).filter(|&index| touched[index as usize]) {
            ranges.push(BufferRange {
                index,
                offset: block.member_offset(index)?,
                range: block.member_size(index)?,
            });
        }
        Ok(ranges)
    }

    fn reachable_functions(&self) -> Vec<&'m data::FunctionDef> {
        let mut visited: HashSet<Id> = Default::default();
        let mut queue = vec![self.inner.function];
        let mut functions = Vec::new();
        while let Some(id) = queue.pop() {
            if !visited.insert(id) { continue; }
            if let Some(function) = self.module.functions.get(&id) {
                queue.extend(function.calls.iter().copied());
                functions.push(function);
            }
        }
        functions
    }
}

impl<'m> Variable<'m> {
    pub fn storage_class(&self) -> spv::StorageClass {
        self.inner().storage_class
    }

    pub fn name(&self) -> Option<&'m str> {
        self.module().name_of(self.id())
    }

    pub fn set(&self) -> Option<u32> {
        self.module().decorations.get(&self.id())?.set
    }

    pub fn binding(&self) -> Option<u32> {
        self.module().decorations.get(&self.id())?.binding
    }

    /// The type behind the variable's pointer.
    pub fn resource_type(&self) -> Option<Type<'m>> {
        match *self.module().types.get(&self.inner().ty)? {
            data::TypeDef::Pointer { pointee } => self.module().get_type(pointee),
            _ => None,
        }
    }

    /// Storage buffers appear with the dedicated storage class or, in
    /// older modules, as uniform-class variables whose block struct is
    /// decorated `BufferBlock`.
    pub fn is_storage_buffer(&self) -> bool {
        match self.storage_class() {
            spv::StorageClass::StorageBuffer => true,
            spv::StorageClass::Uniform => self.resource_type()
                .map_or(false, |ty| ty.is_buffer_block()),
            _ => false,
        }
    }

    pub fn is_push_constant(&self) -> bool {
        self.storage_class() == spv::StorageClass::PushConstant
    }
}

impl<'m> Type<'m> {
    pub fn is_struct(&self) -> bool {
        matches!(self.inner(), data::TypeDef::Struct { .. })
    }

    /// True for a 32-bit unsigned integer scalar.
    pub fn is_uint32(&self) -> bool {
        matches!(self.inner(), data::TypeDef::Int { width: 32, signed: false })
    }

    pub fn is_buffer_block(&self) -> bool {
        self.module().decorations.get(&self.id())
            .map_or(false, |decos| decos.buffer_block)
    }

    pub fn member_count(&self) -> Option<usize> {
        match self.inner() {
            data::TypeDef::Struct { members } => Some(members.len()),
            _ => None,
        }
    }

    pub fn member(&self, index: u32) -> Option<Type<'m>> {
        match self.inner() {
            data::TypeDef::Struct { members } =>
                self.module().get_type(*members.get(index as usize)?),
            _ => None,
        }
    }

    pub fn member_name(&self, index: u32) -> Option<&'m str> {
        self.module().member_name_of(self.id(), index)
    }

    pub fn member_offset(&self, index: u32) -> Result<u32> {
        layout::member_offset(self.module(), self.id(), index)
    }

    pub fn member_size(&self, index: u32) -> Result<u32> {
        layout::member_size(self.module(), self.id(), index)
    }

    pub fn declared_size(&self) -> Result<u32> {
        layout::declared_size(self.module(), self.id(), Default::default())
    }
}

impl<'m> Constant<'m> {
    pub fn is_spec(&self) -> bool {
        self.inner().spec
    }

    pub fn value(&self) -> Option<u32> {
        self.inner().value
    }

    pub fn constituents(&self) -> &'m [Id] {
        &self.inner().constituents
    }

    pub fn ty(&self) -> Option<Type<'m>> {
        self.module().get_type(self.inner().ty)
    }

    pub fn spec_id(&self) -> Option<u32> {
        self.module().decorations.get(&self.id())?.spec_id
    }

    pub fn name(&self) -> Option<&'m str> {
        self.module().name_of(self.id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse_words;
    use crate::testing::ModuleAsm;

    // Two entry points, each touching its own storage buffer; `vs_main`
    // reaches its buffer through a helper function.
    fn two_stage_module() -> (Vec<u32>, Id, Id) {
        let mut asm = ModuleAsm::new();
        asm.capability(spv::Capability::Shader);
        asm.memory_model();
        let vs_main = asm.id();
        let fs_main = asm.id();
        asm.entry_point(spv::ExecutionModel::Vertex, vs_main, "vs_main", &[]);
        asm.entry_point(spv::ExecutionModel::Fragment, fs_main, "fs_main", &[]);
        asm.origin_upper_left(fs_main);

        let void = asm.type_void();
        let fn_ty = asm.type_function(void, &[]);
        let uint = asm.type_int(32, false);
        let zero = asm.constant_u32(uint, 0);
        let vs_block = asm.type_struct(&[uint]);
        let fs_block = asm.type_struct(&[uint]);
        asm.member_decorate(vs_block, 0, spv::Decoration::Offset, &[0]);
        asm.member_decorate(fs_block, 0, spv::Decoration::Offset, &[0]);
        let vs_ptr =
            asm.type_pointer(spv::StorageClass::StorageBuffer, vs_block);
        let fs_ptr =
            asm.type_pointer(spv::StorageClass::StorageBuffer, fs_block);
        let elem_ptr = asm.type_pointer(spv::StorageClass::StorageBuffer, uint);
        let vs_buf = asm.variable(vs_ptr, spv::StorageClass::StorageBuffer);
        let fs_buf = asm.variable(fs_ptr, spv::StorageClass::StorageBuffer);

        let helper = asm.id();
        asm.begin_function(helper, void, fn_ty);
        let chain = asm.access_chain(elem_ptr, vs_buf, &[zero]);
        asm.load(uint, chain);
        asm.end_function();

        asm.begin_function(vs_main, void, fn_ty);
        asm.call(void, helper, &[]);
        asm.end_function();

        asm.begin_function(fs_main, void, fn_ty);
        let chain = asm.access_chain(elem_ptr, fs_buf, &[zero]);
        asm.load(uint, chain);
        asm.end_function();

        (asm.assemble(), vs_buf, fs_buf)
    }

    #[test]
    fn narrows_to_the_selected_entry_point() {
        let (words, vs_buf, fs_buf) = two_stage_module();
        let module = parse_words(&words).unwrap();

        let entry = module.get_entry_point(&"fs_main").unwrap();
        let active: Vec<_> = entry.active_variables()
            .iter()
            .map(|var| var.id())
            .collect();
        assert_eq!(active, vec![fs_buf]);

        let entry = module.get_entry_point(&"vs_main").unwrap();
        let active: Vec<_> = entry.active_variables()
            .iter()
            .map(|var| var.id())
            .collect();
        assert_eq!(active, vec![vs_buf]);
    }

    #[test]
    fn ranges_cover_touched_members_only() {
        let mut asm = ModuleAsm::new();
        asm.capability(spv::Capability::Shader);
        asm.memory_model();
        let main = asm.id();
        asm.entry_point(spv::ExecutionModel::GLCompute, main, "main", &[]);
        asm.local_size(main, 1, 1, 1);

        let void = asm.type_void();
        let fn_ty = asm.type_function(void, &[]);
        let uint = asm.type_int(32, false);
        let zero = asm.constant_u32(uint, 0);
        let one = asm.constant_u32(uint, 1);
        let block = asm.type_struct(&[uint, uint]);
        asm.member_decorate(block, 0, spv::Decoration::Offset, &[0]);
        asm.member_decorate(block, 1, spv::Decoration::Offset, &[4]);
        let block_ptr =
            asm.type_pointer(spv::StorageClass::StorageBuffer, block);
        let elem_ptr = asm.type_pointer(spv::StorageClass::StorageBuffer, uint);
        let buf = asm.variable(block_ptr, spv::StorageClass::StorageBuffer);

        asm.begin_function(main, void, fn_ty);
        let chain = asm.access_chain(elem_ptr, buf, &[one]);
        asm.store(chain, zero);
        asm.end_function();

        let module = parse_words(&asm.assemble()).unwrap();
        let entry = module.get_entry_point(&"main").unwrap();
        let var = module.get_variable(buf).unwrap();
        let ranges = entry.active_ranges(&var).unwrap();
        assert_eq!(ranges, vec![BufferRange { index: 1, offset: 4, range: 4 }]);
    }
}
