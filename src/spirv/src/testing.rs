//! Hand-assembly of SPIR-V word streams, for tests that need modules
//! without shelling out to a shader compiler.

use spirv_headers as spv;

const MAGIC: u32 = 0x0723_0203;
const VERSION_1_3: u32 = 0x0001_0300;

/// Builds the word stream of a module instruction by instruction. Result
/// ids are allocated through [`ModuleAsm::id`] or implicitly by the typed
/// emitters; [`ModuleAsm::assemble`] prepends the header.
#[derive(Debug)]
pub struct ModuleAsm {
    words: Vec<u32>,
    next_id: u32,
}

fn string_words(value: &str) -> Vec<u32> {
    let mut bytes = value.as_bytes().to_vec();
    bytes.push(0);
    while bytes.len() % 4 != 0 {
        bytes.push(0);
    }
    bytes.chunks(4)
        .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

impl ModuleAsm {
    pub fn new() -> Self {
        Self { words: Vec::new(), next_id: 1 }
    }

    /// Reserves a result id for forward references, e.g. the function id
    /// an entry point names before the function is defined.
    pub fn id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn inst(&mut self, op: spv::Op, operands: &[u32]) {
        self.words.push(((operands.len() as u32 + 1) << 16) | op as u32);
        self.words.extend_from_slice(operands);
    }

    pub fn assemble(&self) -> Vec<u32> {
        let mut words = vec![MAGIC, VERSION_1_3, 0, self.next_id, 0];
        words.extend_from_slice(&self.words);
        words
    }

    pub fn capability(&mut self, capability: spv::Capability) {
        self.inst(spv::Op::Capability, &[capability as u32]);
    }

    /// Logical addressing, GLSL450 memory model.
    pub fn memory_model(&mut self) {
        self.inst(spv::Op::MemoryModel, &[0, 1]);
    }

    pub fn entry_point(
        &mut self,
        model: spv::ExecutionModel,
        function: u32,
        name: &str,
        interface: &[u32],
    ) {
        let mut operands = vec![model as u32, function];
        operands.extend(string_words(name));
        operands.extend_from_slice(interface);
        self.inst(spv::Op::EntryPoint, &operands);
    }

    pub fn origin_upper_left(&mut self, function: u32) {
        let mode = spv::ExecutionMode::OriginUpperLeft as u32;
        self.inst(spv::Op::ExecutionMode, &[function, mode]);
    }

    pub fn local_size(&mut self, function: u32, x: u32, y: u32, z: u32) {
        let mode = spv::ExecutionMode::LocalSize as u32;
        self.inst(spv::Op::ExecutionMode, &[function, mode, x, y, z]);
    }

    pub fn name(&mut self, target: u32, name: &str) {
        let mut operands = vec![target];
        operands.extend(string_words(name));
        self.inst(spv::Op::Name, &operands);
    }

    pub fn member_name(&mut self, target: u32, member: u32, name: &str) {
        let mut operands = vec![target, member];
        operands.extend(string_words(name));
        self.inst(spv::Op::MemberName, &operands);
    }

    pub fn decorate(
        &mut self,
        target: u32,
        decoration: spv::Decoration,
        params: &[u32],
    ) {
        let mut operands = vec![target, decoration as u32];
        operands.extend_from_slice(params);
        self.inst(spv::Op::Decorate, &operands);
    }

    pub fn member_decorate(
        &mut self,
        target: u32,
        member: u32,
        decoration: spv::Decoration,
        params: &[u32],
    ) {
        let mut operands = vec![target, member, decoration as u32];
        operands.extend_from_slice(params);
        self.inst(spv::Op::MemberDecorate, &operands);
    }

    pub fn type_void(&mut self) -> u32 {
        let id = self.id();
        self.inst(spv::Op::TypeVoid, &[id]);
        id
    }

    pub fn type_bool(&mut self) -> u32 {
        let id = self.id();
        self.inst(spv::Op::TypeBool, &[id]);
        id
    }

    pub fn type_int(&mut self, width: u32, signed: bool) -> u32 {
        let id = self.id();
        self.inst(spv::Op::TypeInt, &[id, width, signed as u32]);
        id
    }

    pub fn type_float(&mut self, width: u32) -> u32 {
        let id = self.id();
        self.inst(spv::Op::TypeFloat, &[id, width]);
        id
    }

    pub fn type_vector(&mut self, component: u32, count: u32) -> u32 {
        let id = self.id();
        self.inst(spv::Op::TypeVector, &[id, component, count]);
        id
    }

    pub fn type_matrix(&mut self, column: u32, count: u32) -> u32 {
        let id = self.id();
        self.inst(spv::Op::TypeMatrix, &[id, column, count]);
        id
    }

    pub fn type_array(&mut self, element: u32, length: u32) -> u32 {
        let id = self.id();
        self.inst(spv::Op::TypeArray, &[id, element, length]);
        id
    }

    pub fn type_runtime_array(&mut self, element: u32) -> u32 {
        let id = self.id();
        self.inst(spv::Op::TypeRuntimeArray, &[id, element]);
        id
    }

    pub fn type_struct(&mut self, members: &[u32]) -> u32 {
        let id = self.id();
        let mut operands = vec![id];
        operands.extend_from_slice(members);
        self.inst(spv::Op::TypeStruct, &operands);
        id
    }

    pub fn type_pointer(
        &mut self,
        storage_class: spv::StorageClass,
        pointee: u32,
    ) -> u32 {
        let id = self.id();
        self.inst(spv::Op::TypePointer, &[id, storage_class as u32, pointee]);
        id
    }

    pub fn type_function(&mut self, ret: u32, params: &[u32]) -> u32 {
        let id = self.id();
        let mut operands = vec![id, ret];
        operands.extend_from_slice(params);
        self.inst(spv::Op::TypeFunction, &operands);
        id
    }

    pub fn constant_u32(&mut self, ty: u32, value: u32) -> u32 {
        let id = self.id();
        self.inst(spv::Op::Constant, &[ty, id, value]);
        id
    }

    pub fn spec_constant_u32(&mut self, ty: u32, value: u32) -> u32 {
        let id = self.id();
        self.inst(spv::Op::SpecConstant, &[ty, id, value]);
        id
    }

    pub fn constant_composite(&mut self, ty: u32, constituents: &[u32]) -> u32 {
        let id = self.id();
        let mut operands = vec![ty, id];
        operands.extend_from_slice(constituents);
        self.inst(spv::Op::ConstantComposite, &operands);
        id
    }

    pub fn spec_constant_composite(
        &mut self,
        ty: u32,
        constituents: &[u32],
    ) -> u32 {
        let id = self.id();
        let mut operands = vec![ty, id];
        operands.extend_from_slice(constituents);
        self.inst(spv::Op::SpecConstantComposite, &operands);
        id
    }

    pub fn variable(&mut self, ty: u32, storage_class: spv::StorageClass) -> u32 {
        let id = self.id();
        self.inst(spv::Op::Variable, &[ty, id, storage_class as u32]);
        id
    }

    /// Opens the body with a label; the function id must have been
    /// reserved with [`ModuleAsm::id`].
    pub fn begin_function(&mut self, function: u32, ret: u32, fn_ty: u32) {
        self.inst(spv::Op::Function, &[ret, function, 0, fn_ty]);
        let label = self.id();
        self.inst(spv::Op::Label, &[label]);
    }

    pub fn end_function(&mut self) {
        self.inst(spv::Op::Return, &[]);
        self.inst(spv::Op::FunctionEnd, &[]);
    }

    pub fn access_chain(&mut self, ty: u32, base: u32, indices: &[u32]) -> u32 {
        let id = self.id();
        let mut operands = vec![ty, id, base];
        operands.extend_from_slice(indices);
        self.inst(spv::Op::AccessChain, &operands);
        id
    }

    pub fn load(&mut self, ty: u32, pointer: u32) -> u32 {
        let id = self.id();
        self.inst(spv::Op::Load, &[ty, id, pointer]);
        id
    }

    pub fn store(&mut self, pointer: u32, object: u32) {
        self.inst(spv::Op::Store, &[pointer, object]);
    }

    pub fn call(&mut self, ret: u32, function: u32, args: &[u32]) -> u32 {
        let id = self.id();
        let mut operands = vec![ret, id, function];
        operands.extend_from_slice(args);
        self.inst(spv::Op::FunctionCall, &operands);
        id
    }
}
