use fnv::FnvHashMap;
use rspirv::binary::{Consumer, ParseAction};
use rspirv::{self, dr};
use spirv_headers as spv;

use crate::data::{self, Access, Module};
use crate::{Error, Id, Result};

#[derive(Debug)]
struct RawModule {
    header: dr::ModuleHeader,
    instructions: Vec<dr::Instruction>,
}

impl RawModule {
    fn new() -> Self {
        Self {
            header: dr::ModuleHeader::new(0),
            instructions: Default::default(),
        }
    }

    #[inline]
    fn occurrences(&self, opcode: spv::Op) ->
        impl Iterator<Item = &dr::Instruction> + '_
    {
        self.instructions.iter()
            .filter(move |inst| inst.class.opcode == opcode)
    }
}

impl Consumer for RawModule {
    fn initialize(&mut self) -> ParseAction {
        ParseAction::Continue
    }

    fn finalize(&mut self) -> ParseAction {
        ParseAction::Continue
    }

    fn consume_header(&mut self, header: dr::ModuleHeader) -> ParseAction {
        self.instructions.reserve(header.bound as usize);
        self.header = header;
        ParseAction::Continue
    }

    fn consume_instruction(&mut self, inst: dr::Instruction) -> ParseAction {
        self.instructions.push(inst);
        ParseAction::Continue
    }
}

macro_rules! get_operand_variant {
    ($operand:expr, $variant:ident) => {
        match $operand {
            dr::Operand::$variant(ref val) => val.clone(),
            _ => panic!(concat!("expected ", stringify!($variant))),
        }
    }
}

macro_rules! parse_operand {
    ($operands:expr, $variant:ident) => {
        get_operand_variant!($operands.next().unwrap(), $variant)
    };
    ($operands:expr, $variant:ident*) => {
        $operands.map(|operand| get_operand_variant!(operand, $variant))
            .collect::<Vec<_>>()
    };
}

fn raise_module(raw: &RawModule) -> Result<Module> {
    let mut module = Module::new(raw.header.version);
    build_decoration_sets(&mut module, raw);
    raise_globals(&mut module, raw)?;
    raise_entry_points(&mut module, raw)?;
    raise_functions(&mut module, raw)?;
    Ok(module)
}

fn build_decoration_sets(module: &mut Module, raw: &RawModule) {
    for inst in raw.instructions.iter() {
        let operands = &inst.operands;
        match inst.class.opcode {
            spv::Op::Decorate => apply_decoration(module, operands),
            spv::Op::MemberDecorate => apply_member_decoration(module, operands),
            spv::Op::Name => apply_name(module, operands),
            spv::Op::MemberName => apply_member_name(module, operands),
            _ => {},
        }
    }
}

fn apply_decoration(module: &mut Module, operands: &[dr::Operand]) {
    let mut ops = operands.iter();
    let target = parse_operand!(ops, IdRef);
    let decoration = parse_operand!(ops, Decoration);
    let decos = module.decorations.entry(target).or_default();
    match decoration {
        spv::Decoration::DescriptorSet => {
            decos.set = Some(parse_operand!(ops, LiteralInt32));
        },
        spv::Decoration::Binding => {
            decos.binding = Some(parse_operand!(ops, LiteralInt32));
        },
        spv::Decoration::SpecId => {
            decos.spec_id = Some(parse_operand!(ops, LiteralInt32));
        },
        spv::Decoration::ArrayStride => {
            decos.array_stride = Some(parse_operand!(ops, LiteralInt32));
        },
        spv::Decoration::BuiltIn => {
            decos.builtin = Some(parse_operand!(ops, BuiltIn));
        },
        spv::Decoration::BufferBlock => decos.buffer_block = true,
        _ => {},
    }
}

fn apply_member_decoration(module: &mut Module, operands: &[dr::Operand]) {
    let mut ops = operands.iter();
    let target = parse_operand!(ops, IdRef);
    let member = parse_operand!(ops, LiteralInt32);
    let decoration = parse_operand!(ops, Decoration);
    let decos = module.member_decorations.entry((target, member)).or_default();
    match decoration {
        spv::Decoration::Offset => {
            decos.offset = Some(parse_operand!(ops, LiteralInt32));
        },
        spv::Decoration::MatrixStride => {
            decos.matrix_stride = Some(parse_operand!(ops, LiteralInt32));
        },
        _ => {},
    }
}

fn apply_name(module: &mut Module, operands: &[dr::Operand]) {
    let mut ops = operands.iter();
    let target = parse_operand!(ops, IdRef);
    let name = parse_operand!(ops, LiteralString);
    module.decorations.entry(target).or_default().name = Some(name);
}

fn apply_member_name(module: &mut Module, operands: &[dr::Operand]) {
    let mut ops = operands.iter();
    let target = parse_operand!(ops, IdRef);
    let member = parse_operand!(ops, LiteralInt32);
    let name = parse_operand!(ops, LiteralString);
    module.member_decorations.entry((target, member)).or_default().name =
        Some(name);
}

// Types, constants, and global variables, in one ordered pass; SPIR-V
// guarantees definitions precede uses among them.
fn raise_globals(module: &mut Module, raw: &RawModule) -> Result<()> {
    for inst in raw.instructions.iter() {
        match inst.class.opcode {
            spv::Op::TypeBool
                | spv::Op::TypeInt
                | spv::Op::TypeFloat
                | spv::Op::TypeVector
                | spv::Op::TypeMatrix
                | spv::Op::TypeArray
                | spv::Op::TypeRuntimeArray
                | spv::Op::TypeStruct
                | spv::Op::TypePointer => raise_type(module, inst)?,
            spv::Op::Constant
                | spv::Op::SpecConstant
                | spv::Op::ConstantTrue
                | spv::Op::ConstantFalse
                | spv::Op::SpecConstantTrue
                | spv::Op::SpecConstantFalse
                | spv::Op::ConstantComposite
                | spv::Op::SpecConstantComposite => raise_constant(module, inst)?,
            spv::Op::Variable => raise_variable(module, inst)?,
            _ => {},
        }
    }
    Ok(())
}

fn raise_type(module: &mut Module, inst: &dr::Instruction) -> Result<()> {
    let id = inst.result_id.ok_or(Error::InvalidModule)?;
    let mut ops = inst.operands.iter();
    let def = match inst.class.opcode {
        spv::Op::TypeBool => data::TypeDef::Bool,
        spv::Op::TypeInt => data::TypeDef::Int {
            width: parse_operand!(ops, LiteralInt32),
            signed: parse_operand!(ops, LiteralInt32) != 0,
        },
        spv::Op::TypeFloat => data::TypeDef::Float {
            width: parse_operand!(ops, LiteralInt32),
        },
        spv::Op::TypeVector => data::TypeDef::Vector {
            component: parse_operand!(ops, IdRef),
            count: parse_operand!(ops, LiteralInt32),
        },
        spv::Op::TypeMatrix => data::TypeDef::Matrix {
            column: parse_operand!(ops, IdRef),
            count: parse_operand!(ops, LiteralInt32),
        },
        spv::Op::TypeArray => data::TypeDef::Array {
            element: parse_operand!(ops, IdRef),
            length: parse_operand!(ops, IdRef),
        },
        spv::Op::TypeRuntimeArray => data::TypeDef::RuntimeArray {
            element: parse_operand!(ops, IdRef),
        },
        spv::Op::TypeStruct => data::TypeDef::Struct {
            members: parse_operand!(ops, IdRef*),
        },
        spv::Op::TypePointer => {
            let _storage_class = parse_operand!(ops, StorageClass);
            data::TypeDef::Pointer { pointee: parse_operand!(ops, IdRef) }
        },
        _ => unreachable!(),
    };
    module.types.insert(id, def);
    Ok(())
}

fn raise_constant(module: &mut Module, inst: &dr::Instruction) -> Result<()> {
    let id = inst.result_id.ok_or(Error::InvalidModule)?;
    let ty = inst.result_type.ok_or(Error::InvalidModule)?;
    let spec = matches!(
        inst.class.opcode,
        spv::Op::SpecConstant
            | spv::Op::SpecConstantTrue
            | spv::Op::SpecConstantFalse
            | spv::Op::SpecConstantComposite
    );
    let mut value = None;
    let mut constituents = Vec::new();
    match inst.class.opcode {
        spv::Op::ConstantTrue | spv::Op::SpecConstantTrue => value = Some(1),
        spv::Op::ConstantFalse | spv::Op::SpecConstantFalse => value = Some(0),
        spv::Op::ConstantComposite | spv::Op::SpecConstantComposite => {
            let mut ops = inst.operands.iter();
            constituents = parse_operand!(ops, IdRef*);
        },
        // Wider and floating-point literals are kept opaque.
        _ => if let Some(&dr::Operand::LiteralInt32(val)) = inst.operands.first() {
            value = Some(val);
        },
    }
    let def = data::ConstantDef { ty, spec, value, constituents };
    module.constants.insert(id, def);
    Ok(())
}

fn raise_variable(module: &mut Module, inst: &dr::Instruction) -> Result<()> {
    let mut ops = inst.operands.iter();
    let storage_class = parse_operand!(ops, StorageClass);
    // Function-local variables are not part of the global interface.
    if storage_class == spv::StorageClass::Function { return Ok(()); }

    let id = inst.result_id.ok_or(Error::InvalidModule)?;
    let ty = inst.result_type.ok_or(Error::InvalidModule)?;
    module.variables.insert(id, data::VariableDef { ty, storage_class });
    module.variable_order.push(id);
    Ok(())
}

fn raise_entry_points(module: &mut Module, raw: &RawModule) -> Result<()> {
    for inst in raw.occurrences(spv::Op::EntryPoint) {
        let mut ops = inst.operands.iter();
        let execution_model = parse_operand!(ops, ExecutionModel);
        let function = parse_operand!(ops, IdRef);
        let name = parse_operand!(ops, LiteralString);
        // The trailing interface ids are ignored; the active interface is
        // recomputed from the call graph, which also covers buffer-backed
        // globals that pre-1.4 modules leave out of the interface list.
        module.entry_points.push(data::EntryPointDef {
            execution_model,
            function,
            name,
        });
    }
    Ok(())
}

fn raise_functions(module: &mut Module, raw: &RawModule) -> Result<()> {
    let mut chains: FnvHashMap<Id, Access> = Default::default();
    let mut current = None;
    for inst in raw.instructions.iter() {
        match inst.class.opcode {
            spv::Op::Function => {
                let id = inst.result_id.ok_or(Error::InvalidModule)?;
                module.functions.insert(id, Default::default());
                current = Some(id);
            },
            spv::Op::FunctionEnd => current = None,
            opcode => {
                let id = match current {
                    Some(id) => id,
                    None => continue,
                };
                let Module { functions, variables, constants, .. } = module;
                let func = functions.get_mut(&id).ok_or(Error::InvalidModule)?;

                for operand in inst.operands.iter() {
                    if let dr::Operand::IdRef(id) = *operand {
                        if variables.contains_key(&id) {
                            func.refs.insert(id);
                        }
                    }
                }

                match opcode {
                    spv::Op::FunctionCall => {
                        let mut ops = inst.operands.iter();
                        if let Some(&dr::Operand::IdRef(callee)) = ops.next() {
                            func.calls.push(callee);
                        }
                        // A whole block passed as an argument counts as a
                        // full access.
                        for operand in ops {
                            if let dr::Operand::IdRef(id) = *operand {
                                if variables.contains_key(&id) {
                                    func.accesses.push(Access {
                                        base: id,
                                        member: None,
                                    });
                                }
                            }
                        }
                    },
                    spv::Op::AccessChain | spv::Op::InBoundsAccessChain => {
                        let result =
                            inst.result_id.ok_or(Error::InvalidModule)?;
                        let base = match inst.operands.first() {
                            Some(&dr::Operand::IdRef(base)) => base,
                            _ => return Err(Error::InvalidModule),
                        };
                        let access = if let Some(&access) = chains.get(&base) {
                            // Deeper chains never widen the top-level range.
                            access
                        } else if variables.contains_key(&base) {
                            let member = match inst.operands.get(1) {
                                Some(&dr::Operand::IdRef(index)) => constants
                                    .get(&index)
                                    .and_then(|constant| constant.value),
                                _ => None,
                            };
                            Access { base, member }
                        } else {
                            continue;
                        };
                        chains.insert(result, access);
                        func.accesses.push(access);
                    },
                    spv::Op::Load | spv::Op::Store | spv::Op::CopyMemory => {
                        for operand in inst.operands.iter() {
                            if let dr::Operand::IdRef(id) = *operand {
                                if variables.contains_key(&id) {
                                    func.accesses.push(Access {
                                        base: id,
                                        member: None,
                                    });
                                }
                            }
                        }
                    },
                    _ => {},
                }
            },
        }
    }
    Ok(())
}

pub fn parse_words(words: &impl AsRef<[u32]>) -> Result<Module> {
    let mut raw = RawModule::new();
    rspirv::binary::parse_words(words, &mut raw)
        .map_err(|_| Error::InvalidModule)?;
    raise_module(&raw)
}

pub fn parse_bytes(bytes: &impl AsRef<[u8]>) -> Result<Module> {
    let mut raw = RawModule::new();
    rspirv::binary::parse_bytes(bytes, &mut raw)
        .map_err(|_| Error::InvalidModule)?;
    raise_module(&raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ModuleAsm;

    fn trivial_vertex() -> ModuleAsm {
        let mut asm = ModuleAsm::new();
        asm.capability(spv::Capability::Shader);
        asm.memory_model();
        let main = asm.id();
        asm.entry_point(spv::ExecutionModel::Vertex, main, "main", &[]);
        let void = asm.type_void();
        let fn_ty = asm.type_function(void, &[]);
        asm.begin_function(main, void, fn_ty);
        asm.end_function();
        asm
    }

    #[test]
    fn parses_header_and_entry_point() {
        let module = parse_words(&trivial_vertex().assemble()).unwrap();
        assert_eq!(module.version(), (1, 3));
        assert_eq!(module.entry_points().len(), 1);
        let entry = module.get_entry_point(&"main").unwrap();
        assert_eq!(entry.execution_model(), spv::ExecutionModel::Vertex);
        assert_eq!(entry.name(), "main");
    }

    #[test]
    fn parses_byte_buffers() {
        let bytes: Vec<u8> = trivial_vertex().assemble()
            .iter()
            .flat_map(|word| word.to_ne_bytes().to_vec())
            .collect();
        let module = parse_bytes(&bytes).unwrap();
        assert_eq!(module.entry_points().len(), 1);
    }

    #[test]
    fn rejects_bad_magic() {
        let mut words = trivial_vertex().assemble();
        words[0] = 0xdead_beef;
        assert_eq!(parse_words(&words).err(), Some(Error::InvalidModule));
    }

    #[test]
    fn rejects_truncated_stream() {
        let mut words = trivial_vertex().assemble();
        words.pop();
        assert_eq!(parse_words(&words).err(), Some(Error::InvalidModule));
    }

    #[test]
    fn raises_globals_in_declaration_order() {
        let mut asm = ModuleAsm::new();
        asm.capability(spv::Capability::Shader);
        asm.memory_model();
        let main = asm.id();
        asm.entry_point(spv::ExecutionModel::Fragment, main, "main", &[]);
        asm.origin_upper_left(main);

        let void = asm.type_void();
        let fn_ty = asm.type_function(void, &[]);
        let uint = asm.type_int(32, false);
        let first_block = asm.type_struct(&[uint]);
        let second_block = asm.type_struct(&[uint]);
        let first_ptr =
            asm.type_pointer(spv::StorageClass::StorageBuffer, first_block);
        let second_ptr =
            asm.type_pointer(spv::StorageClass::StorageBuffer, second_block);
        let first = asm.variable(first_ptr, spv::StorageClass::StorageBuffer);
        let second = asm.variable(second_ptr, spv::StorageClass::StorageBuffer);
        asm.name(first, "first");
        asm.name(second, "second");

        asm.begin_function(main, void, fn_ty);
        asm.end_function();

        let module = parse_words(&asm.assemble()).unwrap();
        assert_eq!(module.variable_order, vec![first, second]);
        assert_eq!(module.get_variable(first).unwrap().name(), Some("first"));
        assert_eq!(
            module.get_variable(second).unwrap().storage_class(),
            spv::StorageClass::StorageBuffer,
        );
    }
}
