use std::fmt;

use log::{debug, trace};

use crate::event::Event;
use crate::stage::{stage_flags, ShaderStageFlags};
use crate::{ReflectError, Result};

/// Reflected description of one shader stage's resource interface.
/// Exclusively owned by the caller; dropping it releases every
/// sub-allocation.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Reflection {
    entry_point: String,
    stage: ShaderStageFlags,
    bindings: Vec<Binding>,
    push_constants: Option<PushConstantLayout>,
    workgroup_size: Option<[SpecConstantBinding; 3]>,
}

impl Reflection {
    /// Name of the entry point the reflection was narrowed to.
    pub fn entry_point(&self) -> &str {
        &self.entry_point
    }

    pub fn stage(&self) -> ShaderStageFlags {
        self.stage
    }

    /// Storage-buffer bindings with slots assigned in declaration order.
    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    /// Absent when the entry point never touches a push-constant block.
    pub fn push_constants(&self) -> Option<&PushConstantLayout> {
        self.push_constants.as_ref()
    }

    /// Specialization map for the workgroup X/Y/Z dimensions; absent for
    /// non-compute stages and for fixed workgroup sizes.
    pub fn workgroup_size(&self) -> Option<&[SpecConstantBinding; 3]> {
        self.workgroup_size.as_ref()
    }
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[non_exhaustive]
pub enum ResourceKind {
    StorageBuffer,
}

/// One descriptor slot. Slots are dense, 0-based, and follow the module's
/// declaration order; decorated (set, binding) pairs are deliberately not
/// honored.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Binding {
    pub slot: u32,
    pub kind: ResourceKind,
    pub stage: ShaderStageFlags,
    /// Debug name of the backing variable, when the module carries one.
    pub name: Option<String>,
}

/// Layout of the push-constant POD payload: the block's active byte range
/// plus per-member offsets and declared sizes.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PushConstantLayout {
    pub offset: u32,
    pub size: u32,
    pub stage: ShaderStageFlags,
    pub members: Vec<MemberRange>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct MemberRange {
    pub offset: u32,
    pub size: u32,
}

/// Map entry for one specialized workgroup dimension; `offset` addresses
/// the dimension's slot in the 12-byte specialization data block.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct SpecConstantBinding {
    pub id: u32,
    pub offset: u32,
    pub size: u32,
}

/// Reflects modules, optionally forwarding diagnostic events to a sink.
#[derive(Default)]
pub struct Reflector<'s> {
    sink: Option<&'s mut dyn FnMut(Event<'_>)>,
}

impl fmt::Debug for Reflector<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reflector")
            .field("sink", &self.sink.is_some())
            .finish()
    }
}

/// Reflects `code` without diagnostics; see [`Reflector::reflect`].
pub fn reflect(entry_point: Option<&str>, code: &[u32]) -> Result<Reflection> {
    Reflector::new().reflect(entry_point, code)
}

impl<'s> Reflector<'s> {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn with_sink(mut self, sink: &'s mut dyn FnMut(Event<'_>)) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Parses `code` and narrows it to `entry_point` (or the sole entry
    /// point when none is requested), then extracts the stage's resource
    /// interface. Deterministic: identical input yields an identical
    /// result.
    pub fn reflect(&mut self, entry_point: Option<&str>, code: &[u32])
        -> Result<Reflection>
    {
        let module = spv::parse_words(&code)?;
        let entry = select_entry_point(&module, entry_point)?;
        let stage = stage_flags(entry.execution_model())?;
        debug!(
            "reflecting entry point {:?} ({:?})",
            entry.name(),
            entry.execution_model(),
        );
        self.emit(Event::EntryPoint {
            name: entry.name(),
            execution_model: entry.execution_model(),
        });

        let active = entry.active_variables();
        let bindings = self.collect_storage_buffers(&active, stage);
        let push_constants =
            self.collect_push_constants(&entry, &active, stage)?;
        let workgroup_size = if stage == ShaderStageFlags::COMPUTE {
            self.collect_workgroup_size(&module)?
        } else {
            None
        };

        Ok(Reflection {
            entry_point: entry.name().to_owned(),
            stage,
            bindings,
            push_constants,
            workgroup_size,
        })
    }

    fn emit(&mut self, event: Event<'_>) {
        if let Some(sink) = self.sink.as_mut() {
            sink(event);
        }
    }

    fn collect_storage_buffers(
        &mut self,
        active: &[spv::Variable<'_>],
        stage: ShaderStageFlags,
    ) -> Vec<Binding> {
        let mut bindings = Vec::new();
        for var in active.iter().filter(|var| var.is_storage_buffer()) {
            let slot = bindings.len() as u32;
            trace!("storage buffer {:?} -> slot {}", var.name(), slot);
            self.emit(Event::StorageBuffer {
                name: var.name(),
                slot,
                set: var.set(),
                binding: var.binding(),
            });
            bindings.push(Binding {
                slot,
                kind: ResourceKind::StorageBuffer,
                stage,
                name: var.name().map(str::to_owned),
            });
        }
        bindings
    }

    fn collect_push_constants<'m>(
        &mut self,
        entry: &spv::EntryPoint<'m>,
        active: &[spv::Variable<'m>],
        stage: ShaderStageFlags,
    ) -> Result<Option<PushConstantLayout>> {
        let mut blocks = active.iter().filter(|var| var.is_push_constant());
        let block_var = match blocks.next() {
            Some(var) => var,
            None => return Ok(None),
        };
        for extra in blocks {
            self.emit(Event::PushConstantSkipped { name: extra.name() });
        }

        // An unused block contributes nothing, whatever its shape.
        let ranges = entry.active_ranges(block_var)?;
        if ranges.is_empty() {
            return Ok(None);
        }

        let block = block_var.resource_type()
            .ok_or(ReflectError::MalformedBinary)?;
        if block.member_count() != Some(1) {
            return Err(ReflectError::InvalidPushConstantShape);
        }
        let pod = match block.member(0) {
            Some(pod) if pod.is_struct() => pod,
            _ => return Err(ReflectError::InvalidPushConstantShape),
        };

        let offset = ranges.iter().map(|r| r.offset).min().unwrap_or(0);
        let end = ranges.iter().map(|r| r.offset + r.range).max().unwrap_or(0);
        let size = end - offset;
        self.emit(Event::PushConstantRange {
            name: block_var.name(),
            offset,
            size,
        });

        let count = pod.member_count().unwrap_or(0) as u32;
        let mut members = Vec::with_capacity(count as usize);
        for index in 0..count {
            let member = MemberRange {
                offset: pod.member_offset(index)?,
                size: pod.member_size(index)?,
            };
            self.emit(Event::PushConstantMember {
                name: pod.member_name(index),
                index,
                offset: member.offset,
                size: member.size,
            });
            members.push(member);
        }

        Ok(Some(PushConstantLayout { offset, size, stage, members }))
    }

    fn collect_workgroup_size(&mut self, module: &spv::Module)
        -> Result<Option<[SpecConstantBinding; 3]>>
    {
        let composite = match module.workgroup_size() {
            Some(composite) => composite,
            // Fixed workgroup sizes live in an execution mode instead.
            None => return Ok(None),
        };
        // A composite of ordinary constants is a fixed size too.
        if !composite.is_spec() {
            return Ok(None);
        }

        let constituents = composite.constituents();
        if constituents.len() != 3 {
            return Err(ReflectError::InvalidWorkgroupSpecialization);
        }

        let mut dimensions = [SpecConstantBinding::default(); 3];
        for (index, &id) in constituents.iter().enumerate() {
            let constant = module.get_constant(id)
                .ok_or(ReflectError::InvalidWorkgroupSpecialization)?;
            let scalar_u32 =
                constant.ty().map_or(false, |ty| ty.is_uint32());
            if !constant.is_spec()
                || !constant.constituents().is_empty()
                || !scalar_u32
            {
                return Err(ReflectError::InvalidWorkgroupSpecialization);
            }
            // Partial tagging leaves a dimension without a SpecId.
            let spec_id = constant.spec_id()
                .ok_or(ReflectError::InvalidWorkgroupSpecialization)?;
            self.emit(Event::SpecConstant { name: constant.name(), spec_id });
            dimensions[index] = SpecConstantBinding {
                id: spec_id,
                offset: index as u32 * 4,
                size: 4,
            };
        }
        Ok(Some(dimensions))
    }
}

fn select_entry_point<'m>(
    module: &'m spv::Module,
    requested: Option<&str>,
) -> Result<spv::EntryPoint<'m>> {
    match requested {
        // A lone entry point answers to no particular name.
        None => {
            let mut entry_points = module.entry_points();
            match (entry_points.next(), entry_points.next()) {
                (Some(entry), None) => Ok(entry),
                _ => Err(ReflectError::EntryPointNotFound),
            }
        },
        Some(name) => module.get_entry_point(&name)
            .ok_or(ReflectError::EntryPointNotFound),
    }
}
