use spv::ExecutionModel;

/// Diagnostic events delivered to the sink passed to
/// [`crate::Reflector::with_sink`]. The payloads mirror what a pipeline
/// author wants to see while debugging a binding mismatch: names as
/// written in the shader source, decorated set/binding pairs, and the
/// computed layout numbers.
#[derive(Clone, Copy, Debug, PartialEq)]
#[non_exhaustive]
pub enum Event<'a> {
    EntryPoint {
        name: &'a str,
        execution_model: ExecutionModel,
    },
    StorageBuffer {
        name: Option<&'a str>,
        slot: u32,
        set: Option<u32>,
        binding: Option<u32>,
    },
    PushConstantRange {
        name: Option<&'a str>,
        offset: u32,
        size: u32,
    },
    PushConstantMember {
        name: Option<&'a str>,
        index: u32,
        offset: u32,
        size: u32,
    },
    /// Push-constant blocks beyond the first are not reflected.
    PushConstantSkipped {
        name: Option<&'a str>,
    },
    SpecConstant {
        name: Option<&'a str>,
        spec_id: u32,
    },
}
