use derive_more::Display;

#[derive(Clone, Copy, Debug, Display, Eq, Hash, PartialEq)]
#[non_exhaustive]
pub enum ReflectError {
    /// The input is not decodable or introspectable as a SPIR-V module.
    #[display(fmt = "malformed SPIR-V binary")]
    MalformedBinary,
    /// The requested (or default) entry point is absent.
    #[display(fmt = "entry point not found")]
    EntryPointNotFound,
    /// The entry point's execution model is outside vertex, fragment, and
    /// compute.
    #[display(fmt = "unsupported execution model")]
    UnsupportedExecutionModel,
    /// The push-constant block is not a single-member struct wrapping the
    /// POD payload.
    #[display(fmt = "invalid push constant shape")]
    InvalidPushConstantShape,
    /// Workgroup-size specialization constants are tagged but are not
    /// exactly three unsigned 32-bit scalars.
    #[display(fmt = "invalid workgroup specialization")]
    InvalidWorkgroupSpecialization,
}

pub type Result<T> = std::result::Result<T, ReflectError>;

impl std::error::Error for ReflectError {}

impl From<spv::Error> for ReflectError {
    fn from(_: spv::Error) -> Self {
        Self::MalformedBinary
    }
}
