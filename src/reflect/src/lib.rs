//! Reflection of compiled SPIR-V shader modules into the resource
//! description a pipeline-layout builder consumes: the selected entry
//! point and its stage, storage-buffer bindings with tool-assigned slots,
//! the push-constant layout, and the specialized compute workgroup size.
//!
//! ```no_run
//! # let code: Vec<u32> = Vec::new();
//! let reflection = mica_reflect::reflect(Some("main"), &code).unwrap();
//! for binding in reflection.bindings() {
//!     println!("slot {}: {:?}", binding.slot, binding.kind);
//! }
//! ```
//!
//! Each call parses its own module and returns an exclusively owned
//! [`Reflection`]; dropping it releases everything.

mod error;
mod event;
mod reflect;
mod stage;

pub use error::{ReflectError, Result};
pub use event::Event;
pub use reflect::{
    reflect, Binding, MemberRange, PushConstantLayout, Reflection, Reflector,
    ResourceKind, SpecConstantBinding,
};
pub use stage::ShaderStageFlags;

pub use spv::ExecutionModel;
