//! Introspection of compiled SPIR-V modules.
//!
//! [`parse_words`] decodes a word stream into a [`Module`] holding the
//! tables reflection cares about: entry points, global variables in
//! declaration order, the type graph, constants, decorations, and
//! per-function access sets. The view layer over [`Module`] answers the
//! questions a pipeline-layout builder asks — which globals an entry point
//! actually reaches, which byte ranges of a block it touches, and what the
//! declared layout of a struct member is.

use spirv_headers as spv;

mod build;
mod data;
mod error;
mod layout;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
mod view;

pub use build::{parse_bytes, parse_words};
pub use data::Module;
pub use error::{Error, Result};
pub use view::*;

pub use spv::BuiltIn;
pub use spv::Capability;
pub use spv::Decoration;
pub use spv::ExecutionModel;
pub use spv::StorageClass;

/// Ids a module assigns to its types, constants, variables, and functions.
pub type Id = u32;
