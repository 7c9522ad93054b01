use derive_more::Display;

#[derive(Clone, Copy, Debug, Display, Eq, Hash, PartialEq)]
#[non_exhaustive]
pub enum Error {
    /// The word stream is not a valid SPIR-V module.
    #[display(fmt = "invalid module")]
    InvalidModule,
    /// The module is valid but cannot be introspected, e.g. block members
    /// without layout decorations.
    #[display(fmt = "unsupported module")]
    UnsupportedModule,
}

pub type Result<T> = std::result::Result<T, Error>;

impl std::error::Error for Error {}
