// Code generation errors

use smol_str::SmolStr;
use thiserror::Error;

/// Fatal code generation errors. There is no partial-success mode:
/// generation either returns a prototype tree or aborts on the first error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodegenError {
    /// The walker asked for a local it never declared
    #[error("local variable '{0}' is not defined")]
    UndefinedLocal(SmolStr),

    /// AST shape outside the supported subset
    #[error("unsupported construct: {0}")]
    Unsupported(&'static str),
}

/// Result type for code generation
pub type CodegenResult<T> = Result<T, CodegenError>;
