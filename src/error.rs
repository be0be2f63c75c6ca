//! Error types for the QPU IR analyses

use std::fmt;
use thiserror::Error;

/// Compilation stage that raised an error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompilationStep {
    /// Not bound to a specific stage
    General,
    /// Translating the front-end module into the intermediate representation
    Llvm2Ir,
    /// Normalizing intermediate instructions towards machine instructions
    Normalizer,
    /// Running optimization passes
    Optimizer,
    /// Emitting machine code
    CodeGeneration,
}

impl fmt::Display for CompilationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CompilationStep::General => "General",
            CompilationStep::Llvm2Ir => "LLVM-IR to IR",
            CompilationStep::Normalizer => "Normalizer",
            CompilationStep::Optimizer => "Optimizer",
            CompilationStep::CodeGeneration => "Code Generation",
        };
        f.write_str(name)
    }
}

/// QPU IR analysis errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// An instruction was constructed in a shape its kind does not allow
    ///
    /// **Triggered by:** a memory read or write carrying an entry count other than the literal one
    #[error("[{step}] Invariant violation: {message}: {detail}")]
    InvariantViolation {
        /// Stage that raised the error
        step: CompilationStep,
        /// Error description
        message: String,
        /// Textual form of the offending instruction
        detail: String,
    },

    /// A memory address whose root allocation cannot be established
    ///
    /// **Triggered by:** non-pointer operands, or pointers computed through anything other than
    /// moves and pointer-plus-offset arithmetic
    #[error("[{step}] Provenance failure: {message}: {value}")]
    Provenance {
        /// Stage that raised the error
        step: CompilationStep,
        /// Error description
        message: String,
        /// Textual form of the offending value
        value: String,
    },

    /// A plain local value was required but the operand lives in memory
    #[error("[{step}] Operand needs to be a local value (local, register): {value}")]
    LocalValueRequired {
        /// Stage that raised the error
        step: CompilationStep,
        /// Textual form of the offending value
        value: String,
    },

    /// A statically known single access was required
    #[error("[{step}] Operand needs to be the constant one: {value}")]
    UnitCountRequired {
        /// Stage that raised the error
        step: CompilationStep,
        /// Textual form of the offending entry count
        value: String,
    },

    /// Size of a dynamically sized memory operation was requested
    #[error("[{step}] Cannot calculate type-size from dynamically sized memory-operation: {instruction}")]
    UnsizedType {
        /// Stage that raised the error
        step: CompilationStep,
        /// Textual form of the offending instruction
        instruction: String,
    },

    /// General compilation error
    #[error("[{step}] Compilation error: {message}: {detail}")]
    Compilation {
        /// Stage that raised the error
        step: CompilationStep,
        /// Error description
        message: String,
        /// Textual form of the offending object
        detail: String,
    },

    /// Invalid target configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Worker pool could not be set up
    #[error("Parallel analysis error: {0}")]
    Parallel(String),
}

/// Error severity classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Front-end or caller contract violation, aborts the compilation
    Fatal,
    /// Environment problem that may succeed with different settings
    Recoverable,
}

impl Error {
    /// Create a general compilation error
    pub fn compilation(
        step: CompilationStep,
        message: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Error::Compilation {
            step,
            message: message.into(),
            detail: detail.into(),
        }
    }

    /// Stage that raised this error, if it is bound to one
    pub fn step(&self) -> Option<CompilationStep> {
        match self {
            Error::InvariantViolation { step, .. }
            | Error::Provenance { step, .. }
            | Error::LocalValueRequired { step, .. }
            | Error::UnitCountRequired { step, .. }
            | Error::UnsizedType { step, .. }
            | Error::Compilation { step, .. } => Some(*step),
            Error::Config(_) | Error::Parallel(_) => None,
        }
    }

    /// Classify error severity
    pub fn classify(&self) -> ErrorSeverity {
        match self {
            Error::Config(_) | Error::Parallel(_) => ErrorSeverity::Recoverable,
            _ => ErrorSeverity::Fatal,
        }
    }
}

/// Result type for QPU IR operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_names_stage_and_value() {
        let err = Error::UnitCountRequired {
            step: CompilationStep::Llvm2Ir,
            value: "5 (i32)".to_string(),
        };
        let text = err.to_string();
        assert!(text.contains("LLVM-IR to IR"));
        assert!(text.contains("5 (i32)"));
        assert_eq!(err.step(), Some(CompilationStep::Llvm2Ir));
    }

    #[test]
    fn test_classify() {
        assert_eq!(
            Error::Config("zero".into()).classify(),
            ErrorSeverity::Recoverable
        );
        assert_eq!(
            Error::compilation(CompilationStep::General, "bad", "x").classify(),
            ErrorSeverity::Fatal
        );
    }
}
