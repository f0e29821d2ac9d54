use thiserror::Error;

/// Errors raised while evaluating a program. All of them are fatal to the
/// run; the evaluator performs no recovery.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    #[error("Not field {name}")]
    UndefinedName { name: String },
    #[error("Not a class instance")]
    NotAnInstance,
    #[error("No method {method}")]
    UnknownMethod { method: String },
    #[error("The operator is not overloaded {operator}")]
    UnsupportedOperation { operator: char },
    #[error("The denominator is zero")]
    DivisionByZero,
    #[error("Cannot compare objects for {operation}")]
    IncomparableTypes { operation: &'static str },
    #[error("Output stream failure: {message}")]
    OutputStream { message: String },
}
