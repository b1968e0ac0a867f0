//! DOM Errors
//!
//! Exceptions raised synchronously by tree, attribute and registry operations,
//! plus the error type callbacks hand back to the engine.

/// Result type for DOM operations
pub type DomResult<T> = Result<T, DomError>;

/// DOM operation errors
///
/// Each variant corresponds to a `DOMException` name (see [`DomError::name`]).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomError {
    /// Cyclic insertion, wrong parent kind or document arity violation
    #[error("Hierarchy request error: {0}")]
    HierarchyRequest(&'static str),

    /// Node or reference child is not where the caller said it is
    #[error("Not found: {0}")]
    NotFound(&'static str),

    /// Operation on a node in the wrong state (e.g. template content on a non-template)
    #[error("Invalid state: {0}")]
    InvalidState(&'static str),

    /// Malformed name
    #[error("Syntax error: {0:?} is not a valid name")]
    Syntax(String),

    /// Prefix and namespace do not agree
    #[error("Namespace error: {0}")]
    Namespace(String),

    /// Registry refused the operation
    #[error("Not supported: {0}")]
    NotSupported(String),

    /// Character data offset past the end
    #[error("Index size error: offset {offset} exceeds length {length}")]
    IndexSize { offset: usize, length: usize },

    /// Option dictionary that cannot be satisfied
    #[error("Type error: {0}")]
    Type(&'static str),
}

impl DomError {
    /// The `DOMException` name this error maps to
    pub fn name(&self) -> &'static str {
        match self {
            Self::HierarchyRequest(_) => "HierarchyRequestError",
            Self::NotFound(_) => "NotFoundError",
            Self::InvalidState(_) => "InvalidStateError",
            Self::Syntax(_) => "SyntaxError",
            Self::Namespace(_) => "NamespaceError",
            Self::NotSupported(_) => "NotSupportedError",
            Self::IndexSize { .. } => "IndexSizeError",
            Self::Type(_) => "TypeError",
        }
    }
}

/// Failure raised inside a custom element constructor, lifecycle callback,
/// mutation observer callback or microtask.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScriptError {
    /// The callback threw
    #[error("uncaught exception: {0}")]
    Thrown(String),

    /// A DOM operation made by the callback failed and was not caught
    #[error(transparent)]
    Dom(#[from] DomError),
}

impl ScriptError {
    pub fn thrown(message: impl Into<String>) -> Self {
        Self::Thrown(message.into())
    }
}

/// Receives failures that must not propagate to the code that triggered them.
///
/// Reactions and observer deliveries isolate each callback: the error is
/// reported here and the remaining callbacks in the batch still run.
pub trait ErrorReporter {
    fn report(&self, error: &ScriptError);
}

/// Default reporter, logs through `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingErrorReporter;

impl ErrorReporter for TracingErrorReporter {
    fn report(&self, error: &ScriptError) {
        tracing::error!("Uncaught error in callback: {}", error);
    }
}
