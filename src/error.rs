//! Error taxonomy shared by the load pipeline and the draw path.

/// Convenience result type used across the crate.
pub type RivResult<T> = Result<T, RivError>;

/// Top-level error taxonomy.
///
/// Errors are `Clone` because a single load failure is delivered to every
/// subscriber of that load cycle.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum RivError {
    /// Malformed viewbox string or other static misconfiguration.
    #[error("config error: {0}")]
    Config(String),

    /// Asset fetch or decode failure.
    #[error("load error: {0}")]
    Load(String),

    /// Engine bootstrap failure, or the engine is unavailable after waiting.
    #[error("runtime error: {0}")]
    Runtime(String),

    /// An operation was invoked before its preconditions were met.
    #[error(transparent)]
    State(#[from] StateError),
}

impl RivError {
    /// Build a [`RivError::Config`] value.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Build a [`RivError::Load`] value.
    pub fn load(msg: impl Into<String>) -> Self {
        Self::Load(msg.into())
    }

    /// Build a [`RivError::Runtime`] value.
    pub fn runtime(msg: impl Into<String>) -> Self {
        Self::Runtime(msg.into())
    }
}

/// Unmet precondition reported by [`RivError::State`].
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateError {
    #[error("state error: runtime is not loaded")]
    MissingRuntime,
    #[error("state error: no artboard is selected")]
    MissingArtboard,
    #[error("state error: no renderer is bound to the surface")]
    MissingRenderer,
    /// The controller was torn down before the load cycle settled.
    #[error("state error: controller was torn down")]
    TornDown,
}
