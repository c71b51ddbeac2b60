//! Library-wide error and result types.

/// Errors surfaced by the scripting pipeline and the valuation engines.
///
/// Every stage fails fast: parsing aborts the product build, semantic errors
/// abort preprocessing, and the engines validate their inputs up front.
/// Evaluation itself is total: division by zero and out-of-domain math
/// follow IEEE floating-point rules and never raise.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptError {
    /// Malformed script text; `pos` is a byte offset into the event source.
    Parse { message: String, pos: usize },
    /// Call to a function name the language does not define.
    UnknownFunction { name: String, pos: usize },
    /// Known function called with the wrong number of arguments.
    Arity { name: String, got: usize, pos: usize },
    /// Semantic error found by domain analysis (e.g. SMOOTH on a discrete
    /// condition expression).
    Domain(String),
    /// First event date precedes the valuation date.
    EventInPast,
    /// The product has no events.
    EmptyProduct,
    /// Parallel valuation requested on a random generator that cannot
    /// partition its stream.
    NotSkippable,
    /// Input validation error (engine misuse, missing preprocessing).
    Invalid(String),
}

impl std::fmt::Display for ScriptError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse { message, pos } => write!(f, "parse error at {pos}: {message}"),
            Self::UnknownFunction { name, pos } => {
                write!(f, "unknown function '{name}' at {pos}")
            }
            Self::Arity { name, got, pos } => {
                write!(f, "function '{name}' at {pos}: wrong number of arguments ({got})")
            }
            Self::Domain(msg) => write!(f, "domain error: {msg}"),
            Self::EventInPast => write!(f, "events in the past are disallowed"),
            Self::EmptyProduct => write!(f, "product has no events"),
            Self::NotSkippable => {
                write!(f, "random generator cannot be used for parallel simulations")
            }
            Self::Invalid(msg) => write!(f, "invalid input: {msg}"),
        }
    }
}

impl std::error::Error for ScriptError {}

/// Shorthand used across the crate.
pub type ScriptResult<T> = Result<T, ScriptError>;
