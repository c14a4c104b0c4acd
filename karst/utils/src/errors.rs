//! Errors generated while building, evaluating and analyzing models.
use crate::Id;
use thiserror::Error as ThisError;

/// Convinience wrapper to represent success or meaningul karst error.
pub type KarstResult<T> = std::result::Result<T, Error>;

/// Errors generated by karst. The kind is boxed so that results stay small.
pub struct Error {
    kind: Box<ErrorKind>,
    post_msg: Option<String>,
}

/// Standard error type for karst errors.
#[derive(ThisError, Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Name collides with a name reserved by the model.
    #[error("use of reserved name `{0}'")]
    ReservedName(Id),
    /// The same name was registered twice.
    #[error("name `{0}' is already bound by {1}")]
    AlreadyBound(Id, String),
    /// The name is not defined.
    #[error("undefined {1} `{0}'")]
    Undefined(Id, String),
    /// The model, an expression or a statement is structurally invalid.
    #[error("malformed structure: {0}")]
    MalformedStructure(String),
    /// An analysis was invoked on input that violates its assumptions.
    #[error("[{0}] assumption violated: {1}")]
    PassAssumption(String, String),
    /// The requested behavior is a known extension point with no
    /// implementation.
    #[error("unsupported: {0}")]
    Unsupported(String),
    /// Failed to read or parse an input.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Miscellaneous error message
    #[error("{0}")]
    Misc(String),
}

impl Error {
    fn with_kind(kind: ErrorKind) -> Self {
        Self {
            kind: Box::new(kind),
            post_msg: None,
        }
    }

    /// Attach extra context that is printed after the main message.
    pub fn with_post_msg(mut self, msg: Option<String>) -> Self {
        self.post_msg = msg;
        self
    }

    pub fn reserved_name(name: Id) -> Self {
        Self::with_kind(ErrorKind::ReservedName(name))
    }
    pub fn already_bound<S: ToString>(name: Id, bound_by: S) -> Self {
        Self::with_kind(ErrorKind::AlreadyBound(name, bound_by.to_string()))
    }
    pub fn undefined<S: ToString>(name: Id, typ: S) -> Self {
        Self::with_kind(ErrorKind::Undefined(name, typ.to_string()))
    }
    pub fn malformed_structure<S: ToString>(msg: S) -> Self {
        Self::with_kind(ErrorKind::MalformedStructure(msg.to_string()))
    }
    pub fn pass_assumption<S: ToString, M: ToString>(pass: S, msg: M) -> Self {
        Self::with_kind(ErrorKind::PassAssumption(
            pass.to_string(),
            msg.to_string(),
        ))
    }
    pub fn unsupported<S: ToString>(msg: S) -> Self {
        Self::with_kind(ErrorKind::Unsupported(msg.to_string()))
    }
    pub fn invalid_input<S: ToString>(msg: S) -> Self {
        Self::with_kind(ErrorKind::InvalidInput(msg.to_string()))
    }
    pub fn misc<S: ToString>(msg: S) -> Self {
        Self::with_kind(ErrorKind::Misc(msg.to_string()))
    }

    /// The kind of this error.
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// The error message without the post message.
    pub fn message(&self) -> String {
        self.kind.to_string()
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(post) = &self.post_msg {
            write!(f, "\n{post}")?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(self, f)
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::invalid_input(format!("IO Error: {e}"))
    }
}

impl From<std::fmt::Error> for Error {
    fn from(e: std::fmt::Error) -> Self {
        Error::misc(format!("formatting error: {e}"))
    }
}
