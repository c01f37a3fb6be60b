use alloc::borrow::Cow;

use core::fmt;

/// All possible error kinds.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// An item could not be created from a provisioning descriptor.
    Provisioning,
    /// A message was dropped because the transport session is down.
    TransportUnavailable,
    /// An inbound payload is not a structured document.
    MalformedMessage,
    /// Persistent storage could not be read or written.
    Storage,
    /// A configuration value is invalid.
    Config,
}

impl ErrorKind {
    pub(crate) const fn description(self) -> &'static str {
        match self {
            Self::Provisioning => "Provisioning",
            Self::TransportUnavailable => "Transport Unavailable",
            Self::MalformedMessage => "Malformed Message",
            Self::Storage => "Storage",
            Self::Config => "Configuration",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.description().fmt(f)
    }
}

/// A node error.
#[derive(Debug, PartialEq, Eq)]
pub struct Error {
    kind: ErrorKind,
    description: Cow<'static, str>,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.description)
    }
}

impl core::error::Error for Error {}

impl Error {
    /// Creates an [`Error`] from an [`ErrorKind`] and a description.
    #[must_use]
    pub fn new(kind: ErrorKind, description: impl Into<Cow<'static, str>>) -> Self {
        Self {
            kind,
            description: description.into(),
        }
    }

    /// Returns the [`ErrorKind`].
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the error description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::new(ErrorKind::MalformedMessage, alloc::format!("{e}"))
    }
}

/// A specialized [`Result`] type for [`Error`].
pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use alloc::string::ToString;

    use super::{Error, ErrorKind};

    #[test]
    fn display_error() {
        let error = Error::new(ErrorKind::Provisioning, "unknown item type `FOO`");
        assert_eq!(
            error.to_string(),
            "Provisioning: unknown item type `FOO`"
        );
        assert_eq!(error.kind(), ErrorKind::Provisioning);
    }

    #[test]
    fn json_error_is_malformed_message() {
        let json_error = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert_eq!(Error::from(json_error).kind(), ErrorKind::MalformedMessage);
    }
}
