use thiserror::Error;

use crate::span::Location;

pub type Result<T> = core::result::Result<T, Error>;

/// Every failure the language core can report.
///
/// All variants except `SourceIo` carry the location that triggered them.
/// The first error aborts processing of the current file.
#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read source: {0}")]
    SourceIo(#[from] std::io::Error),
    #[error("{location}: lex error: {message}")]
    Lex { location: Location, message: String },
    #[error("{location}: syntax error: {message}")]
    Syntax { location: Location, message: String },
    #[error("{location}: {feature} is not supported")]
    Unsupported { location: Location, feature: String },
    #[error("{location}: package mismatch, expected '{expected}' but found '{declared}'")]
    PackageMismatch {
        location: Location,
        expected: String,
        declared: String,
    },
    #[error("{location}: unresolved name '{name}'")]
    Resolution { location: Location, name: String },
    #[error("{location}: evaluation error: {message}")]
    Evaluation { location: Location, message: String },
}

impl Error {
    pub fn syntax(location: &Location, message: impl Into<String>) -> Self {
        Error::Syntax {
            location: location.clone(),
            message: message.into(),
        }
    }

    pub fn unsupported(location: &Location, feature: impl Into<String>) -> Self {
        Error::Unsupported {
            location: location.clone(),
            feature: feature.into(),
        }
    }

    pub fn unresolved(location: &Location, name: impl Into<String>) -> Self {
        Error::Resolution {
            location: location.clone(),
            name: name.into(),
        }
    }

    pub fn evaluation(location: &Location, message: impl Into<String>) -> Self {
        Error::Evaluation {
            location: location.clone(),
            message: message.into(),
        }
    }

    pub fn location(&self) -> Option<&Location> {
        match self {
            Error::SourceIo(_) => None,
            Error::Lex { location, .. }
            | Error::Syntax { location, .. }
            | Error::Unsupported { location, .. }
            | Error::PackageMismatch { location, .. }
            | Error::Resolution { location, .. }
            | Error::Evaluation { location, .. } => Some(location),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_send_sync<T: Send + Sync + 'static>() {}

    #[test]
    fn errors_cross_thread_boundaries() {
        assert_send_sync::<Error>();
    }

    #[test]
    fn display_leads_with_location() {
        let location = Location::new("Mybuild".into(), 4, 9, 30);
        let err = Error::unsupported(&location, "'import' statements");
        assert_eq!(err.to_string(), "Mybuild:4:9: 'import' statements is not supported");
        assert_eq!(err.location(), Some(&location));
    }
}
