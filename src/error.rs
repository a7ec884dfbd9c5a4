use std::io;
use thiserror::Error;

/// Failures that stop a run outright.
///
/// Everything pip reports through its exit status or output is recoverable and
/// ends up in the run summary; only being unable to start the interpreter at
/// all is fatal.
#[derive(Error, Debug)]
pub enum PipError {
    #[error("Unable to run '{program}': {source}")]
    Unavailable {
        program: String,
        #[source]
        source: io::Error,
    },
}

/// Rejected virtual environment names.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum NameError {
    #[error("Environment name must not be empty")]
    Empty,

    #[error("Environment name '{0}' must not contain path separators")]
    Separator(String),

    #[error("Environment name '{0}' is reserved")]
    Reserved(String),
}

/// Validate a virtual environment name before it is joined onto a path.
pub fn validate_env_name(name: &str) -> Result<&str, NameError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(NameError::Empty);
    }
    if trimmed == "." || trimmed == ".." {
        return Err(NameError::Reserved(trimmed.to_string()));
    }
    if trimmed.contains('/') || trimmed.contains('\\') {
        return Err(NameError::Separator(trimmed.to_string()));
    }
    Ok(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("science", Ok("science"))]
    #[case("  web  ", Ok("web"))]
    #[case("", Err(NameError::Empty))]
    #[case("   ", Err(NameError::Empty))]
    #[case("..", Err(NameError::Reserved("..".to_string())))]
    #[case("a/b", Err(NameError::Separator("a/b".to_string())))]
    #[case("a\\b", Err(NameError::Separator("a\\b".to_string())))]
    fn test_validate_env_name(#[case] input: &str, #[case] expected: Result<&str, NameError>) {
        assert_eq!(validate_env_name(input), expected);
    }

    #[test]
    fn test_unavailable_message_names_program() {
        let err = PipError::Unavailable {
            program: "python9".to_string(),
            source: io::Error::new(io::ErrorKind::NotFound, "not found"),
        };
        assert!(err.to_string().contains("python9"));
    }
}
