use std::error::Error;
use std::fmt::{Display, Formatter};

pub type DiffusionResult<T> = Result<T, DiffusionError>;
pub type ParserResult<T> = DiffusionResult<T>;
pub type ComputeResult<T> = DiffusionResult<T>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiffusionErrorCategory {
    Success,
    ConfigurationError,
    DataPreconditionError,
    IoSystemError,
    ComputationError,
}

impl DiffusionErrorCategory {
    pub const fn exit_code(self) -> i32 {
        match self {
            Self::Success => 0,
            Self::ConfigurationError => 2,
            Self::DataPreconditionError => 3,
            Self::IoSystemError => 4,
            Self::ComputationError => 5,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "Success",
            Self::ConfigurationError => "ConfigurationError",
            Self::DataPreconditionError => "DataPreconditionError",
            Self::IoSystemError => "IoSystemError",
            Self::ComputationError => "ComputationError",
        }
    }

    pub const fn is_fatal(self) -> bool {
        !matches!(self, Self::Success)
    }
}

/// Error raised by every fallible operation of the diffusion pipeline.
///
/// The placeholder is a stable dotted code (`INPUT.MSD_MODE`,
/// `DATA.FIT_TOO_FEW_POINTS`, ...) that scripts can match on; the message is
/// for humans and names the offending value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffusionError {
    category: DiffusionErrorCategory,
    placeholder: &'static str,
    message: String,
}

impl DiffusionError {
    pub fn new(
        category: DiffusionErrorCategory,
        placeholder: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Self {
            category,
            placeholder,
            message: message.into(),
        }
    }

    pub fn configuration(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(
            DiffusionErrorCategory::ConfigurationError,
            placeholder,
            message,
        )
    }

    pub fn data_precondition(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(
            DiffusionErrorCategory::DataPreconditionError,
            placeholder,
            message,
        )
    }

    pub fn io_system(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(DiffusionErrorCategory::IoSystemError, placeholder, message)
    }

    pub fn computation(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(DiffusionErrorCategory::ComputationError, placeholder, message)
    }

    pub const fn category(&self) -> DiffusionErrorCategory {
        self.category
    }

    pub const fn placeholder(&self) -> &'static str {
        self.placeholder
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn exit_code(&self) -> i32 {
        self.category.exit_code()
    }

    pub fn diagnostic_line(&self) -> String {
        let severity = if self.category.is_fatal() {
            "ERROR"
        } else {
            "INFO"
        };
        format!("{}: [{}] {}", severity, self.placeholder, self.message)
    }

    pub fn fatal_exit_line(&self) -> Option<String> {
        self.category
            .is_fatal()
            .then(|| format!("FATAL EXIT CODE: {}", self.exit_code()))
    }
}

impl Display for DiffusionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} [{}] {}",
            self.category.as_str(),
            self.placeholder,
            self.message
        )
    }
}

impl Error for DiffusionError {}

#[cfg(test)]
mod tests {
    use super::{DiffusionError, DiffusionErrorCategory};

    #[test]
    fn exit_code_mapping_is_stable() {
        let cases = [
            (DiffusionErrorCategory::Success, 0, "Success"),
            (
                DiffusionErrorCategory::ConfigurationError,
                2,
                "ConfigurationError",
            ),
            (
                DiffusionErrorCategory::DataPreconditionError,
                3,
                "DataPreconditionError",
            ),
            (DiffusionErrorCategory::IoSystemError, 4, "IoSystemError"),
            (DiffusionErrorCategory::ComputationError, 5, "ComputationError"),
        ];

        for (category, exit_code, name) in cases {
            assert_eq!(category.exit_code(), exit_code);
            assert_eq!(category.as_str(), name);
        }
    }

    #[test]
    fn fatal_error_renders_diagnostic_lines() {
        let error = DiffusionError::configuration(
            "INPUT.MSD_MODE",
            "msd mode must be 'bare' or 'timesliced', got 'sliced'",
        );

        assert_eq!(error.exit_code(), 2);
        assert_eq!(
            error.diagnostic_line(),
            "ERROR: [INPUT.MSD_MODE] msd mode must be 'bare' or 'timesliced', got 'sliced'"
        );
        assert_eq!(
            error.fatal_exit_line().as_deref(),
            Some("FATAL EXIT CODE: 2")
        );
        assert_eq!(
            error.to_string(),
            "ConfigurationError [INPUT.MSD_MODE] msd mode must be 'bare' or 'timesliced', got 'sliced'"
        );
    }
}
