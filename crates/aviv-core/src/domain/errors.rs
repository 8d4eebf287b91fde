use super::PipelineStage;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type AvivResult<T> = Result<T, AvivError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AvivErrorCategory {
    Format,
    Configuration,
    Unsupported,
    Arithmetic,
    IoSystem,
    Internal,
}

impl AvivErrorCategory {
    pub const fn exit_code(self) -> i32 {
        match self {
            Self::Format => 2,
            Self::Configuration => 3,
            Self::Unsupported => 4,
            Self::Arithmetic => 5,
            Self::IoSystem => 6,
            Self::Internal => 7,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Format => "FormatError",
            Self::Configuration => "ConfigurationError",
            Self::Unsupported => "UnsupportedError",
            Self::Arithmetic => "ArithmeticError",
            Self::IoSystem => "IoSystemError",
            Self::Internal => "InternalError",
        }
    }
}

impl Display for AvivErrorCategory {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str((*self).as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvivError {
    category: AvivErrorCategory,
    code: &'static str,
    message: String,
    stage: Option<PipelineStage>,
}

impl AvivError {
    pub fn new(category: AvivErrorCategory, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            category,
            code,
            message: message.into(),
            stage: None,
        }
    }

    pub fn format(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(AvivErrorCategory::Format, code, message)
    }

    pub fn configuration(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(AvivErrorCategory::Configuration, code, message)
    }

    pub fn unsupported(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(AvivErrorCategory::Unsupported, code, message)
    }

    pub fn arithmetic(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(AvivErrorCategory::Arithmetic, code, message)
    }

    pub fn io_system(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(AvivErrorCategory::IoSystem, code, message)
    }

    pub fn internal(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(AvivErrorCategory::Internal, code, message)
    }

    /// Tags the error with the pipeline stage that was running. An existing
    /// tag is kept so nested runs report the innermost stage.
    pub fn at_stage(mut self, stage: PipelineStage) -> Self {
        if self.stage.is_none() {
            self.stage = Some(stage);
        }
        self
    }

    pub const fn category(&self) -> AvivErrorCategory {
        self.category
    }

    pub const fn code(&self) -> &'static str {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn stage(&self) -> Option<PipelineStage> {
        self.stage
    }

    pub const fn exit_code(&self) -> i32 {
        self.category.exit_code()
    }

    pub fn diagnostic_line(&self) -> String {
        match self.stage {
            Some(stage) => format!("ERROR: [{}] {} (stage: {})", self.code, self.message, stage),
            None => format!("ERROR: [{}] {}", self.code, self.message),
        }
    }

    pub fn fatal_exit_line(&self) -> String {
        format!("FATAL EXIT CODE: {}", self.exit_code())
    }
}

impl Display for AvivError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} [{}] {}", self.category, self.code, self.message)
    }
}

impl Error for AvivError {}

/// Divides, raising an arithmetic error when the divisor is exactly zero.
pub(crate) fn checked_div(
    numerator: f64,
    denominator: f64,
    code: &'static str,
    context: impl FnOnce() -> String,
) -> AvivResult<f64> {
    if denominator == 0.0 {
        return Err(AvivError::arithmetic(
            code,
            format!("division by zero while {}", context()),
        ));
    }
    Ok(numerator / denominator)
}
