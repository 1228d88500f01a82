use thiserror::Error;

#[derive(Error, Debug)]
pub enum EligibilityError {
    #[error("Zip code directory unavailable: {message}")]
    DirectoryUnavailable { message: String },

    #[error("Service area for vendor '{vendor_id}' unavailable: {message}")]
    ServiceAreaUnavailable { vendor_id: String, message: String },

    #[error("Invalid zip code '{value}': expected 5 digits")]
    InvalidZipCode { value: String },

    #[error("Invalid coordinate: {message}")]
    InvalidCoordinate { message: String },

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration '{field}'")]
    MissingConfigError { field: String },
}

pub type Result<T> = std::result::Result<T, EligibilityError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// 外部依賴 (目錄、供應商設定) 暫時無法使用
    Dependency,
    /// 呼叫端提供的輸入不正確
    Input,
    Configuration,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl EligibilityError {
    pub fn directory_unavailable(message: impl Into<String>) -> Self {
        Self::DirectoryUnavailable {
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::DirectoryUnavailable { .. } | Self::ServiceAreaUnavailable { .. } => {
                ErrorCategory::Dependency
            }
            Self::InvalidZipCode { .. } | Self::InvalidCoordinate { .. } => ErrorCategory::Input,
            Self::ConfigError { .. }
            | Self::ConfigValidationError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::MissingConfigError { .. } => ErrorCategory::Configuration,
            Self::CsvError(_) | Self::IoError(_) | Self::SerializationError(_) => {
                ErrorCategory::System
            }
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Input => ErrorSeverity::Low,
            ErrorCategory::Dependency => ErrorSeverity::Medium,
            ErrorCategory::Configuration => ErrorSeverity::High,
            ErrorCategory::System => ErrorSeverity::Critical,
        }
    }

    /// 依賴失敗可重試；不可當作「不在服務範圍」處理
    pub fn is_retryable(&self) -> bool {
        self.category() == ErrorCategory::Dependency
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            Self::DirectoryUnavailable { .. } => {
                "Retry the check in a few seconds; the zip code directory did not answer"
            }
            Self::ServiceAreaUnavailable { .. } => {
                "Retry the check; the vendor's delivery settings could not be loaded"
            }
            Self::InvalidZipCode { .. } => "Enter a 5 digit postal code, e.g. 11510",
            Self::InvalidCoordinate { .. } => {
                "Latitude must be within [-90, 90] and longitude within [-180, 180]"
            }
            Self::ConfigError { .. }
            | Self::ConfigValidationError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::MissingConfigError { .. } => {
                "Check the delivery configuration file and environment variables"
            }
            Self::CsvError(_) => "Check that the directory CSV has the expected headers",
            Self::IoError(_) => "Check that the referenced files exist and are readable",
            Self::SerializationError(_) => "Check the format of the data returned by the service",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Dependency => {
                "We could not verify delivery right now. Please try again.".to_string()
            }
            ErrorCategory::Input => self.to_string(),
            ErrorCategory::Configuration => format!("Configuration problem: {}", self),
            ErrorCategory::System => format!("Unexpected error: {}", self),
        }
    }
}

impl From<toml::de::Error> for EligibilityError {
    fn from(e: toml::de::Error) -> Self {
        Self::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        }
    }
}
