use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("invalid value for `{feature}`: {value} (expected {expected})")]
    InvalidFeature {
        feature: String,
        value: f64,
        expected: String,
    },

    #[error("model not trained yet - fit or load an artifact first")]
    ModelNotTrained,

    #[error("similarity index not built - fit or load an artifact first")]
    IndexNotBuilt,

    #[error("model fit did not converge: {message}")]
    Convergence { message: String },

    #[error("unsupported model type `{requested}` (supported: logistic)")]
    UnsupportedModelType { requested: String },

    #[error("dimensions don't match: {message}")]
    InvalidDimensions { message: String },

    #[error("not enough usable data: {message}")]
    InsufficientData { message: String },

    #[error("numerical issues: {message}")]
    Numerical { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),
}

impl EngineError {
    pub fn invalid_feature(
        feature: impl Into<String>,
        value: f64,
        expected: impl Into<String>,
    ) -> Self {
        Self::InvalidFeature {
            feature: feature.into(),
            value,
            expected: expected.into(),
        }
    }

    pub fn convergence(message: impl Into<String>) -> Self {
        Self::Convergence {
            message: message.into(),
        }
    }

    pub fn unsupported_model(requested: impl Into<String>) -> Self {
        Self::UnsupportedModelType {
            requested: requested.into(),
        }
    }

    pub fn invalid_dimensions(message: impl Into<String>) -> Self {
        Self::InvalidDimensions {
            message: message.into(),
        }
    }

    pub fn insufficient_data(message: impl Into<String>) -> Self {
        Self::InsufficientData {
            message: message.into(),
        }
    }

    pub fn numerical(message: impl Into<String>) -> Self {
        Self::Numerical {
            message: message.into(),
        }
    }
}
