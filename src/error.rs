use thiserror::Error;

/// Main error type for the library.
#[derive(Debug, Error)]
pub enum Error {
    /// Used when the user pass a logical invalid parameter to a function.
    #[error("Parameter error: {0}")]
    InvalidParameter(String),
    /// Depth frame or intrinsics rejected at the boundary, before any processing.
    #[error("Invalid input frame: {0}")]
    InvalidInputFrame(String),
    /// No pixel produced a usable correspondence in an ICP iteration.
    #[error("No corresponding points between frames found ({points_found} found, 0 used)")]
    NoCorrespondences { points_found: usize },
    /// The normal equations are singular or the solve produced non-finite values.
    #[error("Degenerate linear system: {0}")]
    DegenerateSystem(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parser error: {0}")]
    Parser(#[from] serde_json::Error),
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

impl Error {
    /// Creates an error with the kind `InvalidParameter`.
    /// # Arguments
    /// * `msg` - The error message.
    pub fn invalid_parameter<T: ToString>(msg: T) -> Self {
        Error::InvalidParameter(msg.to_string())
    }

    /// Creates an error with the kind `InvalidInputFrame`.
    pub fn invalid_input_frame<T: ToString>(msg: T) -> Self {
        Error::InvalidInputFrame(msg.to_string())
    }

    /// Whether the error means tracking was lost for a frame pair, and the
    /// caller may skip the frame and continue the session.
    pub fn is_tracking_failure(&self) -> bool {
        matches!(
            self,
            Error::NoCorrespondences { .. } | Error::DegenerateSystem(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
