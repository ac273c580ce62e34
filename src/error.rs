use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

/// Every failure the engine surfaces to its callers.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("image codec error: {0}")]
    Image(#[from] image::ImageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No drawing surface could be acquired for a render.
    #[error("cannot allocate a {width}x{height} surface")]
    Surface { width: u32, height: u32 },

    #[error("font error: {0}")]
    Font(String),

    #[error("unknown collage layout '{0}'")]
    UnknownLayout(String),

    #[error("unknown platform '{0}'")]
    UnknownPlatform(String),

    #[error("unsupported export format '{0}'")]
    UnsupportedFormat(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error("settings error: {0}")]
    Settings(String),
}

/// Input problems caught locally, before any network call.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("paint an area on the image first")]
    EmptyMask,

    #[error("describe the change you want first")]
    EmptyInstruction,

    #[error("layout '{layout}' needs at least {required} image(s), got {supplied}")]
    NotEnoughImages {
        layout: String,
        required: usize,
        supplied: usize,
    },

    #[error("a generation is already in progress")]
    AlreadyProcessing,

    #[error("mask is {mask_w}x{mask_h} but the image is {image_w}x{image_h}")]
    MaskSizeMismatch {
        mask_w: u32,
        mask_h: u32,
        image_w: u32,
        image_h: u32,
    },
}

/// Failures from the remote generation collaborator, already classified.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GenerationError {
    /// Transient overload persisted through every retry.
    #[error("SERVER_OVERLOADED")]
    ServerOverloaded,

    #[error("activation required: {0}")]
    ActivationRequired(String),

    #[error("generation failed: {0}")]
    Failed(String),

    #[error("response carried no usable image: {0}")]
    UnwrappablePayload(String),

    #[error("could not decode generated image: {0}")]
    Decode(String),
}

impl GenerationError {
    /// The message shown to the user for this failure.
    pub fn user_message(&self) -> &'static str {
        match self {
            GenerationError::ServerOverloaded => {
                "Servers are busy right now, please try again shortly."
            }
            GenerationError::ActivationRequired(_) => "Activation required",
            _ => "Something went wrong while generating. Please try again.",
        }
    }
}

/// Failure reported by a history store backend.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("history store error: {0}")]
pub struct StoreError(pub String);
