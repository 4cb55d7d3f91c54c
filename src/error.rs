use std::io;

/// Crate-wide error type.
///
/// Configuration and I/O problems are fatal and bubble up to the CLI;
/// per-ray numerical mishaps never become an `Error` and are handled
/// locally as failed samples.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("scene parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("OBJ parse error: {0}")]
    Obj(String),

    #[error("geometry error: {0}")]
    Geometry(String),

    #[error("`{0}` is not implemented")]
    Unimplemented(&'static str),

    #[error("rendering was cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<wavefront_obj::ParseError> for Error {
    fn from(e: wavefront_obj::ParseError) -> Self {
        Error::Obj(format!("line {}: {}", e.line_number, e.message))
    }
}
