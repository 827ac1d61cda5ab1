use thiserror::Error;

/// Errors from parsing/resampling the headered `.pcm`/`.sfx` blob format.
#[derive(Error, Debug)]
pub enum AssetError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("decode error: {0}")]
    Decode(String),
}
