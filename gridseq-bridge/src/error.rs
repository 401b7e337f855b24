use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("shared region I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("shared region too small: expected {expected} bytes, got {got}")]
    RegionTooSmall { expected: usize, got: u64 },

    #[error("not a sequencer region (magic {found:#010x})")]
    BadMagic { found: u32 },

    #[error("region layout version {got} does not match {expected}")]
    LayoutVersionMismatch { expected: u32, got: u32 },
}

pub type Result<T> = std::result::Result<T, BridgeError>;
