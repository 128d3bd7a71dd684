use thiserror::Error;

pub type Result<T> = std::result::Result<T, LoadStoreError>;

#[derive(Error, Debug)]
pub enum LoadStoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Listen stream lagged by {0} events")]
    WatchLagged(u64),

    #[error("Listen channel closed")]
    WatchChannelClosed,

    #[error("Invalid key: {0}")]
    InvalidKey(String),
}
