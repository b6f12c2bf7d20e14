use std::fmt::{self, Debug, Display};

use thiserror::Error;

#[derive(Error)]
pub enum Error {
    #[error(transparent)]
    Bluetooth(#[from] bluer::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("peripheral has no {0} characteristic")]
    CharacteristicNotFound(uuid::Uuid),

    #[error("connection to the peripheral was lost")]
    ConnectionLost,

    #[error("no device was selected")]
    NoDeviceSelected,
}

impl Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use bluer::ErrorKind::NotFound;

        match self {
            Error::Bluetooth(e) => match e.kind {
                NotFound => write!(f, "couldn't find a bluetooth adapter."),
                _ => Display::fmt(self, f),
            },
            _ => Display::fmt(self, f),
        }
    }
}
