use std::{io, result};

use zip::result::ZipError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error {0}")]
    IO(#[from] io::Error),

    #[error("Zip error {0}")]
    Zip(#[from] ZipError),

    #[error("Cbz file size couldn't be converted")]
    CbzFileSizeConversion,

    #[error("Cbz file name is empty")]
    CbzFileNameEmpty,

    #[error("Cbz is too large, it can contain a maximum of {0} files")]
    CbzTooLarge(usize),
}

pub type Result<T, E = Error> = result::Result<T, E>;
