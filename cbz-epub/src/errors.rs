use std::{io, path::PathBuf};

use camino::Utf8PathBuf;
use zip::result::ZipError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("container descriptor not found at {0}")]
    MissingContainer(Utf8PathBuf),

    #[error("malformed container descriptor: {0}")]
    MalformedContainer(String),

    #[error("malformed package document: {0}")]
    MalformedPackage(String),

    #[error("{0:?} is not a valid utf-8 path")]
    NonUtf8Path(PathBuf),

    #[error("{0} has no file name")]
    NoFileStem(Utf8PathBuf),

    #[error("IO error {0}")]
    IO(#[from] io::Error),

    #[error("Zip error {0}")]
    Zip(#[from] ZipError),

    #[error("Cbz error: {0}")]
    Cbz(#[from] cbz::Error),

    #[error("Html error: {0}")]
    Html(#[from] tl::ParseError),

    #[error("Glob error: {0}")]
    Glob(#[from] glob::GlobError),

    #[error("Glob pattern error: {0}")]
    GlobPattern(#[from] glob::PatternError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
