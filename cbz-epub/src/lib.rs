#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::missing_panics_doc, clippy::must_use_candidate)]

//! Converts EPUB books into CBZ archives, pages following the reading order of the spine.

pub use crate::{
    assemble::{assemble, Assembled},
    book::{convert_book, discover_epubs, run, Batch, BatchReport, BookOutcome, Config},
    container::locate_package,
    errors::{Error, Result},
    package::Package,
    resolve::{resolve_images, EntryOutcome, ImageFile, Resolution},
};

pub mod assemble;
pub mod book;
pub mod container;
pub mod errors;
pub mod package;
pub mod resolve;
mod xml;
