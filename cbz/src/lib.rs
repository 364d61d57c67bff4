#![deny(clippy::all)]
#![deny(clippy::pedantic)]

use std::{
    fs::File,
    io::{self, BufWriter, Cursor, Read, Seek, Write},
    ops::{Deref, DerefMut},
    path::Path,
};

use bytes::Bytes;
use camino::Utf8Path;
use tracing::debug;
use zip::{read::ZipFile, write::FileOptions, ZipArchive, ZipWriter};

pub use crate::errors::{Error, Result};

pub mod errors;
pub mod image;

/// We artificially limit the amount of accepted files to 65535 files per Cbz
/// First as it'd be rather impractical for the user to read such enormous Cbz
/// Also, this size has been chosen as it was the limit of the very first zip spec
pub static MAX_FILE_NUMBER: usize = u16::MAX as usize;

pub trait Cbz {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub trait CbzRead: Cbz {
    fn file_names(&self) -> Vec<&str>;

    /// Lookup the file by `name` in Cbz and returns a `CbzFile`
    ///
    /// ## Errors
    ///
    /// Fails if no file is named `name` or if the content can't be read
    fn read_by_name(&mut self, name: &str) -> Result<CbzFile<'_>>;

    /// File names present in the Cbz, sorted
    fn sorted_file_names(&self) -> Vec<String> {
        let mut file_names = self
            .file_names()
            .into_iter()
            .map(Into::into)
            .collect::<Vec<String>>();
        file_names.sort();

        file_names
    }
}

pub trait CbzWrite: Cbz {
    /// Inserts the content of `reader` under the entry `filename`, the name is kept as is
    /// so callers are in charge of providing a flat, unique name
    ///
    /// ## Errors
    ///
    /// This fails if the name is empty, if the Cbz writer can't be written,
    /// or if it's full (i.e. its size equals `MAX_FILE_NUMBER`)
    fn insert_from_reader(
        &mut self,
        filename: impl Into<String>,
        reader: impl Read,
        file_options: FileOptions,
    ) -> Result<u64>;

    /// Inserts the file located at `path`, the entry is named after the file name only
    ///
    /// ## Errors
    ///
    /// Same behavior as `insert_from_reader`, can also fail when opening the file
    fn insert_file(&mut self, path: impl AsRef<Utf8Path>) -> Result<u64> {
        let path = path.as_ref();
        let Some(filename) = path.file_name() else {
            return Err(Error::CbzFileNameEmpty);
        };
        let file = File::open(path)?;

        self.insert_from_reader(filename, file, FileOptions::default())
    }
}

pub struct CbzFile<'a>(ZipFile<'a>);

impl<'a> CbzFile<'a> {
    pub fn size(&self) -> u64 {
        self.0.size()
    }

    /// Convert the file convent to  `Bytes`
    ///
    /// ## Errors
    ///
    /// Fails if file size is too large to fit a `usize` on host machine
    /// or if the content can't be read
    pub fn to_bytes(&mut self) -> Result<Bytes> {
        let mut buf = Vec::with_capacity(
            self.size()
                .try_into()
                .map_err(|_| Error::CbzFileSizeConversion)?,
        );

        self.0.read_to_end(&mut buf)?;

        Ok(buf.into())
    }
}

impl<'a> From<ZipFile<'a>> for CbzFile<'a> {
    fn from(zip_file: ZipFile<'a>) -> Self {
        Self(zip_file)
    }
}

#[derive(Debug)]
pub struct CbzReader<R> {
    archive: ZipArchive<R>,
}

impl<R> CbzReader<R> {
    pub fn new(archive: ZipArchive<R>) -> Self {
        Self { archive }
    }
}

impl<R> CbzReader<R>
where
    R: Read + Seek,
{
    /// Creates `CbzReader` from a `Read`
    ///
    /// ## Errors
    ///
    /// Fails if the underlying `ZipArchive` can't be created
    pub fn from_reader(reader: R) -> Result<Self> {
        let archive = ZipArchive::new(reader)?;

        Ok(Self::new(archive))
    }
}

impl CbzReader<File> {
    /// Creates `CbzReader` from a path
    ///
    /// ## Errors
    ///
    /// Fails if the underlying `ZipArchive` can't be created
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path.as_ref())?;

        Self::from_reader(file)
    }
}

impl<'b> CbzReader<Cursor<&'b [u8]>> {
    /// Creates `CbzReader` from a bytes slice
    ///
    /// ## Errors
    ///
    /// Fails if the underlying `ZipArchive` can't be created
    pub fn from_bytes_slice(bytes: &'b [u8]) -> Result<Self> {
        let cursor = Cursor::new(bytes);

        Self::from_reader(cursor)
    }
}

impl<R> Cbz for CbzReader<R>
where
    R: Read + Seek,
{
    fn len(&self) -> usize {
        self.archive.len()
    }
}

impl<R> CbzRead for CbzReader<R>
where
    R: Read + Seek,
{
    fn file_names(&self) -> Vec<&str> {
        self.archive.file_names().collect()
    }

    fn read_by_name(&mut self, name: &str) -> Result<CbzFile<'_>> {
        let archive_file = self.archive.by_name(name)?;

        Ok(archive_file.into())
    }
}

impl<R> Deref for CbzReader<R> {
    type Target = ZipArchive<R>;

    fn deref(&self) -> &Self::Target {
        &self.archive
    }
}

impl<R> DerefMut for CbzReader<R> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.archive
    }
}

pub struct CbzWriter<W: Write + Seek> {
    archive: ZipWriter<W>,
    size: usize,
}

impl<W> CbzWriter<W>
where
    W: Write + Seek,
{
    pub fn new(archive: ZipWriter<W>) -> Self {
        Self { archive, size: 0 }
    }

    /// Creates a `CbzWriter` from a `Write`
    pub fn from_writer(writer: W) -> Self {
        let archive = ZipWriter::new(writer);

        Self::new(archive)
    }

    /// Terminates the Cbz archiving, called on drop anyway but error can't be handled
    ///
    /// ## Errors
    ///
    /// Same errors as the underlying `ZipWriter::finish` method
    pub fn finish(&mut self) -> Result<CbzWriterFinished<W>> {
        let writer = self.archive.finish()?;

        Ok(CbzWriterFinished::new(writer))
    }
}

impl CbzWriter<BufWriter<File>> {
    /// Creates (or truncates) the file at `path` and writes the archive straight into it
    ///
    /// ## Errors
    ///
    /// Fails if the file can't be created
    pub fn create(path: impl AsRef<Utf8Path>) -> Result<Self> {
        let file = File::create(path.as_ref())?;

        Ok(Self::from_writer(BufWriter::new(file)))
    }
}

impl Default for CbzWriter<Cursor<Vec<u8>>> {
    fn default() -> Self {
        Self::from_writer(Cursor::new(Vec::new()))
    }
}

impl<W> Cbz for CbzWriter<W>
where
    W: Write + Seek,
{
    fn len(&self) -> usize {
        self.size
    }
}

impl<W> CbzWrite for CbzWriter<W>
where
    W: Write + Seek,
{
    fn insert_from_reader(
        &mut self,
        filename: impl Into<String>,
        mut reader: impl Read,
        file_options: FileOptions,
    ) -> Result<u64> {
        if self.size >= MAX_FILE_NUMBER {
            return Err(Error::CbzTooLarge(MAX_FILE_NUMBER));
        }

        let filename = filename.into();
        if filename.is_empty() {
            return Err(Error::CbzFileNameEmpty);
        }

        self.archive.start_file(filename.as_str(), file_options)?;

        let written = io::copy(&mut reader, &mut self.archive)?;

        self.size += 1;
        debug!("inserted {filename} ({written} bytes) into cbz");

        Ok(written)
    }
}

pub struct CbzWriterFinished<W> {
    writer: W,
}

impl<W> CbzWriterFinished<W> {
    fn new(writer: W) -> Self {
        Self { writer }
    }
}

impl CbzWriterFinished<BufWriter<File>> {
    /// Writes out the end of the archive still held in the buffer and returns the file
    ///
    /// ## Errors
    ///
    /// Fails if the buffered bytes can't be written
    pub fn into_file(self) -> Result<File> {
        self.writer
            .into_inner()
            .map_err(|err| Error::IO(err.into_error()))
    }
}

impl<T: AsRef<[u8]>> AsRef<[u8]> for CbzWriterFinished<Cursor<T>> {
    fn as_ref(&self) -> &[u8] {
        self.writer.get_ref().as_ref()
    }
}
