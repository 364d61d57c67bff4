use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use cbz::{image::sniff_extension, CbzWrite, CbzWriter};
use tracing::debug;

use crate::{
    errors::{Error, Result},
    resolve::ImageFile,
};

/// Width of the page counter in page file names (`page_001.jpg`)
pub static COUNTER_SIZE: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assembled {
    pub cbz: Utf8PathBuf,
    pub image_dir: Utf8PathBuf,
    /// Number of pages copied into `image_dir`
    pub pages: usize,
}

/// Name of the page at `position`, the source extension is kept as written and guessed
/// from the file signature when the source has none
pub fn page_name(position: usize, source: &Utf8Path) -> String {
    let extension = match source.extension() {
        Some(extension) if !extension.is_empty() => extension,
        _ => sniff_extension(source),
    };

    format!("page_{position:0>COUNTER_SIZE$}.{extension}")
}

/// Copies `images` into `<output_dir>/<base_name>_img/` as sequentially numbered pages,
/// then packs that folder into `<output_dir>/<base_name>.cbz`.
/// Both are kept, running it again overwrites the pages and the archive.
///
/// ## Errors
///
/// Fails if the folder can't be created, a page can't be copied, or the archive can't be written
pub fn assemble(images: &[ImageFile], output_dir: &Utf8Path, base_name: &str) -> Result<Assembled> {
    let image_dir = output_dir.join(format!("{base_name}_img"));
    fs::create_dir_all(&image_dir)?;

    let mut pages = 0;
    for image in images {
        if !image.path.exists() {
            debug!("{} vanished, skipping page {}", image.path, image.position);
            continue;
        }
        let target = image_dir.join(page_name(image.position, &image.path));
        fs::copy(&image.path, &target)?;
        pages += 1;
    }

    let cbz = output_dir.join(format!("{base_name}.cbz"));
    let packed = pack_dir(&image_dir, &cbz)?;
    debug!("packed {packed} files into {cbz}");

    Ok(Assembled {
        cbz,
        image_dir,
        pages,
    })
}

/// Packs every regular file of `dir`, sorted by name, into a flat archive at `cbz_path`
///
/// ## Errors
///
/// Fails if `dir` can't be listed or the archive can't be written
pub fn pack_dir(dir: &Utf8Path, cbz_path: &Utf8Path) -> Result<usize> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let path = Utf8PathBuf::from_path_buf(entry.path()).map_err(Error::NonUtf8Path)?;
        files.push(path);
    }
    files.sort();

    let mut cbz_writer = CbzWriter::create(cbz_path)?;
    for file in &files {
        cbz_writer.insert_file(file)?;
    }
    cbz_writer.finish()?.into_file()?;

    Ok(files.len())
}
