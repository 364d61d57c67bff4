use std::{
    fs::{self, File},
    io::{self, BufReader},
};

use camino::{Utf8Path, Utf8PathBuf};
use glob::{glob, Pattern};
use tracing::{debug, warn};
use zip::ZipArchive;

use crate::{
    assemble::{assemble, Assembled},
    container::locate_package,
    errors::{Error, Result},
    package::Package,
    resolve::resolve_images,
};

pub static DEFAULT_OUTPUT_DIR: &str = "comic_output";

/// Name of the directory, under the output directory, holding the scratch directories
pub static SCRATCH_DIR: &str = "temp";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Directory scanned for epub files
    pub input_dir: Utf8PathBuf,
    /// Directory receiving the archives, the image folders, and the scratch directories
    pub output_dir: Utf8PathBuf,
}

impl Config {
    pub fn new(input_dir: impl Into<Utf8PathBuf>, output_dir: impl Into<Utf8PathBuf>) -> Self {
        Self {
            input_dir: input_dir.into(),
            output_dir: output_dir.into(),
        }
    }

    fn scratch_root(&self) -> Utf8PathBuf {
        self.output_dir.join(SCRATCH_DIR)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(".", DEFAULT_OUTPUT_DIR)
    }
}

/// Extraction directory of a book, removed when dropped whatever the conversion outcome
#[derive(Debug)]
pub struct ScratchDir {
    path: Utf8PathBuf,
}

impl ScratchDir {
    /// Creates an empty `<root>/temp_<name>` directory, leftovers of a previous run are removed first
    ///
    /// ## Errors
    ///
    /// Fails if the directory can't be created
    pub fn acquire(root: &Utf8Path, name: &str) -> Result<Self> {
        let path = root.join(format!("temp_{name}"));
        match fs::remove_dir_all(&path) {
            Err(err) if err.kind() != io::ErrorKind::NotFound => {
                warn!("couldn't clean previous scratch directory {path}: {err}");
            }
            _ => {}
        }
        fs::create_dir_all(&path)?;

        Ok(Self { path })
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if let Err(err) = fs::remove_dir_all(&self.path) {
            warn!("couldn't remove scratch directory {}: {err}", self.path);
        } else {
            debug!("removed scratch directory {}", self.path);
        }
    }
}

#[derive(Debug)]
pub enum BookOutcome {
    Converted { found: usize, assembled: Assembled },
    /// No image could be resolved, nothing was written
    Skipped,
    Failed { error: Error },
}

impl BookOutcome {
    pub fn is_converted(&self) -> bool {
        matches!(self, Self::Converted { .. })
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// Extracts every entry of the epub archive into `dest`
///
/// ## Errors
///
/// Fails if the epub can't be opened as a zip archive or an entry can't be written
pub fn unpack_epub(epub: &Utf8Path, dest: &Utf8Path) -> Result<()> {
    let file = File::open(epub)?;
    let mut archive = ZipArchive::new(BufReader::new(file))?;
    debug!("extracting {} entries from {epub}", archive.len());
    archive.extract(dest)?;

    Ok(())
}

/// Converts the epub at `epub` into `<output_dir>/<stem>.cbz` and `<output_dir>/<stem>_img/`.
/// Errors are reported in the outcome, the scratch directory is always removed.
pub fn convert_book(epub: &Utf8Path, config: &Config) -> BookOutcome {
    match try_convert_book(epub, config) {
        Ok(outcome) => outcome,
        Err(error) => BookOutcome::Failed { error },
    }
}

fn try_convert_book(epub: &Utf8Path, config: &Config) -> Result<BookOutcome> {
    let Some(base_name) = epub.file_stem() else {
        return Err(Error::NoFileStem(epub.to_path_buf()));
    };

    let scratch = ScratchDir::acquire(&config.scratch_root(), base_name)?;
    unpack_epub(epub, scratch.path())?;

    let opf_path = locate_package(scratch.path())?;
    let package = Package::open(&opf_path)?;
    let opf_dir = opf_path.parent().unwrap_or(scratch.path());

    let resolution = resolve_images(opf_dir, &package);
    debug!("found {} images in {epub}", resolution.len());
    if resolution.is_empty() {
        return Ok(BookOutcome::Skipped);
    }

    let assembled = assemble(&resolution.images, &config.output_dir, base_name)?;

    Ok(BookOutcome::Converted {
        found: resolution.len(),
        assembled,
    })
}

/// The epub files found in the input directory, sorted
///
/// ## Errors
///
/// Fails when the input directory can't be read or a path isn't utf-8
pub fn discover_epubs(input_dir: &Utf8Path) -> Result<Vec<Utf8PathBuf>> {
    let pattern = Utf8Path::new(&Pattern::escape(input_dir.as_str())).join("*.epub");
    let mut epubs = Vec::new();

    for path in glob(pattern.as_str())? {
        let path = Utf8PathBuf::from_path_buf(path?).map_err(Error::NonUtf8Path)?;
        if path.is_file() {
            epubs.push(path);
        }
    }
    epubs.sort();

    Ok(epubs)
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub outcomes: Vec<(Utf8PathBuf, BookOutcome)>,
}

impl BatchReport {
    pub fn converted(&self) -> usize {
        self.count(BookOutcome::is_converted)
    }

    pub fn skipped(&self) -> usize {
        self.count(BookOutcome::is_skipped)
    }

    pub fn failed(&self) -> usize {
        self.count(BookOutcome::is_failed)
    }

    fn count(&self, f: impl Fn(&BookOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|(_, outcome)| f(outcome)).count()
    }
}

#[derive(Debug)]
pub struct Batch {
    epubs: Vec<Utf8PathBuf>,
}

impl Batch {
    /// ## Errors
    ///
    /// Same as `discover_epubs`
    pub fn discover(config: &Config) -> Result<Self> {
        Ok(Self::new(discover_epubs(&config.input_dir)?))
    }

    pub fn new(epubs: Vec<Utf8PathBuf>) -> Self {
        Self { epubs }
    }

    pub fn len(&self) -> usize {
        self.epubs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.epubs.is_empty()
    }

    /// Converts the books one after the other, `before_book` is called right before a book
    /// is converted and `on_book` as soon as it is done.
    /// A failing book never stops the batch.
    ///
    /// ## Errors
    ///
    /// Fails only if the output directory can't be created
    pub fn run<B, F>(self, config: &Config, mut before_book: B, mut on_book: F) -> Result<BatchReport>
    where
        B: FnMut(&Utf8Path),
        F: FnMut(&Utf8Path, &BookOutcome),
    {
        fs::create_dir_all(&config.output_dir)?;
        let mut report = BatchReport::default();

        for epub in self.epubs {
            before_book(&epub);
            let outcome = convert_book(&epub, config);
            on_book(&epub, &outcome);
            report.outcomes.push((epub, outcome));
        }

        // Only succeeds once every scratch directory is gone
        if fs::remove_dir(config.scratch_root()).is_ok() {
            debug!("removed {}", config.scratch_root());
        }

        Ok(report)
    }
}

/// Discovers and converts every epub of `config.input_dir`
///
/// ## Errors
///
/// Fails if the input directory can't be read or the output directory can't be created
pub fn run(config: &Config) -> Result<BatchReport> {
    Batch::discover(config)?.run(config, |_| {}, |_, _| {})
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::TempDir;
    use zip::{write::FileOptions, ZipWriter};

    use super::*;

    fn temp_root() -> (TempDir, Utf8PathBuf) {
        let dir = TempDir::new().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        (dir, root)
    }

    fn write_zip(path: &Utf8Path, entries: &[(&str, &[u8])]) {
        let mut writer = ZipWriter::new(File::create(path).unwrap());
        for (name, content) in entries {
            writer.start_file(*name, FileOptions::default()).unwrap();
            writer.write_all(content).unwrap();
        }
        writer.finish().unwrap();
    }

    #[test]
    fn scratch_dir_is_removed_on_drop() {
        let (_dir, root) = temp_root();
        let scratch = ScratchDir::acquire(&root, "book").unwrap();
        let path = scratch.path().to_path_buf();
        fs::write(path.join("leftover"), b"x").unwrap();

        assert_eq!(path, root.join("temp_book"));
        drop(scratch);

        assert!(!path.exists());
    }

    #[test]
    fn scratch_dir_starts_empty() {
        let (_dir, root) = temp_root();
        fs::create_dir_all(root.join("temp_book")).unwrap();
        fs::write(root.join("temp_book").join("stale"), b"x").unwrap();

        let scratch = ScratchDir::acquire(&root, "book").unwrap();

        assert_eq!(fs::read_dir(scratch.path()).unwrap().count(), 0);
    }

    #[test]
    fn missing_container_fails_the_book_and_cleans_up() {
        let (_dir, root) = temp_root();
        let epub = root.join("broken.epub");
        write_zip(&epub, &[("mimetype", b"application/epub+zip")]);
        let config = Config::new(root.clone(), root.join("out"));

        let outcome = convert_book(&epub, &config);

        assert!(matches!(
            outcome,
            BookOutcome::Failed {
                error: Error::MissingContainer(_)
            }
        ));
        assert!(!root.join("out").join("temp").join("temp_broken").exists());
        assert!(!root.join("out").join("broken.cbz").exists());
    }

    #[test]
    fn not_a_zip_fails_the_book() {
        let (_dir, root) = temp_root();
        let epub = root.join("text.epub");
        fs::write(&epub, b"definitely not a zip").unwrap();
        let config = Config::new(root.clone(), root.join("out"));

        let outcome = convert_book(&epub, &config);

        assert!(matches!(
            outcome,
            BookOutcome::Failed {
                error: Error::Zip(_)
            }
        ));
        assert!(!root.join("out").join("temp").join("temp_text").exists());
    }

    #[test]
    fn discovery_only_keeps_epub_files() {
        let (_dir, root) = temp_root();
        let input = root.join("[Vol] books");
        fs::create_dir_all(input.join("nested.epub")).unwrap();
        fs::write(input.join("b.epub"), b"").unwrap();
        fs::write(input.join("a.epub"), b"").unwrap();
        fs::write(input.join("c.pdf"), b"").unwrap();

        let epubs = discover_epubs(&input).unwrap();

        assert_eq!(epubs, vec![input.join("a.epub"), input.join("b.epub")]);
    }

    #[test]
    fn books_are_announced_before_their_outcome() {
        let (_dir, root) = temp_root();
        let first = root.join("a.epub");
        let second = root.join("b.epub");
        write_zip(&first, &[("mimetype", b"application/epub+zip")]);
        fs::write(&second, b"not a zip").unwrap();
        let config = Config::new(root.clone(), root.join("out"));

        let events = std::cell::RefCell::new(Vec::new());
        let report = Batch::new(vec![first, second])
            .run(
                &config,
                |epub| {
                    let name = epub.file_name().unwrap();
                    events.borrow_mut().push(format!("before {name}"));
                },
                |epub, outcome| {
                    let name = epub.file_name().unwrap();
                    let failed = outcome.is_failed();
                    events.borrow_mut().push(format!("after {name} failed={failed}"));
                },
            )
            .unwrap();

        assert_eq!(report.failed(), 2);
        assert_eq!(
            events.into_inner(),
            vec![
                "before a.epub",
                "after a.epub failed=true",
                "before b.epub",
                "after b.epub failed=true",
            ]
        );
    }

    #[test]
    fn default_config() {
        let config = Config::default();

        assert_eq!(config.input_dir, Utf8PathBuf::from("."));
        assert_eq!(config.output_dir, Utf8PathBuf::from("comic_output"));
    }
}
