//! Walks the spine and turns it into the ordered list of page images.

use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use tl::{HTMLTag, ParserOptions, VDom};
use tracing::{debug, error, warn};

use crate::{errors::Result, package::Package};

pub static IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "gif", "webp"];

pub static MARKUP_EXTENSIONS: [&str; 3] = ["html", "xhtml", "htm"];

/// An on-disk image and its 1-based position in reading order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageFile {
    pub path: Utf8PathBuf,
    pub position: usize,
}

/// What a single spine entry contributed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryOutcome {
    /// The entry is an image and was taken as is
    Image,
    /// The entry is a markup document that referenced `found` existing images
    Markup { found: usize },
    /// The id isn't declared in the manifest
    NotInManifest,
    /// The manifest href doesn't exist on disk
    Missing(Utf8PathBuf),
    /// Neither an image nor a markup document
    Unsupported(Utf8PathBuf),
    /// The markup document couldn't be processed, it contributes no image
    Failed { document: Utf8PathBuf, reason: String },
}

#[derive(Debug, Default)]
pub struct Resolution {
    pub images: Vec<ImageFile>,
    /// One outcome per spine entry, in spine order
    pub entries: Vec<(String, EntryOutcome)>,
}

impl Resolution {
    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn failures(&self) -> impl Iterator<Item = (&Utf8Path, &str)> {
        self.entries.iter().filter_map(|(_, outcome)| match outcome {
            EntryOutcome::Failed { document, reason } => Some((document.as_path(), reason.as_str())),
            _ => None,
        })
    }

    fn push(&mut self, path: Utf8PathBuf) {
        let position = self.images.len() + 1;
        self.images.push(ImageFile { path, position });
    }
}

fn has_extension(path: &Utf8Path, extensions: &[&str]) -> bool {
    path.extension().is_some_and(|extension| {
        extensions
            .iter()
            .any(|candidate| extension.eq_ignore_ascii_case(candidate))
    })
}

#[must_use]
pub fn is_image(path: &Utf8Path) -> bool {
    has_extension(path, &IMAGE_EXTENSIONS)
}

#[must_use]
pub fn is_markup(path: &Utf8Path) -> bool {
    has_extension(path, &MARKUP_EXTENSIONS)
}

/// Resolves the spine of `package` into images, `opf_dir` being the package document's directory.
/// Unknown ids, missing files and broken documents are recorded and skipped, never fatal.
pub fn resolve_images(opf_dir: &Utf8Path, package: &Package) -> Resolution {
    let mut resolution = Resolution::default();

    for id in &package.spine {
        let outcome = resolve_entry(opf_dir, package, id, &mut resolution);
        resolution.entries.push((id.clone(), outcome));
    }

    resolution
}

fn resolve_entry(
    opf_dir: &Utf8Path,
    package: &Package,
    id: &str,
    resolution: &mut Resolution,
) -> EntryOutcome {
    let Some(href) = package.href(id) else {
        debug!("spine id {id} not found in manifest");
        return EntryOutcome::NotInManifest;
    };

    let path = opf_dir.join(href);
    let Ok(resolved) = path.canonicalize_utf8() else {
        debug!("{path} doesn't exist");
        return EntryOutcome::Missing(path);
    };

    if is_image(&path) {
        resolution.push(resolved);
        return EntryOutcome::Image;
    }

    if !is_markup(&path) {
        debug!("{path} is neither an image nor a markup document");
        return EntryOutcome::Unsupported(path);
    }

    match markup_images(&resolved) {
        Ok(images) => {
            let found = images.len();
            for image in images {
                resolution.push(image);
            }
            EntryOutcome::Markup { found }
        }
        Err(err) => {
            error!("error processing {path}: {err}");
            EntryOutcome::Failed {
                document: path,
                reason: err.to_string(),
            }
        }
    }
}

/// Existing images referenced by the markup document at `document`, in document order
///
/// ## Errors
///
/// Fails if the document can't be read as utf-8 or can't be parsed
pub fn markup_images(document: &Utf8Path) -> Result<Vec<Utf8PathBuf>> {
    let html = fs::read_to_string(document)?;
    let base = document.parent().unwrap_or(Utf8Path::new(""));

    let images = img_sources(&html)?
        .into_iter()
        .filter_map(|src| resolve_src(base, &src))
        .collect();

    Ok(images)
}

fn resolve_src(base: &Utf8Path, src: &str) -> Option<Utf8PathBuf> {
    let src = Utf8Path::new(src);
    // Only paths relative to the document are followed, anything else would leave the book
    if src.has_root() {
        warn!("ignoring absolute image source {src}");
        return None;
    }

    let resolved = base.join(src).canonicalize_utf8().ok()?;
    if !is_image(&resolved) {
        debug!("{resolved} is not a supported image");
        return None;
    }

    Some(resolved)
}

/// `src` attributes of all the `img` elements found in `html`, in document order.
/// Tag and attribute names are matched case-insensitively.
///
/// ## Errors
///
/// Fails if the document can't be parsed
pub fn img_sources(html: &str) -> Result<Vec<String>> {
    let dom = tl::parse(html, ParserOptions::default())?;
    let mut sources = Vec::new();

    for_each_tag(&dom, "img", |tag| {
        let src = tag
            .attributes()
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case("src"))
            .and_then(|(_, value)| value);

        match src {
            Some(src) if !src.trim().is_empty() => sources.push(src.trim().to_string()),
            _ => debug!("img tag has no src attribute, or it's empty {tag:#?}"),
        }
    });

    Ok(sources)
}

fn for_each_tag<F>(dom: &VDom<'_>, name: &str, mut f: F)
where
    F: FnMut(&HTMLTag<'_>),
{
    for node in dom.nodes() {
        let Some(tag) = node.as_tag() else {
            continue;
        };
        if tag.name().as_utf8_str().eq_ignore_ascii_case(name) {
            f(tag);
        }
    }
}
