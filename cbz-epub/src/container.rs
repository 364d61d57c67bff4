//! Locates the package document of an extracted EPUB through `META-INF/container.xml`.

use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use quick_xml::{events::Event, NsReader};
use tracing::debug;

use crate::{
    errors::{Error, Result},
    xml::{is_bound_to, required_attribute, strip_bom},
};

pub static CONTAINER_PATH: &str = "META-INF/container.xml";

pub static CONTAINER_NS: &[u8] = b"urn:oasis:names:tc:opendocument:xmlns:container";

/// Returns the path of the package document, `root` joined with the first `rootfile/@full-path`
///
/// ## Errors
///
/// `Error::MissingContainer` if the descriptor doesn't exist,
/// `Error::MalformedContainer` if it can't be parsed or has no rootfile entry
pub fn locate_package(root: &Utf8Path) -> Result<Utf8PathBuf> {
    let container_path = root.join(CONTAINER_PATH);
    if !container_path.is_file() {
        return Err(Error::MissingContainer(container_path));
    }

    let content = fs::read_to_string(&container_path)?;
    let full_path = rootfile_path(&content)?;
    debug!("package document located at {full_path}");

    Ok(root.join(full_path))
}

/// ## Errors
///
/// Fails if the descriptor isn't well formed or if no rootfile entry can be found
pub fn rootfile_path(content: &str) -> Result<String> {
    let mut reader = NsReader::from_str(strip_bom(content));
    reader.config_mut().trim_text(true);

    loop {
        let (ns, event) = reader
            .read_resolved_event()
            .map_err(|err| Error::MalformedContainer(err.to_string()))?;

        match event {
            Event::Start(e) | Event::Empty(e)
                if is_bound_to(&ns, CONTAINER_NS) && e.local_name().as_ref() == b"rootfile" =>
            {
                return required_attribute(&e, b"full-path").map_err(Error::MalformedContainer);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Err(Error::MalformedContainer(
        "no rootfile entry found".to_string(),
    ))
}
