//! OPF package document: manifest and spine.

use std::{collections::HashMap, fs};

use camino::Utf8Path;
use quick_xml::{events::Event, NsReader};
use tracing::warn;

use crate::{
    errors::{Error, Result},
    xml::{is_bound_to, required_attribute, strip_bom},
};

pub static OPF_NS: &[u8] = b"http://www.idpf.org/2007/opf";

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Package {
    /// Resource id to href, relative to the package document directory
    pub manifest: HashMap<String, String>,
    /// Resource ids in reading order, duplicates are kept
    pub spine: Vec<String>,
    /// Ids declared more than once in the manifest, the last declaration is the one kept
    pub duplicate_ids: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Other,
    Manifest,
    Spine,
}

impl Package {
    /// ## Errors
    ///
    /// Fails if the file can't be read or isn't a valid package document
    pub fn open(path: &Utf8Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;

        Self::parse(&content)
    }

    /// ## Errors
    ///
    /// `Error::MalformedPackage` if the document isn't well formed, its root isn't an OPF `package`,
    /// it lacks a `manifest` or a `spine`, or an entry lacks its identifying attributes
    pub fn parse(content: &str) -> Result<Self> {
        let mut reader = NsReader::from_str(strip_bom(content));
        reader.config_mut().trim_text(true);

        let mut package = Self::default();
        let mut seen_root = false;
        let mut seen_manifest = false;
        let mut seen_spine = false;
        let mut section = Section::Other;

        loop {
            let (ns, event) = reader
                .read_resolved_event()
                .map_err(|err| Error::MalformedPackage(err.to_string()))?;
            let in_opf = is_bound_to(&ns, OPF_NS);

            match event {
                Event::Start(ref e) | Event::Empty(ref e) => {
                    let is_empty = matches!(event, Event::Empty(_));
                    let local_name = e.local_name();
                    let local_name = local_name.as_ref();

                    if !seen_root {
                        if !in_opf || local_name != b"package" {
                            return Err(Error::MalformedPackage(
                                "root element is not an OPF package".to_string(),
                            ));
                        }
                        seen_root = true;
                        continue;
                    }

                    if !in_opf {
                        continue;
                    }

                    match (section, local_name) {
                        (Section::Other, b"manifest") => {
                            seen_manifest = true;
                            if !is_empty {
                                section = Section::Manifest;
                            }
                        }
                        (Section::Other, b"spine") => {
                            seen_spine = true;
                            if !is_empty {
                                section = Section::Spine;
                            }
                        }
                        (Section::Manifest, b"item") => {
                            let id = required_attribute(e, b"id").map_err(Error::MalformedPackage)?;
                            let href =
                                required_attribute(e, b"href").map_err(Error::MalformedPackage)?;
                            package.insert_item(id, href);
                        }
                        (Section::Spine, b"itemref") => {
                            let idref =
                                required_attribute(e, b"idref").map_err(Error::MalformedPackage)?;
                            package.spine.push(idref);
                        }
                        _ => {}
                    }
                }
                Event::End(ref e) if in_opf => match (section, e.local_name().as_ref()) {
                    (Section::Manifest, b"manifest") | (Section::Spine, b"spine") => {
                        section = Section::Other;
                    }
                    _ => {}
                },
                Event::Eof => break,
                _ => {}
            }
        }

        if !seen_root {
            return Err(Error::MalformedPackage("document is empty".to_string()));
        }
        if !seen_manifest {
            return Err(Error::MalformedPackage("no manifest found".to_string()));
        }
        if !seen_spine {
            return Err(Error::MalformedPackage("no spine found".to_string()));
        }

        Ok(package)
    }

    fn insert_item(&mut self, id: String, href: String) {
        if let Some(previous) = self.manifest.insert(id.clone(), href) {
            warn!("manifest id {id} declared more than once, {previous} is overridden");
            self.duplicate_ids.push(id);
        }
    }

    #[must_use]
    pub fn href(&self, id: &str) -> Option<&str> {
        self.manifest.get(id).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opf(manifest: &str, spine: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="utf-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="2.0" unique-identifier="uid">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:opf="http://www.idpf.org/2007/opf">
    <dc:title>Book</dc:title>
    <dc:identifier id="uid">urn:uuid:1</dc:identifier>
    <meta name="cover" content="im1"/>
  </metadata>
  <manifest>{manifest}</manifest>
  <spine toc="ncx">{spine}</spine>
</package>"#
        )
    }

    #[test]
    fn manifest_and_spine() {
        let content = opf(
            r#"<item id="c1" href="ch1.xhtml" media-type="application/xhtml+xml"/>
               <item id="im1" href="images/cover.jpg" media-type="image/jpeg"/>"#,
            r#"<itemref idref="im1"/><itemref idref="c1" linear="yes"/>"#,
        );

        let package = Package::parse(&content).unwrap();

        assert_eq!(package.href("c1"), Some("ch1.xhtml"));
        assert_eq!(package.href("im1"), Some("images/cover.jpg"));
        assert_eq!(package.spine, vec!["im1", "c1"]);
        assert!(package.duplicate_ids.is_empty());
    }

    #[test]
    fn spine_keeps_duplicates_in_order() {
        let content = opf(
            r#"<item id="a" href="a.png"/><item id="b" href="b.png"/>"#,
            r#"<itemref idref="b"/><itemref idref="a"/><itemref idref="b"/>"#,
        );

        assert_eq!(Package::parse(&content).unwrap().spine, vec!["b", "a", "b"]);
    }

    #[test]
    fn duplicate_manifest_ids_are_reported_and_last_wins() {
        let content = opf(
            r#"<item id="a" href="first.png"/><item id="a" href="second.png"/>"#,
            r#"<itemref idref="a"/>"#,
        );

        let package = Package::parse(&content).unwrap();

        assert_eq!(package.href("a"), Some("second.png"));
        assert_eq!(package.duplicate_ids, vec!["a"]);
    }

    #[test]
    fn prefixed_opf_namespace_and_escaped_hrefs() {
        let content = r#"<opf:package xmlns:opf="http://www.idpf.org/2007/opf">
  <opf:manifest><opf:item id="p1" href="Tom &amp; Jerry.jpg"></opf:item></opf:manifest>
  <opf:spine><opf:itemref idref="p1"/></opf:spine>
</opf:package>"#;

        let package = Package::parse(content).unwrap();

        assert_eq!(package.href("p1"), Some("Tom & Jerry.jpg"));
        assert_eq!(package.spine, vec!["p1"]);
    }

    #[test]
    fn elements_outside_the_opf_namespace_are_ignored() {
        let content = opf(
            r#"<item id="a" href="a.png"/><x:item xmlns:x="urn:other" id="b" href="b.png"/>"#,
            r#"<itemref idref="a"/>"#,
        );

        let package = Package::parse(&content).unwrap();

        assert_eq!(package.manifest.len(), 1);
    }

    #[test]
    fn empty_sections_are_valid() {
        let content = opf("", "");
        let package = Package::parse(&content).unwrap();
        assert!(package.manifest.is_empty());
        assert!(package.spine.is_empty());

        let content = r#"<package xmlns="http://www.idpf.org/2007/opf"><manifest/><spine/></package>"#;
        assert!(Package::parse(content).is_ok());
    }

    #[test]
    fn root_must_be_an_opf_package() {
        let content = r#"<package><manifest/><spine/></package>"#;

        assert!(matches!(
            Package::parse(content),
            Err(Error::MalformedPackage(_))
        ));
    }

    #[test]
    fn missing_spine() {
        let content = r#"<package xmlns="http://www.idpf.org/2007/opf"><manifest/></package>"#;

        assert!(matches!(
            Package::parse(content),
            Err(Error::MalformedPackage(reason)) if reason.contains("spine")
        ));
    }

    #[test]
    fn item_without_href() {
        let content = opf(r#"<item id="a"/>"#, "");

        assert!(matches!(
            Package::parse(&content),
            Err(Error::MalformedPackage(reason)) if reason.contains("href")
        ));
    }

    #[test]
    fn broken_xml() {
        let content = r#"<package xmlns="http://www.idpf.org/2007/opf"><manifest></spine></package>"#;

        assert!(matches!(
            Package::parse(content),
            Err(Error::MalformedPackage(_))
        ));
        assert!(matches!(
            Package::parse(""),
            Err(Error::MalformedPackage(_))
        ));
    }
}
