//! Metadata parsing for Calibre metadata.opf files
//!
//! Only the fields used for identity matching and scoping are extracted:
//! title, authors, uuid, tags and identifiers.

use quick_xml::de::from_str;
use serde::Deserialize;
use std::collections::HashMap;

use crate::error::Result;

/// Parsed Calibre metadata
#[derive(Debug, Clone, Default)]
pub struct CalibreMetadata {
    pub title: Option<String>,
    pub title_sort: Option<String>,
    pub authors: Vec<String>,
    pub author_sort: Option<String>,
    pub tags: Vec<String>,
    pub identifiers: HashMap<String, String>,
}

impl CalibreMetadata {
    /// Parse metadata from an OPF XML string
    pub fn parse(xml: &str) -> Result<Self> {
        let package: OpfPackage = from_str(xml)?;
        Ok(Self::from_opf(package.metadata))
    }

    /// Calibre uuid, stored as the `uuid_id` / `uuid`-scheme identifier
    pub fn uuid(&self) -> Option<&str> {
        self.identifiers
            .get("uuid")
            .or_else(|| self.identifiers.get("uuid_id"))
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
    }

    fn from_opf(metadata: OpfMetadata) -> Self {
        let mut result = CalibreMetadata {
            title: metadata
                .title
                .map(|t| t.content.trim().to_string())
                .filter(|t| !t.is_empty()),
            ..Default::default()
        };

        for creator in metadata.creator.unwrap_or_default() {
            // Editors, illustrators etc. are not authors
            if matches!(creator.role.as_deref(), Some(role) if role != "aut") {
                continue;
            }
            if let Some(name) = creator.content.map(|n| n.trim().to_string()) {
                if !name.is_empty() {
                    result.authors.push(name);
                }
            }
            if result.author_sort.is_none() {
                result.author_sort = creator.file_as;
            }
        }

        result.tags = metadata
            .subject
            .unwrap_or_default()
            .into_iter()
            .map(|s| s.content.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        for id in metadata.identifier.unwrap_or_default() {
            if let (Some(scheme), Some(value)) = (id.scheme.or(id.id), id.content) {
                let key = scheme.to_lowercase().replace("calibre:", "");
                result.identifiers.insert(key, value.trim().to_string());
            }
        }

        for meta in metadata.meta.unwrap_or_default() {
            if meta.name.as_deref() == Some("calibre:title_sort") {
                result.title_sort = meta.content;
            }
        }

        result
    }
}

// OPF XML structures for deserialization

#[derive(Debug, Deserialize)]
struct OpfPackage {
    metadata: OpfMetadata,
}

#[derive(Debug, Deserialize)]
struct OpfMetadata {
    #[serde(rename = "title", default)]
    title: Option<DcElement>,

    #[serde(rename = "creator", default)]
    creator: Option<Vec<DcCreator>>,

    #[serde(rename = "subject", default)]
    subject: Option<Vec<DcElement>>,

    #[serde(rename = "identifier", default)]
    identifier: Option<Vec<DcIdentifier>>,

    #[serde(rename = "meta", default)]
    meta: Option<Vec<OpfMeta>>,
}

#[derive(Debug, Deserialize)]
struct DcElement {
    #[serde(rename = "$text", default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct DcCreator {
    #[serde(rename = "@file-as", default)]
    file_as: Option<String>,

    #[serde(rename = "@role", default)]
    role: Option<String>,

    #[serde(rename = "$text", default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DcIdentifier {
    #[serde(rename = "@id", default)]
    id: Option<String>,

    #[serde(rename = "@scheme", default)]
    scheme: Option<String>,

    #[serde(rename = "$text", default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpfMeta {
    #[serde(rename = "@name", default)]
    name: Option<String>,

    #[serde(rename = "@content", default)]
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_calibre_opf() {
        let xml = r#"<?xml version='1.0' encoding='utf-8'?>
<package xmlns="http://www.idpf.org/2007/opf" unique-identifier="uuid_id" version="2.0">
    <metadata xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:opf="http://www.idpf.org/2007/opf">
        <dc:identifier opf:scheme="calibre" id="calibre_id">17</dc:identifier>
        <dc:identifier opf:scheme="uuid" id="uuid_id">3f0d1b2c-aaaa-bbbb-cccc-0123456789ab</dc:identifier>
        <dc:title>Dune</dc:title>
        <dc:creator opf:file-as="Herbert, Frank" opf:role="aut">Frank Herbert</dc:creator>
        <dc:creator opf:role="edt">Some Editor</dc:creator>
        <dc:subject>Science Fiction</dc:subject>
        <dc:subject>Classics</dc:subject>
        <meta name="calibre:title_sort" content="Dune"/>
    </metadata>
</package>"#;

        let metadata = CalibreMetadata::parse(xml).unwrap();
        assert_eq!(metadata.title.as_deref(), Some("Dune"));
        assert_eq!(metadata.authors, vec!["Frank Herbert".to_string()]);
        assert_eq!(metadata.author_sort.as_deref(), Some("Herbert, Frank"));
        assert_eq!(metadata.tags, vec!["Science Fiction", "Classics"]);
        assert_eq!(metadata.uuid(), Some("3f0d1b2c-aaaa-bbbb-cccc-0123456789ab"));
        assert_eq!(metadata.identifiers.get("calibre").map(String::as_str), Some("17"));
        assert_eq!(metadata.title_sort.as_deref(), Some("Dune"));
    }

    #[test]
    fn test_missing_uuid() {
        let xml = r#"<package><metadata><title>Untitled</title></metadata></package>"#;
        let metadata = CalibreMetadata::parse(xml).unwrap();
        assert_eq!(metadata.title.as_deref(), Some("Untitled"));
        assert!(metadata.uuid().is_none());
        assert!(metadata.authors.is_empty());
    }
}
