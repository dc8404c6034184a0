//! Compiled library (ELM) representation
//!
//! Both precompiled kinds are read into one shape: the full ELM JSON document
//! plus the few header parts the caches look at (identifier, annotations,
//! usings, includes). Verbose XML payloads are converted to the JSON layout on
//! the way in.

mod xml;

use crate::content::LibraryContentKind;
use crate::error::{LibraryError, LibraryResult};
use crate::identifier::VersionedIdentifier;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Known model URLs for `using` declarations.
const MODEL_URLS: &[(&str, &str)] = &[
    ("FHIR", "http://hl7.org/fhir"),
    ("QDM", "urn:healthit-gov:qdm:v5_4"),
];

/// Structured translator metadata (`CqlToElmInfo`).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CqlToElmInfo {
    #[serde(default)]
    pub translator_version: Option<String>,
    #[serde(default)]
    pub translator_options: Option<String>,
    #[serde(default)]
    pub signature_level: Option<String>,
}

/// An annotation element read from verbose ELM, kept as raw attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlAnnotation {
    pub name: String,
    pub attributes: IndexMap<String, String>,
}

/// The annotation shapes a compiled library can carry.
#[derive(Debug, Clone, PartialEq)]
pub enum Annotation {
    /// Typed translator metadata
    CqlToElmInfo(CqlToElmInfo),
    /// Untyped key/value object from compact ELM
    Properties(IndexMap<String, Value>),
    /// Element from verbose ELM; options live in a delimited attribute
    XmlElement(XmlAnnotation),
    Other(Value),
}

impl Annotation {
    fn from_json(value: &Value) -> Self {
        let Some(object) = value.as_object() else {
            return Self::Other(value.clone());
        };
        if object.get("type").and_then(Value::as_str) == Some("CqlToElmInfo") {
            if let Ok(info) = serde_json::from_value::<CqlToElmInfo>(value.clone()) {
                return Self::CqlToElmInfo(info);
            }
        }
        Self::Properties(object.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
    }

    /// The delimited translator option list recorded by this annotation, if any.
    pub fn translator_options(&self) -> Option<&str> {
        match self {
            Self::CqlToElmInfo(info) => info.translator_options.as_deref(),
            Self::Properties(map) => map.get("translatorOptions").and_then(Value::as_str),
            Self::XmlElement(element) => element.attributes.get("translatorOptions").map(String::as_str),
            Self::Other(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsingDef {
    pub local_identifier: String,
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncludeDef {
    #[serde(default)]
    pub local_identifier: Option<String>,
    pub path: String,
    #[serde(default)]
    pub version: Option<String>,
}

/// A compiled CQL library.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledLibrary {
    pub identifier: VersionedIdentifier,
    pub annotations: Vec<Annotation>,
    pub usings: Vec<UsingDef>,
    pub includes: Vec<IncludeDef>,
    /// Full ELM document (`{"library": {...}}`)
    pub elm: Value,
}

impl CompiledLibrary {
    /// Build from an ELM JSON document.
    pub fn from_elm(elm: Value) -> LibraryResult<Self> {
        let library = elm
            .get("library")
            .ok_or_else(|| LibraryError::invalid_elm("document has no library element"))?;

        let identifier = library
            .get("identifier")
            .cloned()
            .ok_or_else(|| LibraryError::invalid_elm("library has no identifier"))
            .and_then(|value| {
                serde_json::from_value::<VersionedIdentifier>(value)
                    .map_err(|e| LibraryError::invalid_elm(format!("invalid identifier: {e}")))
            })?;

        let annotations = library
            .get("annotation")
            .and_then(Value::as_array)
            .map(|items| items.iter().map(Annotation::from_json).collect())
            .unwrap_or_default();

        let usings = read_defs(library, "usings")?;
        let includes = read_defs(library, "includes")?;

        Ok(Self {
            identifier,
            annotations,
            usings,
            includes,
            elm,
        })
    }

    /// Read compact (JSON) ELM.
    pub fn from_json(bytes: &[u8]) -> LibraryResult<Self> {
        let elm: Value = serde_json::from_slice(bytes).map_err(|e| {
            LibraryError::invalid_elm(format!("Error encountered while reading ELM json: {e}"))
        })?;
        Self::from_elm(elm)
    }

    /// Read verbose (XML) ELM.
    pub fn from_xml(bytes: &[u8]) -> LibraryResult<Self> {
        let document = xml::read_document(bytes)?;
        let mut library = Self::from_elm(document.elm)?;
        library.annotations = document
            .annotations
            .into_iter()
            .map(Annotation::XmlElement)
            .collect();
        Ok(library)
    }

    /// Read a precompiled payload of the given kind.
    pub fn read(bytes: &[u8], kind: LibraryContentKind) -> LibraryResult<Self> {
        match kind {
            LibraryContentKind::ElmJson => Self::from_json(bytes),
            LibraryContentKind::ElmXml => Self::from_xml(bytes),
            LibraryContentKind::Cql => Err(LibraryError::invalid_elm(
                "CQL source is not a compiled library",
            )),
        }
    }

    /// `(model, version, url)` for each `using` except `System`.
    pub fn usings_with_urls(&self) -> Vec<(String, Option<String>, Option<String>)> {
        self.usings
            .iter()
            .filter(|using| using.local_identifier != "System")
            .map(|using| {
                let url = MODEL_URLS
                    .iter()
                    .find(|(name, _)| *name == using.local_identifier)
                    .map(|(_, url)| url.to_string());
                (using.local_identifier.clone(), using.version.clone(), url)
            })
            .collect()
    }
}

fn read_defs<T: for<'de> Deserialize<'de>>(library: &Value, section: &str) -> LibraryResult<Vec<T>> {
    let Some(defs) = library.get(section).and_then(|s| s.get("def")) else {
        return Ok(Vec::new());
    };
    // A lone definition converted from XML may not be wrapped in an array
    let defs = match defs {
        Value::Array(_) => defs.clone(),
        other => Value::Array(vec![other.clone()]),
    };
    serde_json::from_value(defs)
        .map_err(|e| LibraryError::invalid_elm(format!("invalid {section} section: {e}")))
}
