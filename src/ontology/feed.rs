//! Ontology feed: the class and property hierarchy as delivered by the
//! ontology service
//!
//! The feed is plain data. IRIs are validated when a snapshot is built.

use serde::{Deserialize, Serialize};
use std::path::Path;

use super::OntologyResult;

/// Class declaration with its direct superclasses
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassDeclaration {
    pub iri: String,
    #[serde(default)]
    pub super_classes: Vec<String>,
}

/// Property declaration with its direct superproperties and declared
/// domain and range
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyDeclaration {
    pub iri: String,
    #[serde(default)]
    pub super_properties: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<String>,
}

/// Complete ontology feed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OntologyFeed {
    #[serde(default)]
    pub classes: Vec<ClassDeclaration>,
    #[serde(default)]
    pub properties: Vec<PropertyDeclaration>,
}

impl OntologyFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a feed from its JSON form
    pub fn from_json(json: &str) -> OntologyResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read a JSON feed from disk
    pub fn from_file(path: impl AsRef<Path>) -> OntologyResult<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Add a class
    pub fn with_class<I, S>(mut self, iri: impl Into<String>, super_classes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.classes.push(ClassDeclaration {
            iri: iri.into(),
            super_classes: super_classes.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// Add a property
    pub fn with_property<I, S>(
        mut self,
        iri: impl Into<String>,
        super_properties: I,
        domain: Option<&str>,
        range: Option<&str>,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.properties.push(PropertyDeclaration {
            iri: iri.into(),
            super_properties: super_properties.into_iter().map(Into::into).collect(),
            domain: domain.map(str::to_string),
            range: range.map(str::to_string),
        });
        self
    }
}
