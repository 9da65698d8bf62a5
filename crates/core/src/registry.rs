//! Closed registry of domain types
//!
//! Every persistable domain type is enumerated here, together with the
//! collection that stores it. The mapping is a static table built once at
//! first use and read-only thereafter; looking up a name that is not in the
//! table is a configuration error and fails fast rather than degrading into
//! a soft "not found".

use crate::error::{Error, Result};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Type tag for domain objects
///
/// Discriminates the collections of the imaging pipeline metadata store.
/// The enum is intentionally closed: adding a collection means adding a
/// variant and a row in [`DomainType::ALL`], nothing is discovered at
/// runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DomainType {
    /// Imaging sample processed by the pipeline
    Sample,
    /// Named set of samples sharing processing defaults
    DataSet,
    /// Primary or secondary pipeline image
    Image,
    /// Color depth MIP image
    ColorDepthImage,
    /// Library grouping color depth images
    ColorDepthLibrary,
    /// Annotation attached to another domain object
    Annotation,
    /// Hierarchical term tree used for annotation vocabularies
    Ontology,
    /// Tracing sample for manual neuron reconstruction
    TmSample,
    /// Tracing workspace holding reconstructed neurons
    TmWorkspace,
    /// Single reconstructed neuron
    TmNeuron,
}

impl DomainType {
    /// All registered domain types
    pub const ALL: [DomainType; 10] = [
        DomainType::Sample,
        DomainType::DataSet,
        DomainType::Image,
        DomainType::ColorDepthImage,
        DomainType::ColorDepthLibrary,
        DomainType::Annotation,
        DomainType::Ontology,
        DomainType::TmSample,
        DomainType::TmWorkspace,
        DomainType::TmNeuron,
    ];

    /// The type name used in encoded references ("Sample#2345")
    pub fn type_name(&self) -> &'static str {
        match self {
            DomainType::Sample => "Sample",
            DomainType::DataSet => "DataSet",
            DomainType::Image => "Image",
            DomainType::ColorDepthImage => "ColorDepthImage",
            DomainType::ColorDepthLibrary => "ColorDepthLibrary",
            DomainType::Annotation => "Annotation",
            DomainType::Ontology => "Ontology",
            DomainType::TmSample => "TmSample",
            DomainType::TmWorkspace => "TmWorkspace",
            DomainType::TmNeuron => "TmNeuron",
        }
    }

    /// The collection storing objects of this type
    pub fn collection(&self) -> &'static str {
        match self {
            DomainType::Sample => "sample",
            DomainType::DataSet => "dataSet",
            DomainType::Image => "image",
            DomainType::ColorDepthImage => "colorDepthImage",
            DomainType::ColorDepthLibrary => "colorDepthLibrary",
            DomainType::Annotation => "annotation",
            DomainType::Ontology => "ontology",
            DomainType::TmSample => "tmSample",
            DomainType::TmWorkspace => "tmWorkspace",
            DomainType::TmNeuron => "tmNeuron",
        }
    }

    /// Look up a domain type by its type name
    ///
    /// # Errors
    /// Fails fast with [`Error::UnknownDomainType`] for names outside the
    /// registry.
    pub fn from_name(name: &str) -> Result<Self> {
        BY_NAME
            .get(name)
            .copied()
            .ok_or_else(|| Error::UnknownDomainType(name.to_string()))
    }

    /// Look up a domain type by its collection name
    ///
    /// # Errors
    /// Fails fast with [`Error::UnknownCollection`] for collections no
    /// registered type maps to.
    pub fn from_collection(collection: &str) -> Result<Self> {
        BY_COLLECTION
            .get(collection)
            .copied()
            .ok_or_else(|| Error::UnknownCollection(collection.to_string()))
    }
}

impl fmt::Display for DomainType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.type_name())
    }
}

impl FromStr for DomainType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        DomainType::from_name(s)
    }
}

static BY_NAME: Lazy<HashMap<&'static str, DomainType>> = Lazy::new(|| {
    DomainType::ALL
        .iter()
        .map(|t| (t.type_name(), *t))
        .collect()
});

static BY_COLLECTION: Lazy<HashMap<&'static str, DomainType>> = Lazy::new(|| {
    DomainType::ALL
        .iter()
        .map(|t| (t.collection(), *t))
        .collect()
});
