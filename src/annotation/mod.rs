//! Genome annotation data model and spliced-coordinate machinery.

pub mod assemble;
pub mod coords;
pub mod geometry;
pub mod index;

use std::collections::{HashMap, HashSet};

use indexmap::{IndexMap, IndexSet};

/// Attribute keys that carry multiple values in the Gencode data model.
///
/// See <https://www.gencodegenes.org/pages/data_format.html>.  Callers that
/// tokenize annotation files should collect these keys into sets; all other
/// keys are scalars.
pub const DEFAULT_MULTIVALUE_KEYS: &[&str] = &["tag", "ont", "ccdsid"];

/// Enumeration for the two strands of the genome.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, strum::Display, strum::EnumString,
)]
pub enum Strand {
    #[strum(serialize = "+")]
    Plus,
    #[strum(serialize = "-")]
    Minus,
}

/// Classification of an annotation record by its `type` column.
#[derive(Debug, Clone, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum FeatureKind {
    Gene,
    Transcript,
    Exon,
    #[strum(serialize = "CDS")]
    Cds,
    StartCodon,
    StopCodon,
    #[strum(serialize = "UTR")]
    Utr,
    /// Any other `type` value; kept verbatim.
    #[strum(default)]
    Other(String),
}

/// Value of a single record attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttrValue {
    /// Scalar attribute such as `gene_id`.
    Scalar(String),
    /// Multi-valued attribute such as `tag`, collected as a set.
    Multi(IndexSet<String>),
}

impl AttrValue {
    /// Return the scalar value, `None` for multi-valued attributes.
    pub fn as_scalar(&self) -> Option<&str> {
        match self {
            AttrValue::Scalar(value) => Some(value),
            AttrValue::Multi(_) => None,
        }
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        AttrValue::Scalar(value.to_string())
    }
}

/// One annotated genomic feature record.
///
/// Coordinates are 0-based, half-open (`[start, stop)`).  Records are created
/// once per parsed annotation line and are immutable afterwards; the
/// `attributes_*` helpers return derived copies.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    /// Name of the reference sequence the feature lies on.
    pub contig: String,
    /// 0-based start position.
    pub start: u64,
    /// 0-based end position (exclusive).
    pub stop: u64,
    /// The strand.
    pub strand: Strand,
    /// Feature classification from the `type` column.
    pub kind: FeatureKind,
    /// Attribute mapping in parse order.
    pub attributes: IndexMap<String, AttrValue>,
}

impl Feature {
    /// Length of the feature in bases.
    pub fn length(&self) -> u64 {
        self.stop - self.start
    }

    /// Look up an attribute value by key.
    pub fn attribute(&self, key: &str) -> Option<&AttrValue> {
        self.attributes.get(key)
    }

    /// Look up a mandatory scalar attribute, with the feature's location in
    /// the error message.
    fn mandatory_scalar(&self, key: &str) -> Result<&str, anyhow::Error> {
        self.attributes
            .get(key)
            .and_then(AttrValue::as_scalar)
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "{} record at {}:{}-{} lacks mandatory attribute {:?}",
                    self.kind,
                    self.contig,
                    self.start,
                    self.stop,
                    key
                )
            })
    }

    /// The `gene_id` attribute.
    pub fn gene_id(&self) -> Result<&str, anyhow::Error> {
        self.mandatory_scalar("gene_id")
    }

    /// The `transcript_id` attribute.
    pub fn transcript_id(&self) -> Result<&str, anyhow::Error> {
        self.mandatory_scalar("transcript_id")
    }

    /// The `gene_type` attribute.
    pub fn gene_type(&self) -> Result<&str, anyhow::Error> {
        self.mandatory_scalar("gene_type")
    }

    /// The `transcript_type` attribute.
    pub fn transcript_type(&self) -> Result<&str, anyhow::Error> {
        self.mandatory_scalar("transcript_type")
    }

    /// Return a copy with attribute keys renamed according to `mapping`.
    ///
    /// Keys absent from `mapping` are kept as they are.
    pub fn attributes_renamed(&self, mapping: &HashMap<String, String>) -> Feature {
        let attributes = self
            .attributes
            .iter()
            .map(|(key, value)| {
                let key = mapping.get(key).unwrap_or(key).clone();
                (key, value.clone())
            })
            .collect();
        Feature {
            attributes,
            ..self.clone()
        }
    }

    /// Return a copy restricted to the attribute keys in `keep`.
    pub fn attributes_filtered(&self, keep: &HashSet<String>) -> Feature {
        let attributes = self
            .attributes
            .iter()
            .filter(|(key, _)| keep.contains(*key))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        Feature {
            attributes,
            ..self.clone()
        }
    }
}
