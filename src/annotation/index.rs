//! Annotation registries built from a stream of feature records.

use std::collections::{HashMap, HashSet};

use rustc_hash::FxHashMap;

use super::geometry;
use super::{Feature, FeatureKind, Strand};

/// Attributes the coordinate machinery depends on; always retained by
/// attribute projection.
pub const MANDATORY_ATTRIBUTES: &[&str] =
    &["gene_id", "transcript_id", "gene_type", "transcript_type"];

/// Options for building an [`Annotation`] from a record stream.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Keep only protein-coding genes/transcripts and their sub-features.
    pub coding_only: bool,
    /// Restrict each record's attributes to this allow-list (the mandatory
    /// attributes are force-included).
    pub relevant_attributes: Option<HashSet<String>>,
    /// Rename attribute keys before filtering/projection.
    pub attr_mapping: Option<HashMap<String, String>>,
}

/// Index over an annotation record stream.
///
/// Built once by a full pass over the input records and read-only afterwards.
/// Sub-features are kept in insertion order as parsed, not biologically
/// ordered; ordering is the caller's responsibility via
/// [`geometry::order_5_to_3`].
#[derive(Debug, Default)]
pub struct Annotation {
    gene_by_id: FxHashMap<String, Feature>,
    transcript_by_id: FxHashMap<String, Feature>,
    gene_id_by_transcript: FxHashMap<String, String>,
    transcript_ids_by_gene: FxHashMap<String, Vec<String>>,
    parts_by_transcript: FxHashMap<String, Vec<Feature>>,
}

impl Annotation {
    /// Build the index from a record stream in arbitrary order.
    pub fn load(
        records: impl IntoIterator<Item = Feature>,
        options: &LoadOptions,
    ) -> Result<Self, anyhow::Error> {
        let relevant_attributes = options.relevant_attributes.as_ref().map(|relevant| {
            let mut keep = relevant.clone();
            keep.extend(MANDATORY_ATTRIBUTES.iter().map(|key| key.to_string()));
            keep
        });

        let mut annotation = Annotation::default();
        for record in records {
            let record = match &options.attr_mapping {
                Some(mapping) => record.attributes_renamed(mapping),
                None => record,
            };
            let record = match &relevant_attributes {
                Some(keep) => record.attributes_filtered(keep),
                None => record,
            };
            if options.coding_only && !is_coding(&record)? {
                continue;
            }
            annotation.push(record)?;
        }
        Ok(annotation)
    }

    /// Route a single record into the gene registry, the transcript registry,
    /// or the transcript's sub-feature collection.
    pub fn push(&mut self, record: Feature) -> Result<(), anyhow::Error> {
        let gene_id = record.gene_id()?.to_string();
        match record.kind {
            FeatureKind::Gene => {
                self.transcript_ids_by_gene.entry(gene_id.clone()).or_default();
                self.gene_by_id.insert(gene_id, record);
            }
            FeatureKind::Transcript => {
                let transcript_id = record.transcript_id()?.to_string();
                self.gene_id_by_transcript
                    .insert(transcript_id.clone(), gene_id.clone());
                self.transcript_ids_by_gene
                    .entry(gene_id)
                    .or_default()
                    .push(transcript_id.clone());
                self.transcript_by_id.insert(transcript_id, record);
            }
            _ => {
                let transcript_id = record.transcript_id()?.to_string();
                self.parts_by_transcript
                    .entry(transcript_id)
                    .or_default()
                    .push(record);
            }
        }
        Ok(())
    }

    /// Look up a gene record by `gene_id`.
    pub fn gene(&self, gene_id: &str) -> Option<&Feature> {
        self.gene_by_id.get(gene_id)
    }

    /// Look up a transcript record by `transcript_id`.
    pub fn transcript(&self, transcript_id: &str) -> Option<&Feature> {
        self.transcript_by_id.get(transcript_id)
    }

    /// The `gene_id` a transcript belongs to.
    pub fn gene_id_of_transcript(&self, transcript_id: &str) -> Option<&str> {
        self.gene_id_by_transcript
            .get(transcript_id)
            .map(String::as_str)
    }

    /// All transcript records of a gene, in insertion order.
    pub fn transcripts_of_gene(&self, gene_id: &str) -> Vec<&Feature> {
        self.transcript_ids_by_gene
            .get(gene_id)
            .map(|transcript_ids| {
                transcript_ids
                    .iter()
                    .filter_map(|transcript_id| self.transcript_by_id.get(transcript_id))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Iterate over all known transcript ids (arbitrary order).
    pub fn transcript_ids(&self) -> impl Iterator<Item = &str> {
        self.transcript_by_id.keys().map(String::as_str)
    }

    /// All sub-features of a transcript, in insertion order.
    pub fn parts(&self, transcript_id: &str) -> &[Feature] {
        self.parts_by_transcript
            .get(transcript_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    fn parts_of_kind(&self, transcript_id: &str, kind: &FeatureKind) -> Vec<&Feature> {
        self.parts(transcript_id)
            .iter()
            .filter(|part| part.kind == *kind)
            .collect()
    }

    /// The exon segments of a transcript.
    pub fn exons(&self, transcript_id: &str) -> Vec<&Feature> {
        self.parts_of_kind(transcript_id, &FeatureKind::Exon)
    }

    /// The CDS segments of a transcript.
    pub fn cds(&self, transcript_id: &str) -> Vec<&Feature> {
        self.parts_of_kind(transcript_id, &FeatureKind::Cds)
    }

    /// The start-codon segments of a transcript.
    ///
    /// A list because some transcripts have no annotated start/stop codon
    /// while others have several segments due to splicing.
    pub fn start_codons(&self, transcript_id: &str) -> Vec<&Feature> {
        self.parts_of_kind(transcript_id, &FeatureKind::StartCodon)
    }

    /// The stop-codon segments of a transcript, cf. [`Annotation::start_codons`].
    pub fn stop_codons(&self, transcript_id: &str) -> Vec<&Feature> {
        self.parts_of_kind(transcript_id, &FeatureKind::StopCodon)
    }

    /// The UTR segments of a transcript.
    pub fn utrs(&self, transcript_id: &str) -> Vec<&Feature> {
        self.parts_of_kind(transcript_id, &FeatureKind::Utr)
    }

    /// The strand shared by all sub-features of a transcript.
    pub fn strand(&self, transcript_id: &str) -> Result<Strand, anyhow::Error> {
        geometry::strand_of(self.parts(transcript_id)).map_err(|err| {
            anyhow::anyhow!("transcript {:?}: {}", transcript_id, err)
        })
    }
}

/// Whether a record belongs to the protein-coding subset.
///
/// A gene record passes iff its `gene_type` is `protein_coding`; any other
/// record additionally requires `transcript_type == protein_coding`.
pub fn is_coding(record: &Feature) -> Result<bool, anyhow::Error> {
    if record.gene_type()? != "protein_coding" {
        return Ok(false);
    }
    if record.kind != FeatureKind::Gene && record.transcript_type()? != "protein_coding" {
        return Ok(false);
    }
    Ok(true)
}
