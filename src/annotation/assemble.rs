//! Stitching per-segment payloads into spliced transcript records.

use std::path::Path;

use itertools::Itertools;
use rustc_hash::FxHashMap;

use super::geometry;
use super::index::Annotation;
use super::{Feature, Strand};

/// Which segment set of a transcript to assemble.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum SegmentSet {
    /// The single unspliced transcript span.
    Full,
    /// The exon segments (the mature spliced transcript).
    Exons,
    /// The CDS segments only.
    Cds,
    /// The CDS segments plus the stop-codon segments.
    CdsWithStop,
}

/// One segment to hand to the extraction collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentQuery {
    /// Reference sequence name.
    pub contig: String,
    /// 0-based start position.
    pub start: u64,
    /// 0-based end position (exclusive).
    pub stop: u64,
    /// The strand; minus-strand payloads come back reverse-complemented.
    pub strand: Strand,
    /// Name to group results by, here the transcript id.
    pub name: String,
}

/// External collaborator that extracts one payload per segment.
///
/// Implementations must return one record per query, in query order, with the
/// query's name as the record name (an optional `(+)`/`(-)` strand suffix on
/// the name is tolerated and stripped before grouping).  Payloads of
/// minus-strand segments must already be strand-corrected.
pub trait SegmentExtractor {
    type Payload;

    /// Extract payloads for a whole batch of segments in one invocation.
    fn extract(
        &mut self,
        queries: &[SegmentQuery],
    ) -> Result<Vec<(String, Self::Payload)>, anyhow::Error>;
}

/// Concatenation of per-segment payloads into one spliced value.
pub trait Stitch: Sized {
    fn stitched(parts: Vec<Self>) -> Self;
}

impl<T> Stitch for Vec<T> {
    fn stitched(parts: Vec<Self>) -> Self {
        parts.into_iter().flatten().collect()
    }
}

impl Stitch for String {
    fn stitched(parts: Vec<Self>) -> Self {
        parts.concat()
    }
}

/// Strip the `(+)`/`(-)` marker an extractor may append to record names.
pub fn strip_strand_suffix(name: &str) -> &str {
    name.strip_suffix("(+)")
        .or_else(|| name.strip_suffix("(-)"))
        .unwrap_or(name)
}

impl Annotation {
    /// Select a transcript's segment set and order it 5'->3'.
    pub fn ordered_segments(
        &self,
        transcript_id: &str,
        set: SegmentSet,
    ) -> Result<Vec<&Feature>, anyhow::Error> {
        let segments = match set {
            SegmentSet::Full => {
                let transcript = self.transcript(transcript_id).ok_or_else(|| {
                    anyhow::anyhow!("transcript {:?} is not in the annotation index", transcript_id)
                })?;
                return Ok(vec![transcript]);
            }
            SegmentSet::Exons => self.exons(transcript_id),
            SegmentSet::Cds => self.cds(transcript_id),
            SegmentSet::CdsWithStop => {
                let mut segments = self.cds(transcript_id);
                segments.extend(self.stop_codons(transcript_id));
                segments
            }
        };
        geometry::order_5_to_3(&segments)
            .map_err(|err| anyhow::anyhow!("transcript {:?}: {}", transcript_id, err))
    }
}

/// Assemble one spliced payload per transcript.
///
/// An explicit staged pipeline: select and order each transcript's segments,
/// delegate all segments to `extractor` as one whole batch, group the
/// returned records contiguously per transcript id, and concatenate payloads
/// in the 5'->3' order already established by the queries.
pub fn assemble<E>(
    annotation: &Annotation,
    transcript_ids: &[String],
    set: SegmentSet,
    extractor: &mut E,
) -> Result<Vec<(String, E::Payload)>, anyhow::Error>
where
    E: SegmentExtractor,
    E::Payload: Stitch,
{
    let mut queries = Vec::new();
    for transcript_id in transcript_ids {
        for segment in annotation.ordered_segments(transcript_id, set)? {
            queries.push(SegmentQuery {
                contig: segment.contig.clone(),
                start: segment.start,
                stop: segment.stop,
                strand: segment.strand,
                name: transcript_id.clone(),
            });
        }
    }

    let records = extractor.extract(&queries)?;

    let mut result = Vec::new();
    for (name, group) in &records
        .into_iter()
        .chunk_by(|(name, _)| strip_strand_suffix(name).to_string())
    {
        let parts = group.map(|(_, payload)| payload).collect::<Vec<_>>();
        result.push((name, E::Payload::stitched(parts)));
    }
    Ok(result)
}

/// Extractor backed by an in-memory reference sequence set.
///
/// Returns the raw segment sequence for plus-strand queries and the reverse
/// complement for minus-strand queries, with the strand suffix appended to
/// the record name.
pub struct FastaExtractor {
    seqs: FxHashMap<String, Vec<u8>>,
}

impl FastaExtractor {
    /// Load all reference sequences from a FASTA file.
    pub fn from_path<P: AsRef<Path> + std::fmt::Debug>(path: P) -> Result<Self, anyhow::Error> {
        let reader = bio::io::fasta::Reader::from_file(&path)?;
        let mut seqs = FxHashMap::default();
        for result in reader.records() {
            let record = result?;
            seqs.insert(record.id().to_string(), record.seq().to_vec());
        }
        tracing::debug!(
            "loaded {} reference sequences from {:?}",
            seqs.len(),
            path.as_ref()
        );
        Ok(FastaExtractor { seqs })
    }
}

impl SegmentExtractor for FastaExtractor {
    type Payload = Vec<u8>;

    fn extract(
        &mut self,
        queries: &[SegmentQuery],
    ) -> Result<Vec<(String, Vec<u8>)>, anyhow::Error> {
        let mut result = Vec::with_capacity(queries.len());
        for query in queries {
            let seq = self.seqs.get(&query.contig).ok_or_else(|| {
                anyhow::anyhow!("sequence {:?} missing from the reference", query.contig)
            })?;
            if query.stop as usize > seq.len() {
                anyhow::bail!(
                    "segment {}:{}-{} exceeds reference length {}",
                    query.contig,
                    query.start,
                    query.stop,
                    seq.len()
                );
            }
            let payload = &seq[query.start as usize..query.stop as usize];
            let payload = match query.strand {
                Strand::Plus => payload.to_vec(),
                Strand::Minus => bio::alphabets::dna::revcomp(payload),
            };
            result.push((format!("{}({})", query.name, query.strand), payload));
        }
        Ok(result)
    }
}
