//! Transcript-relative CDS windows and their persisted form.

use std::io::{Read, Write};
use std::path::Path;

use rayon::prelude::*;
use rustc_hash::FxHashMap;

use super::geometry::{self, GeometryError};
use super::index::Annotation;
use super::Strand;

/// Errors of the genomic-to-spliced coordinate transform.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoordsError {
    /// The transcript id is absent from the annotation index.
    #[error("transcript {transcript_id:?} is not in the annotation index")]
    UnknownTranscript { transcript_id: String },
    /// The transcript has no CDS segments, so no coding window exists.
    #[error("transcript {transcript_id:?} has no CDS segments")]
    NoCdsSegments { transcript_id: String },
    /// The transcript's segments have no single strand.
    #[error("transcript {transcript_id:?}: {source}")]
    Strand {
        transcript_id: String,
        #[source]
        source: GeometryError,
    },
    /// Not exactly one exon contains the genomic CDS-start position.
    #[error(
        "transcript {transcript_id:?}: {count} exons contain the genomic CDS start \
         at position {genomic_cds_start} (expected exactly one)"
    )]
    CdsExonMatches {
        transcript_id: String,
        genomic_cds_start: u64,
        count: usize,
    },
    /// The derived window leaves the spliced transcript, e.g. for a CDS
    /// segment spanning an intron gap.
    #[error(
        "transcript {transcript_id:?}: derived CDS window [{cds_start}, {cds_stop}) \
         exceeds the transcript length {transcript_length}"
    )]
    WindowOutOfBounds {
        transcript_id: String,
        cds_start: u64,
        cds_stop: u64,
        transcript_length: u64,
    },
    /// A per-position vector is too short for the transcript's CDS window.
    #[error(
        "transcript {transcript_id:?}: profile of length {len} is shorter than \
         the CDS window end {cds_stop}"
    )]
    ProfileTooShort {
        transcript_id: String,
        len: usize,
        cds_stop: u64,
    },
}

/// Boundaries of a transcript's coding region in spliced coordinates.
///
/// `cds_start`/`cds_stop` are 0-based half-open offsets into the spliced
/// transcript sequence, independent of strand.  Derived once per coding
/// transcript, then typically persisted as TSV and reused by downstream
/// clipping/profile steps.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CodingTranscriptInfo {
    /// Gene the transcript belongs to.
    pub gene_id: String,
    /// The transcript id.
    pub transcript_id: String,
    /// Total length of the spliced transcript (sum of exon lengths).
    pub transcript_length: u64,
    /// Offset of the first coding base.
    pub cds_start: u64,
    /// Offset past the last coding base.
    pub cds_stop: u64,
}

impl CodingTranscriptInfo {
    /// Length of the coding region.
    pub fn cds_length(&self) -> u64 {
        self.cds_stop - self.cds_start
    }

    /// Length of the 5' untranslated region.
    pub fn utr_5_length(&self) -> u64 {
        self.cds_start
    }

    /// Length of the 3' untranslated region.
    pub fn utr_3_length(&self) -> u64 {
        self.transcript_length - self.cds_stop
    }

    /// Slice the CDS window out of a per-position vector over the full
    /// spliced transcript.
    pub fn cds_profile<'a, T>(&self, profile: &'a [T]) -> Result<&'a [T], CoordsError> {
        if (profile.len() as u64) < self.cds_stop {
            return Err(CoordsError::ProfileTooShort {
                transcript_id: self.transcript_id.clone(),
                len: profile.len(),
                cds_stop: self.cds_stop,
            });
        }
        Ok(&profile[self.cds_start as usize..self.cds_stop as usize])
    }

    /// Write infos as tab-separated rows with a header line.
    pub fn write_tsv<W: Write>(
        infos: &[CodingTranscriptInfo],
        write: W,
    ) -> Result<(), anyhow::Error> {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .has_headers(true)
            .from_writer(write);
        for info in infos {
            writer.serialize(info)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Read infos back from their tab-separated form.
    pub fn read_tsv<R: Read>(read: R) -> Result<Vec<CodingTranscriptInfo>, anyhow::Error> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(true)
            .from_reader(read);
        let mut infos = Vec::new();
        for result in reader.deserialize() {
            infos.push(result?);
        }
        Ok(infos)
    }

    /// Load a persisted CDS annotation into a mapping keyed by transcript id.
    pub fn load_transcript_cds_info<P: AsRef<Path>>(
        path: P,
    ) -> Result<FxHashMap<String, CodingTranscriptInfo>, anyhow::Error> {
        let reader = crate::common::open_read_maybe_gz(path)?;
        let infos = Self::read_tsv(reader)?;
        Ok(infos
            .into_iter()
            .map(|info| (info.transcript_id.clone(), info))
            .collect())
    }
}

impl Annotation {
    /// Compute the coding window of a transcript in spliced coordinates.
    ///
    /// Splicing means genomic distance is not transcript distance: the
    /// offset of the CDS start is the summed length of all exons entirely 5'
    /// of the genomic CDS-start position plus the partial offset within the
    /// single exon containing it.  Exons are assumed pairwise non-overlapping
    /// with the CDS contained in the exon set; this is not independently
    /// verified, but a window that leaves the spliced transcript is rejected
    /// rather than returned.
    pub fn coding_transcript_info(
        &self,
        transcript_id: &str,
    ) -> Result<CodingTranscriptInfo, CoordsError> {
        let gene_id = self
            .gene_id_of_transcript(transcript_id)
            .ok_or_else(|| CoordsError::UnknownTranscript {
                transcript_id: transcript_id.to_string(),
            })?
            .to_string();
        let exons = self.exons(transcript_id);
        let cds_segments = self.cds(transcript_id);
        if cds_segments.is_empty() {
            return Err(CoordsError::NoCdsSegments {
                transcript_id: transcript_id.to_string(),
            });
        }
        let strand = geometry::strand_of(self.parts(transcript_id)).map_err(|source| {
            CoordsError::Strand {
                transcript_id: transcript_id.to_string(),
                source,
            }
        })?;

        let transcript_length: u64 = exons.iter().map(|exon| exon.length()).sum();
        let cds_length: u64 = cds_segments.iter().map(|cds| cds.length()).sum();

        // Genomic position of the 5' boundary of the CDS: the lowest start on
        // the plus strand, the last base (coordinates are half-open) of the
        // highest segment on the minus strand.
        let genomic_cds_start = match strand {
            Strand::Plus => cds_segments.iter().map(|cds| cds.start).min(),
            Strand::Minus => cds_segments.iter().map(|cds| cds.stop - 1).max(),
        }
        .expect("CDS segments checked non-empty above");

        let containing = exons
            .iter()
            .copied()
            .filter(|exon| geometry::contains_position(exon, genomic_cds_start))
            .collect::<Vec<_>>();
        let exon_with_cds = match containing.as_slice() {
            [exon] => *exon,
            _ => {
                return Err(CoordsError::CdsExonMatches {
                    transcript_id: transcript_id.to_string(),
                    genomic_cds_start,
                    count: containing.len(),
                })
            }
        };

        let len_exons_before_cds: u64 = exons
            .iter()
            .filter(|exon| geometry::is_upstream_of(exon, genomic_cds_start, strand))
            .map(|exon| exon.length())
            .sum();

        // Offset of the CDS start within its embracing exon.
        let cds_offset = match strand {
            Strand::Plus => genomic_cds_start - exon_with_cds.start,
            Strand::Minus => (exon_with_cds.stop - 1) - genomic_cds_start,
        };

        let cds_start = cds_offset + len_exons_before_cds;
        let cds_stop = cds_start + cds_length;
        if cds_stop > transcript_length {
            return Err(CoordsError::WindowOutOfBounds {
                transcript_id: transcript_id.to_string(),
                cds_start,
                cds_stop,
                transcript_length,
            });
        }

        Ok(CodingTranscriptInfo {
            gene_id,
            transcript_id: transcript_id.to_string(),
            transcript_length,
            cds_start,
            cds_stop,
        })
    }

    /// Compute the coding window of every transcript that has CDS segments.
    ///
    /// Transcripts are independent, so the computation is a data-parallel
    /// map; the result is sorted by transcript id for deterministic output.
    /// Transcripts with geometric inconsistencies are skipped and reported.
    pub fn coding_transcript_infos(&self) -> Vec<CodingTranscriptInfo> {
        let mut transcript_ids = self
            .transcript_ids()
            .filter(|transcript_id| !self.cds(transcript_id).is_empty())
            .collect::<Vec<_>>();
        transcript_ids.sort_unstable();

        transcript_ids
            .par_iter()
            .filter_map(|transcript_id| match self.coding_transcript_info(transcript_id) {
                Ok(info) => Some(info),
                Err(err) => {
                    tracing::warn!("skipping coding transcript: {}", err);
                    None
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::annotation::index::test::{record, two_exon_records};
    use crate::annotation::index::LoadOptions;
    use crate::annotation::FeatureKind;

    fn info(transcript_length: u64, cds_start: u64, cds_stop: u64) -> CodingTranscriptInfo {
        CodingTranscriptInfo {
            gene_id: String::from("G1"),
            transcript_id: String::from("T1"),
            transcript_length,
            cds_start,
            cds_stop,
        }
    }

    /// A minus-strand transcript with the same spliced geometry as
    /// `two_exon_records`, i.e. coordinates mirrored around position 300.
    fn two_exon_records_minus() -> Vec<crate::annotation::Feature> {
        vec![
            record(FeatureKind::Gene, 0, 300, Strand::Minus, "G1", ""),
            record(FeatureKind::Transcript, 0, 300, Strand::Minus, "G1", "T1"),
            record(FeatureKind::Exon, 0, 100, Strand::Minus, "G1", "T1"),
            record(FeatureKind::Exon, 200, 300, Strand::Minus, "G1", "T1"),
            record(FeatureKind::Cds, 40, 80, Strand::Minus, "G1", "T1"),
        ]
    }

    #[test]
    fn splicing_offsets_on_plus_strand() -> Result<(), anyhow::Error> {
        let annotation = Annotation::load(two_exon_records(), &LoadOptions::default())?;
        let result = annotation.coding_transcript_info("T1")?;
        // 100 bases of the first exon plus 20 within the second.
        assert_eq!(result, info(200, 120, 160));
        Ok(())
    }

    #[test]
    fn mirrored_minus_strand_gives_same_window() -> Result<(), anyhow::Error> {
        let annotation = Annotation::load(two_exon_records_minus(), &LoadOptions::default())?;
        let result = annotation.coding_transcript_info("T1")?;
        assert_eq!(result, info(200, 120, 160));
        Ok(())
    }

    #[test]
    fn multi_segment_cds_spans_exon_boundary() -> Result<(), anyhow::Error> {
        // CDS starts in the first exon and continues in the second.
        let records = vec![
            record(FeatureKind::Gene, 0, 300, Strand::Plus, "G1", ""),
            record(FeatureKind::Transcript, 0, 300, Strand::Plus, "G1", "T1"),
            record(FeatureKind::Exon, 0, 100, Strand::Plus, "G1", "T1"),
            record(FeatureKind::Exon, 200, 300, Strand::Plus, "G1", "T1"),
            record(FeatureKind::Cds, 90, 100, Strand::Plus, "G1", "T1"),
            record(FeatureKind::Cds, 200, 230, Strand::Plus, "G1", "T1"),
        ];
        let annotation = Annotation::load(records, &LoadOptions::default())?;
        let result = annotation.coding_transcript_info("T1")?;
        assert_eq!(result, info(200, 90, 130));
        Ok(())
    }

    #[test]
    fn window_invariant_holds() -> Result<(), anyhow::Error> {
        let annotation = Annotation::load(two_exon_records(), &LoadOptions::default())?;
        let result = annotation.coding_transcript_info("T1")?;
        assert!(result.cds_start <= result.cds_stop);
        assert!(result.cds_stop <= result.transcript_length);
        Ok(())
    }

    #[test]
    fn non_coding_transcript_is_an_error() -> Result<(), anyhow::Error> {
        let records = two_exon_records()
            .into_iter()
            .filter(|record| record.kind != FeatureKind::Cds)
            .collect::<Vec<_>>();
        let annotation = Annotation::load(records, &LoadOptions::default())?;
        assert_eq!(
            annotation.coding_transcript_info("T1"),
            Err(CoordsError::NoCdsSegments {
                transcript_id: String::from("T1")
            })
        );
        Ok(())
    }

    #[test]
    fn unknown_transcript_is_an_error() -> Result<(), anyhow::Error> {
        let annotation = Annotation::load(two_exon_records(), &LoadOptions::default())?;
        assert_eq!(
            annotation.coding_transcript_info("missing"),
            Err(CoordsError::UnknownTranscript {
                transcript_id: String::from("missing")
            })
        );
        Ok(())
    }

    #[test]
    fn cds_start_outside_exons_is_an_error() -> Result<(), anyhow::Error> {
        // CDS start falls into the intron gap.
        let mut records = two_exon_records();
        records.push(record(FeatureKind::Cds, 150, 160, Strand::Plus, "G1", "T1"));
        let annotation = Annotation::load(records, &LoadOptions::default())?;
        assert_eq!(
            annotation.coding_transcript_info("T1"),
            Err(CoordsError::CdsExonMatches {
                transcript_id: String::from("T1"),
                genomic_cds_start: 150,
                count: 0,
            })
        );
        Ok(())
    }

    #[test]
    fn mixed_strand_parts_are_an_error() -> Result<(), anyhow::Error> {
        let mut records = two_exon_records();
        records.push(record(FeatureKind::Exon, 400, 450, Strand::Minus, "G1", "T1"));
        let annotation = Annotation::load(records, &LoadOptions::default())?;
        assert_eq!(
            annotation.coding_transcript_info("T1"),
            Err(CoordsError::Strand {
                transcript_id: String::from("T1"),
                source: GeometryError::InconsistentStrand,
            })
        );
        Ok(())
    }

    #[test]
    fn whole_index_computation_skips_broken_transcripts() -> Result<(), anyhow::Error> {
        let mut records = two_exon_records();
        // second transcript whose CDS starts in an intron gap
        records.extend([
            record(FeatureKind::Transcript, 0, 300, Strand::Plus, "G1", "T2"),
            record(FeatureKind::Exon, 0, 100, Strand::Plus, "G1", "T2"),
            record(FeatureKind::Exon, 200, 300, Strand::Plus, "G1", "T2"),
            record(FeatureKind::Cds, 150, 160, Strand::Plus, "G1", "T2"),
        ]);
        let annotation = Annotation::load(records, &LoadOptions::default())?;
        let infos = annotation.coding_transcript_infos();
        assert_eq!(
            infos.iter().map(|i| i.transcript_id.as_str()).collect::<Vec<_>>(),
            vec!["T1"]
        );
        Ok(())
    }

    #[test]
    fn cds_profile_is_the_window_slice() -> Result<(), anyhow::Error> {
        let info = info(200, 120, 160);
        let profile = (0u32..200).collect::<Vec<_>>();
        let cds = info.cds_profile(&profile)?;
        assert_eq!(cds.len(), (info.cds_stop - info.cds_start) as usize);
        assert_eq!(cds.first(), Some(&120));
        assert_eq!(cds.last(), Some(&159));

        let short = vec![0u32; 100];
        assert!(matches!(
            info.cds_profile(&short),
            Err(CoordsError::ProfileTooShort { .. })
        ));
        Ok(())
    }

    #[test]
    fn tsv_round_trip() -> Result<(), anyhow::Error> {
        let infos = vec![info(200, 120, 160)];
        let mut buf = Vec::new();
        CodingTranscriptInfo::write_tsv(&infos, &mut buf)?;
        let text = String::from_utf8(buf.clone())?;
        assert_eq!(
            text,
            "gene_id\ttranscript_id\ttranscript_length\tcds_start\tcds_stop\n\
             G1\tT1\t200\t120\t160\n"
        );
        assert_eq!(CodingTranscriptInfo::read_tsv(buf.as_slice())?, infos);
        Ok(())
    }

    #[test]
    fn load_transcript_cds_info_keys_by_transcript() -> Result<(), anyhow::Error> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("cds_features.tsv");
        CodingTranscriptInfo::write_tsv(&[info(200, 120, 160)], std::fs::File::create(&path)?)?;
        let by_transcript = CodingTranscriptInfo::load_transcript_cds_info(&path)?;
        assert_eq!(by_transcript.len(), 1);
        assert_eq!(by_transcript["T1"].cds_start, 120);
        Ok(())
    }
}
