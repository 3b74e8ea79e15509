//! Txclip library main entry point.
//!
//! Maintains a genome annotation index over gene/transcript/exon/CDS records
//! and transforms between genomic and transcript-local (spliced) coordinates:
//! per-transcript CDS windows, 5'->3' segment ordering, spliced
//! sequence/profile assembly, and clipping of transcript-coordinate intervals
//! to CDS windows.

pub mod annotation;
pub mod clip;
pub mod common;
