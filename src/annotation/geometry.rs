//! Strand-aware relations between positions and segments.

use super::{Feature, Strand};

/// Errors for geometrically inconsistent segment sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum GeometryError {
    /// No segments were given, so no strand can be derived.
    #[error("cannot derive a strand from an empty segment set")]
    NoSegments,
    /// The segments lie on more than one strand.
    #[error("segments lie on inconsistent strands")]
    InconsistentStrand,
}

/// Return the single strand shared by all `segments`.
pub fn strand_of<'a>(
    segments: impl IntoIterator<Item = &'a Feature>,
) -> Result<Strand, GeometryError> {
    let mut result = None;
    for segment in segments {
        match result {
            None => result = Some(segment.strand),
            Some(strand) if strand != segment.strand => {
                return Err(GeometryError::InconsistentStrand)
            }
            Some(_) => (),
        }
    }
    result.ok_or(GeometryError::NoSegments)
}

/// Whether `segment` contains the position `pos`.
pub fn contains_position(segment: &Feature, pos: u64) -> bool {
    segment.start <= pos && pos < segment.stop
}

/// Whether `segment` lies entirely 5' of `pos` in transcript direction.
pub fn is_upstream_of(segment: &Feature, pos: u64, strand: Strand) -> bool {
    match strand {
        Strand::Plus => segment.stop <= pos,
        Strand::Minus => segment.start > pos,
    }
}

/// Order `segments` in 5'->3' (biological) direction.
///
/// Ascending by start coordinate on the plus strand, descending on the minus
/// strand.  The shared strand is derived from the segments themselves.
pub fn order_5_to_3<'a>(segments: &[&'a Feature]) -> Result<Vec<&'a Feature>, GeometryError> {
    let strand = strand_of(segments.iter().copied())?;
    let mut ordered = segments.to_vec();
    match strand {
        Strand::Plus => ordered.sort_by_key(|segment| segment.start),
        Strand::Minus => ordered.sort_by_key(|segment| std::cmp::Reverse(segment.start)),
    }
    Ok(ordered)
}

#[cfg(test)]
mod test {
    use indexmap::IndexMap;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::annotation::FeatureKind;

    fn segment(start: u64, stop: u64, strand: Strand) -> Feature {
        Feature {
            contig: String::from("chr1"),
            start,
            stop,
            strand,
            kind: FeatureKind::Exon,
            attributes: IndexMap::new(),
        }
    }

    #[test]
    fn strand_of_consistent_set() -> Result<(), anyhow::Error> {
        let segments = vec![segment(0, 10, Strand::Minus), segment(20, 30, Strand::Minus)];
        assert_eq!(strand_of(&segments)?, Strand::Minus);
        Ok(())
    }

    #[test]
    fn strand_of_rejects_mixed_and_empty() {
        let mixed = vec![segment(0, 10, Strand::Plus), segment(20, 30, Strand::Minus)];
        assert_eq!(strand_of(&mixed), Err(GeometryError::InconsistentStrand));
        let empty: Vec<Feature> = vec![];
        assert_eq!(strand_of(&empty), Err(GeometryError::NoSegments));
    }

    #[rstest::rstest]
    #[case(99, false)]
    #[case(100, true)]
    #[case(199, true)]
    #[case(200, false)]
    fn contains_position_is_half_open(#[case] pos: u64, #[case] expected: bool) {
        let exon = segment(100, 200, Strand::Plus);
        assert_eq!(contains_position(&exon, pos), expected);
    }

    #[rstest::rstest]
    #[case(Strand::Plus, 200, true)]
    #[case(Strand::Plus, 199, false)]
    #[case(Strand::Minus, 99, true)]
    #[case(Strand::Minus, 100, false)]
    fn upstream_is_strand_aware(#[case] strand: Strand, #[case] pos: u64, #[case] expected: bool) {
        let exon = segment(100, 200, strand);
        assert_eq!(is_upstream_of(&exon, pos, strand), expected);
    }

    #[test]
    fn order_5_to_3_follows_strand() -> Result<(), anyhow::Error> {
        let a = segment(0, 100, Strand::Plus);
        let b = segment(200, 300, Strand::Plus);
        let ordered = order_5_to_3(&[&b, &a])?;
        assert_eq!(
            ordered.iter().map(|s| s.start).collect::<Vec<_>>(),
            vec![0, 200]
        );

        let a = segment(0, 100, Strand::Minus);
        let b = segment(200, 300, Strand::Minus);
        let ordered = order_5_to_3(&[&a, &b])?;
        assert_eq!(
            ordered.iter().map(|s| s.start).collect::<Vec<_>>(),
            vec![200, 0]
        );
        Ok(())
    }
}
