//! Clipping of transcript-coordinate intervals to CDS windows.

use std::fmt;
use std::io::{BufRead, Write};
use std::str::FromStr;
use std::time::Instant;

use clap::Parser;
use indexmap::IndexMap;
use rustc_hash::FxHashMap;

use crate::annotation::coords::CodingTranscriptInfo;

/// BED-like interval record.
///
/// `contig` holds a genomic chromosome name or a transcript id depending on
/// the pipeline stage; `rest` carries any non-standard columns through
/// unmodified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interval {
    /// Contig name (chromosome or transcript id).
    pub contig: String,
    /// 0-based start position.
    pub start: u64,
    /// 0-based end position (exclusive).
    pub stop: u64,
    /// Pass-through columns after the first three.
    pub rest: Vec<String>,
}

impl Interval {
    /// Construct an interval without pass-through columns.
    pub fn new(contig: &str, start: u64, stop: u64) -> Self {
        Interval {
            contig: contig.to_string(),
            start,
            stop,
            rest: Vec::new(),
        }
    }
}

impl FromStr for Interval {
    type Err = anyhow::Error;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut fields = line.split('\t');
        let (Some(contig), Some(start), Some(stop)) =
            (fields.next(), fields.next(), fields.next())
        else {
            anyhow::bail!("interval line has fewer than 3 columns: {:?}", line);
        };
        Ok(Interval {
            contig: contig.to_string(),
            start: start
                .parse()
                .map_err(|err| anyhow::anyhow!("invalid start {:?}: {}", start, err))?,
            stop: stop
                .parse()
                .map_err(|err| anyhow::anyhow!("invalid stop {:?}: {}", stop, err))?,
            rest: fields.map(str::to_string).collect(),
        })
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\t{}\t{}", self.contig, self.start, self.stop)?;
        for field in &self.rest {
            write!(f, "\t{}", field)?;
        }
        Ok(())
    }
}

/// How to name the contig of clipped intervals.
#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ContigNaming {
    /// Keep the original contig name.
    Original,
    /// Rename to `"{contig}:{window_start}-{window_stop}"`.
    #[default]
    Window,
}

/// Group intervals by contig, in one pass over a possibly-unsorted stream.
///
/// First-seen contig order and per-group relative order are preserved, so no
/// pre-sorting of the input is required.
pub fn group_by_contig(
    intervals: impl IntoIterator<Item = Interval>,
) -> IndexMap<String, Vec<Interval>> {
    let mut groups: IndexMap<String, Vec<Interval>> = IndexMap::new();
    for interval in intervals {
        groups.entry(interval.contig.clone()).or_default().push(interval);
    }
    groups
}

fn customized_contig_name(
    contig: &str,
    naming: ContigNaming,
    window_start: u64,
    window_stop: u64,
) -> String {
    match naming {
        ContigNaming::Original => contig.to_string(),
        ContigNaming::Window => format!("{}:{}-{}", contig, window_start, window_stop),
    }
}

/// Remap intervals into coordinates relative to `[window_start, window_stop)`.
///
/// Results of zero or negative length are silently dropped; they are
/// degenerate geometry, not errors.
pub fn clipped_to_window(
    segments: &[Interval],
    window_start: u64,
    window_stop: u64,
    contig_name: &str,
) -> Vec<Interval> {
    segments
        .iter()
        .filter_map(|segment| {
            let new_start = std::cmp::max(0, segment.start as i64 - window_start as i64);
            let new_stop =
                std::cmp::min(window_stop, segment.stop) as i64 - window_start as i64;
            (new_stop - new_start > 0).then(|| Interval {
                contig: contig_name.to_string(),
                start: new_start as u64,
                stop: new_stop as u64,
                rest: segment.rest.clone(),
            })
        })
        .collect()
}

/// Clip one transcript's intervals to its CDS window, less the flanks.
pub fn clipped_to_cds(
    segments: &[Interval],
    cds_info: &CodingTranscriptInfo,
    naming: ContigNaming,
    drop_5_flank: u64,
    drop_3_flank: u64,
) -> Vec<Interval> {
    let window_start = cds_info.cds_start + drop_5_flank;
    let window_stop = cds_info.cds_stop.saturating_sub(drop_3_flank);
    let contig_name = customized_contig_name(
        &cds_info.transcript_id,
        naming,
        window_start,
        window_stop,
    );
    clipped_to_window(segments, window_start, window_stop, &contig_name)
}

/// Clip a whole interval stream against a CDS annotation.
///
/// Intervals whose contig matches a known transcript id are remapped to
/// CDS-relative coordinates; unknown contigs pass through unmodified when
/// `allow_non_matching` is set and are dropped (with a log message)
/// otherwise.
///
/// Attention: combining `allow_non_matching` with a naming mode other than
/// [`ContigNaming::Original`] yields inconsistent contig names between
/// matched (renamed) and unmatched (original-name) groups.
pub fn clipped_by_cds_annotation(
    intervals: impl IntoIterator<Item = Interval>,
    cds_info_by_transcript: &FxHashMap<String, CodingTranscriptInfo>,
    naming: ContigNaming,
    allow_non_matching: bool,
    drop_5_flank: u64,
    drop_3_flank: u64,
) -> Vec<Interval> {
    let mut result = Vec::new();
    for (contig, segments) in group_by_contig(intervals) {
        if let Some(cds_info) = cds_info_by_transcript.get(&contig) {
            result.extend(clipped_to_cds(
                &segments,
                cds_info,
                naming,
                drop_5_flank,
                drop_3_flank,
            ));
        } else if allow_non_matching {
            result.extend(segments);
        } else {
            tracing::debug!(
                "dropping {} intervals on contig {:?} absent from the CDS annotation",
                segments.len(),
                contig
            );
        }
    }
    result
}

/// Command line arguments for the `clip` sub command.
#[derive(Parser, Debug)]
#[command(about = "Clip transcript-coordinate intervals to CDS windows", long_about = None)]
pub struct Args {
    /// Path to the CDS annotation TSV (gene_id, transcript_id,
    /// transcript_length, cds_start, cds_stop).
    #[arg(value_name = "cds_annotation.tsv")]
    pub path_cds_annotation: String,
    /// Path to the interval file (3 standard BED columns + any number of
    /// non-standard ones).
    #[arg(value_name = "bedfile.bed")]
    pub path_bed: String,
    /// Clip N additional nucleotides from the transcript start (5' end).
    #[arg(long, value_name = "N", default_value_t = 0)]
    pub drop_5_flank: u64,
    /// Clip N additional nucleotides from the transcript end (3' end).
    #[arg(long, value_name = "N", default_value_t = 0)]
    pub drop_3_flank: u64,
    /// Pass through intervals on contigs absent from the CDS annotation
    /// (they are not clipped).
    #[arg(long)]
    pub allow_non_matching: bool,
    /// Use the original (chr1) or window-annotated (chr1:23-45) contig name
    /// for resulting intervals.
    #[arg(long, value_enum, default_value_t = ContigNaming::Window)]
    pub contig_naming: ContigNaming,
    /// Path to output file to write to, stdout if missing.
    #[arg(long, short = 'o')]
    pub output_file: Option<String>,
}

/// Main entry point for the `clip` sub command.
pub fn run(common: &crate::common::Args, args: &Args) -> Result<(), anyhow::Error> {
    tracing::info!(
        "Clipping intervals to CDS windows\ncommon args: {:#?}\nargs: {:#?}",
        common,
        args
    );

    if args.allow_non_matching && args.contig_naming != ContigNaming::Original {
        tracing::warn!(
            "with --allow-non-matching, only `--contig-naming original` gives \
             consistent contig names"
        );
    }

    let start = Instant::now();
    let cds_info_by_transcript =
        CodingTranscriptInfo::load_transcript_cds_info(&args.path_cds_annotation)?;
    tracing::info!(
        "loaded CDS annotation for {} transcripts in {:?}",
        cds_info_by_transcript.len(),
        start.elapsed()
    );

    let mut intervals = Vec::new();
    for line in crate::common::open_read_maybe_gz(&args.path_bed)?.lines() {
        let line = line?;
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        intervals.push(line.parse::<Interval>()?);
    }
    tracing::info!("read {} intervals from {:?}", intervals.len(), args.path_bed);

    let clipped = clipped_by_cds_annotation(
        intervals,
        &cds_info_by_transcript,
        args.contig_naming,
        args.allow_non_matching,
        args.drop_5_flank,
        args.drop_3_flank,
    );

    let mut output: Box<dyn Write> = match &args.output_file {
        Some(path) => crate::common::open_write_maybe_gz(path)?,
        None => Box::new(std::io::BufWriter::new(std::io::stdout())),
    };
    for interval in &clipped {
        writeln!(output, "{}", interval)?;
    }
    output.flush()?;
    tracing::info!("wrote {} clipped intervals", clipped.len());

    Ok(())
}
