use nom::bytes::complete::{is_not, tag};
use nom::character::complete::char;
use nom::sequence::delimited;
use nom::IResult;
use std::str::FromStr;

/// Number of tab-separated columns in a GTF line.
pub const GTF_FIELDS: usize = 9;

const GENE_NAME_KEY: &str = "gene_name \"";

/// A parsed GTF record. The string
/// fields are borrowed from the buffer
/// containing the GTF line.
#[derive(Debug, Clone, PartialEq)]
pub struct Record<'a> {
    pub seqname: &'a str,
    pub source: &'a str,
    pub feature_type: &'a str,
    pub start: u64,
    pub end: u64,
    pub score: Option<f64>,
    pub strand: &'a str,
    pub frame: &'a str,
    pub attributes: &'a str,
}

/// Why a GTF line could not be turned into a `Record`. Callers that only
/// consume a handful of exon records skip these lines and keep going.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MalformedRecord {
    #[error("expected {GTF_FIELDS} tab-separated elements but found {found}")]
    FieldCount { found: usize },

    #[error("{field}: expected an integer, not \"{value}\"")]
    Coordinate { field: &'static str, value: String },
}

impl<'a> Record<'a> {
    /// The value of the first `gene_name "..."` token in the attributes.
    /// Empty values (`gene_name ""`) do not count as a match.
    pub fn gene_name(&self) -> Option<&'a str> {
        let attributes = self.attributes;
        attributes
            .match_indices(GENE_NAME_KEY)
            .find_map(|(pos, _)| quoted_gene_name(&attributes[pos..]).ok())
            .map(|(_, name)| name)
    }

    /// Length of the feature in bases, counting both ends.
    pub fn len(&self) -> u64 {
        self.start.abs_diff(self.end) + 1
    }

    pub fn is_exon(&self) -> bool {
        self.feature_type == "exon"
    }
}

fn quoted_gene_name(input: &str) -> IResult<&str, &str> {
    delimited(tag(GENE_NAME_KEY), is_not("\""), char('"'))(input)
}

fn parse_coordinate(field: &'static str, value: &str) -> Result<u64, MalformedRecord> {
    u64::from_str(value).map_err(|_| MalformedRecord::Coordinate {
        field,
        value: value.to_string(),
    })
}

/// Parse one line of a GTF file into a `Record<'a>`. Only the column count
/// and the two coordinates are checked; the remaining columns are kept as
/// text. A score of `.` or one that is not a number is `None`.
pub fn parse_gtf_line(line: &str) -> Result<Record<'_>, MalformedRecord> {
    let fields: Vec<&str> = line.split('\t').collect();
    let [seqname, source, feature_type, start, end, score, strand, frame, attributes] =
        fields[..]
    else {
        return Err(MalformedRecord::FieldCount {
            found: fields.len(),
        });
    };

    Ok(Record {
        seqname,
        source,
        feature_type,
        start: parse_coordinate("start", start)?,
        end: parse_coordinate("end", end)?,
        score: f64::from_str(score).ok(),
        strand,
        frame,
        attributes,
    })
}
