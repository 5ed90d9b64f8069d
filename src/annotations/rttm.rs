// RTTM codec
// One record per line:
//   SPEAKER <uri> <channel> <start> <duration> <NA> <NA> <speakerId> <NA>
// Only start, duration and speakerId carry meaning here; the remaining
// fields are written as literal placeholders and ignored on read.

use std::fs;
use std::path::Path;

use log::info;
use thiserror::Error;

use super::store::AnnotationRecord;

#[derive(Debug, Error)]
pub enum RttmError {
    #[error("line {line}: {reason}")]
    MalformedLine { line: usize, reason: MalformedLine },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// What exactly was wrong with a rejected line.
#[derive(Debug, Error, PartialEq)]
pub enum MalformedLine {
    #[error("expected at least 8 fields, found {0}")]
    FieldCount(usize),
    #[error("invalid start time {0:?}")]
    Start(String),
    #[error("invalid duration {0:?}")]
    Duration(String),
}

// The used fields of one line, picked out by name before validation
struct RttmLine<'a> {
    start: &'a str,
    duration: &'a str,
    speaker: &'a str,
}

/// Parse RTTM text into records.
///
/// Fail-fast: the first malformed line aborts the whole parse with its
/// 1-based line number. Loading into a store goes through an atomic
/// replacement, so a failed load leaves the previous table intact.
pub fn parse(text: &str) -> Result<Vec<AnnotationRecord>, RttmError> {
    let mut records = Vec::new();

    for (index, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        let record = parse_line(line).map_err(|reason| RttmError::MalformedLine {
            line: index + 1,
            reason,
        })?;
        records.push(record);
    }

    Ok(records)
}

fn parse_line(line: &str) -> Result<AnnotationRecord, MalformedLine> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 8 {
        return Err(MalformedLine::FieldCount(fields.len()));
    }

    let line = RttmLine {
        start: fields[3],
        duration: fields[4],
        speaker: fields[7],
    };

    let start: f64 = line
        .start
        .parse()
        .map_err(|_| MalformedLine::Start(line.start.to_string()))?;
    if !(start >= 0.0) {
        return Err(MalformedLine::Start(line.start.to_string()));
    }

    let duration: f64 = line
        .duration
        .parse()
        .map_err(|_| MalformedLine::Duration(line.duration.to_string()))?;
    if !(duration > 0.0) {
        return Err(MalformedLine::Duration(line.duration.to_string()));
    }

    Ok(AnnotationRecord::new(
        start,
        start + duration,
        line.speaker,
    ))
}

/// Serialize records to RTTM text, one line per record.
///
/// Start and duration are both written at two decimals, so a round trip
/// reproduces every field within 0.01s.
pub fn serialize<'a, I>(records: I) -> String
where
    I: IntoIterator<Item = &'a AnnotationRecord>,
{
    let mut out = String::new();
    for record in records {
        out.push_str(&format!(
            "SPEAKER unknown 1 {:.2} {:.2} <NA> <NA> {} <NA>\n",
            record.start_secs,
            record.duration_secs(),
            record.speaker
        ));
    }
    out
}

/// Read and parse an RTTM file.
pub fn read_file<P: AsRef<Path>>(path: P) -> Result<Vec<AnnotationRecord>, RttmError> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)?;
    let records = parse(&text)?;
    info!("read {} records from {:?}", records.len(), path);
    Ok(records)
}

/// Serialize records and write them to a file.
pub fn write_file<'a, P, I>(path: P, records: I) -> Result<(), RttmError>
where
    P: AsRef<Path>,
    I: IntoIterator<Item = &'a AnnotationRecord>,
{
    let path = path.as_ref();
    fs::write(path, serialize(records))?;
    info!("wrote RTTM file {:?}", path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_reference_line() {
        let records = parse("SPEAKER f 1 2.0 1.5 <NA> <NA> spk1 <NA>\n").unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].start_secs, 2.0);
        assert_eq!(records[0].end_secs, 3.5);
        assert_eq!(records[0].speaker, "spk1");
    }

    #[test]
    fn test_parse_skips_blank_lines() {
        let text = "\nSPEAKER f 1 0.0 1.0 <NA> <NA> a <NA>\n\n   \nSPEAKER f 1 1.0 2.0 <NA> <NA> b <NA>\n";
        let records = parse(text).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].speaker, "b");
    }

    #[test]
    fn test_parse_rejects_short_line() {
        let err = parse("SPEAKER f 1 2.0\n").unwrap_err();
        match err {
            RttmError::MalformedLine { line, reason } => {
                assert_eq!(line, 1);
                assert_eq!(reason, MalformedLine::FieldCount(4));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_parse_rejects_non_numeric_start() {
        let err = parse("SPEAKER f 1 abc 1.5 <NA> <NA> spk1 <NA>\n").unwrap_err();
        match err {
            RttmError::MalformedLine { reason, .. } => {
                assert_eq!(reason, MalformedLine::Start("abc".into()));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_parse_rejects_negative_start_and_zero_duration() {
        assert!(parse("SPEAKER f 1 -1.0 1.5 <NA> <NA> spk1 <NA>\n").is_err());
        assert!(parse("SPEAKER f 1 1.0 0.0 <NA> <NA> spk1 <NA>\n").is_err());
    }

    #[test]
    fn test_parse_fails_fast_with_line_number() {
        let text = "SPEAKER f 1 0.0 1.0 <NA> <NA> a <NA>\nSPEAKER broken\n";
        let err = parse(text).unwrap_err();
        match err {
            RttmError::MalformedLine { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_serialize_reference_record() {
        let records = vec![AnnotationRecord::new(2.0, 3.5, "spk1")];
        assert_eq!(
            serialize(&records),
            "SPEAKER unknown 1 2.00 1.50 <NA> <NA> spk1 <NA>\n"
        );
    }

    #[test]
    fn test_round_trip_within_tolerance() {
        let original = vec![AnnotationRecord::new(1.0, 3.5, "A")];
        let parsed = parse(&serialize(&original)).unwrap();

        assert_eq!(parsed.len(), 1);
        assert!((parsed[0].start_secs - 1.0).abs() < 0.01);
        assert!((parsed[0].end_secs - 3.5).abs() < 0.01);
        assert_eq!(parsed[0].speaker, "A");
    }

    #[test]
    fn test_round_trip_rounds_fractional_times() {
        let original = vec![AnnotationRecord::new(1.234, 5.678, "spk0")];
        let parsed = parse(&serialize(&original)).unwrap();

        assert!((parsed[0].start_secs - 1.234).abs() <= 0.01);
        assert!((parsed[0].end_secs - 5.678).abs() <= 0.02);
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("turns.rttm");
        let records = vec![
            AnnotationRecord::new(0.0, 2.5, "alice"),
            AnnotationRecord::new(2.5, 4.0, "bob"),
        ];

        write_file(&path, &records).unwrap();
        let loaded = read_file(&path).unwrap();

        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].speaker, "alice");
        assert!((loaded[1].end_secs - 4.0).abs() < 0.01);
    }

    #[test]
    fn test_read_missing_file_is_io_error() {
        let err = read_file("/nonexistent/turns.rttm").unwrap_err();
        assert!(matches!(err, RttmError::Io(_)));
    }
}
