//! Raw filing submission parser.
//!
//! Recovers structured facts from an EDGAR `full-submission.txt`: the fiscal
//! quarter, the three header dates, the filer's CIK, and a best-effort ticker
//! symbol. All scans are line-oriented with first-match semantics; the header
//! labels may appear in any order relative to each other.

use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use chrono::NaiveDate;

pub const PERIOD_OF_REPORT_LABEL: &str = "CONFORMED PERIOD OF REPORT:";
pub const FILED_AS_OF_LABEL: &str = "FILED AS OF DATE:";
pub const DATE_AS_OF_CHANGE_LABEL: &str = "DATE AS OF CHANGE:";
pub const CIK_LABEL: &str = "CENTRAL INDEX KEY:";

/// Marker line preceding the line that carries the `Q<digit>` value.
const FISCAL_PERIOD_MARKER: &str = "Document Fiscal Period Focus</a>";
/// Marker for the primary document filename, e.g. `<FILENAME>aapl-20220930.htm`.
const FILENAME_MARKER: &str = "<FILENAME>";

/// Parse failure over a raw submission. Fatal for the filing being scanned;
/// the scanner never fabricates values.
#[derive(Debug)]
pub enum SubmissionError {
    Io(std::io::Error),
    /// The fiscal-period marker never appeared before end of input
    /// (malformed or non-quarterly submission).
    QuarterNotFound(PathBuf),
    /// One of the three date labels (or the CIK label) is absent.
    LabelNotFound { label: &'static str, file: PathBuf },
    /// No `<FILENAME>` line to recover a ticker from.
    TickerNotFound(PathBuf),
    BadDate { label: &'static str, value: String },
    BadQuarter(String),
}

impl std::fmt::Display for SubmissionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubmissionError::Io(e) => write!(f, "failed to read submission: {}", e),
            SubmissionError::QuarterNotFound(file) => write!(
                f,
                "could not find Document Fiscal Period Focus in {}",
                file.display()
            ),
            SubmissionError::LabelNotFound { label, file } => {
                write!(f, "could not find '{}' in {}", label, file.display())
            }
            SubmissionError::TickerNotFound(file) => {
                write!(f, "could not find a <FILENAME> line in {}", file.display())
            }
            SubmissionError::BadDate { label, value } => {
                write!(f, "'{}' value '{}' is not a YYYYMMDD date", label, value)
            }
            SubmissionError::BadQuarter(value) => {
                write!(f, "fiscal period value '{}' is not Q1..Q4", value)
            }
        }
    }
}

impl std::error::Error for SubmissionError {}

impl From<std::io::Error> for SubmissionError {
    fn from(e: std::io::Error) -> Self {
        SubmissionError::Io(e)
    }
}

/// Structured facts recovered from the submission header in one pass.
#[derive(Debug, Clone)]
pub struct SubmissionHeader {
    pub period_of_report_date: NaiveDate,
    pub filed_as_of_date: NaiveDate,
    pub date_as_of_change: NaiveDate,
    /// Verbatim CIK value; leading zeros preserved.
    pub cik: String,
    /// Uppercased symbol from the first `<FILENAME>` line, up to the first `-`.
    pub ticker: String,
}

/// Line iterator tolerant of the non-UTF-8 payload sections that follow the
/// submission header (uuencoded attachments and the like).
struct LossyLines {
    reader: BufReader<std::fs::File>,
    buf: Vec<u8>,
}

impl LossyLines {
    fn open(path: &Path) -> Result<Self, SubmissionError> {
        let file = std::fs::File::open(path)?;
        Ok(Self {
            reader: BufReader::new(file),
            buf: Vec::new(),
        })
    }
}

impl Iterator for LossyLines {
    type Item = Result<String, SubmissionError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.buf.clear();
        match self.reader.read_until(b'\n', &mut self.buf) {
            Ok(0) => None,
            Ok(_) => Some(Ok(String::from_utf8_lossy(&self.buf)
                .trim_end_matches(['\n', '\r'])
                .to_string())),
            Err(e) => Some(Err(e.into())),
        }
    }
}

/// Extract the fiscal quarter from a quarterly submission.
///
/// Scans for the marker line, then reads the quarter from the *next* line,
/// which embeds `Q<digit>` inside markup:
///
/// ```text
/// ...>Document Fiscal Period Focus</a></td>
/// <td class="text">Q1<span></span>
/// ```
pub fn parse_quarter(path: &Path) -> Result<u8, SubmissionError> {
    let mut lines = LossyLines::open(path)?;

    while let Some(line) = lines.next() {
        if !line?.contains(FISCAL_PERIOD_MARKER) {
            continue;
        }
        let value_line = match lines.next() {
            Some(l) => l?,
            None => return Err(SubmissionError::QuarterNotFound(path.to_path_buf())),
        };
        let value = value_line
            .split('>')
            .nth(1)
            .and_then(|s| s.split('<').next())
            .unwrap_or("")
            .trim()
            .to_string();
        let quarter: u8 = value
            .trim_start_matches('Q')
            .trim()
            .parse()
            .map_err(|_| SubmissionError::BadQuarter(value.clone()))?;
        if !(1..=4).contains(&quarter) {
            return Err(SubmissionError::BadQuarter(value));
        }
        return Ok(quarter);
    }

    Err(SubmissionError::QuarterNotFound(path.to_path_buf()))
}

/// Recover the header facts in a single fused pass.
///
/// First line matching each label wins; the three date labels are not assumed
/// to appear in any fixed order.
pub fn parse_header(path: &Path) -> Result<SubmissionHeader, SubmissionError> {
    let mut period: Option<NaiveDate> = None;
    let mut filed: Option<NaiveDate> = None;
    let mut changed: Option<NaiveDate> = None;
    let mut cik: Option<String> = None;
    let mut ticker: Option<String> = None;

    for line in LossyLines::open(path)? {
        let line = line?;

        if period.is_none() {
            if let Some(value) = value_after(&line, PERIOD_OF_REPORT_LABEL) {
                period = Some(parse_date(PERIOD_OF_REPORT_LABEL, value)?);
            }
        }
        if filed.is_none() {
            if let Some(value) = value_after(&line, FILED_AS_OF_LABEL) {
                filed = Some(parse_date(FILED_AS_OF_LABEL, value)?);
            }
        }
        if changed.is_none() {
            if let Some(value) = value_after(&line, DATE_AS_OF_CHANGE_LABEL) {
                changed = Some(parse_date(DATE_AS_OF_CHANGE_LABEL, value)?);
            }
        }
        if cik.is_none() {
            if let Some(value) = value_after(&line, CIK_LABEL) {
                cik = Some(value.to_string());
            }
        }
        if ticker.is_none() {
            if let Some(rest) = value_after(&line, FILENAME_MARKER) {
                let symbol = rest.split('-').next().unwrap_or("").trim();
                if !symbol.is_empty() {
                    ticker = Some(symbol.to_uppercase());
                }
            }
        }

        if period.is_some()
            && filed.is_some()
            && changed.is_some()
            && cik.is_some()
            && ticker.is_some()
        {
            break;
        }
    }

    let missing_label = |label| SubmissionError::LabelNotFound {
        label,
        file: path.to_path_buf(),
    };

    Ok(SubmissionHeader {
        period_of_report_date: period.ok_or_else(|| missing_label(PERIOD_OF_REPORT_LABEL))?,
        filed_as_of_date: filed.ok_or_else(|| missing_label(FILED_AS_OF_LABEL))?,
        date_as_of_change: changed.ok_or_else(|| missing_label(DATE_AS_OF_CHANGE_LABEL))?,
        cik: cik.ok_or_else(|| missing_label(CIK_LABEL))?,
        ticker: ticker.ok_or_else(|| SubmissionError::TickerNotFound(path.to_path_buf()))?,
    })
}

/// The trimmed remainder of `line` after `label`, if the label occurs.
fn value_after<'a>(line: &'a str, label: &str) -> Option<&'a str> {
    line.find(label).map(|pos| line[pos + label.len()..].trim())
}

fn parse_date(label: &'static str, value: &str) -> Result<NaiveDate, SubmissionError> {
    NaiveDate::parse_from_str(value, "%Y%m%d").map_err(|_| SubmissionError::BadDate {
        label,
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_submission(content: &str) -> (tempfile::TempDir, PathBuf) {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("full-submission.txt");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(content.as_bytes()).unwrap();
        (tmp, path)
    }

    const HEADER: &str = "<SEC-DOCUMENT>0000320193-20-000096.txt : 20221028\n\
CONFORMED PERIOD OF REPORT:\t20220930\n\
FILED AS OF DATE:\t\t20221028\n\
DATE AS OF CHANGE:\t\t20221028\n\
\tCENTRAL INDEX KEY:\t\t\t0000320193\n\
<FILENAME>aapl-20220930.htm\n";

    #[test]
    fn header_recovers_dates_cik_and_ticker() {
        let (_tmp, path) = write_submission(HEADER);
        let header = parse_header(&path).unwrap();
        assert_eq!(
            header.period_of_report_date,
            NaiveDate::from_ymd_opt(2022, 9, 30).unwrap()
        );
        assert_eq!(
            header.filed_as_of_date,
            NaiveDate::from_ymd_opt(2022, 10, 28).unwrap()
        );
        assert_eq!(
            header.date_as_of_change,
            NaiveDate::from_ymd_opt(2022, 10, 28).unwrap()
        );
        assert_eq!(header.cik, "0000320193");
        assert_eq!(header.ticker, "AAPL");
    }

    #[test]
    fn header_label_order_is_free() {
        let shuffled = "\tCENTRAL INDEX KEY:\t0000789019\n\
<FILENAME>msft-20230630.htm\n\
DATE AS OF CHANGE:\t20230727\n\
CONFORMED PERIOD OF REPORT:\t20230630\n\
FILED AS OF DATE:\t20230727\n";
        let (_tmp, path) = write_submission(shuffled);
        let header = parse_header(&path).unwrap();
        assert_eq!(
            header.period_of_report_date,
            NaiveDate::from_ymd_opt(2023, 6, 30).unwrap()
        );
        assert_eq!(header.ticker, "MSFT");
    }

    #[test]
    fn header_first_match_wins() {
        let doubled = format!("{}CONFORMED PERIOD OF REPORT:\t19990101\n", HEADER);
        let (_tmp, path) = write_submission(&doubled);
        let header = parse_header(&path).unwrap();
        assert_eq!(header.period_of_report_date.format("%Y%m%d").to_string(), "20220930");
    }

    #[test]
    fn header_preserves_leading_zeros_in_cik() {
        let (_tmp, path) = write_submission(HEADER);
        let header = parse_header(&path).unwrap();
        assert!(header.cik.starts_with("000"));
        assert_eq!(header.cik.len(), 10);
    }

    #[test]
    fn header_missing_label_is_named() {
        let partial = "CONFORMED PERIOD OF REPORT:\t20220930\n\
DATE AS OF CHANGE:\t20221028\n\
\tCENTRAL INDEX KEY:\t0000320193\n\
<FILENAME>aapl-20220930.htm\n";
        let (_tmp, path) = write_submission(partial);
        match parse_header(&path) {
            Err(SubmissionError::LabelNotFound { label, .. }) => {
                assert_eq!(label, FILED_AS_OF_LABEL)
            }
            other => panic!("expected LabelNotFound, got {:?}", other),
        }
    }

    #[test]
    fn header_rejects_malformed_date() {
        let bad = "CONFORMED PERIOD OF REPORT:\t2022-09-30\n";
        let (_tmp, path) = write_submission(bad);
        assert!(matches!(
            parse_header(&path),
            Err(SubmissionError::BadDate { .. })
        ));
    }

    #[test]
    fn header_without_filename_is_ticker_not_found() {
        let no_filename = "CONFORMED PERIOD OF REPORT:\t20220930\n\
FILED AS OF DATE:\t20221028\n\
DATE AS OF CHANGE:\t20221028\n\
\tCENTRAL INDEX KEY:\t0000320193\n";
        let (_tmp, path) = write_submission(no_filename);
        assert!(matches!(
            parse_header(&path),
            Err(SubmissionError::TickerNotFound(_))
        ));
    }

    #[test]
    fn quarter_extracted_from_markup() {
        let content = "junk\n\
<td class=\"pl\"><a class=\"a\" href=\"#\">Document Fiscal Period Focus</a></td>\n\
<td class=\"text\">Q3<span></span>\n";
        let (_tmp, path) = write_submission(content);
        assert_eq!(parse_quarter(&path).unwrap(), 3);
    }

    #[test]
    fn quarter_missing_marker_fails() {
        let (_tmp, path) = write_submission(HEADER);
        assert!(matches!(
            parse_quarter(&path),
            Err(SubmissionError::QuarterNotFound(_))
        ));
    }

    #[test]
    fn quarter_out_of_range_is_rejected() {
        let content = "<a>Document Fiscal Period Focus</a>\n\
<td class=\"text\">Q7<span></span>\n";
        let (_tmp, path) = write_submission(content);
        assert!(matches!(
            parse_quarter(&path),
            Err(SubmissionError::BadQuarter(_))
        ));
    }

    #[test]
    fn survives_non_utf8_payload() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("full-submission.txt");
        let mut bytes = HEADER.as_bytes().to_vec();
        bytes.extend_from_slice(b"\n<DOCUMENT>\xff\xfe\x00binary payload\xff\n");
        std::fs::write(&path, bytes).unwrap();
        let header = parse_header(&path).unwrap();
        assert_eq!(header.ticker, "AAPL");
    }
}
