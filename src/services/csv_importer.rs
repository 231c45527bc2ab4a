use tracing::{info, warn};

use crate::errors::ImportError;
use crate::models::{DEFAULT_DATE, DEFAULT_DISTANCE, DEFAULT_PLACE, ParticipantRecord};

pub const REQUIRED_HEADERS: [&str; 5] = ["name", "distance", "time", "date", "place"];
pub const TEMPLATE_FILE_NAME: &str = "participants_template.csv";

const BYTE_ORDER_MARK: char = '\u{feff}';

const TEMPLATE_ROWS: [&str; 4] = [
    "name,distance,time,date,place",
    "홍길동,10K,00:54:36,2025-09-13,KOREA",
    "김철수,21K,01:45:20,2025-09-13,KOREA",
    "이영희,5K,00:32:15,2025-09-13,KOREA",
];

/// Outcome of an import including the rows that were dropped on the way.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportReport {
    pub records: Vec<ParticipantRecord>,
    /// 1-based line numbers of rows with fewer fields than required.
    pub short_rows: Vec<usize>,
    /// 1-based line numbers of rows with an empty name or time.
    pub incomplete_rows: Vec<usize>,
}

impl ImportReport {
    pub fn skipped(&self) -> usize {
        self.short_rows.len() + self.incomplete_rows.len()
    }
}

struct HeaderMap {
    name: usize,
    distance: usize,
    time: usize,
    date: usize,
    place: usize,
}

impl HeaderMap {
    fn from_header_line(line: &str) -> Result<Self, ImportError> {
        let headers: Vec<String> = line
            .split(',')
            .map(|header| header.trim().to_lowercase())
            .collect();
        let position = |required: &str| {
            headers
                .iter()
                .position(|header| header == required)
                .ok_or_else(|| ImportError::MissingHeader(required.to_string()))
        };

        Ok(Self {
            name: position("name")?,
            distance: position("distance")?,
            time: position("time")?,
            date: position("date")?,
            place: position("place")?,
        })
    }
}

/// Parses participant rows using the current time for generated ids.
pub fn parse(raw_text: &str) -> Result<Vec<ParticipantRecord>, ImportError> {
    parse_at(raw_text, chrono::Utc::now().timestamp_millis())
}

pub fn parse_at(raw_text: &str, timestamp: i64) -> Result<Vec<ParticipantRecord>, ImportError> {
    parse_with_report(raw_text, timestamp).map(|report| report.records)
}

pub fn parse_with_report(raw_text: &str, timestamp: i64) -> Result<ImportReport, ImportError> {
    let text = raw_text.strip_prefix(BYTE_ORDER_MARK).unwrap_or(raw_text);
    let lines: Vec<&str> = text
        .split('\n')
        .filter(|line| !line.trim().is_empty())
        .collect();

    if lines.len() < 2 {
        return Err(ImportError::EmptyFile);
    }

    let headers = HeaderMap::from_header_line(lines[0])?;
    let mut report = ImportReport::default();

    for (index, line) in lines.iter().enumerate().skip(1) {
        let values: Vec<&str> = line.split(',').map(str::trim).collect();
        if values.len() < REQUIRED_HEADERS.len() {
            report.short_rows.push(index + 1);
            continue;
        }

        let field = |column: usize| {
            values
                .get(column)
                .map(|value| value.replace('"', ""))
                .unwrap_or_default()
        };

        let name = field(headers.name);
        let time = field(headers.time);
        if name.is_empty() || time.is_empty() {
            warn!("Line {}: name or time is empty, skipping row", index + 1);
            report.incomplete_rows.push(index + 1);
            continue;
        }

        report.records.push(ParticipantRecord {
            id: format!("csv-{timestamp}-{index}"),
            name,
            distance: non_empty_or(field(headers.distance), DEFAULT_DISTANCE),
            time,
            date: non_empty_or(field(headers.date), DEFAULT_DATE),
            place: non_empty_or(field(headers.place), DEFAULT_PLACE),
        });
    }

    if report.records.is_empty() {
        return Err(ImportError::NoValidRows);
    }

    info!(
        "CSV import parsed {} participants ({} rows skipped)",
        report.records.len(),
        report.skipped()
    );
    Ok(report)
}

/// The example file offered for download, prefixed with a byte-order mark so
/// spreadsheet apps pick up UTF-8.
pub fn template_csv() -> String {
    format!("{BYTE_ORDER_MARK}{}", TEMPLATE_ROWS.join("\n"))
}

fn non_empty_or(value: String, default: &str) -> String {
    if value.is_empty() {
        default.to_string()
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    const HEADER: &str = "name,distance,time,date,place";

    #[test]
    fn parses_single_well_formed_row() {
        let csv = format!("{HEADER}\nKim,10K,00:45:10,2025-01-01,Seoul");
        let records = parse_at(&csv, 1700000000000).unwrap();
        assert_eq!(
            records,
            vec![ParticipantRecord {
                id: "csv-1700000000000-1".to_string(),
                name: "Kim".to_string(),
                distance: "10K".to_string(),
                time: "00:45:10".to_string(),
                date: "2025-01-01".to_string(),
                place: "Seoul".to_string(),
            }]
        );
    }

    #[test]
    fn ids_are_unique_within_an_import() {
        let csv = format!("{HEADER}\nA,5K,00:30:00,,\nB,5K,00:31:00,,\nC,5K,00:32:00,,");
        let records = parse(&csv).unwrap();
        let ids: HashSet<&str> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids.len(), 3);
        assert!(records.iter().all(|r| r.id.starts_with("csv-")));
    }

    #[test]
    fn missing_time_header_aborts_import() {
        let csv = "name,distance,date,place\nKim,10K,2025-01-01,Seoul";
        assert_eq!(
            parse(csv),
            Err(ImportError::MissingHeader("time".to_string()))
        );
    }

    #[test]
    fn headers_match_in_any_order_and_case() {
        let csv = " Place ,TIME,Name,Date,distance,extra\nSeoul,00:50:00,Lee,2025-02-02,21,x";
        let records = parse_at(csv, 1).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "Lee");
        assert_eq!(records[0].distance, "21");
        assert_eq!(records[0].place, "Seoul");
    }

    #[test]
    fn header_only_file_is_empty() {
        assert_eq!(parse(HEADER), Err(ImportError::EmptyFile));
        assert_eq!(parse("\n\n   \n"), Err(ImportError::EmptyFile));
        assert_eq!(
            parse(&format!("{HEADER}\n  \n\t\n")),
            Err(ImportError::EmptyFile)
        );
    }

    #[test]
    fn skips_and_defaults_rows() {
        let csv = [
            HEADER,
            ",10K,00:40:00,2025-01-01,Seoul",
            "Park,,00:41:00,,",
            "Choi,5K,,2025-01-01,Busan",
            "Short,5K,00:20:00",
            "Jung,42,03:59:59,2025-03-03,Daegu",
        ]
        .join("\n");

        let report = parse_with_report(&csv, 7).unwrap();
        assert_eq!(report.records.len(), 2);
        assert_eq!(report.incomplete_rows, vec![2, 4]);
        assert_eq!(report.short_rows, vec![5]);
        assert_eq!(report.records.len(), 5 - report.skipped());

        let park = &report.records[0];
        assert_eq!(park.name, "Park");
        assert_eq!(park.distance, "10K");
        assert_eq!(park.date, "2025-09-13");
        assert_eq!(park.place, "KOREA");
        assert_eq!(park.id, "csv-7-2");

        assert_eq!(report.records[1].name, "Jung");
        assert_eq!(report.records[1].id, "csv-7-5");
    }

    #[test]
    fn strips_quotes_and_carriage_returns() {
        let csv = "name,distance,time,date,place\r\n\
                   \"Kim\",\"10\",\"00:45:10\",2025-01-01,\"Seoul\"\r\n";
        let records = parse(csv).unwrap();
        assert_eq!(records[0].name, "Kim");
        assert_eq!(records[0].distance, "10");
        assert_eq!(records[0].place, "Seoul");
    }

    #[test]
    fn quoted_empty_name_is_skipped() {
        let csv = format!("{HEADER}\n\"\",10K,00:45:10,,\nKim,10K,00:45:10,,");
        let report = parse_with_report(&csv, 0).unwrap();
        assert_eq!(report.incomplete_rows, vec![2]);
        assert_eq!(report.records.len(), 1);
    }

    #[test]
    fn no_valid_rows_is_an_error() {
        let csv = format!("{HEADER}\n,10K,00:45:10,,\nShort,row");
        assert_eq!(parse(&csv), Err(ImportError::NoValidRows));
    }

    #[test]
    fn template_round_trips_through_the_importer() {
        let template = template_csv();
        assert!(template.starts_with('\u{feff}'));
        let records = parse_at(&template, 3).unwrap();
        let names: Vec<&str> = records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["홍길동", "김철수", "이영희"]);
        assert_eq!(records[1].time, "01:45:20");
    }
}
