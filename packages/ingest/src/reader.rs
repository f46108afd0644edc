//! Dataset file decoding and lazy CSV row iteration.

use std::path::Path;

use risk_map_ingest_models::DatasetEncoding;

use crate::IngestError;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Decodes raw file bytes.
///
/// Decoding is strict: a single malformed sequence fails the whole file
/// rather than smuggling replacement characters into coordinates and
/// addresses. A leading UTF-8 byte-order mark is dropped.
///
/// # Errors
///
/// Returns [`IngestError::Encoding`] if `bytes` is not valid in `encoding`.
pub fn decode(bytes: &[u8], encoding: DatasetEncoding) -> Result<String, IngestError> {
    let decoded = match encoding {
        DatasetEncoding::Utf8 => {
            let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
            encoding_rs::UTF_8.decode_without_bom_handling_and_without_replacement(bytes)
        }
        DatasetEncoding::Ms949 => {
            encoding_rs::EUC_KR.decode_without_bom_handling_and_without_replacement(bytes)
        }
    };

    decoded
        .map(std::borrow::Cow::into_owned)
        .ok_or(IngestError::Encoding { encoding })
}

/// Reads and decodes a dataset file.
///
/// # Errors
///
/// Returns [`IngestError::Io`] if the file cannot be read, or
/// [`IngestError::Encoding`] if it is not valid in `encoding`.
pub async fn read_dataset(path: &Path, encoding: DatasetEncoding) -> Result<String, IngestError> {
    let bytes = tokio::fs::read(path).await.map_err(|source| IngestError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    decode(&bytes, encoding)
}

/// Iterates the data rows of decoded CSV text, skipping the header.
///
/// Rows are tokenised one at a time as the iterator advances. Quoted fields
/// may contain commas; quotes are removed and every field is trimmed. Rows
/// may have differing lengths. A tokenising failure is yielded as
/// [`IngestError::Csv`] in place of the row.
pub fn data_rows(text: &str) -> impl Iterator<Item = Result<Vec<String>, IngestError>> + '_ {
    csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes())
        .into_records()
        .map(|record| {
            record
                .map(|record| record.iter().map(clean_field).collect())
                .map_err(IngestError::from)
        })
}

fn clean_field(field: &str) -> String {
    field.replace('"', "").trim().to_string()
}

/// Whether every field of a row is blank.
#[must_use]
pub fn is_blank(row: &[String]) -> bool {
    row.iter().all(String::is_empty)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect_rows(text: &str) -> Vec<Vec<String>> {
        data_rows(text).collect::<Result<_, _>>().unwrap()
    }

    #[test]
    fn quoted_comma_stays_in_one_field() {
        let rows = collect_rows("address,lat,lon\n\"123 Main St, Apt 4\",37.4,127.1\n");
        assert_eq!(rows, vec![vec!["123 Main St, Apt 4", "37.4", "127.1"]]);
    }

    #[test]
    fn fields_are_trimmed_and_empty_fields_kept() {
        let rows = collect_rows("a,b,c\n a , ,\"b\" \n");
        assert_eq!(rows, vec![vec!["a", "", "b"]]);
    }

    #[test]
    fn data_rows_skip_header_and_allow_ragged_rows() {
        let rows = collect_rows("name,lat,lon\nA,37.4,127.1\nB\n\"C, D\",37.5,127.2,extra\n");
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1], vec!["B"]);
        assert_eq!(rows[2][0], "C, D");
        assert_eq!(rows[2].len(), 4);
    }

    #[test]
    fn rows_are_read_lazily() {
        let mut rows = data_rows("lat,lon\n37.4,127.1\n37.5,127.2\n");
        assert_eq!(rows.next().unwrap().unwrap(), vec!["37.4", "127.1"]);
        assert_eq!(rows.next().unwrap().unwrap(), vec!["37.5", "127.2"]);
        assert!(rows.next().is_none());
    }

    #[test]
    fn strips_utf8_bom() {
        let mut bytes = UTF8_BOM.to_vec();
        bytes.extend_from_slice("위도,경도".as_bytes());
        assert_eq!(decode(&bytes, DatasetEncoding::Utf8).unwrap(), "위도,경도");
    }

    #[test]
    fn decodes_ms949() {
        let (encoded, _, had_errors) = encoding_rs::EUC_KR.encode("설치장소,위도,경도");
        assert!(!had_errors);
        assert_eq!(
            decode(&encoded, DatasetEncoding::Ms949).unwrap(),
            "설치장소,위도,경도"
        );
    }

    #[test]
    fn ms949_bytes_are_not_utf8() {
        let (encoded, _, _) = encoding_rs::EUC_KR.encode("경찰서");
        assert!(matches!(
            decode(&encoded, DatasetEncoding::Utf8),
            Err(IngestError::Encoding {
                encoding: DatasetEncoding::Utf8
            })
        ));
    }

    #[tokio::test]
    async fn missing_file_is_io_error() {
        let path = std::env::temp_dir().join("risk_map_reader_missing_file.csv");
        let _ = std::fs::remove_file(&path);
        assert!(matches!(
            read_dataset(&path, DatasetEncoding::Utf8).await,
            Err(IngestError::Io { .. })
        ));
    }
}
