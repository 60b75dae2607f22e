use std::io::Read;

/// A raw tabular batch as fetched or uploaded: header row plus string cells.
///
/// Nothing is interpreted here. Rows shorter than the header read as empty
/// cells, which the normalizer then treats as missing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawBatch {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl RawBatch {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }

    /// Parses CSV with a header row. Ragged rows are accepted.
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self, csv::Error> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let headers = reader.headers()?.iter().map(str::to_string).collect();
        let rows = reader
            .records()
            .map(|record| record.map(|r| r.iter().map(str::to_string).collect()))
            .collect::<Result<Vec<Vec<String>>, _>>()?;

        Ok(Self { headers, rows })
    }

    pub fn from_csv_str(text: &str) -> Result<Self, csv::Error> {
        Self::from_csv_reader(text.as_bytes())
    }

    /// A one-row batch from `(header, value)` pairs, as produced by a
    /// manual entry form.
    pub fn single_row<H, V>(cells: impl IntoIterator<Item = (H, V)>) -> Self
    where
        H: Into<String>,
        V: Into<String>,
    {
        let (headers, row): (Vec<String>, Vec<String>) =
            cells.into_iter().map(|(h, v)| (h.into(), v.into())).unzip();
        Self {
            headers,
            rows: vec![row],
        }
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn cell(&self, row: usize, column: usize) -> Option<&str> {
        self.rows.get(row)?.get(column).map(String::as_str)
    }

    pub fn column_index(&self, header: &str) -> Option<usize> {
        self.headers.iter().position(|h| h.trim() == header.trim())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_csv_with_quoted_decimal_commas() {
        let csv = "Timestamp,Suhu (°C),SpO2 (%)\n2024-05-01 10:00,\"36,5\",98\n2024-05-01 10:01,\"36,7\",97\n";
        let batch = RawBatch::from_csv_str(csv).unwrap();
        assert_eq!(batch.headers(), &["Timestamp", "Suhu (°C)", "SpO2 (%)"]);
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.cell(0, 1), Some("36,5"));
        assert_eq!(batch.cell(1, 2), Some("97"));
    }

    #[test]
    fn test_ragged_rows() {
        let batch = RawBatch::from_csv_str("a,b,c\n1,2\n").unwrap();
        assert_eq!(batch.cell(0, 1), Some("2"));
        assert_eq!(batch.cell(0, 2), None);
    }

    #[test]
    fn test_header_only_is_empty() {
        let batch = RawBatch::from_csv_str("a,b,c\n").unwrap();
        assert!(batch.is_empty());
        assert_eq!(batch.headers().len(), 3);
    }

    #[test]
    fn test_single_row() {
        let batch = RawBatch::single_row(vec![("SYS", "120"), ("DIA", "80")]);
        assert_eq!(batch.len(), 1);
        assert_eq!(batch.column_index("DIA"), Some(1));
        assert_eq!(batch.cell(0, 0), Some("120"));
    }
}
