use std::collections::HashMap;
use std::io::Read;

use super::headers::canonical_field;

/// One data row after header-driven extraction: canonical field name to raw
/// value, empty cells dropped. `row` is 1-based over data rows (the header
/// row is not counted), matching the error list keying of the import
/// summary.
#[derive(Debug)]
pub(crate) struct RawRow {
    pub(crate) row: usize,
    pub(crate) fields: HashMap<&'static str, String>,
}

impl RawRow {
    pub(crate) fn get(&self, field: &'static str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }
}

pub(crate) fn parse_rows<R: Read>(reader: R) -> Result<Vec<RawRow>, csv::Error> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let columns: Vec<Option<&'static str>> = csv_reader
        .headers()?
        .iter()
        .map(canonical_field)
        .collect();

    let mut rows = Vec::new();
    for (index, record) in csv_reader.records().enumerate() {
        let record = record?;
        let mut fields = HashMap::new();
        for (position, value) in record.iter().enumerate() {
            let Some(Some(field)) = columns.get(position) else {
                continue;
            };
            if !value.is_empty() {
                fields.insert(*field, value.to_string());
            }
        }
        rows.push(RawRow {
            row: index + 1,
            fields,
        });
    }

    Ok(rows)
}
