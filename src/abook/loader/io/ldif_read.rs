use std::fs::File;
use std::io::{BufRead, BufReader};
use std::mem;
use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tracing::{debug, instrument, warn};

use crate::abook::loader::error::{LoaderError, Result};
use crate::abook::loader::model::AttributeRecord;

/// Reads address-book records from the LDIF export at `path`.
#[instrument(level = "info", skip_all, fields(input = %path.display()))]
pub fn read_records(path: &Path) -> Result<Vec<AttributeRecord>> {
    let file = File::open(path)?;
    let records = parse_records(BufReader::new(file))?;
    debug!(record_count = records.len(), "parsed LDIF export");
    Ok(records)
}

/// Parses LDIF text into records, preserving source order.
///
/// Blank lines close a record, `#` lines are skipped wherever they appear and
/// lines without a `:` or with an unknown key are ignored. Only blocks that
/// contain a `dn` line produce a record.
pub fn parse_records<R: BufRead>(reader: R) -> Result<Vec<AttributeRecord>> {
    let mut records = Vec::new();
    let mut current = AttributeRecord::default();
    let mut in_record = false;

    for (index, line) in reader.lines().enumerate() {
        let line_number = index + 1;
        let line = line?;
        let line = line.trim();

        if line.is_empty() {
            let finished = mem::take(&mut current);
            if mem::replace(&mut in_record, false) {
                records.push(finished);
            }
            continue;
        }

        if line.starts_with('#') {
            continue;
        }

        let Some((key, value)) = split_attribute(line, line_number)? else {
            continue;
        };

        if key == "dn" {
            if in_record {
                warn!(
                    line = line_number,
                    previous = %current.distinguished_name,
                    "dn line inside an open record; starting a new record"
                );
                records.push(mem::take(&mut current));
            }
            in_record = true;
        }

        if !current.set(key, value) {
            debug!(line = line_number, key, "ignoring attribute outside the schema");
        }
    }

    if in_record {
        records.push(current);
    }

    Ok(records)
}

/// Splits `key: value` on the first colon. A second colon directly after the
/// key marks a base64 value, which is decoded and kept verbatim.
fn split_attribute(line: &str, line_number: usize) -> Result<Option<(&str, String)>> {
    let Some((key, rest)) = line.split_once(':') else {
        return Ok(None);
    };
    let key = key.trim();

    match rest.strip_prefix(':') {
        Some(encoded) => {
            let value = decode_value(encoded.trim()).map_err(|reason| {
                LoaderError::InvalidValue {
                    line: line_number,
                    key: key.to_string(),
                    reason,
                }
            })?;
            Ok(Some((key, value)))
        }
        None => Ok(Some((key, rest.trim().to_string()))),
    }
}

fn decode_value(encoded: &str) -> std::result::Result<String, String> {
    let bytes = STANDARD.decode(encoded).map_err(|err| err.to_string())?;
    String::from_utf8(bytes).map_err(|err| err.to_string())
}
