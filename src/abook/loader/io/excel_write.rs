use std::path::Path;

use rust_xlsxwriter::{Table, Workbook, Worksheet};
use tracing::{debug, instrument};

use crate::abook::loader::error::Result;
use crate::abook::loader::hierarchy::OrgNode;
use crate::abook::loader::model::AttributeRecord;

/// Sheet listing every parsed record.
pub const RECORDS_SHEET: &str = "Records";
/// Sheet listing the organization → department → unit paths.
pub const HIERARCHY_SHEET: &str = "Hierarchy";

const RECORD_COLUMNS: [&str; 13] = [
    "dn",
    "objectclass",
    "sn",
    "cn",
    "ou",
    "title",
    "mail",
    "givenName",
    "initials",
    "telephoneNumber",
    "l",
    "postalAddress",
    "o",
];
const HIERARCHY_COLUMNS: [&str; 3] = ["Organization", "Department", "Unit"];

/// Writes the records and the hierarchy preview to a workbook at `path`.
#[instrument(level = "info", skip(records, root), fields(output = %path.display()))]
pub fn write_preview(path: &Path, records: &[AttributeRecord], root: &OrgNode) -> Result<()> {
    let mut workbook = Workbook::new();

    let record_rows: Vec<Vec<String>> = records.iter().map(record_row).collect();
    write_table(
        workbook.add_worksheet(),
        RECORDS_SHEET,
        &RECORD_COLUMNS,
        &record_rows,
    )?;

    let hierarchy_rows = hierarchy_rows(root);
    write_table(
        workbook.add_worksheet(),
        HIERARCHY_SHEET,
        &HIERARCHY_COLUMNS,
        &hierarchy_rows,
    )?;

    debug!(
        record_rows = record_rows.len(),
        hierarchy_rows = hierarchy_rows.len(),
        "workbook constructed"
    );
    workbook.save(path)?;
    Ok(())
}

fn record_row(record: &AttributeRecord) -> Vec<String> {
    [
        &record.distinguished_name,
        &record.object_class,
        &record.surname,
        &record.common_name,
        &record.organizational_unit,
        &record.title,
        &record.mail,
        &record.given_name,
        &record.initials,
        &record.telephone_number,
        &record.locality,
        &record.postal_address,
        &record.organization,
    ]
    .into_iter()
    .cloned()
    .collect()
}

/// One row per node, with the path from the top-level organization down to
/// the node spread over the columns.
fn hierarchy_rows(root: &OrgNode) -> Vec<Vec<String>> {
    let mut rows = Vec::new();
    root.walk(&mut |ancestors, node| {
        let mut row: Vec<String> = ancestors.iter().map(|name| name.to_string()).collect();
        row.push(node.name.clone());
        row.resize(HIERARCHY_COLUMNS.len(), String::new());
        rows.push(row);
    });
    rows
}

fn write_table(
    worksheet: &mut Worksheet,
    name: &str,
    columns: &[&str],
    rows: &[Vec<String>],
) -> Result<()> {
    worksheet.set_name(name)?;

    for (col_idx, header) in columns.iter().enumerate() {
        worksheet.write_string(0, col_idx as u16, *header)?;
    }

    for (row_idx, row) in rows.iter().enumerate() {
        for (col_idx, cell) in row.iter().enumerate() {
            worksheet.write_string((row_idx + 1) as u32, col_idx as u16, cell)?;
        }
    }

    let mut table = Table::new();
    table.set_autofilter(true);
    let col_end = (columns.len() as u16).saturating_sub(1);
    // A table needs at least one data row below its header.
    let row_end = rows.len().max(1) as u32;
    worksheet.add_table(0, 0, row_end, col_end, &table)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abook::loader::hierarchy::build_hierarchy;

    #[test]
    fn hierarchy_rows_pad_to_three_columns() {
        let record = AttributeRecord {
            organization: "Acme, Sales".to_string(),
            organizational_unit: "East".to_string(),
            ..AttributeRecord::new("cn=x")
        };
        let rows = hierarchy_rows(&build_hierarchy(&[record]));
        assert_eq!(
            rows,
            vec![
                vec!["Acme".to_string(), String::new(), String::new()],
                vec!["Acme".to_string(), "Sales".to_string(), String::new()],
                vec!["Acme".to_string(), "Sales".to_string(), "East".to_string()],
            ]
        );
    }
}
