use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tracing::{info, instrument};

use crate::abook::loader::directory::escape_dn_value;
use crate::abook::loader::error::Result;
use crate::abook::loader::hierarchy::OrgNode;
use crate::abook::loader::model::{AttributeRecord, PERSON_CLASS};

const LDIF_EXTENSION: &str = "ldif";

/// Writes records as LDIF blocks separated by a blank line.
///
/// With `base_dn` the identity line becomes `dn: cn=<dn>,<base_dn>`,
/// otherwise the identity is written as read.
pub fn write_records<W: Write>(
    writer: &mut W,
    records: &[AttributeRecord],
    base_dn: Option<&str>,
) -> Result<()> {
    for record in records {
        match base_dn {
            Some(base) => {
                let dn = format!("cn={},{base}", record.distinguished_name);
                write_attribute(writer, "dn", &dn)?;
            }
            None => write_attribute(writer, "dn", &record.distinguished_name)?,
        }
        write_attribute(writer, "objectClass", PERSON_CLASS)?;
        write_attribute(writer, "cn", &record.common_name)?;
        write_attribute(writer, "sn", &record.surname)?;
        for (name, value) in record.optional_attributes() {
            if !value.is_empty() {
                write_attribute(writer, name, value)?;
            }
        }
        writeln!(writer)?;
    }
    Ok(())
}

/// Writes one `name: value` line, switching to `name:: <base64>` when the
/// value is not a safe LDIF string (RFC 2849).
fn write_attribute<W: Write>(writer: &mut W, name: &str, value: &str) -> std::io::Result<()> {
    if is_safe_string(value) {
        writeln!(writer, "{name}: {value}")
    } else {
        writeln!(writer, "{name}:: {}", STANDARD.encode(value))
    }
}

/// Plain ASCII without NUL, CR or LF that neither starts with a space, `:`
/// or `<` nor ends with a space.
fn is_safe_string(value: &str) -> bool {
    let starts_safe = !matches!(value.as_bytes().first(), Some(b' ' | b':' | b'<'));
    starts_safe
        && !value.ends_with(' ')
        && value
            .bytes()
            .all(|byte| byte.is_ascii() && !matches!(byte, b'\0' | b'\n' | b'\r'))
}

/// Writes the hierarchy as `organizationalUnit` entries below
/// `ou=abook,<base_dn>`, parents first.
pub fn write_hierarchy<W: Write>(writer: &mut W, root: &OrgNode, base_dn: &str) -> Result<()> {
    let abook = format!("ou=abook,{base_dn}");
    let mut result: std::io::Result<()> = Ok(());

    root.walk(&mut |ancestors, node| {
        if result.is_err() {
            return;
        }
        let mut dn = format!("ou={}", escape_dn_value(&node.name));
        for ancestor in ancestors.iter().rev() {
            dn.push_str(",ou=");
            dn.push_str(&escape_dn_value(ancestor));
        }
        dn.push(',');
        dn.push_str(&abook);

        result = write_attribute(writer, "dn", &dn)
            .and_then(|()| write_attribute(writer, "objectClass", "organizationalUnit"))
            .and_then(|()| write_attribute(writer, "ou", &node.name))
            .and_then(|()| writeln!(writer));
    });

    Ok(result?)
}

/// Exports records to an LDIF file, adding the `.ldif` extension when the
/// path lacks it. Returns the path actually written.
#[instrument(level = "info", skip(records), fields(output = %path.display()))]
pub fn export_records(
    path: &Path,
    records: &[AttributeRecord],
    base_dn: Option<&str>,
) -> Result<PathBuf> {
    let path = with_ldif_extension(path);
    let mut writer = BufWriter::new(File::create(&path)?);
    write_records(&mut writer, records, base_dn)?;
    writer.flush()?;
    info!(record_count = records.len(), output = %path.display(), "exported records");
    Ok(path)
}

/// Exports the hierarchy skeleton to an LDIF file.
#[instrument(level = "info", skip(root), fields(output = %path.display()))]
pub fn export_hierarchy(path: &Path, root: &OrgNode, base_dn: &str) -> Result<PathBuf> {
    let path = with_ldif_extension(path);
    let mut writer = BufWriter::new(File::create(&path)?);
    write_hierarchy(&mut writer, root, base_dn)?;
    writer.flush()?;
    info!(node_count = root.count(), output = %path.display(), "exported hierarchy");
    Ok(path)
}

fn with_ldif_extension(path: &Path) -> PathBuf {
    match path.extension() {
        Some(ext) if ext == LDIF_EXTENSION => path.to_path_buf(),
        _ => {
            let mut name = path.as_os_str().to_owned();
            name.push(".");
            name.push(LDIF_EXTENSION);
            PathBuf::from(name)
        }
    }
}
