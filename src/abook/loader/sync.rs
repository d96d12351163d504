use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;

use tracing::{debug, info, instrument, warn};

use crate::abook::loader::config::DirectoryConfig;
use crate::abook::loader::directory::{
    ConnectError, DirectoryClient, DirectoryConnector, Session, escape_dn_value,
};
use crate::abook::loader::error::{LoaderError, Result};
use crate::abook::loader::model::{AttributeRecord, PERSON_CLASS, SyncPhase, SyncProgress};

const UNIT_FILTER: &str = "(objectClass=organizationalUnit)";
const PERSON_FILTER: &str = "(objectClass=inetOrgPerson)";

/// Shared stop flag checked before every directory write.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests a stop. Returns `true` when a stop had already been requested.
    pub fn cancel(&self) -> bool {
        self.flag.swap(true, Ordering::SeqCst)
    }

    pub fn is_canceled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Receives progress notifications. Implementations must not block the
/// sync thread.
pub trait ProgressSink {
    fn report(&self, progress: SyncProgress);
}

impl ProgressSink for Sender<SyncProgress> {
    fn report(&self, progress: SyncProgress) {
        // A closed receiver only means nobody is watching any more.
        let _ = self.send(progress);
    }
}

/// Sink that drops every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _progress: SyncProgress) {}
}

/// Counts of directory writes performed by a completed run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncSummary {
    pub deleted: usize,
    pub added: usize,
}

/// DN of a target unit: `ou=<unit>,ou=abook,<baseDN>`.
pub fn unit_dn(config: &DirectoryConfig, unit: &str) -> String {
    format!("ou={},{}", escape_dn_value(unit), config.abook_base())
}

/// DN a record is written to: `cn=<commonName>,ou=<unit>,ou=abook,<baseDN>`.
pub fn entry_dn(config: &DirectoryConfig, unit: &str, record: &AttributeRecord) -> String {
    format!(
        "cn={},{}",
        escape_dn_value(&record.common_name),
        unit_dn(config, unit)
    )
}

/// Attributes sent when adding `record`.
///
/// `objectClass`, `sn`, `cn` and `ou` are always present; the remaining
/// attributes are only sent when they carry a value.
pub fn entry_attributes(record: &AttributeRecord) -> Vec<(&'static str, &str)> {
    let mut attributes = vec![
        ("objectClass", PERSON_CLASS),
        ("sn", record.surname.as_str()),
        ("cn", record.common_name.as_str()),
        ("ou", record.organizational_unit.as_str()),
    ];
    attributes.extend(
        record
            .optional_attributes()
            .into_iter()
            .skip(1)
            .filter(|(_, value)| !value.is_empty()),
    );
    attributes
}

/// Lists the units available under `ou=abook,<baseDN>`, in server order.
#[instrument(level = "info", skip_all, fields(host = %config.host, base_dn = %config.base_dn))]
pub fn list_units<D: DirectoryConnector>(
    connector: &D,
    config: &DirectoryConfig,
) -> Result<Vec<String>> {
    let mut session = open_session(connector, config)?;
    let base = config.abook_base();

    let entries = session
        .search(&base, UNIT_FILTER, &["ou"])
        .map_err(|err| LoaderError::Search {
            base: base.clone(),
            reason: err.to_string(),
        })?;

    let units: Vec<String> = entries
        .iter()
        .filter_map(|entry| entry.first("ou").map(str::to_string))
        .collect();
    info!(unit_count = units.len(), "listed address-book units");
    Ok(units)
}

/// Replaces every person entry under `target_unit` with `records`.
///
/// Runs two phases, each on its own connection: delete the existing entries,
/// then add the new ones. The first failure or cancellation stops the run;
/// whatever was already written stays written.
#[instrument(
    level = "info",
    skip_all,
    fields(host = %config.host, unit = %target_unit, record_count = records.len())
)]
pub fn sync_directory<D, P>(
    connector: &D,
    config: &DirectoryConfig,
    target_unit: &str,
    records: &[AttributeRecord],
    progress: &P,
    cancel: &CancelToken,
) -> Result<SyncSummary>
where
    D: DirectoryConnector,
    P: ProgressSink + ?Sized,
{
    let deleted = delete_old_entries(connector, config, target_unit, progress, cancel)?;
    ensure_running(SyncPhase::Adding, 0, records.len(), progress, cancel)?;
    let added = add_new_entries(connector, config, target_unit, records, progress, cancel)?;

    info!(deleted, added, "directory sync finished");
    Ok(SyncSummary { deleted, added })
}

/// Phase one: removes the person entries directly under the target unit.
pub fn delete_old_entries<D, P>(
    connector: &D,
    config: &DirectoryConfig,
    target_unit: &str,
    progress: &P,
    cancel: &CancelToken,
) -> Result<usize>
where
    D: DirectoryConnector,
    P: ProgressSink + ?Sized,
{
    let mut session = open_session(connector, config)?;
    let base = unit_dn(config, target_unit);

    let entries = session
        .search(&base, PERSON_FILTER, &["dn"])
        .map_err(|err| LoaderError::Search {
            base: base.clone(),
            reason: err.to_string(),
        })?;

    let total = entries.len();
    info!(total, base = %base, "deleting old entries");

    for (index, entry) in entries.iter().enumerate() {
        ensure_running(SyncPhase::Deleting, index, total, progress, cancel)?;

        debug!(dn = %entry.dn, "deleting entry");
        session.delete(&entry.dn).map_err(|err| LoaderError::Delete {
            dn: entry.dn.clone(),
            reason: err.to_string(),
        })?;

        progress.report(SyncProgress {
            phase: SyncPhase::Deleting,
            completed: index + 1,
            total,
            canceled: false,
        });
    }

    Ok(total)
}

/// Phase two: adds every record under the target unit, in source order.
pub fn add_new_entries<D, P>(
    connector: &D,
    config: &DirectoryConfig,
    target_unit: &str,
    records: &[AttributeRecord],
    progress: &P,
    cancel: &CancelToken,
) -> Result<usize>
where
    D: DirectoryConnector,
    P: ProgressSink + ?Sized,
{
    let mut session = open_session(connector, config)?;
    let total = records.len();
    info!(total, unit = %target_unit, "adding new entries");

    for (index, record) in records.iter().enumerate() {
        ensure_running(SyncPhase::Adding, index, total, progress, cancel)?;

        let dn = entry_dn(config, target_unit, record);
        debug!(dn = %dn, "adding entry");
        session
            .add(&dn, &entry_attributes(record))
            .map_err(|err| LoaderError::Add {
                dn: dn.clone(),
                reason: err.to_string(),
            })?;

        progress.report(SyncProgress {
            phase: SyncPhase::Adding,
            completed: index + 1,
            total,
            canceled: false,
        });
    }

    Ok(total)
}

fn open_session<D: DirectoryConnector>(
    connector: &D,
    config: &DirectoryConfig,
) -> Result<Session<D::Client>> {
    config.validate()?;
    match connector.connect(config) {
        Ok(client) => Ok(Session::new(client)),
        Err(ConnectError::Unreachable(err)) => Err(LoaderError::Connect {
            url: config.url(),
            reason: err.to_string(),
        }),
        Err(ConnectError::Rejected(err)) => Err(LoaderError::Auth {
            bind_dn: config.bind_dn.clone(),
            reason: err.to_string(),
        }),
    }
}

fn ensure_running<P: ProgressSink + ?Sized>(
    phase: SyncPhase,
    completed: usize,
    total: usize,
    progress: &P,
    cancel: &CancelToken,
) -> Result<()> {
    if !cancel.is_canceled() {
        return Ok(());
    }
    warn!(%phase, completed, total, "sync canceled");
    progress.report(SyncProgress {
        phase,
        completed,
        total,
        canceled: true,
    });
    Err(LoaderError::Canceled { phase })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> DirectoryConfig {
        DirectoryConfig {
            bind_dn: "cn=admin,dc=example,dc=com".to_string(),
            base_dn: "dc=example,dc=com".to_string(),
            ..DirectoryConfig::default()
        }
    }

    #[test]
    fn entry_dn_nests_under_abook_unit() {
        let record = AttributeRecord {
            common_name: "Jane Doe".to_string(),
            ..AttributeRecord::new("x")
        };
        assert_eq!(
            entry_dn(&config(), "Staff", &record),
            "cn=Jane Doe,ou=Staff,ou=abook,dc=example,dc=com"
        );
    }

    #[test]
    fn entry_dn_escapes_common_name() {
        let record = AttributeRecord {
            common_name: "Doe, Jane".to_string(),
            ..AttributeRecord::new("x")
        };
        assert_eq!(
            entry_dn(&config(), "Staff", &record),
            "cn=Doe\\, Jane,ou=Staff,ou=abook,dc=example,dc=com"
        );
    }

    #[test]
    fn mandatory_attributes_are_sent_even_when_empty() {
        let record = AttributeRecord::new("x");
        let attributes = entry_attributes(&record);
        assert_eq!(
            attributes,
            vec![
                ("objectClass", "inetOrgPerson"),
                ("sn", ""),
                ("cn", ""),
                ("ou", "")
            ]
        );
    }

    #[test]
    fn cancel_token_is_shared_between_clones() {
        let token = CancelToken::new();
        let observer = token.clone();
        assert!(!observer.is_canceled());
        assert!(!token.cancel());
        assert!(observer.is_canceled());
        assert!(observer.cancel());
    }
}
