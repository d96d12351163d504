use std::collections::HashSet;

use ldap3::{LdapConn, LdapConnSettings, LdapResult, Scope, SearchEntry};
use tracing::{debug, info};

use crate::abook::loader::config::DirectoryConfig;
use crate::abook::loader::directory::{
    ConnectError, DirectoryClient, DirectoryConnector, DirectoryEntry, DirectoryError,
};

/// Opens synchronous `ldap3` connections with a simple bind.
#[derive(Debug, Clone, Copy, Default)]
pub struct LdapConnector;

impl DirectoryConnector for LdapConnector {
    type Client = LdapClient;

    fn connect(&self, config: &DirectoryConfig) -> Result<LdapClient, ConnectError> {
        let url = config.url();
        debug!(url = %url, "Connecting to LDAP server");

        let mut settings = LdapConnSettings::new();
        if let Some(timeout) = config.timeout {
            settings = settings.set_conn_timeout(timeout);
        }

        let mut conn = LdapConn::with_settings(settings, &url)
            .map_err(|err| ConnectError::Unreachable(transport(err)))?;

        debug!(bind_dn = %config.bind_dn, "Performing LDAP bind");
        let result = conn
            .simple_bind(&config.bind_dn, &config.password)
            .map_err(|err| ConnectError::Unreachable(transport(err)))?;

        if let Err(err) = check(result) {
            let _ = conn.unbind();
            return Err(ConnectError::Rejected(err));
        }

        info!(host = %config.host, "LDAP connection established");
        Ok(LdapClient {
            conn,
            closed: false,
        })
    }
}

/// A bound `ldap3` connection.
pub struct LdapClient {
    conn: LdapConn,
    closed: bool,
}

impl DirectoryClient for LdapClient {
    fn search(
        &mut self,
        base: &str,
        filter: &str,
        attributes: &[&str],
    ) -> Result<Vec<DirectoryEntry>, DirectoryError> {
        let result = self
            .conn
            .search(base, Scope::OneLevel, filter, attributes.to_vec())
            .map_err(transport)?;
        let ldap3::SearchResult(entries, status) = result;
        check(status)?;

        Ok(entries
            .into_iter()
            .map(|entry| {
                let entry = SearchEntry::construct(entry);
                DirectoryEntry {
                    dn: entry.dn,
                    attributes: entry.attrs,
                }
            })
            .collect())
    }

    fn add(&mut self, dn: &str, attributes: &[(&str, &str)]) -> Result<(), DirectoryError> {
        let attrs: Vec<(&str, HashSet<&str>)> = attributes
            .iter()
            .map(|(name, value)| (*name, HashSet::from([*value])))
            .collect();
        let result = self.conn.add(dn, attrs).map_err(transport)?;
        check(result)
    }

    fn delete(&mut self, dn: &str) -> Result<(), DirectoryError> {
        let result = self.conn.delete(dn).map_err(transport)?;
        check(result)
    }

    fn close(&mut self) -> Result<(), DirectoryError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.conn.unbind().map_err(transport)
    }
}

fn transport(err: ldap3::LdapError) -> DirectoryError {
    DirectoryError::Transport(err.to_string())
}

fn check(result: LdapResult) -> Result<(), DirectoryError> {
    if result.rc == 0 {
        return Ok(());
    }
    Err(DirectoryError::Result {
        code: result.rc,
        message: result.text,
    })
}
