//! Narrow view of an LDAP server used by the sync executor.
//!
//! The executor only needs connect/bind, search, add and delete. These sit
//! behind [`DirectoryConnector`] and [`DirectoryClient`] so the pipeline can
//! run against [`ldap::LdapConnector`] in production and an in-memory fake in
//! tests.

pub mod ldap;

use std::collections::HashMap;
use std::ops::{Deref, DerefMut};

use thiserror::Error;
use tracing::warn;

use crate::abook::loader::config::DirectoryConfig;

/// Failure reported by a directory operation.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// The connection itself failed.
    #[error("{0}")]
    Transport(String),

    /// The server answered with a non-success result code.
    #[error("LDAP result code {code}: {message}")]
    Result { code: u32, message: String },
}

/// One search result: the entry DN and its returned attributes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub dn: String,
    pub attributes: HashMap<String, Vec<String>>,
}

impl DirectoryEntry {
    pub fn new(dn: impl Into<String>) -> Self {
        Self {
            dn: dn.into(),
            attributes: HashMap::new(),
        }
    }

    /// First value of `name`, if any.
    pub fn first(&self, name: &str) -> Option<&str> {
        self.attributes
            .get(name)
            .and_then(|values| values.first())
            .map(String::as_str)
    }
}

/// Where a failed connection attempt gave up.
#[derive(Debug)]
pub enum ConnectError {
    /// The server could not be reached.
    Unreachable(DirectoryError),
    /// The server refused the bind.
    Rejected(DirectoryError),
}

/// Opens bound connections to a directory server.
pub trait DirectoryConnector {
    type Client: DirectoryClient;

    /// Connects and performs a simple bind with the configured credentials.
    fn connect(&self, config: &DirectoryConfig) -> Result<Self::Client, ConnectError>;
}

/// Operations available on a bound connection. All calls block until the
/// server answers.
pub trait DirectoryClient {
    /// Single-level search: only entries directly below `base` match.
    fn search(
        &mut self,
        base: &str,
        filter: &str,
        attributes: &[&str],
    ) -> Result<Vec<DirectoryEntry>, DirectoryError>;

    /// Adds `dn` with the given attribute/value pairs. Each pair becomes a
    /// single-valued attribute.
    fn add(&mut self, dn: &str, attributes: &[(&str, &str)]) -> Result<(), DirectoryError>;

    fn delete(&mut self, dn: &str) -> Result<(), DirectoryError>;

    /// Releases the connection. Called exactly once, by [`Session`].
    fn close(&mut self) -> Result<(), DirectoryError>;
}

/// A bound connection that is closed when dropped, whichever way the
/// owning phase exits.
pub struct Session<C: DirectoryClient> {
    client: C,
}

impl<C: DirectoryClient> Session<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }
}

impl<C: DirectoryClient> Deref for Session<C> {
    type Target = C;

    fn deref(&self) -> &C {
        &self.client
    }
}

impl<C: DirectoryClient> DerefMut for Session<C> {
    fn deref_mut(&mut self) -> &mut C {
        &mut self.client
    }
}

impl<C: DirectoryClient> Drop for Session<C> {
    fn drop(&mut self) {
        if let Err(err) = self.client.close() {
            warn!(error = %err, "error while closing LDAP connection");
        }
    }
}

/// Escapes a value for use inside a DN attribute (RFC 4514).
pub fn escape_dn_value(value: &str) -> String {
    let char_count = value.chars().count();
    let mut escaped = String::with_capacity(value.len() * 2);

    for (index, ch) in value.chars().enumerate() {
        let first = index == 0;
        let last = index + 1 == char_count;
        match ch {
            ',' | '+' | '"' | '\\' | '<' | '>' | ';' | '=' => {
                escaped.push('\\');
                escaped.push(ch);
            }
            '\0' => escaped.push_str("\\00"),
            ' ' if first || last => escaped.push_str("\\20"),
            '#' if first => escaped.push_str("\\23"),
            _ => escaped.push(ch),
        }
    }

    escaped
}
