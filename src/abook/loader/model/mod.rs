use std::fmt;

use serde::{Deserialize, Serialize};

/// Object class assigned to every person entry written by the loader.
pub const PERSON_CLASS: &str = "inetOrgPerson";

/// One address-book entry read from an LDIF export.
///
/// Every attribute is kept as plain text. Attributes absent from the source
/// are empty strings rather than `None`, matching how the export treats them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeRecord {
    /// Identity line as written in the source. Never decomposed.
    pub distinguished_name: String,
    pub object_class: String,
    pub surname: String,
    pub common_name: String,
    pub organizational_unit: String,
    pub title: String,
    pub mail: String,
    pub given_name: String,
    pub initials: String,
    pub telephone_number: String,
    pub locality: String,
    pub postal_address: String,
    pub organization: String,
}

impl AttributeRecord {
    /// Creates an empty record carrying the provided identity.
    pub fn new(distinguished_name: impl Into<String>) -> Self {
        Self {
            distinguished_name: distinguished_name.into(),
            ..Self::default()
        }
    }

    /// Stores `value` under the LDIF attribute `key`.
    ///
    /// Keys are matched case-sensitively. Returns `false` for keys outside
    /// the address-book schema, leaving the record untouched.
    pub fn set(&mut self, key: &str, value: String) -> bool {
        let slot = match key {
            "dn" => &mut self.distinguished_name,
            "objectclass" => &mut self.object_class,
            "sn" => &mut self.surname,
            "cn" => &mut self.common_name,
            "ou" => &mut self.organizational_unit,
            "title" => &mut self.title,
            "mail" => &mut self.mail,
            "givenName" => &mut self.given_name,
            "initials" => &mut self.initials,
            "telephoneNumber" => &mut self.telephone_number,
            "l" => &mut self.locality,
            "postalAddress" => &mut self.postal_address,
            "o" => &mut self.organization,
            _ => return false,
        };
        *slot = value;
        true
    }

    /// Optional attributes in export order, paired with their LDAP names.
    ///
    /// `ou` is included here because it is optional on export even though the
    /// directory add always sends it.
    pub fn optional_attributes(&self) -> [(&'static str, &str); 9] {
        [
            ("ou", &self.organizational_unit),
            ("title", &self.title),
            ("mail", &self.mail),
            ("givenName", &self.given_name),
            ("initials", &self.initials),
            ("telephoneNumber", &self.telephone_number),
            ("l", &self.locality),
            ("postalAddress", &self.postal_address),
            ("o", &self.organization),
        ]
    }
}

/// Stage of a directory synchronisation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncPhase {
    Deleting,
    Adding,
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncPhase::Deleting => write!(f, "deleting old entries"),
            SyncPhase::Adding => write!(f, "adding new entries"),
        }
    }
}

/// Progress notification emitted by the sync executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncProgress {
    pub phase: SyncPhase,
    pub completed: usize,
    pub total: usize,
    pub canceled: bool,
}
