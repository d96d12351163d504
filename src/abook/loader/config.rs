use std::fmt;
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::abook::loader::error::{LoaderError, Result};

/// Default LDAP port used when neither the profile nor the CLI set one.
pub const DEFAULT_PORT: u16 = 389;

/// Connection parameters for the target directory.
///
/// The value is constructed once per command and handed to every operation
/// that talks to the directory; nothing mutates it afterwards. Fields a
/// profile leaves out take their [`Default`] values, so a partial profile
/// can be completed from the command line before [`validate`](Self::validate).
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DirectoryConfig {
    pub host: String,
    pub port: u16,
    pub bind_dn: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub base_dn: String,
    /// Connect timeout applied at the connection boundary. `None` waits forever.
    #[serde(with = "optional_secs")]
    pub timeout: Option<Duration>,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: DEFAULT_PORT,
            bind_dn: String::new(),
            password: String::new(),
            base_dn: String::new(),
            timeout: None,
        }
    }
}

impl DirectoryConfig {
    /// Loads a connection profile from a JSON file.
    pub fn from_profile(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }

    /// Presence checks only; reachability is left to the connection itself.
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(LoaderError::MissingConfig("host"));
        }
        if self.port == 0 {
            return Err(LoaderError::MissingConfig("port"));
        }
        if self.bind_dn.trim().is_empty() {
            return Err(LoaderError::MissingConfig("bind DN"));
        }
        if self.base_dn.trim().is_empty() {
            return Err(LoaderError::MissingConfig("base DN"));
        }
        Ok(())
    }

    /// LDAP URL for the configured server.
    pub fn url(&self) -> String {
        format!("ldap://{}:{}", self.host, self.port)
    }

    /// Container holding the address-book units: `ou=abook,<baseDN>`.
    pub fn abook_base(&self) -> String {
        format!("ou=abook,{}", self.base_dn)
    }
}

impl fmt::Debug for DirectoryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectoryConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("bind_dn", &self.bind_dn)
            .field("password", &"[REDACTED]")
            .field("base_dn", &self.base_dn)
            .field("timeout", &self.timeout)
            .finish()
    }
}

mod optional_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(duration) => serializer.serialize_some(&duration.as_secs()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DirectoryConfig {
        DirectoryConfig {
            host: "ldap.example.com".to_string(),
            port: 389,
            bind_dn: "cn=admin,dc=example,dc=com".to_string(),
            password: "secret".to_string(),
            base_dn: "dc=example,dc=com".to_string(),
            timeout: None,
        }
    }

    #[test]
    fn validate_rejects_empty_base_dn() {
        let config = DirectoryConfig {
            base_dn: "  ".to_string(),
            ..sample()
        };
        assert!(matches!(
            config.validate(),
            Err(LoaderError::MissingConfig("base DN"))
        ));
        assert!(sample().validate().is_ok());
    }

    #[test]
    fn debug_output_hides_password() {
        let rendered = format!("{:?}", sample());
        assert!(!rendered.contains("secret"));
        assert!(rendered.contains("[REDACTED]"));
    }

    #[test]
    fn profile_fills_defaults() {
        let config: DirectoryConfig = serde_json::from_str(
            r#"{"host":"h","bindDn":"cn=a","password":"p","baseDn":"dc=x","timeout":5}"#,
        )
        .unwrap();
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.timeout, Some(Duration::from_secs(5)));
        assert_eq!(config.url(), "ldap://h:389");
        assert_eq!(config.abook_base(), "ou=abook,dc=x");

        let serialised = serde_json::to_string(&config).unwrap();
        assert!(!serialised.contains("\"p\""));
    }

    #[test]
    fn partial_profile_loads_and_defers_to_validate() {
        let temp_dir = tempfile::tempdir().expect("temporary directory");
        let path = temp_dir.path().join("profile.json");
        fs::write(
            &path,
            r#"{"bindDn":"cn=admin,dc=x","password":"p","baseDn":"dc=x"}"#,
        )
        .expect("profile written");

        let config = DirectoryConfig::from_profile(&path).expect("partial profile loads");
        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.bind_dn, "cn=admin,dc=x");
        assert_eq!(config.timeout, None);
        assert!(config.validate().is_ok());

        let empty: DirectoryConfig = serde_json::from_str("{}").expect("empty profile loads");
        assert!(matches!(
            empty.validate(),
            Err(LoaderError::MissingConfig("bind DN"))
        ));
    }
}
