//! Typed configuration tree (§6), deserialized from the operator's YAML file.
//! Every struct rejects unknown keys so a typo in the file fails loudly at
//! `--validate`/startup rather than being silently ignored.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::acl::AclSet;
use crate::bridge::RuleConfig;
use crate::errors::{NexusError, NexusResult};

fn default_ping_time_s() -> u32 {
    5
}
fn default_max_missed() -> u32 {
    3
}
fn default_mode() -> String {
    "MASTER".to_string()
}
fn default_true() -> bool {
    true
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GlobalSection {
    #[serde(default = "default_ping_time_s")]
    pub ping_time_s: u32,
    #[serde(default = "default_max_missed")]
    pub max_missed: u32,
}

impl Default for GlobalSection {
    fn default() -> Self {
        GlobalSection { ping_time_s: default_ping_time_s(), max_missed: default_max_missed() }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SystemConfig {
    #[serde(default = "default_mode")]
    pub mode: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub ip: String,
    pub port: u16,
    pub passphrase: String,
    #[serde(default)]
    pub repeat: bool,
    #[serde(default)]
    pub use_acl: bool,
    #[serde(default)]
    pub reg_acl: Option<String>,
    #[serde(default)]
    pub sub_acl: Option<String>,
    #[serde(default)]
    pub tg1_acl: Option<String>,
    #[serde(default)]
    pub tg2_acl: Option<String>,
}

impl SystemConfig {
    /// Builds the [`crate::acl::AclSetConfig`] `AclSet::from_config` expects.
    /// Kept as a conversion rather than `#[serde(flatten)]` on the ACL
    /// fields: serde's flatten and `deny_unknown_fields` cannot be combined,
    /// and rejecting unknown keys matters more here than field reuse.
    pub fn acl_config(&self) -> crate::acl::AclSetConfig {
        crate::acl::AclSetConfig {
            use_acl: self.use_acl,
            reg_acl: self.reg_acl.clone(),
            sub_acl: self.sub_acl.clone(),
            tg1_acl: self.tg1_acl.clone(),
            tg2_acl: self.tg2_acl.clone(),
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct WebSection {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
    pub auth_required: bool,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct PrometheusSection {
    pub enabled: bool,
    pub port: u16,
    pub path: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct MetricsSection {
    pub enabled: bool,
    pub prometheus: PrometheusSection,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct MqttSection {
    pub enabled: bool,
    pub broker: String,
    pub topic_prefix: String,
    pub client_id: String,
    pub username: String,
    pub password: String,
    pub qos: u8,
    pub retained: bool,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct LoggingSection {
    pub level: String,
    pub format: String,
}

/// The full config tree (§6). Loaded once at startup; `systems` and
/// `bridges` drive per-listener ACLs and the static routing tables.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub server: ServerSection,
    #[serde(default)]
    pub global: GlobalSection,
    pub systems: HashMap<String, SystemConfig>,
    #[serde(default)]
    pub bridges: HashMap<String, Vec<RuleConfig>>,
    #[serde(default)]
    pub web: WebSection,
    #[serde(default)]
    pub metrics: MetricsSection,
    #[serde(default)]
    pub mqtt: MqttSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

impl Config {
    pub fn from_yaml(s: &str) -> NexusResult<Self> {
        serde_yaml::from_str(s).map_err(|e| NexusError::Config(e.to_string()))
    }

    /// Validates everything that can be checked without binding a socket:
    /// every system's ACL strings parse, every bridge rule names a known
    /// timeslot (the `Timeslot` enum already rejects anything else at parse
    /// time) and at least one enabled system exists. Used by `--validate`
    /// and at normal startup, so a malformed file never gets as far as the
    /// supervisor.
    pub fn validate(&self) -> NexusResult<()> {
        if self.systems.is_empty() {
            return Err(NexusError::Config("no systems configured".into()));
        }
        for (name, system) in &self.systems {
            AclSet::from_config(&system.acl_config())
                .map_err(|e| NexusError::Config(format!("system `{name}`: {e}")))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_yaml() -> &'static str {
        r#"
server:
  name: dmr-nexus
  description: test instance
global:
  ping_time_s: 5
  max_missed: 3
systems:
  master-1:
    ip: 0.0.0.0
    port: 62031
    passphrase: passw0rd
    use_acl: true
    tg2_acl: "DENY:7000; PERMIT:ALL"
bridges:
  main:
    - system: bm-3100
      tgid: 3100
      timeslot: One
      active: true
"#
    }

    #[test]
    fn parses_full_example() {
        let cfg = Config::from_yaml(sample_yaml()).unwrap();
        assert_eq!(cfg.server.name, "dmr-nexus");
        assert_eq!(cfg.global.ping_time_s, 5);
        assert_eq!(cfg.systems["master-1"].port, 62031);
        assert_eq!(cfg.bridges["main"][0].tgid, 3100);
    }

    #[test]
    fn validate_accepts_well_formed_config() {
        let cfg = Config::from_yaml(sample_yaml()).unwrap();
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn validate_rejects_no_systems() {
        let yaml = r#"
server:
  name: dmr-nexus
systems: {}
"#;
        let cfg = Config::from_yaml(yaml).unwrap();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_malformed_acl() {
        let yaml = r#"
server:
  name: dmr-nexus
systems:
  master-1:
    ip: 0.0.0.0
    port: 62031
    passphrase: passw0rd
    use_acl: true
    tg2_acl: "NOPE:ALL"
"#;
        let cfg = Config::from_yaml(yaml).unwrap();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn unknown_top_level_key_is_rejected() {
        let yaml = format!("{}\nbogus_key: 1\n", sample_yaml());
        assert!(Config::from_yaml(&yaml).is_err());
    }

    #[test]
    fn unknown_system_key_is_rejected() {
        let yaml = r#"
server:
  name: dmr-nexus
systems:
  master-1:
    ip: 0.0.0.0
    port: 62031
    passphrase: passw0rd
    bogus: true
"#;
        assert!(Config::from_yaml(yaml).is_err());
    }
}
