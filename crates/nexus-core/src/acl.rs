//! Access control lists (§3, §6). Four lists are maintained per listener:
//! registration (by peer id), subscriber (by radio id), TG1/TG2 (by tgid on
//! each timeslot). Evaluation is left-to-right, first match wins, implicit
//! default deny.

use nexus_proto::Timeslot;
use serde::{Deserialize, Serialize};

use crate::errors::{NexusError, NexusResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    Permit,
    Deny,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Range {
    All,
    Single(u32),
    Inclusive(u32, u32),
}

impl Range {
    fn contains(self, id: u32) -> bool {
        match self {
            Range::All => true,
            Range::Single(n) => id == n,
            Range::Inclusive(lo, hi) => (lo..=hi).contains(&id),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rule {
    pub action: Action,
    pub range: Range,
}

/// A parsed ACL. `use_acl = false` means "permit everything", matching
/// `use_acl` in the listener config (§6): the rule list is then irrelevant.
#[derive(Clone, Debug, Default)]
pub struct AclList {
    rules: Vec<Rule>,
    use_acl: bool,
}

impl AclList {
    /// An ACL with no rules and `use_acl = false`: permits everything.
    pub fn permit_all() -> Self {
        AclList { rules: Vec::new(), use_acl: false }
    }

    /// Parses the `PERMIT:<range>;DENY:<range>;...` grammar from §6.
    pub fn parse(s: &str) -> NexusResult<Self> {
        let mut rules = Vec::new();
        for segment in s.split(';') {
            let segment = segment.trim();
            if segment.is_empty() {
                continue;
            }
            let (action_str, range_str) = segment
                .split_once(':')
                .ok_or(NexusError::Config(format!("malformed ACL segment `{segment}`")))?;

            let action = match action_str.trim().to_ascii_uppercase().as_str() {
                "PERMIT" => Action::Permit,
                "DENY" => Action::Deny,
                other => {
                    return Err(NexusError::Config(format!("unknown ACL action `{other}`")));
                }
            };

            let range = parse_range(range_str.trim())?;
            rules.push(Rule { action, range });
        }
        Ok(AclList { rules, use_acl: true })
    }

    /// Evaluates `id` against the rule list, left-to-right, first match
    /// wins, default deny. When `use_acl` is false, always permits.
    pub fn evaluate(&self, id: u32) -> bool {
        if !self.use_acl {
            return true;
        }
        for rule in &self.rules {
            if rule.range.contains(id) {
                return rule.action == Action::Permit;
            }
        }
        false
    }

    pub fn is_enabled(&self) -> bool {
        self.use_acl
    }
}

fn parse_range(s: &str) -> NexusResult<Range> {
    if s.eq_ignore_ascii_case("ALL") {
        return Ok(Range::All);
    }
    if let Some((lo, hi)) = s.split_once('-') {
        let lo: u32 = lo
            .trim()
            .parse()
            .map_err(|_| NexusError::Config(format!("bad range start `{lo}`")))?;
        let hi: u32 = hi
            .trim()
            .parse()
            .map_err(|_| NexusError::Config(format!("bad range end `{hi}`")))?;
        return Ok(Range::Inclusive(lo, hi));
    }
    let n: u32 = s
        .parse()
        .map_err(|_| NexusError::Config(format!("bad ACL id `{s}`")))?;
    Ok(Range::Single(n))
}

/// The four ACLs a listener maintains (§3, §6).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AclSetConfig {
    pub use_acl: bool,
    pub reg_acl: Option<String>,
    pub sub_acl: Option<String>,
    pub tg1_acl: Option<String>,
    pub tg2_acl: Option<String>,
}

#[derive(Clone, Debug)]
pub struct AclSet {
    pub registration: AclList,
    pub subscriber: AclList,
    pub tg1: AclList,
    pub tg2: AclList,
}

impl AclSet {
    pub fn from_config(cfg: &AclSetConfig) -> NexusResult<Self> {
        if !cfg.use_acl {
            return Ok(AclSet {
                registration: AclList::permit_all(),
                subscriber: AclList::permit_all(),
                tg1: AclList::permit_all(),
                tg2: AclList::permit_all(),
            });
        }
        let parse_or_permit_all = |s: &Option<String>| match s {
            Some(s) => AclList::parse(s),
            None => Ok(AclList::permit_all()),
        };
        Ok(AclSet {
            registration: parse_or_permit_all(&cfg.reg_acl)?,
            subscriber: parse_or_permit_all(&cfg.sub_acl)?,
            tg1: parse_or_permit_all(&cfg.tg1_acl)?,
            tg2: parse_or_permit_all(&cfg.tg2_acl)?,
        })
    }

    pub fn tg_acl(&self, ts: Timeslot) -> &AclList {
        match ts {
            Timeslot::One => &self.tg1,
            Timeslot::Two => &self.tg2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permit_all_when_disabled() {
        let acl = AclList::permit_all();
        assert!(acl.evaluate(1));
        assert!(acl.evaluate(999_999));
    }

    #[test]
    fn first_match_wins_deny_then_permit_all() {
        let acl = AclList::parse("DENY:7000; PERMIT:ALL").unwrap();
        assert!(!acl.evaluate(7000));
        assert!(acl.evaluate(7001));
        assert!(acl.evaluate(1));
    }

    #[test]
    fn default_deny_with_no_matching_rule() {
        let acl = AclList::parse("PERMIT:1-100").unwrap();
        assert!(acl.evaluate(50));
        assert!(!acl.evaluate(101));
    }

    #[test]
    fn range_inclusive_bounds() {
        let acl = AclList::parse("PERMIT:100-200").unwrap();
        assert!(acl.evaluate(100));
        assert!(acl.evaluate(200));
        assert!(!acl.evaluate(99));
        assert!(!acl.evaluate(201));
    }

    #[test]
    fn malformed_segment_is_rejected() {
        assert!(AclList::parse("NOPE:ALL").is_err());
        assert!(AclList::parse("PERMIT:abc").is_err());
    }
}
