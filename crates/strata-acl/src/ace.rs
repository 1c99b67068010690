use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::codec::{
    aceflag_to_cdmi, acemask_to_cdmi, cdmi_to_aceflag, cdmi_to_acemask, level_to_mask,
    mask_to_level, AccessLevel, MaskDomain, ACEFLAG_CONTAINER_INHERIT, ACEFLAG_OBJECT_INHERIT,
};
use crate::error::{AclError, AclResult};

/// Any authenticated user.
pub const AUTHENTICATED: &str = "AUTHENTICATED@";
/// Access without authentication.
pub const ANONYMOUS: &str = "ANONYMOUS@";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AceType {
    Allow,
    Deny,
}

impl fmt::Display for AceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Allow => f.write_str("ALLOW"),
            Self::Deny => f.write_str("DENY"),
        }
    }
}

impl std::str::FromStr for AceType {
    type Err = AclError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "ALLOW" => Ok(Self::Allow),
            "DENY" => Ok(Self::Deny),
            other => Err(AclError::UnknownAceType(other.to_string())),
        }
    }
}

/// One access control entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ace {
    pub acetype: AceType,
    pub identifier: String,
    pub aceflags: u32,
    pub acemask: u32,
}

impl Ace {
    /// An ALLOW entry granting `level` with no flags.
    pub fn allow(identifier: impl Into<String>, level: AccessLevel, domain: MaskDomain) -> Self {
        Self {
            acetype: AceType::Allow,
            identifier: identifier.into(),
            aceflags: 0,
            acemask: level_to_mask(level, domain),
        }
    }

    /// Coarse level of this entry's mask, if it is a level mask.
    pub fn level(&self, domain: MaskDomain) -> Option<AccessLevel> {
        mask_to_level(self.acemask, domain)
    }
}

/// Access control list: at most one [`Ace`] per identifier.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Acl(BTreeMap<String, Ace>);

impl Acl {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, identifier: &str) -> Option<&Ace> {
        self.0.get(identifier)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Ace)> {
        self.0.iter()
    }

    /// Insert an entry, replacing any previous entry for the same identifier.
    pub fn insert(&mut self, ace: Ace) -> Option<Ace> {
        self.0.insert(ace.identifier.clone(), ace)
    }

    /// Grant `identifier` exactly `level`, replacing its previous entry.
    pub fn set_level(&mut self, identifier: &str, level: AccessLevel, domain: MaskDomain) {
        self.insert(Ace::allow(identifier, level, domain));
    }

    pub fn remove(&mut self, identifier: &str) -> Option<Ace> {
        self.0.remove(identifier)
    }

    /// Build an ACL from read and write group lists. A group in both lists
    /// gets `read/write`.
    pub fn from_access_lists(read: &[String], write: &[String], domain: MaskDomain) -> Self {
        let mut levels: BTreeMap<&str, AccessLevel> = BTreeMap::new();
        for gid in read {
            levels.insert(gid, AccessLevel::Read);
        }
        for gid in write {
            let level = match levels.get(gid.as_str()) {
                Some(AccessLevel::Read) => AccessLevel::ReadWrite,
                _ => AccessLevel::Write,
            };
            levels.insert(gid, level);
        }
        let mut acl = Self::new();
        for (gid, level) in levels {
            acl.set_level(gid, level, domain);
        }
        acl
    }

    /// Inverse of [`from_access_lists`](Self::from_access_lists): identifiers
    /// with read access and identifiers with write access. Masks that are not
    /// read, write or read/write are skipped.
    pub fn read_write_groups(&self, domain: MaskDomain) -> (Vec<String>, Vec<String>) {
        let mut read = Vec::new();
        let mut write = Vec::new();
        for (gid, ace) in &self.0 {
            match ace.level(domain) {
                Some(AccessLevel::Read) => read.push(gid.clone()),
                Some(AccessLevel::Write) => write.push(gid.clone()),
                Some(AccessLevel::ReadWrite) => {
                    read.push(gid.clone());
                    write.push(gid.clone());
                }
                _ => {}
            }
        }
        (read, write)
    }

    /// The CDMI `cdmi_acl` metadata list.
    pub fn to_cdmi(&self, domain: MaskDomain) -> Value {
        let aces: Vec<Value> = self
            .0
            .values()
            .map(|ace| {
                json!({
                    "acetype": ace.acetype.to_string(),
                    "identifier": ace.identifier,
                    "aceflags": aceflag_to_cdmi(ACEFLAG_OBJECT_INHERIT | ACEFLAG_CONTAINER_INHERIT),
                    "acemask": acemask_to_cdmi(ace.acemask, domain),
                })
            })
            .collect();
        Value::Array(aces)
    }

    /// Parse a CDMI ACL list. Entries without an identifier are skipped;
    /// `acemask`/`aceflags` may be symbolic strings or integers.
    pub fn from_cdmi(value: &Value, domain: MaskDomain) -> AclResult<Self> {
        let entries = value
            .as_array()
            .ok_or_else(|| AclError::Malformed("expected a list of ACEs".into()))?;
        let mut acl = Self::new();
        for entry in entries {
            let Some(identifier) = entry.get("identifier").and_then(Value::as_str) else {
                continue;
            };
            let identifier = canonical_identifier(identifier);
            let acetype = match entry.get("acetype").and_then(Value::as_str) {
                Some(text) => text.parse()?,
                None => AceType::Allow,
            };
            let aceflags = match entry.get("aceflags") {
                Some(Value::String(text)) => cdmi_to_aceflag(text),
                Some(Value::Number(n)) => number_to_u32(n)?,
                _ => 0,
            };
            let acemask = match entry.get("acemask") {
                Some(Value::String(text)) => cdmi_to_acemask(text, domain),
                Some(Value::Number(n)) => number_to_u32(n)?,
                _ => 0,
            };
            acl.insert(Ace {
                acetype,
                identifier,
                aceflags,
                acemask,
            });
        }
        Ok(acl)
    }
}

fn number_to_u32(n: &serde_json::Number) -> AclResult<u32> {
    n.as_u64()
        .and_then(|v| u32::try_from(v).ok())
        .ok_or_else(|| AclError::Malformed(format!("mask out of range: {n}")))
}

fn canonical_identifier(identifier: &str) -> String {
    let upper = identifier.to_uppercase();
    if upper == AUTHENTICATED || upper == ANONYMOUS {
        upper
    } else {
        identifier.to_string()
    }
}

/// Read access for every authenticated user; applied to the root.
pub fn default_acl() -> Acl {
    let mut acl = Acl::new();
    acl.set_level(AUTHENTICATED, AccessLevel::Read, MaskDomain::Container);
    acl
}
