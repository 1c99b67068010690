//! Table-driven conversions between ACE masks, flags and access levels.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AclError;

// ---------------------------------------------------------------------------
// ACE flags
// ---------------------------------------------------------------------------

pub const ACEFLAG_NONE: u32 = 0x0000_0000;
pub const ACEFLAG_OBJECT_INHERIT: u32 = 0x0000_0001;
pub const ACEFLAG_CONTAINER_INHERIT: u32 = 0x0000_0002;
pub const ACEFLAG_NO_PROPAGATE: u32 = 0x0000_0004;
pub const ACEFLAG_INHERIT_ONLY: u32 = 0x0000_0008;
pub const ACEFLAG_IDENTIFIER_GROUP: u32 = 0x0000_0040;
pub const ACEFLAG_INHERITED: u32 = 0x0000_0080;

// ---------------------------------------------------------------------------
// ACE mask bits
// ---------------------------------------------------------------------------

pub const ACEMASK_READ_OBJECT: u32 = 0x0000_0001;
pub const ACEMASK_LIST_CONTAINER: u32 = 0x0000_0001;
pub const ACEMASK_WRITE_OBJECT: u32 = 0x0000_0002;
pub const ACEMASK_ADD_OBJECT: u32 = 0x0000_0002;
pub const ACEMASK_APPEND_DATA: u32 = 0x0000_0004;
pub const ACEMASK_ADD_SUBCONTAINER: u32 = 0x0000_0004;
pub const ACEMASK_READ_METADATA: u32 = 0x0000_0008;
pub const ACEMASK_WRITE_METADATA: u32 = 0x0000_0010;
pub const ACEMASK_EXECUTE: u32 = 0x0000_0020;
pub const ACEMASK_DELETE_OBJECT: u32 = 0x0000_0040;
pub const ACEMASK_DELETE_SUBCONTAINER: u32 = 0x0000_0040;
pub const ACEMASK_READ_ATTRIBUTES: u32 = 0x0000_0080;
pub const ACEMASK_WRITE_ATTRIBUTES: u32 = 0x0000_0100;
pub const ACEMASK_WRITE_RETENTION: u32 = 0x0000_0200;
pub const ACEMASK_WRITE_RETENTION_HOLD: u32 = 0x0000_0400;
pub const ACEMASK_DELETE: u32 = 0x0001_0000;
pub const ACEMASK_READ_ACL: u32 = 0x0002_0000;
pub const ACEMASK_WRITE_ACL: u32 = 0x0004_0000;
pub const ACEMASK_WRITE_OWNER: u32 = 0x0008_0000;
pub const ACEMASK_SYNCHRONIZE: u32 = 0x0010_0000;

/// Flag bits and their CDMI names, highest first. Order is wire format.
const ACEFLAG_TABLE: [(u32, &str); 7] = [
    (ACEFLAG_INHERITED, "INHERITED"),
    (ACEFLAG_IDENTIFIER_GROUP, "IDENTIFIER_GROUP"),
    (ACEFLAG_INHERIT_ONLY, "INHERIT_ONLY"),
    (ACEFLAG_NO_PROPAGATE, "NO_PROPAGATE"),
    (ACEFLAG_CONTAINER_INHERIT, "CONTAINER_INHERIT"),
    (ACEFLAG_OBJECT_INHERIT, "OBJECT_INHERIT"),
    (ACEFLAG_NONE, "NO_FLAGS"),
];

/// Mask bits with their object-domain and container-domain names, highest
/// first. Order is wire format.
const ACEMASK_TABLE: [(u32, &str, &str); 16] = [
    (ACEMASK_SYNCHRONIZE, "SYNCHRONIZE", "SYNCHRONIZE"),
    (ACEMASK_WRITE_OWNER, "WRITE_OWNER", "WRITE_OWNER"),
    (ACEMASK_WRITE_ACL, "WRITE_ACL", "WRITE_ACL"),
    (ACEMASK_READ_ACL, "READ_ACL", "READ_ACL"),
    (ACEMASK_DELETE, "DELETE", "DELETE"),
    (ACEMASK_WRITE_RETENTION_HOLD, "WRITE_RETENTION_HOLD", "WRITE_RETENTION_HOLD"),
    (ACEMASK_WRITE_RETENTION, "WRITE_RETENTION", "WRITE_RETENTION"),
    (ACEMASK_WRITE_ATTRIBUTES, "WRITE_ATTRIBUTES", "WRITE_ATTRIBUTES"),
    (ACEMASK_READ_ATTRIBUTES, "READ_ATTRIBUTES", "READ_ATTRIBUTES"),
    (ACEMASK_DELETE_OBJECT, "DELETE_OBJECT", "DELETE_SUBCONTAINER"),
    (ACEMASK_EXECUTE, "EXECUTE", "EXECUTE"),
    (ACEMASK_WRITE_METADATA, "WRITE_METADATA", "WRITE_METADATA"),
    (ACEMASK_READ_METADATA, "READ_METADATA", "READ_METADATA"),
    (ACEMASK_APPEND_DATA, "APPEND_DATA", "ADD_SUBCONTAINER"),
    (ACEMASK_WRITE_OBJECT, "WRITE_OBJECT", "ADD_OBJECT"),
    (ACEMASK_READ_OBJECT, "READ_OBJECT", "LIST_CONTAINER"),
];

// ---------------------------------------------------------------------------
// Access levels
// ---------------------------------------------------------------------------

/// Which naming of the mask bits applies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MaskDomain {
    /// Data objects (resources).
    Object,
    /// Containers (collections).
    Container,
}

/// Coarse access level as exposed to users.
///
/// `Write` and `Edit` share one mask, so a mask decodes to `Write`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccessLevel {
    None,
    Read,
    Write,
    Edit,
    ReadWrite,
    Delete,
}

impl AccessLevel {
    pub const ALL: [AccessLevel; 6] = [
        Self::None,
        Self::Read,
        Self::Write,
        Self::Edit,
        Self::ReadWrite,
        Self::Delete,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Read => "read",
            Self::Write => "write",
            Self::Edit => "edit",
            Self::ReadWrite => "read/write",
            Self::Delete => "delete",
        }
    }

    /// The level a mask of this level decodes back to.
    pub fn canonical(&self) -> Self {
        match self {
            Self::Edit => Self::Write,
            other => *other,
        }
    }
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccessLevel {
    type Err = AclError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|level| level.as_str() == s)
            .ok_or_else(|| AclError::UnknownLevel(s.to_string()))
    }
}

const MASK_READ: u32 = ACEMASK_READ_OBJECT | ACEMASK_READ_METADATA; // 0x09
const MASK_WRITE: u32 =
    ACEMASK_WRITE_OBJECT | ACEMASK_APPEND_DATA | ACEMASK_WRITE_METADATA | ACEMASK_DELETE_OBJECT; // 0x56

fn delete_mask(domain: MaskDomain) -> u32 {
    match domain {
        MaskDomain::Object => ACEMASK_DELETE,
        MaskDomain::Container => ACEMASK_DELETE | ACEMASK_DELETE_OBJECT | ACEMASK_DELETE_SUBCONTAINER,
    }
}

/// Mask granting a coarse access level.
pub fn level_to_mask(level: AccessLevel, domain: MaskDomain) -> u32 {
    match level {
        AccessLevel::None => 0,
        AccessLevel::Read => MASK_READ,
        AccessLevel::Write | AccessLevel::Edit => MASK_WRITE,
        AccessLevel::ReadWrite => MASK_READ | MASK_WRITE,
        AccessLevel::Delete => delete_mask(domain),
    }
}

/// Coarse level for a mask, or `None` when the mask is not one of the level
/// masks.
pub fn mask_to_level(mask: u32, domain: MaskDomain) -> Option<AccessLevel> {
    match mask {
        0 => Some(AccessLevel::None),
        MASK_READ => Some(AccessLevel::Read),
        MASK_WRITE => Some(AccessLevel::Write),
        m if m == MASK_READ | MASK_WRITE => Some(AccessLevel::ReadWrite),
        m if m == delete_mask(domain) => Some(AccessLevel::Delete),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Symbolic CDMI strings
// ---------------------------------------------------------------------------

/// Fold a value over an ordered `(bit, name)` table: every fully matched bit
/// contributes its name and is cleared; stops as soon as nothing is left.
fn bits_to_names<'a>(value: u32, table: impl IntoIterator<Item = (u32, &'a str)>) -> String {
    let mut remaining = value;
    let mut names = Vec::new();
    for (bit, name) in table {
        if remaining == 0 {
            break;
        }
        if remaining & bit == bit {
            names.push(name);
            remaining ^= bit;
        }
    }
    names.join(", ")
}

/// Symbolic CDMI form of an ACE mask, e.g. `"WRITE_METADATA, READ_METADATA"`.
pub fn acemask_to_cdmi(mask: u32, domain: MaskDomain) -> String {
    bits_to_names(
        mask,
        ACEMASK_TABLE.iter().map(|&(bit, obj, cont)| match domain {
            MaskDomain::Object => (bit, obj),
            MaskDomain::Container => (bit, cont),
        }),
    )
}

/// Symbolic CDMI form of ACE flags, e.g. `"CONTAINER_INHERIT, OBJECT_INHERIT"`.
pub fn aceflag_to_cdmi(flags: u32) -> String {
    bits_to_names(flags, ACEFLAG_TABLE.iter().copied())
}

/// Parse a comma-separated list of mask names. Unknown names contribute
/// nothing.
pub fn cdmi_to_acemask(text: &str, domain: MaskDomain) -> u32 {
    text.split(',')
        .map(|part| part.trim().to_uppercase())
        .filter_map(|name| {
            ACEMASK_TABLE
                .iter()
                .find(|&&(_, obj, cont)| match domain {
                    MaskDomain::Object => obj == name,
                    MaskDomain::Container => cont == name,
                })
                .map(|&(bit, _, _)| bit)
        })
        .fold(0, |acc, bit| acc | bit)
}

/// Parse a comma-separated list of flag names. Unknown names contribute
/// nothing.
pub fn cdmi_to_aceflag(text: &str) -> u32 {
    text.split(',')
        .map(|part| part.trim().to_uppercase())
        .filter_map(|name| {
            ACEFLAG_TABLE
                .iter()
                .find(|&&(_, n)| n == name)
                .map(|&(bit, _)| bit)
        })
        .fold(0, |acc, bit| acc | bit)
}
