use serde_json::{json, Value};
use strata_acl::{Acl, MaskDomain};
use strata_types::{box_metadata, is_root, split, unbox_metadata, EntityId, Metadata, Timestamp};

use crate::entry::DirectoryRecord;

/// A directory in the archive.
#[derive(Clone, Debug, PartialEq)]
pub struct Collection {
    pub id: EntityId,
    pub path: String,
    /// Path of the enclosing collection; the root is its own container.
    pub container: String,
    /// Empty for the root.
    pub name: String,
    pub metadata: Metadata,
    pub acl: Acl,
    pub created_at: Timestamp,
    pub modified_at: Timestamp,
}

impl Collection {
    pub(crate) fn from_record(path: &str, record: DirectoryRecord) -> Self {
        let (container, name) = split(path);
        Self {
            id: record.id,
            path: path.to_string(),
            container,
            name,
            metadata: unbox_metadata(&record.metadata),
            acl: record.acl,
            created_at: record.created_at,
            modified_at: record.modified_at,
        }
    }

    pub(crate) fn to_record(&self) -> DirectoryRecord {
        DirectoryRecord {
            id: self.id,
            metadata: box_metadata(&self.metadata),
            acl: self.acl.clone(),
            created_at: self.created_at,
            modified_at: self.modified_at,
        }
    }

    pub fn is_root(&self) -> bool {
        is_root(&self.path)
    }

    /// CDMI container representation.
    pub fn to_cdmi(&self) -> Value {
        let mut metadata = serde_json::to_value(&self.metadata).unwrap_or(Value::Null);
        if let Value::Object(map) = &mut metadata {
            map.insert("cdmi_acl".into(), self.acl.to_cdmi(MaskDomain::Container));
            map.insert("cdmi_ctime".into(), json!(self.created_at.to_rfc3339()));
            map.insert("cdmi_mtime".into(), json!(self.modified_at.to_rfc3339()));
        }
        let name = if self.is_root() {
            String::from("/")
        } else {
            format!("{}/", self.name)
        };
        json!({
            "objectType": "application/cdmi-container",
            "objectID": self.id.to_string(),
            "objectName": name,
            "parentURI": self.container,
            "path": self.path,
            "metadata": metadata,
        })
    }
}

/// Fields to replace on a collection. `None` keeps the current value.
#[derive(Clone, Debug, Default)]
pub struct CollectionUpdate {
    pub metadata: Option<Metadata>,
    pub acl: Option<Acl>,
}
