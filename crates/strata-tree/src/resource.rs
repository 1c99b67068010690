use serde_json::{json, Value};
use strata_acl::{Acl, MaskDomain};
use strata_blob::INTERNAL_SCHEME;
use strata_types::{box_metadata, merge, unbox_metadata, EntityId, Metadata, Timestamp};

use crate::entry::ObjectRecord;

/// A file in the archive. Its bytes live either in the blob store
/// (`cassandra://<blob>`) or behind an external url.
#[derive(Clone, Debug, PartialEq)]
pub struct Resource {
    pub id: EntityId,
    pub container: String,
    pub name: String,
    pub url: String,
    pub mimetype: Option<String>,
    pub size: u64,
    pub checksum: Option<String>,
    pub metadata: Metadata,
    pub acl: Acl,
    pub created_at: Timestamp,
    pub modified_at: Timestamp,
}

impl Resource {
    pub(crate) fn from_record(container: &str, name: &str, record: ObjectRecord) -> Self {
        Self {
            id: record.id,
            container: container.to_string(),
            name: name.to_string(),
            url: record.url,
            mimetype: record.mimetype,
            size: record.size,
            checksum: record.checksum,
            metadata: unbox_metadata(&record.metadata),
            acl: record.acl,
            created_at: record.created_at,
            modified_at: record.modified_at,
        }
    }

    pub(crate) fn to_record(&self) -> ObjectRecord {
        let mut metadata = self.metadata.clone();
        if let Some(mimetype) = &self.mimetype {
            metadata.insert("cdmi_mimetype".into(), mimetype.clone().into());
        }
        ObjectRecord {
            id: self.id,
            url: self.url.clone(),
            mimetype: self.mimetype.clone(),
            size: self.size,
            checksum: self.checksum.clone(),
            metadata: box_metadata(&metadata),
            acl: self.acl.clone(),
            created_at: self.created_at,
            modified_at: self.modified_at,
        }
    }

    pub fn path(&self) -> String {
        merge(&self.container, &self.name)
    }

    /// `true` when the content lives in the blob store.
    pub fn is_internal(&self) -> bool {
        is_internal_url(&self.url)
    }

    /// Id of the backing blob, for internal resources.
    pub fn blob_id(&self) -> Option<EntityId> {
        self.url
            .strip_prefix(INTERNAL_SCHEME)
            .and_then(|rest| rest.strip_prefix("://"))
            .and_then(|id| id.parse().ok())
    }

    /// CDMI data object representation (without the value).
    pub fn to_cdmi(&self) -> Value {
        let mut metadata = serde_json::to_value(&self.metadata).unwrap_or(Value::Null);
        if let Value::Object(map) = &mut metadata {
            map.insert("cdmi_acl".into(), self.acl.to_cdmi(MaskDomain::Object));
            map.insert("cdmi_size".into(), json!(self.size.to_string()));
            map.insert("cdmi_ctime".into(), json!(self.created_at.to_rfc3339()));
            map.insert("cdmi_mtime".into(), json!(self.modified_at.to_rfc3339()));
            if let Some(checksum) = &self.checksum {
                map.insert("cdmi_checksum".into(), json!(checksum));
            }
        }
        json!({
            "objectType": "application/cdmi-object",
            "objectID": self.id.to_string(),
            "objectName": self.name,
            "parentURI": self.container,
            "path": self.path(),
            "mimetype": self.mimetype.as_deref().unwrap_or("application/octet-stream"),
            "url": self.url,
            "metadata": metadata,
        })
    }
}

pub fn is_internal_url(url: &str) -> bool {
    url.strip_prefix(INTERNAL_SCHEME)
        .is_some_and(|rest| rest.starts_with("://"))
}

/// Attributes for a new resource.
#[derive(Clone, Debug, Default)]
pub struct ResourceSpec {
    pub url: String,
    pub mimetype: Option<String>,
    pub size: u64,
    pub checksum: Option<String>,
    pub metadata: Metadata,
    pub acl: Acl,
}

impl ResourceSpec {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }
}

/// Fields to replace on a resource. `None` keeps the current value.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResourceUpdate {
    pub url: Option<String>,
    pub mimetype: Option<String>,
    pub size: Option<u64>,
    pub checksum: Option<String>,
    pub metadata: Option<Metadata>,
    pub acl: Option<Acl>,
}

impl ResourceUpdate {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resource(url: &str) -> Resource {
        let now = strata_types::now();
        Resource {
            id: EntityId::new(),
            container: "/a".into(),
            name: "f.txt".into(),
            url: url.into(),
            mimetype: Some("text/plain".into()),
            size: 3,
            checksum: None,
            metadata: Metadata::new(),
            acl: Acl::new(),
            created_at: now,
            modified_at: now,
        }
    }

    #[test]
    fn internal_urls_expose_blob_id() {
        let id = EntityId::new();
        let r = resource(&format!("cassandra://{id}"));
        assert!(r.is_internal());
        assert_eq!(r.blob_id(), Some(id));
        assert_eq!(r.path(), "/a/f.txt");

        let r = resource("file://10.0.0.1/data/f.txt");
        assert!(!r.is_internal());
        assert_eq!(r.blob_id(), None);
    }

    #[test]
    fn mimetype_is_mirrored_into_metadata() {
        let r = resource("file://h/x");
        let record = r.to_record();
        assert!(record.metadata.contains_key("cdmi_mimetype"));
        let back = Resource::from_record("/a", "f.txt", record);
        assert_eq!(
            back.metadata.get("cdmi_mimetype"),
            Some(&strata_types::MetaValue::from("text/plain"))
        );
    }

    #[test]
    fn empty_update() {
        assert!(ResourceUpdate::default().is_empty());
        let u = ResourceUpdate {
            size: Some(1),
            ..Default::default()
        };
        assert!(!u.is_empty());
    }
}
