//! MIB tree: ordered OID dictionary for the management interfaces

use crate::errors::MibError;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Access level of a MIB object, in increasing capability order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum MibAccess {
    #[default]
    NotAccessible,
    AccessibleForNotify,
    ReadOnly,
    ReadWrite,
    ReadCreate,
}

impl MibAccess {
    pub fn parse(s: &str) -> Self {
        match s {
            "accessible-for-notify" => Self::AccessibleForNotify,
            "read-only" => Self::ReadOnly,
            "read-write" => Self::ReadWrite,
            "read-create" => Self::ReadCreate,
            _ => Self::NotAccessible,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::NotAccessible => "not-accessible",
            Self::AccessibleForNotify => "accessible-for-notify",
            Self::ReadOnly => "read-only",
            Self::ReadWrite => "read-write",
            Self::ReadCreate => "read-create",
        }
    }
}

/// One MIB definition file entry
#[derive(Debug, Clone, Serialize, Deserialize)]
struct MibEntryDef {
    oid: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    access: String,
    #[serde(default, rename = "type")]
    value_type: String,
    #[serde(default)]
    revision: String,
}

/// A MIB object: OID, symbolic name, access, type and revision.
///
/// `index` is filled in by table lookups that matched after stripping a
/// trailing component off the requested OID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MibEntry {
    pub oid: String,
    pub name: String,
    pub access: MibAccess,
    pub value_type: String,
    pub revision: String,
    pub index: u32,
}

impl MibEntry {
    fn from_def(def: MibEntryDef) -> Self {
        Self {
            access: MibAccess::parse(&def.access),
            oid: def.oid,
            name: def.name,
            value_type: def.value_type,
            revision: def.revision,
            index: 0,
        }
    }

    /// OID of the parent node, if any
    pub fn parent(&self) -> Option<&str> {
        self.oid.rfind('.').map(|pos| &self.oid[..pos])
    }
}

/// Ordered dictionary of MIB objects.
///
/// Definition order is preserved; walks (`find_next`) and prefix
/// matches rely on it.
#[derive(Debug, Default)]
pub struct MibTree {
    entries: Vec<MibEntry>,
}

impl MibTree {
    pub fn new(entries: Vec<MibEntry>) -> Self {
        Self { entries }
    }

    /// Load the tree from its JSON definition file
    pub fn load(path: &str) -> Result<Self, MibError> {
        let content = std::fs::read_to_string(path).map_err(|e| MibError::Load(e.to_string()))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, MibError> {
        let defs: Vec<MibEntryDef> =
            serde_json::from_str(content).map_err(|e| MibError::Load(e.to_string()))?;
        if defs.is_empty() {
            warn!("MIB tree definition is empty");
        }
        Ok(Self { entries: defs.into_iter().map(MibEntry::from_def).collect() })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn position(&self, oid: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.oid == oid)
    }

    /// Find by symbolic name
    pub fn find_name(&self, name: &str) -> Option<&MibEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// Find by OID: exact match, else strip up to two trailing
    /// components, recording the last stripped one as the entry index
    pub fn find(&self, oid: &str) -> Option<MibEntry> {
        let mut value = oid.to_string();
        let mut index = 0u32;
        for _ in 0..=2 {
            if let Some(pos) = self.position(&value) {
                let mut entry = self.entries[pos].clone();
                entry.index = index;
                return Some(entry);
            }
            let dot = value.rfind('.')?;
            index = value[dot + 1..].parse().unwrap_or(0);
            value.truncate(dot);
        }
        None
    }

    /// Next readable object after `oid`, for GETNEXT-style walks.
    ///
    /// An exact match that is itself readable is returned as-is; a
    /// scalar resolved by stripping comes back with the next index.
    pub fn find_next(&self, oid: &str) -> Option<MibEntry> {
        if let Some(pos) = self.position(oid) {
            let entry = &self.entries[pos];
            if entry.access > MibAccess::AccessibleForNotify {
                return Some(entry.clone());
            }
        }
        let mut value = oid.to_string();
        let mut index = 0u32;
        loop {
            if let Some(pos) = self.position(&value) {
                if self.entries[pos].oid == oid {
                    return self.entries[pos + 1..]
                        .iter()
                        .find(|e| e.access > MibAccess::AccessibleForNotify)
                        .cloned();
                }
                let mut entry = self.entries[pos].clone();
                entry.index = index + 1;
                return Some(entry);
            }
            let dot = value.rfind('.')?;
            index = value[dot + 1..].parse().unwrap_or(0);
            value.truncate(dot);
        }
    }

    /// Revision of the first ancestor carrying one
    pub fn find_revision(&self, name: &str) -> String {
        let Some(mut entry) = self.find_name(name).cloned() else {
            return String::new();
        };
        loop {
            let Some(parent_oid) = entry.parent().map(str::to_string) else {
                return String::new();
            };
            let Some(parent) = self.find(&parent_oid) else {
                return String::new();
            };
            if !parent.revision.is_empty() {
                return parent.revision;
            }
            entry = parent;
        }
    }

    /// Access level for an OID, `NotAccessible` when unknown
    pub fn access(&self, oid: &str) -> MibAccess {
        self.find(oid).map(|e| e.access).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree() -> MibTree {
        MibTree::parse(
            r#"[
                {"oid": "1.3.6.1.2.1.1", "name": "system", "access": "", "type": "", "revision": "r7"},
                {"oid": "1.3.6.1.2.1.1.1", "name": "sysDescr", "access": "read-only", "type": "DisplayString", "revision": ""},
                {"oid": "1.3.6.1.2.1.1.2", "name": "sysObjectID", "access": "accessible-for-notify", "type": "OBJECT IDENTIFIER", "revision": ""},
                {"oid": "1.3.6.1.2.1.1.3", "name": "sysUpTime", "access": "read-write", "type": "TimeTicks", "revision": ""}
            ]"#,
        )
        .unwrap()
    }

    #[test]
    fn find_by_name() {
        let t = tree();
        assert_eq!(t.find_name("sysDescr").unwrap().oid, "1.3.6.1.2.1.1.1");
        assert!(t.find_name("nosuch").is_none());
    }

    #[test]
    fn find_exact_and_stripped() {
        let t = tree();
        let exact = t.find("1.3.6.1.2.1.1.1").unwrap();
        assert_eq!(exact.name, "sysDescr");
        assert_eq!(exact.index, 0);
        // scalar instance: one strip, index captured
        let scalar = t.find("1.3.6.1.2.1.1.1.0").unwrap();
        assert_eq!(scalar.name, "sysDescr");
        assert_eq!(scalar.index, 0);
        let cell = t.find("1.3.6.1.2.1.1.1.5").unwrap();
        assert_eq!(cell.index, 5);
        // more than two strips never match
        assert!(t.find("1.3.6.1.2.1.1.1.5.6.7").is_none());
    }

    #[test]
    fn find_next_skips_notify_only() {
        let t = tree();
        // readable exact match returns itself
        assert_eq!(t.find_next("1.3.6.1.2.1.1.1").unwrap().name, "sysDescr");
        // walk from sysObjectID skips it (notify-only) to sysUpTime
        assert_eq!(t.find_next("1.3.6.1.2.1.1.2").unwrap().name, "sysUpTime");
        // unknown subtree resolves to nothing
        assert!(t.find_next("2.5.4").is_none());
    }

    #[test]
    fn find_next_instance_bumps_index() {
        let t = tree();
        let next = t.find_next("1.3.6.1.2.1.1.1.4").unwrap();
        assert_eq!(next.name, "sysDescr");
        assert_eq!(next.index, 5);
    }

    #[test]
    fn revision_walks_ancestors() {
        let t = tree();
        assert_eq!(t.find_revision("sysDescr"), "r7");
        assert_eq!(t.find_revision("system"), "");
    }

    #[test]
    fn access_lookup() {
        let t = tree();
        assert_eq!(t.access("1.3.6.1.2.1.1.3"), MibAccess::ReadWrite);
        assert_eq!(t.access("9.9.9"), MibAccess::NotAccessible);
    }
}
