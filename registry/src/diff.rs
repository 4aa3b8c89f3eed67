//! `Diff` (§4.10): compares two registries' current heads by name.

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ManifestDiff {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub modified: Vec<ModifiedEntry>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ModifiedEntry {
    pub name: String,
    pub old_hash: String,
    pub new_hash: String,
    pub old_version: String,
    pub new_version: String,
}

impl ManifestDiff {
    pub fn has_changes(&self) -> bool {
        !self.added.is_empty() || !self.removed.is_empty() || !self.modified.is_empty()
    }
}
