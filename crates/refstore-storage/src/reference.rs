use serde::{Deserialize, Serialize};

use crate::id::ObjId;

/// A mutable named pointer to an object, such as a branch or a tag.
///
/// References are identified by name within a repository. Every update
/// produces a new value with a bumped `generation`; backends use the full
/// expected state for compare-and-swap updates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    name: String,
    pointer: ObjId,
    deleted: bool,
    generation: u64,
    extended_info: Option<ObjId>,
}

impl Reference {
    pub fn new(name: impl Into<String>, pointer: ObjId) -> Self {
        Reference {
            name: name.into(),
            pointer,
            deleted: false,
            generation: 0,
            extended_info: None,
        }
    }

    pub fn with_extended_info(mut self, extended_info: Option<ObjId>) -> Self {
        self.extended_info = extended_info;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pointer(&self) -> &ObjId {
        &self.pointer
    }

    pub fn deleted(&self) -> bool {
        self.deleted
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn extended_info(&self) -> Option<&ObjId> {
        self.extended_info.as_ref()
    }

    /// The successor state pointing at `pointer`.
    pub fn forward_to(&self, pointer: ObjId) -> Self {
        Reference {
            name: self.name.clone(),
            pointer,
            deleted: self.deleted,
            generation: self.generation + 1,
            extended_info: self.extended_info.clone(),
        }
    }

    /// The successor state with the deleted marker set.
    pub fn as_deleted(&self) -> Self {
        Reference {
            name: self.name.clone(),
            pointer: self.pointer.clone(),
            deleted: true,
            generation: self.generation + 1,
            extended_info: self.extended_info.clone(),
        }
    }
}
