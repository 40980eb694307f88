//! Typed shader-visible views
//!
//! Passes name what they want to read by `ViewKey`. The table lays the views
//! out contiguously and remembers which resource backs each one; the slot
//! numbers stay private to backends.

use crate::error::{EngineError, EngineResult};
use crate::gpu::resource::ResourceId;
use crate::scene::TextureId;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GBufferTarget {
    Albedo,
    Normal,
    Position,
    Velocity,
}

impl GBufferTarget {
    pub const ALL: [GBufferTarget; 4] = [
        GBufferTarget::Albedo,
        GBufferTarget::Normal,
        GBufferTarget::Position,
        GBufferTarget::Velocity,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LutKind {
    Effect,
    Neutral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ViewKey {
    GBuffer(GBufferTarget),
    SceneColor,
    Depth,
    TaaHistory(u8),
    DepthHistory(u8),
    ShadowMap(u32),
    NullShadow,
    Texture(TextureId),
    Heightmap(u32),
    Lut(LutKind),
}

/// Flat view table, rebuilt wholesale whenever a backing resource changes
#[derive(Debug, Default, Clone)]
pub struct DescriptorTable {
    entries: Vec<(ViewKey, ResourceId)>,
    slots: HashMap<ViewKey, usize>,
    generation: u64,
}

impl DescriptorTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace every entry. Callers must have flushed the GPU first.
    pub fn rebuild(&mut self, entries: impl IntoIterator<Item = (ViewKey, ResourceId)>) {
        self.entries.clear();
        self.slots.clear();
        for (key, resource) in entries {
            if self.slots.contains_key(&key) {
                log::warn!("[DescriptorTable::rebuild] Duplicate view {:?} ignored", key);
                continue;
            }
            self.slots.insert(key, self.entries.len());
            self.entries.push((key, resource));
        }
        self.generation += 1;
        log::debug!(
            "[DescriptorTable::rebuild] {} views, generation {}",
            self.entries.len(),
            self.generation
        );
    }

    pub fn resolve(&self, key: ViewKey) -> EngineResult<ResourceId> {
        self.slots
            .get(&key)
            .map(|&slot| self.entries[slot].1)
            .ok_or_else(|| EngineError::AssetNotFound {
                kind: "view",
                name: format!("{:?}", key),
            })
    }

    pub fn contains(&self, key: ViewKey) -> bool {
        self.slots.contains_key(&key)
    }

    pub(crate) fn slot(&self, key: ViewKey) -> Option<usize> {
        self.slots.get(&key).copied()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(ViewKey, ResourceId)> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rebuild_replaces_entries() {
        let mut table = DescriptorTable::new();
        table.rebuild([
            (ViewKey::SceneColor, ResourceId(0)),
            (ViewKey::Depth, ResourceId(1)),
        ]);
        assert_eq!(table.generation(), 1);
        assert_eq!(table.resolve(ViewKey::Depth).unwrap(), ResourceId(1));
        assert_eq!(table.slot(ViewKey::SceneColor), Some(0));

        table.rebuild([(ViewKey::Depth, ResourceId(5))]);
        assert_eq!(table.generation(), 2);
        assert_eq!(table.len(), 1);
        assert_eq!(table.slot(ViewKey::Depth), Some(0));
        assert!(table.resolve(ViewKey::SceneColor).is_err());
    }

    #[test]
    fn test_duplicates_keep_first() {
        let mut table = DescriptorTable::new();
        table.rebuild([
            (ViewKey::ShadowMap(0), ResourceId(3)),
            (ViewKey::ShadowMap(0), ResourceId(4)),
        ]);
        assert_eq!(table.resolve(ViewKey::ShadowMap(0)).unwrap(), ResourceId(3));
    }
}
