use std::collections::HashMap;
use std::num::NonZeroUsize;

use euclid::default::{Box2D, Point2D};

/// Transparent border kept around every tile so bilinear sampling does not bleed.
const ATLAS_MARGIN: usize = 2;

/// Identifies one rasterized glyph image inside an atlas.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct AtlasKey {
    glyph_index: u16,
    /// point size * SUB_PIXEL_QUANTIZE
    size: u32,
}

const SUB_PIXEL_QUANTIZE: f32 = 256.0;

impl AtlasKey {
    pub fn new(glyph_index: u16, size: f32) -> Self {
        Self {
            glyph_index,
            size: (size * SUB_PIXEL_QUANTIZE).round() as u32,
        }
    }

    pub fn glyph_index(&self) -> u16 {
        self.glyph_index
    }

    pub fn size(&self) -> f32 {
        self.size as f32 / SUB_PIXEL_QUANTIZE
    }
}

/// protect `push_front`, `move_node_to_front` and `attach_to_head` from incorrect usage.
mod cache_state {
    use super::*;

    #[derive(Default, Clone, Copy)]
    struct LruNode {
        key: Option<AtlasKey>,
        newer: Option<usize>,
        older: Option<usize>,
        last_used_batch_id: usize,
    }

    pub enum Slot {
        Hit(usize),
        NeedToUpload(usize),
    }

    pub struct CacheState {
        capacity: usize,

        lru_nodes: Vec<LruNode>,
        lru_head: Option<usize>,
        lru_tail: Option<usize>,
        lru_map: HashMap<AtlasKey, usize, fxhash::FxBuildHasher>,
        lru_empties: Vec<usize>,

        current_batch_id: usize,
    }

    impl CacheState {
        pub fn new(capacity: NonZeroUsize) -> Self {
            let capacity = capacity.get();
            Self {
                capacity,
                lru_nodes: vec![LruNode::default(); capacity],
                lru_head: None,
                lru_tail: None,
                lru_map: HashMap::with_capacity_and_hasher(
                    capacity,
                    fxhash::FxBuildHasher::default(),
                ),
                lru_empties: (0..capacity).rev().collect(),
                current_batch_id: 0,
            }
        }

        pub fn clear(&mut self) {
            self.lru_map.clear();
            self.lru_empties.clear();
            self.lru_empties.extend((0..self.capacity).rev());
            self.lru_nodes.fill(LruNode::default());
            self.lru_head = None;
            self.lru_tail = None;
        }

        pub fn new_batch(&mut self) {
            self.current_batch_id = self.current_batch_id.wrapping_add(1);
        }

        pub fn len(&self) -> usize {
            self.lru_map.len()
        }

        /// Looks `key` up, or claims a slot for it.
        ///
        /// Slots touched during the current batch are never evicted; `None`
        /// means every slot is in use by this batch.
        pub fn get_or_push_and_protect(&mut self, key: &AtlasKey) -> Option<Slot> {
            if let Some(&index) = self.lru_map.get(key) {
                self.lru_nodes[index].last_used_batch_id = self.current_batch_id;
                self.move_node_to_front(index);
                return Some(Slot::Hit(index));
            }

            if let Some(tail_idx) = self.lru_tail
                && self.lru_empties.is_empty()
                && self.lru_nodes[tail_idx].last_used_batch_id == self.current_batch_id
            {
                // tail is protected
                return None;
            }

            let index = self.push_front(*key);
            self.lru_nodes[index].last_used_batch_id = self.current_batch_id;
            Some(Slot::NeedToUpload(index))
        }

        fn push_front(&mut self, key: AtlasKey) -> usize {
            let target_idx = match self.lru_empties.pop() {
                Some(idx) => idx,
                None => {
                    // all slots are used, evict tail
                    let tail_idx = self.lru_tail.unwrap_or(0);

                    if let Some(second_tail) = self.lru_nodes[tail_idx].newer {
                        self.lru_nodes[second_tail].older = None;
                        self.lru_tail = Some(second_tail);
                    } else {
                        // tail == head (capacity 1)
                        self.lru_head = None;
                        self.lru_tail = None;
                    }

                    if let Some(old_key) = self.lru_nodes[tail_idx].key.take() {
                        self.lru_map.remove(&old_key);
                    }

                    tail_idx
                }
            };

            self.attach_to_head(target_idx, key);
            target_idx
        }

        fn move_node_to_front(&mut self, current_index: usize) {
            let older_idx = self.lru_nodes[current_index].older;
            let newer_idx = self.lru_nodes[current_index].newer;

            let Some(newer_idx) = newer_idx else {
                // already at head
                return;
            };

            // unlink
            self.lru_nodes[newer_idx].older = older_idx;
            match older_idx {
                Some(older_idx) => self.lru_nodes[older_idx].newer = Some(newer_idx),
                None => self.lru_tail = Some(newer_idx),
            }

            // relink at head
            if let Some(old_head_idx) = self.lru_head {
                self.lru_nodes[old_head_idx].newer = Some(current_index);
            }
            self.lru_nodes[current_index].older = self.lru_head;
            self.lru_nodes[current_index].newer = None;
            self.lru_head = Some(current_index);
        }

        fn attach_to_head(&mut self, node_idx: usize, key: AtlasKey) {
            self.lru_nodes[node_idx].newer = None;
            self.lru_nodes[node_idx].older = self.lru_head;
            self.lru_nodes[node_idx].key = Some(key);
            self.lru_map.insert(key, node_idx);

            if let Some(old_head_idx) = self.lru_head {
                self.lru_nodes[old_head_idx].newer = Some(node_idx);
            }

            self.lru_head = Some(node_idx);
            if self.lru_tail.is_none() {
                self.lru_tail = Some(node_idx);
            }
        }
    }
}

/// Configuration for the glyph atlas.
#[derive(Clone, Debug)]
pub struct AtlasConfig {
    /// Length of one side of a square tile, in pixels.
    pub tile_size: NonZeroUsize,
    /// Number of tiles along one axis of the texture.
    pub tiles_per_axis: NonZeroUsize,
}

const DEFAULT_TILE_SIZE: NonZeroUsize = NonZeroUsize::new(64).unwrap();
const DEFAULT_TILES_PER_AXIS: NonZeroUsize = NonZeroUsize::new(32).unwrap();

impl Default for AtlasConfig {
    fn default() -> Self {
        Self {
            tile_size: DEFAULT_TILE_SIZE,
            tiles_per_axis: DEFAULT_TILES_PER_AXIS,
        }
    }
}

impl AtlasConfig {
    pub fn texture_size(&self) -> usize {
        self.tile_size.get() * self.tiles_per_axis.get()
    }
}

/// Pixels the host has to copy into the atlas texture.
#[derive(Clone, Debug, PartialEq)]
pub struct AtlasUpdate {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
    /// Row-major 8-bit coverage.
    pub pixels: Vec<u8>,
}

/// Result of placing a glyph image into the atlas.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AtlasEntry {
    pub uv: Box2D<f32>,
}

/// Square tile atlas with LRU eviction, shared by all sizes of one face.
///
/// Tiles used since the last [`GlyphAtlas::new_batch`] are protected; when a
/// new glyph finds no unprotected tile the whole atlas is rebuilt and its
/// generation advances, which tells every consumer to re-measure.
pub struct GlyphAtlas {
    tile_size: usize,
    tiles_per_axis: usize,
    texture_size: usize,
    state: cache_state::CacheState,
    pending: Vec<AtlasUpdate>,
    generation: u64,
}

impl GlyphAtlas {
    pub fn new(config: &AtlasConfig) -> Self {
        let tiles_per_axis = config.tiles_per_axis.get();
        let capacity = NonZeroUsize::new(tiles_per_axis.saturating_mul(tiles_per_axis))
            .unwrap_or(NonZeroUsize::MIN);

        // the bottom-right texel sits in the margin of the last tile and is never used by glyphs
        Self {
            tile_size: config.tile_size.get(),
            tiles_per_axis,
            texture_size: config.texture_size(),
            state: cache_state::CacheState::new(capacity),
            pending: vec![Self::solid_update(config.texture_size())],
            generation: 0,
        }
    }

    fn solid_update(texture_size: usize) -> AtlasUpdate {
        AtlasUpdate {
            x: texture_size.saturating_sub(1),
            y: texture_size.saturating_sub(1),
            width: 1,
            height: 1,
            pixels: vec![255],
        }
    }

    /// Incremented whenever the atlas is rebuilt from scratch.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn texture_size(&self) -> usize {
        self.texture_size
    }

    pub fn len(&self) -> usize {
        self.state.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn new_batch(&mut self) {
        self.state.new_batch();
    }

    /// Drops every glyph and schedules the solid texel again.
    pub fn rebuild(&mut self) {
        self.state.clear();
        self.state.new_batch();
        self.pending.clear();
        self.pending.push(Self::solid_update(self.texture_size));
        self.generation += 1;
    }

    /// Uploads queued since the last call.
    pub fn take_updates(&mut self) -> Vec<AtlasUpdate> {
        std::mem::take(&mut self.pending)
    }

    /// UV of the reserved opaque texel.
    pub fn solid_uv(&self) -> Box2D<f32> {
        let size = self.texture_size as f32;
        let texel = Point2D::new((size - 0.5) / size, (size - 0.5) / size);
        Box2D::new(texel, texel)
    }

    /// Returns the atlas entry for `key`, rasterizing with `rasterize` on a miss.
    ///
    /// `rasterize` yields `(width, height, coverage)`. Images larger than a
    /// tile are rejected. When the atlas is full of protected tiles it is
    /// rebuilt once and the insert retried.
    pub fn get_or_insert_with(
        &mut self,
        key: AtlasKey,
        width: usize,
        height: usize,
        rasterize: impl FnOnce() -> Vec<u8>,
    ) -> Option<AtlasEntry> {
        if width.max(height) + ATLAS_MARGIN > self.tile_size {
            log::warn!(
                "Glyph {} at size {} does not fit a {}px atlas tile.",
                key.glyph_index(),
                key.size(),
                self.tile_size
            );
            return None;
        }

        let slot = match self.state.get_or_push_and_protect(&key) {
            Some(slot) => slot,
            None => {
                log::warn!("Glyph atlas is full; rebuilding.");
                self.rebuild();
                self.state.get_or_push_and_protect(&key)?
            }
        };

        let (index, upload) = match slot {
            cache_state::Slot::Hit(index) => (index, false),
            cache_state::Slot::NeedToUpload(index) => (index, true),
        };

        let x = (index % self.tiles_per_axis) * self.tile_size + ATLAS_MARGIN / 2;
        let y = (index / self.tiles_per_axis) * self.tile_size + ATLAS_MARGIN / 2;

        if upload {
            self.pending.push(AtlasUpdate {
                x,
                y,
                width,
                height,
                pixels: rasterize(),
            });
        }

        let size = self.texture_size as f32;
        Some(AtlasEntry {
            uv: Box2D::new(
                Point2D::new(x as f32 / size, y as f32 / size),
                Point2D::new((x + width) as f32 / size, (y + height) as f32 / size),
            ),
        })
    }
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn tiny_atlas(tiles_per_axis: usize) -> GlyphAtlas {
        GlyphAtlas::new(&AtlasConfig {
            tile_size: NonZeroUsize::new(8).unwrap(),
            tiles_per_axis: NonZeroUsize::new(tiles_per_axis).unwrap(),
        })
    }

    #[test]
    fn hit_does_not_upload_twice() {
        let mut atlas = tiny_atlas(2);
        atlas.take_updates();

        let key = AtlasKey::new(1, 12.0);
        let first = atlas.get_or_insert_with(key, 4, 4, || vec![1; 16]).unwrap();
        let second = atlas
            .get_or_insert_with(key, 4, 4, || panic!("must not rasterize a cached glyph"))
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(atlas.take_updates().len(), 1);
    }

    #[test]
    fn evicts_unprotected_tiles_across_batches() {
        let mut atlas = tiny_atlas(1);
        atlas.get_or_insert_with(AtlasKey::new(1, 12.0), 2, 2, || vec![0; 4]);

        atlas.new_batch();
        atlas.get_or_insert_with(AtlasKey::new(2, 12.0), 2, 2, || vec![0; 4]);
        assert_eq!(atlas.len(), 1);
        assert_eq!(atlas.generation(), 0);
    }

    #[test]
    fn full_batch_rebuilds_and_bumps_generation() {
        let mut atlas = tiny_atlas(1);
        atlas.get_or_insert_with(AtlasKey::new(1, 12.0), 2, 2, || vec![0; 4]);
        // same batch: the only tile is protected
        let entry = atlas.get_or_insert_with(AtlasKey::new(2, 12.0), 2, 2, || vec![0; 4]);
        assert!(entry.is_some());
        assert_eq!(atlas.generation(), 1);
        assert_eq!(atlas.len(), 1);
    }

    #[test]
    fn rejects_oversized_glyphs() {
        let mut atlas = tiny_atlas(2);
        assert!(
            atlas
                .get_or_insert_with(AtlasKey::new(1, 99.0), 20, 20, Vec::new)
                .is_none()
        );
    }

    #[test]
    fn lru_order_keeps_recent_glyphs() {
        let mut atlas = tiny_atlas(2);
        // 4 tiles
        for i in 0..4 {
            atlas.get_or_insert_with(AtlasKey::new(i, 12.0), 2, 2, || vec![0; 4]);
        }
        atlas.new_batch();
        // touch glyph 0 so glyph 1 becomes the oldest
        atlas.get_or_insert_with(AtlasKey::new(0, 12.0), 2, 2, || panic!("cached"));
        atlas.take_updates();
        atlas.get_or_insert_with(AtlasKey::new(9, 12.0), 2, 2, || vec![0; 4]);
        atlas.get_or_insert_with(AtlasKey::new(0, 12.0), 2, 2, || panic!("still cached"));
        assert_eq!(atlas.take_updates().len(), 1);
    }
}
