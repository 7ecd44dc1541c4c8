//! Active Block Manager: per-block lifecycle state, per-page validity, and
//! the per-(channel,chip) free/active/dirty/bad lists (§4.2).
#![cfg_attr(not(test), no_std)]

extern crate alloc;

mod block;
mod list;

pub use block::{Block, BlockState, PageState};

use alloc::vec::Vec;
use ftl_geometry::Geometry;
use list::ListHeads;

/// Opaque reference to a block inside an [`Abm`], a plain index into its
/// backing storage (design note §9: no raw pointers, no refcounting).
pub type BlockId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AbmError {
    /// The free list for a parallel unit is empty.
    #[error("no free block available for punit {punit}")]
    NoFreeBlock { punit: u32 },
    /// `invalidate_page` was called on a block that is currently FREE (I3).
    #[error("invalidate_page called on a free block {channel}/{chip}/{block}")]
    InvalidateOnFreeBlock {
        channel: u32,
        chip: u32,
        block: u32,
    },
}

/// Active Block Manager.
///
/// Owns every [`Block`] descriptor for the array and the per-(channel,chip)
/// lists that partition them by state. All coordinates are validated against
/// the `Geometry` it was created from only via `debug_assert!` — callers
/// above (the facade) are expected to have already range-checked LPAs; this
/// type trusts its channel/chip/block/page arguments.
pub struct Abm {
    geometry: Geometry,
    blocks: Vec<Block>,
    punit_lists: Vec<ListHeads>,
    nr_free_blocks: u32,
    nr_dirty_blocks: u32,
    nr_bad_blocks: u32,
}

impl Abm {
    fn block_index(&self, channel: u32, chip: u32, block: u32) -> u32 {
        (channel * self.geometry.nr_chips_per_channel() + chip) * self.geometry.nr_blocks_per_chip()
            + block
    }

    /// Allocates every block descriptor, all FREE, all linked onto their
    /// punit's free list.
    #[must_use]
    pub fn create(geometry: Geometry) -> Self {
        let nr_punits = geometry.nr_punits();
        let b = geometry.nr_blocks_per_chip();
        let p = geometry.nr_pages_per_block();
        let total = nr_punits as usize * b as usize;

        let mut blocks = Vec::with_capacity(total);
        for channel in 0..geometry.nr_channels() {
            for chip in 0..geometry.nr_chips_per_channel() {
                for blk in 0..b {
                    blocks.push(Block::new_free(channel, chip, blk, p));
                }
            }
        }

        let mut abm = Self {
            geometry,
            blocks,
            punit_lists: alloc::vec![ListHeads::default(); nr_punits as usize],
            nr_free_blocks: total as u32,
            nr_dirty_blocks: 0,
            nr_bad_blocks: 0,
        };
        for channel in 0..abm.geometry.nr_channels() {
            for chip in 0..abm.geometry.nr_chips_per_channel() {
                let punit = abm.geometry.punit_id(channel, chip);
                for blk in 0..b {
                    let idx = abm.block_index(channel, chip, blk);
                    list::push_front(
                        &mut abm.blocks,
                        &mut abm.punit_lists[punit as usize],
                        idx,
                        BlockState::Free,
                    );
                }
            }
        }
        abm
    }

    #[inline]
    #[must_use]
    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    #[inline]
    #[must_use]
    pub fn block(&self, id: BlockId) -> &Block {
        &self.blocks[id as usize]
    }

    /// Peek at the head of a punit's free list without moving it.
    pub fn get_free_block_prepare(&self, channel: u32, chip: u32) -> Result<BlockId, AbmError> {
        let punit = self.geometry.punit_id(channel, chip);
        self.punit_lists[punit as usize]
            .free
            .ok_or(AbmError::NoFreeBlock { punit })
    }

    /// Transitions a previously-prepared block FREE -> ACTIVE.
    pub fn get_free_block_commit(&mut self, id: BlockId) {
        let channel = self.blocks[id as usize].channel;
        let chip = self.blocks[id as usize].chip;
        let punit = self.geometry.punit_id(channel, chip);
        debug_assert_eq!(self.blocks[id as usize].state, BlockState::Free);
        list::move_block(
            &mut self.blocks,
            &mut self.punit_lists[punit as usize],
            id,
            BlockState::Active,
        );
        self.nr_free_blocks -= 1;
        log::trace!("block {channel}/{chip}/{} FREE -> ACTIVE", self.blocks[id as usize].block);
    }

    /// Marks a page VALID; the canonical trigger is a successful mapping-table write (§4.2).
    pub fn mark_page_valid(&mut self, channel: u32, chip: u32, block: u32, page: u32) {
        let idx = self.block_index(channel, chip, block);
        let b = &mut self.blocks[idx as usize];
        debug_assert_eq!(b.pst[page as usize], PageState::Free);
        b.pst[page as usize] = PageState::Valid;
        b.nr_valid_pages += 1;
    }

    /// Invalidates a previously-valid page. Idempotent: invalidating an
    /// already-INVALID or FREE page is a silent no-op.
    pub fn invalidate_page(
        &mut self,
        channel: u32,
        chip: u32,
        block: u32,
        page: u32,
    ) -> Result<(), AbmError> {
        let idx = self.block_index(channel, chip, block);
        let b = &mut self.blocks[idx as usize];
        if b.state == BlockState::Free {
            return Err(AbmError::InvalidateOnFreeBlock {
                channel,
                chip,
                block,
            });
        }
        if b.pst[page as usize] == PageState::Valid {
            b.pst[page as usize] = PageState::Invalid;
            b.nr_valid_pages -= 1;
            b.nr_invalid_pages += 1;
            log::trace!("invalidate {channel}/{chip}/{block}/{page}");
        }
        Ok(())
    }

    /// Marks every still-FREE page at or beyond `from_page` as INVALID
    /// without ever having been VALID.
    ///
    /// Used only by the snapshot store protocol (§4.7) to simulate a cursor
    /// wrap: pages an active block hasn't been allocated out to yet must
    /// not be mistaken for a partially-filled active block on reload, so
    /// they are pre-invalidated, making the block DIRTY and GC-eligible.
    pub fn force_invalidate_unwritten(&mut self, channel: u32, chip: u32, block: u32, from_page: u32) {
        let idx = self.block_index(channel, chip, block);
        let b = &mut self.blocks[idx as usize];
        for page in &mut b.pst[from_page as usize..] {
            if *page == PageState::Free {
                *page = PageState::Invalid;
                b.nr_invalid_pages += 1;
            }
        }
    }

    /// Transitions a punit's active block to DIRTY (allocator rollover, §4.4).
    pub fn transition_active_to_dirty(&mut self, id: BlockId) {
        let channel = self.blocks[id as usize].channel;
        let chip = self.blocks[id as usize].chip;
        let punit = self.geometry.punit_id(channel, chip);
        debug_assert_eq!(self.blocks[id as usize].state, BlockState::Active);
        list::move_block(
            &mut self.blocks,
            &mut self.punit_lists[punit as usize],
            id,
            BlockState::Dirty,
        );
        self.nr_dirty_blocks += 1;
        log::trace!("block {channel}/{chip}/{} ACTIVE -> DIRTY", self.blocks[id as usize].block);
    }

    /// Erases a block: FREE on success, BAD (terminal) on failure.
    pub fn erase_block(&mut self, channel: u32, chip: u32, block: u32, bad: bool) {
        let idx = self.block_index(channel, chip, block);
        let punit = self.geometry.punit_id(channel, chip);
        let prior_state = self.blocks[idx as usize].state;
        if prior_state == BlockState::Dirty {
            self.nr_dirty_blocks -= 1;
        }
        if bad {
            list::move_block(
                &mut self.blocks,
                &mut self.punit_lists[punit as usize],
                idx,
                BlockState::Bad,
            );
            self.nr_bad_blocks += 1;
            log::warn!("block {channel}/{chip}/{block} erase failed, marking BAD");
        } else {
            let b = &mut self.blocks[idx as usize];
            for p in &mut b.pst {
                *p = PageState::Free;
            }
            b.nr_valid_pages = 0;
            b.nr_invalid_pages = 0;
            b.erase_count += 1;
            list::move_block(
                &mut self.blocks,
                &mut self.punit_lists[punit as usize],
                idx,
                BlockState::Free,
            );
            // Only a Dirty -> Free erase (the GC path) grows the free count:
            // a block already FREE or newly-scanned from ACTIVE was already
            // accounted for (or is accounted for by the caller separately),
            // so counting it here would double-count it.
            if prior_state == BlockState::Dirty {
                self.nr_free_blocks += 1;
            }
            log::trace!("block {channel}/{chip}/{block} erased -> FREE");
        }
    }

    #[inline]
    #[must_use]
    pub fn nr_total_blocks(&self) -> u32 {
        self.blocks.len() as u32 - self.nr_bad_blocks
    }

    #[inline]
    #[must_use]
    pub fn nr_free_blocks(&self) -> u32 {
        self.nr_free_blocks
    }

    #[inline]
    #[must_use]
    pub fn nr_dirty_blocks(&self) -> u32 {
        self.nr_dirty_blocks
    }

    #[inline]
    #[must_use]
    pub fn nr_bad_blocks(&self) -> u32 {
        self.nr_bad_blocks
    }

    /// Visits every block on a punit's dirty list, head to tail.
    pub fn for_each_dirty_block(&self, channel: u32, chip: u32, mut visitor: impl FnMut(BlockId, &Block)) {
        let punit = self.geometry.punit_id(channel, chip);
        let mut cur = self.punit_lists[punit as usize].dirty;
        while let Some(idx) = cur {
            visitor(idx, &self.blocks[idx as usize]);
            cur = self.blocks[idx as usize].next;
        }
    }

    /// Iterates every block in (channel, chip, block) row-major order, the
    /// snapshot-file ordering (§6).
    pub fn iter_row_major(&self) -> impl Iterator<Item = &Block> {
        self.blocks.iter()
    }

    /// Rebuilds list membership from a freshly-loaded sequence of blocks, in
    /// the same row-major order `iter_row_major` yields. Used by snapshot
    /// restore (§4.7): the caller decodes raw records into `Block`s and
    /// hands them back here rather than this crate knowing the file format.
    #[must_use]
    pub fn rebuild(geometry: Geometry, blocks: Vec<Block>) -> Self {
        let nr_punits = geometry.nr_punits();
        let mut abm = Self {
            geometry,
            blocks,
            punit_lists: alloc::vec![ListHeads::default(); nr_punits as usize],
            nr_free_blocks: 0,
            nr_dirty_blocks: 0,
            nr_bad_blocks: 0,
        };
        let len = abm.blocks.len() as u32;
        for idx in 0..len {
            let (channel, chip, state) = {
                let b = &abm.blocks[idx as usize];
                (b.channel, b.chip, b.state)
            };
            let punit = abm.geometry.punit_id(channel, chip);
            match state {
                BlockState::Free => abm.nr_free_blocks += 1,
                BlockState::Dirty => abm.nr_dirty_blocks += 1,
                BlockState::Bad => abm.nr_bad_blocks += 1,
                BlockState::Active => {}
            }
            list::push_front(&mut abm.blocks, &mut abm.punit_lists[punit as usize], idx, state);
        }
        abm
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geom() -> Geometry {
        Geometry::new(2, 2, 4, 4, 4096, 128).unwrap()
    }

    #[test]
    fn create_links_all_blocks_free() {
        let abm = Abm::create(geom());
        assert_eq!(abm.nr_total_blocks(), 16);
        assert_eq!(abm.nr_free_blocks(), 16);
        assert_eq!(abm.nr_dirty_blocks(), 0);
    }

    #[test]
    fn prepare_commit_moves_free_to_active() {
        let mut abm = Abm::create(geom());
        let id = abm.get_free_block_prepare(0, 0).unwrap();
        abm.get_free_block_commit(id);
        assert_eq!(abm.block(id).state, BlockState::Active);
        assert_eq!(abm.nr_free_blocks(), 15);
        // The committed block must not be re-handed-out by prepare.
        let id2 = abm.get_free_block_prepare(0, 0).unwrap();
        assert_ne!(id, id2);
    }

    #[test]
    fn invalidate_on_free_block_errors() {
        let mut abm = Abm::create(geom());
        let id = abm.get_free_block_prepare(0, 0).unwrap();
        let b = abm.block(id);
        assert!(abm
            .invalidate_page(b.channel, b.chip, b.block, 0)
            .is_err());
    }

    #[test]
    fn erase_restores_free_state_and_counters() {
        let mut abm = Abm::create(geom());
        let id = abm.get_free_block_prepare(0, 0).unwrap();
        abm.get_free_block_commit(id);
        let (ch0, chip0, blk0) = (abm.block(id).channel, abm.block(id).chip, abm.block(id).block);
        abm.mark_page_valid(ch0, chip0, blk0, 0);
        abm.invalidate_page(ch0, chip0, blk0, 0).unwrap();
        abm.transition_active_to_dirty(id);
        assert_eq!(abm.nr_dirty_blocks(), 1);

        let (ch, chip, blk) = (abm.block(id).channel, abm.block(id).chip, abm.block(id).block);
        abm.erase_block(ch, chip, blk, false);
        assert_eq!(abm.block(id).state, BlockState::Free);
        assert_eq!(abm.block(id).nr_valid_pages, 0);
        assert_eq!(abm.block(id).nr_invalid_pages, 0);
        assert_eq!(abm.block(id).erase_count, 1);
        assert_eq!(abm.nr_dirty_blocks(), 0);
        assert_eq!(abm.nr_free_blocks(), 16);
    }

    #[test]
    fn erasing_an_already_free_block_does_not_inflate_free_count() {
        // The bad-block scan erases every block regardless of its starting
        // state; a block that starts FREE (already counted by `create`)
        // must not be counted a second time.
        let mut abm = Abm::create(geom());
        let id = abm.get_free_block_prepare(0, 0).unwrap();
        let (ch, chip, blk) = (abm.block(id).channel, abm.block(id).chip, abm.block(id).block);
        abm.erase_block(ch, chip, blk, false);
        assert_eq!(abm.nr_free_blocks(), 16);
    }

    #[test]
    fn failed_erase_marks_bad_and_excludes_from_total() {
        let mut abm = Abm::create(geom());
        let id = abm.get_free_block_prepare(0, 0).unwrap();
        abm.get_free_block_commit(id);
        let (ch, chip, blk) = (abm.block(id).channel, abm.block(id).chip, abm.block(id).block);
        abm.erase_block(ch, chip, blk, true);
        assert_eq!(abm.block(id).state, BlockState::Bad);
        assert_eq!(abm.nr_bad_blocks(), 1);
        assert_eq!(abm.nr_total_blocks(), 15);
    }

    #[test]
    fn dirty_list_visits_head_to_tail_and_skips_active() {
        let mut abm = Abm::create(geom());
        let a = abm.get_free_block_prepare(0, 0).unwrap();
        abm.get_free_block_commit(a);
        let b = abm.get_free_block_prepare(0, 0).unwrap();
        abm.get_free_block_commit(b);
        abm.transition_active_to_dirty(a);
        abm.transition_active_to_dirty(b);

        let mut seen = alloc::vec::Vec::new();
        abm.for_each_dirty_block(0, 0, |id, _| seen.push(id));
        assert_eq!(seen, alloc::vec![b, a]);
    }
}
