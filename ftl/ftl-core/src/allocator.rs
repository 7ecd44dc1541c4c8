//! Round-robin free-page allocator (§4.4).

use ftl_abm::{Abm, BlockId};
use ftl_geometry::{Geometry, PhysicalAddress};

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AllocatorError {
    #[error("no free block available to replace a full active block")]
    NoFreeBlock,
}

/// Tracks, per punit, the block currently receiving new writes, plus a
/// single cursor `(curr_puid, curr_page_ofs)` that round-robins across
/// punits one page at a time.
pub struct Allocator {
    /// One active [`BlockId`] per punit, index = punit id.
    ac_bab: Vec<BlockId>,
    curr_puid: u32,
    curr_page_ofs: u32,
}

impl Allocator {
    /// Primes every punit with an initial active block (prepare + commit,
    /// channel-outer/chip-inner order, matching the ABM's own block layout).
    pub fn init(geometry: &Geometry, abm: &mut Abm) -> Result<Self, AllocatorError> {
        let nr_punits = geometry.nr_punits();
        let mut ac_bab = Vec::with_capacity(nr_punits as usize);
        for channel in 0..geometry.nr_channels() {
            for chip in 0..geometry.nr_chips_per_channel() {
                let id = abm
                    .get_free_block_prepare(channel, chip)
                    .map_err(|_| AllocatorError::NoFreeBlock)?;
                abm.get_free_block_commit(id);
                ac_bab.push(id);
            }
        }
        // ac_bab above is populated in (channel, chip) nested order, which
        // matches punit_id = chip * nr_channels + channel only once reindexed.
        let mut by_punit = vec![0u32; nr_punits as usize];
        let mut i = 0usize;
        for channel in 0..geometry.nr_channels() {
            for chip in 0..geometry.nr_chips_per_channel() {
                let punit = geometry.punit_id(channel, chip);
                by_punit[punit as usize] = ac_bab[i];
                i += 1;
            }
        }
        Ok(Self {
            ac_bab: by_punit,
            curr_puid: 0,
            curr_page_ofs: 0,
        })
    }

    /// Rebuilds allocator state after a snapshot `load` or a bad-block scan:
    /// the active block per punit is whatever block is currently ACTIVE on
    /// that punit's list, and the cursor restarts at the first free offset
    /// found on the lowest-numbered punit's active block.
    ///
    /// The store protocol's wrap-invalidation (§4.7) always leaves every
    /// active block's pages fully accounted for (valid + invalid ==
    /// `nr_pages_per_block`), so a freshly reloaded cursor always lands
    /// exactly on a full block; that block is rolled over immediately
    /// rather than handing out an out-of-range page on the next allocation.
    pub fn rebuild(geometry: &Geometry, abm: &mut Abm) -> Result<Self, AllocatorError> {
        let nr_punits = geometry.nr_punits();
        let mut ac_bab = vec![0u32; nr_punits as usize];
        let mut min_free_ofs = geometry.nr_pages_per_block();
        for channel in 0..geometry.nr_channels() {
            for chip in 0..geometry.nr_chips_per_channel() {
                let punit = geometry.punit_id(channel, chip);
                let id = find_active_block(abm, channel, chip).ok_or(AllocatorError::NoFreeBlock)?;
                ac_bab[punit as usize] = id;
                let used = abm.block(id).nr_valid_pages + abm.block(id).nr_invalid_pages;
                min_free_ofs = min_free_ofs.min(used);
            }
        }
        let mut allocator = Self {
            ac_bab,
            curr_puid: 0,
            curr_page_ofs: min_free_ofs,
        };
        if allocator.curr_page_ofs >= geometry.nr_pages_per_block() {
            allocator.roll_over(geometry, abm)?;
        }
        Ok(allocator)
    }

    #[inline]
    #[must_use]
    pub fn active_block(&self, punit: u32) -> BlockId {
        self.ac_bab[punit as usize]
    }

    #[inline]
    #[must_use]
    pub fn active_blocks(&self) -> &[BlockId] {
        &self.ac_bab
    }

    #[inline]
    #[must_use]
    pub fn cursor(&self) -> (u32, u32) {
        (self.curr_puid, self.curr_page_ofs)
    }

    /// Hands out the next free physical page, advancing the round-robin
    /// cursor across punits and rolling every active block over to DIRTY
    /// once the cursor wraps past the last page of the current row.
    pub fn get_free_ppa(&mut self, geometry: &Geometry, abm: &mut Abm) -> Result<PhysicalAddress, AllocatorError> {
        let (channel, chip) = geometry.punit_coords(self.curr_puid);
        let id = self.ac_bab[self.curr_puid as usize];
        let block = abm.block(id);
        let ppa = PhysicalAddress::new(channel, chip, block.block, self.curr_page_ofs);

        self.curr_puid += 1;
        if self.curr_puid == geometry.nr_punits() {
            self.curr_puid = 0;
            self.curr_page_ofs += 1;
            if self.curr_page_ofs == geometry.nr_pages_per_block() {
                self.roll_over(geometry, abm)?;
            }
        }
        Ok(ppa)
    }

    /// Transitions every punit's active block to DIRTY and replaces it with
    /// a freshly committed FREE block, resetting the page offset to 0.
    fn roll_over(&mut self, geometry: &Geometry, abm: &mut Abm) -> Result<(), AllocatorError> {
        for channel in 0..geometry.nr_channels() {
            for chip in 0..geometry.nr_chips_per_channel() {
                let punit = geometry.punit_id(channel, chip);
                let old = self.ac_bab[punit as usize];
                abm.transition_active_to_dirty(old);
                let new_id = abm
                    .get_free_block_prepare(channel, chip)
                    .map_err(|_| AllocatorError::NoFreeBlock)?;
                abm.get_free_block_commit(new_id);
                self.ac_bab[punit as usize] = new_id;
            }
        }
        self.curr_page_ofs = 0;
        Ok(())
    }

    /// Simulates the cursor wrap the store protocol needs (§4.7): every page
    /// in every current active block that the cursor has not reached yet is
    /// force-invalidated, so on reload those blocks read back as DIRTY
    /// (partially written, GC-eligible) rather than as freshly-allocated
    /// ACTIVE blocks with phantom free pages.
    pub fn simulate_wrap_invalidate(&self, geometry: &Geometry, abm: &mut Abm) {
        for punit in 0..geometry.nr_punits() {
            let from_page = if punit < self.curr_puid {
                self.curr_page_ofs + 1
            } else {
                self.curr_page_ofs
            };
            if from_page >= geometry.nr_pages_per_block() {
                continue;
            }
            let id = self.ac_bab[punit as usize];
            let block = abm.block(id);
            let (channel, chip, blk) = (block.channel, block.chip, block.block);
            abm.force_invalidate_unwritten(channel, chip, blk, from_page);
        }
    }
}

fn find_active_block(abm: &Abm, channel: u32, chip: u32) -> Option<BlockId> {
    abm.iter_row_major()
        .position(|b| b.channel == channel && b.chip == chip && b.state == ftl_abm::BlockState::Active)
        .map(|idx| idx as BlockId)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geom() -> Geometry {
        Geometry::new(1, 2, 2, 4, 4096, 128).unwrap()
    }

    #[test]
    fn init_assigns_one_active_block_per_punit() {
        let g = geom();
        let mut abm = Abm::create(g);
        let alloc = Allocator::init(&g, &mut abm).unwrap();
        assert_eq!(alloc.active_blocks().len(), g.nr_punits() as usize);
        assert_eq!(alloc.cursor(), (0, 0));
    }

    #[test]
    fn get_free_ppa_round_robins_across_punits_then_pages() {
        let g = geom();
        let mut abm = Abm::create(g);
        let mut alloc = Allocator::init(&g, &mut abm).unwrap();

        let p0 = alloc.get_free_ppa(&g, &mut abm).unwrap();
        let p1 = alloc.get_free_ppa(&g, &mut abm).unwrap();
        assert_ne!(p0.punit_id(&g), p1.punit_id(&g));
        assert_eq!(p0.page, 0);
        assert_eq!(p1.page, 0);

        let p2 = alloc.get_free_ppa(&g, &mut abm).unwrap();
        assert_eq!(p2.punit_id(&g), p0.punit_id(&g));
        assert_eq!(p2.page, 1);
    }

    #[test]
    fn exhausting_a_row_rolls_active_blocks_to_dirty() {
        let g = geom();
        let mut abm = Abm::create(g);
        let mut alloc = Allocator::init(&g, &mut abm).unwrap();
        let before = alloc.active_blocks().to_vec();

        for _ in 0..(g.nr_punits() * g.nr_pages_per_block()) {
            alloc.get_free_ppa(&g, &mut abm).unwrap();
        }

        assert_eq!(alloc.cursor(), (0, 0));
        for id in before {
            assert_eq!(abm.block(id).state, ftl_abm::BlockState::Dirty);
        }
    }
}
