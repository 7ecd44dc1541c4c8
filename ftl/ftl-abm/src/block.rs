use alloc::vec;
use alloc::vec::Vec;

/// Lifecycle state of a physical block (§3, ABM invariant I1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockState {
    Free,
    Active,
    Dirty,
    Bad,
}

/// Per-page validity state within a block (`pst` in the data model).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageState {
    Free,
    Valid,
    Invalid,
}

/// A single physical block and its page-status table.
///
/// `prev`/`next` are intrusive list links within whichever per-(channel,chip)
/// list its current `state` corresponds to (design note §9: typed indices
/// rather than a reference-counted or raw-pointer list).
#[derive(Debug, Clone)]
pub struct Block {
    pub channel: u32,
    pub chip: u32,
    pub block: u32,
    pub state: BlockState,
    pub pst: Vec<PageState>,
    pub nr_valid_pages: u32,
    pub nr_invalid_pages: u32,
    pub erase_count: u64,
    pub(crate) prev: Option<u32>,
    pub(crate) next: Option<u32>,
}

impl Block {
    pub(crate) fn new_free(channel: u32, chip: u32, block: u32, nr_pages_per_block: u32) -> Self {
        Self {
            channel,
            chip,
            block,
            state: BlockState::Free,
            pst: vec![PageState::Free; nr_pages_per_block as usize],
            nr_valid_pages: 0,
            nr_invalid_pages: 0,
            erase_count: 0,
            prev: None,
            next: None,
        }
    }

    /// Builds a detached block not yet linked into any list, for snapshot
    /// restore (`ftl-snapshot` decodes records into these, then hands them
    /// to [`crate::Abm::rebuild`] to re-establish list membership).
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn from_parts(
        channel: u32,
        chip: u32,
        block: u32,
        state: BlockState,
        pst: Vec<PageState>,
        nr_valid_pages: u32,
        nr_invalid_pages: u32,
        erase_count: u64,
    ) -> Self {
        Self {
            channel,
            chip,
            block,
            state,
            pst,
            nr_valid_pages,
            nr_invalid_pages,
            erase_count,
            prev: None,
            next: None,
        }
    }

    /// `nr_free_pages`, derived per ABM invariant I2: `valid + invalid + free == P`.
    #[inline]
    #[must_use]
    pub fn nr_free_pages(&self) -> u32 {
        self.pst.len() as u32 - self.nr_valid_pages - self.nr_invalid_pages
    }
}
