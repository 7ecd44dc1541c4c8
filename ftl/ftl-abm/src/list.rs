use crate::block::{Block, BlockState};

/// The four per-(channel,chip) list heads, one per [`BlockState`] (I1).
///
/// A block is a member of at most one of these at a time; membership is
/// kept consistent with `Block::state` by every mutating operation in
/// [`crate::Abm`].
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct ListHeads {
    pub free: Option<u32>,
    pub active: Option<u32>,
    pub dirty: Option<u32>,
    pub bad: Option<u32>,
}

impl ListHeads {
    fn head_mut(&mut self, state: BlockState) -> &mut Option<u32> {
        match state {
            BlockState::Free => &mut self.free,
            BlockState::Active => &mut self.active,
            BlockState::Dirty => &mut self.dirty,
            BlockState::Bad => &mut self.bad,
        }
    }

    pub fn head(&self, state: BlockState) -> Option<u32> {
        match state {
            BlockState::Free => self.free,
            BlockState::Active => self.active,
            BlockState::Dirty => self.dirty,
            BlockState::Bad => self.bad,
        }
    }
}

/// Unlinks `idx` from whichever list `state` names and pushes it onto the
/// front of that same list under `new_state`, updating `blocks[idx].state`.
pub(crate) fn move_block(
    blocks: &mut [Block],
    heads: &mut ListHeads,
    idx: u32,
    new_state: BlockState,
) {
    remove(blocks, heads, idx);
    push_front(blocks, heads, idx, new_state);
}

pub(crate) fn remove(blocks: &mut [Block], heads: &mut ListHeads, idx: u32) {
    let state = blocks[idx as usize].state;
    let prev = blocks[idx as usize].prev;
    let next = blocks[idx as usize].next;
    match prev {
        Some(p) => blocks[p as usize].next = next,
        None => *heads.head_mut(state) = next,
    }
    if let Some(n) = next {
        blocks[n as usize].prev = prev;
    }
    blocks[idx as usize].prev = None;
    blocks[idx as usize].next = None;
}

pub(crate) fn push_front(
    blocks: &mut [Block],
    heads: &mut ListHeads,
    idx: u32,
    state: BlockState,
) {
    let old_head = heads.head(state);
    blocks[idx as usize].prev = None;
    blocks[idx as usize].next = old_head;
    if let Some(h) = old_head {
        blocks[h as usize].prev = Some(idx);
    }
    *heads.head_mut(state) = Some(idx);
    blocks[idx as usize].state = state;
}
