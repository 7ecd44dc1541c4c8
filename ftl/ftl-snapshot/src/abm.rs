use crate::SnapshotError;
use alloc::vec::Vec;
use ftl_abm::{Block, BlockState, PageState};

const STATE_FREE: u32 = 0;
const STATE_ACTIVE: u32 = 1;
const STATE_DIRTY: u32 = 2;
const STATE_BAD: u32 = 3;

fn state_to_u32(s: BlockState) -> u32 {
    match s {
        BlockState::Free => STATE_FREE,
        BlockState::Active => STATE_ACTIVE,
        BlockState::Dirty => STATE_DIRTY,
        BlockState::Bad => STATE_BAD,
    }
}

fn state_from_u32(v: u32) -> Option<BlockState> {
    match v {
        STATE_FREE => Some(BlockState::Free),
        STATE_ACTIVE => Some(BlockState::Active),
        STATE_DIRTY => Some(BlockState::Dirty),
        STATE_BAD => Some(BlockState::Bad),
        _ => None,
    }
}

fn pst_to_byte(p: PageState) -> u8 {
    match p {
        PageState::Free => 0,
        PageState::Valid => 1,
        PageState::Invalid => 2,
    }
}

fn pst_from_byte(b: u8) -> Option<PageState> {
    match b {
        0 => Some(PageState::Free),
        1 => Some(PageState::Valid),
        2 => Some(PageState::Invalid),
        _ => None,
    }
}

/// Fixed header size of one ABM record: state(4) + erase_count(8) + nr_invalid(2) + nr_valid(2).
const ABM_RECORD_HEADER_SIZE: usize = 4 + 8 + 2 + 2;

/// Serialises blocks in the order `blocks` yields them — callers must pass
/// (channel, chip, block) row-major order to match the load side (§6).
#[must_use]
pub fn encode_abm_records<'a>(blocks: impl Iterator<Item = &'a Block>, nr_pages_per_block: u32) -> Vec<u8> {
    let mut out = Vec::new();
    for b in blocks {
        out.extend_from_slice(&state_to_u32(b.state).to_le_bytes());
        out.extend_from_slice(&b.erase_count.to_le_bytes());
        out.extend_from_slice(&(b.nr_invalid_pages as u16).to_le_bytes());
        out.extend_from_slice(&(b.nr_valid_pages as u16).to_le_bytes());
        debug_assert_eq!(b.pst.len() as u32, nr_pages_per_block);
        for p in &b.pst {
            out.push(pst_to_byte(*p));
        }
    }
    out
}

/// Deserialises blocks written by [`encode_abm_records`] back into fully
/// formed [`Block`] values in (channel, chip, block) row-major order, given
/// the geometry the file was written for.
pub fn decode_abm_records(
    buf: &[u8],
    nr_channels: u32,
    nr_chips_per_channel: u32,
    nr_blocks_per_chip: u32,
    nr_pages_per_block: u32,
) -> Result<Vec<Block>, SnapshotError> {
    let record_size = ABM_RECORD_HEADER_SIZE + nr_pages_per_block as usize;
    if buf.len() % record_size != 0 {
        return Err(SnapshotError::TruncatedFile);
    }
    let expected = nr_channels as usize * nr_chips_per_channel as usize * nr_blocks_per_chip as usize;
    if buf.len() / record_size != expected {
        return Err(SnapshotError::BlockCountMismatch {
            expected: expected as u32,
            actual: (buf.len() / record_size) as u32,
        });
    }

    let mut out = Vec::with_capacity(expected);
    let mut idx = 0usize;
    for channel in 0..nr_channels {
        for chip in 0..nr_chips_per_channel {
            for block in 0..nr_blocks_per_chip {
                let rec = &buf[idx * record_size..(idx + 1) * record_size];
                idx += 1;

                let raw_state = u32::from_le_bytes(rec[0..4].try_into().expect("4 bytes"));
                let state = match state_from_u32(raw_state) {
                    Some(s) => s,
                    None => {
                        log::warn!(
                            "abm record {channel}/{chip}/{block}: unknown state {raw_state}, coercing to FREE"
                        );
                        BlockState::Free
                    }
                };
                let erase_count = u64::from_le_bytes(rec[4..12].try_into().expect("8 bytes"));
                let nr_invalid_pages = u16::from_le_bytes(rec[12..14].try_into().expect("2 bytes")) as u32;
                let nr_valid_pages = u16::from_le_bytes(rec[14..16].try_into().expect("2 bytes")) as u32;

                let mut pst = Vec::with_capacity(nr_pages_per_block as usize);
                for (j, byte) in rec[ABM_RECORD_HEADER_SIZE..].iter().enumerate() {
                    pst.push(pst_from_byte(*byte).unwrap_or_else(|| {
                        log::warn!("abm record {channel}/{chip}/{block}: unknown pst[{j}] byte {byte}, coercing to FREE");
                        PageState::Free
                    }));
                }

                out.push(Block::from_parts(
                    channel,
                    chip,
                    block,
                    state,
                    pst,
                    nr_valid_pages,
                    nr_invalid_pages,
                    erase_count,
                ));
            }
        }
    }
    Ok(out)
}
