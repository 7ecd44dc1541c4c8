use crate::SnapshotError;
use alloc::vec::Vec;
use ftl_geometry::PhysicalAddress;

/// On-disk status byte for a mapping-table record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappingStatus {
    NotAllocated,
    Valid,
    Invalid,
}

impl MappingStatus {
    const fn to_byte(self) -> u8 {
        match self {
            Self::NotAllocated => 0,
            Self::Valid => 1,
            Self::Invalid => 2,
        }
    }

    fn from_byte(b: u8) -> Option<Self> {
        match b {
            0 => Some(Self::NotAllocated),
            1 => Some(Self::Valid),
            2 => Some(Self::Invalid),
            _ => None,
        }
    }
}

/// One LPA's worth of persisted mapping state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MappingRecord {
    pub status: MappingStatus,
    pub ppa: PhysicalAddress,
}

/// Byte size of one mapping record: 1 status byte + 4 little-endian u64 PPA fields.
pub const MAPPING_RECORD_SIZE: usize = 1 + 4 * 8;

/// Serialises mapping records as a tight concatenation, LPA order (§6).
#[must_use]
pub fn encode_mapping_records(records: &[MappingRecord]) -> Vec<u8> {
    let mut out = Vec::with_capacity(records.len() * MAPPING_RECORD_SIZE);
    for r in records {
        out.push(r.status.to_byte());
        out.extend_from_slice(&u64::from(r.ppa.channel).to_le_bytes());
        out.extend_from_slice(&u64::from(r.ppa.chip).to_le_bytes());
        out.extend_from_slice(&u64::from(r.ppa.block).to_le_bytes());
        out.extend_from_slice(&u64::from(r.ppa.page).to_le_bytes());
    }
    out
}

/// Deserialises mapping records written by [`encode_mapping_records`].
///
/// An unrecognised status byte is `SnapshotCorrupt` (§7): it is not a hard
/// error, it is logged at `warn` and the record is coerced to
/// `NOT_ALLOCATED` with the sentinel PPA.
pub fn decode_mapping_records(buf: &[u8]) -> Result<Vec<MappingRecord>, SnapshotError> {
    if buf.len() % MAPPING_RECORD_SIZE != 0 {
        return Err(SnapshotError::TruncatedFile);
    }
    let mut out = Vec::with_capacity(buf.len() / MAPPING_RECORD_SIZE);
    for (i, chunk) in buf.chunks_exact(MAPPING_RECORD_SIZE).enumerate() {
        let status = match MappingStatus::from_byte(chunk[0]) {
            Some(s) => s,
            None => {
                log::warn!("mapping record {i}: unknown status byte {}, coercing to NOT_ALLOCATED", chunk[0]);
                out.push(MappingRecord {
                    status: MappingStatus::NotAllocated,
                    ppa: PhysicalAddress::invalid(),
                });
                continue;
            }
        };
        let channel = read_u64_le(chunk, 1) as u32;
        let chip = read_u64_le(chunk, 9) as u32;
        let block = read_u64_le(chunk, 17) as u32;
        let page = read_u64_le(chunk, 25) as u32;
        out.push(MappingRecord {
            status,
            ppa: PhysicalAddress::new(channel, chip, block, page),
        });
    }
    Ok(out)
}

fn read_u64_le(buf: &[u8], off: usize) -> u64 {
    u64::from_le_bytes(buf[off..off + 8].try_into().expect("8 bytes"))
}
