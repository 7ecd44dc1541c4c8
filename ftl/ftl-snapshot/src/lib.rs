//! Byte-layout codec for the two snapshot files (§4.7, §6).
//!
//! This crate only knows the record formats; it has no notion of a
//! filesystem. `ftl-core` reads/writes the actual bytes with `std::fs` and
//! calls into here to encode/decode them, the same split the reference
//! workspace uses between a `no_std` bundle-format codec and the `std`
//! binary that writes bundle files to disk.
#![cfg_attr(not(test), no_std)]

extern crate alloc;

mod abm;
mod mapping;

pub use abm::{decode_abm_records, encode_abm_records};
pub use mapping::{decode_mapping_records, encode_mapping_records, MappingRecord, MappingStatus, MAPPING_RECORD_SIZE};

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SnapshotError {
    /// File length is not a whole multiple of the record size.
    #[error("snapshot file length is not a multiple of the record size")]
    TruncatedFile,
    /// ABM file's block count does not match the geometry it was loaded against.
    #[error("abm snapshot has {actual} blocks, expected {expected}")]
    BlockCountMismatch { expected: u32, actual: u32 },
}

#[cfg(test)]
mod tests {
    use super::*;
    use ftl_geometry::PhysicalAddress;

    #[test]
    fn mapping_round_trip() {
        let records = alloc::vec![
            MappingRecord {
                status: MappingStatus::Valid,
                ppa: PhysicalAddress::new(1, 2, 3, 4),
            },
            MappingRecord {
                status: MappingStatus::NotAllocated,
                ppa: PhysicalAddress::invalid(),
            },
        ];
        let bytes = encode_mapping_records(&records);
        assert_eq!(bytes.len(), records.len() * MAPPING_RECORD_SIZE);
        let decoded = decode_mapping_records(&bytes).unwrap();
        assert_eq!(decoded, records);
    }

    #[test]
    fn mapping_truncated_file_is_rejected() {
        let bytes = alloc::vec![0u8; MAPPING_RECORD_SIZE - 1];
        assert_eq!(decode_mapping_records(&bytes), Err(SnapshotError::TruncatedFile));
    }

    #[test]
    fn unknown_status_byte_coerces_to_not_allocated() {
        let mut bytes = alloc::vec![0u8; MAPPING_RECORD_SIZE];
        bytes[0] = 0xAB;
        let decoded = decode_mapping_records(&bytes).unwrap();
        assert_eq!(decoded[0].status, MappingStatus::NotAllocated);
    }

    #[test]
    fn abm_round_trip() {
        use ftl_abm::{Abm, BlockState};
        use ftl_geometry::Geometry;

        let geometry = Geometry::new(2, 2, 4, 4, 4096, 128).unwrap();
        let mut abm = Abm::create(geometry);
        let id = abm.get_free_block_prepare(0, 0).unwrap();
        abm.get_free_block_commit(id);

        let bytes = encode_abm_records(abm.iter_row_major(), geometry.nr_pages_per_block());
        let decoded = decode_abm_records(
            &bytes,
            geometry.nr_channels(),
            geometry.nr_chips_per_channel(),
            geometry.nr_blocks_per_chip(),
            geometry.nr_pages_per_block(),
        )
        .unwrap();
        assert_eq!(decoded.len(), 16);
        assert_eq!(decoded[id as usize].state, BlockState::Active);
    }
}
