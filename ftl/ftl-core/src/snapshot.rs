//! `std::fs` glue connecting the pure byte codec in `ftl-snapshot` to actual
//! files on disk (§4.7). The codec crate knows nothing of paths; this
//! module is the binary-I/O half of the split the reference driver makes
//! between its bundle-format codec and the tool that writes bundle files.

use crate::allocator::Allocator;
use crate::config::{Config, Snapshot};
use crate::mapping::MappingTable;
use ftl_abm::Abm;
use ftl_geometry::Geometry;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum SnapshotIoError {
    #[error("snapshot i/o error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Codec(#[from] ftl_snapshot::SnapshotError),
    #[error(transparent)]
    Allocator(#[from] crate::allocator::AllocatorError),
}

/// Persists the mapping table and the ABM to `mapping_path` and
/// `config.abm_path`. A no-op if snapshots are disabled (§4.7 DISABLE note).
///
/// Before encoding, every active block's not-yet-written pages are
/// force-invalidated so reload sees them as DIRTY rather than as phantom
/// free space in an ACTIVE block it has no allocator cursor for.
pub fn store(
    geometry: &Geometry,
    config: &Config,
    abm: &mut Abm,
    mapping: &MappingTable,
    allocator: &Allocator,
    mapping_path: &Path,
) -> Result<(), SnapshotIoError> {
    if config.snapshot == Snapshot::Disable {
        return Ok(());
    }

    allocator.simulate_wrap_invalidate(geometry, abm);

    let mapping_bytes = ftl_snapshot::encode_mapping_records(&mapping.to_wire_records());
    write_file(mapping_path, &mapping_bytes)?;

    let abm_bytes = ftl_snapshot::encode_abm_records(abm.iter_row_major(), geometry.nr_pages_per_block());
    write_file(Path::new(&config.abm_path), &abm_bytes)?;

    Ok(())
}

/// Restores the mapping table and ABM from disk and re-primes the
/// allocator from the reloaded block states. A no-op returning fresh,
/// empty state if snapshots are disabled.
pub fn load(
    geometry: &Geometry,
    config: &Config,
    mapping_path: &Path,
) -> Result<(Abm, MappingTable, Allocator), SnapshotIoError> {
    if config.snapshot == Snapshot::Disable {
        let mut abm = Abm::create(*geometry);
        let allocator = Allocator::init(geometry, &mut abm)?;
        let mapping = MappingTable::new(geometry);
        return Ok((abm, mapping, allocator));
    }

    let abm_bytes = read_file(Path::new(&config.abm_path))?;
    let blocks = ftl_snapshot::decode_abm_records(
        &abm_bytes,
        geometry.nr_channels(),
        geometry.nr_chips_per_channel(),
        geometry.nr_blocks_per_chip(),
        geometry.nr_pages_per_block(),
    )?;
    let mut abm = Abm::rebuild(*geometry, blocks);

    let mapping_bytes = read_file(mapping_path)?;
    let records = ftl_snapshot::decode_mapping_records(&mapping_bytes)?;
    let mapping = MappingTable::from_wire_records(records);

    let allocator = Allocator::rebuild(geometry, &mut abm)?;

    Ok((abm, mapping, allocator))
}

/// Writes `bytes` to `path`, then `fsync`s and closes the file before
/// returning, matching the "write entry by entry, fsync, close" store
/// protocol (§4.7).
fn write_file(path: &Path, bytes: &[u8]) -> Result<(), SnapshotIoError> {
    let io_err = |source: std::io::Error| SnapshotIoError::Io {
        path: path.display().to_string(),
        source,
    };
    let mut file = File::create(path).map_err(io_err)?;
    file.write_all(bytes).map_err(io_err)?;
    file.sync_all().map_err(io_err)?;
    Ok(())
}

fn read_file(path: &Path) -> Result<Vec<u8>, SnapshotIoError> {
    fs::read(path).map_err(|source| SnapshotIoError::Io {
        path: path.display().to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ftl_geometry::LogicalAddress;

    #[test]
    fn store_then_load_round_trips_a_mapping() {
        let dir = tempfile_dir();
        let mapping_path = dir.join("mapping.bin");
        let abm_path = dir.join("abm.bin");

        let g = Geometry::new(1, 1, 3, 4, 64, 16).unwrap();
        let mut config = Config::new(g);
        config.abm_path = abm_path.to_string_lossy().into_owned();

        let mut abm = Abm::create(g);
        let mut allocator = Allocator::init(&g, &mut abm).unwrap();
        let mut mapping = MappingTable::new(&g);

        let ppa = allocator.get_free_ppa(&g, &mut abm).unwrap();
        mapping.map(&mut abm, LogicalAddress::new(0), ppa).unwrap();

        store(&g, &config, &mut abm, &mapping, &allocator, &mapping_path).unwrap();

        let (abm2, mapping2, _allocator2) = load(&g, &config, &mapping_path).unwrap();
        match mapping2.lookup(LogicalAddress::new(0)).unwrap() {
            crate::mapping::Lookup::Mapped(p) => assert_eq!(p, ppa),
            crate::mapping::Lookup::NotMapped => panic!("mapping lost across store/load"),
        }
        assert_eq!(abm2.nr_total_blocks(), abm.nr_total_blocks());

        std::fs::remove_dir_all(dir).ok();
    }

    fn tempfile_dir() -> std::path::PathBuf {
        let mut dir = std::env::temp_dir();
        dir.push(format!("ftl-core-snapshot-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }
}
