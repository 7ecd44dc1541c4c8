//! Bad-block bring-up scan (§4.6): erase every block once, demote the ones
//! that fail, and start from a clean mapping table and allocator.

use crate::allocator::Allocator;
use crate::mapping::MappingTable;
use ftl_abm::Abm;
use ftl_geometry::{Geometry, PhysicalAddress};
use ftl_llm::{Llm, ReqType, Request};
use ftl_sync::Countdown;

#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error(transparent)]
    Allocator(#[from] crate::allocator::AllocatorError),
}

/// Resets the mapping table and flushes the LLM ahead of the first row.
pub fn reset_before_scan<L: Llm>(mapping: &mut MappingTable, llm: &L) {
    mapping.reset_all();
    llm.flush();
}

/// Builds one `GC_ERASE` request per punit for block `row`.
pub fn build_row_erase_requests(geometry: &Geometry, row: u32) -> Vec<Request> {
    let mut reqs = Vec::with_capacity(geometry.nr_punits() as usize);
    for channel in 0..geometry.nr_channels() {
        for chip in 0..geometry.nr_chips_per_channel() {
            reqs.push(Request::new(
                ReqType::GcErase,
                PhysicalAddress::new(channel, chip, row, 0),
                geometry.page_main_size(),
                geometry.page_oob_size(),
            ));
        }
    }
    reqs
}

/// Applies one row's erase outcomes to the ABM, demoting failures to BAD.
pub fn apply_row_erase_results(geometry: &Geometry, abm: &mut Abm, row: u32, reqs: &[Request]) {
    let mut i = 0usize;
    for channel in 0..geometry.nr_channels() {
        for chip in 0..geometry.nr_chips_per_channel() {
            let ok = reqs[i].is_ok();
            abm.erase_block(channel, chip, row, !ok);
            i += 1;
        }
    }
}

/// Runs the bring-up bad-block scan: resets the mapping table, erases every
/// block in the array row by row (one `GC_ERASE` per punit per row, all
/// punits in parallel), demotes any block whose erase failed to BAD, and
/// re-primes the allocator from scratch.
///
/// This is a destructive, whole-array operation — it is meant to run once
/// at first bring-up, never against a device already holding live data.
///
/// This is the direct, single-call form used by this core's own tests and
/// any embedder already holding exclusive access to `abm`/`mapping` for the
/// whole scan. The facade instead drives each row itself, releasing
/// `ftl_lock` around every row's `Countdown::wait()` (§5).
pub fn scan_badblocks<L: Llm>(
    geometry: &Geometry,
    abm: &mut Abm,
    mapping: &mut MappingTable,
    llm: &L,
) -> Result<Allocator, ScanError> {
    reset_before_scan(mapping, llm);

    for row in 0..geometry.nr_blocks_per_chip() {
        let mut reqs = build_row_erase_requests(geometry, row);
        let countdown = Countdown::new(reqs.len());
        for req in &mut reqs {
            llm.make_req(req, &countdown);
        }
        countdown.wait();
        apply_row_erase_results(geometry, abm, row, &reqs);
    }

    Allocator::init(geometry, abm).map_err(ScanError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ftl_llm::DummyLlm;

    #[test]
    fn scan_erases_every_block_and_reprimes_allocator() {
        let g = Geometry::new(2, 2, 3, 4, 64, 16).unwrap();
        let mut abm = Abm::create(g);
        let mut mapping = MappingTable::new(&g);
        let llm = DummyLlm::new();

        let allocator = scan_badblocks(&g, &mut abm, &mut mapping, &llm).unwrap();

        assert_eq!(abm.nr_bad_blocks(), 0);
        assert_eq!(abm.nr_free_blocks(), abm.nr_total_blocks() - g.nr_punits());
        assert_eq!(allocator.active_blocks().len(), g.nr_punits() as usize);
    }
}
