//! The `Ftl<L>` facade: the single entry point the host drives (§5), coarse
//! `ftl_lock` serialised and generic over its LLM collaborator the way the
//! reference address-space type is generic over its physical-memory mapper.

use crate::allocator::{Allocator, AllocatorError};
use crate::config::{Config, Trim};
use crate::gc::{self, is_gc_needed, GcError};
use crate::mapping::{Lookup, MappingError, MappingTable};
use crate::scan::{self, ScanError};
use crate::snapshot::{self, SnapshotIoError};
use ftl_abm::{Abm, AbmError};
use ftl_geometry::{GeometryError, LogicalAddress, PhysicalAddress};
use ftl_llm::{Llm, ReqType};
use ftl_sync::{Countdown, FtlMutex};
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum FtlError {
    #[error(transparent)]
    Geometry(#[from] GeometryError),
    #[error(transparent)]
    Abm(#[from] AbmError),
    #[error(transparent)]
    Mapping(#[from] MappingError),
    #[error(transparent)]
    Allocator(#[from] AllocatorError),
    #[error(transparent)]
    Gc(#[from] GcError),
    #[error(transparent)]
    Scan(#[from] ScanError),
    #[error(transparent)]
    Snapshot(#[from] SnapshotIoError),
    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),
}

struct State {
    abm: Abm,
    mapping: MappingTable,
    allocator: Allocator,
}

/// Page-level flash translation layer, generic over its LLM collaborator
/// `L` so no dynamic dispatch is needed between host requests and the
/// underlying channel driver.
pub struct Ftl<L: Llm> {
    config: Config,
    llm: L,
    state: FtlMutex<State>,
}

impl<L: Llm> Ftl<L> {
    /// Brings up a fresh FTL: validates `config`, builds an all-FREE ABM,
    /// and primes the allocator with one active block per punit.
    pub fn create(config: Config, llm: L) -> Result<Self, FtlError> {
        config.validate()?;
        let mut abm = Abm::create(config.geometry);
        let allocator = Allocator::init(&config.geometry, &mut abm)?;
        let mapping = MappingTable::new(&config.geometry);
        Ok(Self {
            config,
            llm,
            state: FtlMutex::new(State { abm, mapping, allocator }),
        })
    }

    /// Direct access to the LLM collaborator, for the (out-of-scope, §1)
    /// host front-end to dispatch the actual read/write/erase this facade
    /// never performs itself — this facade only ever drives `L` for GC and
    /// bad-block scanning.
    #[inline]
    #[must_use]
    pub fn llm(&self) -> &L {
        &self.llm
    }

    /// Shuts down, handing the LLM back to the caller. Does not persist
    /// anything; call [`Ftl::store`] first if that is wanted.
    pub fn destroy(self) -> L {
        self.llm
    }

    /// Allocates and returns the next free physical page (§4.4).
    pub fn get_free_ppa(&self) -> Result<PhysicalAddress, FtlError> {
        let mut s = self.state.lock();
        let State { abm, allocator, .. } = &mut *s;
        Ok(allocator.get_free_ppa(&self.config.geometry, abm)?)
    }

    /// Resolves a logical page to its current physical page, if mapped (§4.3).
    pub fn get_ppa(&self, lpa: LogicalAddress) -> Result<Lookup, FtlError> {
        let s = self.state.lock();
        Ok(s.mapping.lookup(lpa)?)
    }

    /// Records that `lpa` now lives at `ppa`, invalidating its previous
    /// location if one existed (§4.3). Completes a write batch: once the
    /// mapping is recorded, `is_gc_needed` is checked and, if the free-block
    /// fraction has dropped to the low-water mark, `do_gc` runs synchronously
    /// before this call returns (§4.5 invocation rule).
    pub fn map_lpa_to_ppa(&self, lpa: LogicalAddress, ppa: PhysicalAddress) -> Result<(), FtlError> {
        {
            let mut s = self.state.lock();
            let State { abm, mapping, .. } = &mut *s;
            mapping.map(abm, lpa, ppa)?;
        }
        if self.is_gc_needed() {
            self.do_gc()?;
        }
        Ok(())
    }

    /// Invalidates `[lpa, lpa+len)` (TRIM / overwrite, §4.3). A no-op
    /// returning success when `config.trim` is disabled.
    pub fn invalidate_lpa(&self, lpa: LogicalAddress, len: u64) -> Result<(), FtlError> {
        if self.config.trim == Trim::Disable {
            return Ok(());
        }
        let mut s = self.state.lock();
        let State { abm, mapping, .. } = &mut *s;
        Ok(mapping.invalidate_range(abm, lpa, len)?)
    }

    /// `true` once the free-block proportion drops below the low-water mark (§4.5).
    pub fn is_gc_needed(&self) -> bool {
        let s = self.state.lock();
        is_gc_needed(&s.abm)
    }

    /// Runs one garbage-collection pass. Returns `false` if no punit had a
    /// dirty block to collect (§4.5).
    ///
    /// Drives each of the four phases itself rather than delegating to
    /// [`gc::do_gc`] wholesale: `ftl_lock` is only held while touching
    /// `abm`/`allocator`/`mapping`, and is released before every
    /// `Countdown::wait()` so other callers can make progress while a batch
    /// is outstanding (§5).
    pub fn do_gc(&self) -> Result<bool, FtlError> {
        let geometry = self.config.geometry;

        let victims = {
            let s = self.state.lock();
            match gc::select_victims(&geometry, &s.abm) {
                Some(v) => v,
                None => return Ok(false),
            }
        };

        self.llm.flush();

        let mut reqs = {
            let s = self.state.lock();
            gc::build_read_requests(&geometry, &s.abm, &victims)
        };
        let nr_reads = reqs.iter().filter(|r| r.is_some()).count();
        let read_countdown = Countdown::new(nr_reads);
        for req in reqs.iter_mut().flatten() {
            self.llm.make_req(req, &read_countdown);
        }
        read_countdown.wait();

        let write_countdown_n = {
            let mut s = self.state.lock();
            let State { abm, allocator, mapping } = &mut *s;
            gc::apply_migrations(&geometry, abm, allocator, mapping, &mut reqs)?
        };
        let write_countdown = Countdown::new(write_countdown_n);
        for req in reqs.iter_mut().flatten() {
            if req.req_type == ReqType::GcWrite {
                self.llm.make_req(req, &write_countdown);
            }
        }
        write_countdown.wait();

        let mut erase_reqs = {
            let s = self.state.lock();
            gc::build_erase_requests(&geometry, &s.abm, &victims)
        };
        let erase_countdown = Countdown::new(victims.len());
        for req in &mut erase_reqs {
            self.llm.make_req(req, &erase_countdown);
        }
        erase_countdown.wait();

        {
            let mut s = self.state.lock();
            gc::apply_erase_results(&mut s.abm, &victims, &erase_reqs);
        }

        Ok(true)
    }

    /// Runs the bring-up bad-block scan, replacing the mapping table, ABM,
    /// and allocator with the freshly scanned state (§4.6).
    ///
    /// As with [`Ftl::do_gc`], each row's erase batch is submitted and
    /// waited on with `ftl_lock` released, re-acquiring it only to apply
    /// that row's results before moving to the next (§5).
    pub fn scan_badblocks(&self) -> Result<(), FtlError> {
        let geometry = self.config.geometry;

        {
            let mut s = self.state.lock();
            scan::reset_before_scan(&mut s.mapping, &self.llm);
        }

        for row in 0..geometry.nr_blocks_per_chip() {
            let mut reqs = scan::build_row_erase_requests(&geometry, row);
            let countdown = Countdown::new(reqs.len());
            for req in &mut reqs {
                self.llm.make_req(req, &countdown);
            }
            countdown.wait();

            let mut s = self.state.lock();
            scan::apply_row_erase_results(&geometry, &mut s.abm, row, &reqs);
        }

        let mut s = self.state.lock();
        let allocator = Allocator::init(&geometry, &mut s.abm)?;
        s.allocator = allocator;
        Ok(())
    }

    /// Persists the mapping table and ABM to disk (§4.7). `mapping_path` is
    /// caller-supplied; the ABM always goes to `config.abm_path`.
    pub fn store(&self, mapping_path: &Path) -> Result<(), FtlError> {
        let mut s = self.state.lock();
        let State { abm, mapping, allocator } = &mut *s;
        snapshot::store(&self.config.geometry, &self.config, abm, mapping, allocator, mapping_path)?;
        Ok(())
    }
}

impl<L: Llm> Ftl<L> {
    /// Restores a previously-stored FTL from disk instead of bringing up a
    /// fresh one (§4.7 load protocol).
    pub fn load(config: Config, llm: L, mapping_path: &Path) -> Result<Self, FtlError> {
        config.validate()?;
        let (abm, mapping, allocator) = snapshot::load(&config.geometry, &config, mapping_path)?;
        Ok(Self {
            config,
            llm,
            state: FtlMutex::new(State { abm, mapping, allocator }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use ftl_geometry::Geometry;
    use ftl_llm::DummyLlm;

    fn geom() -> Geometry {
        Geometry::new(1, 1, 4, 4, 64, 16).unwrap()
    }

    #[test]
    fn create_then_map_then_lookup() {
        let ftl = Ftl::create(Config::new(geom()), DummyLlm::new()).unwrap();
        let ppa = ftl.get_free_ppa().unwrap();
        ftl.map_lpa_to_ppa(LogicalAddress::new(7), ppa).unwrap();
        match ftl.get_ppa(LogicalAddress::new(7)).unwrap() {
            Lookup::Mapped(p) => assert_eq!(p, ppa),
            Lookup::NotMapped => panic!("expected mapped"),
        }
    }

    #[test]
    fn invalidate_then_lookup_is_not_mapped() {
        let ftl = Ftl::create(Config::new(geom()), DummyLlm::new()).unwrap();
        let ppa = ftl.get_free_ppa().unwrap();
        ftl.map_lpa_to_ppa(LogicalAddress::new(3), ppa).unwrap();
        ftl.invalidate_lpa(LogicalAddress::new(3), 1).unwrap();
        assert!(matches!(ftl.get_ppa(LogicalAddress::new(3)).unwrap(), Lookup::NotMapped));
    }

    #[test]
    fn invalidate_lpa_is_a_no_op_when_trim_disabled() {
        let mut config = Config::new(geom());
        config.trim = crate::config::Trim::Disable;
        let ftl = Ftl::create(config, DummyLlm::new()).unwrap();
        let ppa = ftl.get_free_ppa().unwrap();
        ftl.map_lpa_to_ppa(LogicalAddress::new(3), ppa).unwrap();
        ftl.invalidate_lpa(LogicalAddress::new(3), 1).unwrap();
        match ftl.get_ppa(LogicalAddress::new(3)).unwrap() {
            Lookup::Mapped(p) => assert_eq!(p, ppa),
            Lookup::NotMapped => panic!("trim disabled, mapping must survive invalidate_lpa"),
        }
    }
}
