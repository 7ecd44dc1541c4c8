//! The dense LPA -> PPA mapping table (§4.3).

use ftl_abm::Abm;
use ftl_geometry::{Geometry, LogicalAddress, PhysicalAddress};
use ftl_snapshot::{MappingRecord, MappingStatus as WireStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    NotAllocated,
    Valid,
    Invalid,
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    status: Status,
    ppa: PhysicalAddress,
}

impl Default for Entry {
    fn default() -> Self {
        Self {
            status: Status::NotAllocated,
            ppa: PhysicalAddress::invalid(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum MappingError {
    #[error("lpa {lpa} out of range (nr_pages_per_ssd={bound})")]
    OutOfRange { lpa: u64, bound: u64 },
}

/// Result of [`MappingTable::lookup`] — see design note on `get_ppa` (§9):
/// the caller must consult this enum, never overload the zero PPA.
#[derive(Debug, Clone, Copy)]
pub enum Lookup {
    Mapped(PhysicalAddress),
    NotMapped,
}

pub struct MappingTable {
    entries: Vec<Entry>,
}

impl MappingTable {
    #[must_use]
    pub fn new(geometry: &Geometry) -> Self {
        Self {
            entries: vec![Entry::default(); geometry.nr_pages_per_ssd() as usize],
        }
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn check(&self, lpa: u64) -> Result<(), MappingError> {
        if lpa >= self.entries.len() as u64 {
            return Err(MappingError::OutOfRange {
                lpa,
                bound: self.entries.len() as u64,
            });
        }
        Ok(())
    }

    /// Maps `lpa -> ppa`. If `lpa` was previously VALID, the old PPA is
    /// invalidated in `abm` first; the new PPA's page is then marked VALID.
    pub fn map(&mut self, abm: &mut Abm, lpa: LogicalAddress, ppa: PhysicalAddress) -> Result<(), MappingError> {
        self.check(lpa.as_u64())?;
        let idx = lpa.as_u64() as usize;
        if self.entries[idx].status == Status::Valid {
            let old = self.entries[idx].ppa;
            abm.invalidate_page(old.channel, old.chip, old.block, old.page)
                .expect("a VALID mapping entry must reference a non-free block");
        }
        abm.mark_page_valid(ppa.channel, ppa.chip, ppa.block, ppa.page);
        self.entries[idx] = Entry {
            status: Status::Valid,
            ppa,
        };
        Ok(())
    }

    pub fn lookup(&self, lpa: LogicalAddress) -> Result<Lookup, MappingError> {
        self.check(lpa.as_u64())?;
        let e = self.entries[lpa.as_u64() as usize];
        Ok(match e.status {
            Status::Valid => Lookup::Mapped(e.ppa),
            Status::NotAllocated | Status::Invalid => Lookup::NotMapped,
        })
    }

    /// Invalidates `[lpa, lpa+len)`. Non-VALID entries in the range are a
    /// silent no-op (P8: idempotent).
    pub fn invalidate_range(&mut self, abm: &mut Abm, lpa: LogicalAddress, len: u64) -> Result<(), MappingError> {
        let start = lpa.as_u64();
        let end = start
            .checked_add(len)
            .ok_or(MappingError::OutOfRange { lpa: start, bound: self.entries.len() as u64 })?;
        if end > self.entries.len() as u64 {
            return Err(MappingError::OutOfRange {
                lpa: end,
                bound: self.entries.len() as u64,
            });
        }
        for l in start..end {
            let idx = l as usize;
            if self.entries[idx].status == Status::Valid {
                let ppa = self.entries[idx].ppa;
                abm.invalidate_page(ppa.channel, ppa.chip, ppa.block, ppa.page)
                    .expect("a VALID mapping entry must reference a non-free block");
                self.entries[idx].status = Status::Invalid;
            }
        }
        Ok(())
    }

    /// Resets every entry to NOT_ALLOCATED with the sentinel PPA (bad-block scan step 1).
    pub fn reset_all(&mut self) {
        for e in &mut self.entries {
            *e = Entry::default();
        }
    }

    pub(crate) fn to_wire_records(&self) -> Vec<MappingRecord> {
        self.entries
            .iter()
            .map(|e| MappingRecord {
                status: match e.status {
                    Status::NotAllocated => WireStatus::NotAllocated,
                    Status::Valid => WireStatus::Valid,
                    Status::Invalid => WireStatus::Invalid,
                },
                ppa: e.ppa,
            })
            .collect()
    }

    pub(crate) fn from_wire_records(records: Vec<MappingRecord>) -> Self {
        let entries = records
            .into_iter()
            .map(|r| Entry {
                status: match r.status {
                    WireStatus::NotAllocated => Status::NotAllocated,
                    WireStatus::Valid => Status::Valid,
                    WireStatus::Invalid => Status::Invalid,
                },
                ppa: r.ppa,
            })
            .collect();
        Self { entries }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (Geometry, Abm, MappingTable) {
        let g = Geometry::new(1, 1, 2, 2, 4096, 128).unwrap();
        let abm = Abm::create(g);
        let table = MappingTable::new(&g);
        (g, abm, table)
    }

    #[test]
    fn lookup_before_map_is_not_mapped() {
        let (_, _, table) = setup();
        assert!(matches!(table.lookup(LogicalAddress::new(0)).unwrap(), Lookup::NotMapped));
    }

    #[test]
    fn last_write_wins() {
        let (_, mut abm, mut table) = setup();
        let id = abm.get_free_block_prepare(0, 0).unwrap();
        abm.get_free_block_commit(id);
        let p1 = PhysicalAddress::new(0, 0, abm.block(id).block, 0);
        let p2 = PhysicalAddress::new(0, 0, abm.block(id).block, 1);
        table.map(&mut abm, LogicalAddress::new(0), p1).unwrap();
        table.map(&mut abm, LogicalAddress::new(0), p2).unwrap();
        match table.lookup(LogicalAddress::new(0)).unwrap() {
            Lookup::Mapped(p) => assert_eq!(p, p2),
            Lookup::NotMapped => panic!("expected mapped"),
        }
        assert_eq!(abm.block(id).nr_invalid_pages, 1);
    }

    #[test]
    fn out_of_range_is_rejected() {
        let (_, _, table) = setup();
        assert!(table.lookup(LogicalAddress::new(4)).is_err());
    }

    #[test]
    fn invalidate_range_is_idempotent() {
        let (_, mut abm, mut table) = setup();
        let id = abm.get_free_block_prepare(0, 0).unwrap();
        abm.get_free_block_commit(id);
        let ppa = PhysicalAddress::new(0, 0, abm.block(id).block, 0);
        table.map(&mut abm, LogicalAddress::new(0), ppa).unwrap();
        table.invalidate_range(&mut abm, LogicalAddress::new(0), 1).unwrap();
        assert_eq!(abm.block(id).nr_invalid_pages, 1);
        table.invalidate_range(&mut abm, LogicalAddress::new(0), 1).unwrap();
        assert_eq!(abm.block(id).nr_invalid_pages, 1);
    }
}
