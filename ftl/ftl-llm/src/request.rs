use alloc::vec;
use alloc::vec::Vec;
use ftl_geometry::PhysicalAddress;

/// Sentinel `lpa` value meaning "not applicable", mirroring the `-1ULL`
/// convention of the reference driver this trait is modelled on.
pub const LPA_NONE: u64 = u64::MAX;

/// The kind of operation a [`Request`] asks the LLM to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReqType {
    HostRead,
    HostWrite,
    GcRead,
    GcWrite,
    GcErase,
    Trim,
}

impl ReqType {
    #[inline]
    #[must_use]
    pub const fn is_write(self) -> bool {
        matches!(self, Self::HostWrite | Self::GcWrite)
    }

    #[inline]
    #[must_use]
    pub const fn is_read(self) -> bool {
        matches!(self, Self::HostRead | Self::GcRead)
    }
}

/// One request descriptor dispatched to the LLM (§6).
///
/// `data`/`oob` are sized from `Geometry::page_main_size`/`page_oob_size` at
/// construction. The first 8 bytes of `oob` carry the page's LPA in
/// little-endian, the "well-known offset" phase B reads to learn a migrated
/// page's logical identity (§4.5).
#[derive(Debug, Clone)]
pub struct Request {
    pub req_type: ReqType,
    pub lpa: u64,
    pub phyaddr: PhysicalAddress,
    pub data: Vec<u8>,
    pub oob: Vec<u8>,
    /// 0 on success, non-zero on failure, set by the LLM on completion.
    pub ret: i32,
}

impl Request {
    #[must_use]
    pub fn new(
        req_type: ReqType,
        phyaddr: PhysicalAddress,
        page_main_size: u32,
        page_oob_size: u32,
    ) -> Self {
        Self {
            req_type,
            lpa: LPA_NONE,
            phyaddr,
            data: vec![0u8; page_main_size as usize],
            oob: vec![0u8; page_oob_size.max(8) as usize],
            ret: 0,
        }
    }

    #[inline]
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.ret == 0
    }

    /// Reads the LPA carried at the well-known OOB offset.
    #[must_use]
    pub fn oob_lpa(&self) -> u64 {
        u64::from_le_bytes(self.oob[0..8].try_into().expect("oob buffer >= 8 bytes"))
    }

    /// Writes `lpa` at the well-known OOB offset.
    pub fn set_oob_lpa(&mut self, lpa: u64) {
        self.oob[0..8].copy_from_slice(&lpa.to_le_bytes());
    }
}
