//! NAND array geometry and the physical/logical address types derived from it.
#![cfg_attr(not(test), no_std)]

use core::fmt;

/// Sentinel field value used by an unmapped [`PhysicalAddress`].
///
/// Mirrors the `-1ULL`-as-sentinel convention used for unmapped mapping-table
/// entries: every field of an invalid address equals this marker.
pub const INVALID_ADDR: u32 = u32::MAX;

/// Errors constructing a [`Geometry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum GeometryError {
    /// One of the four array dimensions was zero.
    #[error("geometry dimension must be >= 1, got {field}=0")]
    ZeroDimension {
        /// Name of the offending field, for diagnostics.
        field: &'static str,
    },
}

/// Immutable description of a NAND array: channels × chips × blocks × pages.
///
/// Constructed once at FTL bring-up and shared by every other component for
/// index arithmetic. Nothing in this crate mutates a `Geometry` after
/// [`Geometry::new`] returns.
///
/// # Examples
///
/// ```
/// use ftl_geometry::Geometry;
///
/// let g = Geometry::new(2, 2, 4, 4, 4096, 128).unwrap();
/// assert_eq!(g.nr_punits(), 4);
/// assert_eq!(g.nr_pages_per_ssd(), 64);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    nr_channels: u32,
    nr_chips_per_channel: u32,
    nr_blocks_per_chip: u32,
    nr_pages_per_block: u32,
    page_main_size: u32,
    page_oob_size: u32,
}

impl Geometry {
    /// Builds a new geometry, rejecting any dimension equal to zero.
    pub fn new(
        nr_channels: u32,
        nr_chips_per_channel: u32,
        nr_blocks_per_chip: u32,
        nr_pages_per_block: u32,
        page_main_size: u32,
        page_oob_size: u32,
    ) -> Result<Self, GeometryError> {
        if nr_channels == 0 {
            return Err(GeometryError::ZeroDimension { field: "nr_channels" });
        }
        if nr_chips_per_channel == 0 {
            return Err(GeometryError::ZeroDimension {
                field: "nr_chips_per_channel",
            });
        }
        if nr_blocks_per_chip == 0 {
            return Err(GeometryError::ZeroDimension {
                field: "nr_blocks_per_chip",
            });
        }
        if nr_pages_per_block == 0 {
            return Err(GeometryError::ZeroDimension {
                field: "nr_pages_per_block",
            });
        }
        Ok(Self {
            nr_channels,
            nr_chips_per_channel,
            nr_blocks_per_chip,
            nr_pages_per_block,
            page_main_size,
            page_oob_size,
        })
    }

    #[inline]
    #[must_use]
    pub const fn nr_channels(&self) -> u32 {
        self.nr_channels
    }

    #[inline]
    #[must_use]
    pub const fn nr_chips_per_channel(&self) -> u32 {
        self.nr_chips_per_channel
    }

    #[inline]
    #[must_use]
    pub const fn nr_blocks_per_chip(&self) -> u32 {
        self.nr_blocks_per_chip
    }

    #[inline]
    #[must_use]
    pub const fn nr_pages_per_block(&self) -> u32 {
        self.nr_pages_per_block
    }

    #[inline]
    #[must_use]
    pub const fn page_main_size(&self) -> u32 {
        self.page_main_size
    }

    #[inline]
    #[must_use]
    pub const fn page_oob_size(&self) -> u32 {
        self.page_oob_size
    }

    /// Number of parallel units, `nr_channels * nr_chips_per_channel`.
    #[inline]
    #[must_use]
    pub const fn nr_punits(&self) -> u32 {
        self.nr_channels * self.nr_chips_per_channel
    }

    /// Total addressable logical page count.
    #[inline]
    #[must_use]
    pub const fn nr_pages_per_ssd(&self) -> u64 {
        self.nr_punits() as u64 * self.nr_blocks_per_chip as u64 * self.nr_pages_per_block as u64
    }

    /// Parallel-unit id for a `(channel, chip)` pair: `chip * nr_channels + channel`.
    ///
    /// The active-block array is flattened to this 1-D index rather than kept
    /// as a 2-D channel/chip array.
    #[inline]
    #[must_use]
    pub const fn punit_id(&self, channel: u32, chip: u32) -> u32 {
        chip * self.nr_channels + channel
    }

    /// Inverse of [`Geometry::punit_id`]: splits a punit id back into `(channel, chip)`.
    #[inline]
    #[must_use]
    pub const fn punit_coords(&self, punit_id: u32) -> (u32, u32) {
        (punit_id % self.nr_channels, punit_id / self.nr_channels)
    }
}

/// Physical NAND page coordinates: `(channel, chip, block, page)`.
///
/// An invalid/sentinel address has every field equal to [`INVALID_ADDR`]; use
/// [`PhysicalAddress::invalid`] / [`PhysicalAddress::is_invalid`] rather than
/// comparing fields by hand.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PhysicalAddress {
    pub channel: u32,
    pub chip: u32,
    pub block: u32,
    pub page: u32,
}

impl PhysicalAddress {
    #[inline]
    #[must_use]
    pub const fn new(channel: u32, chip: u32, block: u32, page: u32) -> Self {
        Self {
            channel,
            chip,
            block,
            page,
        }
    }

    /// The sentinel address stored in a `NOT_ALLOCATED` mapping entry.
    #[inline]
    #[must_use]
    pub const fn invalid() -> Self {
        Self {
            channel: INVALID_ADDR,
            chip: INVALID_ADDR,
            block: INVALID_ADDR,
            page: INVALID_ADDR,
        }
    }

    #[inline]
    #[must_use]
    pub const fn is_invalid(&self) -> bool {
        self.channel == INVALID_ADDR
            && self.chip == INVALID_ADDR
            && self.block == INVALID_ADDR
            && self.page == INVALID_ADDR
    }

    /// Parallel-unit id of this address under `geometry`.
    #[inline]
    #[must_use]
    pub const fn punit_id(&self, geometry: &Geometry) -> u32 {
        geometry.punit_id(self.channel, self.chip)
    }
}

impl fmt::Debug for PhysicalAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_invalid() {
            write!(f, "PPA(invalid)")
        } else {
            write!(
                f,
                "PPA(ch={}, chip={}, blk={}, pg={})",
                self.channel, self.chip, self.block, self.page
            )
        }
    }
}

impl fmt::Display for PhysicalAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Host-visible logical page index, in `[0, nr_pages_per_ssd)`.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LogicalAddress(pub u64);

impl LogicalAddress {
    #[inline]
    #[must_use]
    pub const fn new(lpa: u64) -> Self {
        Self(lpa)
    }

    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl From<u64> for LogicalAddress {
    #[inline]
    fn from(v: u64) -> Self {
        Self(v)
    }
}

impl fmt::Display for LogicalAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LPA({})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_zero_dimension() {
        assert!(matches!(
            Geometry::new(0, 2, 4, 4, 4096, 128),
            Err(GeometryError::ZeroDimension { field: "nr_channels" })
        ));
    }

    #[test]
    fn punit_id_round_trips() {
        let g = Geometry::new(2, 3, 4, 4, 4096, 128).unwrap();
        for chip in 0..3 {
            for channel in 0..2 {
                let u = g.punit_id(channel, chip);
                assert_eq!(g.punit_coords(u), (channel, chip));
            }
        }
    }

    #[test]
    fn sentinel_address_is_invalid() {
        let sentinel = PhysicalAddress::invalid();
        assert!(sentinel.is_invalid());
        assert!(!PhysicalAddress::new(0, 0, 0, 0).is_invalid());
    }
}
