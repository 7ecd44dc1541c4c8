//! Flash Translation Layer core: page-level LPA→PPA mapping, active-block
//! management, round-robin allocation, greedy garbage collection, bad-block
//! scanning, and snapshot persistence behind one `Ftl<L>` facade (§1–§9).
//!
//! Geometry, block bookkeeping, the LLM contract, and the snapshot byte
//! codec live in their own `no_std` crates (`ftl-geometry`, `ftl-abm`,
//! `ftl-llm`, `ftl-snapshot`); this crate owns everything that needs a
//! filesystem or heap-backed host-facing state.

pub mod allocator;
pub mod config;
pub mod facade;
pub mod gc;
pub mod mapping;
pub mod scan;
pub mod snapshot;

pub use allocator::{Allocator, AllocatorError};
pub use config::{Config, ConfigError, GcPolicy, MappingPolicy, Snapshot, Trim};
pub use facade::{Ftl, FtlError};
pub use gc::GcError;
pub use mapping::{Lookup, MappingError, MappingTable};
pub use scan::ScanError;
pub use snapshot::SnapshotIoError;

pub use ftl_abm::{Abm, AbmError, Block, BlockId, BlockState, PageState};
pub use ftl_geometry::{Geometry, GeometryError, LogicalAddress, PhysicalAddress, INVALID_ADDR};
pub use ftl_llm::{DummyLlm, Llm, ReqType, Request, LPA_NONE};
pub use ftl_sync::{Countdown, FtlMutex};
