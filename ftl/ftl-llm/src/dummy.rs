use crate::request::{Request};
use alloc::collections::BTreeMap;
use alloc::vec::Vec;
use ftl_sync::{Countdown, FtlMutex};

type PhysKey = (u32, u32, u32, u32);

struct DummyState {
    /// Ground-truth backing store: physical coordinates -> (lpa, page bytes).
    store: BTreeMap<PhysKey, (u64, Vec<u8>)>,
    w_cnt: u64,
    w_cnt_done: u64,
}

/// An in-memory, synchronous [`Llm`](crate::Llm) implementation.
///
/// Modelled on a reference dummy block device: every write records the
/// written LPA and page bytes at the physical coordinates it targets; every
/// read plays back whatever was last written there, leaving the OOB area's
/// well-known LPA slot correctly populated. There is no actual queue —
/// `make_req` performs the operation and signals completion before
/// returning — which this core's tests rely on to assert synchronously
/// without a real scheduler.
pub struct DummyLlm {
    state: FtlMutex<DummyState>,
}

impl Default for DummyLlm {
    fn default() -> Self {
        Self::new()
    }
}

impl DummyLlm {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: FtlMutex::new(DummyState {
                store: BTreeMap::new(),
                w_cnt: 0,
                w_cnt_done: 0,
            }),
        }
    }

    /// Number of writes accepted so far, for diagnostics/tests.
    #[must_use]
    pub fn write_count(&self) -> u64 {
        self.state.lock().w_cnt
    }
}

impl crate::Llm for DummyLlm {
    fn make_req(&self, req: &mut Request, countdown: &Countdown) -> i32 {
        let key: PhysKey = (
            req.phyaddr.channel,
            req.phyaddr.chip,
            req.phyaddr.block,
            req.phyaddr.page,
        );
        let mut s = self.state.lock();

        if req.req_type.is_write() {
            s.store.insert(key, (req.lpa, req.data.clone()));
            s.w_cnt += 1;
            req.ret = 0;
        } else if req.req_type.is_read() {
            match s.store.get(&key) {
                Some((lpa, data)) => {
                    req.set_oob_lpa(*lpa);
                    req.data.copy_from_slice(data);
                    req.ret = 0;
                }
                None => {
                    req.set_oob_lpa(crate::request::LPA_NONE);
                    req.ret = 0;
                }
            }
        } else {
            // GC_ERASE / TRIM: drop every page physically belonging to this block.
            let block_key = key;
            s.store
                .retain(|k, _| !(k.0 == block_key.0 && k.1 == block_key.1 && k.2 == block_key.2));
            req.ret = 0;
        }
        s.w_cnt_done += 1;
        drop(s);
        countdown.signal();
        0
    }

    fn flush(&self) {
        log::trace!("dummy llm flush (no queue to drain)");
    }
}
