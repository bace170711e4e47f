//! The reclamation domain owned by each queue.
//!
//! A domain combines the list of hazard pointers through which threads protect
//! the nodes they are currently reading and the list of nodes that have been
//! unlinked but not yet freed.
//! Each queue owns its own domain, so hazards and retired nodes never outlive
//! the queue they belong to and no thread local state is required.

#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

use core::sync::atomic::{self, AtomicU32, Ordering};

use crate::config::Config;
use crate::guard::Guard;
use crate::hazard::{HazardList, ProtectedPtr};
use crate::node::Node;
use crate::retire::RetiredList;
use crate::sanitize;

////////////////////////////////////////////////////////////////////////////////////////////////////
// Domain
////////////////////////////////////////////////////////////////////////////////////////////////////

pub(crate) struct Domain<T> {
    hazards: HazardList,
    retired: RetiredList<T>,
    config: Config,
    /// The total number of retired nodes, counting towards the scan threshold.
    retire_count: AtomicU32,
    /// The number of retired nodes that have not yet been freed.
    pending: AtomicU32,
}

/********** impl inherent *************************************************************************/

impl<T> Domain<T> {
    #[inline]
    pub fn new(config: Config) -> Self {
        Self {
            hazards: HazardList::new(),
            retired: RetiredList::new(),
            config,
            retire_count: AtomicU32::new(0),
            pending: AtomicU32::new(0),
        }
    }

    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Acquires a hazard pointer and wraps it in a [`Guard`].
    #[inline]
    pub fn guard(&self) -> Guard<'_> {
        Guard::new(self.hazards.acquire_hazard())
    }

    /// Retires `node` and starts a scan if the scan threshold is reached.
    ///
    /// # Safety
    ///
    /// `node` must have been unlinked from the queue, so that no thread can
    /// acquire a new reference to it, and it must be retired exactly once.
    #[inline]
    pub unsafe fn retire(&self, node: *mut Node<T>) {
        // the pending count is raised first, so a concurrent scan reclaiming
        // the node can not let it underflow
        let pending = self.pending.fetch_add(1, Ordering::Relaxed) + 1;
        self.retired.retire(node);

        let count = self.retire_count.fetch_add(1, Ordering::Relaxed).wrapping_add(1);
        if count % self.config.scan_threshold() == 0
            && pending >= self.config.min_required_records()
        {
            self.reclaim();
        }
    }

    /// Frees all retired nodes that are not currently protected and returns
    /// their number.
    pub fn reclaim(&self) -> usize {
        if self.retired.is_empty() {
            return 0;
        }

        let taken = self.retired.take_all();

        let mut scan_cache = Vec::new();
        self.collect_protected(&mut scan_cache);
        scan_cache.sort_unstable();

        let scanned = unsafe { taken.reclaim_all_unprotected(&scan_cache) };
        self.pending.fetch_sub(scanned.reclaimed, Ordering::Relaxed);
        if let Some(unreclaimed) = scanned.unreclaimed {
            self.retired.push_back_unreclaimed(unreclaimed);
        }

        scanned.reclaimed as usize
    }

    /// Returns the number of retired nodes that have not been freed yet.
    #[inline]
    pub fn pending(&self) -> u32 {
        self.pending.load(Ordering::Relaxed)
    }

    #[inline]
    fn collect_protected(&self, scan_cache: &mut Vec<ProtectedPtr>) {
        // this fence orders the preceding swap of the retired nodes before
        // all subsequent loads of the hazard pointers
        atomic::fence(Ordering::SeqCst);

        for hazard in self.hazards.iter() {
            if let Some(protected) = hazard.protected(sanitize::RELAXED_LOAD) {
                scan_cache.push(protected);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::config::Config;
    use crate::node::{alloc_stats, Node};

    use super::Domain;

    #[test]
    fn reclaim_unprotected() {
        let before = alloc_stats::live_nodes();
        let domain: Domain<i32> = Domain::new(Config::with_params(0, 1024));

        let nodes: Vec<_> = (0..4).map(|i| Node::try_new(i).unwrap()).collect();
        let mut guard = domain.guard();
        guard.protect_ptr(nodes[2]);

        for &node in &nodes {
            unsafe { domain.retire(node) };
        }

        assert_eq!(domain.pending(), 4);
        assert_eq!(domain.reclaim(), 3);
        assert_eq!(domain.pending(), 1);
        assert_eq!(alloc_stats::live_nodes(), before + 1);

        drop(guard);
        assert_eq!(domain.reclaim(), 1);
        assert_eq!(domain.pending(), 0);
        assert_eq!(domain.reclaim(), 0);
        assert_eq!(alloc_stats::live_nodes(), before);
    }

    #[test]
    fn scan_skips_free_hazards() {
        let before = alloc_stats::live_nodes();
        let domain: Domain<i32> = Domain::new(Config::with_params(0, 1024));
        let node = Node::try_new(0).unwrap();

        // the first hazard in the list is freed again, the second one
        // protects the node and must still be found by the scan
        let first = domain.guard();
        let mut second = domain.guard();
        drop(first);
        second.protect_ptr(node);

        unsafe { domain.retire(node) };
        assert_eq!(domain.reclaim(), 0);
        assert_eq!(domain.pending(), 1);

        drop(second);
        assert_eq!(domain.reclaim(), 1);
        assert_eq!(alloc_stats::live_nodes(), before);
    }

    #[test]
    fn scan_threshold() {
        let before = alloc_stats::live_nodes();
        let domain: Domain<i32> = Domain::new(Config::with_params(0, 2));

        unsafe { domain.retire(Node::try_new(0).unwrap()) };
        assert_eq!(domain.pending(), 1);

        // the second retirement reaches the threshold and triggers a scan
        unsafe { domain.retire(Node::try_new(1).unwrap()) };
        assert_eq!(domain.pending(), 0);
        assert_eq!(alloc_stats::live_nodes(), before);
    }

    #[test]
    fn min_required_records() {
        let domain: Domain<i32> = Domain::new(Config::with_params(4, 1));
        for i in 0..3 {
            unsafe { domain.retire(Node::try_new(i).unwrap()) };
        }

        assert_eq!(domain.pending(), 3);
        unsafe { domain.retire(Node::try_new(3).unwrap()) };
        assert_eq!(domain.pending(), 0);
    }

    #[test]
    fn drop_frees_retired() {
        let before = alloc_stats::live_nodes();
        {
            let domain: Domain<String> = Domain::new(Config::with_params(0, 1024));
            let _guard = domain.guard();
            unsafe { domain.retire(Node::try_new(String::from("task")).unwrap()) };
        }

        assert_eq!(alloc_stats::live_nodes(), before);
    }
}
