#[cfg(feature = "loom")]
mod imp {
    use loom::cell::UnsafeCell;
    pub(crate) use loom::sync::atomic::{AtomicBool, AtomicU32, Ordering};

    /// An `UnsafeCell` that is `Sync` for `T: Send`.
    ///
    /// The firing protocol guarantees exclusive access: a slot is written by
    /// exactly one predecessor firing and read by exactly one successor
    /// firing, ordered by the arrival counter and the firing latch.
    pub(crate) struct SyncUnsafeCell<T>(UnsafeCell<T>);

    // SAFETY: cross-thread access is serialized by the counter+latch
    // protocol; see `runtime`.
    unsafe impl<T: Send> Sync for SyncUnsafeCell<T> {}

    impl<T> SyncUnsafeCell<T> {
        pub(crate) fn new(val: T) -> Self {
            Self(UnsafeCell::new(val))
        }

        /// # Safety
        /// The caller must hold exclusive logical access to the cell.
        pub(crate) unsafe fn with_mut<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
            // SAFETY: exclusivity is the caller's obligation.
            self.0.with_mut(|ptr| f(unsafe { &mut *ptr }))
        }
    }
}

#[cfg(not(feature = "loom"))]
mod imp {
    use core::cell::UnsafeCell;
    pub(crate) use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

    /// An `UnsafeCell` that is `Sync` for `T: Send`.
    ///
    /// The firing protocol guarantees exclusive access: a slot is written by
    /// exactly one predecessor firing and read by exactly one successor
    /// firing, ordered by the arrival counter and the firing latch.
    pub(crate) struct SyncUnsafeCell<T>(UnsafeCell<T>);

    // SAFETY: cross-thread access is serialized by the counter+latch
    // protocol; see `runtime`.
    unsafe impl<T: Send> Sync for SyncUnsafeCell<T> {}

    impl<T> SyncUnsafeCell<T> {
        pub(crate) fn new(val: T) -> Self {
            Self(UnsafeCell::new(val))
        }

        /// # Safety
        /// The caller must hold exclusive logical access to the cell.
        pub(crate) unsafe fn with_mut<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
            // SAFETY: exclusivity is the caller's obligation.
            f(unsafe { &mut *self.0.get() })
        }
    }
}

pub(crate) use imp::*;

impl<T> core::fmt::Debug for SyncUnsafeCell<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("SyncUnsafeCell(..)")
    }
}
