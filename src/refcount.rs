//! Reference-Counted Object Model
//!
//! The ownership contract generated C++ code is written against
//! (`pycs::gc::PyObj`, `rc_new`, `RcHandle`), expressed in Rust.
//!
//! ## Layout
//! ```text
//! RcBox<T>
//! [ count: AtomicU32 ][ type_id: u32 ][ value: T ]
//! ```
//!
//! ## Rules
//! - Objects are created with count = 1.
//! - [`incref`] is a relaxed atomic add; null is a no-op.
//! - [`decref`] is an acquire-release atomic subtract. The caller that observes
//!   the pre-decrement count 1 runs [`ReleaseRefs::release_refs`] once and then
//!   frees the object once.
//! - [`RcHandle`] owns one count: clone increments, drop decrements, a move
//!   transfers it, and [`RcHandle::assign`] increments the new target before
//!   releasing the old one.
//!
//! ## Limitations
//! - The release hook cascades one level of ownership per object, which tears
//!   down trees and DAGs. Reference cycles are never freed.
//! - The counter is thread-safe; one handle instance mutated from several threads
//!   is not.

use std::ptr::{self, NonNull};
use std::sync::atomic::{AtomicU32, Ordering};

/// Hook run on the 1 -> 0 transition, before the object is freed.
///
/// Types holding other reference-counted objects release them here.
pub trait ReleaseRefs {
    fn release_refs(&mut self) {}
}

/// Heap cell holding a value, its reference count and a type tag.
pub struct RcBox<T> {
    count: AtomicU32,
    type_id: u32,
    value: T,
}

impl<T> RcBox<T> {
    pub fn count(&self) -> u32 {
        self.count.load(Ordering::Acquire)
    }

    pub fn type_id(&self) -> u32 {
        self.type_id
    }

    pub fn value(&self) -> &T {
        &self.value
    }
}

/// Allocates a new object with count 1.
pub fn rc_new<T: ReleaseRefs>(type_id: u32, value: T) -> NonNull<RcBox<T>> {
    let boxed = Box::new(RcBox {
        count: AtomicU32::new(1),
        type_id,
        value,
    });
    NonNull::from(Box::leak(boxed))
}

/// Adds one owner.
///
/// # Safety
/// `obj` must be null or point to a live object returned by [`rc_new`].
pub unsafe fn incref<T>(obj: *const RcBox<T>) {
    if obj.is_null() {
        return;
    }
    // SAFETY: non-null and live per the caller contract.
    (*obj).count.fetch_add(1, Ordering::Relaxed);
}

/// Drops one owner. Returns true when this call destroyed the object.
///
/// # Safety
/// `obj` must be null or point to a live object returned by [`rc_new`], and the
/// caller must own one of its counts. After a `true` return the pointer dangles.
pub unsafe fn decref<T: ReleaseRefs>(obj: *mut RcBox<T>) -> bool {
    if obj.is_null() {
        return false;
    }
    // SAFETY: non-null and live per the caller contract.
    let previous = (*obj).count.fetch_sub(1, Ordering::AcqRel);
    debug_assert!(previous > 0, "reference count underflow");
    if previous != 1 {
        return false;
    }
    // SAFETY: the count reached zero, so this caller is the only owner left and
    // the allocation came from `Box::leak` in `rc_new`.
    let mut boxed = Box::from_raw(obj);
    boxed.value.release_refs();
    drop(boxed);
    true
}

/// RAII owner of one count on an [`RcBox`].
pub struct RcHandle<T: ReleaseRefs> {
    ptr: Option<NonNull<RcBox<T>>>,
}

impl<T: ReleaseRefs> RcHandle<T> {
    /// Allocates `value` and adopts the fresh object.
    pub fn new(type_id: u32, value: T) -> Self {
        // SAFETY: a fresh object carries exactly the one count being adopted.
        unsafe { Self::adopt(rc_new(type_id, value)) }
    }

    /// Takes over one existing count without incrementing.
    ///
    /// # Safety
    /// `ptr` must come from [`rc_new`] and the caller must hand over one count
    /// it owns.
    pub unsafe fn adopt(ptr: NonNull<RcBox<T>>) -> Self {
        Self { ptr: Some(ptr) }
    }

    pub fn null() -> Self {
        Self { ptr: None }
    }

    pub fn is_null(&self) -> bool {
        self.ptr.is_none()
    }

    fn raw(&self) -> *mut RcBox<T> {
        self.ptr.map_or(ptr::null_mut(), NonNull::as_ptr)
    }

    fn cell(&self) -> Option<&RcBox<T>> {
        // SAFETY: a non-null handle owns a count, so the object is alive for
        // at least as long as `self`.
        self.ptr.map(|p| unsafe { p.as_ref() })
    }

    pub fn get(&self) -> Option<&T> {
        self.cell().map(RcBox::value)
    }

    /// Current count, 0 for a null handle.
    pub fn ref_count(&self) -> u32 {
        self.cell().map_or(0, RcBox::count)
    }

    pub fn type_id(&self) -> Option<u32> {
        self.cell().map(RcBox::type_id)
    }

    /// Points this handle at `other`'s object.
    ///
    /// The new target is incremented before the old one is released, so
    /// self-assignment and aliased handles never free a live object.
    pub fn assign(&mut self, other: &RcHandle<T>) {
        let old = self.raw();
        // SAFETY: `other` owns a count, so its object is alive.
        unsafe { incref(other.raw()) };
        self.ptr = other.ptr;
        // SAFETY: `old` was owned by this handle.
        unsafe { decref(old) };
    }

    /// Releases the owned count and leaves the handle null.
    pub fn reset(&mut self) {
        let old = self.raw();
        self.ptr = None;
        // SAFETY: `old` was owned by this handle.
        unsafe { decref(old) };
    }

    pub fn ptr_eq(&self, other: &RcHandle<T>) -> bool {
        self.ptr == other.ptr
    }
}

impl<T: ReleaseRefs> Clone for RcHandle<T> {
    fn clone(&self) -> Self {
        // SAFETY: `self` owns a count, so its object is alive.
        unsafe { incref(self.raw()) };
        Self { ptr: self.ptr }
    }
}

impl<T: ReleaseRefs> Drop for RcHandle<T> {
    fn drop(&mut self) {
        // SAFETY: this handle owns one count on its object.
        unsafe { decref(self.raw()) };
    }
}

impl<T: ReleaseRefs> Default for RcHandle<T> {
    fn default() -> Self {
        Self::null()
    }
}

impl<T: ReleaseRefs + std::fmt::Debug> std::fmt::Debug for RcHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.cell() {
            Some(cell) => f
                .debug_struct("RcHandle")
                .field("count", &cell.count())
                .field("type_id", &cell.type_id)
                .field("value", &cell.value)
                .finish(),
            None => f.write_str("RcHandle(null)"),
        }
    }
}

// SAFETY: the count is atomic and the value is only shared immutably, so
// handles can move between threads when `T` itself is thread-safe.
unsafe impl<T: ReleaseRefs + Send + Sync> Send for RcHandle<T> {}
unsafe impl<T: ReleaseRefs + Send + Sync> Sync for RcHandle<T> {}
