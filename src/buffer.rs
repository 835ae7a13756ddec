//! Foreign-heap buffer ownership.
//!
//! Binary payloads cross the host boundary in two shapes:
//!
//! - [`BorrowedBuffer`]: input bytes (a compressed bitstream or raw pixels)
//!   that the host lends for the duration of one call. The bridge never frees
//!   or retains them.
//! - [`OwnedBuffer`]: a fresh region on the host-visible [`ForeignHeap`] that
//!   the call hands to the caller. It is released exactly once, either by
//!   dropping it / calling [`OwnedBuffer::release`], or by the host after
//!   [`OwnedBuffer::into_raw`] has given up Rust-side ownership.
//!
//! Output is staged in a [`PendingAllocation`], which releases its region on
//! drop unless committed, so an error exit after a partial allocation cannot
//! leak.

use std::alloc::{self, Layout};
use std::fmt;
use std::ops::Deref;
use std::ptr::NonNull;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::BridgeError;

/// Allocator for the memory region the host reads results out of.
///
/// # Safety
///
/// A pointer returned by `allocate(len)` must be valid for reads and writes of
/// `len` bytes and must stay valid until it is passed to `deallocate` with the
/// same `len`. Distinct live allocations must not overlap.
pub unsafe trait ForeignHeap: Send + Sync {
    /// Allocate `len` bytes (`len > 0`). Returns `None` when exhausted.
    fn allocate(&self, len: usize) -> Option<NonNull<u8>>;

    /// Release a region obtained from [`allocate`](Self::allocate).
    ///
    /// # Safety
    ///
    /// `ptr` must have been returned by `allocate(len)` on this heap and not
    /// released since.
    unsafe fn deallocate(&self, ptr: NonNull<u8>, len: usize);
}

/// Shared handle to the heap results are allocated on.
pub type SharedHeap = Arc<dyn ForeignHeap>;

const HEAP_ALIGN: usize = 16;

/// The process allocator. Suitable when host and bridge share one address space.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemHeap;

// SAFETY: regions come straight from the global allocator with a fixed layout
// derived from `len`, and are returned to it with the same layout.
unsafe impl ForeignHeap for SystemHeap {
    fn allocate(&self, len: usize) -> Option<NonNull<u8>> {
        let layout = Layout::from_size_align(len, HEAP_ALIGN).ok()?;
        if layout.size() == 0 {
            return None;
        }
        // SAFETY: layout has non-zero size.
        NonNull::new(unsafe { alloc::alloc(layout) })
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, len: usize) {
        // SAFETY: `allocate` accepted this `len` with the same alignment, so the
        // layout is valid and matches the one used to allocate.
        unsafe {
            let layout = Layout::from_size_align_unchecked(len, HEAP_ALIGN);
            alloc::dealloc(ptr.as_ptr(), layout);
        }
    }
}

/// A [`SystemHeap`] that counts live allocations.
///
/// Clones share counters, so a test can hand one clone to a bridge and keep
/// another to assert that every region was released.
#[derive(Clone, Debug)]
pub struct TrackingHeap {
    state: Arc<TrackingState>,
}

#[derive(Debug)]
struct TrackingState {
    live: AtomicUsize,
    live_bytes: AtomicUsize,
    total: AtomicUsize,
    budget: AtomicUsize,
}

impl TrackingHeap {
    pub fn new() -> Self {
        Self {
            state: Arc::new(TrackingState {
                live: AtomicUsize::new(0),
                live_bytes: AtomicUsize::new(0),
                total: AtomicUsize::new(0),
                budget: AtomicUsize::new(usize::MAX),
            }),
        }
    }

    /// Let the next `n` allocations succeed and fail every one after that.
    pub fn fail_after(&self, n: usize) {
        self.state.budget.store(n, Ordering::SeqCst);
    }

    /// Allocations not yet released.
    pub fn outstanding(&self) -> usize {
        self.state.live.load(Ordering::SeqCst)
    }

    /// Bytes not yet released.
    pub fn outstanding_bytes(&self) -> usize {
        self.state.live_bytes.load(Ordering::SeqCst)
    }

    /// Successful allocations since creation.
    pub fn total_allocations(&self) -> usize {
        self.state.total.load(Ordering::SeqCst)
    }

    /// A shared handle to this heap, for [`Bridge::with_heap`](crate::Bridge::with_heap).
    pub fn shared(&self) -> SharedHeap {
        Arc::new(self.clone())
    }
}

impl Default for TrackingHeap {
    fn default() -> Self {
        Self::new()
    }
}

// SAFETY: delegates to `SystemHeap` and only adds bookkeeping.
unsafe impl ForeignHeap for TrackingHeap {
    fn allocate(&self, len: usize) -> Option<NonNull<u8>> {
        let granted = self
            .state
            .budget
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |b| b.checked_sub(1));
        if granted.is_err() {
            return None;
        }
        let ptr = SystemHeap.allocate(len)?;
        self.state.live.fetch_add(1, Ordering::SeqCst);
        self.state.live_bytes.fetch_add(len, Ordering::SeqCst);
        self.state.total.fetch_add(1, Ordering::SeqCst);
        Some(ptr)
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, len: usize) {
        self.state.live.fetch_sub(1, Ordering::SeqCst);
        self.state.live_bytes.fetch_sub(len, Ordering::SeqCst);
        // SAFETY: forwarded caller contract; every region came from `SystemHeap`.
        unsafe { SystemHeap.deallocate(ptr, len) }
    }
}

/// Input bytes lent by the host for the duration of a call.
#[derive(Clone, Copy, Debug)]
pub struct BorrowedBuffer<'a> {
    bytes: &'a [u8],
}

impl<'a> BorrowedBuffer<'a> {
    pub fn from_slice(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    /// Borrow `len` bytes at `addr` in the shared address space.
    ///
    /// A null `addr` or zero `len` yields an empty buffer, which every
    /// pipeline rejects in its validation gate.
    ///
    /// # Safety
    ///
    /// If `addr` is non-null and `len > 0`, `addr` must point to `len`
    /// initialized bytes that nothing mutates for the lifetime `'a`.
    pub unsafe fn from_raw(addr: usize, len: usize) -> Self {
        if addr == 0 || len == 0 {
            return Self { bytes: &[] };
        }
        // SAFETY: upheld by the caller.
        let bytes = unsafe { std::slice::from_raw_parts(addr as *const u8, len) };
        Self { bytes }
    }

    pub fn as_slice(&self) -> &'a [u8] {
        self.bytes
    }
}

impl Deref for BorrowedBuffer<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.bytes
    }
}

impl<'a> From<&'a [u8]> for BorrowedBuffer<'a> {
    fn from(bytes: &'a [u8]) -> Self {
        Self::from_slice(bytes)
    }
}

/// Address and length of a region handed to the host.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RawBuffer {
    pub addr: usize,
    pub len: usize,
}

/// A region on the foreign heap owned by whoever holds this value.
///
/// Dropping it releases the region. [`into_raw`](Self::into_raw) transfers
/// ownership to the host, which must then release it through the same heap.
/// An empty buffer owns nothing and reports address 0.
#[must_use = "an owned buffer is released when dropped; use into_raw to hand it to the host"]
pub struct OwnedBuffer {
    ptr: NonNull<u8>,
    len: usize,
    heap: Option<SharedHeap>,
}

// SAFETY: the region is uniquely owned by this value and only exposed through
// `&self` as an immutable slice; the heap handle is `Send + Sync`.
unsafe impl Send for OwnedBuffer {}
// SAFETY: see above.
unsafe impl Sync for OwnedBuffer {}

impl OwnedBuffer {
    /// A buffer that owns nothing.
    pub fn empty() -> Self {
        Self {
            ptr: NonNull::dangling(),
            len: 0,
            heap: None,
        }
    }

    /// Allocate a region on `heap` and copy `bytes` into it.
    pub fn copy_from(heap: &SharedHeap, bytes: &[u8]) -> Result<Self, BridgeError> {
        let mut pending = PendingAllocation::new(heap, bytes.len())?;
        pending.as_mut_slice().copy_from_slice(bytes);
        Ok(pending.commit())
    }

    /// Re-adopt a region previously given away with [`into_raw`](Self::into_raw).
    ///
    /// # Safety
    ///
    /// `raw` must come from `into_raw` on a buffer allocated from `heap`, and
    /// must not have been released or adopted since.
    pub unsafe fn from_raw(raw: RawBuffer, heap: SharedHeap) -> Self {
        match NonNull::new(raw.addr as *mut u8) {
            Some(ptr) if raw.len > 0 => Self {
                ptr,
                len: raw.len,
                heap: Some(heap),
            },
            _ => Self::empty(),
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Host-visible address, 0 when empty.
    pub fn addr(&self) -> usize {
        if self.heap.is_some() {
            self.ptr.as_ptr() as usize
        } else {
            0
        }
    }

    pub fn as_slice(&self) -> &[u8] {
        if self.len == 0 {
            return &[];
        }
        // SAFETY: the heap contract keeps `ptr` valid for `len` bytes while we
        // own it, and `PendingAllocation` initialized every byte.
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    /// View the bytes as typed samples (`u16`, `f32`, ...).
    ///
    /// Returns `None` if the length or alignment does not fit `T`.
    pub fn samples<T: bytemuck::Pod>(&self) -> Option<&[T]> {
        bytemuck::try_cast_slice(self.as_slice()).ok()
    }

    /// Give up ownership. The host is now responsible for releasing the region.
    pub fn into_raw(mut self) -> RawBuffer {
        let raw = RawBuffer {
            addr: self.addr(),
            len: self.len,
        };
        self.heap = None;
        raw
    }

    /// Release the region now.
    pub fn release(self) {
        drop(self);
    }

    /// Copy into a new region on the same heap.
    pub fn try_clone(&self) -> Result<Self, BridgeError> {
        match &self.heap {
            Some(heap) => Self::copy_from(heap, self.as_slice()),
            None => Ok(Self::empty()),
        }
    }
}

impl Drop for OwnedBuffer {
    fn drop(&mut self) {
        if let Some(heap) = self.heap.take() {
            // SAFETY: `ptr`/`len` came from `heap.allocate(len)` and ownership
            // was never transferred (`into_raw` clears `heap`).
            unsafe { heap.deallocate(self.ptr, self.len) };
        }
    }
}

impl Deref for OwnedBuffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl Default for OwnedBuffer {
    fn default() -> Self {
        Self::empty()
    }
}

impl PartialEq for OwnedBuffer {
    fn eq(&self, other: &Self) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl Eq for OwnedBuffer {}

impl fmt::Debug for OwnedBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OwnedBuffer")
            .field("addr", &format_args!("{:#x}", self.addr()))
            .field("len", &self.len)
            .finish()
    }
}

/// A zero-filled region being written by a pipeline.
///
/// Released on drop unless [`commit`](Self::commit) publishes it.
pub struct PendingAllocation {
    buf: OwnedBuffer,
}

impl PendingAllocation {
    /// Allocate `len` zeroed bytes. Zero `len` allocates nothing.
    pub fn new(heap: &SharedHeap, len: usize) -> Result<Self, BridgeError> {
        if len == 0 {
            return Ok(Self {
                buf: OwnedBuffer::empty(),
            });
        }
        let ptr = heap.allocate(len).ok_or(BridgeError::Allocation(len))?;
        // SAFETY: the heap contract makes `ptr` valid for writes of `len` bytes.
        unsafe { ptr.as_ptr().write_bytes(0, len) };
        Ok(Self {
            buf: OwnedBuffer {
                ptr,
                len,
                heap: Some(Arc::clone(heap)),
            },
        })
    }

    pub fn len(&self) -> usize {
        self.buf.len
    }

    pub fn is_empty(&self) -> bool {
        self.buf.len == 0
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        if self.buf.len == 0 {
            return &mut [];
        }
        // SAFETY: uniquely owned, initialized in `new`, valid for `len` bytes.
        unsafe { std::slice::from_raw_parts_mut(self.buf.ptr.as_ptr(), self.buf.len) }
    }

    /// Publish the region as an [`OwnedBuffer`].
    pub fn commit(self) -> OwnedBuffer {
        self.buf
    }
}
