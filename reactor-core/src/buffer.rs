//! `ByteBuffers` pool.
//!
//! The external buffer-pool contract the core depends on (`spec.md` §6):
//! `acquire(size, direct) -> Buffer`, `release(Buffer)`. The core holds no
//! assumption beyond "release returns the buffer to the pool" — so this is
//! a minimal, generically useful implementation, not a tuned allocator.
//!
//! # Design
//!
//! Grounded on the teacher's `alloc::IoArena` (a page-based slab arena): we
//! keep the "reuse fixed-size chunks instead of allocating per read" idea,
//! but generalize it from a single-owner io_uring arena to a
//! `parking_lot::Mutex`-guarded free list, since here buffers are acquired
//! by worker threads and released by whichever thread's I/O call finishes —
//! there is no single owning thread to confine the arena to.
//!
//! `direct` is accepted for API parity with connectors that distinguish
//! heap vs. direct buffers (as the Java NIO world this core's contract
//! descends from does), but both kinds are satisfied from the same
//! `BytesMut`-backed free list: Rust's allocator does not suffer the
//! direct-buffer GC-pressure problem that distinction exists to route
//! around.

use bytes::BytesMut;
use parking_lot::Mutex;
use std::sync::Arc;

/// A pooled, growable byte buffer. Returned by [`BufferPool::acquire`] and
/// returned to the pool by [`BufferPool::release`].
#[derive(Debug)]
pub struct Buffer {
    bytes: BytesMut,
    direct: bool,
}

impl Buffer {
    /// The writable tail of the buffer, i.e. its spare capacity.
    ///
    /// Mirrors `bytes::BufMut::chunk_mut`'s own contract: the returned
    /// bytes are uninitialized. Callers must not read from the slice
    /// before writing into it, and must call [`Buffer::advance_mut`] with
    /// exactly the number of bytes they initialized.
    #[allow(unsafe_code)]
    pub fn chunk_mut(&mut self) -> &mut [u8] {
        let spare = self.bytes.spare_capacity_mut();
        // SAFETY: we hand back a `&mut [u8]` view over memory that is
        // allocated (part of `BytesMut`'s capacity) but may be
        // uninitialized. The caller's only sanctioned use is to write into
        // it (e.g. via `socket.read(..)`) and then report how many bytes
        // it initialized through `advance_mut`.
        unsafe { std::slice::from_raw_parts_mut(spare.as_mut_ptr().cast::<u8>(), spare.len()) }
    }

    /// Mark `n` additional bytes (written via [`Buffer::chunk_mut`]) as
    /// initialized and visible through [`Buffer::as_slice`].
    ///
    /// # Panics
    ///
    /// Panics if `n` would advance past the buffer's capacity.
    #[allow(unsafe_code)]
    pub fn advance_mut(&mut self, n: usize) {
        let new_len = self.bytes.len() + n;
        assert!(new_len <= self.bytes.capacity());
        // SAFETY: `new_len <= capacity`, and the caller attests the bytes
        // in `[len, new_len)` were just initialized via `chunk_mut`.
        unsafe {
            self.bytes.set_len(new_len);
        }
    }

    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    #[must_use]
    pub const fn is_direct(&self) -> bool {
        self.direct
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.bytes.capacity()
    }

    fn reset(&mut self) {
        self.bytes.clear();
    }
}

/// A thread-safe free list of [`Buffer`]s, bucketed by capacity.
///
/// Buffers are bucketed to the next power-of-two capacity so a handful of
/// common read sizes (e.g. the configured `default_buffer_size`) reuse the
/// same free list instead of fragmenting across every distinct `acquire`
/// size requested.
#[derive(Clone)]
pub struct BufferPool {
    inner: Arc<Mutex<Vec<BytesMut>>>,
}

impl BufferPool {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Acquire a buffer with at least `size` bytes of capacity.
    ///
    /// `direct` only affects the returned [`Buffer::is_direct`] flag; see
    /// the module docs for why both kinds share one free list.
    #[must_use]
    pub fn acquire(&self, size: usize, direct: bool) -> Buffer {
        let bucket = size.next_power_of_two().max(4096);
        let mut free = self.inner.lock();
        if let Some(pos) = free.iter().position(|b| b.capacity() >= bucket) {
            let bytes = free.swap_remove(pos);
            return Buffer { bytes, direct };
        }
        drop(free);
        Buffer {
            bytes: BytesMut::with_capacity(bucket),
            direct,
        }
    }

    /// Return a buffer to the pool. The buffer is cleared (its content is
    /// not preserved) but its allocation is retained for reuse.
    pub fn release(&self, mut buffer: Buffer) {
        buffer.reset();
        self.inner.lock().push(buffer.bytes);
    }

    /// Number of buffers currently idle in the pool. Exposed for tests
    /// asserting buffer conservation (`spec.md` §8).
    #[must_use]
    pub fn idle_count(&self) -> usize {
        self.inner.lock().len()
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_then_release_is_reused() {
        let pool = BufferPool::new();
        let buf = pool.acquire(4096, false);
        assert_eq!(pool.idle_count(), 0);
        pool.release(buf);
        assert_eq!(pool.idle_count(), 1);

        let buf2 = pool.acquire(4096, false);
        assert_eq!(pool.idle_count(), 0);
        pool.release(buf2);
        assert_eq!(pool.idle_count(), 1);
    }

    #[test]
    fn chunk_mut_and_advance_roundtrip() {
        let pool = BufferPool::new();
        let mut buf = pool.acquire(16, false);
        {
            let chunk = buf.chunk_mut();
            assert!(chunk.len() >= 16);
            chunk[..5].copy_from_slice(b"hello");
        }
        buf.advance_mut(5);
        assert_eq!(buf.as_slice(), b"hello");
    }

    #[test]
    fn release_clears_content() {
        let pool = BufferPool::new();
        let mut buf = pool.acquire(16, false);
        buf.chunk_mut()[..3].copy_from_slice(b"abc");
        buf.advance_mut(3);
        pool.release(buf);

        let buf2 = pool.acquire(16, false);
        assert!(buf2.is_empty());
    }

    #[test]
    fn direct_flag_is_carried_but_shares_the_pool() {
        let pool = BufferPool::new();
        let heap = pool.acquire(4096, false);
        let direct = pool.acquire(4096, true);
        assert!(!heap.is_direct());
        assert!(direct.is_direct());
        pool.release(heap);
        pool.release(direct);
        assert_eq!(pool.idle_count(), 2);
    }
}
