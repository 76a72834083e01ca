//! Lock-free single-producer single-consumer ring buffer.
//!
//! Carries audio samples from the capture context (an ISR, a DMA callback
//! or another thread) into the decoder, and recovered symbols out of the
//! demodulator. The queue is a Lamport ring: two monotonically increasing
//! indices over a power-of-two buffer, published with release/acquire
//! ordering. Nothing ever blocks; a full buffer simply refuses the push.
//!
//! [`RingBuffer::new`] hands back a [`Producer`] / [`Consumer`] pair so the
//! single-producer single-consumer contract is enforced by ownership.

use alloc::boxed::Box;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicUsize, Ordering};

pub struct RingBuffer<T> {
    buffer: Box<[UnsafeCell<T>]>,
    mask: usize,
    /// Total number of items ever pushed.
    tail: AtomicUsize,
    /// Total number of items ever popped.
    head: AtomicUsize,
}

// The producer and consumer touch disjoint slots: a slot is written only
// while it is outside the [head, tail) window and read only while inside.
unsafe impl<T: Copy + Send> Sync for RingBuffer<T> {}
unsafe impl<T: Copy + Send> Send for RingBuffer<T> {}

impl<T: Copy + Default + Send> RingBuffer<T> {
    /// Allocates a buffer of `capacity` items and splits it into its two
    /// endpoints. `capacity` must be a power of two.
    pub fn new(capacity: usize) -> (Producer<T>, Consumer<T>) {
        assert!(
            capacity.is_power_of_two(),
            "ring buffer capacity must be a power of two"
        );

        let buffer: Vec<UnsafeCell<T>> =
            (0..capacity).map(|_| UnsafeCell::new(T::default())).collect();

        let ring = Arc::new(RingBuffer {
            buffer: buffer.into_boxed_slice(),
            mask: capacity - 1,
            tail: AtomicUsize::new(0),
            head: AtomicUsize::new(0),
        });

        (Producer { ring: ring.clone() }, Consumer { ring })
    }
}

impl<T: Copy> RingBuffer<T> {
    fn capacity(&self) -> usize {
        self.mask + 1
    }

    fn available(&self) -> usize {
        let tail = self.tail.load(Ordering::Acquire);
        let head = self.head.load(Ordering::Acquire);
        tail.wrapping_sub(head)
    }
}

/// Write endpoint of a [`RingBuffer`].
pub struct Producer<T> {
    ring: Arc<RingBuffer<T>>,
}

impl<T: Copy> Producer<T> {
    /// Appends one item. Returns `false`, leaving the queue untouched, when
    /// the buffer is full.
    pub fn push(&mut self, item: T) -> bool {
        let ring = &*self.ring;
        let tail = ring.tail.load(Ordering::Relaxed);
        let head = ring.head.load(Ordering::Acquire);

        if tail.wrapping_sub(head) == ring.capacity() {
            return false;
        }

        unsafe {
            *ring.buffer[tail & ring.mask].get() = item;
        }
        ring.tail.store(tail.wrapping_add(1), Ordering::Release);
        true
    }

    /// Appends a whole slice, or nothing at all when fewer than
    /// `items.len()` slots are free.
    pub fn push_slice(&mut self, items: &[T]) -> bool {
        let ring = &*self.ring;
        let tail = ring.tail.load(Ordering::Relaxed);
        let head = ring.head.load(Ordering::Acquire);

        if ring.capacity() - tail.wrapping_sub(head) < items.len() {
            return false;
        }

        for (offset, &item) in items.iter().enumerate() {
            unsafe {
                *ring.buffer[tail.wrapping_add(offset) & ring.mask].get() = item;
            }
        }
        ring.tail.store(tail.wrapping_add(items.len()), Ordering::Release);
        true
    }

    pub fn is_full(&self) -> bool {
        self.ring.available() == self.ring.capacity()
    }

    pub fn available(&self) -> usize {
        self.ring.available()
    }
}

/// Read endpoint of a [`RingBuffer`].
pub struct Consumer<T> {
    ring: Arc<RingBuffer<T>>,
}

impl<T: Copy> Consumer<T> {
    /// Removes and returns the oldest item, or `None` when empty.
    pub fn pop(&mut self) -> Option<T> {
        let ring = &*self.ring;
        let head = ring.head.load(Ordering::Relaxed);
        let tail = ring.tail.load(Ordering::Acquire);

        if head == tail {
            return None;
        }

        let item = unsafe { *ring.buffer[head & ring.mask].get() };
        ring.head.store(head.wrapping_add(1), Ordering::Release);
        Some(item)
    }

    /// Discards everything currently queued.
    pub fn flush(&mut self) {
        let ring = &*self.ring;
        let tail = ring.tail.load(Ordering::Acquire);
        ring.head.store(tail, Ordering::Release);
    }

    pub fn is_empty(&self) -> bool {
        self.ring.available() == 0
    }

    pub fn available(&self) -> usize {
        self.ring.available()
    }
}
