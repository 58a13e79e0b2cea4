use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering, fence};

/// Single-producer / single-consumer ring buffer of mono `f32` samples.
///
/// Intended for the emulation thread (producer) feeding an audio callback
/// thread (consumer) without locks.
///
/// This queue is *lossy* when full: the newest sample always lands and the
/// oldest one is dropped. Indices increase monotonically and are masked on
/// access; the producer only moves `write` and the consumer only moves
/// `read`, so an overrun is noticed and skipped over by the consumer.
#[derive(Clone)]
pub struct AudioConsumer {
    inner: Arc<Inner>,
}

pub struct AudioProducer {
    inner: Arc<Inner>,
}

struct Inner {
    // f32 bit patterns.
    buf: Box<[AtomicU32]>,
    mask: usize,
    write: AtomicUsize,
    read: AtomicUsize,
}

impl Inner {
    fn capacity(&self) -> usize {
        self.mask + 1
    }

    fn len(&self) -> usize {
        let write = self.write.load(Ordering::Acquire);
        let read = self.read.load(Ordering::Acquire);
        write.wrapping_sub(read).min(self.capacity())
    }
}

/// Smallest power-of-two capacity holding `latency_ms` of audio.
pub fn capacity_for(sample_rate: u32, latency_ms: u32) -> usize {
    let samples = (sample_rate as u64 * latency_ms as u64 / 1000) as usize;
    samples.max(256).next_power_of_two()
}

/// `capacity` is rounded up to a power of two.
pub fn audio_queue(capacity: usize) -> (AudioProducer, AudioConsumer) {
    let cap = capacity.max(2).next_power_of_two();
    let buf: Vec<AtomicU32> = (0..cap).map(|_| AtomicU32::new(0)).collect();

    let inner = Arc::new(Inner {
        buf: buf.into_boxed_slice(),
        mask: cap - 1,
        write: AtomicUsize::new(0),
        read: AtomicUsize::new(0),
    });

    (
        AudioProducer {
            inner: Arc::clone(&inner),
        },
        AudioConsumer { inner },
    )
}

impl AudioProducer {
    #[inline]
    pub fn push(&self, sample: f32) {
        let write = self.inner.write.load(Ordering::Relaxed);
        self.inner.buf[write & self.inner.mask].store(sample.to_bits(), Ordering::Relaxed);
        self.inner.write.store(write.wrapping_add(1), Ordering::Release);
    }

    /// Drop everything queued. The host must not be pulling concurrently.
    pub fn clear(&self) {
        let write = self.inner.write.load(Ordering::Relaxed);
        self.inner.read.store(write, Ordering::Release);
    }

    /// Another consumer handle on the same queue.
    pub fn consumer(&self) -> AudioConsumer {
        AudioConsumer {
            inner: Arc::clone(&self.inner),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.inner.capacity()
    }
}

impl AudioConsumer {
    #[inline]
    pub fn pop(&self) -> Option<f32> {
        let mut out = [0.0];
        (self.pull_into(&mut out) == 1).then_some(out[0])
    }

    /// Up to `max` of the oldest queued samples.
    pub fn pull(&self, max: usize) -> Vec<f32> {
        let mut out = vec![0.0; max.min(self.len())];
        let n = self.pull_into(&mut out);
        out.truncate(n);
        out
    }

    /// Fill `out` from the front of the queue, returning how many samples
    /// were written.
    pub fn pull_into(&self, out: &mut [f32]) -> usize {
        let inner = &*self.inner;
        let cap = inner.capacity();
        let write = inner.write.load(Ordering::Acquire);
        let mut read = inner.read.load(Ordering::Relaxed);
        if write.wrapping_sub(read) > cap {
            read = write.wrapping_sub(cap);
        }

        let n = write.wrapping_sub(read).min(out.len());
        for (i, slot) in out[..n].iter_mut().enumerate() {
            let idx = read.wrapping_add(i) & inner.mask;
            *slot = f32::from_bits(inner.buf[idx].load(Ordering::Relaxed));
        }
        fence(Ordering::Acquire);

        // Anything the producer lapped while we were copying is stale.
        let write_after = inner.write.load(Ordering::Relaxed);
        let lapped = write_after.wrapping_sub(read).saturating_sub(cap).min(n);
        if lapped > 0 {
            out.copy_within(lapped..n, 0);
        }

        inner.read.store(read.wrapping_add(n), Ordering::Release);
        n - lapped
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.inner.capacity()
    }
}
