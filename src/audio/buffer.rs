//! Fixed-capacity circular (ring) buffer feeding the music lane.
//!
//! The radio decoder pushes interleaved PCM at one end and the output
//! callback pops it from the other.  When the buffer is full, new samples
//! **overwrite** the oldest data: for a live stream, late audio is worth
//! less than current audio.
//!
//! # Example
//!
//! ```rust
//! use pomodoro_radio::audio::RingBuffer;
//!
//! let mut buf = RingBuffer::new(4);
//! buf.push_slice(&[1.0, 2.0, 3.0, 4.0, 5.0]); // 5 items → capacity 4 → oldest dropped
//! let mut out = [0.0; 4];
//! assert_eq!(buf.pop_into(&mut out), 4);
//! assert_eq!(out, [2.0, 3.0, 4.0, 5.0]);
//! ```

// ---------------------------------------------------------------------------
// RingBuffer
// ---------------------------------------------------------------------------

/// A fixed-capacity circular FIFO.
///
/// ## Overflow behaviour
///
/// When [`push_slice`](Self::push_slice) would exceed `capacity`, the oldest
/// samples are silently overwritten.  The buffer never allocates beyond its
/// initial capacity.
pub struct RingBuffer<T> {
    buf: Vec<T>,
    capacity: usize,
    /// Index of the *next* write position (wraps around `capacity`).
    write_pos: usize,
    /// Number of valid samples currently stored (≤ `capacity`).
    len: usize,
}

impl<T: Copy + Default> RingBuffer<T> {
    /// Create a new ring buffer with the given `capacity`.
    ///
    /// # Panics
    ///
    /// Panics if `capacity == 0`.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "RingBuffer capacity must be > 0");
        Self {
            buf: vec![T::default(); capacity],
            capacity,
            write_pos: 0,
            len: 0,
        }
    }

    /// Append `data` to the buffer, overwriting the oldest samples on
    /// overflow.
    pub fn push_slice(&mut self, data: &[T]) {
        // Only the newest `capacity` items can survive.
        let data = &data[data.len().saturating_sub(self.capacity)..];
        let mut rest = data;
        while !rest.is_empty() {
            let run = rest.len().min(self.capacity - self.write_pos);
            self.buf[self.write_pos..self.write_pos + run].copy_from_slice(&rest[..run]);
            self.write_pos = (self.write_pos + run) % self.capacity;
            rest = &rest[run..];
        }
        self.len = (self.len + data.len()).min(self.capacity);
    }

    /// Move up to `out.len()` of the oldest samples into `out`.
    ///
    /// Returns how many were written; the rest of `out` is left untouched.
    pub fn pop_into(&mut self, out: &mut [T]) -> usize {
        let n = out.len().min(self.len);
        let read_pos = (self.write_pos + self.capacity - self.len) % self.capacity;

        let first = n.min(self.capacity - read_pos);
        out[..first].copy_from_slice(&self.buf[read_pos..read_pos + first]);
        out[first..n].copy_from_slice(&self.buf[..n - first]);

        self.len -= n;
        n
    }

    /// Discard all samples and reset the write position.
    pub fn clear(&mut self) {
        self.write_pos = 0;
        self.len = 0;
    }

    /// Number of valid samples currently stored.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` when the buffer contains no samples.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Maximum number of samples the buffer can hold.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_full(&self) -> bool {
        self.len == self.capacity
    }

    /// Buffered audio in seconds for interleaved `channels` at `sample_rate`.
    pub fn duration_secs(&self, sample_rate: u32, channels: u16) -> f32 {
        if sample_rate == 0 || channels == 0 {
            return 0.0;
        }
        self.len as f32 / (sample_rate as f32 * channels as f32)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn pop_all(buf: &mut RingBuffer<f32>) -> Vec<f32> {
        let mut out = vec![0.0; buf.len()];
        let n = buf.pop_into(&mut out);
        out.truncate(n);
        out
    }

    // ---- Basic push / pop --------------------------------------------------

    #[test]
    fn push_and_pop_within_capacity() {
        let mut buf = RingBuffer::new(8);
        buf.push_slice(&[1.0_f32, 2.0, 3.0]);
        assert_eq!(buf.len(), 3);
        assert!(!buf.is_full());

        assert_eq!(pop_all(&mut buf), vec![1.0, 2.0, 3.0]);
        assert!(buf.is_empty());
    }

    #[test]
    fn partial_pop_keeps_remainder_in_order() {
        let mut buf = RingBuffer::new(8);
        buf.push_slice(&[1.0_f32, 2.0, 3.0, 4.0]);

        let mut out = [0.0_f32; 3];
        assert_eq!(buf.pop_into(&mut out), 3);
        assert_eq!(out, [1.0, 2.0, 3.0]);
        assert_eq!(buf.len(), 1);

        buf.push_slice(&[5.0, 6.0]);
        assert_eq!(pop_all(&mut buf), vec![4.0, 5.0, 6.0]);
    }

    #[test]
    fn pop_more_than_available_leaves_tail_untouched() {
        let mut buf = RingBuffer::new(4);
        buf.push_slice(&[1.0_f32]);

        let mut out = [9.0_f32; 3];
        assert_eq!(buf.pop_into(&mut out), 1);
        assert_eq!(out, [1.0, 9.0, 9.0]);
    }

    // ---- Overflow (oldest sample discarded) --------------------------------

    #[test]
    fn overflow_by_one_drops_oldest() {
        let mut buf = RingBuffer::new(4);
        buf.push_slice(&[1.0_f32, 2.0, 3.0, 4.0, 5.0]);

        assert_eq!(buf.len(), 4);
        assert_eq!(pop_all(&mut buf), vec![2.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn wraparound_after_partial_reads() {
        let mut buf = RingBuffer::new(3);
        buf.push_slice(&[1.0_f32, 2.0]);
        let mut one = [0.0_f32; 1];
        buf.pop_into(&mut one);
        buf.push_slice(&[3.0, 4.0, 5.0]); // wraps, overwrites 2.0

        assert_eq!(pop_all(&mut buf), vec![3.0, 4.0, 5.0]);
    }

    // ---- Clear -------------------------------------------------------------

    #[test]
    fn clear_resets_state() {
        let mut buf = RingBuffer::new(4);
        buf.push_slice(&[1.0_f32, 2.0, 3.0, 4.0, 5.0]);
        buf.clear();

        assert!(buf.is_empty());
        buf.push_slice(&[9.0_f32]);
        assert_eq!(pop_all(&mut buf), vec![9.0]);
    }

    // ---- Capacity / duration helpers ---------------------------------------

    #[test]
    fn duration_secs_counts_frames() {
        let mut buf = RingBuffer::new(96_000);
        buf.push_slice(&vec![0.0_f32; 48_000]);
        // 48 000 interleaved stereo samples at 48 kHz = 0.5 s
        assert!((buf.duration_secs(48_000, 2) - 0.5).abs() < 1e-6);
        assert_eq!(buf.duration_secs(0, 2), 0.0);
    }

    #[test]
    #[should_panic(expected = "RingBuffer capacity must be > 0")]
    fn zero_capacity_panics() {
        let _buf: RingBuffer<f32> = RingBuffer::new(0);
    }
}
