//! Floor arithmetic and padding generation.
//!
//! The floor for a window is `minimum_rate * window_ms / 1000` bytes, which is
//! fractional whenever the product is not a multiple of 1000. All arithmetic is
//! done exactly in milli-bytes; only the final padding length is rounded, up to
//! a whole number of [`CHUNK_WIDTH`]-byte chunks, so the floor is never
//! undershot by a partial chunk.
//!
//! Padding must not be compressible: compressible filler would let a
//! compressing transport shrink it and defeat the wire-level byte guarantee.
//! Each chunk is an independent uniform `u32` from the thread-local CSPRNG.

use bytes::{BufMut, Bytes, BytesMut};
use rand::Rng;
use std::time::Duration;

/// Width in bytes of one independently drawn padding chunk.
pub const CHUNK_WIDTH: usize = 4;

const MILLIS_PER_SECOND: u128 = 1000;

/// Floor byte count for one sliding window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateFloor {
    /// Bytes per second.
    minimum_rate: u64,
    /// Window length in whole milliseconds.
    window_ms: u128,
}

impl RateFloor {
    #[must_use]
    pub fn new(minimum_rate: u64, window: Duration) -> Self {
        Self {
            minimum_rate,
            window_ms: window.as_millis(),
        }
    }

    /// Floor for the window in milli-bytes (`minimum_size * 1000`).
    #[must_use]
    pub fn minimum_millibytes(&self) -> u128 {
        u128::from(self.minimum_rate) * self.window_ms
    }

    /// Floor for the window in bytes, rounded up.
    #[must_use]
    pub fn minimum_bytes(&self) -> u128 {
        self.minimum_millibytes().div_ceil(MILLIS_PER_SECOND)
    }

    /// Padding length needed to lift `observed_bytes` to the floor.
    ///
    /// Returns 0 when the floor is already met, otherwise the smallest
    /// multiple of [`CHUNK_WIDTH`] that is at least the deficit.
    #[must_use]
    pub fn padding_for(&self, observed_bytes: u128) -> usize {
        let required = self.minimum_millibytes();
        let observed = observed_bytes.saturating_mul(MILLIS_PER_SECOND);
        if required <= observed {
            return 0;
        }

        let chunk_millibytes = CHUNK_WIDTH as u128 * MILLIS_PER_SECOND;
        let chunks = (required - observed).div_ceil(chunk_millibytes);
        usize::try_from(chunks * CHUNK_WIDTH as u128).unwrap_or(usize::MAX)
    }
}

/// Generate `len` bytes of non-compressible padding.
///
/// `len` is expected to be a multiple of [`CHUNK_WIDTH`]; a trailing partial
/// chunk is filled from one more draw.
#[must_use]
pub fn generate_padding(len: usize) -> Bytes {
    let mut rng = rand::thread_rng();
    let mut buf = BytesMut::with_capacity(len);

    for _ in 0..len / CHUNK_WIDTH {
        buf.put_u32(rng.gen::<u32>());
    }

    let remainder = len % CHUNK_WIDTH;
    if remainder > 0 {
        let chunk = rng.gen::<u32>().to_be_bytes();
        buf.extend_from_slice(chunk.get(..remainder).unwrap_or_default());
    }

    buf.freeze()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn test_minimum_size() {
        let floor = RateFloor::new(1000, Duration::from_millis(2000));
        assert_eq!(floor.minimum_millibytes(), 2_000_000);
        assert_eq!(floor.minimum_bytes(), 2000);
    }

    #[test]
    fn test_partial_window_deficit() {
        // 1000 B/s over 2 s, 500 bytes seen: 1500 is already a multiple of 4.
        let floor = RateFloor::new(1000, Duration::from_millis(2000));
        assert_eq!(floor.padding_for(500), 1500);
    }

    #[test]
    fn test_floor_met_or_exceeded_needs_nothing() {
        let floor = RateFloor::new(1000, Duration::from_millis(2000));
        assert_eq!(floor.padding_for(2000), 0);
        assert_eq!(floor.padding_for(1_000_000), 0);
        assert_eq!(floor.padding_for(u128::MAX), 0);
    }

    #[test]
    fn test_empty_window_pads_full_floor() {
        let floor = RateFloor::new(1000, Duration::from_millis(2000));
        assert_eq!(floor.padding_for(0), 2000);
    }

    #[test]
    fn test_deficit_rounds_up_to_chunk() {
        let floor = RateFloor::new(1000, Duration::from_millis(2000));
        assert_eq!(floor.padding_for(1999), 4);
        assert_eq!(floor.padding_for(1997), 4);
        assert_eq!(floor.padding_for(1996), 4);
        assert_eq!(floor.padding_for(1995), 8);
    }

    #[test]
    fn test_fractional_floor_rounds_only_the_buffer() {
        // 1001 B/s over 1.5 s is 1501.5 bytes.
        let floor = RateFloor::new(1001, Duration::from_millis(1500));
        assert_eq!(floor.minimum_bytes(), 1502);

        // Deficit of 1.5 bytes still needs one whole chunk.
        assert_eq!(floor.padding_for(1500), 4);
        // Deficit of 0.5 bytes as well.
        assert_eq!(floor.padding_for(1501), 4);
        // Above the fractional floor: nothing.
        assert_eq!(floor.padding_for(1502), 0);
    }

    #[test]
    fn test_sub_millisecond_precision_is_ignored() {
        let floor = RateFloor::new(1000, Duration::from_micros(2_000_999));
        assert_eq!(floor.minimum_bytes(), 2000);
    }

    #[test]
    fn test_generated_length() {
        assert!(generate_padding(0).is_empty());
        assert_eq!(generate_padding(4).len(), 4);
        assert_eq!(generate_padding(1500).len(), 1500);
        assert_eq!(generate_padding(7).len(), 7);
    }

    #[test]
    fn test_padding_is_not_compressible() {
        // A compressible buffer shows up as a skewed byte histogram or long
        // runs. Uniform bytes over 64 KiB put ~256 in each bucket.
        let padding = generate_padding(64 * 1024);

        let mut histogram = [0usize; 256];
        for byte in &padding {
            histogram[usize::from(*byte)] += 1;
        }
        assert!(histogram.iter().all(|&count| count > 128 && count < 400));

        let longest_run = padding
            .windows(2)
            .fold((1usize, 1usize), |(longest, current), pair| {
                let current = if pair[0] == pair[1] { current + 1 } else { 1 };
                (longest.max(current), current)
            })
            .0;
        assert!(longest_run < 6, "longest run of equal bytes: {longest_run}");
    }

    #[test]
    fn test_consecutive_buffers_differ() {
        assert_ne!(generate_padding(64), generate_padding(64));
    }
}
