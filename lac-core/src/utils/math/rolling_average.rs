//! Fixed-window moving average over a noisy scalar signal.
//!
//! The window lives in a fixed array with a write cursor, so filtering never
//! allocates and is safe to call from the control loop.
//!
//! # Example
//! ```rust
//! use lac_core::utils::math::rolling_average::RollingAverage;
//! let mut avg: RollingAverage = RollingAverage::new();
//! avg.add_item(3.0);
//! assert_eq!(avg.average_with(6.0), 4.5);
//! ```

use crate::utils::config::BUF_LEN;

/// How `average()` treats slots that have not been written yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FillPolicy {
    /// Divide by the number of samples written so far.
    #[default]
    CountSoFar,
    /// Treat unwritten slots as zero and always divide by the capacity.
    Capacity,
}

/// Circular buffer of the last `N` samples.
#[derive(Debug, Clone)]
pub struct RollingAverage<const N: usize = BUF_LEN> {
    buf: [f32; N],
    /// Slot that the next sample overwrites.
    oldest: usize,
    /// Samples written, capped at `N`.
    count: usize,
    policy: FillPolicy,
}

impl<const N: usize> Default for RollingAverage<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> RollingAverage<N> {
    /// Create an empty filter using [`FillPolicy::CountSoFar`].
    pub const fn new() -> Self {
        Self::with_policy(FillPolicy::CountSoFar)
    }

    pub const fn with_policy(policy: FillPolicy) -> Self {
        Self {
            buf: [0.0; N],
            oldest: 0,
            count: 0,
            policy,
        }
    }

    /// Overwrite the oldest sample with `value`.
    pub fn add_item(
        &mut self,
        value: f32,
    ) {
        if N == 0 {
            return;
        }
        self.buf[self.oldest] = value;
        self.oldest = (self.oldest + 1) % N;
        if self.count < N {
            self.count += 1;
        }
    }

    /// Add `value`, then return the updated mean.
    pub fn average_with(
        &mut self,
        value: f32,
    ) -> f32 {
        self.add_item(value);
        self.average()
    }

    /// Mean of the held samples, or `0.0` if nothing has been written.
    pub fn average(&self) -> f32 {
        if self.count == 0 {
            return 0.0;
        }
        // Unwritten slots are still zero, so summing the whole array is exact
        // for both policies.
        let sum: f32 = self.buf.iter().sum();
        let divisor = match self.policy {
            FillPolicy::CountSoFar => self.count,
            FillPolicy::Capacity => N,
        };
        sum / divisor as f32
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn is_full(&self) -> bool {
        self.count == N
    }

    pub fn policy(&self) -> FillPolicy {
        self.policy
    }

    /// Drop every held sample, keeping the fill policy.
    pub fn clear(&mut self) {
        self.buf = [0.0; N];
        self.oldest = 0;
        self.count = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(
        a: f32,
        b: f32,
    ) -> bool {
        libm::fabsf(a - b) < 1e-5
    }

    #[test]
    fn empty_average_is_zero() {
        let avg: RollingAverage = RollingAverage::new();
        assert_eq!(avg.average(), 0.0);
        assert!(avg.is_empty());
    }

    #[test]
    fn count_so_far_before_full() {
        let mut avg: RollingAverage = RollingAverage::new();
        avg.add_item(10.0);
        assert!(close(avg.average(), 10.0));
        avg.add_item(20.0);
        assert!(close(avg.average(), 15.0));
        assert!(!avg.is_full());
    }

    #[test]
    fn capacity_policy_before_full() {
        let mut avg: RollingAverage = RollingAverage::with_policy(FillPolicy::Capacity);
        assert_eq!(avg.policy(), FillPolicy::Capacity);
        avg.add_item(9.0);
        assert!(close(avg.average(), 3.0));
        avg.add_item(3.0);
        assert!(close(avg.average(), 4.0));
        avg.add_item(3.0);
        assert!(close(avg.average(), 5.0));
    }

    #[test]
    fn policies_agree_once_full() {
        let mut a: RollingAverage = RollingAverage::new();
        let mut b: RollingAverage = RollingAverage::with_policy(FillPolicy::Capacity);
        for v in [4.0, -2.0, 7.5, 1.0, 100.0] {
            a.add_item(v);
            b.add_item(v);
        }
        assert!(close(a.average(), b.average()));
    }

    #[test]
    fn window_keeps_last_three() {
        let mut avg: RollingAverage = RollingAverage::new();
        let samples = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0];
        for (i, &v) in samples.iter().enumerate() {
            avg.add_item(v);
            let start = i.saturating_sub(BUF_LEN - 1);
            let window = &samples[start..=i];
            let expected = window.iter().sum::<f32>() / window.len() as f32;
            assert!(close(avg.average(), expected), "mismatch after sample {}", i);
        }
        assert_eq!(avg.len(), BUF_LEN);
    }

    #[test]
    fn average_with_matches_add_then_average() {
        let mut a: RollingAverage = RollingAverage::new();
        let mut b: RollingAverage = RollingAverage::new();
        for v in [0.5, -3.0, 12.0, 8.25, -1.0] {
            let combined = a.average_with(v);
            b.add_item(v);
            assert_eq!(combined, b.average());
        }
    }

    #[test]
    fn custom_capacity() {
        let mut avg = RollingAverage::<5>::new();
        for v in 1..=10 {
            avg.add_item(v as f32);
        }
        assert!(close(avg.average(), 8.0));
    }

    #[test]
    fn clear_resets_fill_state() {
        let mut avg: RollingAverage = RollingAverage::new();
        avg.add_item(50.0);
        avg.add_item(60.0);
        avg.clear();
        assert!(avg.is_empty());
        avg.add_item(2.0);
        assert!(close(avg.average(), 2.0));
    }
}
