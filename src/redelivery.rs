use rand::Rng;
use std::time::Duration;

/// Redelivery delay configuration.
///
/// The policy only computes delays. Giving up after `maximum_redeliveries`
/// is the consumer's decision: compare the message's redelivery counter with
/// `maximum_redeliveries` (negative means unlimited) before scheduling a
/// retry.
///
/// Policies are plain values; clone the defaults and adjust the copy per
/// consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedeliveryPolicy {
    /// Delay before the first redelivery, in milliseconds.
    pub initial_redelivery_delay: u64,
    /// Redeliveries allowed before the message is poisoned; negative means
    /// unlimited.
    pub maximum_redeliveries: i32,
    pub use_exponential_back_off: bool,
    pub back_off_multiplier: u32,
    pub use_collision_avoidance: bool,
    /// Jitter bound as a percentage of the baseline delay (0-100).
    pub collision_avoidance_percent: u8,
}

impl Default for RedeliveryPolicy {
    fn default() -> Self {
        Self {
            initial_redelivery_delay: 1000,
            maximum_redeliveries: 6,
            use_exponential_back_off: false,
            back_off_multiplier: 5,
            use_collision_avoidance: false,
            collision_avoidance_percent: 15,
        }
    }
}

impl RedeliveryPolicy {
    /// Value for `maximum_redeliveries` that disables the limit.
    pub const UNLIMITED: i32 = -1;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn initial_redelivery_delay(mut self, delay_ms: u64) -> Self {
        self.initial_redelivery_delay = delay_ms;
        self
    }

    pub fn maximum_redeliveries(mut self, maximum: i32) -> Self {
        self.maximum_redeliveries = maximum;
        self
    }

    /// Enable exponential back-off with the given multiplier.
    pub fn exponential_back_off(mut self, multiplier: u32) -> Self {
        self.use_exponential_back_off = true;
        self.back_off_multiplier = multiplier;
        self
    }

    /// Enable collision avoidance with a jitter bound of `percent` (capped at 100).
    pub fn collision_avoidance(mut self, percent: u8) -> Self {
        self.use_collision_avoidance = true;
        self.collision_avoidance_percent = percent.min(100);
        self
    }

    /// Delay for the given redelivery counter before any jitter.
    ///
    /// `initial * multiplier^counter` with back-off enabled, otherwise the
    /// initial delay. Saturates at `u64::MAX`.
    pub fn baseline_delay(&self, redelivery_counter: u32) -> u64 {
        if !self.use_exponential_back_off {
            return self.initial_redelivery_delay;
        }
        u64::from(self.back_off_multiplier)
            .checked_pow(redelivery_counter)
            .map_or(u64::MAX, |factor| {
                self.initial_redelivery_delay.saturating_mul(factor)
            })
    }

    /// Delay in milliseconds before redelivering a message whose counter is
    /// `redelivery_counter`, using the thread-local random source for jitter.
    pub fn redelivery_delay(&self, redelivery_counter: u32) -> u64 {
        self.redelivery_delay_with_rng(redelivery_counter, &mut rand::thread_rng())
    }

    /// As `redelivery_delay`, drawing jitter from `rng`.
    ///
    /// With collision avoidance the baseline is shifted by a uniform offset
    /// in `[-bound, +bound]`, `bound = baseline * percent / 100`. The result
    /// is never negative.
    pub fn redelivery_delay_with_rng<R: Rng>(
        &self,
        redelivery_counter: u32,
        rng: &mut R,
    ) -> u64 {
        let baseline = self.baseline_delay(redelivery_counter);
        if !self.use_collision_avoidance || self.collision_avoidance_percent == 0 || baseline == 0
        {
            return baseline;
        }
        let percent = u128::from(self.collision_avoidance_percent.min(100));
        let bound = (u128::from(baseline) * percent / 100) as i128;
        let offset = rng.gen_range(-bound..=bound);
        (i128::from(baseline) + offset).clamp(0, i128::from(u64::MAX)) as u64
    }

    pub fn redelivery_delay_duration(&self, redelivery_counter: u32) -> Duration {
        Duration::from_millis(self.redelivery_delay(redelivery_counter))
    }
}
