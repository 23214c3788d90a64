//! Tests for redelivery delay computation.

use iridium_stomp_core::RedeliveryPolicy;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::rngs::mock::StepRng;
use std::time::Duration;

// =============================================================================
// Defaults and builders
// =============================================================================

#[test]
fn defaults() {
    let p = RedeliveryPolicy::default();
    assert_eq!(p.initial_redelivery_delay, 1000);
    assert_eq!(p.maximum_redeliveries, 6);
    assert!(!p.use_exponential_back_off);
    assert_eq!(p.back_off_multiplier, 5);
    assert!(!p.use_collision_avoidance);
    assert_eq!(p.collision_avoidance_percent, 15);
}

#[test]
fn builders_set_flags() {
    let p = RedeliveryPolicy::new()
        .initial_redelivery_delay(250)
        .maximum_redeliveries(RedeliveryPolicy::UNLIMITED)
        .exponential_back_off(3)
        .collision_avoidance(150);
    assert_eq!(p.initial_redelivery_delay, 250);
    assert_eq!(p.maximum_redeliveries, -1);
    assert!(p.use_exponential_back_off);
    assert_eq!(p.back_off_multiplier, 3);
    assert!(p.use_collision_avoidance);
    assert_eq!(p.collision_avoidance_percent, 100);
}

#[test]
fn clones_are_independent() {
    let shared = RedeliveryPolicy::default();
    let mut mine = shared.clone();
    mine.initial_redelivery_delay = 5;
    assert_eq!(shared.initial_redelivery_delay, 1000);
}

// =============================================================================
// Delay computation
// =============================================================================

#[test]
fn constant_delay_without_back_off() {
    let p = RedeliveryPolicy::new().initial_redelivery_delay(700);
    for counter in 0..10 {
        assert_eq!(p.redelivery_delay(counter), 700);
    }
}

#[test]
fn exponential_back_off_doubles() {
    let p = RedeliveryPolicy::new()
        .initial_redelivery_delay(1000)
        .exponential_back_off(2);
    let delays: Vec<u64> = (0..4).map(|n| p.redelivery_delay(n)).collect();
    assert_eq!(delays, vec![1000, 2000, 4000, 8000]);
}

#[test]
fn exponential_back_off_saturates() {
    let p = RedeliveryPolicy::new()
        .initial_redelivery_delay(1000)
        .exponential_back_off(10);
    assert_eq!(p.baseline_delay(40), u64::MAX);
}

#[test]
fn delay_duration_matches_millis() {
    let p = RedeliveryPolicy::new().initial_redelivery_delay(1500);
    assert_eq!(p.redelivery_delay_duration(0), Duration::from_millis(1500));
}

#[test]
fn maximum_redeliveries_does_not_affect_delay() {
    let p = RedeliveryPolicy::new()
        .initial_redelivery_delay(100)
        .maximum_redeliveries(1);
    assert_eq!(p.redelivery_delay(50), 100);
}

// =============================================================================
// Collision avoidance
// =============================================================================

#[test]
fn jitter_stays_within_bound() {
    let p = RedeliveryPolicy::new()
        .initial_redelivery_delay(1000)
        .exponential_back_off(2)
        .collision_avoidance(15);
    let mut rng = StdRng::seed_from_u64(7);
    for counter in 0..8 {
        let baseline = p.baseline_delay(counter);
        let bound = baseline * 15 / 100;
        for _ in 0..200 {
            let d = p.redelivery_delay_with_rng(counter, &mut rng);
            assert!(
                d.abs_diff(baseline) <= bound,
                "delay {} outside {}±{}",
                d,
                baseline,
                bound
            );
        }
    }
}

#[test]
fn jitter_goes_both_ways() {
    let p = RedeliveryPolicy::new()
        .initial_redelivery_delay(10_000)
        .collision_avoidance(50);
    let mut rng = StdRng::seed_from_u64(42);
    let samples: Vec<u64> = (0..500)
        .map(|_| p.redelivery_delay_with_rng(0, &mut rng))
        .collect();
    assert!(samples.iter().any(|&d| d < 10_000));
    assert!(samples.iter().any(|&d| d > 10_000));
}

#[test]
fn same_seed_same_delays() {
    let p = RedeliveryPolicy::new().collision_avoidance(20);
    let mut a = StdRng::seed_from_u64(1);
    let mut b = StdRng::seed_from_u64(1);
    for n in 0..5 {
        assert_eq!(
            p.redelivery_delay_with_rng(n, &mut a),
            p.redelivery_delay_with_rng(n, &mut b)
        );
    }
}

#[test]
fn full_jitter_never_goes_negative() {
    let p = RedeliveryPolicy::new()
        .initial_redelivery_delay(10)
        .collision_avoidance(100);
    let mut rng = StepRng::new(0, 0x1357_9bdf_2468_ace0);
    for _ in 0..100 {
        assert!(p.redelivery_delay_with_rng(0, &mut rng) <= 20);
    }
}

#[test]
fn zero_percent_means_no_jitter() {
    let mut p = RedeliveryPolicy::new().initial_redelivery_delay(300);
    p.use_collision_avoidance = true;
    p.collision_avoidance_percent = 0;
    let mut rng = StdRng::seed_from_u64(3);
    assert_eq!(p.redelivery_delay_with_rng(2, &mut rng), 300);
}
