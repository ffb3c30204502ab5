use gridguide_domain_timing::{StatisticsAggregator, TimingResult, TimingThresholds};
use pretty_assertions::assert_eq;
use std::time::Duration;
use tokio::time::Instant;

fn result(offset_ms: Option<i64>, observed_at: Instant) -> TimingResult {
    TimingResult {
        note: 60,
        identifier: "C4".to_string(),
        observed_at,
        offset_ms,
    }
}

fn aggregator_with(offsets: &[Option<i64>]) -> StatisticsAggregator {
    let mut aggregator = StatisticsAggregator::new(TimingThresholds::from_millis(50, 200));
    let base = Instant::now();
    for (i, offset) in offsets.iter().enumerate() {
        aggregator.record(result(*offset, base + Duration::from_millis(i as u64 * 100)));
    }
    aggregator
}

#[test]
fn mixed_batch_scores_by_category() {
    let offsets = [
        Some(0),
        Some(10),
        Some(-20),
        Some(30),
        Some(-40),
        Some(50),
        Some(-120),
        Some(-60),
        Some(150),
        None,
    ];
    let stats = aggregator_with(&offsets).compute(10);

    assert_eq!(stats.in_time, 6);
    assert_eq!(stats.early, 2);
    assert_eq!(stats.late, 1);
    assert_eq!(stats.missed, 1);
    assert_eq!(stats.accidental, 0);
    assert_eq!(stats.guide_notes, 10);
    // 1000 * 0.6 + 250 * 0.2 + 250 * 0.1 - 2000 * 0
    assert_eq!(stats.score, 675);
    assert_eq!(stats.avg_timing_offset_ms, 53);
    assert!((stats.in_time_ratio - 0.6).abs() < 1e-9);
    assert!((stats.missed_ratio - 0.1).abs() < 1e-9);
}

#[test]
fn offsets_beyond_missed_threshold_count_as_missed() {
    let stats = aggregator_with(&[Some(250), Some(-300)]).compute(2);
    assert_eq!(stats.missed, 2);
    assert_eq!(stats.avg_timing_offset_ms, 0);
}

#[test]
fn extra_played_notes_are_accidental_and_score_clamps_at_zero() {
    let stats = aggregator_with(&[Some(0), Some(5)]).compute(10);

    assert_eq!(stats.accidental, 8);
    assert!((stats.accidental_ratio - 0.8).abs() < 1e-9);
    assert_eq!(stats.score, 0);
}

#[test]
fn zero_notes_played_uses_unit_denominator() {
    let stats = aggregator_with(&[None, None]).compute(0);

    assert_eq!(stats.missed, 2);
    assert_eq!(stats.accidental, 0);
    assert!((stats.missed_ratio - 2.0).abs() < 1e-9);
    assert_eq!(stats.score, 0);
}

#[test]
fn perfect_take_scores_1000() {
    let stats = aggregator_with(&[Some(0), Some(-3), Some(8), Some(12)]).compute(4);
    assert_eq!(stats.score, 1000);
}

#[test]
fn clear_empties_batch() {
    let mut aggregator = aggregator_with(&[Some(0)]);
    assert_eq!(aggregator.len(), 1);
    assert!(aggregator.last_recorded_at().is_some());

    aggregator.clear();
    assert!(aggregator.is_empty());
    assert_eq!(aggregator.last_recorded_at(), None);
    assert_eq!(aggregator.compute(0).score, 0);
}

#[test]
fn summary_lists_every_category() {
    let text = aggregator_with(&[Some(0), None]).compute(2).to_string();
    assert!(text.contains("score 500/1000"));
    for label in ["in time", "early", "late", "missed", "accidental"] {
        assert!(text.contains(label), "missing {label}");
    }
}
