use crate::classifier::{TimingClass, TimingResult, TimingThresholds};
use serde::Serialize;
use std::fmt;
use tokio::time::Instant;

const IN_TIME_POINTS: f64 = 1000.0;
const OFF_TIME_POINTS: f64 = 250.0;
const ACCIDENTAL_PENALTY: f64 = 2000.0;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AggregatedStats {
    pub notes_played: usize,
    pub guide_notes: usize,
    pub in_time: usize,
    pub early: usize,
    pub late: usize,
    pub missed: usize,
    /// Played notes with no guide note attributed to them.
    pub accidental: usize,
    /// Mean |offset| over matched guide notes.
    pub avg_timing_offset_ms: i64,
    pub in_time_ratio: f64,
    pub early_ratio: f64,
    pub late_ratio: f64,
    pub missed_ratio: f64,
    pub accidental_ratio: f64,
    /// 0..=1000
    pub score: i64,
}

pub struct StatisticsAggregator {
    thresholds: TimingThresholds,
    batch: Vec<TimingResult>,
}

impl StatisticsAggregator {
    pub fn new(thresholds: TimingThresholds) -> Self {
        Self {
            thresholds,
            batch: Vec::new(),
        }
    }

    pub fn record(&mut self, result: TimingResult) {
        self.batch.push(result);
    }

    pub fn len(&self) -> usize {
        self.batch.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batch.is_empty()
    }

    pub fn last_recorded_at(&self) -> Option<Instant> {
        self.batch.last().map(|result| result.observed_at)
    }

    pub fn clear(&mut self) {
        self.batch.clear();
    }

    pub fn compute(&self, notes_played: usize) -> AggregatedStats {
        let mut in_time = 0;
        let mut early = 0;
        let mut late = 0;
        let mut missed = 0;
        let mut offset_sum: u64 = 0;
        let mut offset_count: u64 = 0;

        for result in &self.batch {
            let class = self.thresholds.classify(result.offset_ms);
            match class {
                TimingClass::InTime => in_time += 1,
                TimingClass::Early => early += 1,
                TimingClass::Late => late += 1,
                TimingClass::Missed => missed += 1,
            }
            if class != TimingClass::Missed {
                if let Some(offset) = result.offset_ms {
                    offset_sum += offset.unsigned_abs();
                    offset_count += 1;
                }
            }
        }

        let accidental = notes_played.saturating_sub(in_time + early + late + missed);
        let denominator = notes_played.max(1) as f64;
        let ratio = |count: usize| count as f64 / denominator;

        let score = (ratio(in_time) * IN_TIME_POINTS).round() as i64
            + (ratio(early) * OFF_TIME_POINTS).round() as i64
            + (ratio(late) * OFF_TIME_POINTS).round() as i64
            - (ratio(accidental) * ACCIDENTAL_PENALTY).round() as i64;

        AggregatedStats {
            notes_played,
            guide_notes: self.batch.len(),
            in_time,
            early,
            late,
            missed,
            accidental,
            avg_timing_offset_ms: (offset_sum as f64 / offset_count.max(1) as f64).round() as i64,
            in_time_ratio: ratio(in_time),
            early_ratio: ratio(early),
            late_ratio: ratio(late),
            missed_ratio: ratio(missed),
            accidental_ratio: ratio(accidental),
            score: score.max(0),
        }
    }
}

impl fmt::Display for AggregatedStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "score {}/1000 | avg offset {}ms",
            self.score, self.avg_timing_offset_ms
        )?;
        writeln!(f, "  {:<16}{:>6}", "notes played", self.notes_played)?;
        let rows = [
            ("in time", self.in_time, self.in_time_ratio),
            ("early", self.early, self.early_ratio),
            ("late", self.late, self.late_ratio),
            ("missed", self.missed, self.missed_ratio),
            ("accidental", self.accidental, self.accidental_ratio),
        ];
        for (label, count, ratio) in rows {
            writeln!(f, "  {:<16}{:>6}{:>6.0}%", label, count, ratio * 100.0)?;
        }
        Ok(())
    }
}
