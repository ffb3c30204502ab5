use gridguide_domain_timing::{
    GuideOnset, NoteHistory, NoteTimingClassifier, PlayedNoteEvent, TimingThresholds,
};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{self, Instant};

fn classifier(delayed_ms: u64, missed_ms: u64) -> (Arc<NoteHistory>, Arc<NoteTimingClassifier>) {
    let history = Arc::new(NoteHistory::new(256));
    let classifier = Arc::new(NoteTimingClassifier::new(
        history.clone(),
        TimingThresholds::from_millis(delayed_ms, missed_ms),
    ));
    (history, classifier)
}

fn play_later(history: &Arc<NoteHistory>, note: u8, after: Duration) {
    let history = history.clone();
    tokio::spawn(async move {
        time::sleep(after).await;
        history.append(PlayedNoteEvent {
            at: Instant::now(),
            note,
        });
    });
}

#[tokio::test(start_paused = true)]
async fn early_note_within_tolerance_resolves_immediately() {
    let (history, classifier) = classifier(50, 200);
    history.append(PlayedNoteEvent {
        at: Instant::now(),
        note: 60,
    });
    time::advance(Duration::from_millis(30)).await;

    let started = Instant::now();
    let result = classifier
        .classify(GuideOnset {
            note: 60,
            at: Instant::now(),
        })
        .await;

    assert_eq!(result.offset_ms, Some(-30));
    assert_eq!(result.identifier, "C4");
    assert_eq!(started.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn late_note_resolves_once_polled() {
    let (history, classifier) = classifier(50, 200);
    play_later(&history, 60, Duration::from_millis(40));

    let onset = GuideOnset {
        note: 60,
        at: Instant::now(),
    };
    let result = classifier.classify(onset).await;

    assert_eq!(result.offset_ms, Some(40));
    let waited = onset.at.elapsed();
    assert!(waited >= Duration::from_millis(40), "waited {waited:?}");
    assert!(waited < Duration::from_millis(200), "waited {waited:?}");
}

#[tokio::test(start_paused = true)]
async fn no_note_resolves_missed_after_threshold() {
    let (history, classifier) = classifier(50, 200);
    play_later(&history, 61, Duration::from_millis(20));

    let onset = GuideOnset {
        note: 60,
        at: Instant::now(),
    };
    let result = classifier.classify(onset).await;

    assert_eq!(result.offset_ms, None);
    assert!(result.is_missed());
    let waited = onset.at.elapsed();
    assert!(waited >= Duration::from_millis(200));
    assert!(waited <= Duration::from_millis(200) + Duration::from_millis(13));
}

#[tokio::test(start_paused = true)]
async fn early_candidate_is_used_when_nothing_better_follows() {
    let (history, classifier) = classifier(50, 200);
    history.append(PlayedNoteEvent {
        at: Instant::now(),
        note: 64,
    });
    time::advance(Duration::from_millis(120)).await;

    let onset = GuideOnset {
        note: 64,
        at: Instant::now(),
    };
    let result = classifier.classify(onset).await;

    assert_eq!(result.offset_ms, Some(-120));
    let waited = onset.at.elapsed();
    assert!(waited >= Duration::from_millis(120));
    assert!(waited < Duration::from_millis(200));
}

#[tokio::test(start_paused = true)]
async fn closer_late_note_beats_early_candidate() {
    let (history, classifier) = classifier(50, 200);
    history.append(PlayedNoteEvent {
        at: Instant::now(),
        note: 64,
    });
    time::advance(Duration::from_millis(150)).await;
    play_later(&history, 64, Duration::from_millis(70));

    let result = classifier
        .classify(GuideOnset {
            note: 64,
            at: Instant::now(),
        })
        .await;

    assert_eq!(result.offset_ms, Some(70));
}

#[tokio::test(start_paused = true)]
async fn note_older_than_missed_window_is_ignored() {
    let (history, classifier) = classifier(50, 200);
    history.append(PlayedNoteEvent {
        at: Instant::now(),
        note: 64,
    });
    time::advance(Duration::from_millis(250)).await;

    let result = classifier
        .classify(GuideOnset {
            note: 64,
            at: Instant::now(),
        })
        .await;

    assert_eq!(result.offset_ms, None);
}

#[tokio::test(start_paused = true)]
async fn concurrent_classifications_resolve_independently() {
    let (history, classifier) = classifier(50, 200);
    play_later(&history, 60, Duration::from_millis(10));
    play_later(&history, 67, Duration::from_millis(90));

    let now = Instant::now();
    let first = classifier.clone();
    let second = classifier.clone();
    let (a, b) = tokio::join!(
        first.classify(GuideOnset { note: 60, at: now }),
        second.classify(GuideOnset { note: 67, at: now }),
    );

    assert_eq!(a.offset_ms, Some(10));
    assert_eq!(b.offset_ms, Some(90));
}
