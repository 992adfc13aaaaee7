use super::*;

#[test]
fn test_state_machine() {
    let tracker = ProgressTracker::new();
    assert_eq!(tracker.snapshot(), (RunStatus::Idle, 0));

    tracker.try_begin().unwrap();
    assert_eq!(tracker.status(), RunStatus::Running);

    tracker.advance(100);
    tracker.advance(50);
    assert_eq!(tracker.records_processed(), 150);

    tracker.finish(RunStatus::Completed);
    assert_eq!(tracker.snapshot(), (RunStatus::Completed, 150));
}

#[test]
fn test_busy_rejection() {
    let tracker = ProgressTracker::new();
    tracker.try_begin().unwrap();
    assert_eq!(tracker.try_begin(), Err(EngineError::Busy));

    // A terminal run can be restarted, and restarting resets the counter.
    tracker.advance(7);
    tracker.finish(RunStatus::Failed);
    tracker.try_begin().unwrap();
    assert_eq!(tracker.snapshot(), (RunStatus::Running, 0));
}

#[test]
fn test_terminal_states() {
    assert!(!RunStatus::Idle.is_terminal());
    assert!(!RunStatus::Running.is_terminal());
    assert!(RunStatus::Completed.is_terminal());
    assert!(RunStatus::Failed.is_terminal());
}
