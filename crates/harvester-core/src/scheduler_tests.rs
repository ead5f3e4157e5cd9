use super::*;
use once_cell::sync::OnceCell;

type Runs = Arc<Mutex<Vec<String>>>;

fn recording(frames: &Arc<ManualFrames>) -> (Arc<ChangeScheduler>, Runs) {
    let runs: Runs = Arc::new(Mutex::new(Vec::new()));
    let sink = runs.clone();
    let scheduler = ChangeScheduler::new(
        frames.clone(),
        Box::new(move |reason: &str| sink.lock().push(reason.to_string())),
    );
    (scheduler, runs)
}

#[test]
fn test_requests_coalesce_into_one_run() {
    let frames = ManualFrames::new();
    let (scheduler, runs) = recording(&frames);

    assert!(scheduler.request("mutation"));
    assert!(!scheduler.request("mutation"));
    assert!(!scheduler.request("input"));
    assert!(scheduler.pending());
    assert_eq!(frames.queued(), 1);

    assert_eq!(frames.run_frame(), 1);
    assert!(!scheduler.pending());
    assert_eq!(*runs.lock(), vec!["input".to_string()]);

    // Nothing requested: an empty frame runs nothing.
    assert_eq!(frames.run_frame(), 0);
    assert_eq!(runs.lock().len(), 1);
}

#[test]
fn test_request_after_run_schedules_again() {
    let frames = ManualFrames::new();
    let (scheduler, runs) = recording(&frames);

    scheduler.request("a");
    frames.run_frame();
    assert!(scheduler.request("b"));
    frames.run_frame();
    assert_eq!(*runs.lock(), vec!["a".to_string(), "b".to_string()]);
}

#[test]
fn test_reentrant_request_goes_to_next_frame() {
    let frames = ManualFrames::new();
    let cell: Arc<OnceCell<Weak<ChangeScheduler>>> = Arc::new(OnceCell::new());
    let runs: Runs = Arc::new(Mutex::new(Vec::new()));

    let (sink, handle) = (runs.clone(), cell.clone());
    let scheduler = ChangeScheduler::new(
        frames.clone(),
        Box::new(move |reason: &str| {
            sink.lock().push(reason.to_string());
            if reason == "first" {
                if let Some(scheduler) = handle.get().and_then(Weak::upgrade) {
                    assert!(scheduler.request("again"));
                }
            }
        }),
    );
    cell.set(Arc::downgrade(&scheduler)).ok();

    scheduler.request("first");
    assert_eq!(frames.run_frame(), 1);
    assert_eq!(*runs.lock(), vec!["first".to_string()]);
    assert!(scheduler.pending());

    assert_eq!(frames.run_frame(), 1);
    assert_eq!(*runs.lock(), vec!["first".to_string(), "again".to_string()]);
    assert_eq!(frames.run_until_idle(10), 0);
}

#[test]
fn test_request_during_run_waits_for_run_to_return() {
    let frames = ManualFrames::new();
    let cell: Arc<OnceCell<Weak<ChangeScheduler>>> = Arc::new(OnceCell::new());
    let observed: Arc<Mutex<Vec<(bool, usize)>>> = Arc::new(Mutex::new(Vec::new()));

    let (handle, seen, host) = (cell.clone(), observed.clone(), frames.clone());
    let scheduler = ChangeScheduler::new(
        frames.clone(),
        Box::new(move |reason: &str| {
            let Some(scheduler) = handle.get().and_then(Weak::upgrade) else {
                return;
            };
            if reason == "first" {
                assert!(scheduler.is_running());
                assert!(scheduler.request("typed"));
                assert!(!scheduler.request("clicked"));
                // No frame is requested while the run is still in progress.
                seen.lock().push((scheduler.pending(), host.queued()));
            }
        }),
    );
    cell.set(Arc::downgrade(&scheduler)).ok();

    scheduler.request("first");
    frames.run_frame();
    assert_eq!(*observed.lock(), vec![(true, 0)]);
    assert!(!scheduler.is_running());
    assert_eq!(frames.queued(), 1);
}

#[test]
fn test_deferred_run_carries_last_reason() {
    let frames = ManualFrames::new();
    let cell: Arc<OnceCell<Weak<ChangeScheduler>>> = Arc::new(OnceCell::new());
    let runs: Runs = Arc::new(Mutex::new(Vec::new()));

    let (sink, handle) = (runs.clone(), cell.clone());
    let scheduler = ChangeScheduler::new(
        frames.clone(),
        Box::new(move |reason: &str| {
            sink.lock().push(reason.to_string());
            if reason == "first" {
                if let Some(scheduler) = handle.get().and_then(Weak::upgrade) {
                    scheduler.request("value");
                    scheduler.request("activated");
                }
            }
        }),
    );
    cell.set(Arc::downgrade(&scheduler)).ok();

    scheduler.request("first");
    assert_eq!(frames.run_until_idle(10), 2);
    assert_eq!(
        *runs.lock(),
        vec!["first".to_string(), "activated".to_string()]
    );
}

#[test]
fn test_panicking_run_releases_scheduler() {
    let frames = ManualFrames::new();
    let scheduler = ChangeScheduler::new(
        frames.clone(),
        Box::new(|reason: &str| {
            if reason == "boom" {
                panic!("run failed");
            }
        }),
    );

    scheduler.request("boom");
    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| frames.run_frame()));
    assert!(result.is_err());
    assert!(!scheduler.is_running());
    assert!(scheduler.request("again"));
    assert_eq!(frames.queued(), 1);
}

/// Fires every frame on its own OS thread, like a multi-threaded runtime.
struct ThreadFrames;

impl FrameHost for ThreadFrames {
    fn request_frame(&self, callback: FrameCallback) {
        std::thread::spawn(callback);
    }
}

#[test]
fn test_runs_never_overlap_on_threaded_host() {
    use std::sync::atomic::AtomicUsize;

    let active = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let total = Arc::new(AtomicUsize::new(0));

    let (a, p, t) = (active.clone(), peak.clone(), total.clone());
    let scheduler = ChangeScheduler::new(
        Arc::new(ThreadFrames),
        Box::new(move |_reason: &str| {
            let now = a.fetch_add(1, Ordering::SeqCst) + 1;
            p.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(20));
            t.fetch_add(1, Ordering::SeqCst);
            a.fetch_sub(1, Ordering::SeqCst);
        }),
    );

    for i in 0..10 {
        scheduler.request(&format!("tick-{i}"));
        std::thread::sleep(Duration::from_millis(5));
    }
    for _ in 0..200 {
        if !scheduler.pending() && !scheduler.is_running() {
            break;
        }
        std::thread::sleep(Duration::from_millis(10));
    }

    assert_eq!(peak.load(Ordering::SeqCst), 1);
    assert!(total.load(Ordering::SeqCst) >= 2);
    assert!(!scheduler.pending());
}

#[test]
fn test_close_turns_pending_frame_into_noop() {
    let frames = ManualFrames::new();
    let (scheduler, runs) = recording(&frames);

    scheduler.request("a");
    scheduler.close();
    assert!(!scheduler.request("b"));
    frames.run_frame();
    assert!(runs.lock().is_empty());
    assert!(scheduler.is_closed());
}

#[test]
fn test_dropped_scheduler_frame_is_noop() {
    let frames = ManualFrames::new();
    let (scheduler, runs) = recording(&frames);
    scheduler.request("a");
    drop(scheduler);
    assert_eq!(frames.run_frame(), 1);
    assert!(runs.lock().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_tokio_frames_fire_after_interval() {
    let frames = Arc::new(TokioFrames::current(Duration::from_millis(16)).unwrap());
    let runs: Runs = Arc::new(Mutex::new(Vec::new()));
    let sink = runs.clone();
    let scheduler = ChangeScheduler::new(
        frames,
        Box::new(move |reason: &str| sink.lock().push(reason.to_string())),
    );

    for i in 0..5 {
        scheduler.request(&format!("burst-{i}"));
    }
    assert!(runs.lock().is_empty());

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(*runs.lock(), vec!["burst-4".to_string()]);
    assert!(!scheduler.pending());
}

#[test]
fn test_tokio_frames_need_runtime() {
    assert!(matches!(
        TokioFrames::current(Duration::from_millis(16)),
        Err(HarvestError::NoRuntime(_))
    ));
}
