use std::sync::{Arc, Mutex};

use invupload_exec::*;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Event {
    Status(String),
    Line(String),
    Close,
}

/// Records every call made on the sinks it hands out
#[derive(Default)]
struct Recorder {
    events: Arc<Mutex<Vec<Event>>>,
}

struct RecordingSink {
    events: Arc<Mutex<Vec<Event>>>,
}

impl ProgressRegistry for Recorder {
    fn register(&self, _label: &str) -> Arc<dyn ProgressSink> {
        Arc::new(RecordingSink {
            events: Arc::clone(&self.events),
        })
    }
}

impl ProgressSink for RecordingSink {
    fn set_status(&self, status: String) {
        self.events.lock().unwrap().push(Event::Status(status));
    }

    fn write_line(&self, line: String) {
        self.events.lock().unwrap().push(Event::Line(line));
    }

    fn close(&self) {
        self.events.lock().unwrap().push(Event::Close);
    }
}

impl Recorder {
    fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    fn lines(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Line(line) => Some(line),
                _ => None,
            })
            .collect()
    }

    fn close_count(&self) -> usize {
        self.events().iter().filter(|e| **e == Event::Close).count()
    }
}

#[tokio::test]
async fn test_lines_then_single_close() {
    let recorder = Recorder::default();
    let mut process = ShellProcess::new(["sh", "-c", "for i in 1 2 3 4 5; do echo line$i; done"]);

    let outcome = process.run("generate", &recorder).await.unwrap();
    assert!(outcome.success());

    assert_eq!(recorder.lines(), vec!["line1", "line2", "line3", "line4", "line5"]);
    assert_eq!(recorder.close_count(), 1);

    let events = recorder.events();
    assert_eq!(events.last(), Some(&Event::Close));
    assert!(matches!(&events[0], Event::Status(s) if s.starts_with("Running in pid ")));
    // final status comes after every line and before close
    assert_eq!(
        events[events.len() - 2],
        Event::Status(outcome.status.clone())
    );
}

#[tokio::test]
async fn test_non_zero_exit_closes_once() {
    let recorder = Recorder::default();
    let mut process = ShellProcess::new(["sh", "-c", "echo partial; exit 3"]);

    let outcome = process.run("upload", &recorder).await.unwrap();

    assert_eq!(outcome.code, Some(3));
    assert_eq!(recorder.lines(), vec!["partial"]);
    assert_eq!(recorder.close_count(), 1);
}

#[tokio::test]
async fn test_spawn_failure_closes_once() {
    let recorder = Recorder::default();
    let mut process = ShellProcess::new(["/nonexistent/invupload-upload"]);

    assert!(process.run("upload", &recorder).await.is_err());

    let events = recorder.events();
    assert_eq!(events.len(), 2);
    assert!(matches!(&events[0], Event::Status(s) if s.starts_with("failed: ")));
    assert_eq!(events[1], Event::Close);
}

#[tokio::test]
async fn test_invalid_utf8_keeps_child_running() {
    let recorder = Recorder::default();
    let mut process = ShellProcess::new(["sh", "-c", "printf 'caf\\351\\n'; echo after"]);

    let outcome = process.run("generate", &recorder).await.unwrap();

    assert!(outcome.success());
    assert_eq!(recorder.lines(), vec!["caf\u{FFFD}", "after"]);
    assert_eq!(recorder.close_count(), 1);
}

#[tokio::test]
async fn test_timeout_leaves_terminal_status() {
    let recorder = Recorder::default();
    let mut process = ShellProcess::new(["sh", "-c", "sleep 5"])
        .with_timeout(std::time::Duration::from_millis(200));

    assert!(process.run("generate", &recorder).await.is_err());

    let events = recorder.events();
    assert_eq!(events.last(), Some(&Event::Close));
    assert_eq!(recorder.close_count(), 1);
    match &events[events.len() - 2] {
        Event::Status(status) => assert!(status.contains("timed out"), "{status}"),
        other => panic!("expected final status, got {other:?}"),
    }
}

#[tokio::test]
async fn test_progress_visible_before_exit() {
    let registry = MemoryProgress::new();
    let reader = registry.clone();
    let mut process = ShellProcess::new(["sh", "-c", "echo first; sleep 1; echo second"]);

    let handle = tokio::spawn(async move { process.run("live", &registry).await });

    let mut seen_early = false;
    for _ in 0..50 {
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        if let Some(output) = reader.get("live") {
            let snapshot = output.snapshot();
            if snapshot.lines == vec!["first"] && !snapshot.closed {
                seen_early = true;
                break;
            }
        }
    }

    let outcome = handle.await.unwrap().unwrap();
    assert!(outcome.success());
    assert!(seen_early, "first line was not visible while running");
    assert!(reader.get("live").unwrap().is_closed());
}
