//! Event and filesystem assertions shared by integration tests

use model_poller::Event;
use std::path::Path;
use std::time::Duration;
use tokio::sync::broadcast;

/// Wait for the first event matching `predicate`
///
/// Panics on timeout or if the channel closes first.
pub async fn wait_for_event<F>(
    events: &mut broadcast::Receiver<Event>,
    timeout: Duration,
    mut predicate: F,
) -> Event
where
    F: FnMut(&Event) -> bool,
{
    let result = tokio::time::timeout(timeout, async {
        loop {
            match events.recv().await {
                Ok(event) if predicate(&event) => return event,
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => {
                    panic!("event channel closed before the expected event")
                }
            }
        }
    })
    .await;

    match result {
        Ok(event) => event,
        Err(_) => panic!("timed out after {timeout:?} waiting for event"),
    }
}

/// Assert that `dir` contains no entries
pub fn assert_dir_empty(dir: &Path) {
    let entries: Vec<_> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    assert!(entries.is_empty(), "expected {dir:?} to be empty, found {entries:?}");
}

/// Assert a file exists with the given content
pub fn assert_file_content(path: &Path, expected: &[u8]) {
    let actual = std::fs::read(path).unwrap_or_else(|e| panic!("failed to read {path:?}: {e}"));
    assert_eq!(actual, expected, "unexpected content in {path:?}");
}
