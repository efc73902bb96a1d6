mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{Call, Harness, RecordingStore};
use parking_lot::Mutex;
use quire_core::body::{Block, Body};
use quire_core::config::SessionConfig;
use quire_core::event::Listener;
use quire_core::report::ErrorKind;
use quire_core::session::{
    CloseDecision, CloseState, DirtyState, OpenError, Session, SessionClosed, TitleSaved,
};
use quire_core::storage::OperationResult;
use tokio::time::sleep;

const QUIET: Duration = Duration::from_millis(1000);

fn ms(millis: u64) -> Duration {
    Duration::from_millis(millis)
}

fn paragraph(text: &str) -> Body {
    Body::new(vec![Block::paragraph(text)])
}

async fn scenario() -> (Harness, Session) {
    let harness = Harness::new(RecordingStore::scenario());
    let session = harness.open("n1").await;
    (harness, session)
}

#[tokio::test(start_paused = true)]
async fn open_loads_document_and_marks_it_open() {
    let (harness, session) = scenario().await;

    assert_eq!(session.id(), "n1");
    assert_eq!(session.title(), "Old");
    assert!(session.body().is_empty());
    assert_eq!(session.dirty_state(), DirtyState::default());
    assert_eq!(session.close_state(), CloseState::Open);
    assert_eq!(
        harness.store.calls(),
        vec![
            Call::GetDocument("n1".into()),
            Call::GetContent("n1".into()),
            Call::SetOpen("n1".into(), true),
        ]
    );
    assert!(harness.reporter.reports().is_empty());
}

#[tokio::test(start_paused = true)]
async fn unparseable_content_is_reported_once_and_starts_empty() {
    let store = RecordingStore::scenario();
    *store.content.lock() = Some("<p>legacy html</p>".into());
    let harness = Harness::new(store);

    let session = harness.open("n1").await;
    assert!(session.body().is_empty());
    assert_eq!(harness.reporter.kinds(), vec![ErrorKind::ParseFailure]);
}

#[tokio::test(start_paused = true)]
async fn missing_structured_content_falls_back_to_text() {
    let store = RecordingStore::scenario();
    store.document.lock().text_content = "first\n\nsecond".into();
    *store.content.lock() = None;
    let harness = Harness::new(store);

    let session = harness.open("n1").await;
    let expected = Body::new(vec![Block::paragraph("first"), Block::paragraph("second")]);
    assert_eq!(session.body(), expected);
}

#[tokio::test(start_paused = true)]
async fn open_fails_for_unknown_document_or_bad_timing() {
    let harness = Harness::new(RecordingStore::scenario());
    let result = Session::open("n2", harness.context()).await;
    assert!(matches!(result, Err(OpenError::Store(_))));
    assert_eq!(harness.reporter.kinds(), vec![ErrorKind::Failure]);

    let config = SessionConfig::default().with_grace_delay(ms(2000));
    let result = Session::open("n1", harness.context().with_config(config)).await;
    assert!(matches!(result, Err(OpenError::Config(_))));
    assert_eq!(harness.reporter.kinds().len(), 1, "bad timing is the caller's error");
}

#[tokio::test(start_paused = true)]
async fn rapid_edits_coalesce_into_one_save() {
    let (harness, session) = scenario().await;

    for text in ["H", "He", "Hel", "Hell", "Hello"] {
        session.edit_body(paragraph(text));
        sleep(ms(200)).await;
    }
    assert_eq!(session.dirty_state(), DirtyState { title_dirty: false, content_dirty: true });

    // Last edit was 200ms ago; the timer is due 800ms from now.
    sleep(ms(799)).await;
    assert!(harness.store.content_updates().is_empty());

    sleep(ms(2)).await;
    assert_eq!(harness.store.content_updates(), vec!["Hello".to_string()]);
    assert!(!session.dirty_state().is_any());

    sleep(QUIET * 3).await;
    assert_eq!(harness.store.content_updates().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn typed_title_is_renamed_after_quiet_period() {
    let (harness, session) = scenario().await;
    let saved = Arc::new(Mutex::new(Vec::new()));
    let _listener = Listener::new(&session.on().title_saved, {
        let saved = saved.clone();
        move |event: &TitleSaved| saved.lock().push(event.title.clone())
    });

    session.edit_title("New");
    assert!(session.dirty_state().title_dirty);

    sleep(QUIET + ms(1)).await;
    assert!(harness.store.calls().contains(&Call::Rename {
        id: "n1".into(),
        old: "Old".into(),
        new: "New".into(),
    }));
    assert_eq!(session.title(), "New");
    assert!(!session.dirty_state().is_any());
    assert_eq!(*saved.lock(), vec!["New".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn title_edit_during_rename_is_not_lost() {
    let (harness, session) = scenario().await;
    harness.store.set_delay(ms(300));

    session.edit_title("A");
    // Rename to "A" starts at 1000ms and completes at 1300ms.
    sleep(ms(1010)).await;
    assert_eq!(harness.store.renames(), vec![("Old".into(), "A".into())]);

    session.edit_title("B");
    sleep(ms(300)).await;
    assert_eq!(session.title(), "B");
    assert!(session.dirty_state().title_dirty);

    sleep(ms(1100)).await;
    assert_eq!(
        harness.store.renames(),
        vec![("Old".into(), "A".into()), ("A".into(), "B".into())]
    );
    assert_eq!(session.title(), "B");
    assert!(!session.dirty_state().title_dirty);
    assert_eq!(harness.store.document.lock().title, "B");
}

#[tokio::test(start_paused = true)]
async fn blank_title_reverts_without_calling_the_store() {
    let (harness, session) = scenario().await;

    session.edit_title("   ");
    sleep(QUIET + ms(1)).await;

    assert!(harness.store.renames().is_empty());
    assert_eq!(session.title(), "Old");
    assert_eq!(harness.store.document.lock().title, "Old");
    assert_eq!(harness.reporter.kinds(), vec![ErrorKind::Blank]);
    assert!(!session.dirty_state().title_dirty);
}

#[tokio::test(start_paused = true)]
async fn rejected_renames_revert_and_report() {
    let cases = [
        (OperationResult::Conflict, ErrorKind::Conflict),
        (OperationResult::Failure, ErrorKind::Failure),
        (OperationResult::Blank, ErrorKind::Failure),
    ];
    for (result, kind) in cases {
        let (harness, session) = scenario().await;
        harness.store.queue_rename_result(result);

        session.edit_title("Taken");
        sleep(QUIET + ms(1)).await;

        assert_eq!(session.title(), "Old");
        assert_eq!(harness.reporter.kinds(), vec![kind]);
        assert!(!session.dirty_state().title_dirty);

        // The next edit renames from the last title the store accepted.
        session.edit_title("Fresh");
        sleep(QUIET + ms(1)).await;
        assert_eq!(harness.store.renames().last(), Some(&("Old".into(), "Fresh".into())));
        assert_eq!(session.title(), "Fresh");
    }
}

#[tokio::test(start_paused = true)]
async fn content_failure_reports_once_and_keeps_body() {
    let (harness, session) = scenario().await;
    harness.store.set_content_result(OperationResult::Failure);

    session.edit_body(paragraph("draft"));
    sleep(QUIET + ms(1)).await;

    assert_eq!(harness.store.content_updates(), vec!["draft".to_string()]);
    assert_eq!(harness.reporter.kinds(), vec![ErrorKind::Failure]);
    assert_eq!(session.body(), paragraph("draft"));
    assert!(!session.dirty_state().content_dirty);
}

#[tokio::test(start_paused = true)]
async fn channels_fail_and_succeed_independently() {
    let (harness, session) = scenario().await;
    harness.store.queue_rename_result(OperationResult::Conflict);

    session.edit_title("Taken");
    session.edit_body(paragraph("kept"));
    sleep(QUIET + ms(1)).await;

    assert_eq!(session.title(), "Old");
    assert_eq!(harness.store.content_updates(), vec!["kept".to_string()]);
    assert_eq!(harness.reporter.kinds(), vec![ErrorKind::Conflict]);
    assert!(!session.dirty_state().is_any());
}

#[tokio::test(start_paused = true)]
async fn save_now_fires_pending_saves_immediately() {
    let (harness, session) = scenario().await;

    session.edit_title("Now");
    session.edit_body(paragraph("body"));
    session.save_now().await;

    assert_eq!(harness.store.renames(), vec![("Old".into(), "Now".into())]);
    assert_eq!(harness.store.content_updates(), vec!["body".to_string()]);
    assert!(!session.dirty_state().is_any());

    sleep(QUIET * 2).await;
    assert_eq!(harness.store.renames().len(), 1);
    assert_eq!(harness.store.content_updates().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn clean_close_proceeds_without_flush() {
    let (harness, session) = scenario().await;
    let closed = Arc::new(Mutex::new(Vec::new()));
    let _listener = Listener::new(&session.on().closed, {
        let closed = closed.clone();
        move |event: &SessionClosed| closed.lock().push(event.clone())
    });

    assert_eq!(session.request_close(), CloseDecision::Proceed);
    assert_eq!(session.close_state(), CloseState::Closed);
    session.closed().await;

    assert_eq!(harness.window.suppressed(), 0);
    assert_eq!(harness.window.closed(), 0);
    assert!(harness.store.update_alls().is_empty());
    assert_eq!(harness.store.calls().last(), Some(&Call::SetOpen("n1".into(), false)));
    assert_eq!(*closed.lock(), vec![SessionClosed { flushed: false }]);
}

#[tokio::test(start_paused = true)]
async fn dirty_close_flushes_exactly_once() {
    let (harness, session) = scenario().await;
    session.edit_title("New");

    assert_eq!(session.request_close(), CloseDecision::Suppressed);
    assert_eq!(harness.window.suppressed(), 1);
    assert_eq!(session.close_state(), CloseState::InterceptedDirty);
    assert!(!session.dirty_state().is_any());

    // Second signal while the flush is pending: suppressed again, nothing new scheduled.
    assert_eq!(session.request_close(), CloseDecision::AlreadyClosing);
    assert_eq!(harness.window.suppressed(), 2);

    session.closed().await;
    assert_eq!(session.close_state(), CloseState::Closed);
    assert_eq!(
        harness.store.update_alls(),
        vec![Call::UpdateAll {
            id: "n1".into(),
            title: "New".into(),
            text: String::new(),
            structured: Body::default().to_structured().unwrap(),
        }]
    );
    // The debounced rename never ran.
    assert!(harness.store.renames().is_empty());
    assert_eq!(harness.store.calls().last(), Some(&Call::SetOpen("n1".into(), false)));
    assert_eq!(harness.window.closed(), 1);

    // The real close re-delivers the signal; it passes through now.
    assert_eq!(session.request_close(), CloseDecision::AlreadyClosed);
    assert_eq!(harness.window.suppressed(), 2);

    sleep(QUIET * 2).await;
    assert_eq!(harness.store.update_alls().len(), 1);
    assert!(harness.reporter.reports().is_empty());
}

#[tokio::test(start_paused = true)]
async fn flush_waits_for_grace_delay() {
    let (harness, session) = scenario().await;
    session.edit_body(paragraph("late"));
    session.request_close();

    sleep(ms(99)).await;
    assert!(harness.store.update_alls().is_empty());
    assert_eq!(harness.window.closed(), 0);

    sleep(ms(2)).await;
    assert_eq!(harness.store.update_alls().len(), 1);
    assert_eq!(harness.window.closed(), 1);
}

#[tokio::test(start_paused = true)]
async fn edits_after_interception_are_flushed_not_debounced() {
    let (harness, session) = scenario().await;
    session.edit_body(paragraph("first"));
    session.request_close();

    session.edit_body(paragraph("second"));
    assert!(!session.dirty_state().is_any());

    session.closed().await;
    sleep(QUIET * 2).await;
    assert!(harness.store.content_updates().is_empty());
    let structured = paragraph("second").to_structured().unwrap();
    assert_eq!(
        harness.store.update_alls(),
        vec![Call::UpdateAll {
            id: "n1".into(),
            title: "Old".into(),
            text: "second".into(),
            structured,
        }]
    );
}

#[tokio::test(start_paused = true)]
async fn failed_flush_is_reported_and_still_closes() {
    let (harness, session) = scenario().await;
    harness.store.set_update_all_result(OperationResult::Failure);
    session.edit_body(paragraph("unsaved"));

    session.request_close();
    session.closed().await;

    assert_eq!(harness.reporter.kinds(), vec![ErrorKind::Failure]);
    assert_eq!(harness.window.closed(), 1);
    assert_eq!(harness.store.update_alls().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn flush_conflict_is_reported_as_conflict() {
    let (harness, session) = scenario().await;
    harness.store.set_update_all_result(OperationResult::Conflict);
    session.edit_title("Taken");

    session.request_close();
    session.closed().await;

    assert_eq!(harness.reporter.kinds(), vec![ErrorKind::Conflict]);
    assert_eq!(harness.window.closed(), 1);
}

#[tokio::test(start_paused = true)]
async fn flush_keeps_last_good_title_when_blank() {
    let (harness, session) = scenario().await;
    session.edit_title("  ");

    session.request_close();
    session.closed().await;

    match harness.store.update_alls().as_slice() {
        [Call::UpdateAll { title, .. }] => assert_eq!(title, "Old"),
        other => panic!("expected one update_all, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn in_flight_save_during_close_does_not_resurrect_dirty_flag() {
    let (harness, session) = scenario().await;
    harness.store.set_delay(ms(300));

    session.edit_body(paragraph("one"));
    sleep(QUIET + ms(10)).await;
    assert_eq!(harness.store.content_updates().len(), 1);

    session.edit_title("Two");
    assert_eq!(session.request_close(), CloseDecision::Suppressed);

    session.closed().await;
    assert!(!session.dirty_state().is_any());
    assert_eq!(harness.store.update_alls().len(), 1);
    assert!(harness.store.renames().is_empty());
}

#[tokio::test(start_paused = true)]
async fn flush_waits_for_in_flight_save_and_writes_last_edit() {
    let (harness, session) = scenario().await;
    harness.store.set_content_delay(ms(500));
    harness.store.set_update_all_delay(ms(50));

    session.edit_body(paragraph("one"));
    // update_content("one") is running until 1500ms.
    sleep(QUIET + ms(10)).await;
    assert_eq!(harness.store.content_updates(), vec!["one".to_string()]);

    session.edit_body(paragraph("two"));
    assert_eq!(session.request_close(), CloseDecision::Suppressed);
    session.closed().await;

    assert_eq!(harness.store.max_in_flight(), 1);
    assert_eq!(harness.store.document.lock().text_content, "two");
    assert_eq!(harness.store.update_alls().len(), 1);
    assert_eq!(harness.window.closed(), 1);
    assert!(harness.reporter.reports().is_empty());
}

#[tokio::test(start_paused = true)]
async fn slow_saves_on_one_channel_do_not_overlap() {
    let (harness, session) = scenario().await;
    harness.store.set_content_delay(ms(1500));

    session.edit_body(paragraph("one"));
    sleep(QUIET + ms(10)).await;
    session.edit_body(paragraph("two"));
    // The second timer fires at 2010ms while the first save runs until 2500ms.
    sleep(QUIET * 4).await;

    assert_eq!(harness.store.content_updates(), vec!["one".to_string(), "two".to_string()]);
    assert_eq!(harness.store.max_in_flight(), 1);
    assert_eq!(harness.store.document.lock().text_content, "two");
    assert!(!session.dirty_state().is_any());
}
