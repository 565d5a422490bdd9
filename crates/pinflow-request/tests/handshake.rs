//! End-to-end tests of the request/accept/commit handshake.

use std::sync::{Arc, Barrier, Mutex};
use std::thread;

use pinflow_core::{
    ComponentName, Item, ItemId, ItemText, LaunchIntent, OptionValue, PackageName, PinError,
    RequestOptions, UserId,
};
use pinflow_request::{
    Collaborators, ConfirmIntent, DefaultLauncherLocator, LaunchError, PinItemCallback,
    PinRequestProcessor, ProcessorConfig, RecordingLauncher, ResultChannel, SessionTable,
    StaticDirectory, StringTable, SurfaceLauncher, ThreadCallerIdentity, TokenHandle,
};
use pinflow_store::{ApproverKey, ItemStore, PinKey};

const PUBLISHER: &str = "com.example.mail";
const LAUNCHER: &str = "com.example.launcher";
const USER: UserId = UserId(0);

struct World {
    processor: PinRequestProcessor,
    store: Arc<ItemStore>,
    launcher: Arc<RecordingLauncher>,
    sessions: Arc<SessionTable>,
    directory: Arc<StaticDirectory>,
    strings: Arc<StringTable>,
}

fn world_with_launcher(
    launcher: Arc<dyn SurfaceLauncher>,
    recording: Arc<RecordingLauncher>,
) -> World {
    let directory = Arc::new(StaticDirectory::new());
    directory.set_default_launcher(USER, Some(ComponentName::new(LAUNCHER, "Home")));
    directory.set_confirmation_activity(USER, ComponentName::new(LAUNCHER, "ConfirmPin"));

    let store = Arc::new(ItemStore::new());
    let sessions = Arc::new(SessionTable::with_unlocked([USER]));
    let strings = Arc::new(StringTable::new());
    let collaborators = Collaborators {
        locator: Arc::new(DefaultLauncherLocator::new(directory.clone())),
        sessions: sessions.clone(),
        launcher,
        identity: Arc::new(ThreadCallerIdentity),
        resources: strings.clone(),
    };
    let config = ProcessorConfig {
        strict_verification: true,
        ..ProcessorConfig::default()
    };

    World {
        processor: PinRequestProcessor::new(store.clone(), collaborators, config),
        store,
        launcher: recording,
        sessions,
        directory,
        strings,
    }
}

fn world() -> World {
    let launcher = Arc::new(RecordingLauncher::new());
    world_with_launcher(launcher.clone(), launcher)
}

fn candidate(id: &str) -> Item {
    Item::builder(PUBLISHER, USER, id)
        .short_label(ItemText::literal("Compose"))
        .intent(LaunchIntent::new("com.example.mail.COMPOSE"))
        .icon(pinflow_core::Icon::Resource { id: 0x7f02_0001 })
        .build()
}

fn approver() -> ApproverKey {
    ApproverKey::new(LAUNCHER, USER, USER)
}

fn package() -> PackageName {
    PackageName::new(PUBLISHER)
}

impl World {
    fn last_handle(&self) -> TokenHandle {
        self.launcher
            .last()
            .expect("a confirmation surface was launched")
            .0
            .request
            .handle
    }

    fn item(&self, id: &str) -> Option<Item> {
        self.store
            .lock()
            .unwrap()
            .find_by_id(&package(), USER, &ItemId::new(id))
            .cloned()
    }

    fn is_pinned_by_approver(&self, id: &str) -> bool {
        self.store
            .lock()
            .unwrap()
            .approver_record(&approver())
            .is_some_and(|record| record.contains(&PinKey::new(PUBLISHER, USER, id)))
    }

    fn add_dynamic(&self, item: Item) {
        self.store.lock().unwrap().upsert_dynamic(item);
    }

    fn pin_directly(&self, id: &str) {
        let mut guard = self.store.lock().unwrap();
        guard
            .approver(approver())
            .add_pin(&package(), USER, &ItemId::new(id))
            .unwrap();
    }
}

#[test]
fn round_trip_creates_pinned_non_dynamic_item() {
    let w = world();
    let (channel, mut results) = ResultChannel::new();

    assert_eq!(
        w.processor.request_pin(candidate("s1"), Some(channel)),
        Ok(true)
    );

    let (intent, user) = w.launcher.last().unwrap();
    assert_eq!(user, USER);
    assert_eq!(intent.component, ComponentName::new(LAUNCHER, "ConfirmPin"));
    assert_eq!(intent.request.item.id, ItemId::new("s1"));
    assert!(!intent.request.item.pinned);
    assert!(intent.request.item.intents.is_empty());
    assert!(intent.request.item.icon.is_none());
    assert!(
        w.item("s1").is_none(),
        "nothing is stored before acceptance"
    );
    assert!(results.try_recv().is_err());

    let handle = intent.request.handle;
    assert!(w.processor.is_valid(&handle));
    assert_eq!(
        w.processor.accept(&handle, Some(&Default::default())),
        Ok(true)
    );

    let item = w.item("s1").unwrap();
    assert!(item.pinned);
    assert!(!item.dynamic);
    assert!(w.is_pinned_by_approver("s1"));
    assert!(w.store.verify_states().is_ok());

    assert_eq!(results.try_recv().unwrap().item_id, ItemId::new("s1"));
    assert!(results.try_recv().is_err(), "notified exactly once");
}

#[test]
fn disabled_existing_item_is_rejected() {
    let w = world();
    w.add_dynamic(Item {
        enabled: false,
        ..candidate("s2")
    });
    let (channel, mut results) = ResultChannel::new();

    let result = w.processor.request_pin(candidate("s2"), Some(channel));

    assert!(matches!(result, Err(PinError::IllegalState(_))));
    assert!(w.launcher.launched().is_empty());
    assert_eq!(w.processor.outstanding_requests(), 0);
    assert!(results.try_recv().is_err());
}

#[test]
fn incomplete_new_item_is_rejected() {
    let w = world();
    let incomplete = Item::builder(PUBLISHER, USER, "s3").build();

    let err = w.processor.request_pin(incomplete, None).unwrap_err();

    assert!(matches!(err, PinError::InvalidArgument(_)));
    assert!(err.to_string().contains("intents"));
    assert!(err.to_string().contains("short_label"));
    assert!(w.launcher.launched().is_empty());
}

#[test]
fn missing_approver_fails_without_side_effects() {
    let w = world();
    w.directory.set_default_launcher(USER, None);
    let (channel, mut results) = ResultChannel::new();

    assert!(!w.processor.is_request_pin_supported(USER));
    assert_eq!(
        w.processor.request_pin(candidate("s1"), Some(channel)),
        Ok(false)
    );
    assert!(w.launcher.launched().is_empty());
    assert_eq!(w.processor.outstanding_requests(), 0);
    assert!(results.try_recv().is_err());
}

#[test]
fn failed_launch_leaves_no_token_and_restores_identity() {
    let w = world();
    w.launcher.set_failure(Some(LaunchError::ActivityNotFound(ComponentName::new(
        LAUNCHER,
        "ConfirmPin",
    ))));
    let (channel, mut results) = ResultChannel::new();
    ThreadCallerIdentity::set_calling_uid(Some(10_077));

    assert_eq!(
        w.processor.request_pin(candidate("s1"), Some(channel)),
        Ok(false)
    );

    assert_eq!(ThreadCallerIdentity::calling_uid(), Some(10_077));
    assert_eq!(w.processor.outstanding_requests(), 0);
    assert!(results.try_recv().is_err());
    assert!(w.item("s1").is_none());
}

#[test]
fn launch_runs_with_cleared_identity() {
    struct IdentityRecorder {
        seen: Mutex<Vec<Option<u32>>>,
    }

    impl SurfaceLauncher for IdentityRecorder {
        fn launch(&self, _intent: &ConfirmIntent, _user: UserId) -> Result<(), LaunchError> {
            self.seen
                .lock()
                .unwrap()
                .push(ThreadCallerIdentity::calling_uid());
            Ok(())
        }
    }

    let recorder = Arc::new(IdentityRecorder {
        seen: Mutex::new(Vec::new()),
    });
    let w = world_with_launcher(recorder.clone(), Arc::new(RecordingLauncher::new()));
    ThreadCallerIdentity::set_calling_uid(Some(10_050));

    assert_eq!(w.processor.request_pin(candidate("s1"), None), Ok(true));

    assert_eq!(*recorder.seen.lock().unwrap(), vec![None]);
    assert_eq!(ThreadCallerIdentity::calling_uid(), Some(10_050));
}

#[test]
fn already_pinned_item_short_circuits() {
    let w = world();
    w.add_dynamic(candidate("s1"));
    w.pin_directly("s1");
    let (channel, mut results) = ResultChannel::new();

    assert_eq!(
        w.processor.request_pin(candidate("s1"), Some(channel)),
        Ok(true)
    );

    assert!(w.launcher.launched().is_empty());
    assert_eq!(w.processor.outstanding_requests(), 0);
    assert_eq!(results.try_recv().unwrap().item_id, ItemId::new("s1"));
}

#[test]
fn existing_dynamic_item_stays_dynamic_after_pin() {
    let w = world();
    w.add_dynamic(candidate("s1"));

    assert_eq!(w.processor.request_pin(candidate("s1"), None), Ok(true));
    let handle = w.last_handle();
    assert!(w.processor.callback(&handle).unwrap().is_pre_existing());
    assert_eq!(w.processor.accept(&handle, None), Ok(true));

    let item = w.item("s1").unwrap();
    assert!(item.dynamic);
    assert!(item.pinned);
    assert!(
        !item.intents.is_empty(),
        "the stored item keeps its intents"
    );
}

#[test]
fn item_deleted_before_accept_is_not_pinned() {
    let w = world();
    w.add_dynamic(candidate("s1"));
    let (channel, mut results) = ResultChannel::new();
    w.processor.request_pin(candidate("s1"), Some(channel)).unwrap();
    let handle = w.last_handle();

    w.store
        .lock()
        .unwrap()
        .delete_dynamic(&package(), USER, &ItemId::new("s1"));

    assert_eq!(w.processor.accept(&handle, None), Ok(false));
    assert!(w.item("s1").is_none());
    assert!(!w.is_pinned_by_approver("s1"));
    assert!(results.try_recv().is_err());
    assert!(
        !w.processor.is_valid(&handle),
        "a failed commit still burns the token"
    );
}

#[test]
fn item_disabled_before_accept_is_not_pinned() {
    let w = world();
    w.processor.request_pin(candidate("s1"), None).unwrap();
    let handle = w.last_handle();

    w.add_dynamic(candidate("s1"));
    w.store
        .lock()
        .unwrap()
        .set_enabled(&package(), USER, &ItemId::new("s1"), false)
        .unwrap();

    assert_eq!(w.processor.accept(&handle, None), Ok(false));
    assert!(!w.is_pinned_by_approver("s1"));
}

#[test]
fn locked_session_at_commit_fails_softly() {
    let w = world();
    w.processor.request_pin(candidate("s1"), None).unwrap();
    let handle = w.last_handle();

    w.sessions.lock(USER);

    assert_eq!(w.processor.accept(&handle, None), Ok(false));
    assert!(w.item("s1").is_none());
}

#[test]
fn concurrent_accepts_commit_once() {
    const CALLERS: usize = 8;

    let w = world();
    let (channel, mut results) = ResultChannel::new();
    w.processor.request_pin(candidate("s1"), Some(channel)).unwrap();
    let token = w.processor.callback(&w.last_handle()).unwrap();

    let barrier = Arc::new(Barrier::new(CALLERS));
    let callers: Vec<_> = (0..CALLERS)
        .map(|_| {
            let token = Arc::clone(&token);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                token.accept(None)
            })
        })
        .collect();
    let outcomes: Vec<_> = callers
        .into_iter()
        .map(|caller| caller.join().unwrap())
        .collect();

    let committed = outcomes.iter().filter(|o| **o == Ok(true)).count();
    let rejected = outcomes
        .iter()
        .filter(|o| matches!(o, Err(PinError::IllegalState(_))))
        .count();
    assert_eq!(committed, 1);
    assert_eq!(rejected, CALLERS - 1);

    assert!(w.is_pinned_by_approver("s1"));
    assert_eq!(w.processor.outstanding_requests(), 0);
    assert!(results.try_recv().is_ok());
    assert!(results.try_recv().is_err());
}

#[test]
fn accepting_through_callback_retires_handle() {
    let w = world();
    w.processor.request_pin(candidate("s1"), None).unwrap();
    let handle = w.last_handle();
    let token = w.processor.callback(&handle).unwrap();

    assert_eq!(token.accept(None), Ok(true));

    assert!(!token.is_valid());
    assert_eq!(w.processor.outstanding_requests(), 0);
    assert!(w.processor.callback(&handle).is_none());
}

#[test]
fn rejected_options_keep_handle_outstanding() {
    let w = world();
    w.processor.request_pin(candidate("s1"), None).unwrap();
    let handle = w.last_handle();
    let options = RequestOptions::new().with(
        "host",
        OptionValue::Foreign {
            type_name: "com.example.launcher.HostState".to_string(),
        },
    );

    let err = w.processor.accept(&handle, Some(&options)).unwrap_err();

    assert!(matches!(err, PinError::InvalidArgument(_)));
    assert!(w.processor.is_valid(&handle));
    assert_eq!(w.processor.outstanding_requests(), 1);
    assert_eq!(w.processor.accept(&handle, None), Ok(true));
}

#[test]
fn incoming_flags_of_new_item_are_reset() {
    let w = world();
    let flagged = Item {
        enabled: false,
        pinned: true,
        dynamic: true,
        ..candidate("s1")
    };

    assert_eq!(w.processor.request_pin(flagged, None), Ok(true));

    let (intent, _) = w.launcher.last().unwrap();
    assert!(!intent.request.item.pinned);
    assert!(!intent.request.item.dynamic);
    assert!(intent.request.item.enabled);

    assert_eq!(w.processor.accept(&intent.request.handle, None), Ok(true));
    let item = w.item("s1").unwrap();
    assert!(item.enabled);
    assert!(item.pinned);
    assert!(!item.dynamic);
}

#[test]
fn new_request_does_not_invalidate_outstanding_one() {
    let w = world();
    w.processor.request_pin(candidate("s1"), None).unwrap();
    let first = w.last_handle();
    w.processor.request_pin(candidate("s1"), None).unwrap();
    let second = w.last_handle();

    assert_ne!(first, second);
    assert!(w.processor.is_valid(&first));
    assert!(w.processor.is_valid(&second));

    assert_eq!(w.processor.accept(&first, None), Ok(true));
    // The item exists and is pinned now, so the second commit pins it again idempotently.
    assert_eq!(w.processor.accept(&second, None), Ok(true));
    assert!(w.is_pinned_by_approver("s1"));
}

#[test]
fn externalized_labels_are_resolved_at_send_time() {
    let w = world();
    w.strings.insert(PUBLISHER, USER, 7, "Compose email");
    let item = Item {
        short_label: Some(ItemText::resource(7, "compose_label")),
        ..candidate("s1")
    };

    w.processor.request_pin(item, None).unwrap();

    let (intent, _) = w.launcher.last().unwrap();
    assert_eq!(
        intent.request.item.short_label,
        Some(ItemText::literal("Compose email"))
    );
}

#[test]
fn commit_publishes_change_notification() {
    let w = world();
    let mut changes = w.store.changes().subscribe();
    w.processor.request_pin(candidate("s1"), None).unwrap();

    w.processor.accept(&w.last_handle(), None).unwrap();

    let event = changes.try_recv().unwrap();
    assert_eq!(event.package, package());
    assert_eq!(event.user, USER);
}

#[test]
fn work_profile_item_is_pinned_by_parent_launcher() {
    let w = world();
    let work = UserId(10);
    w.directory.set_parent(work, USER);
    w.sessions.unlock(work);
    let item = Item::builder(PUBLISHER, work, "s1")
        .short_label(ItemText::literal("Compose"))
        .intent(LaunchIntent::new("COMPOSE"))
        .build();

    assert_eq!(w.processor.request_pin(item, None), Ok(true));
    let handle = w.last_handle();
    assert_eq!(w.processor.accept(&handle, None), Ok(true));

    let guard = w.store.lock().unwrap();
    let record = guard
        .approver_record(&ApproverKey::new(LAUNCHER, work, USER))
        .unwrap();
    assert!(record.contains(&PinKey::new(PUBLISHER, work, "s1")));
}

#[test]
fn restored_pins_are_adopted_on_commit() {
    let w = world();
    w.add_dynamic(candidate("restored"));
    w.store
        .lock()
        .unwrap()
        .approver(approver())
        .queue_restored_pin(PinKey::new(PUBLISHER, USER, "restored"));

    w.processor.request_pin(candidate("s1"), None).unwrap();
    w.processor.accept(&w.last_handle(), None).unwrap();

    assert!(w.is_pinned_by_approver("restored"));
    assert!(w.is_pinned_by_approver("s1"));
}

#[tokio::test]
async fn requester_awaits_result() {
    let w = world();
    let (channel, mut results) = ResultChannel::new();
    w.processor.request_pin(candidate("s1"), Some(channel)).unwrap();
    let handle = w.last_handle();

    let processor = w.processor.clone();
    let approver = tokio::task::spawn_blocking(move || processor.accept(&handle, None));

    let notice = results.recv().await.unwrap();
    assert_eq!(notice.package, package());
    assert_eq!(approver.await.unwrap(), Ok(true));
}
