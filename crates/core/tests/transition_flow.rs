//! Queue-walking scenarios across the whole coordinator: natural ends,
//! close races, ad skips, and backend-directed navigation.

use std::sync::Arc;

use serde_json::json;
use tp_protocol::{
    CoreBound, HostBound, PageCommand, PageEvent, VideoPlayState, inbound, outbound,
};
use tunepilot::browser::{PageChannel, TabRuntime};
use tunepilot::config::CoordinatorConfig;
use tunepilot::coordinator::Coordinator;
use tunepilot::relay::lifecycle::RelayHostManager;
use tunepilot::relay::proxy::SocketProxy;
use tunepilot::store::{LATEST_URL_ENDED, MemoryStore, StateStore};
use tunepilot::tabs::TabId;
use tunepilot::testing::{
    FakeHostRuntime, FakePageChannel, FakePortController, FakeRelayPort, FakeTabRuntime,
};

const V1: &str = "https://example.com/watch?v=v1";
const V2: &str = "https://example.com/watch?v=v2";
const V3: &str = "https://example.com/watch?v=v3";

struct Harness {
    coordinator: Coordinator<FakeRelayPort, FakeHostRuntime>,
    port: FakePortController,
    tabs: Arc<FakeTabRuntime>,
    pages: Arc<FakePageChannel>,
    store: Arc<MemoryStore>,
}

/// Surfaces coordinator traces in failing tests via `RUST_LOG`.
fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

async fn harness() -> Harness {
    init_logging();
    let (port, controller) = FakeRelayPort::new();
    let host = RelayHostManager::new(FakeHostRuntime::present(), &CoordinatorConfig::default());
    let proxy = SocketProxy::new(Arc::new(port), host, CoordinatorConfig::default());
    let tabs = FakeTabRuntime::new();
    let pages = FakePageChannel::new();
    let store = Arc::new(MemoryStore::new());
    let coordinator = Coordinator::new(
        proxy,
        Arc::clone(&tabs) as Arc<dyn TabRuntime>,
        Arc::clone(&pages) as Arc<dyn PageChannel>,
        Arc::clone(&store) as Arc<dyn StateStore>,
        CoordinatorConfig::default(),
    );
    coordinator
        .handle_host_message(CoreBound::OffscreenReady {
            at_ms: 0,
            connection_id: "it".into(),
        })
        .await;
    controller.take_sent();
    Harness {
        coordinator,
        port: controller,
        tabs,
        pages,
        store,
    }
}

fn event_names(sent: &[HostBound]) -> Vec<String> {
    sent.iter()
        .filter_map(|m| match m {
            HostBound::SocketEmit { event, .. } => Some(event.clone()),
            HostBound::SocketConnect => None,
        })
        .collect()
}

async fn video_state(h: &Harness, tab_id: TabId, state: VideoPlayState, url: &str) {
    h.coordinator
        .handle_page_event(
            tab_id,
            PageEvent::VideoState {
                state,
                url: url.to_string(),
            },
        )
        .await;
}

#[tokio::test(start_paused = true)]
async fn full_queue_walk_reuses_the_owned_tab_and_ends_cleanly() {
    let h = harness().await;
    h.coordinator
        .handle_socket_event(inbound::URL_LIST, &json!([V1, V2, V3]))
        .await;

    // The user starts the first item in their own tab.
    let user_tab = h.tabs.seed_tab(V1);
    h.coordinator.handle_tab_updated(user_tab, V1).await;
    video_state(&h, user_tab, VideoPlayState::Playing, V1).await;
    video_state(&h, user_tab, VideoPlayState::Ended, V1).await;

    // The advance opened a coordinator-owned tab at the second item and
    // paused the user's tab.
    let created = h.tabs.created();
    assert_eq!(created.len(), 1);
    let owned = created[0].0;
    assert_eq!(created[0].1, V2);
    assert!(h.pages.sent_to(user_tab).contains(&PageCommand::ForcePause));
    assert_eq!(h.store.latest_url().as_deref(), Some(V2));

    // The owned tab walks the rest of the queue in place.
    h.coordinator.handle_tab_updated(owned, V2).await;
    video_state(&h, owned, VideoPlayState::Playing, V2).await;
    video_state(&h, owned, VideoPlayState::Ended, V2).await;

    assert_eq!(h.tabs.created().len(), 1, "no second tab for the third item");
    assert_eq!(h.tabs.url_of(owned).as_deref(), Some(V3));

    h.coordinator.handle_tab_updated(owned, V3).await;
    video_state(&h, owned, VideoPlayState::Playing, V3).await;
    video_state(&h, owned, VideoPlayState::Ended, V3).await;

    assert_eq!(h.store.latest_url().as_deref(), Some(LATEST_URL_ENDED));
    assert!(h.pages.sent_to(owned).contains(&PageCommand::ShowVideoEndAlert));
}

#[tokio::test(start_paused = true)]
async fn closing_the_playing_tab_advances_in_its_place() {
    let h = harness().await;
    h.coordinator
        .handle_socket_event(inbound::URL_LIST, &json!([V1, V2]))
        .await;
    let tab = h.tabs.seed_tab(V1);
    video_state(&h, tab, VideoPlayState::Playing, V1).await;
    h.port.take_sent();

    h.coordinator.handle_tab_removed(tab).await;

    let names = event_names(&h.port.take_sent());
    assert!(names.contains(&outbound::TAB_CLOSED.to_string()));
    assert!(!names.contains(&outbound::VIDEO_ENDED.to_string()));
    let created = h.tabs.created();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].1, V2);
}

#[tokio::test(start_paused = true)]
async fn expired_wait_means_a_close_no_longer_advances() {
    let h = harness().await;
    h.coordinator
        .handle_socket_event(inbound::URL_LIST, &json!([V1, V2]))
        .await;
    let tab = h.tabs.seed_tab(V1);
    video_state(&h, tab, VideoPlayState::Playing, V1).await;

    // Nothing happened for longer than the wait-for-end window.
    tokio::time::advance(std::time::Duration::from_secs(601)).await;

    h.coordinator.handle_tab_removed(tab).await;

    let names = event_names(&h.port.take_sent());
    assert!(names.contains(&outbound::TAB_CLOSED.to_string()));
    assert!(h.tabs.created().is_empty());
}

#[tokio::test(start_paused = true)]
async fn ad_skip_request_jumps_straight_to_the_successor() {
    let h = harness().await;
    h.coordinator
        .handle_socket_event(inbound::URL_LIST, &json!([V1, V2]))
        .await;
    let tab = h.tabs.seed_tab(V1);
    video_state(&h, tab, VideoPlayState::Playing, V1).await;

    h.coordinator
        .handle_page_event(tab, PageEvent::AdSkipToNext { url: V1.into() })
        .await;

    let created = h.tabs.created();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].1, V2);
}

#[tokio::test(start_paused = true)]
async fn backend_directed_navigation_opens_and_no_next_alerts() {
    let h = harness().await;

    h.coordinator
        .handle_socket_event(inbound::NEXT_VIDEO_NAVIGATE, &json!({"nextUrl": V1, "tabId": null}))
        .await;
    let created = h.tabs.created();
    assert_eq!(created.len(), 1);
    let opened = created[0].0;
    assert!(h.pages.sent_to(opened).contains(&PageCommand::MarkExtensionOpened));
    assert_eq!(h.store.latest_url().as_deref(), Some(V1));

    video_state(&h, opened, VideoPlayState::Playing, V1).await;
    h.coordinator
        .handle_socket_event(inbound::NO_NEXT_VIDEO, &json!({"tabId": null}))
        .await;

    assert_eq!(h.store.latest_url().as_deref(), Some(LATEST_URL_ENDED));
    assert!(h.pages.sent_to(opened).contains(&PageCommand::ShowVideoEndAlert));
}

#[tokio::test(start_paused = true)]
async fn queue_position_survives_backend_pushes() {
    let h = harness().await;
    h.coordinator
        .handle_socket_event(inbound::NEW_URL, &json!(V2))
        .await;
    h.coordinator
        .handle_socket_event(inbound::URL_LIST, &json!([V1, V2, V3]))
        .await;
    assert_eq!(h.store.latest_url().as_deref(), Some(V2));
    assert_eq!(h.store.url_list(), vec![V1.to_string(), V2.into(), V3.into()]);
}

#[tokio::test(start_paused = true)]
async fn page_reports_are_forwarded_to_the_backend() {
    let h = harness().await;
    let tab = h.tabs.seed_tab(V1);
    video_state(&h, tab, VideoPlayState::Playing, V1).await;
    h.coordinator
        .handle_page_event(
            tab,
            PageEvent::ProgressUpdate {
                url: V1.into(),
                current_time: 12.0,
                duration: 240.0,
            },
        )
        .await;
    h.coordinator
        .handle_page_event(
            tab,
            PageEvent::AdStateChanged {
                is_ad: true,
                url: V1.into(),
            },
        )
        .await;

    let names = event_names(&h.port.take_sent());
    assert!(names.contains(&outbound::YOUTUBE_VIDEO_STATE.to_string()));
    assert!(names.contains(&outbound::PROGRESS_UPDATE.to_string()));
    assert!(names.contains(&outbound::AD_STATE_CHANGED.to_string()));
}
