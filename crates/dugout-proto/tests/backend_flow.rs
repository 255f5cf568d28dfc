mod common;

use common::MockBackend;
use dugout_proto::capture::{encode_data_url, DATA_URL_PREFIX};
use dugout_proto::config::PlaybackConfig;
use dugout_proto::context::ContextTracker;
use dugout_proto::player::{Player, PlayerEffect, PlayerEvent};
use dugout_proto::protocol::DEFAULT_SEGMENT;
use dugout_proto::session::{Conversation, FAILED_REPLY};
use serde_json::json;

#[tokio::test]
async fn search_answer_lands_in_transcript() {
    let (client, seen) = MockBackend::with_segments(10)
        .replying(json!({"type": "search", "result": {"answer": "A slider."}}))
        .start()
        .await;

    let mut conv = Conversation::new();
    let dispatch = conv
        .begin_dispatch("What pitch was that?", 1, Some("s1"))
        .unwrap();
    let outcome = client.analyze(&dispatch.request).await;
    let targets = conv.complete(dispatch.ticket, outcome);

    assert!(targets.is_empty());
    assert_eq!(conv.len(), 3);
    assert_eq!(conv.messages().last().unwrap().text, "A slider.");
    assert!(!conv.is_typing());

    let seen = seen.lock().await;
    assert_eq!(seen.len(), 1);
    assert_eq!(
        seen[0].1,
        json!({"query": "What pitch was that?", "video": "s1", "current_time": 120})
    );
}

#[tokio::test]
async fn historical_answer_requests_two_clips() {
    let (client, _) = MockBackend::with_segments(10)
        .replying(json!({
            "type": "historical",
            "result": {
                "answer": "Two earlier at-bats.",
                "citations": ["t/segment_001.txt", "t/segment_002.txt", "t/segment_008.txt"]
            }
        }))
        .start()
        .await;

    let mut conv = Conversation::new();
    let dispatch = conv.begin_dispatch("Has he done this before?", 0, None).unwrap();
    assert_eq!(dispatch.request.video, DEFAULT_SEGMENT);
    let targets = conv.complete(dispatch.ticket, client.analyze(&dispatch.request).await);
    assert_eq!(targets, vec!["segment_001.mp4", "segment_002.mp4"]);

    let mut player = Player::new(&PlaybackConfig::default(), true);
    player.handle(PlayerEvent::CatalogLoaded(client.list_segments().await.unwrap()));
    let effects = player.handle(PlayerEvent::PlayRequested(targets));
    assert_eq!(effects, vec![PlayerEffect::Load("segment_001.mp4".into())]);
    assert_eq!(player.index(), 0);
}

#[tokio::test]
async fn server_error_yields_failure_reply() {
    let (client, _) = MockBackend::with_segments(3).start().await;
    let mut conv = Conversation::new();
    let dispatch = conv.begin_dispatch("anything", 0, None).unwrap();
    let outcome = client.analyze(&dispatch.request).await;
    assert!(outcome.is_err());
    conv.complete(dispatch.ticket, outcome);
    assert_eq!(conv.messages().last().unwrap().text, FAILED_REPLY);
    assert!(!conv.is_typing());
}

#[tokio::test]
async fn unreachable_backend_yields_failure_reply() {
    let client = dugout_proto::client::BackendClient::with_client(
        reqwest::Client::new(),
        "http://127.0.0.1:9",
    );
    assert!(client.list_segments().await.is_err());

    let mut conv = Conversation::new();
    let dispatch = conv.begin_dispatch("hello?", 0, None).unwrap();
    conv.complete(dispatch.ticket, client.analyze(&dispatch.request).await);
    assert_eq!(conv.messages().last().unwrap().text, FAILED_REPLY);
}

#[tokio::test]
async fn saved_clip_is_attached() {
    let (client, seen) = MockBackend::with_segments(3).start().await;

    let data_url = encode_data_url(b"fake mp4 bytes");
    client.save_segment(data_url.clone()).await.unwrap();
    let file = client.latest_video().await.unwrap();

    let mut conv = Conversation::new();
    conv.attach_clip(client.saved_segment_url(&file));
    let last = conv.messages().last().unwrap();
    assert!(last.text.is_empty());
    assert!(last
        .media
        .as_deref()
        .unwrap()
        .ends_with("/saved_segments/video_segment_1700000000.mp4"));

    let seen = seen.lock().await;
    let (route, body) = &seen[0];
    assert_eq!(route, "/save-segment");
    assert!(body["videoData"].as_str().unwrap().starts_with(DATA_URL_PREFIX));
}

#[tokio::test]
async fn overview_follows_latest_segment() {
    let (client, _) = MockBackend::with_segments(10).start().await;
    let mut ctx = ContextTracker::new();

    let (first, chunk) = ctx.request(Some("s0"));
    let slow = client.match_overview(&chunk).await;
    let (second, chunk) = ctx.request(Some("s1"));
    let fast = client.match_overview(&chunk).await;

    assert!(ctx.accept(second, fast));
    assert!(!ctx.accept(first, slow));
    let overview = ctx.overview().unwrap();
    assert_eq!(overview.current_context(), Some("context for s1"));
    assert_eq!(overview.sections()[0].title, "Strategic Prediction");
}

#[tokio::test]
async fn window_grows_after_fifth_segment() {
    let (client, _) = MockBackend::with_segments(10).start().await;
    let catalog = client.list_segments().await.unwrap();

    let mut player = Player::new(&PlaybackConfig::default(), true);
    player.handle(PlayerEvent::CatalogLoaded(catalog.clone()));
    player.handle(PlayerEvent::WarmupElapsed);
    assert_eq!(player.buffer().window(), &catalog[..5]);

    for _ in 0..4 {
        player.handle(PlayerEvent::FileLoaded);
        player.handle(PlayerEvent::EndOfFile);
    }
    player.handle(PlayerEvent::FileLoaded);
    let effects = player.handle(PlayerEvent::EndOfFile);
    let ticket = effects
        .into_iter()
        .find_map(|e| match e {
            PlayerEffect::ScheduleGrowth(t) => Some(t),
            _ => None,
        })
        .unwrap();
    player.handle(PlayerEvent::GrowthDue(ticket));
    assert_eq!(player.buffer().window(), &catalog[..]);
    assert_eq!(player.index(), 5);
}

#[tokio::test]
async fn stream_url_is_served() {
    let (client, _) = MockBackend::with_segments(1).start().await;
    let body = reqwest::get(client.stream_url("s0")).await.unwrap();
    assert!(body.status().is_success());
    assert_eq!(body.text().await.unwrap(), "s0");
}
