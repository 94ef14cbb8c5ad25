//! End-to-end subscription flow: board, subscriber, post, notification.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use prioritize_action_board::application::command_handlers::{
    handle_add_subscriber, handle_create_action_board, handle_post_entry,
};
use prioritize_action_board::domain::aggregates::ENTRIES_PROPERTY;
use prioritize_action_board::domain::commands::{AddSubscriber, CreateActionBoard, PostEntry};
use prioritize_action_board::infrastructure::InMemoryActionBoardRepository;
use prioritize_core::config::{EventSettings, EventStrategy};
use prioritize_core::consumer::EventConsumer;
use prioritize_core::event::SourceType;
use prioritize_core::listener::{Destination, DestinationCategory};
use prioritize_event_store::InMemoryEventStore;
use prioritize_registry::{DeliveryOutcome, EventRegistry};
use prioritize_test_support::{FixedClock, RecordingConsumer};
use uuid::Uuid;

fn registry(settings: EventSettings, users: Arc<RecordingConsumer>) -> EventRegistry {
    EventRegistry::initialize(
        settings,
        Arc::new(InMemoryEventStore::new()),
        Arc::new(FixedClock(Utc.with_ymd_and_hms(2026, 4, 1, 12, 0, 0).unwrap())),
        [(DestinationCategory::User, users as Arc<dyn EventConsumer>)],
    )
    .unwrap()
}

async fn create_boards(repo: &InMemoryActionBoardRepository, count: usize) -> Vec<i64> {
    let mut ids = Vec::with_capacity(count);
    for n in 1..=count {
        let board = handle_create_action_board(
            &CreateActionBoard {
                correlation_id: Uuid::new_v4(),
                name: format!("board-{n}"),
                description: String::new(),
                owner: None,
            },
            repo,
        )
        .await
        .unwrap();
        ids.push(board.id);
    }
    ids
}

fn post(board_id: i64) -> PostEntry {
    PostEntry {
        correlation_id: Uuid::new_v4(),
        board_id,
        title: "Standup moved".to_owned(),
        message: "10:30 today".to_owned(),
        source: None,
    }
}

#[tokio::test]
async fn test_post_to_board_seven_notifies_its_single_subscriber_once() {
    // Arrange
    let users = Arc::new(RecordingConsumer::new());
    let registry = registry(EventSettings::default(), users.clone());
    let repo = InMemoryActionBoardRepository::new();
    let ids = create_boards(&repo, 7).await;
    assert_eq!(ids.last(), Some(&7));
    let subscriber = Destination::new(DestinationCategory::User, 21);
    handle_add_subscriber(
        &AddSubscriber {
            correlation_id: Uuid::new_v4(),
            board_id: 7,
            subscriber,
        },
        &registry,
        &repo,
    )
    .await
    .unwrap();

    // Act
    handle_post_entry(&post(3), &registry, &repo).await.unwrap();
    handle_post_entry(&post(7), &registry, &repo).await.unwrap();

    // Assert
    let received = users.received();
    assert_eq!(received.len(), 1);
    let (destination, event) = &received[0];
    assert_eq!(*destination, subscriber);
    assert_eq!(event.source_type(), SourceType::ActionBoard);
    assert_eq!(event.source_id(), 7);
    assert_eq!(event.property_name(), ENTRIES_PROPERTY);
}

#[tokio::test]
async fn test_delayed_strategy_notifies_subscriber_on_sweep() {
    // Arrange
    let users = Arc::new(RecordingConsumer::new());
    let registry = registry(
        EventSettings {
            strategy: EventStrategy::Delayed,
            ..EventSettings::default()
        },
        users.clone(),
    );
    let repo = InMemoryActionBoardRepository::new();
    let ids = create_boards(&repo, 1).await;
    handle_add_subscriber(
        &AddSubscriber {
            correlation_id: Uuid::new_v4(),
            board_id: ids[0],
            subscriber: Destination::new(DestinationCategory::User, 21),
        },
        &registry,
        &repo,
    )
    .await
    .unwrap();

    // Act
    let posted = handle_post_entry(&post(ids[0]), &registry, &repo)
        .await
        .unwrap();
    let before_sweep = users.count();
    let report = registry.process_events().await;

    // Assert
    assert_eq!(posted.delivery, DeliveryOutcome::Deferred { listeners: 1 });
    assert_eq!(before_sweep, 0);
    assert_eq!(report.delivered_events, 1);
    assert_eq!(users.count(), 1);
}

#[tokio::test]
async fn test_posting_with_board_events_switched_off_notifies_nobody() {
    let users = Arc::new(RecordingConsumer::new());
    let registry = registry(
        EventSettings {
            fire_action_board_events: false,
            ..EventSettings::default()
        },
        users.clone(),
    );
    let repo = InMemoryActionBoardRepository::new();
    let ids = create_boards(&repo, 1).await;
    handle_add_subscriber(
        &AddSubscriber {
            correlation_id: Uuid::new_v4(),
            board_id: ids[0],
            subscriber: Destination::new(DestinationCategory::User, 21),
        },
        &registry,
        &repo,
    )
    .await
    .unwrap();

    let posted = handle_post_entry(&post(ids[0]), &registry, &repo)
        .await
        .unwrap();

    assert_eq!(posted.delivery, DeliveryOutcome::Suppressed);
    assert_eq!(users.count(), 0);
}
