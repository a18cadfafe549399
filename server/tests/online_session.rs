use std::time::Duration;

use rocket::Shutdown;
use serde_json::json;
use sweeper_client::{
    Cell, CellUpdate, DocumentKey, GameConfig, GameOutcome, HttpStore, MoveOutcome, OnlineConfig,
    OnlineGameSession, OnlineState, Precondition, RemoteStore, SessionError, SessionEvent,
    StoreError, UpdateRequest,
};
use sweeper_store::{build_rocket, config::StoreConfig};
use tokio::time::{sleep, timeout};

/// Serves the store on `port` in the background until the handle is notified.
async fn launch(port: u16, config: StoreConfig) -> (Shutdown, HttpStore) {
    let figment = rocket::Config::figment()
        .merge(("address", "127.0.0.1"))
        .merge(("port", port))
        .merge(("log_level", "off"));
    let rocket = build_rocket(config)
        .unwrap()
        .configure(figment)
        .ignite()
        .await
        .unwrap();
    let shutdown = rocket.shutdown();
    tokio::spawn(rocket.launch());

    let store = HttpStore::new(&format!("http://127.0.0.1:{}", port)).unwrap();
    let ready = DocumentKey::new("health", "ready");
    for _ in 0..100 {
        if store.get(&ready).await.is_ok() {
            return (shutdown, store);
        }
        sleep(Duration::from_millis(20)).await;
    }
    panic!("store service did not start on port {}", port);
}

async fn next_event(session: &mut OnlineGameSession<HttpStore>) -> SessionEvent {
    timeout(Duration::from_secs(5), session.next_event())
        .await
        .expect("no notification within 5s")
        .expect("subscription ended")
        .expect("notification failed")
}

#[tokio::test(flavor = "multi_thread")]
async fn two_players_take_turns_over_http() {
    let (shutdown, store) = launch(38917, StoreConfig::default()).await;

    let game_id = store.allocate_id("games").await.unwrap();
    let players = ["alice".to_string(), "bob".to_string()];
    let config = |me: &str| OnlineConfig {
        board: GameConfig::new(8, 0.15).with_seed(9),
        ..OnlineConfig::new(&game_id, players.clone(), me)
    };

    let mut alice = OnlineGameSession::open(store.clone(), config("alice"))
        .await
        .unwrap();
    assert_eq!(next_event(&mut alice).await, SessionEvent::Created);
    assert_eq!(
        next_event(&mut alice).await,
        SessionEvent::Updated {
            state: OnlineState::Active,
            my_turn: true
        }
    );

    let mut bob = OnlineGameSession::open(store.clone(), config("bob"))
        .await
        .unwrap();
    assert_eq!(
        next_event(&mut bob).await,
        SessionEvent::Updated {
            state: OnlineState::Active,
            my_turn: false
        }
    );

    let board = alice.board().unwrap();
    let target = board
        .positions()
        .find(|&pos| board.cell(pos).is_some_and(|cell| !cell.has_mine()))
        .unwrap();
    let adjacent = board.cell(target).unwrap().adjacent_mines();

    assert!(matches!(
        bob.attempt_reveal(target).await,
        Err(SessionError::NotYourTurn)
    ));

    let result = alice.attempt_reveal(target).await.unwrap();
    assert_eq!(
        result,
        MoveOutcome::Submitted {
            changed: vec![CellUpdate {
                pos: target,
                value: Cell::Revealed { adjacent }
            }],
            outcome: GameOutcome::InProgress,
        }
    );

    assert_eq!(
        next_event(&mut alice).await,
        SessionEvent::Updated {
            state: OnlineState::Active,
            my_turn: false
        }
    );
    assert_eq!(
        next_event(&mut bob).await,
        SessionEvent::Updated {
            state: OnlineState::Active,
            my_turn: true
        }
    );
    assert!(!alice.is_move_pending());
    assert_eq!(bob.turn_indicator(), "Turn: bob");
    assert_eq!(bob.display(target), Some(Cell::Revealed { adjacent }));

    let key = DocumentKey::new("games", &game_id);
    assert!(matches!(
        store.create(&key, json!({ "playerTurn": "mallory" })).await,
        Err(StoreError::AlreadyExists)
    ));

    shutdown.notify();
}

#[tokio::test(flavor = "multi_thread")]
async fn write_failures_map_to_store_errors() {
    let (shutdown, store) = launch(38918, StoreConfig::default()).await;
    let key = DocumentKey::new("games", "status-codes");
    let turn_to = |from: &str, to: &str| UpdateRequest {
        fields: [("playerTurn".to_string(), json!(to))].into(),
        precondition: Some(Precondition::FieldEquals {
            path: "playerTurn".to_string(),
            value: json!(from),
        }),
    };

    assert!(matches!(
        store.update(&key, turn_to("alice", "bob")).await,
        Err(StoreError::NotFound)
    ));

    assert_eq!(store.create(&key, json!({ "playerTurn": "alice" })).await.unwrap(), 1);
    assert!(matches!(
        store.create(&key, json!({ "playerTurn": "bob" })).await,
        Err(StoreError::AlreadyExists)
    ));

    assert_eq!(store.update(&key, turn_to("alice", "bob")).await.unwrap(), 2);
    assert!(matches!(
        store.update(&key, turn_to("alice", "bob")).await,
        Err(StoreError::PreconditionFailed)
    ));

    let crossing = UpdateRequest {
        fields: [("playerTurn.name".to_string(), json!("carol"))].into(),
        precondition: None,
    };
    assert!(matches!(
        store.update(&key, crossing).await,
        Err(StoreError::Rejected(_))
    ));

    let snapshot = store.get(&key).await.unwrap();
    assert_eq!(snapshot.version, 2);
    assert_eq!(snapshot.document, Some(json!({ "playerTurn": "bob" })));

    shutdown.notify();
}

#[tokio::test(flavor = "multi_thread")]
async fn subscribers_see_every_write_in_order() {
    let (shutdown, store) = launch(38919, StoreConfig::default()).await;
    let key = DocumentKey::new("games", "feed");

    let mut subscription = store.subscribe(&key).await.unwrap();
    let initial = timeout(Duration::from_secs(5), subscription.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(initial.version, 0);
    assert_eq!(initial.document, None);

    for turn in ["alice", "bob", "alice"] {
        store.set(&key, json!({ "playerTurn": turn })).await.unwrap();
    }

    for (version, turn) in [(1, "alice"), (2, "bob"), (3, "alice")] {
        let snapshot = timeout(Duration::from_secs(5), subscription.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(snapshot.version, version);
        assert_eq!(snapshot.document, Some(json!({ "playerTurn": turn })));
    }

    shutdown.notify();
}

#[tokio::test(flavor = "multi_thread")]
async fn rate_limited_writes_are_transient() {
    let (shutdown, store) = launch(
        38920,
        StoreConfig {
            writes_per_minute: 1,
            ..StoreConfig::default()
        },
    )
    .await;
    let key = DocumentKey::new("games", "limited");

    assert!(store.set(&key, json!({ "playerTurn": "alice" })).await.is_ok());
    let result = store.set(&key, json!({ "playerTurn": "bob" })).await;

    assert!(matches!(
        result,
        Err(StoreError::Unavailable(ref message)) if message.contains("429")
    ));
    assert_eq!(store.get(&key).await.unwrap().version, 1);

    shutdown.notify();
}
