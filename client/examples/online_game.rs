use std::{env, time::Duration};

use sweeper_client::{
    HttpStore, MoveOutcome, OnlineConfig, OnlineGameSession, Pos, SessionError, SessionEvent,
};
use tokio::time::timeout;

type Session = OnlineGameSession<HttpStore>;

/// Processes notifications until one replaces the board.
async fn wait_for_update(
    name: &str,
    session: &mut Session,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    loop {
        match timeout(Duration::from_secs(5), session.next_event()).await? {
            Some(Ok(SessionEvent::Updated { state, my_turn })) => {
                println!("📋 {} sees {:?}, my turn: {}", name, state, my_turn);
                return Ok(());
            }
            Some(Ok(event)) => println!("📋 {} got {:?}", name, event),
            Some(Err(e)) => return Err(e.into()),
            None => return Err("subscription ended".into()),
        }
    }
}

/// First covered cell in scan order.
fn next_target(session: &Session) -> Option<Pos> {
    let board = session.board()?;
    board
        .positions()
        .find(|&pos| board.cell(pos).is_some_and(|cell| !cell.is_revealed()))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt::init();

    let base_url =
        env::var("SWEEPER_STORE_URL").unwrap_or_else(|_| "http://localhost:8000".to_string());
    let store = HttpStore::new(&base_url)?;
    let game_id = store.allocate_id("games").await?;
    println!("🎮 Game ID: {}", game_id);

    let players = ["alice".to_string(), "bob".to_string()];
    let mut alice = OnlineGameSession::open(
        store.clone(),
        OnlineConfig::new(game_id.clone(), players.clone(), "alice"),
    )
    .await?;
    let mut bob = OnlineGameSession::open(store, OnlineConfig::new(game_id, players, "bob")).await?;

    wait_for_update("alice", &mut alice).await?;
    wait_for_update("bob", &mut bob).await?;

    // Bob tries to jump the queue.
    if let Some(pos) = next_target(&bob) {
        match bob.attempt_reveal(pos).await {
            Err(SessionError::NotYourTurn) => println!("⛔ bob must wait for alice"),
            other => println!("Unexpected: {:?}", other),
        }
    }

    while !alice.state().is_terminal() {
        let (name, mover, watcher) = if alice.is_my_turn() {
            ("alice", &mut alice, &mut bob)
        } else {
            ("bob", &mut bob, &mut alice)
        };
        let Some(pos) = next_target(mover) else {
            break;
        };

        match mover.attempt_reveal(pos).await? {
            MoveOutcome::Submitted { outcome, .. } => {
                println!("➡️  {} revealed {} ({:?})", name, pos, outcome);
            }
            MoveOutcome::Ignored(reason) => println!("{} move ignored: {:?}", name, reason),
        }

        wait_for_update(name, mover).await?;
        wait_for_update("opponent", watcher).await?;
        println!("{}", alice.turn_indicator());
    }

    if let Some(banner) = alice.banner() {
        println!("{}", banner.title());
    }
    Ok(())
}
