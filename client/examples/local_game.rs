use sweeper_client::{GameConfig, LocalGameSession, Pos};

fn print_board(game: &LocalGameSession) {
    let size = game.board().size();
    for row in 0..size {
        let line: Vec<String> = (0..size)
            .map(|col| match game.display(Pos::new(row, col)) {
                Some(cell) if cell.label().is_empty() => " .".to_string(),
                Some(cell) => format!("{:>2}", cell.label()),
                None => "  ".to_string(),
            })
            .collect();
        println!("{}", line.join(" "));
    }
    println!("{}", game.status_line());
}

fn main() {
    tracing_subscriber::fmt::init();

    let config = GameConfig::new(8, 0.15).with_seed(2024);
    let mut game = LocalGameSession::new_game(&config);
    println!(
        "🎮 New {}x{} game with {} mines",
        config.size,
        config.size,
        game.board().mine_count()
    );

    // Flag every mine first, then open the rest; flagged cells are skipped
    // by reveals, so the seeded board is always cleared.
    let positions: Vec<Pos> = game.board().positions().collect();
    for &pos in &positions {
        if game.board().cell(pos).is_some_and(|cell| cell.has_mine()) {
            game.toggle_flag(pos);
        }
    }

    for pos in positions {
        let result = game.handle_reveal(pos);
        if !result.is_empty() {
            println!("Revealed {} cells from {}", result.changed.len(), pos);
        }
        if game.state().is_terminal() {
            break;
        }
    }

    print_board(&game);
    if let Some(banner) = game.banner() {
        println!("{}", banner.title());
    }
    if let Some(score) = game.score("demo") {
        println!("Score: {:?}", score);
    }
}
