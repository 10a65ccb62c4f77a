//! Tests for the per-game record store.

use tempfile::TempDir;

use tictactoe_backend::{Board, GameId, GameStatus, GameStore, GameUpdate, Symbol, apply_move};

/// Creates a store in a temporary directory; the directory handle must stay
/// in scope to keep the files alive.
fn setup_store() -> (TempDir, GameStore) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let store = GameStore::new(dir.path()).expect("Failed to create store");
    (dir, store)
}

fn game_id(raw: &str) -> GameId {
    raw.parse().expect("Invalid game id")
}

#[test]
fn test_create_game() {
    let (_dir, store) = setup_store();
    let id = game_id("abc123");

    let record = store.create(&id, &Board::new()).expect("Create failed");

    assert_eq!(record.game_id(), &id);
    assert_eq!(record.board().encode(), ".........x");
    assert_eq!(record.status(), &GameStatus::Active);
    assert!(record.player_x().is_none());
    assert!(record.player_o().is_none());
    assert!(*record.revision() > 0);
    assert!(store.path_for(&id).is_file());
}

#[test]
fn test_create_existing_game_conflicts() {
    let (_dir, store) = setup_store();
    let id = game_id("abc123");
    store.create(&id, &Board::new()).expect("First create failed");

    let err = store.create(&id, &Board::new()).unwrap_err();
    assert!(err.is_conflict());
}

#[test]
fn test_latest_unknown_game_not_found() {
    let (_dir, store) = setup_store();
    let err = store.latest(&game_id("nosuch")).unwrap_err();
    assert!(err.is_not_found());
    assert!(!store.exists(&game_id("nosuch")));
}

#[test]
fn test_append_then_latest_returns_newest() {
    let (_dir, store) = setup_store();
    let id = game_id("g1");
    let first = store.create(&id, &Board::new()).expect("Create failed");

    let (board, _) = apply_move(first.board(), Symbol::X, 4).expect("Move failed");
    let update = GameUpdate::from_record(&first)
        .with_holder(Symbol::X, "alice".to_string())
        .with_board(board);
    let appended = store
        .append(&id, *first.revision(), &update)
        .expect("Append failed");

    assert!(appended.revision() > first.revision());
    assert_eq!(appended.player_x().as_deref(), Some("alice"));

    let latest = store.latest(&id).expect("Latest failed");
    assert_eq!(latest, appended);
    assert_eq!(latest.board().encode(), "....x....o");
}

#[test]
fn test_append_stale_revision_conflicts() {
    let (_dir, store) = setup_store();
    let id = game_id("g1");
    let first = store.create(&id, &Board::new()).expect("Create failed");

    let update = GameUpdate::from_record(&first).with_holder(Symbol::X, "alice".to_string());
    store
        .append(&id, *first.revision(), &update)
        .expect("First append failed");

    let stale = GameUpdate::from_record(&first).with_holder(Symbol::X, "bob".to_string());
    let err = store.append(&id, *first.revision(), &stale).unwrap_err();
    assert!(err.is_conflict());

    let latest = store.latest(&id).expect("Latest failed");
    assert_eq!(latest.player_x().as_deref(), Some("alice"));
}

#[test]
fn test_append_unknown_game_not_found() {
    let (_dir, store) = setup_store();
    let update = GameUpdate::new(Board::new(), None, None, GameStatus::Active);
    let err = store.append(&game_id("nosuch"), 1, &update).unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn test_status_round_trips_through_storage() {
    let (_dir, store) = setup_store();
    let id = game_id("g1");
    let first = store.create(&id, &Board::new()).expect("Create failed");

    let won = GameUpdate::from_record(&first).with_status(GameStatus::Won("alice".to_string()));
    store
        .append(&id, *first.revision(), &won)
        .expect("Append failed");

    let latest = store.latest(&id).expect("Latest failed");
    assert_eq!(latest.status(), &GameStatus::Won("alice".to_string()));
}

#[test]
fn test_games_are_isolated() {
    let (_dir, store) = setup_store();
    let a = store.create(&game_id("a"), &Board::new()).expect("Create a failed");
    store.create(&game_id("b"), &Board::new()).expect("Create b failed");

    let update = GameUpdate::from_record(&a).with_holder(Symbol::O, "carol".to_string());
    store
        .append(&game_id("a"), *a.revision(), &update)
        .expect("Append failed");

    let b = store.latest(&game_id("b")).expect("Latest b failed");
    assert!(b.player_o().is_none());
}

#[test]
fn test_migrate_existing_game_is_noop() {
    let (_dir, store) = setup_store();
    let id = game_id("g1");
    store.create(&id, &Board::new()).expect("Create failed");

    assert_eq!(store.migrate(&id).expect("Migrate failed"), 0);
    assert!(store.migrate(&game_id("nosuch")).unwrap_err().is_not_found());
}
