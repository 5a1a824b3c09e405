//! Transposition table behavior across replacement, persistence and
//! concurrent access.

use std::sync::Arc;
use std::time::Duration;

use honeycomb_core::tt::PersistenceStatus;
use honeycomb_core::{TTEntry, TTFlag, TranspositionTable};

fn table_at(dir: &tempfile::TempDir) -> TranspositionTable {
    TranspositionTable::with_path(dir.path().join("table.bin"))
}

#[test]
fn replacement_is_depth_preferred() {
    let dir = tempfile::tempdir().unwrap();
    let table = table_at(&dir);
    table.put(7, TTEntry::new(5, 1, TTFlag::Exact, -1));
    table.put(7, TTEntry::new(8, 3, TTFlag::LowerBound, 12));
    table.put(7, TTEntry::new(4, 2, TTFlag::UpperBound, 9));

    assert_eq!(table.get(7), Some(TTEntry::new(8, 3, TTFlag::LowerBound, 12)));

    let last = table.last_update().unwrap();
    assert_eq!(last.previous, Some(TTEntry::new(8, 3, TTFlag::LowerBound, 12)));
    assert_eq!(last.stored, TTEntry::new(8, 3, TTFlag::LowerBound, 12));
    assert!(!last.replaced);
}

#[test]
fn save_then_load_reproduces_entries_bit_for_bit() {
    let dir = tempfile::tempdir().unwrap();
    let table = table_at(&dir);
    table.put(7, TTEntry::new(8, 3, TTFlag::LowerBound, 12));
    table.put(0, TTEntry::new(-40, 10, TTFlag::Exact, 0));
    table.put(u64::MAX >> 8, TTEntry::new(1, 2, TTFlag::UpperBound, 54));
    table.save().unwrap();

    let restored = table_at(&dir);
    restored.load().unwrap();
    assert_eq!(restored.size(), 3);
    for key in [7, 0, u64::MAX >> 8] {
        assert_eq!(restored.get(key), table.get(key), "key {key}");
    }
}

#[test]
fn concurrent_loads_share_one_future() {
    let dir = tempfile::tempdir().unwrap();
    let table = table_at(&dir);
    assert_eq!(table.status(), PersistenceStatus::NotLoaded);
    let first = table.load_async();
    let second = table.load_async();
    assert!(first.same_as(&second));
    first.wait().unwrap();
    second.wait().unwrap();
    assert_eq!(table.status(), PersistenceStatus::Ready);
}

#[test]
fn status_transitions_are_broadcast() {
    let dir = tempfile::tempdir().unwrap();
    let table = table_at(&dir);
    let events = table.subscribe();

    table.load().unwrap();
    table.save().unwrap();

    let mut seen = Vec::new();
    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    while seen.len() < 4 && std::time::Instant::now() < deadline {
        if let Ok(status) = events.recv_timeout(Duration::from_millis(100)) {
            seen.push(status);
        }
    }
    assert_eq!(
        seen,
        vec![
            PersistenceStatus::Loading,
            PersistenceStatus::Ready,
            PersistenceStatus::Saving,
            PersistenceStatus::Ready,
        ]
    );
}

#[test]
fn gets_and_puts_race_safely_with_saves() {
    let dir = tempfile::tempdir().unwrap();
    let table = Arc::new(table_at(&dir));

    let mut handles = Vec::new();
    for worker in 0..4u64 {
        let table = table.clone();
        handles.push(std::thread::spawn(move || {
            for i in 0..500u64 {
                let key = (worker << 32) | i;
                table.put(key, TTEntry::new(i as i32, (i % 7) as i32, TTFlag::Exact, -1));
                let _ = table.get(key);
            }
        }));
    }
    let saver = {
        let table = table.clone();
        std::thread::spawn(move || {
            for _ in 0..5 {
                table.save().unwrap();
            }
        })
    };
    for handle in handles {
        handle.join().unwrap();
    }
    saver.join().unwrap();
    assert_eq!(table.size(), 4 * 500);
}

#[test]
fn search_entries_survive_a_round_trip() {
    use honeycomb_core::{GameState, SearchConstraints, Searcher};

    let dir = tempfile::tempdir().unwrap();
    let table = Arc::new(table_at(&dir));
    let mut searcher = Searcher::new(table.clone()).unwrap();
    searcher
        .search(&GameState::open(), &SearchConstraints::depth(3).unwrap())
        .unwrap();
    let entries_before = table.size();
    assert!(entries_before > 0);
    table.save().unwrap();

    let restored = Arc::new(table_at(&dir));
    restored.load().unwrap();
    assert_eq!(restored.size(), entries_before);

    // A searcher over the restored table starts warm.
    let mut warm = Searcher::new(restored).unwrap();
    let warm_result = warm
        .search(&GameState::open(), &SearchConstraints::depth(3).unwrap())
        .unwrap();
    assert!(warm_result.telemetry.total_tt_hits() > 0);
}
