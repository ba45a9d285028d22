//! Integration tests for the tournament lifecycle: registration, events,
//! persistence and restart recovery over the in-memory store.

use race_brackets::events::{ChannelSink, TournamentEvent};
use race_brackets::format::{
    FinishEntry, FormatName, MatchStart, PlayerEntry, RaceResult, SeedingStrategy,
};
use race_brackets::state::{MemoryStore, TournamentStateManager, TournamentStore};
use race_brackets::tournament::{
    TournamentConfig, TournamentError, TournamentManager, TournamentStatus,
};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;

fn player(i: usize) -> PlayerEntry {
    PlayerEntry::new(format!("p{i}"), format!("Player {i}")).with_rating(1500 - i as i32)
}

fn in_order_result(start: &MatchStart) -> RaceResult {
    RaceResult::new(
        start
            .match_record
            .participants
            .iter()
            .enumerate()
            .map(|(i, slot)| FinishEntry {
                participant_id: slot.participant_id.clone(),
                finish_position: (i + 1) as u32,
                race_time_ms: 95_000 + i as u64 * 700,
            })
            .collect(),
    )
}

fn config(format: FormatName) -> TournamentConfig {
    TournamentConfig {
        format,
        seeding: SeedingStrategy::Ranked,
        ..TournamentConfig::default()
    }
}

fn setup() -> (
    TournamentManager,
    Arc<MemoryStore>,
    UnboundedReceiver<TournamentEvent>,
) {
    let store = Arc::new(MemoryStore::new());
    let state = Arc::new(TournamentStateManager::new(
        store.clone() as Arc<dyn TournamentStore>
    ));
    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
    let manager = TournamentManager::new(state, Arc::new(ChannelSink::new(tx)));
    (manager, store, rx)
}

async fn run_to_completion(manager: &TournamentManager, id: uuid::Uuid) {
    let mut guard = 0;
    while let Some(start) = manager.start_next_match(id).await.unwrap() {
        if start.bye_outcome.is_none() {
            manager
                .submit_match_result(&start.match_record.id, in_order_result(&start))
                .await
                .unwrap();
        }
        guard += 1;
        assert!(guard <= 200, "tournament did not terminate");
    }
}

#[tokio::test]
async fn test_full_lifecycle_emits_expected_events() {
    let (manager, _store, mut rx) = setup();

    let id = manager
        .create_tournament("event cup", config(FormatName::SingleElimination))
        .await
        .unwrap();
    for i in 1..=4 {
        manager.register_player(id, player(i)).await.unwrap();
    }
    manager.start_tournament(id).await.unwrap();
    run_to_completion(&manager, id).await;

    let mut kinds = Vec::new();
    while let Ok(event) = rx.try_recv() {
        assert_eq!(event.tournament_id(), id);
        kinds.push(match event {
            TournamentEvent::Created { .. } => "created",
            TournamentEvent::Started { .. } => "started",
            TournamentEvent::MatchStarted { .. } => "match_started",
            TournamentEvent::MatchCompleted { .. } => "match_completed",
            TournamentEvent::RoundCompleted { .. } => "round_completed",
            TournamentEvent::Completed { .. } => "completed",
            TournamentEvent::Cancelled { .. } => "cancelled",
        });
    }

    assert_eq!(kinds.first(), Some(&"created"));
    assert_eq!(kinds.last(), Some(&"completed"));
    assert!(kinds.contains(&"started"));
    // 4 players, 3 matches, 2 rounds
    assert_eq!(kinds.iter().filter(|k| **k == "match_started").count(), 3);
    assert_eq!(kinds.iter().filter(|k| **k == "match_completed").count(), 3);
    assert_eq!(kinds.iter().filter(|k| **k == "round_completed").count(), 2);
    assert!(!kinds.contains(&"cancelled"));
}

#[tokio::test]
async fn test_match_started_carries_room_request() {
    let (manager, _store, mut rx) = setup();
    let id = manager
        .create_tournament(
            "room cup",
            TournamentConfig {
                race_time_limit_secs: 240,
                ..config(FormatName::SingleElimination)
            },
        )
        .await
        .unwrap();
    for i in 1..=4 {
        manager.register_player(id, player(i)).await.unwrap();
    }
    manager.start_tournament(id).await.unwrap();
    let start = manager.start_next_match(id).await.unwrap().unwrap();

    let room_request = loop {
        match rx.try_recv().unwrap() {
            TournamentEvent::MatchStarted { room_request, .. } => break room_request,
            _ => continue,
        }
    };
    assert_eq!(room_request.match_id, start.match_record.id);
    assert_eq!(room_request.participants.len(), 2);
    assert_eq!(room_request.race_time_limit_secs, 240);

    manager.bind_room(&start.match_record.id, "room-42").await.unwrap();
}

#[tokio::test]
async fn test_persistence_tracks_transitions() {
    let (manager, store, _rx) = setup();
    let id = manager
        .create_tournament("durable cup", config(FormatName::SingleElimination))
        .await
        .unwrap();

    let snap = store.load_snapshot(id).await.unwrap();
    assert_eq!(snap.status, TournamentStatus::Registration);

    for i in 1..=4 {
        manager.register_player(id, player(i)).await.unwrap();
    }
    manager.start_tournament(id).await.unwrap();
    let snap = store.load_snapshot(id).await.unwrap();
    assert_eq!(snap.status, TournamentStatus::Active);
    assert_eq!(snap.players.len(), 4);

    run_to_completion(&manager, id).await;
    let snap = store.load_snapshot(id).await.unwrap();
    assert_eq!(snap.status, TournamentStatus::Completed);
    let standings = snap.standings.unwrap();
    assert_eq!(standings.len(), 4);

    // match history was recorded for all 3 matches
    let history = store.match_history(id).await.unwrap();
    assert_eq!(history.len(), 3);
    assert!(history.iter().all(|r| r.winner.is_some()));
}

#[tokio::test]
async fn test_cancellation_rejects_orphan_results() {
    let (manager, store, mut rx) = setup();
    let id = manager
        .create_tournament("doomed cup", config(FormatName::RoundRobin))
        .await
        .unwrap();
    for i in 1..=4 {
        manager.register_player(id, player(i)).await.unwrap();
    }
    manager.start_tournament(id).await.unwrap();
    let start = manager.start_next_match(id).await.unwrap().unwrap();

    manager.cancel_tournament(id, "server maintenance").await.unwrap();

    assert!(matches!(
        manager
            .submit_match_result(&start.match_record.id, in_order_result(&start))
            .await,
        Err(TournamentError::MatchNotFound(_))
    ));

    let snap = store.load_snapshot(id).await.unwrap();
    assert_eq!(snap.status, TournamentStatus::Cancelled);

    let mut saw_cancelled = false;
    while let Ok(event) = rx.try_recv() {
        if matches!(event, TournamentEvent::Cancelled { .. }) {
            saw_cancelled = true;
        }
    }
    assert!(saw_cancelled);
}

#[tokio::test]
async fn test_restore_resumes_active_tournament() {
    let store = Arc::new(MemoryStore::new());

    // first process: play half the tournament, then vanish
    {
        let state = Arc::new(TournamentStateManager::new(
            store.clone() as Arc<dyn TournamentStore>
        ));
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        let manager = TournamentManager::new(state, Arc::new(ChannelSink::new(tx)));
        let id = manager
            .create_tournament("interrupted cup", config(FormatName::SingleElimination))
            .await
            .unwrap();
        for i in 1..=4 {
            manager.register_player(id, player(i)).await.unwrap();
        }
        manager.start_tournament(id).await.unwrap();
        // complete round 1 only
        for _ in 0..2 {
            let start = manager.start_next_match(id).await.unwrap().unwrap();
            manager
                .submit_match_result(&start.match_record.id, in_order_result(&start))
                .await
                .unwrap();
        }
    }

    // second process: restore and finish
    let state = Arc::new(TournamentStateManager::new(
        store.clone() as Arc<dyn TournamentStore>
    ));
    let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
    let manager = TournamentManager::new(state, Arc::new(ChannelSink::new(tx)));

    let restored = manager.restore_active().await.unwrap();
    assert_eq!(restored, 1);

    let active = manager
        .list_tournaments(Some(TournamentStatus::Active))
        .await;
    assert_eq!(active.len(), 1);
    let id = active[0].id;

    run_to_completion(&manager, id).await;
    let tournament = manager.tournament(id).await.unwrap();
    assert_eq!(tournament.status, TournamentStatus::Completed);
    let standings = manager.final_standings(id).await.unwrap().unwrap();
    assert_eq!(standings.len(), 4);
}

#[tokio::test]
async fn test_restore_skips_finished_tournaments() {
    let store = Arc::new(MemoryStore::new());
    {
        let state = Arc::new(TournamentStateManager::new(
            store.clone() as Arc<dyn TournamentStore>
        ));
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        let manager = TournamentManager::new(state, Arc::new(ChannelSink::new(tx)));
        let id = manager
            .create_tournament("done cup", config(FormatName::SingleElimination))
            .await
            .unwrap();
        for i in 1..=4 {
            manager.register_player(id, player(i)).await.unwrap();
        }
        manager.start_tournament(id).await.unwrap();
        run_to_completion(&manager, id).await;
    }

    let state = Arc::new(TournamentStateManager::new(
        store as Arc<dyn TournamentStore>
    ));
    let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
    let manager = TournamentManager::new(state, Arc::new(ChannelSink::new(tx)));
    assert_eq!(manager.restore_active().await.unwrap(), 0);
}

#[tokio::test]
async fn test_deadline_closes_registration() {
    let (manager, _store, _rx) = setup();
    let id = manager
        .create_tournament(
            "late cup",
            TournamentConfig {
                registration_deadline: Some(chrono::Utc::now() - chrono::Duration::minutes(5)),
                ..config(FormatName::SingleElimination)
            },
        )
        .await
        .unwrap();

    assert!(matches!(
        manager.register_player(id, player(1)).await,
        Err(TournamentError::RegistrationClosed)
    ));
}

#[tokio::test]
async fn test_deadline_auto_starts_viable_roster() {
    let store = Arc::new(MemoryStore::new());
    let state = Arc::new(TournamentStateManager::new(
        store as Arc<dyn TournamentStore>
    ));
    let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
    let manager = TournamentManager::new(state, Arc::new(ChannelSink::new(tx)));

    let id = manager
        .create_tournament(
            "deadline cup",
            TournamentConfig {
                registration_deadline: Some(chrono::Utc::now() + chrono::Duration::milliseconds(50)),
                ..config(FormatName::SingleElimination)
            },
        )
        .await
        .unwrap();
    for i in 1..=4 {
        manager.register_player(id, player(i)).await.unwrap();
    }
    tokio::time::sleep(std::time::Duration::from_millis(80)).await;

    // the late registration is refused but triggers the start check
    assert!(matches!(
        manager.register_player(id, player(5)).await,
        Err(TournamentError::RegistrationClosed)
    ));
    let tournament = manager.tournament(id).await.unwrap();
    assert_eq!(tournament.status, TournamentStatus::Active);
}

#[tokio::test]
async fn test_career_stats_accumulate_across_tournaments() {
    let (manager, _store, _rx) = setup();

    for _ in 0..2 {
        let id = manager
            .create_tournament("series race", config(FormatName::SingleElimination))
            .await
            .unwrap();
        for i in 1..=4 {
            manager.register_player(id, player(i)).await.unwrap();
        }
        manager.start_tournament(id).await.unwrap();
        run_to_completion(&manager, id).await;
    }

    let stats = manager.state().player_stats("p1").await.unwrap().unwrap();
    assert_eq!(stats.tournaments_played, 2);
    assert_eq!(stats.tournaments_won, 2);
    assert_eq!(stats.favorite_format(), Some("single_elimination"));
}
