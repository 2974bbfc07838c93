//! Hostage quota, toggling, locking, and the exchange at scale.

use std::sync::Arc;
use std::time::Duration;

use two_rooms::catalog::standard::standard_catalog;
use two_rooms::controller::{CommandError, GameHandle, GameStore, JoinedGame};
use two_rooms::game::command::{Command, CommandKind};
use two_rooms::game::validator::ErrorCode;
use two_rooms::{CharacterId, PlayerId, RoomId};

const ELEVEN_PLAYER_DECK: [&str; 11] = [
    "president",
    "bomber",
    "vice_president",
    "martyr",
    "doctor",
    "engineer",
    "blue_agent",
    "red_agent",
    "gambler",
    "blue_citizen",
    "red_citizen",
];

async fn new_game(count: usize) -> (GameStore, GameHandle, Vec<JoinedGame>) {
    let store = GameStore::new(Arc::new(standard_catalog().unwrap()));
    let (handle, host) = store.create_game("host").await.unwrap();
    let code = host.code.clone();
    let mut players = vec![host];
    for i in 1..count {
        players.push(store.join_game(&code, &format!("p{i}")).await.unwrap());
    }
    (store, handle, players)
}

async fn run(handle: &GameHandle, player: PlayerId, kind: CommandKind) {
    handle
        .execute(Command::new(player, kind.clone()))
        .await
        .unwrap_or_else(|e| panic!("{} failed: {e:?}", kind.type_name()));
}

async fn start_game(handle: &GameHandle, players: &[JoinedGame], deck: &[&str]) {
    let host = players[0].player_id;
    run(handle, host, CommandKind::LockRoom).await;
    run(handle, host, CommandKind::StartRoleSelection).await;
    run(
        handle,
        host,
        CommandKind::SelectRoles {
            roles: deck.iter().map(|s| CharacterId::new(s)).collect(),
        },
    )
    .await;
    run(handle, host, CommandKind::ConfirmRoles).await;
    run(handle, host, CommandKind::StartGame).await;
}

async fn room_members(handle: &GameHandle, room: RoomId) -> Vec<PlayerId> {
    handle
        .public_state()
        .await
        .unwrap()
        .room_assignments
        .iter()
        .filter(|(_, r)| **r == room)
        .map(|(p, _)| *p)
        .collect()
}

async fn elect_all(handle: &GameHandle) {
    for room in [RoomId::A, RoomId::B] {
        let members = room_members(handle, room).await;
        for voter in &members {
            run(
                handle,
                *voter,
                CommandKind::NominateLeader {
                    room,
                    candidate: members[0],
                },
            )
            .await;
        }
    }
}

#[tokio::test(start_paused = true)]
async fn eleven_players_toggle_and_limit_hostages() {
    let (_store, handle, players) = new_game(11).await;
    start_game(&handle, &players, &ELEVEN_PLAYER_DECK).await;
    elect_all(&handle).await;

    // Rooms split 5/6.
    let in_a = room_members(&handle, RoomId::A).await;
    let in_b = room_members(&handle, RoomId::B).await;
    assert_eq!(in_a.len().abs_diff(in_b.len()), 1);

    // Run out round 1 (default 300 s).
    tokio::time::sleep(Duration::from_secs(302)).await;
    assert!(handle.public_state().await.unwrap().paused);

    let leader = handle.public_state().await.unwrap().leader_a.unwrap();
    let room = RoomId::A;
    let candidates: Vec<PlayerId> = in_a.iter().copied().filter(|p| *p != leader).collect();
    let (a, b, c) = (candidates[0], candidates[1], candidates[2]);

    // Round 1 with 11 players: quota is 2.
    run(&handle, leader, CommandKind::SelectHostage { room, target: a }).await;
    run(&handle, leader, CommandKind::SelectHostage { room, target: b }).await;

    // A third selection is refused with the limit error.
    let err = handle
        .execute(Command::new(
            leader,
            CommandKind::SelectHostage { room, target: c },
        ))
        .await
        .unwrap_err();
    match err {
        CommandError::Rejected(errors) => {
            assert_eq!(errors[0].code, ErrorCode::LimitReached)
        }
        other => panic!("expected limit error, got {other:?}"),
    }

    // Re-selecting b toggles b off; c then fits.
    run(&handle, leader, CommandKind::SelectHostage { room, target: b }).await;
    run(&handle, leader, CommandKind::SelectHostage { room, target: c }).await;
    run(&handle, leader, CommandKind::LockHostages { room }).await;

    // Locked rooms accept no further changes.
    let err = handle
        .execute(Command::new(
            leader,
            CommandKind::SelectHostage { room, target: a },
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, CommandError::Rejected(_)));

    // The other side locks its own two, then parlay and exchange.
    let leader_b = handle.public_state().await.unwrap().leader_b.unwrap();
    let targets: Vec<PlayerId> = in_b.iter().copied().filter(|p| *p != leader_b).collect();
    run(
        &handle,
        leader_b,
        CommandKind::SelectHostage { room: RoomId::B, target: targets[0] },
    )
    .await;
    run(
        &handle,
        leader_b,
        CommandKind::SelectHostage { room: RoomId::B, target: targets[1] },
    )
    .await;
    run(&handle, leader_b, CommandKind::LockHostages { room: RoomId::B }).await;

    let snapshot = handle.public_state().await.unwrap();
    assert!(snapshot.parlay_active);

    tokio::time::sleep(Duration::from_secs(31)).await;
    let snapshot = handle.public_state().await.unwrap();
    assert!(!snapshot.parlay_active);
    assert_eq!(snapshot.current_round, 2);

    // The two selected from A now sit in B and vice versa; sizes kept.
    let now_b = room_members(&handle, RoomId::B).await;
    assert!(now_b.contains(&a) && now_b.contains(&c));
    let now_a = room_members(&handle, RoomId::A).await;
    assert!(now_a.contains(&targets[0]) && now_a.contains(&targets[1]));
    assert_eq!(now_a.len().abs_diff(now_b.len()), 1);
}

#[tokio::test(start_paused = true)]
async fn room_sizes_stay_balanced_across_all_rounds() {
    let (_store, handle, players) = new_game(6).await;
    let deck = [
        "president",
        "bomber",
        "blue_agent",
        "red_agent",
        "gambler",
        "traveler",
    ];
    start_game(&handle, &players, &deck).await;
    elect_all(&handle).await;

    for secs in [300u64, 180, 60] {
        tokio::time::sleep(Duration::from_secs(secs + 2)).await;
        let snapshot = handle.public_state().await.unwrap();
        for room in [RoomId::A, RoomId::B] {
            let leader = match room {
                RoomId::A => snapshot.leader_a.unwrap(),
                RoomId::B => snapshot.leader_b.unwrap(),
            };
            let members = room_members(&handle, room).await;
            let target = *members.iter().find(|m| **m != leader).unwrap();
            run(&handle, leader, CommandKind::SelectHostage { room, target }).await;
            run(&handle, leader, CommandKind::LockHostages { room }).await;
        }
        tokio::time::sleep(Duration::from_secs(31)).await;

        let a = room_members(&handle, RoomId::A).await;
        let b = room_members(&handle, RoomId::B).await;
        // P1: disjoint cover of all players. P2: sizes within one.
        assert_eq!(a.len() + b.len(), 6);
        assert!(a.iter().all(|p| !b.contains(p)));
        assert!(a.len().abs_diff(b.len()) <= 1);
    }

    assert_eq!(
        handle.public_state().await.unwrap().phase,
        two_rooms::Phase::Finished
    );
    // P7: everyone ends with a room and a role.
    for player in &players {
        let view = handle.private_view(player.player_id).await.unwrap();
        assert!(view.current_role.is_some());
    }
    let snapshot = handle.public_state().await.unwrap();
    assert_eq!(snapshot.room_assignments.len(), 6);
}

#[tokio::test(start_paused = true)]
async fn locking_short_of_quota_is_refused() {
    let (_store, handle, players) = new_game(6).await;
    let deck = [
        "president",
        "bomber",
        "blue_agent",
        "red_agent",
        "gambler",
        "traveler",
    ];
    start_game(&handle, &players, &deck).await;
    elect_all(&handle).await;
    tokio::time::sleep(Duration::from_secs(302)).await;

    let leader = handle.public_state().await.unwrap().leader_a.unwrap();
    let err = handle
        .execute(Command::new(
            leader,
            CommandKind::LockHostages { room: RoomId::A },
        ))
        .await
        .unwrap_err();
    match err {
        CommandError::Rejected(errors) => {
            assert_eq!(errors[0].code, ErrorCode::LimitReached);
            assert!(errors[0].message.contains("0 of 1"));
        }
        other => panic!("expected quota error, got {other:?}"),
    }
}
