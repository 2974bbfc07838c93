//! Property tests for the quantified invariants.

use proptest::prelude::*;
use uuid::Uuid;

use two_rooms::game::constants::{CODE_ALPHABET, CODE_LENGTH};
use two_rooms::game::entities::{GameConfig, RoomId};
use two_rooms::hostage_quota;
use two_rooms::journal::{Audience, EventJournal, GameEvent, Scope};

proptest! {
    /// The quota is always 1..=3, never grows with the round number, and
    /// never shrinks with the player count.
    #[test]
    fn hostage_quota_is_sane(player_count in 6usize..=30, round in 1u8..=5) {
        let quota = hostage_quota(player_count, round);
        prop_assert!((1..=3).contains(&quota));
        if round > 1 {
            prop_assert!(quota <= hostage_quota(player_count, round - 1));
        }
        if player_count > 6 {
            prop_assert!(quota >= hostage_quota(player_count - 1, round));
        }
        // A room can always supply its quota (leader excluded).
        let smaller_room = player_count / 2;
        prop_assert!(quota < smaller_room);
    }

    /// Splitting any legal roster down the middle keeps the rooms within
    /// one player of each other.
    #[test]
    fn midpoint_split_keeps_rooms_balanced(player_count in 6usize..=30) {
        let mid = player_count / 2;
        let room_a = mid;
        let room_b = player_count - mid;
        prop_assert!(room_a.abs_diff(room_b) <= 1);
        prop_assert_eq!(room_a + room_b, player_count);
    }

    /// Generated codes always have the advertised shape.
    #[test]
    fn room_codes_stay_in_the_clean_alphabet(_seed in 0u32..64) {
        let code = two_rooms::controller::store::generate_room_code();
        prop_assert_eq!(code.len(), CODE_LENGTH);
        for ch in code.bytes() {
            prop_assert!(CODE_ALPHABET.contains(&ch));
            prop_assert!(![b'I', b'O', b'0', b'1'].contains(&ch));
        }
    }

    /// Default duration schedules always match the round count.
    #[test]
    fn duration_schedule_matches_round_count(total in prop::sample::select(vec![3u8, 5])) {
        let config = GameConfig::for_rounds(total);
        prop_assert_eq!(config.round_durations.len(), usize::from(total));
        // Descending schedule: later rounds are never longer.
        for pair in config.round_durations.windows(2) {
            prop_assert!(pair[0] >= pair[1]);
        }
    }

    /// Sequences stay gapless from 1 no matter how events are scoped, and
    /// replay-after never returns anything at or before the ack point.
    #[test]
    fn journal_sequences_are_gapless(
        scopes in prop::collection::vec(0u8..3, 1..200),
        acked in 0u64..250,
    ) {
        let mut journal = EventJournal::default();
        let me = Uuid::new_v4();
        let someone = Uuid::new_v4();
        for pick in &scopes {
            let (scope, audience) = match pick {
                0 => (Scope::Public, Audience::Everyone),
                1 => (Scope::Room(RoomId::A), Audience::Players(vec![me])),
                _ => (Scope::Player(someone), Audience::Players(vec![someone])),
            };
            journal.append(scope, GameEvent::ParlayEnded, audience);
        }

        let seqs: Vec<u64> = journal.iter().map(|r| r.sequence).collect();
        prop_assert_eq!(seqs.len(), scopes.len());
        for (idx, seq) in seqs.iter().enumerate() {
            prop_assert_eq!(*seq, idx as u64 + 1);
        }

        let replay = journal.entries_after(acked, me);
        prop_assert!(replay.iter().all(|r| r.sequence > acked));
        // Within the replay the visible subsequence is strictly ordered.
        prop_assert!(replay.windows(2).all(|w| w[0].sequence < w[1].sequence));
        // Player-scoped records for someone else never reach `me`.
        prop_assert!(replay
            .iter()
            .all(|r| !matches!(r.scope, Scope::Player(p) if p == someone)));
    }
}
