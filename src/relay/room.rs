use rand::{seq::SliceRandom, Rng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::relay::ResponsePacket;

/// The quiz variant the clients render. The room only echoes it back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Letters,
    Pair,
    Input,
}

/// One connection's seat in a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub connection_id: String,
    pub user_id: String,
    pub display_label: String,
    pub ready: bool,
    pub progress_index: u32,
    pub correct_count: u32,
    pub finished: bool,
}

impl Player {
    fn new(connection_id: String, user_id: String, display_label: String) -> Player {
        Player {
            connection_id,
            user_id,
            display_label,
            ready: false,
            progress_index: 0,
            correct_count: 0,
            finished: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Winner {
    pub connection_id: String,
    pub user_id: String,
}

/// What a connection presents when it joins a room.
#[derive(Debug, Clone)]
pub struct JoinRequest {
    pub user_id: String,
    pub display_label: String,
    pub dictionary_id: i64,
    pub mode: Mode,
    pub word_count: Option<u32>,
    pub word_order_hint: Option<Vec<u32>>,
}

impl JoinRequest {
    /// The word count this joiner is offering, if any.
    ///
    /// An explicit `word_count` wins, otherwise the length of the suggested
    /// order is used. Zero is never an offer.
    fn offered_word_count(&self) -> Option<u32> {
        let from_hint = self
            .word_order_hint
            .as_ref()
            .and_then(|hint| u32::try_from(hint.len()).ok());

        self.word_count.or(from_hint).filter(|count| *count > 0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressReport {
    pub progress_index: u32,
    pub correct_count: u32,
    pub finished: bool,
}

/// A packet to fan out to the room, optionally skipping one connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outgoing {
    pub packet: ResponsePacket,
    pub skip: Option<String>,
}

impl Outgoing {
    pub fn all(packet: ResponsePacket) -> Outgoing {
        Outgoing { packet, skip: None }
    }

    pub fn all_except(connection_id: &str, packet: ResponsePacket) -> Outgoing {
        Outgoing {
            packet,
            skip: Some(connection_id.to_string()),
        }
    }
}

#[derive(Debug, Default)]
pub struct JoinOutcome {
    /// The connection whose seat was taken over by the joiner, if the same
    /// user was already seated under another connection.
    pub displaced: Option<String>,
    pub outgoing: Vec<Outgoing>,
}

/// The state of one multiplayer room.
///
/// A room is `Forming` until `started_at` is set and `InProgress` afterwards.
/// `word_order` and `started_at` are only ever written together, by `start`,
/// and never change again. Every mutating method returns the packets that
/// have to be fanned out to the room's members.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    room_id: String,
    dictionary_id: i64,
    mode: Mode,
    word_count: u32,
    word_order: Vec<u32>,
    started_at: Option<i64>,
    host_connection_id: Option<String>,
    winner: Option<Winner>,
    players: Vec<Player>,
}

impl Room {
    /// The fewest players a round can start with.
    pub const MIN_PLAYERS: usize = 2;

    pub fn new(room_id: String, dictionary_id: i64, mode: Mode) -> Room {
        Room {
            room_id,
            dictionary_id,
            mode,
            word_count: 0,
            word_order: Vec::new(),
            started_at: None,
            host_connection_id: None,
            winner: None,
            players: Vec::new(),
        }
    }

    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    pub fn dictionary_id(&self) -> i64 {
        self.dictionary_id
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn word_count(&self) -> u32 {
        self.word_count
    }

    pub fn word_order(&self) -> &[u32] {
        &self.word_order
    }

    pub fn started_at(&self) -> Option<i64> {
        self.started_at
    }

    pub fn host_connection_id(&self) -> Option<&str> {
        self.host_connection_id.as_deref()
    }

    pub fn winner(&self) -> Option<&Winner> {
        self.winner.as_ref()
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn player(&self, connection_id: &str) -> Option<&Player> {
        self.players
            .iter()
            .find(|player| player.connection_id == connection_id)
    }

    pub fn is_started(&self) -> bool {
        self.started_at.is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    fn player_mut(&mut self, connection_id: &str) -> Option<&mut Player> {
        self.players
            .iter_mut()
            .find(|player| player.connection_id == connection_id)
    }

    fn state(&self) -> Outgoing {
        Outgoing::all(ResponsePacket::State(self.clone()))
    }

    fn learn_word_count(&mut self, offered: Option<u32>) {
        if self.is_started() || self.word_count > 0 {
            return;
        }
        if let Some(count) = offered {
            debug!(room_id = %self.room_id, word_count = count, "word count fixed");
            self.word_count = count;
        }
    }

    /// Seats a connection in the room.
    ///
    /// A user that is already seated under another connection takes that
    /// seat over, keeping readiness and progress. The old connection is
    /// returned in `displaced` and no longer counts as a member.
    pub fn join(&mut self, connection_id: &str, request: JoinRequest) -> JoinOutcome {
        self.learn_word_count(request.offered_word_count());

        let mut displaced = None;
        if let Some(player) = self.player_mut(connection_id) {
            player.user_id = request.user_id;
            player.display_label = request.display_label;
        } else if let Some(player) = self
            .players
            .iter_mut()
            .find(|player| player.user_id == request.user_id)
        {
            let previous = std::mem::replace(&mut player.connection_id, connection_id.to_string());
            player.display_label = request.display_label;

            if self.host_connection_id.as_deref() == Some(previous.as_str()) {
                self.host_connection_id = Some(connection_id.to_string());
            }
            info!(
                room_id = %self.room_id,
                connection_id,
                previous = %previous,
                "player reconnected"
            );
            displaced = Some(previous);
        } else {
            self.players.push(Player::new(
                connection_id.to_string(),
                request.user_id,
                request.display_label,
            ));
        }

        if self.host_connection_id.is_none() {
            self.host_connection_id = Some(connection_id.to_string());
        }

        JoinOutcome {
            displaced,
            outgoing: vec![self.state()],
        }
    }

    /// Updates a player's readiness and runs the ready barrier.
    ///
    /// Has no effect once the room has started or if the flag is unchanged.
    pub fn set_ready<R: Rng + ?Sized>(
        &mut self,
        connection_id: &str,
        ready: bool,
        rng: &mut R,
        now: i64,
    ) -> Vec<Outgoing> {
        if self.is_started() {
            debug!(room_id = %self.room_id, connection_id, "ready ignored, room already started");
            return Vec::new();
        }
        let Some(player) = self.player_mut(connection_id) else {
            return Vec::new();
        };
        if player.ready == ready {
            return Vec::new();
        }
        player.ready = ready;

        let mut outgoing = Vec::new();
        if self.barrier_reached() {
            outgoing.extend(self.start(rng, now));
        }
        outgoing.push(self.state());
        outgoing
    }

    fn barrier_reached(&self) -> bool {
        self.players.len() >= Self::MIN_PLAYERS && self.players.iter().all(|player| player.ready)
    }

    /// Starts the room on behalf of its host, whatever the players' readiness.
    pub fn force_start<R: Rng + ?Sized>(
        &mut self,
        connection_id: &str,
        word_count: Option<u32>,
        rng: &mut R,
        now: i64,
    ) -> Vec<Outgoing> {
        if self.is_started() {
            return Vec::new();
        }
        if self.host_connection_id.as_deref() != Some(connection_id) {
            debug!(room_id = %self.room_id, connection_id, "start ignored, not the host");
            return Vec::new();
        }
        if self.players.len() < Self::MIN_PLAYERS {
            debug!(room_id = %self.room_id, "start ignored, not enough players");
            return Vec::new();
        }
        self.learn_word_count(word_count.filter(|count| *count > 0));

        match self.start(rng, now) {
            Some(started) => vec![started, self.state()],
            None => Vec::new(),
        }
    }

    // The only place where `word_order` and `started_at` are written.
    fn start<R: Rng + ?Sized>(&mut self, rng: &mut R, now: i64) -> Option<Outgoing> {
        if self.is_started() {
            return None;
        }
        if self.word_count == 0 {
            warn!(room_id = %self.room_id, "cannot start a room without words");
            return None;
        }

        let mut order: Vec<u32> = (0..self.word_count).collect();
        order.shuffle(rng);
        self.word_order = order;
        self.started_at = Some(now);

        info!(
            room_id = %self.room_id,
            players = self.players.len(),
            word_count = self.word_count,
            "room started"
        );

        Some(Outgoing::all(ResponsePacket::Started {
            room_id: self.room_id.clone(),
            started_at: now,
            word_order: self.word_order.clone(),
        }))
    }

    /// Applies a progress report from a player.
    ///
    /// Reports before the start and reports behind the recorded index are
    /// dropped. A player finishes only by reaching the last word; the client's
    /// `finished` flag is not trusted on its own. The first player to finish
    /// is latched as the winner.
    pub fn report_progress(&mut self, connection_id: &str, report: ProgressReport) -> Vec<Outgoing> {
        if !self.is_started() {
            debug!(room_id = %self.room_id, connection_id, "progress ignored, room not started");
            return Vec::new();
        }
        let word_count = self.word_count;
        let Some(player) = self
            .players
            .iter_mut()
            .find(|player| player.connection_id == connection_id)
        else {
            return Vec::new();
        };
        if report.progress_index < player.progress_index {
            debug!(
                connection_id,
                recorded = player.progress_index,
                reported = report.progress_index,
                "stale progress ignored"
            );
            return Vec::new();
        }

        let was_finished = player.finished;
        player.progress_index = report.progress_index.min(word_count);
        player.correct_count = player.correct_count.max(report.correct_count);
        player.finished = was_finished || player.progress_index >= word_count;
        if report.finished && !player.finished {
            debug!(
                connection_id,
                progress_index = player.progress_index,
                word_count,
                "finished flag ignored before the last word"
            );
        }

        let mut winner = None;
        if !was_finished && player.finished && self.winner.is_none() {
            winner = Some(Winner {
                connection_id: player.connection_id.clone(),
                user_id: player.user_id.clone(),
            });
        }

        let mut outgoing = Vec::new();
        if let Some(winner) = winner {
            info!(room_id = %self.room_id, connection_id, "winner decided");
            self.winner = Some(winner.clone());
            outgoing.push(self.state());
            outgoing.push(Outgoing::all(ResponsePacket::Winner {
                room_id: self.room_id.clone(),
                connection_id: winner.connection_id,
                user_id: winner.user_id,
            }));
        } else {
            outgoing.push(self.state());
        }
        outgoing
    }

    /// Relays a reload notice to everyone but the reloading connection.
    ///
    /// The notice names the seat it belongs to: the sender's own seat, or for a
    /// tab that has not rejoined yet, the seat held by the claimed `user_id`.
    /// Notices that match no seat are dropped.
    pub fn notify_reload(&self, connection_id: &str, user_id: &str) -> Vec<Outgoing> {
        let seat = self
            .player(connection_id)
            .or_else(|| self.players.iter().find(|player| player.user_id == user_id));
        let Some(seat) = seat else {
            debug!(room_id = %self.room_id, connection_id, user_id, "reload notice for unknown user dropped");
            return Vec::new();
        };

        vec![Outgoing::all_except(
            connection_id,
            ResponsePacket::PageReloaded {
                connection_id: connection_id.to_string(),
                user_id: seat.user_id.clone(),
                email: seat.display_label.clone(),
                started_at: self.started_at,
                player_count: self.players.len(),
            },
        )]
    }

    /// Removes a player. The host seat passes on in join order.
    ///
    /// A departure can complete the ready barrier: when the leaver was the
    /// only player not ready and at least two players remain, the room starts
    /// for them.
    pub fn leave<R: Rng + ?Sized>(&mut self, connection_id: &str, rng: &mut R, now: i64) -> Vec<Outgoing> {
        let Some(index) = self
            .players
            .iter()
            .position(|player| player.connection_id == connection_id)
        else {
            return Vec::new();
        };
        self.players.remove(index);

        if self.host_connection_id.as_deref() == Some(connection_id) {
            self.host_connection_id = self.players.first().map(|player| player.connection_id.clone());
        }
        if self.is_empty() {
            return Vec::new();
        }

        let mut outgoing = Vec::new();
        if !self.is_started() && self.barrier_reached() {
            outgoing.extend(self.start(rng, now));
        }
        outgoing.push(self.state());
        outgoing
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    const NOW: i64 = 1_700_000_000_000;

    fn request(user_id: &str, word_count: Option<u32>) -> JoinRequest {
        JoinRequest {
            user_id: user_id.to_string(),
            display_label: format!("{user_id}@example.com"),
            dictionary_id: 1,
            mode: Mode::Letters,
            word_count,
            word_order_hint: None,
        }
    }

    fn started_packets(outgoing: &[Outgoing]) -> usize {
        outgoing
            .iter()
            .filter(|item| matches!(item.packet, ResponsePacket::Started { .. }))
            .count()
    }

    fn winner_packets(outgoing: &[Outgoing]) -> usize {
        outgoing
            .iter()
            .filter(|item| matches!(item.packet, ResponsePacket::Winner { .. }))
            .count()
    }

    fn progress(progress_index: u32, finished: bool) -> ProgressReport {
        ProgressReport {
            progress_index,
            correct_count: progress_index,
            finished,
        }
    }

    fn started_room(rng: &mut StdRng) -> Room {
        let mut room = Room::new("R1".to_string(), 1, Mode::Pair);
        room.join("a", request("1", Some(10)));
        room.join("b", request("2", None));
        room.set_ready("a", true, rng, NOW);
        room.set_ready("b", true, rng, NOW);
        assert!(room.is_started());
        room
    }

    #[test]
    fn test_room_new() {
        let room = Room::new("R1".to_string(), 7, Mode::Input);

        assert_eq!(room.room_id(), "R1");
        assert_eq!(room.dictionary_id(), 7);
        assert_eq!(room.mode(), Mode::Input);
        assert!(room.is_empty());
        assert!(!room.is_started());
        assert!(room.word_order().is_empty());
    }

    #[test]
    fn test_join_broadcasts_state_and_sets_host() {
        let mut room = Room::new("R1".to_string(), 1, Mode::Letters);

        let outcome = room.join("a", request("1", Some(10)));
        assert_eq!(outcome.displaced, None);
        assert_eq!(outcome.outgoing.len(), 1);
        assert!(matches!(outcome.outgoing[0].packet, ResponsePacket::State(_)));

        room.join("b", request("2", Some(99)));
        assert_eq!(room.host_connection_id(), Some("a"));
        assert_eq!(room.word_count(), 10);

        let player = room.player("b").unwrap();
        assert!(!player.ready);
        assert_eq!(player.progress_index, 0);
        assert_eq!(player.correct_count, 0);
        assert!(!player.finished);
    }

    #[test]
    fn test_rejoin_same_connection_refreshes_label() {
        let mut room = Room::new("R1".to_string(), 1, Mode::Letters);
        room.join("a", request("1", Some(10)));

        let mut again = request("1", None);
        again.display_label = "renamed@example.com".to_string();
        let outcome = room.join("a", again);

        assert_eq!(outcome.displaced, None);
        assert_eq!(room.players().len(), 1);
        assert_eq!(room.player("a").unwrap().display_label, "renamed@example.com");
        assert_eq!(room.host_connection_id(), Some("a"));
    }

    #[test]
    fn test_word_count_from_hint() {
        let mut room = Room::new("R1".to_string(), 1, Mode::Letters);
        let mut join = request("1", None);
        join.word_order_hint = Some(vec![3, 1, 0, 2]);

        room.join("a", join);

        assert_eq!(room.word_count(), 4);
    }

    #[test]
    fn test_single_player_never_starts() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut room = Room::new("R1".to_string(), 1, Mode::Letters);
        room.join("a", request("1", Some(10)));

        let outgoing = room.set_ready("a", true, &mut rng, NOW);

        assert_eq!(started_packets(&outgoing), 0);
        assert!(!room.is_started());
        assert!(room.word_order().is_empty());
    }

    #[test]
    fn test_last_ready_player_starts_room_once() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut room = Room::new("R1".to_string(), 1, Mode::Letters);
        room.join("a", request("1", Some(10)));
        room.join("b", request("2", None));

        let outgoing = room.set_ready("a", true, &mut rng, NOW);
        assert_eq!(started_packets(&outgoing), 0);
        assert_eq!(room.started_at(), None);

        let outgoing = room.set_ready("b", true, &mut rng, NOW);
        assert_eq!(started_packets(&outgoing), 1);
        assert_eq!(room.started_at(), Some(NOW));

        let mut order = room.word_order().to_vec();
        order.sort_unstable();
        assert_eq!(order, (0..10).collect::<Vec<u32>>());

        let outgoing = room.set_ready("b", true, &mut rng, NOW + 5);
        assert!(outgoing.is_empty());
        assert_eq!(room.started_at(), Some(NOW));
    }

    #[test]
    fn test_started_packet_precedes_state() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut room = Room::new("R1".to_string(), 1, Mode::Letters);
        room.join("a", request("1", Some(5)));
        room.join("b", request("2", None));
        room.set_ready("a", true, &mut rng, NOW);

        let outgoing = room.set_ready("b", true, &mut rng, NOW);

        assert_eq!(outgoing.len(), 2);
        match (&outgoing[0].packet, &outgoing[1].packet) {
            (ResponsePacket::Started { word_order, .. }, ResponsePacket::State(snapshot)) => {
                assert_eq!(word_order.as_slice(), snapshot.word_order());
                assert_eq!(snapshot.started_at(), Some(NOW));
            }
            other => panic!("unexpected packets: {other:?}"),
        }
    }

    #[test]
    fn test_no_start_without_words() {
        let mut rng = StdRng::seed_from_u64(4);
        let mut room = Room::new("R1".to_string(), 1, Mode::Letters);
        room.join("a", request("1", None));
        room.join("b", request("2", None));
        room.set_ready("a", true, &mut rng, NOW);

        let outgoing = room.set_ready("b", true, &mut rng, NOW);

        assert_eq!(started_packets(&outgoing), 0);
        assert_eq!(room.started_at(), None);
        assert!(room.word_order().is_empty());
    }

    #[test]
    fn test_word_order_fixed_after_start() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut room = started_room(&mut rng);
        let order = room.word_order().to_vec();

        let mut late = request("3", Some(50));
        late.word_order_hint = Some(vec![0, 1]);
        let outcome = room.join("c", late);
        room.force_start("a", Some(3), &mut rng, NOW + 10);
        room.set_ready("c", true, &mut rng, NOW + 10);

        assert_eq!(room.word_order(), order.as_slice());
        assert_eq!(room.word_count(), 10);
        assert_eq!(room.started_at(), Some(NOW));
        match &outcome.outgoing[0].packet {
            ResponsePacket::State(snapshot) => assert_eq!(snapshot.word_order(), order.as_slice()),
            other => panic!("unexpected packet: {other:?}"),
        }
    }

    #[test]
    fn test_force_start_requires_host_and_two_players() {
        let mut rng = StdRng::seed_from_u64(6);
        let mut room = Room::new("R1".to_string(), 1, Mode::Letters);
        room.join("a", request("1", None));

        assert!(room.force_start("a", Some(4), &mut rng, NOW).is_empty());

        room.join("b", request("2", None));
        assert!(room.force_start("b", Some(4), &mut rng, NOW).is_empty());
        assert!(!room.is_started());

        let outgoing = room.force_start("a", Some(4), &mut rng, NOW);
        assert_eq!(started_packets(&outgoing), 1);
        assert_eq!(room.word_count(), 4);
        assert_eq!(room.word_order().len(), 4);
        assert!(room.force_start("a", Some(4), &mut rng, NOW).is_empty());
    }

    #[test]
    fn test_progress_is_non_decreasing() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut room = started_room(&mut rng);

        room.report_progress("a", progress(4, false));
        let outgoing = room.report_progress("a", progress(2, false));

        assert!(outgoing.is_empty());
        assert_eq!(room.player("a").unwrap().progress_index, 4);
        assert_eq!(room.player("a").unwrap().correct_count, 4);

        room.report_progress("a", progress(25, false));
        let player = room.player("a").unwrap();
        assert_eq!(player.progress_index, 10);
        assert!(player.finished);
    }

    #[test]
    fn test_progress_ignored_before_start() {
        let mut room = Room::new("R1".to_string(), 1, Mode::Letters);
        room.join("a", request("1", Some(10)));

        assert!(room.report_progress("a", progress(3, false)).is_empty());
        assert_eq!(room.player("a").unwrap().progress_index, 0);
    }

    #[test]
    fn test_first_finisher_wins_once() {
        let mut rng = StdRng::seed_from_u64(8);
        let mut room = started_room(&mut rng);

        let outgoing = room.report_progress("a", progress(10, true));
        assert_eq!(winner_packets(&outgoing), 1);
        assert_eq!(
            room.winner(),
            Some(&Winner {
                connection_id: "a".to_string(),
                user_id: "1".to_string(),
            })
        );

        let outgoing = room.report_progress("a", progress(10, true));
        assert_eq!(winner_packets(&outgoing), 0);

        let outgoing = room.report_progress("b", progress(10, true));
        assert_eq!(winner_packets(&outgoing), 0);
        assert!(room.player("b").unwrap().finished);
        assert_eq!(room.winner().unwrap().connection_id, "a");
    }

    #[test]
    fn test_finished_flag_without_reaching_end_is_ignored() {
        let mut rng = StdRng::seed_from_u64(13);
        let mut room = started_room(&mut rng);

        let outgoing = room.report_progress("b", progress(0, true));
        assert_eq!(winner_packets(&outgoing), 0);
        assert_eq!(room.winner(), None);
        assert!(!room.player("b").unwrap().finished);

        let outgoing = room.report_progress("b", progress(9, true));
        assert_eq!(winner_packets(&outgoing), 0);
        assert!(!room.player("b").unwrap().finished);

        let outgoing = room.report_progress("a", progress(10, false));
        assert_eq!(winner_packets(&outgoing), 1);
        assert_eq!(room.winner().unwrap().connection_id, "a");
        assert!(room.player("a").unwrap().finished);
    }

    #[test]
    fn test_reconnect_takes_over_seat() {
        let mut rng = StdRng::seed_from_u64(9);
        let mut room = started_room(&mut rng);
        room.report_progress("a", progress(6, false));

        let outcome = room.join("a2", request("1", None));

        assert_eq!(outcome.displaced.as_deref(), Some("a"));
        assert_eq!(room.players().len(), 2);
        assert!(room.player("a").is_none());
        assert_eq!(room.player("a2").unwrap().progress_index, 6);
        assert_eq!(room.host_connection_id(), Some("a2"));
    }

    #[test]
    fn test_reload_notice_skips_sender() {
        let mut rng = StdRng::seed_from_u64(10);
        let room = started_room(&mut rng);

        let outgoing = room.notify_reload("b", "2");

        assert_eq!(outgoing.len(), 1);
        assert_eq!(outgoing[0].skip.as_deref(), Some("b"));
        assert_eq!(
            outgoing[0].packet,
            ResponsePacket::PageReloaded {
                connection_id: "b".to_string(),
                user_id: "2".to_string(),
                email: "2@example.com".to_string(),
                started_at: Some(NOW),
                player_count: 2,
            }
        );
    }

    #[test]
    fn test_reload_notice_names_the_seat() {
        let mut rng = StdRng::seed_from_u64(14);
        let room = started_room(&mut rng);

        // A seated sender cannot speak for another seat.
        let outgoing = room.notify_reload("b", "1");
        match &outgoing[0].packet {
            ResponsePacket::PageReloaded { user_id, email, .. } => {
                assert_eq!(user_id, "2");
                assert_eq!(email, "2@example.com");
            }
            other => panic!("unexpected packet: {other:?}"),
        }

        // A tab that has not rejoined yet is matched by user id.
        let outgoing = room.notify_reload("b2", "2");
        assert_eq!(outgoing[0].skip.as_deref(), Some("b2"));
        match &outgoing[0].packet {
            ResponsePacket::PageReloaded {
                connection_id,
                user_id,
                email,
                ..
            } => {
                assert_eq!(connection_id, "b2");
                assert_eq!(user_id, "2");
                assert_eq!(email, "2@example.com");
            }
            other => panic!("unexpected packet: {other:?}"),
        }

        assert!(room.notify_reload("stranger", "99").is_empty());
    }

    #[test]
    fn test_leave_mid_game_keeps_room_running() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut room = started_room(&mut rng);

        let outgoing = room.leave("a", &mut rng, NOW);
        assert_eq!(outgoing.len(), 1);
        assert_eq!(room.host_connection_id(), Some("b"));

        room.report_progress("b", progress(3, false));
        assert_eq!(room.player("b").unwrap().progress_index, 3);

        assert!(room.leave("b", &mut rng, NOW).is_empty());
        assert!(room.is_empty());
        assert_eq!(room.host_connection_id(), None);
    }

    #[test]
    fn test_leave_completes_ready_barrier() {
        let mut rng = StdRng::seed_from_u64(12);
        let mut room = Room::new("R1".to_string(), 1, Mode::Letters);
        room.join("a", request("1", Some(6)));
        room.join("b", request("2", None));
        room.join("c", request("3", None));
        room.set_ready("a", true, &mut rng, NOW);
        room.set_ready("b", true, &mut rng, NOW);

        let outgoing = room.leave("c", &mut rng, NOW);

        assert_eq!(started_packets(&outgoing), 1);
        assert!(room.is_started());
    }
}
