//! The per-room game loop: a timed, multi-round question/answer state
//! machine.
//!
//! The loop owns all game state and selects between two sources: client
//! events forwarded by the socket read tasks, and the room's single
//! re-armable [`RoundTimer`]. Every transition that starts a countdown
//! re-arms the timer and stamps the broadcast with `Exp = now + duration`
//! so clients render the same countdown the server enforces.
//!
//! ```text
//! WaitingStart → Greetings → ReadingRound → ReadingThemes
//!      → ChooseQuestion ⇄ Getting ⇄ Answering → (ChooseQuestion | Final)
//! ```
//!
//! All state lives inside the loop task. The hub keeps the game's roster
//! in sync through [`GameInput::Connected`] / [`GameInput::Gone`]; the
//! game never reads hub-owned data.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::mpsc;

use sigame_auth::{Authenticator, Claims};
use sigame_pack::{Pack, PackLease, PackUid, Question, Theme};
use sigame_protocol::{
    required_roles, ChooseQuestPayload, ClientEvent, ClientEventKind,
    DisconnectPayload, FinalPayload, GetQuestPayload, GreetingsPayload,
    JoinPayload, ReadingRoundPayload, ReadingThemesPayload, Role,
    ScoreChangedPayload, ServerEvent, ServerEventKind, TakenQuestPayload,
};

use crate::hub::HubHandle;
use crate::{Client, RoundTimer};

/// Game input queue depth. Socket read tasks enqueue without waiting;
/// a client that overflows the queue is dropped.
pub const EVENT_QUEUE_CAPACITY: usize = 64;

// Phase durations. Each transition that changes the countdown re-arms
// the room timer with exactly one of these, and the broadcast `Exp`
// carries the same value.
const IDLE_TIMEOUT: Duration = Duration::from_secs(20 * 60);
const GREETINGS_DURATION: Duration = Duration::from_secs(10);
const READING_ROUND_DURATION: Duration = Duration::from_secs(4);
const READING_THEME_SECS: u64 = 3;
const WALL_DURATION: Duration = Duration::from_secs(30);
const PICK_DURATION: Duration = Duration::from_secs(10);
const ANSWERING_DURATION: Duration = Duration::from_secs(20);
const FINAL_DURATION: Duration = Duration::from_secs(5 * 60);

/// The game's high-level state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Room open, nobody started the game yet. Idles out after 20 min.
    WaitingStart,
    /// Pack name/author shown to everyone.
    Greetings,
    /// The upcoming round's name is read out.
    ReadingRound,
    /// The round's theme names are read out, 3 s each.
    ReadingThemes,
    /// The wall is up; a player picks (or the timer auto-picks).
    ChooseQuestion,
    /// A question is on offer; players may buzz in.
    Getting,
    /// The current player answers; the leader adjudicates.
    Answering,
    /// Reserved: not entered by the normal flow.
    Pause,
    /// Game over. The room idles out after the final countdown.
    Final,
}

/// Everything that can wake the game loop besides the timer.
pub enum GameInput {
    /// A deserialized frame from a client's read task.
    Event(ClientEvent),
    /// The hub admitted a client.
    Connected(Arc<Client>),
    /// The hub removed a client (unregistered, slow, or socket gone).
    Gone(String),
}

/// Handle for feeding a running game. Cheap to clone.
#[derive(Clone)]
pub struct GameHandle {
    tx: mpsc::Sender<GameInput>,
}

impl GameHandle {
    /// Wraps a game input sender. The registry wires this up; tests
    /// building rooms by hand use it too.
    pub fn new(tx: mpsc::Sender<GameInput>) -> Self {
        Self { tx }
    }

    /// Enqueues a client event without waiting.
    ///
    /// Returns `false` when the queue is full or the game is gone; the
    /// read task reacts by unregistering its client.
    pub fn try_event(&self, event: ClientEvent) -> bool {
        self.tx.try_send(GameInput::Event(event)).is_ok()
    }
}

/// A seated player. The client back-reference never extends the
/// connection's lifetime — the hub decides when sockets close.
struct Player {
    client: Arc<Client>,
    queue_id: usize,
    score: i64,
}

/// How the question currently on the floor got resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Resolution {
    /// Leader accepted the answer: credit the current player.
    Accepted,
    /// Leader declined: debit the current player.
    Declined,
    /// Nobody buzzed in before the offer expired. No scoring.
    PickTimeout,
    /// The current player ran out of time: counts as wrong.
    AnswerTimeout,
}

/// One room's game state and loop.
pub struct Game {
    pack: Pack,
    /// Pins the extracted pack files; released on shutdown.
    lease: Option<PackLease>,
    hub: HubHandle,
    auth: Arc<Authenticator>,
    rx: mpsc::Receiver<GameInput>,
    /// Tells the registry to prune this room after the loop exits.
    closed_tx: mpsc::UnboundedSender<PackUid>,

    step: Step,
    /// Roster mirror maintained from hub notifications, keyed by token.
    clients: HashMap<String, Arc<Client>>,
    players: HashMap<String, Player>,
    /// Queue ids are dense, 1-based, and never reused within a room.
    queue_by_token: HashMap<String, usize>,
    token_by_queue: HashMap<usize, String>,

    current_player: usize,
    current_round: usize,
    current_theme: usize,
    current_question: usize,

    timer: RoundTimer,
}

impl Game {
    /// Builds a game over an already-opened pack.
    ///
    /// `lease` is `None` only in tests that drive the loop without a
    /// pack store behind it.
    pub fn new(
        pack: Pack,
        lease: Option<PackLease>,
        hub: HubHandle,
        auth: Arc<Authenticator>,
        rx: mpsc::Receiver<GameInput>,
        closed_tx: mpsc::UnboundedSender<PackUid>,
    ) -> Self {
        Self {
            pack,
            lease,
            hub,
            auth,
            rx,
            closed_tx,
            step: Step::WaitingStart,
            clients: HashMap::new(),
            players: HashMap::new(),
            queue_by_token: HashMap::new(),
            token_by_queue: HashMap::new(),
            current_player: 0,
            current_round: 0,
            current_theme: 0,
            current_question: 0,
            timer: RoundTimer::new(),
        }
    }

    /// Runs the loop until a terminal state or idle timeout, then
    /// releases the pack lease and closes the hub.
    pub async fn run(mut self) {
        self.timer.arm(IDLE_TIMEOUT);
        tracing::info!(pack = %self.pack.name, "game loop started");

        loop {
            let shutdown = tokio::select! {
                input = self.rx.recv() => match input {
                    Some(GameInput::Event(event)) => {
                        self.handle_event(event).await;
                        false
                    }
                    Some(GameInput::Connected(client)) => {
                        self.clients.insert(client.token().to_owned(), client);
                        false
                    }
                    Some(GameInput::Gone(token)) => {
                        self.clients.remove(&token);
                        self.remove_player(&token).await;
                        false
                    }
                    None => true,
                },
                _ = self.timer.fired() => self.handle_timeout().await,
            };

            if shutdown {
                break;
            }
        }

        tracing::info!(pack = %self.pack.name, "game loop stopped");
        // Release order matters: drop the lease (possibly deleting the
        // extracted pack), shut the hub down, then let the registry prune.
        self.lease.take();
        self.hub.close().await;
        let _ = self.closed_tx.send(self.pack.uid);
    }

    // -----------------------------------------------------------------------
    // Client events
    // -----------------------------------------------------------------------

    async fn handle_event(&mut self, event: ClientEvent) {
        // Token first: a stale or forged token unregisters the sender
        // regardless of what it asked for.
        let claims = match self.auth.verify(&event.token) {
            Ok(claims) => claims,
            Err(err) => {
                tracing::info!(error = %err, "event token rejected");
                if let Some(client) = self.clients.get(&event.token) {
                    client.send_error(&format!("token rejected: {err}"));
                }
                self.hub.unregister(&event.token).await;
                return;
            }
        };
        // The signature check above already enforces `exp`, but the
        // deadline is re-checked explicitly so in-session expiry cannot
        // slip through validator leeway.
        if claims.is_expired_at(Utc::now().timestamp()) {
            if let Some(client) = self.clients.get(&event.token) {
                client.send_error("token expired");
            }
            self.hub.unregister(&event.token).await;
            return;
        }

        let Some(client) = self.clients.get(&event.token).cloned() else {
            // Event from a connection the hub no longer knows. Drop it.
            return;
        };

        let allowed = required_roles(event.kind);
        if !allowed.is_empty() && !allowed.contains(&client.role()) {
            client.send_error("permission denied");
            return;
        }

        match event.kind {
            ClientEventKind::StartGame => self.start_game(&client).await,
            ClientEventKind::Join => self.join(&client, &claims).await,
            ClientEventKind::Disconnect => self.remove_player(&event.token).await,
            ClientEventKind::ChooseQuest => self.choose_quest(&event).await,
            ClientEventKind::GetQuest => self.get_quest(&event.token).await,
            ClientEventKind::AcceptAnswer => {
                self.resolve(Resolution::Accepted).await
            }
            ClientEventKind::DeclineAnswer => {
                self.resolve(Resolution::Declined).await
            }
            // Reserved: answers are adjudicated by the leader, so the
            // event passes the role check and stops here.
            ClientEventKind::GiveAnswer => {}
        }
    }

    async fn start_game(&mut self, client: &Client) {
        if self.players.is_empty() {
            client.send_error("cannot start game: no players");
            return;
        }
        if self.step != Step::WaitingStart {
            return;
        }

        self.step = Step::Greetings;
        self.current_player = 1;
        self.timer.arm(GREETINGS_DURATION);

        let payload = GreetingsPayload {
            name: self.pack.name.clone(),
            author: self.pack.author.clone(),
            date: self.pack.date.clone(),
        };
        self.broadcast(ServerEventKind::Greetings, &payload, Some(GREETINGS_DURATION))
            .await;
        tracing::info!(players = self.players.len(), "game started");
    }

    async fn join(&mut self, client: &Arc<Client>, claims: &Claims) {
        // The leader hosts; they are announced but never seated.
        if client.role() == Role::Leader {
            let payload = JoinPayload {
                queue_id: 0,
                nickname: claims.login.clone(),
                image_uid: String::new(),
            };
            self.broadcast(ServerEventKind::Join, &payload, None).await;
            return;
        }

        let token = client.token().to_owned();
        let queue_id = match self.queue_by_token.get(&token) {
            // Re-join keeps the original queue id; the score restarts.
            Some(&existing) => existing,
            None => {
                let next = self.queue_by_token.len() + 1;
                self.queue_by_token.insert(token.clone(), next);
                self.token_by_queue.insert(next, token.clone());
                next
            }
        };

        self.players.insert(
            token,
            Player {
                client: Arc::clone(client),
                queue_id,
                score: 0,
            },
        );

        let payload = JoinPayload {
            queue_id,
            nickname: claims.login.clone(),
            image_uid: String::new(),
        };
        self.broadcast(ServerEventKind::Join, &payload, None).await;
        tracing::info!(queue_id, nickname = %claims.login, "player joined");
    }

    async fn remove_player(&mut self, token: &str) {
        let Some(player) = self.players.remove(token) else {
            return;
        };
        // Queue mappings are kept so ids are never reassigned.
        let payload = DisconnectPayload {
            queue_id: player.queue_id,
        };
        self.broadcast(ServerEventKind::Disconnect, &payload, None).await;
        tracing::info!(queue_id = player.queue_id, "player left");
    }

    async fn choose_quest(&mut self, event: &ClientEvent) {
        let payload: ChooseQuestPayload = match event.payload() {
            Ok(payload) => payload,
            Err(err) => {
                tracing::debug!(error = %err, "bad choose_quest payload");
                return;
            }
        };

        // Only a question still on the wall can be chosen.
        let available = self
            .current_round_ref()
            .and_then(|round| {
                round.themes.iter().find(|t| t.id == payload.theme_id)
            })
            .and_then(|theme| {
                theme.quests.iter().find(|q| q.id == payload.question_id)
            })
            .is_some_and(Question::available);
        if !available {
            return;
        }

        self.current_theme = payload.theme_id;
        self.current_question = payload.question_id;
        self.step = Step::Getting;
        self.timer.arm(PICK_DURATION);
        self.broadcast(ServerEventKind::ChooseQuest, &payload, Some(PICK_DURATION))
            .await;
    }

    async fn get_quest(&mut self, token: &str) {
        if self.step != Step::Getting {
            return;
        }
        // Only a seated playing client may buzz in.
        let Some(player) = self.players.get(token) else {
            return;
        };
        if player.client.role() != Role::User {
            return;
        }
        let queue_id = player.queue_id;

        self.step = Step::Answering;
        self.current_player = queue_id;
        self.timer.arm(ANSWERING_DURATION);
        self.broadcast(
            ServerEventKind::TakenQuest,
            &TakenQuestPayload { queue_id },
            Some(ANSWERING_DURATION),
        )
        .await;
    }

    // -----------------------------------------------------------------------
    // Timer
    // -----------------------------------------------------------------------

    /// Handles the round timer firing. Returns `true` to shut the room down.
    async fn handle_timeout(&mut self) -> bool {
        match self.step {
            // Nobody started a game, or the final countdown ran out.
            Step::WaitingStart | Step::Final => return true,

            Step::Greetings => {
                if self.current_round < self.pack.rounds.len() {
                    self.current_round += 1;
                    self.step = Step::ReadingRound;
                    self.timer.arm(READING_ROUND_DURATION);
                    let payload = ReadingRoundPayload {
                        name: self.pack.rounds[self.current_round - 1].name.clone(),
                    };
                    self.broadcast(
                        ServerEventKind::ReadingRound,
                        &payload,
                        Some(READING_ROUND_DURATION),
                    )
                    .await;
                } else {
                    self.step = Step::Final;
                    self.timer.arm(FINAL_DURATION);
                    self.broadcast(
                        ServerEventKind::Final,
                        &FinalPayload { winner_id: 1 },
                        Some(FINAL_DURATION),
                    )
                    .await;
                }
            }

            Step::ReadingRound => {
                let Some(round) = self.current_round_ref() else {
                    return true;
                };
                let names: Vec<String> =
                    round.themes.iter().map(|t| t.name.clone()).collect();
                let duration =
                    Duration::from_secs(READING_THEME_SECS * names.len() as u64);

                self.step = Step::ReadingThemes;
                self.timer.arm(duration);
                self.broadcast(
                    ServerEventKind::ReadingThemes,
                    &ReadingThemesPayload { theme_names: names },
                    Some(duration),
                )
                .await;
            }

            Step::ReadingThemes => {
                self.step = Step::ChooseQuestion;
                self.timer.arm(WALL_DURATION);
                self.broadcast_wall(Some(WALL_DURATION)).await;
            }

            Step::ChooseQuestion => {
                // Nobody picked in time: offer the first question still
                // on the wall.
                let pick = self.current_round_ref().and_then(|round| {
                    round.themes.iter().find_map(|theme| {
                        theme
                            .quests
                            .iter()
                            .find(|q| q.available())
                            .map(|q| (theme.id, q.id))
                    })
                });

                match pick {
                    Some((theme_id, question_id)) => {
                        self.current_theme = theme_id;
                        self.current_question = question_id;
                        self.step = Step::Getting;
                        self.timer.arm(PICK_DURATION);
                        self.broadcast(
                            ServerEventKind::GetQuest,
                            &GetQuestPayload {
                                queue_id: self.current_player,
                            },
                            Some(PICK_DURATION),
                        )
                        .await;
                    }
                    // The wall is dry: move the game along.
                    None => self.advance_round_or_finish().await,
                }
            }

            Step::Getting => self.resolve(Resolution::PickTimeout).await,
            Step::Answering => self.resolve(Resolution::AnswerTimeout).await,

            Step::Pause => {}
        }

        false
    }

    // -----------------------------------------------------------------------
    // Question resolution
    // -----------------------------------------------------------------------

    /// Resolves the question currently on the floor: consume it exactly
    /// once, apply scoring, advance the wall (or the round, or finish),
    /// and broadcast the outcome.
    async fn resolve(&mut self, resolution: Resolution) {
        // A question can only be consumed once; a second accept/decline
        // for the same floor is a stale event and is ignored.
        let Some(price) = self.consume_current_question() else {
            return;
        };
        // The floor is empty until the next pick. Without this reset a
        // stale adjudication after a round advance would land on the new
        // round's question at the same coordinates.
        self.current_theme = 0;
        self.current_question = 0;

        let scored = match resolution {
            Resolution::Accepted => self.score_current_player(price),
            Resolution::Declined | Resolution::AnswerTimeout => {
                self.score_current_player(-price)
            }
            Resolution::PickTimeout => None,
        };

        let mut winner = None;
        let duration = if !self.round_exhausted() {
            self.step = Step::ChooseQuestion;
            match resolution {
                Resolution::Accepted => WALL_DURATION,
                _ => PICK_DURATION,
            }
        } else if self.current_round < self.pack.rounds.len() {
            self.current_round += 1;
            self.step = Step::ChooseQuestion;
            WALL_DURATION
        } else {
            self.step = Step::Final;
            winner = Some(self.winner_queue_id());
            FINAL_DURATION
        };
        self.timer.arm(duration);

        match resolution {
            Resolution::Accepted => {
                self.broadcast(
                    ServerEventKind::AnswerAccepted,
                    &(),
                    Some(duration),
                )
                .await;
            }
            Resolution::Declined => {
                self.broadcast(
                    ServerEventKind::AnswerDeclined,
                    &(),
                    Some(duration),
                )
                .await;
            }
            Resolution::PickTimeout => {
                self.broadcast_wall(Some(duration)).await;
            }
            // The score change below carries the new deadline.
            Resolution::AnswerTimeout => {}
        }

        if let Some(score) = scored {
            self.rotate_current_player();
            let exp = match resolution {
                Resolution::AnswerTimeout => Some(duration),
                _ => None,
            };
            self.broadcast(
                ServerEventKind::ScoreChanged,
                &ScoreChangedPayload {
                    queue_id: self.current_player,
                    score,
                },
                exp,
            )
            .await;
        }

        if let Some(winner_id) = winner {
            self.broadcast(
                ServerEventKind::Final,
                &FinalPayload { winner_id },
                Some(FINAL_DURATION),
            )
            .await;
            tracing::info!(winner_id, "game finished");
        }
    }

    /// Marks the question on the floor consumed and returns its price.
    /// `None` when there is no valid question or it was already consumed.
    fn consume_current_question(&mut self) -> Option<i64> {
        let round = self
            .pack
            .rounds
            .get_mut(self.current_round.wrapping_sub(1))?;
        let theme = round
            .themes
            .iter_mut()
            .find(|t| t.id == self.current_theme)?;
        let quest = theme
            .quests
            .iter_mut()
            .find(|q| q.id == self.current_question)?;

        if !quest.available() {
            return None;
        }
        let price = quest.price;
        quest.price = -1;
        Some(price)
    }

    /// Applies `delta` to the current player's score. Returns the new
    /// score, or `None` when the current player left the roster.
    fn score_current_player(&mut self, delta: i64) -> Option<i64> {
        let token = self.token_by_queue.get(&self.current_player)?;
        let player = self.players.get_mut(token)?;
        player.score += delta;
        tracing::debug!(
            queue_id = player.queue_id,
            score = player.score,
            "score changed"
        );
        Some(player.score)
    }

    /// Whether every question of the current round has been consumed.
    fn round_exhausted(&self) -> bool {
        self.current_round_ref()
            .map(|round| {
                round
                    .themes
                    .iter()
                    .all(|t| t.quests.iter().all(|q| !q.available()))
            })
            .unwrap_or(true)
    }

    /// Moves the floor to the next seated player, in queue order,
    /// wrapping around. Skips queue ids whose player has left.
    fn rotate_current_player(&mut self) {
        if self.players.is_empty() {
            return;
        }
        let highest = self.queue_by_token.len();
        let mut next = self.current_player;
        for _ in 0..highest {
            next = if next >= highest { 1 } else { next + 1 };
            if let Some(token) = self.token_by_queue.get(&next) {
                if self.players.contains_key(token) {
                    self.current_player = next;
                    return;
                }
            }
        }
    }

    /// The queue id of the highest-scoring player; ties go to the
    /// earliest joiner.
    fn winner_queue_id(&self) -> usize {
        let mut seats: Vec<(usize, i64)> = self
            .players
            .values()
            .map(|p| (p.queue_id, p.score))
            .collect();
        seats.sort_by_key(|(queue_id, _)| *queue_id);

        let mut best: Option<(usize, i64)> = None;
        for (queue_id, score) in seats {
            match best {
                Some((_, top)) if score <= top => {}
                _ => best = Some((queue_id, score)),
            }
        }
        best.map(|(queue_id, _)| queue_id).unwrap_or(1)
    }

    /// Advances to the next round, or finishes the game when none is
    /// left. Used when the wall runs dry outside question resolution.
    async fn advance_round_or_finish(&mut self) {
        if self.current_round < self.pack.rounds.len() {
            self.current_round += 1;
            self.step = Step::ChooseQuestion;
            self.timer.arm(WALL_DURATION);
            self.broadcast_wall(Some(WALL_DURATION)).await;
        } else {
            self.step = Step::Final;
            self.timer.arm(FINAL_DURATION);
            let winner_id = self.winner_queue_id();
            self.broadcast(
                ServerEventKind::Final,
                &FinalPayload { winner_id },
                Some(FINAL_DURATION),
            )
            .await;
        }
    }

    // -----------------------------------------------------------------------
    // Broadcast plumbing
    // -----------------------------------------------------------------------

    fn current_round_ref(&self) -> Option<&sigame_pack::Round> {
        self.pack.rounds.get(self.current_round.wrapping_sub(1))
    }

    /// Serializes and fans out a server event. `duration` becomes the
    /// absolute `Exp` deadline; `None` sends `Exp = 0`.
    async fn broadcast<T: Serialize>(
        &self,
        kind: ServerEventKind,
        payload: &T,
        duration: Option<Duration>,
    ) {
        let exp = duration
            .map(|d| Utc::now().timestamp() + d.as_secs() as i64)
            .unwrap_or(0);

        let event = match ServerEvent::new(kind, exp, payload) {
            Ok(event) => event,
            Err(err) => {
                tracing::error!(error = %err, ?kind, "failed to encode server event");
                return;
            }
        };
        match event.to_frame() {
            Ok(frame) => self.hub.broadcast(frame).await,
            Err(err) => {
                tracing::error!(error = %err, ?kind, "failed to encode frame")
            }
        }
    }

    /// Broadcasts the current round's wall (theme trees with consumed
    /// prices visible as `-1`).
    async fn broadcast_wall(&self, duration: Option<Duration>) {
        #[derive(Serialize)]
        struct WallData<'a> {
            #[serde(rename = "Themes")]
            themes: &'a [Theme],
        }

        let themes: &[Theme] = self
            .current_round_ref()
            .map(|round| round.themes.as_slice())
            .unwrap_or(&[]);
        self.broadcast(ServerEventKind::Wall, &WallData { themes }, duration)
            .await;
    }
}
