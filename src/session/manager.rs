//! Session manager: the core match state machine
//!
//! This module orchestrates pairing, room lifecycle, question distribution,
//! result collection, rating settlement and teardown. It is the single owner
//! of the Room Registry; every room transition goes through it.

use crate::config::{RatingConfig, SessionSettings};
use crate::error::{Result, SessionError};
use crate::gateway::events::{
    MatchCreatedPayload, MatchFinishedPayload, MatchFoundPayload, MatchReadyPayload,
    QuestionPayload, ServerEvent,
};
use crate::gateway::registry::EventSink;
use crate::metrics::MetricsCollector;
use crate::questions::QuestionSupplier;
use crate::rating::EloEngine;
use crate::session::registry::RoomRegistry;
use crate::session::room::{Room, RoomState};
use crate::store::{SessionStore, SettlementUpdate};
use crate::types::{
    MatchId, MatchOutcome, MatchState, PlayerId, PlayerSettlement, SettlementSummary, UserProfile,
};
use crate::utils::{current_timestamp, generate_match_id, ratings_within_window};
use chrono::Duration as ChronoDuration;
use std::sync::{Arc, RwLock};
use tokio::sync::Mutex;
use tokio::time::interval;
use tracing::{debug, error, info, warn};

/// Statistics about session manager operations
#[derive(Debug, Clone, Default)]
pub struct SessionStats {
    /// Total pairing requests handled
    pub pairing_requests: u64,
    /// Total rooms created
    pub rooms_created: u64,
    /// Total pairings that joined an existing room
    pub rooms_joined: u64,
    /// Total matches settled
    pub matches_settled: u64,
    /// Total matches cancelled or voided before settlement
    pub matches_cancelled: u64,
    /// Total rooms reclaimed by the reaper
    pub rooms_reaped: u64,
    /// Current number of live rooms
    pub active_rooms: usize,
    /// Current number of rooms waiting for an opponent
    pub waiting_rooms: usize,
}

/// What a pairing request resolved to
enum PairingResolution {
    /// A new room was created; the player is waiting
    Created(MatchId),
    /// The player joined an existing room; the round must be distributed
    Joined(MatchId),
}

/// Snapshot taken under the registry lock when a room completes
struct CompletedRound {
    participants: Vec<PlayerId>,
    reported: Vec<u32>,
    outcome: MatchOutcome,
    total_questions: usize,
}

/// The main session manager
pub struct SessionManager {
    /// In-memory room registry, owned exclusively by this manager
    rooms: RoomRegistry,
    /// Durable store for users, match records and questions
    store: Arc<dyn SessionStore>,
    /// Push seam into the connection gateway
    sink: Arc<dyn EventSink>,
    /// Question batch supplier
    supplier: QuestionSupplier,
    /// Pure rating engine
    rating: EloEngine,
    /// Session settings (pairing window, batch size, reap timeouts)
    config: SessionSettings,
    /// Serializes the pairing search+create/join sequence and cancellation
    pairing_lock: Mutex<()>,
    /// Manager statistics
    stats: Arc<RwLock<SessionStats>>,
    /// Metrics collector
    metrics: Arc<MetricsCollector>,
}

impl SessionManager {
    /// Create a new session manager
    pub fn new(
        store: Arc<dyn SessionStore>,
        sink: Arc<dyn EventSink>,
        config: SessionSettings,
        rating_config: RatingConfig,
    ) -> Result<Self> {
        Self::with_metrics(
            store,
            sink,
            config,
            rating_config,
            Arc::new(MetricsCollector::default()),
        )
    }

    /// Create a new session manager with an explicit metrics collector
    pub fn with_metrics(
        store: Arc<dyn SessionStore>,
        sink: Arc<dyn EventSink>,
        config: SessionSettings,
        rating_config: RatingConfig,
        metrics: Arc<MetricsCollector>,
    ) -> Result<Self> {
        let supplier = QuestionSupplier::new(store.clone(), config.questions_per_match);
        Ok(Self {
            rooms: RoomRegistry::new(),
            store,
            sink,
            supplier,
            rating: EloEngine::new(rating_config)?,
            config,
            pairing_lock: Mutex::new(()),
            stats: Arc::new(RwLock::new(SessionStats::default())),
            metrics,
        })
    }

    /// Handle a pairing request.
    ///
    /// Joins the first room waiting within the pairing window, or creates a
    /// new one. The search+create/join sequence is atomic with respect to
    /// other pairing requests; store failure leaves no state behind.
    pub async fn request_match(&self, player_id: &str) -> Result<MatchId> {
        info!("Pairing request from player '{}'", player_id);
        self.metrics.session().pairing_requests_total.inc();
        self.bump_stats(|s| s.pairing_requests += 1)?;

        let resolution = {
            let _guard = self.pairing_lock.lock().await;

            let profile = self.load_or_create_profile(player_id).await?;
            if profile.match_state != MatchState::None {
                warn!(
                    "Rejecting pairing request: player '{}' is {}",
                    player_id, profile.match_state
                );
                return Err(SessionError::AlreadyInMatchOrPairing {
                    player_id: player_id.to_string(),
                }
                .into());
            }

            let rating = profile.rating;
            let window = self.config.pairing_window;
            let candidate = self.rooms.find_waiting(|room| {
                room.creator().as_str() != player_id
                    && ratings_within_window(room.creator_rating(), rating, window)
            })?;

            match candidate {
                Some(room) => self.join_room(&room, player_id).await?,
                None => self.create_room(player_id, rating).await?,
            }
        };

        self.refresh_room_gauges()?;

        match resolution {
            PairingResolution::Created(match_id) => {
                self.sink
                    .send_to(
                        player_id,
                        ServerEvent::MatchCreated(MatchCreatedPayload { match_id }),
                    )
                    .await?;
                Ok(match_id)
            }
            PairingResolution::Joined(match_id) => {
                // Distribution happens outside the pairing lock: the room is
                // already InProgress and invisible to other searches.
                self.distribute_round(match_id).await?;
                Ok(match_id)
            }
        }
    }

    /// Create a fresh room with the requester as sole participant
    async fn create_room(&self, player_id: &str, rating: i32) -> Result<PairingResolution> {
        let match_id = generate_match_id();
        let record = crate::types::MatchRecord::open(
            match_id,
            player_id.to_string(),
            current_timestamp(),
        );

        self.store.create_match(record).await.map_err(|e| {
            warn!("Failed to persist match record for '{}': {}", player_id, e);
            SessionError::StoreUnavailable {
                message: e.to_string(),
            }
        })?;

        if let Err(e) = self
            .store
            .set_match_state(player_id, MatchState::Pairing)
            .await
        {
            // Roll the record back out so nothing is left behind.
            warn!("Failed to mark '{}' as pairing, rolling back: {}", player_id, e);
            if let Err(rollback) = self.store.void_match(match_id).await {
                error!("Rollback of match {} failed: {}", match_id, rollback);
            }
            return Err(SessionError::StoreUnavailable {
                message: e.to_string(),
            }
            .into());
        }

        self.rooms
            .insert(Room::new(match_id, player_id.to_string(), rating))?;

        info!(
            "Created room {} for player '{}' (rating {})",
            match_id, player_id, rating
        );
        self.metrics.session().rooms_created_total.inc();
        self.bump_stats(|s| s.rooms_created += 1)?;

        Ok(PairingResolution::Created(match_id))
    }

    /// Join an existing waiting room as its second participant
    async fn join_room(&self, room: &Room, player_id: &str) -> Result<PairingResolution> {
        let match_id = room.id();
        let creator = room.creator().clone();

        self.store
            .set_match_state(player_id, MatchState::InMatch)
            .await
            .map_err(|e| SessionError::StoreUnavailable {
                message: e.to_string(),
            })?;

        if let Err(e) = self.store.set_match_state(&creator, MatchState::InMatch).await {
            self.revert_match_state(player_id, MatchState::None).await;
            return Err(SessionError::StoreUnavailable {
                message: e.to_string(),
            }
            .into());
        }

        if let Err(e) = self.store.set_second_participant(match_id, player_id).await {
            self.revert_match_state(player_id, MatchState::None).await;
            self.revert_match_state(&creator, MatchState::Pairing).await;
            return Err(SessionError::StoreUnavailable {
                message: e.to_string(),
            }
            .into());
        }

        if let Err(e) = self
            .rooms
            .with_room(match_id, |room| room.join(player_id.to_string()))
        {
            // The room vanished between search and join; undo the writes.
            self.revert_match_state(player_id, MatchState::None).await;
            self.revert_match_state(&creator, MatchState::None).await;
            return Err(e);
        }

        info!(
            "Player '{}' joined room {} against '{}'",
            player_id, match_id, creator
        );
        self.metrics.session().rooms_joined_total.inc();
        self.bump_stats(|s| s.rooms_joined += 1)?;

        self.sink
            .broadcast_to_room(
                &[creator, player_id.to_string()],
                ServerEvent::MatchFound(MatchFoundPayload {
                    match_id,
                    players: self
                        .rooms
                        .snapshot(match_id)?
                        .map(|r| r.participants().to_vec())
                        .unwrap_or_default(),
                }),
            )
            .await?;

        Ok(PairingResolution::Joined(match_id))
    }

    /// Best-effort compensation write, logged on failure
    async fn revert_match_state(&self, player_id: &str, state: MatchState) {
        if let Err(e) = self.store.set_match_state(player_id, state).await {
            error!(
                "Compensation write failed: could not reset '{}' to {}: {}",
                player_id, state, e
            );
        }
    }

    /// Cancel a pending pairing request.
    ///
    /// Valid only while the player's room is still waiting for an opponent;
    /// an in-progress match cannot be torn down through this path.
    pub async fn cancel_match(&self, player_id: &str) -> Result<()> {
        let _guard = self.pairing_lock.lock().await;

        let room = self.rooms.find_room_of(player_id)?.ok_or_else(|| {
            SessionError::Validation {
                reason: format!("Player {} has no pending pairing request", player_id),
            }
        })?;

        if room.state() != RoomState::WaitingForOpponent {
            return Err(SessionError::MatchAlreadyStarted {
                match_id: room.id().to_string(),
            }
            .into());
        }

        let match_id = room.id();
        self.store
            .set_match_state(player_id, MatchState::None)
            .await
            .map_err(|e| SessionError::StoreUnavailable {
                message: e.to_string(),
            })?;

        if let Err(e) = self.store.void_match(match_id).await {
            self.revert_match_state(player_id, MatchState::Pairing).await;
            return Err(SessionError::StoreUnavailable {
                message: e.to_string(),
            }
            .into());
        }

        self.rooms.remove(match_id)?;
        info!("Player '{}' cancelled pairing, room {} removed", player_id, match_id);
        self.metrics
            .session()
            .matches_cancelled_total
            .with_label_values(&["player_cancel"])
            .inc();
        self.bump_stats(|s| s.matches_cancelled += 1)?;
        self.refresh_room_gauges()?;

        Ok(())
    }

    /// Draw and push the question batch for a freshly started match.
    ///
    /// An empty pool auto-cancels the room: nobody is left in a round that
    /// can never complete.
    async fn distribute_round(&self, match_id: MatchId) -> Result<()> {
        let participants = self
            .rooms
            .snapshot(match_id)?
            .map(|room| room.participants().to_vec())
            .ok_or_else(|| SessionError::UnknownMatch {
                match_id: match_id.to_string(),
            })?;

        let batch = match self.supplier.draw_batch().await {
            Ok(batch) => batch,
            Err(e) => {
                warn!(
                    "Question distribution failed for match {}: {} - cancelling room",
                    match_id, e
                );
                self.void_room(
                    match_id,
                    &participants,
                    "no_questions",
                    "No questions available, the match was cancelled",
                )
                .await?;
                return Err(e);
            }
        };

        self.rooms
            .with_room(match_id, |room| {
                room.set_total_questions(batch.len());
                Ok(())
            })?;

        let questions: Vec<QuestionPayload> = batch.iter().map(QuestionPayload::from).collect();
        info!(
            "Distributing {} questions to room {}",
            questions.len(),
            match_id
        );
        self.sink
            .broadcast_to_room(
                &participants,
                ServerEvent::MatchReady(MatchReadyPayload {
                    match_id,
                    questions,
                }),
            )
            .await?;

        Ok(())
    }

    /// Record a participant's self-reported result.
    ///
    /// Idempotent per player; the report completing the second slot triggers
    /// settlement exactly once.
    pub async fn report_result(
        &self,
        match_id: MatchId,
        player_id: &str,
        correct_count: u32,
    ) -> Result<()> {
        debug!(
            "Result report: match {}, player '{}', {} correct",
            match_id, player_id, correct_count
        );

        let completed = self.rooms.with_room(match_id, |room| {
            room.record_result(player_id, correct_count)?;
            if room.is_complete() {
                room.mark_finalized()?;
                let outcome = room.outcome().ok_or_else(|| SessionError::Internal {
                    message: format!("Complete room {} has no outcome", match_id),
                })?;
                let participants = room.participants().to_vec();
                let reported = participants
                    .iter()
                    .map(|p| room.reported_for(p).unwrap_or_default())
                    .collect();
                Ok(Some(CompletedRound {
                    participants,
                    reported,
                    outcome,
                    total_questions: room.total_questions(),
                }))
            } else {
                Ok(None)
            }
        })?;

        if let Some(round) = completed {
            self.settle(match_id, round).await?;
        }
        Ok(())
    }

    /// Settle a completed match: compute deltas, commit one transaction,
    /// push the summary and tear the room down.
    async fn settle(&self, match_id: MatchId, round: CompletedRound) -> Result<()> {
        let result = self.try_settle(match_id, &round).await;

        if let Err(e) = &result {
            // Reopen the room so a repeated (idempotent) report can retry.
            error!("Settlement of match {} failed: {}", match_id, e);
            if let Err(revert_err) = self.rooms.with_room(match_id, |room| {
                room.revert_to_in_progress();
                Ok(())
            }) {
                error!(
                    "Could not reopen room {} after failed settlement: {}",
                    match_id, revert_err
                );
            }
            self.sink
                .broadcast_to_room(
                    &round.participants,
                    ServerEvent::error("Settlement failed, please resend your result"),
                )
                .await?;
        }

        result
    }

    async fn try_settle(&self, match_id: MatchId, round: &CompletedRound) -> Result<()> {
        // Destructure defensively: settlement only runs for 2-player rooms.
        let (player_one, player_two) = match (&round.participants[..], &round.reported[..]) {
            ([a, b], [_, _]) => (a.clone(), b.clone()),
            _ => {
                return Err(SessionError::Internal {
                    message: format!("Room {} completed without two participants", match_id),
                }
                .into())
            }
        };

        let profile_one = self.load_or_create_profile(&player_one).await?;
        let profile_two = self.load_or_create_profile(&player_two).await?;

        let deltas = self
            .rating
            .settle(profile_one.rating, profile_two.rating, round.outcome);

        let winner = match round.outcome {
            MatchOutcome::Win => Some(player_one.clone()),
            MatchOutcome::Loss => Some(player_two.clone()),
            MatchOutcome::Draw => None,
        };

        let mut record = self
            .store
            .get_match(match_id)
            .await
            .map_err(|e| SessionError::SettlementFailed {
                match_id: match_id.to_string(),
                message: e.to_string(),
            })?
            .ok_or_else(|| SessionError::SettlementFailed {
                match_id: match_id.to_string(),
                message: "Match record missing at settlement".to_string(),
            })?;
        record.winner = winner.clone();
        record.delta_one = Some(deltas.delta_a);
        record.delta_two = Some(deltas.delta_b);
        record.finalized_at = Some(current_timestamp());

        let updates = [
            SettlementUpdate {
                player_id: player_one.clone(),
                delta: deltas.delta_a,
                outcome: round.outcome,
            },
            SettlementUpdate {
                player_id: player_two.clone(),
                delta: deltas.delta_b,
                outcome: round.outcome.inverse(),
            },
        ];

        self.store
            .commit_settlement(&record, &updates)
            .await
            .map_err(|e| SessionError::SettlementFailed {
                match_id: match_id.to_string(),
                message: e.to_string(),
            })?;

        let summary = SettlementSummary {
            match_id,
            total_questions: round.total_questions,
            players: vec![
                PlayerSettlement {
                    player_id: player_one.clone(),
                    reported_correct: round.reported[0],
                    delta: deltas.delta_a,
                    new_rating: profile_one.rating + deltas.delta_a,
                },
                PlayerSettlement {
                    player_id: player_two.clone(),
                    reported_correct: round.reported[1],
                    delta: deltas.delta_b,
                    new_rating: profile_two.rating + deltas.delta_b,
                },
            ],
            winner: winner.clone(),
        };

        info!(
            "Match {} settled: winner {:?}, deltas {:+}/{:+}",
            match_id, winner, deltas.delta_a, deltas.delta_b
        );

        self.sink
            .broadcast_to_room(
                &round.participants,
                ServerEvent::MatchFinished(MatchFinishedPayload::from(&summary)),
            )
            .await?;

        self.rooms.remove(match_id)?;

        let outcome_label = if winner.is_some() { "win" } else { "draw" };
        self.metrics
            .session()
            .matches_settled_total
            .with_label_values(&[outcome_label])
            .inc();
        self.bump_stats(|s| s.matches_settled += 1)?;
        self.refresh_room_gauges()?;

        Ok(())
    }

    /// Void a room that cannot complete: delete the record, reset both
    /// players, remove the room and notify everyone affected.
    async fn void_room(
        &self,
        match_id: MatchId,
        participants: &[PlayerId],
        reason_label: &str,
        player_message: &str,
    ) -> Result<()> {
        self.sink
            .broadcast_to_room(participants, ServerEvent::error(player_message))
            .await?;

        if let Err(e) = self.store.void_match(match_id).await {
            error!("Failed to void match record {}: {}", match_id, e);
        }
        for player_id in participants {
            self.revert_match_state(player_id, MatchState::None).await;
        }
        self.rooms.remove(match_id)?;

        self.metrics
            .session()
            .matches_cancelled_total
            .with_label_values(&[reason_label])
            .inc();
        self.bump_stats(|s| s.matches_cancelled += 1)?;
        self.refresh_room_gauges()?;
        Ok(())
    }

    /// Reap rooms that have waited too long: waiting rooms past the pairing
    /// timeout and in-progress rooms with no activity past the stall timeout.
    pub async fn reap_stale_rooms(&self) -> Result<usize> {
        // Hold the pairing lock so a waiting room cannot be reaped in the
        // middle of another player's search+join sequence.
        let _guard = self.pairing_lock.lock().await;

        let now = current_timestamp();
        let waiting_cutoff =
            now - ChronoDuration::seconds(self.config.waiting_timeout_seconds as i64);
        let stalled_cutoff =
            now - ChronoDuration::seconds(self.config.stalled_timeout_seconds as i64);

        let stale = self.rooms.find_stale(waiting_cutoff, stalled_cutoff)?;
        let mut reaped = 0usize;

        for room in stale {
            let state_label = match room.state() {
                RoomState::WaitingForOpponent => "waiting",
                RoomState::InProgress => "in_progress",
                RoomState::Finalized => continue,
            };

            let message = match room.state() {
                RoomState::WaitingForOpponent => "Pairing timed out, no opponent found",
                _ => "Match timed out without results and was voided",
            };

            warn!(
                "Reaping {} room {} (participants: {:?})",
                state_label,
                room.id(),
                room.participants()
            );
            self.void_room(room.id(), room.participants(), "reaped", message)
                .await?;

            self.metrics
                .session()
                .rooms_reaped_total
                .with_label_values(&[state_label])
                .inc();
            reaped += 1;
        }

        if reaped > 0 {
            info!("Reaped {} stale rooms", reaped);
            self.bump_stats(|s| s.rooms_reaped += reaped as u64)?;
        }
        Ok(reaped)
    }

    /// Start the periodic reaper task
    pub fn start_reaper_task(self: Arc<Self>) {
        let manager = Arc::clone(&self);
        let period = std::time::Duration::from_secs(self.config.reap_interval_seconds);

        tokio::spawn(async move {
            let mut ticker = interval(period);
            loop {
                ticker.tick().await;
                if let Err(e) = manager.reap_stale_rooms().await {
                    error!("Error during room reaping: {}", e);
                }
            }
        });

        info!(
            "Started room reaper task (every {}s)",
            self.config.reap_interval_seconds
        );
    }

    /// Fetch a profile, creating a default one for first-time players
    async fn load_or_create_profile(&self, player_id: &str) -> Result<UserProfile> {
        if let Some(profile) = self.store.get_user(player_id).await? {
            return Ok(profile);
        }

        debug!("No stored profile for '{}', creating default", player_id);
        let mut profile = UserProfile::new(player_id.to_string(), player_id.to_string());
        profile.rating = self.rating.default_rating();
        self.store.upsert_user(profile.clone()).await?;
        Ok(profile)
    }

    /// Snapshot of a room's current state (observability and tests)
    pub fn room_snapshot(&self, match_id: MatchId) -> Result<Option<Room>> {
        self.rooms.snapshot(match_id)
    }

    /// The room a player currently belongs to, if any
    pub fn player_room(&self, player_id: &str) -> Result<Option<Room>> {
        self.rooms.find_room_of(player_id)
    }

    /// Current manager statistics
    pub fn stats(&self) -> Result<SessionStats> {
        let mut stats = self
            .stats
            .read()
            .map_err(|_| SessionError::Internal {
                message: "Failed to acquire stats lock".to_string(),
            })?
            .clone();
        let registry_stats = self.rooms.stats()?;
        stats.active_rooms = registry_stats.active_rooms;
        stats.waiting_rooms = registry_stats.waiting_rooms;
        Ok(stats)
    }

    fn bump_stats(&self, f: impl FnOnce(&mut SessionStats)) -> Result<()> {
        let mut stats = self.stats.write().map_err(|_| SessionError::Internal {
            message: "Failed to acquire stats lock".to_string(),
        })?;
        f(&mut stats);
        Ok(())
    }

    fn refresh_room_gauges(&self) -> Result<()> {
        let stats = self.rooms.stats()?;
        self.metrics
            .session()
            .active_rooms
            .set(stats.active_rooms as i64);
        Ok(())
    }
}
