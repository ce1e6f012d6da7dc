//! Wire event definitions and validation
//!
//! Events travel as JSON frames of the form `{"event": "...", "data": {...}}`.
//! The wire names and payload fields are the ones the deployed clients already
//! speak; Rust-side names say what each event does.

use crate::error::{Result, SessionError};
use crate::types::{MatchId, PlayerId, Question, SettlementSummary};
use serde::{Deserialize, Serialize};

/// Events received from clients
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientEvent {
    /// Request to be paired into a match
    #[serde(rename = "buscarPartida")]
    FindMatch(FindMatchPayload),

    /// Cancel a pending pairing request
    #[serde(rename = "cancelarBusqueda")]
    CancelSearch(CancelSearchPayload),

    /// Self-reported correct-answer total for a finished round
    #[serde(rename = "reportResults")]
    ReportResults(ReportResultsPayload),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FindMatchPayload {
    #[serde(rename = "idJugador")]
    pub player_id: PlayerId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelSearchPayload {
    #[serde(rename = "idJugador")]
    pub player_id: PlayerId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportResultsPayload {
    #[serde(rename = "partidaId")]
    pub match_id: MatchId,
    #[serde(rename = "idJugador")]
    pub player_id: PlayerId,
    #[serde(rename = "totalAciertos")]
    pub correct_count: u32,
}

impl ClientEvent {
    /// Wire name of the event, for logging and metrics labels
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::FindMatch(_) => "buscarPartida",
            ClientEvent::CancelSearch(_) => "cancelarBusqueda",
            ClientEvent::ReportResults(_) => "reportResults",
        }
    }

    /// The identity the payload claims to act for
    pub fn claimed_player(&self) -> &PlayerId {
        match self {
            ClientEvent::FindMatch(p) => &p.player_id,
            ClientEvent::CancelSearch(p) => &p.player_id,
            ClientEvent::ReportResults(p) => &p.player_id,
        }
    }

    /// Validate payload fields and check the claimed identity against the
    /// authenticated one: clients only act for themselves.
    pub fn validate(&self, authenticated_player: &str) -> Result<()> {
        let claimed = self.claimed_player();
        if claimed.is_empty() {
            return Err(SessionError::Validation {
                reason: "Player ID cannot be empty".to_string(),
            }
            .into());
        }
        if claimed != authenticated_player {
            return Err(SessionError::Validation {
                reason: format!(
                    "Payload player {} does not match the authenticated identity",
                    claimed
                ),
            }
            .into());
        }
        Ok(())
    }
}

/// Events pushed to clients
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    /// A room was created; its creator is waiting for an opponent
    #[serde(rename = "partidaCreada")]
    MatchCreated(MatchCreatedPayload),

    /// An opponent joined; pushed to the whole room
    #[serde(rename = "partidaEncontrada")]
    MatchFound(MatchFoundPayload),

    /// The question batch for the round; pushed to the whole room
    #[serde(rename = "partidaLista")]
    MatchReady(MatchReadyPayload),

    /// Settlement summary; pushed to the whole room before teardown
    #[serde(rename = "partidaFinalizada")]
    MatchFinished(MatchFinishedPayload),

    /// Handler failure surfaced to the originating connection or room
    #[serde(rename = "error")]
    Error(ErrorPayload),
}

impl ServerEvent {
    /// Wire name of the event, for logging
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::MatchCreated(_) => "partidaCreada",
            ServerEvent::MatchFound(_) => "partidaEncontrada",
            ServerEvent::MatchReady(_) => "partidaLista",
            ServerEvent::MatchFinished(_) => "partidaFinalizada",
            ServerEvent::Error(_) => "error",
        }
    }

    /// Convenience constructor for error pushes
    pub fn error(message: impl Into<String>) -> Self {
        ServerEvent::Error(ErrorPayload {
            message: message.into(),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchCreatedPayload {
    #[serde(rename = "partidaId")]
    pub match_id: MatchId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchFoundPayload {
    #[serde(rename = "partidaId")]
    pub match_id: MatchId,
    #[serde(rename = "jugadores")]
    pub players: Vec<PlayerId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchReadyPayload {
    #[serde(rename = "partidaId")]
    pub match_id: MatchId,
    #[serde(rename = "preguntas")]
    pub questions: Vec<QuestionPayload>,
}

/// One question on the wire. The correct answer is included by design:
/// shuffling, hiding and grading are the client's responsibility.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionPayload {
    #[serde(rename = "pregunta")]
    pub text: String,
    #[serde(rename = "respuesta_correcta")]
    pub correct: String,
    #[serde(rename = "respuesta_incorrecta1")]
    pub incorrect_one: String,
    #[serde(rename = "respuesta_incorrecta2")]
    pub incorrect_two: String,
    #[serde(rename = "respuesta_incorrecta3")]
    pub incorrect_three: String,
    #[serde(rename = "tematica")]
    pub topic: String,
    #[serde(rename = "dificultad")]
    pub difficulty: String,
}

impl From<&Question> for QuestionPayload {
    fn from(question: &Question) -> Self {
        let distractor = |i: usize| {
            question
                .incorrect_answers
                .get(i)
                .cloned()
                .unwrap_or_default()
        };
        Self {
            text: question.text.clone(),
            correct: question.correct_answer.clone(),
            incorrect_one: distractor(0),
            incorrect_two: distractor(1),
            incorrect_three: distractor(2),
            topic: question.topic.clone(),
            difficulty: question.difficulty.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchFinishedPayload {
    #[serde(rename = "partidaId")]
    pub match_id: MatchId,
    #[serde(rename = "totalPreguntas")]
    pub total_questions: usize,
    #[serde(rename = "jugadores")]
    pub players: Vec<PlayerResultPayload>,
    /// None for a draw
    #[serde(rename = "ganador")]
    pub winner: Option<PlayerId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerResultPayload {
    pub id: PlayerId,
    #[serde(rename = "aciertos")]
    pub reported_correct: u32,
    pub delta: i32,
    #[serde(rename = "nuevaPuntuacion")]
    pub new_rating: i32,
}

impl From<&SettlementSummary> for MatchFinishedPayload {
    fn from(summary: &SettlementSummary) -> Self {
        Self {
            match_id: summary.match_id,
            total_questions: summary.total_questions,
            players: summary
                .players
                .iter()
                .map(|p| PlayerResultPayload {
                    id: p.player_id.clone(),
                    reported_correct: p.reported_correct,
                    delta: p.delta,
                    new_rating: p.new_rating,
                })
                .collect(),
            winner: summary.winner.clone(),
        }
    }
}
