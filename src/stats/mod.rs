//! Outcome reporting to the platform's stats aggregator.
//!
//! The engine only emits. Aggregation, storage, and display live elsewhere,
//! and reports are fire-and-forget: callers log a failed send and never
//! retry it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::game::entities::ParticipantId;

/// Games on the platform that report outcomes through this sink. Only
/// `Coup` has its rules in this crate; the others replicate sessions the
/// same way with simpler reducers.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum GameKind {
    Coup,
    Minefield,
    Battleship,
    FlagQuiz,
    Voting,
}

impl fmt::Display for GameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let repr = match self {
            Self::Coup => "coup",
            Self::Minefield => "minefield",
            Self::Battleship => "battleship",
            Self::FlagQuiz => "flag quiz",
            Self::Voting => "voting",
        };
        write!(f, "{repr}")
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum MatchResult {
    Win,
    Loss,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct MatchOutcome {
    pub participant: ParticipantId,
    pub game: GameKind,
    pub result: MatchResult,
    pub duration_secs: i64,
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("aggregator unavailable")]
    Unavailable,
}

#[async_trait]
pub trait OutcomeSink: Send + Sync {
    async fn record(&self, outcome: MatchOutcome) -> Result<(), SinkError>;
}

/// Discards every report.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullSink;

#[async_trait]
impl OutcomeSink for NullSink {
    async fn record(&self, _outcome: MatchOutcome) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Emits each report as a JSON line through the logger. Stands in for the
/// real aggregator in development.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogSink;

#[async_trait]
impl OutcomeSink for LogSink {
    async fn record(&self, outcome: MatchOutcome) -> Result<(), SinkError> {
        match serde_json::to_string(&outcome) {
            Ok(line) => {
                log::info!("match outcome: {line}");
                Ok(())
            }
            Err(_) => Err(SinkError::Unavailable),
        }
    }
}

/// Forwards reports over a channel; used by tests and by embedders bridging
/// to their own aggregator.
#[derive(Clone, Debug)]
pub struct ChannelSink {
    sender: mpsc::UnboundedSender<MatchOutcome>,
}

impl ChannelSink {
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<MatchOutcome>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl OutcomeSink for ChannelSink {
    async fn record(&self, outcome: MatchOutcome) -> Result<(), SinkError> {
        self.sender
            .send(outcome)
            .map_err(|_| SinkError::Unavailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn sample_outcome() -> MatchOutcome {
        MatchOutcome {
            participant: Uuid::new_v4(),
            game: GameKind::Coup,
            result: MatchResult::Win,
            duration_secs: 312,
        }
    }

    #[tokio::test]
    async fn channel_sink_forwards_reports() {
        let (sink, mut receiver) = ChannelSink::new();
        let outcome = sample_outcome();
        sink.record(outcome.clone()).await.expect("record");
        assert_eq!(receiver.recv().await, Some(outcome));
    }

    #[tokio::test]
    async fn channel_sink_fails_once_the_receiver_is_gone() {
        let (sink, receiver) = ChannelSink::new();
        drop(receiver);
        assert!(matches!(
            sink.record(sample_outcome()).await,
            Err(SinkError::Unavailable)
        ));
    }

    #[tokio::test]
    async fn null_sink_swallows_everything() {
        NullSink.record(sample_outcome()).await.expect("discarded");
    }
}
