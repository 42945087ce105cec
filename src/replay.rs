//! Deterministic replay (§6, §8.5): re-run a recorded command sequence
//! against a fresh [`Engine`] and verify the resulting event stream is
//! byte-identical to what was recorded the first time.
//!
//! The matching core has no hidden state that isn't a pure function of
//! `(commands, Clock)` — no randomness, no wall-clock reads outside the
//! injected [`crate::clock::Clock`] — so replaying the same commands
//! against the same symbol configuration with a [`crate::clock::ManualClock`]
//! reproduced from the original run must produce the same events in the
//! same order.

use crate::engine::{Command, Engine};
use crate::error::EngineError;
use crate::event::Event;
use std::fmt;
use tracing::warn;

/// The first point at which a replayed event stream disagreed with the
/// recording, or a length mismatch if one stream ended early.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplayDivergence {
    /// Position (0-based) in the event stream where the streams first disagree.
    pub index: usize,
    /// What the original recording had at `index`, or `None` if it ended first.
    pub expected: Option<Event>,
    /// What replay produced at `index`, or `None` if it ended first.
    pub actual: Option<Event>,
}

impl fmt::Display for ReplayDivergence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "replay diverged at event index {}: expected {:?}, got {:?}",
            self.index, self.expected, self.actual
        )
    }
}

impl std::error::Error for ReplayDivergence {}

/// Either a fatal engine error encountered while replaying, or a
/// detected divergence between the recorded and replayed event streams.
#[derive(Debug)]
pub enum ReplayError {
    /// An [`EngineError::Internal`] was hit while re-dispatching a command.
    Engine(EngineError),
    /// The replayed stream disagreed with the recording.
    Divergence(ReplayDivergence),
}

impl fmt::Display for ReplayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReplayError::Engine(err) => write!(f, "{err}"),
            ReplayError::Divergence(div) => write!(f, "{div}"),
        }
    }
}

impl std::error::Error for ReplayError {}

impl From<EngineError> for ReplayError {
    fn from(err: EngineError) -> Self {
        ReplayError::Engine(err)
    }
}

impl From<ReplayDivergence> for ReplayError {
    fn from(div: ReplayDivergence) -> Self {
        ReplayError::Divergence(div)
    }
}

/// Re-dispatches every command in `commands`, in order, against `engine`.
pub fn replay_commands(engine: &Engine, commands: impl IntoIterator<Item = Command>) -> Result<(), EngineError> {
    for command in commands {
        engine.dispatch(command)?;
    }
    Ok(())
}

/// Compares two event streams for exact equality, field for field,
/// position for position. Returns the first point of disagreement.
pub fn verify_replay(original: &[Event], replayed: &[Event]) -> Result<(), ReplayDivergence> {
    let len = original.len().max(replayed.len());
    for i in 0..len {
        let expected = original.get(i);
        let actual = replayed.get(i);
        if expected != actual {
            let divergence = ReplayDivergence {
                index: i,
                expected: expected.cloned(),
                actual: actual.cloned(),
            };
            warn!("replay divergence at event index {}: {}", i, divergence);
            return Err(divergence);
        }
    }
    Ok(())
}

/// Convenience wrapper: replays `commands` against `engine`, drains
/// `replay_sink`, and verifies the result against `original`.
pub fn replay_and_verify(
    engine: &Engine,
    replay_sink: &crate::event::VecEventSink,
    commands: impl IntoIterator<Item = Command>,
    original: &[Event],
) -> Result<(), ReplayError> {
    replay_commands(engine, commands)?;
    verify_replay(original, &replay_sink.drain())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::engine::EngineConfig;
    use crate::event::VecEventSink;
    use crate::order::{OrderId, OrderKind, Owner, Side};
    use crate::symbol_book::{SubmitCommand, SymbolBookConfig};
    use std::sync::Arc;

    fn commands() -> Vec<Command> {
        vec![
            Command::Submit {
                symbol: "X".into(),
                cmd: SubmitCommand {
                    order_id: OrderId(1),
                    side: Side::Sell,
                    kind: OrderKind::Limit,
                    price: Some(100),
                    stop_price: None,
                    quantity: 10,
                    displayed_quantity: None,
                    owner: Owner::ANONYMOUS,
                },
            },
            Command::Submit {
                symbol: "X".into(),
                cmd: SubmitCommand {
                    order_id: OrderId(2),
                    side: Side::Buy,
                    kind: OrderKind::Limit,
                    price: Some(100),
                    stop_price: None,
                    quantity: 4,
                    displayed_quantity: None,
                    owner: Owner::ANONYMOUS,
                },
            },
        ]
    }

    fn run() -> Vec<Event> {
        let sink = Arc::new(VecEventSink::new());
        let engine = Engine::new(Arc::new(ManualClock::new(1000)), sink.clone(), EngineConfig::default());
        engine.add_symbol("X", SymbolBookConfig::default());
        replay_commands(&engine, commands()).unwrap();
        sink.drain()
    }

    #[test]
    fn identical_commands_replay_byte_identical() {
        let first = run();
        let second = run();
        assert!(verify_replay(&first, &second).is_ok());
        assert!(!first.is_empty());
    }

    #[test]
    fn divergence_is_detected_and_located() {
        let first = run();
        let mut second = run();
        second[0].ts = 999_999;
        let err = verify_replay(&first, &second).unwrap_err();
        assert_eq!(err.index, 0);
    }
}
