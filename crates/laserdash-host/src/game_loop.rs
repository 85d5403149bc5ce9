use std::collections::HashMap;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use laserdash_core::authority::Role;
use laserdash_core::input::{CollisionEvent, RaceInput};
use laserdash_core::net::messages::{
    ClientMessage, LeaderboardHiddenMsg, LeaderboardMsg, ServerMessage, SnapshotMsg,
};
use laserdash_core::net::protocol::{decode_client_message, encode_server_message};
use laserdash_core::participant::{Participant, ParticipantId};
use laserdash_race::RaceSession;
use laserdash_race::config::RaceConfig;
use laserdash_race::events::RaceEvent;

use crate::config::HostConfig;

/// Commands sent from the transport layer to the race tick loop.
#[derive(Debug)]
pub enum SessionCommand {
    /// Raw client message bytes as received from `from`.
    Client { from: ParticipantId, data: Bytes },
    /// Collision notifications from the physics collaborator.
    Collisions(Vec<CollisionEvent>),
    Joined(Participant),
    Left(ParticipantId),
    Stop,
}

/// Broadcasts sent from the race tick loop to every connected replica.
#[derive(Debug, Clone)]
pub enum SessionBroadcast {
    /// Serialized ServerMessage bytes ready to send.
    /// Uses `Bytes` for zero-copy cloning across participant channels.
    EncodedMessage(Bytes),
    /// Signal that the loop has exited.
    SessionEnded,
}

/// Configuration for a spawned race session.
#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    pub host: HostConfig,
    pub race: RaceConfig,
}

/// Spawn an authoritative race loop as a tokio task.
/// Returns the command sender, broadcast receiver and task handle.
pub fn spawn_race_session(
    config: SessionConfig,
    participants: Vec<Participant>,
) -> (
    mpsc::UnboundedSender<SessionCommand>,
    mpsc::UnboundedReceiver<SessionBroadcast>,
    JoinHandle<()>,
) {
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let (broadcast_tx, broadcast_rx) = mpsc::unbounded_channel();

    let handle = tokio::spawn(async move {
        run_race_tick_loop(config, participants, cmd_rx, broadcast_tx).await;
    });

    (cmd_tx, broadcast_rx, handle)
}

async fn run_race_tick_loop(
    config: SessionConfig,
    participants: Vec<Participant>,
    mut cmd_rx: mpsc::UnboundedReceiver<SessionCommand>,
    broadcast_tx: mpsc::UnboundedSender<SessionBroadcast>,
) {
    let out = Broadcaster { tx: &broadcast_tx };
    let mut session = RaceSession::new(config.race, Role::Authority);
    let mut live: Vec<Participant> = Vec::new();

    for p in participants {
        if let Err(e) = session.add_participant(&p) {
            tracing::warn!(participant = p.id, error = %e, "skipping participant");
            continue;
        }
        live.push(p);
    }
    let events = report(session.observe_live(&live));
    out.forward(&session, events);
    if let Err(e) = session.begin(0.0) {
        tracing::error!(error = %e, "session could not start");
        let _ = broadcast_tx.send(SessionBroadcast::SessionEnded);
        return;
    }

    let dt = config.host.tick_dt();
    let mut interval = tokio::time::interval(Duration::from_secs_f32(dt));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut drift_check =
        tokio::time::interval(Duration::from_secs_f32(config.host.drift_check_secs));
    drift_check.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let snapshot_every = config.host.snapshot_every_ticks.max(1);
    let mut input_buffer: HashMap<ParticipantId, RaceInput> = HashMap::new();

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let inputs = std::mem::take(&mut input_buffer);
                let events = report(session.tick(dt, &inputs));
                out.forward(&session, events);
                if session.tick_count() % snapshot_every == 0 {
                    out.snapshot(&session);
                }
            }
            _ = drift_check.tick() => {
                let events = report(session.correct_roster_drift(&live));
                out.forward(&session, events);
            }
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(SessionCommand::Client { from, data }) => {
                        let msg = match decode_client_message(&data) {
                            Ok(msg) => msg,
                            Err(e) => {
                                tracing::warn!(from, error = %e, "dropping undecodable message");
                                continue;
                            },
                        };
                        if let ClientMessage::PlayerInput(pi) = &msg {
                            // A connection only ever drives its own racer.
                            if pi.participant_id != from {
                                tracing::warn!(
                                    from,
                                    claimed = pi.participant_id,
                                    "dropping input for another participant"
                                );
                                continue;
                            }
                            // Edge presses between two ticks are never lost.
                            input_buffer.entry(from).or_default().merge(pi.input);
                            continue;
                        }
                        let events = report(session.handle_request(from, &msg, &live));
                        out.forward(&session, events);
                    },
                    Some(SessionCommand::Collisions(batch)) => {
                        let events = report(session.handle_collisions(&batch));
                        out.forward(&session, events);
                    },
                    Some(SessionCommand::Joined(p)) => {
                        let mut events = report(session.add_participant(&p).map(|()| Vec::new()));
                        if !live.iter().any(|l| l.id == p.id) {
                            live.push(p);
                        }
                        events.extend(report(session.observe_live(&live)));
                        out.forward(&session, events);
                    },
                    Some(SessionCommand::Left(id)) => {
                        live.retain(|p| p.id != id);
                        input_buffer.remove(&id);
                        let mut events = report(session.remove_participant(id));
                        events.extend(report(session.observe_live(&live)));
                        out.forward(&session, events);
                    },
                    Some(SessionCommand::Stop) | None => {
                        break;
                    },
                }
            }
        }
    }

    let _ = broadcast_tx.send(SessionBroadcast::SessionEnded);
}

/// Log a rejected call and carry on with no events.
fn report(result: Result<Vec<RaceEvent>, laserdash_core::error::Rejection>) -> Vec<RaceEvent> {
    result.unwrap_or_else(|e| {
        tracing::warn!(error = %e, "session call rejected");
        Vec::new()
    })
}

struct Broadcaster<'a> {
    tx: &'a mpsc::UnboundedSender<SessionBroadcast>,
}

impl Broadcaster<'_> {
    fn send(&self, msg: &ServerMessage) {
        match encode_server_message(msg) {
            Ok(data) => {
                let _ = self
                    .tx
                    .send(SessionBroadcast::EncodedMessage(Bytes::from(data)));
            },
            Err(e) => tracing::error!(error = %e, "Failed to encode broadcast"),
        }
    }

    fn snapshot(&self, session: &RaceSession) {
        match session.serialize_snapshot() {
            Ok(state_data) => self.send(&ServerMessage::Snapshot(SnapshotMsg {
                tick: session.tick_count(),
                state_data,
            })),
            Err(e) => tracing::error!(
                tick = session.tick_count(), error = %e, "Failed to encode snapshot"
            ),
        }
    }

    /// Send the one-shot broadcasts among `events`. The rest are for
    /// presentation collaborators and only logged here.
    fn forward(&self, session: &RaceSession, events: Vec<RaceEvent>) {
        for event in events {
            match event {
                RaceEvent::LeaderboardReady { standings } => {
                    self.send(&ServerMessage::LeaderboardReady(LeaderboardMsg { standings }));
                },
                RaceEvent::Restarted => {
                    self.send(&ServerMessage::LeaderboardHidden(LeaderboardHiddenMsg {
                        tick: session.tick_count(),
                    }));
                },
                RaceEvent::Roster(notice) => {
                    self.send(&ServerMessage::from(&notice));
                },
                other => tracing::trace!(event = ?other, "race event"),
            }
        }
    }
}
