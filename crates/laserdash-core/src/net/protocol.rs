use serde::{Deserialize, Serialize};

use super::messages::{
    AddToRosterMsg, ClientMessage, LeaderboardHiddenMsg, LeaderboardMsg, MessageType,
    PlayerInputMsg, RemoveFromRosterMsg, RequestFullResyncMsg, RequestRestartMsg, RosterAddMsg,
    RosterRemoveMsg, RosterResetMsg, ServerMessage, SnapshotMsg,
};

/// Maximum message payload size in bytes.
pub const MAX_MESSAGE_SIZE: usize = 64 * 1024; // 64 KiB

#[derive(Debug)]
pub enum ProtocolError {
    EmptyMessage,
    UnknownMessageType(u8),
    PayloadTooLarge(usize),
    SerializeError(String),
    DeserializeError(String),
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyMessage => write!(f, "empty message"),
            Self::UnknownMessageType(b) => write!(f, "unknown message type: 0x{b:02x}"),
            Self::PayloadTooLarge(size) => {
                write!(
                    f,
                    "payload too large: {size} bytes (max {MAX_MESSAGE_SIZE})"
                )
            },
            Self::SerializeError(e) => write!(f, "serialize error: {e}"),
            Self::DeserializeError(e) => write!(f, "deserialize error: {e}"),
        }
    }
}

impl std::error::Error for ProtocolError {}

/// Encode a serializable payload with a 1-byte type prefix.
pub fn encode_message<T: Serialize>(
    msg_type: MessageType,
    payload: &T,
) -> Result<Vec<u8>, ProtocolError> {
    let payload_bytes =
        rmp_serde::to_vec(payload).map_err(|e| ProtocolError::SerializeError(e.to_string()))?;
    let total = 1 + payload_bytes.len();
    if total > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::PayloadTooLarge(total));
    }
    let mut buf = Vec::with_capacity(total);
    buf.push(msg_type as u8);
    buf.extend_from_slice(&payload_bytes);
    Ok(buf)
}

pub fn encode_client_message(msg: &ClientMessage) -> Result<Vec<u8>, ProtocolError> {
    match msg {
        ClientMessage::PlayerInput(m) => encode_message(MessageType::PlayerInput, m),
        ClientMessage::RequestFullResync(m) => encode_message(MessageType::RequestFullResync, m),
        ClientMessage::AddToRoster(m) => encode_message(MessageType::AddToRoster, m),
        ClientMessage::RemoveFromRoster(m) => encode_message(MessageType::RemoveFromRoster, m),
        ClientMessage::RequestRestart(m) => encode_message(MessageType::RequestRestart, m),
    }
}

pub fn encode_server_message(msg: &ServerMessage) -> Result<Vec<u8>, ProtocolError> {
    match msg {
        ServerMessage::Snapshot(m) => encode_message(MessageType::Snapshot, m),
        ServerMessage::LeaderboardReady(m) => encode_message(MessageType::LeaderboardReady, m),
        ServerMessage::LeaderboardHidden(m) => encode_message(MessageType::LeaderboardHidden, m),
        ServerMessage::RosterAdd(m) => encode_message(MessageType::RosterAdd, m),
        ServerMessage::RosterRemove(m) => encode_message(MessageType::RosterRemove, m),
        ServerMessage::RosterReset(m) => encode_message(MessageType::RosterReset, m),
    }
}

/// Extract the message type byte from raw wire data.
pub fn decode_message_type(data: &[u8]) -> Result<MessageType, ProtocolError> {
    let Some(&first) = data.first() else {
        return Err(ProtocolError::EmptyMessage);
    };
    MessageType::from_byte(first).ok_or(ProtocolError::UnknownMessageType(first))
}

/// Decode a MessagePack payload (bytes after the type prefix).
pub fn decode_payload<T: for<'de> Deserialize<'de>>(data: &[u8]) -> Result<T, ProtocolError> {
    if data.is_empty() {
        return Err(ProtocolError::EmptyMessage);
    }
    rmp_serde::from_slice(&data[1..]).map_err(|e| ProtocolError::DeserializeError(e.to_string()))
}

pub fn decode_client_message(data: &[u8]) -> Result<ClientMessage, ProtocolError> {
    match decode_message_type(data)? {
        MessageType::PlayerInput => Ok(ClientMessage::PlayerInput(decode_payload::<
            PlayerInputMsg,
        >(data)?)),
        MessageType::RequestFullResync => Ok(ClientMessage::RequestFullResync(decode_payload::<
            RequestFullResyncMsg,
        >(data)?)),
        MessageType::AddToRoster => Ok(ClientMessage::AddToRoster(decode_payload::<
            AddToRosterMsg,
        >(data)?)),
        MessageType::RemoveFromRoster => Ok(ClientMessage::RemoveFromRoster(decode_payload::<
            RemoveFromRosterMsg,
        >(data)?)),
        MessageType::RequestRestart => Ok(ClientMessage::RequestRestart(decode_payload::<
            RequestRestartMsg,
        >(data)?)),
        _ => Err(ProtocolError::UnknownMessageType(data[0])),
    }
}

pub fn decode_server_message(data: &[u8]) -> Result<ServerMessage, ProtocolError> {
    match decode_message_type(data)? {
        MessageType::Snapshot => Ok(ServerMessage::Snapshot(decode_payload::<SnapshotMsg>(
            data,
        )?)),
        MessageType::LeaderboardReady => Ok(ServerMessage::LeaderboardReady(decode_payload::<
            LeaderboardMsg,
        >(data)?)),
        MessageType::LeaderboardHidden => Ok(ServerMessage::LeaderboardHidden(decode_payload::<
            LeaderboardHiddenMsg,
        >(data)?)),
        MessageType::RosterAdd => Ok(ServerMessage::RosterAdd(decode_payload::<RosterAddMsg>(
            data,
        )?)),
        MessageType::RosterRemove => Ok(ServerMessage::RosterRemove(decode_payload::<
            RosterRemoveMsg,
        >(data)?)),
        MessageType::RosterReset => Ok(ServerMessage::RosterReset(decode_payload::<
            RosterResetMsg,
        >(data)?)),
        _ => Err(ProtocolError::UnknownMessageType(data[0])),
    }
}
