//! SYNE01 Frame Protocol
//!
//! Every message between a slave and the master is a ZMQ multipart message with
//! a fixed header, so the publisher can route and answer heartbeats without
//! touching the body.
//!
//! ## Wire Format
//!
//! ```text
//! Frame 0: Protocol version    "SYNE01" (6 bytes)
//! Frame 1: Command             2 bytes (big-endian u16)
//! Frame 2: Content-Type        2 bytes (big-endian u16)
//! Frame 3: Request ID          16 bytes (UUID)
//! ─── fixed-width above / variable-width below ───
//! Frame 4: Service name        UTF-8 string (empty on replies)
//! Frame 5: Body                bytes (interpretation per Content-Type)
//! ```
//!
//! ## ROUTER Socket Handling
//!
//! A ROUTER socket prepends identity frame(s). We scan for "SYNE01" to find
//! frame 0 and hand the identity back so the reply reaches the right peer.

use bytes::{BufMut, Bytes, BytesMut};
use serde::{de::DeserializeOwned, Serialize};
use uuid::Uuid;

/// Protocol version - bump on breaking changes
pub const PROTOCOL_VERSION: &[u8] = b"SYNE01";

/// Number of frames in a SYNE01 message (excluding identity prefix)
pub const FRAME_COUNT: usize = 6;

/// Service name slaves address requests to.
pub const EPOCH_SERVICE: &str = "epoch";

#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Slave asks the master something
    Request = 0x0001,
    /// Master answers a request, echoing its request id
    Reply = 0x0002,
    /// Liveness probe; echoed as-is
    Heartbeat = 0x0003,
    /// Peer is going away
    Disconnect = 0x0004,
}

impl Command {
    pub fn from_u16(value: u16) -> Result<Self, FrameError> {
        match value {
            0x0001 => Ok(Command::Request),
            0x0002 => Ok(Command::Reply),
            0x0003 => Ok(Command::Heartbeat),
            0x0004 => Ok(Command::Disconnect),
            other => Err(FrameError::InvalidCommand(other)),
        }
    }

    pub fn to_u16(self) -> u16 {
        self as u16
    }
}

#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    /// No body (heartbeats, disconnects)
    Empty = 0x0000,
    /// MsgPack-encoded payload
    MsgPack = 0x0001,
}

impl ContentType {
    pub fn from_u16(value: u16) -> Result<Self, FrameError> {
        match value {
            0x0000 => Ok(ContentType::Empty),
            0x0001 => Ok(ContentType::MsgPack),
            other => Err(FrameError::InvalidContentType(other)),
        }
    }

    pub fn to_u16(self) -> u16 {
        self as u16
    }
}

/// A parsed SYNE01 multipart message
#[derive(Debug, Clone, PartialEq)]
pub struct SyneFrame {
    pub command: Command,
    pub content_type: ContentType,
    pub request_id: Uuid,
    pub service: String,
    pub body: Bytes,
}

/// Errors during frame parsing
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("Invalid protocol version: expected SYNE01")]
    InvalidProtocol,
    #[error("Missing frame: {0}")]
    MissingFrame(&'static str),
    #[error("Invalid command: {0:#06x}")]
    InvalidCommand(u16),
    #[error("Invalid content type: {0:#06x}")]
    InvalidContentType(u16),
    #[error("Invalid UTF-8 in {0}")]
    InvalidUtf8(&'static str),
    #[error("Invalid UUID in request ID")]
    InvalidUuid,
    #[error("MsgPack decode error: {0}")]
    MsgPackDecode(#[from] rmp_serde::decode::Error),
    #[error("MsgPack encode error: {0}")]
    MsgPackEncode(#[from] rmp_serde::encode::Error),
    #[error("Content type mismatch: expected {expected:?}, got {actual:?}")]
    ContentTypeMismatch {
        expected: ContentType,
        actual: ContentType,
    },
    #[error("Frame too short: expected {expected} bytes, got {actual}")]
    FrameTooShort { expected: usize, actual: usize },
}

fn read_u16(frame: &Bytes) -> Result<u16, FrameError> {
    if frame.len() < 2 {
        return Err(FrameError::FrameTooShort {
            expected: 2,
            actual: frame.len(),
        });
    }
    Ok(u16::from_be_bytes([frame[0], frame[1]]))
}

fn u16_frame(value: u16) -> Bytes {
    let mut buf = BytesMut::with_capacity(2);
    buf.put_u16(value);
    buf.freeze()
}

impl SyneFrame {
    /// Parse frames that may or may not carry a ROUTER identity prefix.
    pub fn from_frames(frames: &[Bytes]) -> Result<Self, FrameError> {
        let (_, frame) = Self::from_frames_with_identity(frames)?;
        Ok(frame)
    }

    /// Parse frames, returning identity frames separately (for ROUTER socket replies)
    pub fn from_frames_with_identity(frames: &[Bytes]) -> Result<(Vec<Bytes>, Self), FrameError> {
        let proto_idx = frames
            .iter()
            .position(|f| f.as_ref() == PROTOCOL_VERSION)
            .ok_or(FrameError::InvalidProtocol)?;

        let identity: Vec<Bytes> = frames[..proto_idx].to_vec();

        let syne_frames = &frames[proto_idx..];
        if syne_frames.len() < FRAME_COUNT {
            return Err(FrameError::MissingFrame("insufficient frames after SYNE01"));
        }

        let command = Command::from_u16(read_u16(&syne_frames[1])?)?;
        let content_type = ContentType::from_u16(read_u16(&syne_frames[2])?)?;

        let reqid_frame = &syne_frames[3];
        if reqid_frame.len() < 16 {
            return Err(FrameError::FrameTooShort {
                expected: 16,
                actual: reqid_frame.len(),
            });
        }
        let request_id =
            Uuid::from_slice(&reqid_frame[..16]).map_err(|_| FrameError::InvalidUuid)?;

        let service = std::str::from_utf8(&syne_frames[4])
            .map_err(|_| FrameError::InvalidUtf8("service"))?
            .to_string();

        Ok((
            identity,
            SyneFrame {
                command,
                content_type,
                request_id,
                service,
                body: syne_frames[5].clone(),
            },
        ))
    }

    pub fn to_frames(&self) -> Vec<Bytes> {
        let mut frames = Vec::with_capacity(FRAME_COUNT);
        frames.push(Bytes::from_static(PROTOCOL_VERSION));
        frames.push(u16_frame(self.command.to_u16()));
        frames.push(u16_frame(self.content_type.to_u16()));
        frames.push(Bytes::copy_from_slice(self.request_id.as_bytes()));
        frames.push(Bytes::from(self.service.clone()));
        frames.push(self.body.clone());
        frames
    }

    /// Serialize with identity prefix (for ROUTER socket replies)
    pub fn to_frames_with_identity(&self, identity: &[Bytes]) -> Vec<Bytes> {
        let mut frames = identity.to_vec();
        frames.extend(self.to_frames());
        frames
    }

    pub fn heartbeat(service: &str) -> Self {
        Self {
            command: Command::Heartbeat,
            content_type: ContentType::Empty,
            request_id: Uuid::new_v4(),
            service: service.to_string(),
            body: Bytes::new(),
        }
    }

    pub fn disconnect(service: &str) -> Self {
        Self {
            command: Command::Disconnect,
            content_type: ContentType::Empty,
            request_id: Uuid::new_v4(),
            service: service.to_string(),
            body: Bytes::new(),
        }
    }

    /// Create a request frame with MsgPack payload and a fresh request id
    pub fn request<T: Serialize>(service: &str, payload: &T) -> Result<Self, FrameError> {
        let body = rmp_serde::to_vec_named(payload)?;
        Ok(Self {
            command: Command::Request,
            content_type: ContentType::MsgPack,
            request_id: Uuid::new_v4(),
            service: service.to_string(),
            body: Bytes::from(body),
        })
    }

    /// Create a reply frame correlated to `request_id`
    pub fn reply<T: Serialize>(request_id: Uuid, payload: &T) -> Result<Self, FrameError> {
        let body = rmp_serde::to_vec_named(payload)?;
        Ok(Self {
            command: Command::Reply,
            content_type: ContentType::MsgPack,
            request_id,
            service: String::new(),
            body: Bytes::from(body),
        })
    }

    /// Extract typed payload from MsgPack body (checks content_type)
    pub fn payload<T: DeserializeOwned>(&self) -> Result<T, FrameError> {
        if self.content_type != ContentType::MsgPack {
            return Err(FrameError::ContentTypeMismatch {
                expected: ContentType::MsgPack,
                actual: self.content_type,
            });
        }
        Ok(rmp_serde::from_slice(&self.body)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Epoch, EpochReply, EpochRequest};

    #[test]
    fn command_codes() {
        assert_eq!(Command::Request.to_u16(), 0x0001);
        assert_eq!(Command::Disconnect.to_u16(), 0x0004);
        assert_eq!(Command::from_u16(0x0003).unwrap(), Command::Heartbeat);
        assert!(matches!(
            Command::from_u16(0x0042),
            Err(FrameError::InvalidCommand(0x0042))
        ));
        assert!(ContentType::from_u16(0x0002).is_err());
    }

    #[test]
    fn heartbeat_has_no_body() {
        let frames = SyneFrame::heartbeat(EPOCH_SERVICE).to_frames();
        assert_eq!(frames.len(), FRAME_COUNT);
        assert_eq!(frames[0].as_ref(), PROTOCOL_VERSION);

        let parsed = SyneFrame::from_frames(&frames).unwrap();
        assert_eq!(parsed.command, Command::Heartbeat);
        assert_eq!(parsed.content_type, ContentType::Empty);
        assert!(parsed.body.is_empty());
    }

    #[test]
    fn request_carries_payload() {
        let frame = SyneFrame::request(EPOCH_SERVICE, &EpochRequest::GetEpoch).unwrap();
        let parsed = SyneFrame::from_frames(&frame.to_frames()).unwrap();

        assert_eq!(parsed.request_id, frame.request_id);
        assert_eq!(parsed.service, EPOCH_SERVICE);
        assert_eq!(
            parsed.payload::<EpochRequest>().unwrap(),
            EpochRequest::GetEpoch
        );
    }

    #[test]
    fn identity_prefix_is_preserved() {
        let identity = vec![Bytes::from_static(b"\x00peer-7")];
        let reply = SyneFrame::reply(
            Uuid::new_v4(),
            &EpochReply::Epoch {
                epoch: Epoch::from_nanos(1000),
            },
        )
        .unwrap();

        let wire = reply.to_frames_with_identity(&identity);
        assert_eq!(wire.len(), FRAME_COUNT + 1);

        let (got_identity, parsed) = SyneFrame::from_frames_with_identity(&wire).unwrap();
        assert_eq!(got_identity, identity);
        assert_eq!(parsed, reply);
    }

    #[test]
    fn rejects_foreign_traffic() {
        let frames = vec![Bytes::from_static(b"HTTP/1.1"), Bytes::new()];
        assert!(matches!(
            SyneFrame::from_frames(&frames),
            Err(FrameError::InvalidProtocol)
        ));
    }

    #[test]
    fn rejects_truncated_message() {
        let mut frames = SyneFrame::heartbeat(EPOCH_SERVICE).to_frames();
        frames.truncate(4);
        assert!(matches!(
            SyneFrame::from_frames(&frames),
            Err(FrameError::MissingFrame(_))
        ));
    }

    #[test]
    fn rejects_short_request_id() {
        let mut frames = SyneFrame::heartbeat(EPOCH_SERVICE).to_frames();
        frames[3] = Bytes::from_static(b"short");
        assert!(matches!(
            SyneFrame::from_frames(&frames),
            Err(FrameError::FrameTooShort {
                expected: 16,
                actual: 5
            })
        ));
    }

    #[test]
    fn payload_requires_msgpack() {
        let frame = SyneFrame::heartbeat(EPOCH_SERVICE);
        assert!(matches!(
            frame.payload::<EpochRequest>(),
            Err(FrameError::ContentTypeMismatch { .. })
        ));
    }
}
