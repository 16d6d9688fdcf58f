//! Frame-Format der Control-Verbindung
//!
//! Jede [`ControlMessage`] reist als ein Frame:
//!
//! ```text
//! +-------------------+----------------------------+
//! | Laenge (u32 BE)   | JSON (Laenge Bytes)        |
//! +-------------------+----------------------------+
//! ```
//!
//! Frames ueber [`MAX_FRAME_GROESSE`] werden in beide Richtungen abgelehnt.
//! Fehler sind `io::ErrorKind::InvalidData`; die Verbindung beantwortet sie
//! mit `invalid_request` und schliesst.

use bytes::{Buf, BufMut, BytesMut};
use std::io;
use tokio_util::codec::{Decoder, Encoder};

use crate::control::ControlMessage;

/// Obergrenze fuer den JSON-Teil eines Frames (1 MiB)
pub const MAX_FRAME_GROESSE: usize = 1024 * 1024;

/// Laengenpraefix vor jedem Frame
const PRAEFIX: usize = std::mem::size_of::<u32>();

/// Codec fuer `tokio_util::codec::Framed` auf der Control-Verbindung
#[derive(Debug, Clone)]
pub struct FrameCodec {
    limit: usize,
}

impl FrameCodec {
    pub fn new() -> Self {
        Self::mit_limit(MAX_FRAME_GROESSE)
    }

    /// Codec mit eigener Obergrenze
    pub fn mit_limit(limit: usize) -> Self {
        Self { limit }
    }

    fn limit_pruefen(&self, laenge: usize) -> io::Result<()> {
        if laenge > self.limit {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Frame mit {laenge} Bytes ueberschreitet {} Bytes", self.limit),
            ));
        }
        Ok(())
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for FrameCodec {
    type Item = ControlMessage;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> io::Result<Option<ControlMessage>> {
        let Some(kopf) = src.get(..PRAEFIX) else {
            return Ok(None);
        };
        let laenge = u32::from_be_bytes([kopf[0], kopf[1], kopf[2], kopf[3]]) as usize;
        self.limit_pruefen(laenge)?;

        if src.len() < PRAEFIX + laenge {
            src.reserve(PRAEFIX + laenge - src.len());
            return Ok(None);
        }

        src.advance(PRAEFIX);
        let json = src.split_to(laenge);
        serde_json::from_slice(&json)
            .map(Some)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }
}

impl Encoder<ControlMessage> for FrameCodec {
    type Error = io::Error;

    fn encode(&mut self, nachricht: ControlMessage, dst: &mut BytesMut) -> io::Result<()> {
        let json = serde_json::to_vec(&nachricht)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        self.limit_pruefen(json.len())?;

        dst.reserve(PRAEFIX + json.len());
        dst.put_u32(json.len() as u32);
        dst.extend_from_slice(&json);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::{
        AuthenticateRequest, ControlPayload, ServerRequest, WhitelistAction, WhitelistRequest,
        ANY_EVENT,
    };
    use serde_json::json;

    /// Baut einen Frame von Hand, wie ihn ein fremder Client schickt
    fn roher_frame(json: &str) -> BytesMut {
        let mut buf = BytesMut::new();
        buf.put_u32(json.len() as u32);
        buf.extend_from_slice(json.as_bytes());
        buf
    }

    #[test]
    fn authenticate_eines_fremden_clients() {
        let mut buf = roher_frame(
            r#"{"request_id":1,"payload":{"type":"authenticate","display_name":"panel","secret":"geheim"}}"#,
        );
        let msg = FrameCodec::new().decode(&mut buf).unwrap().unwrap();
        assert_eq!(msg.request_id, 1);
        match msg.payload {
            ControlPayload::Authenticate(AuthenticateRequest {
                display_name,
                secret,
            }) => {
                assert_eq!(display_name, "panel");
                assert_eq!(secret, "geheim");
            }
            anders => panic!("Authenticate erwartet, erhalten: {anders:?}"),
        }
        assert!(buf.is_empty());
    }

    #[test]
    fn start_in_zwei_teilen() {
        let mut codec = FrameCodec::new();
        let voll = roher_frame(r#"{"request_id":2,"payload":{"type":"start","server":"alpha"}}"#);

        let mut buf = BytesMut::from(&voll[..3]);
        assert!(codec.decode(&mut buf).unwrap().is_none(), "Laengenfeld unvollstaendig");
        buf.extend_from_slice(&voll[3..10]);
        assert!(codec.decode(&mut buf).unwrap().is_none(), "JSON unvollstaendig");
        buf.extend_from_slice(&voll[10..]);

        let msg = codec.decode(&mut buf).unwrap().unwrap();
        assert!(matches!(
            msg.payload,
            ControlPayload::Start(ServerRequest { ref server }) if server == "alpha"
        ));
    }

    #[test]
    fn whitelist_add_und_status_hintereinander() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();
        codec
            .encode(
                ControlMessage::new(
                    3,
                    ControlPayload::Whitelist(WhitelistRequest {
                        server: "alpha".into(),
                        action: WhitelistAction::Add,
                        username: Some("bob".into()),
                    }),
                ),
                &mut buf,
            )
            .unwrap();
        codec
            .encode(
                ControlMessage::new(
                    4,
                    ControlPayload::Status(ServerRequest {
                        server: "alpha".into(),
                    }),
                ),
                &mut buf,
            )
            .unwrap();

        let add = codec.decode(&mut buf).unwrap().unwrap();
        assert!(matches!(
            add.payload,
            ControlPayload::Whitelist(WhitelistRequest {
                action: WhitelistAction::Add,
                ref username,
                ..
            }) if username.as_deref() == Some("bob")
        ));
        assert_eq!(codec.decode(&mut buf).unwrap().unwrap().request_id, 4);
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn event_push_auf_dem_draht() {
        let mut buf = BytesMut::new();
        FrameCodec::new()
            .encode(
                ControlMessage::event("alpha", "any", json!({"name": "login", "data": {"user": "bob"}})),
                &mut buf,
            )
            .unwrap();

        let laenge = (&buf[..PRAEFIX]).get_u32() as usize;
        assert_eq!(laenge, buf.len() - PRAEFIX);
        let roh: serde_json::Value = serde_json::from_slice(&buf[PRAEFIX..]).unwrap();
        assert_eq!(roh["payload"]["event"], ANY_EVENT);
        assert_eq!(roh["payload"]["server"], "alpha");
        assert_eq!(roh["payload"]["data"]["name"], "login");
    }

    #[test]
    fn zu_grosser_frame_wird_vor_dem_lesen_abgelehnt() {
        let mut buf = BytesMut::new();
        buf.put_u32((MAX_FRAME_GROESSE + 1) as u32);
        let err = FrameCodec::new().decode(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn zu_grosse_antwort_wird_nicht_geschrieben() {
        let mut buf = BytesMut::new();
        let err = FrameCodec::mit_limit(16)
            .encode(
                ControlMessage::new(
                    5,
                    ControlPayload::Status(ServerRequest {
                        server: "ein-sehr-langer-servername".into(),
                    }),
                ),
                &mut buf,
            )
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        assert!(buf.is_empty());
    }

    #[test]
    fn kaputtes_json_ist_ungueltig() {
        let mut buf = roher_frame(r#"{"request_id":6,"payload":{"type":"sprengen"}}"#);
        let err = FrameCodec::new().decode(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }
}
