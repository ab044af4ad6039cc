use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

pub const DEFAULT_PORT: u16 = 9090;
pub const DEFAULT_GAME_MODE: &str = "coop";
pub const ROOM_CODE_LEN: usize = 4;
/// Room code characters; `0`, `O`, `1` and `I` are left out so codes survive being read aloud.
pub const ROOM_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Server-assigned player identifier (`"1"`, `"2"`, ...).
pub type ClientId = String;
/// Public four-character room identifier.
pub type RoomCode = String;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("frame is not valid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),
    #[error("frame is not a JSON object")]
    NotAnObject,
    #[error("frame has no string `type` field")]
    MissingType,
    #[error("failed to encode outbound message: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Messages sent by clients, decoded from a JSON text frame.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    FindMatch,
    CreateRoom {
        code: Option<RoomCode>,
    },
    JoinRoom {
        code: Option<RoomCode>,
    },
    LeaveRoom,
    Ready,
    /// Every field the sender supplied except `type`.
    StartGame {
        fields: Map<String, Value>,
    },
    State {
        x: Option<Value>,
        y: Option<Value>,
    },
    /// Every field the sender supplied except `type`.
    Game {
        payload: Map<String, Value>,
    },
    Unknown(String),
}

impl ClientMessage {
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let value: Value = serde_json::from_str(text).map_err(ProtocolError::InvalidJson)?;
        let Value::Object(mut fields) = value else {
            return Err(ProtocolError::NotAnObject);
        };
        let kind = match fields.remove("type") {
            Some(Value::String(kind)) => kind,
            _ => return Err(ProtocolError::MissingType),
        };

        let message = match kind.as_str() {
            "find_match" => ClientMessage::FindMatch,
            "create_room" => ClientMessage::CreateRoom {
                code: coerce_room_code(fields.get("code")),
            },
            "join_room" => ClientMessage::JoinRoom {
                code: coerce_room_code(fields.get("code")),
            },
            "leave_room" => ClientMessage::LeaveRoom,
            "ready" => ClientMessage::Ready,
            "start_game" => ClientMessage::StartGame { fields },
            "state" => ClientMessage::State {
                x: fields.remove("x"),
                y: fields.remove("y"),
            },
            "game" => ClientMessage::Game { payload: fields },
            _ => ClientMessage::Unknown(kind),
        };
        Ok(message)
    }
}

/// Messages sent by the server. Serialized with the variant name as `type`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Welcome {
        id: ClientId,
    },
    WaitingForMatch,
    RoomJoined {
        code: RoomCode,
        id: ClientId,
        /// Only set for rooms formed by matchmaking.
        #[serde(skip_serializing_if = "Option::is_none")]
        is_host: Option<bool>,
    },
    RoomCreated {
        code: RoomCode,
    },
    RoomState {
        players: Vec<ClientId>,
    },
    PlayerJoined {
        id: ClientId,
    },
    PlayerLeft {
        id: ClientId,
    },
    StartGame {
        mode: Value,
        seed: Value,
        #[serde(flatten)]
        extra: Map<String, Value>,
    },
    State {
        id: ClientId,
        #[serde(skip_serializing_if = "Option::is_none")]
        x: Option<Value>,
        #[serde(skip_serializing_if = "Option::is_none")]
        y: Option<Value>,
    },
    Game {
        #[serde(flatten)]
        payload: Map<String, Value>,
        id: ClientId,
    },
}

impl ServerMessage {
    /// Builds a `start_game` echo of the sender's fields, filling in `mode` and
    /// `seed` when the sender left them out or sent a falsy value.
    pub fn start_game(mut fields: Map<String, Value>, default_seed: u64) -> Self {
        fields.remove("type");
        let mode = fields
            .remove("mode")
            .filter(|v| !is_falsy(v))
            .unwrap_or_else(|| Value::from(DEFAULT_GAME_MODE));
        let seed = fields
            .remove("seed")
            .filter(|v| !is_falsy(v))
            .unwrap_or_else(|| Value::from(default_seed));
        ServerMessage::StartGame {
            mode,
            seed,
            extra: fields,
        }
    }

    /// The readiness-gate start: default mode, fresh seed, nothing else.
    pub fn coop_start(seed: u64) -> Self {
        ServerMessage::StartGame {
            mode: Value::from(DEFAULT_GAME_MODE),
            seed: Value::from(seed),
            extra: Map::new(),
        }
    }

    /// Re-addresses an opaque game payload to `id`, overwriting any `id` the sender put in.
    pub fn game(mut payload: Map<String, Value>, id: ClientId) -> Self {
        payload.remove("type");
        payload.remove("id");
        ServerMessage::Game { payload, id }
    }

    pub fn encode(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(ProtocolError::Encode)
    }
}

/// Truthiness as JavaScript clients see it: `null`, `false`, `0` and `""` are falsy.
pub fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(_) | Value::Object(_) => false,
    }
}

/// Normalizes a client-supplied room code: strings and numbers are accepted and
/// upper-cased, everything else (or an empty result) counts as no code.
pub fn coerce_room_code(value: Option<&Value>) -> Option<RoomCode> {
    let value = value.filter(|v| !is_falsy(v))?;
    let code = match value {
        Value::String(s) => s.to_uppercase(),
        // Whole floats print without a fraction, as `12.0.toString()` does in JS
        Value::Number(n) => match n.as_f64() {
            Some(f) if n.is_f64() => f.to_string(),
            _ => n.to_string(),
        },
        Value::Bool(true) => "TRUE".to_string(),
        _ => return None,
    };
    if code.is_empty() {
        None
    } else {
        Some(code)
    }
}

/// Checks that `code` has the shape of a server-generated room code.
pub fn is_generated_room_code(code: &str) -> bool {
    code.len() == ROOM_CODE_LEN && code.bytes().all(|b| ROOM_CODE_ALPHABET.contains(&b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn encode_value(message: &ServerMessage) -> Value {
        serde_json::from_str(&message.encode().unwrap()).unwrap()
    }

    #[test]
    fn test_alphabet_excludes_ambiguous_characters() {
        for c in [b'0', b'O', b'1', b'I'] {
            assert!(!ROOM_CODE_ALPHABET.contains(&c));
        }
        assert_eq!(ROOM_CODE_ALPHABET.len(), 32);
    }

    #[test]
    fn test_parse_find_match() {
        let msg = ClientMessage::parse(r#"{"type":"find_match"}"#).unwrap();
        assert_eq!(msg, ClientMessage::FindMatch);
    }

    #[test]
    fn test_parse_create_room_code_is_uppercased() {
        let msg = ClientMessage::parse(r#"{"type":"create_room","code":"ab2c"}"#).unwrap();
        assert_eq!(
            msg,
            ClientMessage::CreateRoom {
                code: Some("AB2C".to_string())
            }
        );
    }

    #[test]
    fn test_parse_create_room_without_code() {
        for text in [
            r#"{"type":"create_room"}"#,
            r#"{"type":"create_room","code":""}"#,
            r#"{"type":"create_room","code":null}"#,
            r#"{"type":"create_room","code":0}"#,
        ] {
            let msg = ClientMessage::parse(text).unwrap();
            assert_eq!(msg, ClientMessage::CreateRoom { code: None }, "{}", text);
        }
    }

    #[test]
    fn test_parse_join_room_numeric_code() {
        let msg = ClientMessage::parse(r#"{"type":"join_room","code":2345}"#).unwrap();
        assert_eq!(
            msg,
            ClientMessage::JoinRoom {
                code: Some("2345".to_string())
            }
        );
    }

    #[test]
    fn test_numeric_code_renders_like_javascript() {
        assert_eq!(coerce_room_code(Some(&json!(12.0))), Some("12".to_string()));
        assert_eq!(coerce_room_code(Some(&json!(1e3))), Some("1000".to_string()));
        assert_eq!(coerce_room_code(Some(&json!(2.5))), Some("2.5".to_string()));
        assert_eq!(coerce_room_code(Some(&json!(-7))), Some("-7".to_string()));
        assert_eq!(coerce_room_code(Some(&json!(0.0))), None);
    }

    #[test]
    fn test_parse_state_keeps_coordinates_opaque() {
        let msg = ClientMessage::parse(r#"{"type":"state","x":1.5,"y":"up","z":3}"#).unwrap();
        assert_eq!(
            msg,
            ClientMessage::State {
                x: Some(json!(1.5)),
                y: Some(json!("up")),
            }
        );
    }

    #[test]
    fn test_parse_game_strips_type_only() {
        let msg = ClientMessage::parse(r#"{"type":"game","id":"99","action":"jump"}"#).unwrap();
        match msg {
            ClientMessage::Game { payload } => {
                assert!(!payload.contains_key("type"));
                assert_eq!(payload.get("id"), Some(&json!("99")));
                assert_eq!(payload.get("action"), Some(&json!("jump")));
            }
            other => panic!("Unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_parse_unknown_type() {
        let msg = ClientMessage::parse(r#"{"type":"dance"}"#).unwrap();
        assert_eq!(msg, ClientMessage::Unknown("dance".to_string()));
    }

    #[test]
    fn test_parse_rejects_malformed_frames() {
        assert!(matches!(
            ClientMessage::parse("not json"),
            Err(ProtocolError::InvalidJson(_))
        ));
        assert!(matches!(
            ClientMessage::parse("[1,2,3]"),
            Err(ProtocolError::NotAnObject)
        ));
        assert!(matches!(
            ClientMessage::parse(r#"{"code":"ABCD"}"#),
            Err(ProtocolError::MissingType)
        ));
        assert!(matches!(
            ClientMessage::parse(r#"{"type":7}"#),
            Err(ProtocolError::MissingType)
        ));
    }

    #[test]
    fn test_room_joined_host_flag_only_when_set() {
        let plain = ServerMessage::RoomJoined {
            code: "ABCD".to_string(),
            id: "3".to_string(),
            is_host: None,
        };
        assert_eq!(
            encode_value(&plain),
            json!({"type": "room_joined", "code": "ABCD", "id": "3"})
        );

        let matched = ServerMessage::RoomJoined {
            code: "ABCD".to_string(),
            id: "3".to_string(),
            is_host: Some(false),
        };
        assert_eq!(
            encode_value(&matched),
            json!({"type": "room_joined", "code": "ABCD", "id": "3", "is_host": false})
        );
    }

    #[test]
    fn test_waiting_for_match_shape() {
        assert_eq!(
            encode_value(&ServerMessage::WaitingForMatch),
            json!({"type": "waiting_for_match"})
        );
    }

    #[test]
    fn test_start_game_defaults() {
        let msg = ServerMessage::start_game(Map::new(), 1234);
        assert_eq!(
            encode_value(&msg),
            json!({"type": "start_game", "mode": "coop", "seed": 1234})
        );
    }

    #[test]
    fn test_start_game_echoes_sender_fields() {
        let fields = json!({"mode": "versus", "seed": 7, "level": 3})
            .as_object()
            .cloned()
            .unwrap();
        let msg = ServerMessage::start_game(fields, 1234);
        assert_eq!(
            encode_value(&msg),
            json!({"type": "start_game", "mode": "versus", "seed": 7, "level": 3})
        );
    }

    #[test]
    fn test_start_game_replaces_falsy_seed_and_mode() {
        let fields = json!({"mode": "", "seed": 0}).as_object().cloned().unwrap();
        let msg = ServerMessage::start_game(fields, 42);
        assert_eq!(
            encode_value(&msg),
            json!({"type": "start_game", "mode": "coop", "seed": 42})
        );
    }

    #[test]
    fn test_state_omits_missing_coordinates() {
        let msg = ServerMessage::State {
            id: "1".to_string(),
            x: Some(json!(4)),
            y: None,
        };
        assert_eq!(encode_value(&msg), json!({"type": "state", "id": "1", "x": 4}));
    }

    #[test]
    fn test_game_overwrites_sender_id() {
        let payload = json!({"id": "spoofed", "hp": 10, "type": "game"})
            .as_object()
            .cloned()
            .unwrap();
        let msg = ServerMessage::game(payload, "2".to_string());
        assert_eq!(
            encode_value(&msg),
            json!({"type": "game", "hp": 10, "id": "2"})
        );
    }

    #[test]
    fn test_is_falsy() {
        assert!(is_falsy(&json!(null)));
        assert!(is_falsy(&json!(false)));
        assert!(is_falsy(&json!(0)));
        assert!(is_falsy(&json!(0.0)));
        assert!(is_falsy(&json!("")));
        assert!(!is_falsy(&json!("0")));
        assert!(!is_falsy(&json!(1)));
        assert!(!is_falsy(&json!([])));
        assert!(!is_falsy(&json!({})));
    }

    #[test]
    fn test_is_generated_room_code() {
        assert!(is_generated_room_code("AB23"));
        assert!(!is_generated_room_code("AB2"));
        assert!(!is_generated_room_code("AB20"));
        assert!(!is_generated_room_code("abcd"));
    }
}
