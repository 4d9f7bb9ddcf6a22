//! # Requests
//!
//! Commands sent by the ground client. One framed request per datagram.

use serde::{Deserialize, Serialize};

use super::types::Pose;
use crate::error::DecodeError;

/// Command kinds understood by the executor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Command {
    SetOffboard,
    SetArm,
    SetReturnToHome,
    Goto,
    Heartbeat,
    /// Any command name this build does not know; ignored
    #[serde(other)]
    Unknown,
}

impl Command {
    /// Whether the command changes aircraft state and must hold the command gate
    pub fn is_mutating(&self) -> bool {
        matches!(
            self,
            Command::SetOffboard | Command::SetArm | Command::SetReturnToHome | Command::Goto
        )
    }
}

/// Inbound request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub id: u32,
    pub command: Command,
    /// Opaque payload, only interpreted by `GOTO` (a JSON [`Pose`])
    #[serde(default)]
    pub payload: Vec<u8>,
}

/// A decoded mutating command, ready to run
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Action {
    SetOffboard,
    SetArm,
    SetReturnToHome,
    Goto(Pose),
}

impl Request {
    pub fn new(id: u32, command: Command) -> Self {
        Self { id, command, payload: Vec::new() }
    }

    /// Build a `GOTO` request carrying `target`
    pub fn goto(id: u32, target: &Pose) -> serde_json::Result<Self> {
        Ok(Self {
            id,
            command: Command::Goto,
            payload: serde_json::to_vec(target)?,
        })
    }

    /// Parse a request from a verified frame payload
    ///
    /// # Errors
    ///
    /// Returns `DecodeError::Malformed` if the bytes are not a JSON object with
    /// an integer `id` and a string `command`.
    ///
    /// # Examples
    ///
    /// ```
    /// use uav_commander::message::{Command, Request};
    ///
    /// let request = Request::parse(br#"{"id":5,"command":"SET_ARM"}"#)?;
    /// assert_eq!(request.command, Command::SetArm);
    /// assert!(request.payload.is_empty());
    /// # Ok::<(), uav_commander::error::DecodeError>(())
    /// ```
    pub fn parse(bytes: &[u8]) -> Result<Self, DecodeError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    pub fn to_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    /// Resolve the mutating action carried by this request
    ///
    /// Returns `Ok(None)` for heartbeats and unknown commands. The payload is
    /// ignored by every command except `GOTO`.
    ///
    /// # Errors
    ///
    /// Returns `DecodeError::Malformed` if a `GOTO` payload is not a pose.
    pub fn action(&self) -> Result<Option<Action>, DecodeError> {
        let action = match self.command {
            Command::SetOffboard => Action::SetOffboard,
            Command::SetArm => Action::SetArm,
            Command::SetReturnToHome => Action::SetReturnToHome,
            Command::Goto => {
                let target: Pose = serde_json::from_slice(&self.payload)
                    .map_err(|e| DecodeError::Malformed(format!("GOTO target pose: {}", e)))?;
                Action::Goto(target)
            }
            Command::Heartbeat | Command::Unknown => return Ok(None),
        };
        Ok(Some(action))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::types::{Point, Quaternion};

    #[test]
    fn test_parse_all_known_commands() {
        let cases = [
            ("SET_OFFBOARD", Command::SetOffboard),
            ("SET_ARM", Command::SetArm),
            ("SET_RETURN_TO_HOME", Command::SetReturnToHome),
            ("GOTO", Command::Goto),
            ("HEARTBEAT", Command::Heartbeat),
        ];

        for (name, expected) in cases {
            let json = format!(r#"{{"id":9,"command":"{}"}}"#, name);
            let request = Request::parse(json.as_bytes()).unwrap();
            assert_eq!(request.id, 9);
            assert_eq!(request.command, expected, "command {}", name);
        }
    }

    #[test]
    fn test_unknown_command_is_not_an_error() {
        let request = Request::parse(br#"{"id":1,"command":"SELF_DESTRUCT"}"#).unwrap();
        assert_eq!(request.command, Command::Unknown);
        assert!(!request.command.is_mutating());
        assert_eq!(request.action().unwrap(), None);
    }

    #[test]
    fn test_missing_fields_are_malformed() {
        let inputs: [&[u8]; 4] = [br#"{"command":"SET_ARM"}"#, br#"{"id":1}"#, b"", b"\xff\x00"];
        for bytes in inputs {
            let result = Request::parse(bytes);
            assert!(matches!(result, Err(DecodeError::Malformed(_))), "input {:?}", bytes);
        }
    }

    #[test]
    fn test_wrong_field_type_is_malformed() {
        let result = Request::parse(br#"{"id":"seven","command":"SET_ARM"}"#);
        assert!(matches!(result, Err(DecodeError::Malformed(_))));
    }

    #[test]
    fn test_goto_action_decodes_pose() {
        let target = Pose::new(Point::new(1.0, -2.0, 5.0), Quaternion::from_yaw(0.3));
        let request = Request::goto(11, &target).unwrap();
        let parsed = Request::parse(&request.to_bytes().unwrap()).unwrap();
        assert_eq!(parsed.action().unwrap(), Some(Action::Goto(target)));
    }

    #[test]
    fn test_goto_with_bad_payload_is_malformed() {
        let mut request = Request::new(4, Command::Goto);
        assert!(request.action().is_err());

        request.payload = b"not a pose".to_vec();
        assert!(matches!(request.action(), Err(DecodeError::Malformed(_))));
    }

    #[test]
    fn test_payload_ignored_for_other_commands() {
        let mut request = Request::new(2, Command::SetArm);
        request.payload = b"garbage".to_vec();
        assert_eq!(request.action().unwrap(), Some(Action::SetArm));
    }

    #[test]
    fn test_heartbeat_has_no_action() {
        let request = Request::new(3, Command::Heartbeat);
        assert!(!request.command.is_mutating());
        assert_eq!(request.action().unwrap(), None);
    }
}
