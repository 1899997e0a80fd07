//! Terminal wire protocol: tagged JSON frames over WebSocket text messages.
//!
//! Requests the client did not cause to fail are answered or acknowledged
//! implicitly; fire-and-forget operations (`write`, `resize`, `kill`) get no
//! reply at all. Unknown session ids are silently ignored on the server, so
//! a client racing a process exit never sees an error for it.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use keel_term::ShellInfo;

/// Messages a client sends.
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub enum ClientRequest {
    /// List the shells installed on this machine.
    #[serde(rename = "get_shells")]
    GetShells,

    /// Spawn a new session. All fields are optional.
    #[serde(rename = "create")]
    Create {
        #[serde(default)]
        shell: Option<String>,
        #[serde(default)]
        cwd: Option<String>,
        #[serde(default)]
        cols: Option<u16>,
        #[serde(default)]
        rows: Option<u16>,
        /// Spawn arguments; omitted selects the shell's login-session flags.
        #[serde(default)]
        args: Option<Vec<String>>,
        /// Extra environment variables layered over the server's.
        #[serde(default)]
        env: HashMap<String, String>,
    },

    /// Feed keyboard input to a session.
    #[serde(rename = "write")]
    Write { id: u64, data: String },

    /// Resize a session's screen.
    #[serde(rename = "resize")]
    Resize { id: u64, cols: u16, rows: u16 },

    /// Terminate a session.
    #[serde(rename = "kill")]
    Kill { id: u64 },

    /// List live session ids.
    #[serde(rename = "get_all")]
    GetAll,
}

/// Messages the server sends.
#[derive(Debug, Serialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    #[serde(rename = "shells")]
    Shells { shells: Vec<ShellInfo> },

    #[serde(rename = "created")]
    Created { id: u64 },

    #[serde(rename = "create_failed")]
    CreateFailed { error: String },

    /// Output from a session this client created.
    #[serde(rename = "data")]
    Data { id: u64, data: String },

    /// A session this client created exited on its own.
    #[serde(rename = "exit")]
    Exit { id: u64, code: u32 },

    #[serde(rename = "session_ids")]
    SessionIds { ids: Vec<u64> },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_request_accepts_missing_fields() {
        let req: ClientRequest = serde_json::from_str(r#"{"type":"create"}"#).unwrap();
        match req {
            ClientRequest::Create {
                shell,
                cwd,
                cols,
                rows,
                args,
                env,
            } => {
                assert!(shell.is_none());
                assert!(cwd.is_none());
                assert!(cols.is_none());
                assert!(rows.is_none());
                assert!(args.is_none());
                assert!(env.is_empty());
            }
            other => panic!("wrong variant: {other:?}"),
        }
    }

    #[test]
    fn create_request_accepts_args_and_env() {
        let req: ClientRequest = serde_json::from_str(
            r#"{"type":"create","shell":"/bin/sh","args":["-l"],"env":{"FOO":"bar"}}"#,
        )
        .unwrap();
        match req {
            ClientRequest::Create { args, env, .. } => {
                assert_eq!(args, Some(vec!["-l".to_string()]));
                assert_eq!(env.get("FOO").map(String::as_str), Some("bar"));
            }
            other => panic!("wrong variant: {other:?}"),
        }
    }

    #[test]
    fn write_request_parses_id_and_data() {
        let req: ClientRequest =
            serde_json::from_str(r#"{"type":"write","id":3,"data":"ls\r"}"#).unwrap();
        match req {
            ClientRequest::Write { id, data } => {
                assert_eq!(id, 3);
                assert_eq!(data, "ls\r");
            }
            other => panic!("wrong variant: {other:?}"),
        }
    }

    #[test]
    fn unknown_request_type_is_an_error() {
        assert!(serde_json::from_str::<ClientRequest>(r#"{"type":"reboot"}"#).is_err());
    }

    #[test]
    fn server_messages_carry_their_tag() {
        let json = serde_json::to_string(&ServerMessage::Created { id: 7 }).unwrap();
        assert_eq!(json, r#"{"type":"created","id":7}"#);

        let json = serde_json::to_string(&ServerMessage::Exit { id: 7, code: 0 }).unwrap();
        assert_eq!(json, r#"{"type":"exit","id":7,"code":0}"#);

        let json = serde_json::to_string(&ServerMessage::SessionIds { ids: vec![1, 2] }).unwrap();
        assert_eq!(json, r#"{"type":"session_ids","ids":[1,2]}"#);
    }
}
