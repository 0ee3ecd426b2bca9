//! Server-side script invocation and reply decoding.
//!
//! Every script in this crate answers with a flat array of strings whose
//! first element is a status tag:
//!
//! ```text
//! {'OK', value, value, ...}
//! {'FAIL', 'ReasonCode'}
//! ```
//!
//! Numbers are converted with `tostring` inside the script because the
//! store truncates Lua floats to integers in replies.

use std::str::FromStr;

use redis::aio::ConnectionLike;
use redis::{RedisResult, Script};

/// Decoded script reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptReply {
    Ok(Vec<String>),
    Fail(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed script reply: {0}")]
pub struct MalformedReply(pub String);

impl ScriptReply {
    pub fn decode(mut raw: Vec<String>) -> Result<Self, MalformedReply> {
        if raw.is_empty() {
            return Err(MalformedReply("empty reply".to_string()));
        }

        let tag = raw.remove(0);
        match tag.as_str() {
            "OK" => Ok(Self::Ok(raw)),
            "FAIL" => raw
                .into_iter()
                .next()
                .map(Self::Fail)
                .ok_or_else(|| MalformedReply("FAIL without reason".to_string())),
            other => Err(MalformedReply(format!("unknown status tag {:?}", other))),
        }
    }
}

/// Parse the value at `index` of an `OK` payload.
pub fn value_at<T: FromStr>(values: &[String], index: usize) -> Result<T, MalformedReply> {
    let raw = values
        .get(index)
        .ok_or_else(|| MalformedReply(format!("missing value at {}", index)))?;

    raw.parse()
        .map_err(|_| MalformedReply(format!("unparseable value {:?} at {}", raw, index)))
}

/// Run `script` with the given keys and args, returning the raw string array.
///
/// `invoke_async` sends `EVALSHA` and falls back to `EVAL` once when the
/// store has not cached the script yet.
pub async fn invoke<C>(
    script: &Script,
    keys: &[String],
    args: &[String],
    con: &mut C,
) -> RedisResult<Vec<String>>
where
    C: ConnectionLike + Send,
{
    let mut invocation = script.prepare_invoke();
    for key in keys {
        invocation.key(key);
    }
    for arg in args {
        invocation.arg(arg);
    }
    invocation.invoke_async(con).await
}
