use maclink_grammar::{Command, Reply};
use maclink_socket::{ClientConfig, CommandClient};
use serde_json::Value;

use crate::cmd::{parse_optional_duration, CallArgs};
use crate::exit::{grammar_error, socket_error, CliError, CliResult, FAILURE, SUCCESS, USAGE};
use crate::output::{print_reply, OutputFormat};

pub fn run(args: CallArgs, format: OutputFormat) -> CliResult<i32> {
    let request: Value = serde_json::from_str(&args.request)
        .map_err(|err| CliError::new(USAGE, format!("request is not valid JSON: {err}")))?;

    if args.check {
        Command::from_json(&args.request).map_err(|err| grammar_error("check failed", err))?;
    }

    let kind = request
        .get("cmd")
        .and_then(Value::as_str)
        .unwrap_or("-")
        .to_string();

    let config = ClientConfig {
        reply_timeout: parse_optional_duration(args.timeout.as_deref())?,
        ..ClientConfig::new(args.endpoint)
    };
    let mut client = CommandClient::new(config);
    let reply = client
        .call_raw(args.request.as_bytes())
        .map_err(|err| socket_error("call failed", err))?;
    client.close();

    print_reply(&kind, &reply, format);
    Ok(reply_exit_code(&reply))
}

/// Replies that parse as a service reply exit by their `success` field;
/// anything else was delivered and counts as success.
pub(crate) fn reply_exit_code(reply: &[u8]) -> i32 {
    match Reply::parse(reply) {
        Ok(reply) if !reply.success => {
            if let Some(error) = &reply.error {
                tracing::warn!(error = %error, "service reported failure");
            }
            FAILURE
        }
        _ => SUCCESS,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_code_follows_success_field() {
        assert_eq!(reply_exit_code(br#"{"success":true}"#), SUCCESS);
        assert_eq!(
            reply_exit_code(br#"{"success":false,"error":"no such grammar"}"#),
            FAILURE
        );
        assert_eq!(reply_exit_code(b"OK"), SUCCESS);
    }
}
