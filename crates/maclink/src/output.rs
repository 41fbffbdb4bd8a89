use std::io::{IsTerminal, Write};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use maclink_socket::Message;
use serde::Serialize;
use serde_json::Value;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct ReplyOutput<'a> {
    command: &'a str,
    size: usize,
    reply: Value,
}

#[derive(Serialize)]
struct NotificationOutput {
    topic: String,
    frames: usize,
    size: usize,
    body: Vec<Value>,
    timestamp: String,
}

#[derive(Serialize)]
struct ElapsedOutput {
    commands: usize,
    elapsed_ms: u128,
}

/// Print one command reply.
pub fn print_reply(command: &str, reply: &[u8], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = ReplyOutput {
                command,
                size: reply.len(),
                reply: payload_value(reply),
            };
            print_json(&out);
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["COMMAND", "SIZE", "REPLY"])
                .add_row(vec![
                    command.to_string(),
                    reply.len().to_string(),
                    payload_preview(reply),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "cmd={} size={} reply={}",
                command,
                reply.len(),
                payload_preview(reply)
            );
        }
        OutputFormat::Raw => {
            print_raw(reply);
            print_raw(b"\n");
        }
    }
}

/// Print one notification. The first frame is shown as the topic.
pub fn print_notification(message: &Message, format: OutputFormat) {
    let frames = message.frames();
    let topic = payload_preview(message.first());
    match format {
        OutputFormat::Json => {
            let out = NotificationOutput {
                topic,
                frames: frames.len(),
                size: message.payload_size(),
                body: frames[1..].iter().map(|f| payload_value(f)).collect(),
                timestamp: now_unix_seconds(),
            };
            print_json(&out);
        }
        OutputFormat::Table => {
            let body: Vec<String> = frames[1..].iter().map(|f| payload_preview(f)).collect();
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["TOPIC", "FRAMES", "SIZE", "BODY"])
                .add_row(vec![
                    topic,
                    frames.len().to_string(),
                    message.payload_size().to_string(),
                    body.join("\n"),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            let body: Vec<String> = frames[1..].iter().map(|f| payload_preview(f)).collect();
            println!(
                "topic={} frames={} size={} body={}",
                topic,
                frames.len(),
                message.payload_size(),
                body.join(" | ")
            );
        }
        OutputFormat::Raw => {
            for (i, frame) in frames.iter().enumerate() {
                if i > 0 {
                    print_raw(b" ");
                }
                print_raw(frame);
            }
            print_raw(b"\n");
        }
    }
}

/// Print the total time a sequence of commands took.
pub fn print_elapsed(commands: usize, elapsed: Duration, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&ElapsedOutput {
            commands,
            elapsed_ms: elapsed.as_millis(),
        }),
        OutputFormat::Table | OutputFormat::Pretty | OutputFormat::Raw => {
            println!("{} commands in {:.3}s", commands, elapsed.as_secs_f64());
        }
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

/// Embed JSON payloads as JSON; anything else as a string.
fn payload_value(payload: &[u8]) -> Value {
    serde_json::from_slice(payload).unwrap_or_else(|_| Value::String(payload_preview(payload)))
}

fn payload_preview(payload: &[u8]) -> String {
    match std::str::from_utf8(payload) {
        Ok(text) => text.to_string(),
        Err(_) => format!("<binary {} bytes>", payload.len()),
    }
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_payloads_are_embedded() {
        assert_eq!(
            payload_value(br#"{"success":true}"#),
            serde_json::json!({ "success": true })
        );
        assert_eq!(payload_value(b"OK"), Value::String("OK".to_string()));
    }

    #[test]
    fn binary_payload_preview() {
        assert_eq!(payload_preview(&[0xff, 0xfe]), "<binary 2 bytes>");
    }
}
