//! Turning untrusted model text into a parsed JSON value.
//!
//! Stages run in order and each only when the previous one failed:
//! strict parse of the raw text, strict parse of the extracted candidate,
//! structural repair of the candidate and, on the shopping-list path, one
//! reformat request to the generator followed by the first three stages
//! on its reply.

use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use crate::error::PipelineError;
use crate::generator::{generate_within, Generator};
use crate::json_extract::extract_json_candidate;
use crate::prompts::reformat_prompts;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepairStage {
    Strict,
    Extracted,
    Repaired,
    Reformatted,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Recovered {
    pub value: Value,
    pub stage: RepairStage,
}

/// Runs the local stages of the cascade.
pub fn recover_json(raw: &str) -> Result<Recovered, PipelineError> {
    let recovered = recover_locally(raw).ok_or_else(|| PipelineError::UnparseableOutput {
        raw: raw.to_string(),
    })?;
    debug!(stage = ?recovered.stage, "recovered JSON from model output");
    Ok(recovered)
}

/// Runs the local stages and, if they all fail, asks `generator` once to
/// rewrite the candidate into `target_shape`.
pub async fn recover_json_or_reformat(
    raw: &str,
    generator: &dyn Generator,
    timeout: Option<Duration>,
    target_shape: &str,
) -> Result<Recovered, PipelineError> {
    if let Some(recovered) = recover_locally(raw) {
        debug!(stage = ?recovered.stage, "recovered JSON from model output");
        return Ok(recovered);
    }

    debug!("local repair exhausted, requesting reformat");
    let prompts = reformat_prompts(extract_json_candidate(raw), target_shape);
    let reformatted = generate_within(generator, timeout, &prompts.system, &prompts.user, true).await?;

    match recover_locally(&reformatted) {
        Some(recovered) => Ok(Recovered {
            value: recovered.value,
            stage: RepairStage::Reformatted,
        }),
        None => Err(PipelineError::UnparseableOutput {
            raw: raw.to_string(),
        }),
    }
}

fn recover_locally(raw: &str) -> Option<Recovered> {
    if let Ok(value) = serde_json::from_str::<Value>(raw) {
        return Some(Recovered {
            value,
            stage: RepairStage::Strict,
        });
    }

    let candidate = extract_json_candidate(raw);
    if let Ok(value) = serde_json::from_str::<Value>(candidate) {
        return Some(Recovered {
            value,
            stage: RepairStage::Extracted,
        });
    }

    let repaired = repair_json(candidate)?;
    match serde_json::from_str::<Value>(&repaired) {
        Ok(value) => Some(Recovered {
            value,
            stage: RepairStage::Repaired,
        }),
        Err(e) => {
            debug!(error = %e, "structural repair did not yield valid JSON");
            None
        }
    }
}

/// Rewrites almost-JSON into JSON text.
///
/// Handles trailing and missing commas, unquoted or single-quoted keys,
/// single-quoted strings, Python literals, comments, missing values and
/// truncated documents (open strings and containers are closed). Text
/// before the first `{` or `[` and after the root value is dropped.
///
/// Returns `None` when there is no container to start from, or when a
/// value is an unquoted word that is neither a number nor a literal:
/// that is prose, not JSON.
pub fn repair_json(text: &str) -> Option<String> {
    let chars: Vec<char> = text.chars().collect();
    let start = chars.iter().position(|c| matches!(c, '{' | '['))?;
    let mut repairer = Repairer {
        chars,
        pos: start,
        out: String::with_capacity(text.len()),
        stack: Vec::new(),
        root_done: false,
    };
    repairer.run()?;
    Some(repairer.out)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ObjectState {
    /// Right after `{`.
    Key,
    Colon,
    Value,
    /// After a member; a comma is owed before the next key.
    Next,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArrayState {
    Value,
    Next,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Frame {
    Object(ObjectState),
    Array(ArrayState),
}

struct Repairer {
    chars: Vec<char>,
    pos: usize,
    out: String,
    stack: Vec<Frame>,
    root_done: bool,
}

impl Repairer {
    fn run(&mut self) -> Option<()> {
        while self.pos < self.chars.len() && !self.root_done {
            let c = self.chars[self.pos];
            match c {
                c if c.is_whitespace() => self.pos += 1,
                '/' if matches!(self.peek(1), Some('/') | Some('*')) => self.skip_comment(),
                '{' | '[' => {
                    self.prepare_value();
                    self.out.push(c);
                    self.stack.push(if c == '{' {
                        Frame::Object(ObjectState::Key)
                    } else {
                        Frame::Array(ArrayState::Value)
                    });
                    self.pos += 1;
                }
                '}' | ']' => {
                    self.close(c == '}');
                    self.pos += 1;
                }
                ':' => {
                    if let Some(Frame::Object(state @ ObjectState::Colon)) = self.stack.last_mut() {
                        *state = ObjectState::Value;
                        self.out.push(':');
                    }
                    self.pos += 1;
                }
                ',' => {
                    // Commas are re-emitted lazily before the next element, which
                    // drops trailing ones and restores missing ones.
                    match self.stack.last_mut() {
                        Some(Frame::Object(state @ ObjectState::Colon)) => {
                            *state = ObjectState::Next;
                            self.out.push_str(":null");
                        }
                        Some(Frame::Object(state @ ObjectState::Value)) => {
                            *state = ObjectState::Next;
                            self.out.push_str("null");
                        }
                        _ => {}
                    }
                    self.pos += 1;
                }
                '"' | '\'' => {
                    let body = self.read_string(c);
                    self.emit_token(format!("\"{body}\""));
                }
                _ if self.in_key_position() => {
                    let key = self.read_bare_key();
                    self.emit_token(quote(&key));
                }
                _ => {
                    let word = self.read_bare_value();
                    let literal = scalar_literal(&word)?;
                    self.emit_token(literal);
                }
            }
        }
        while !self.stack.is_empty() {
            self.close_top();
        }
        Some(())
    }

    fn peek(&self, ahead: usize) -> Option<char> {
        self.chars.get(self.pos + ahead).copied()
    }

    fn in_key_position(&self) -> bool {
        matches!(
            self.stack.last(),
            Some(Frame::Object(ObjectState::Key | ObjectState::Next))
        )
    }

    /// Emits a scalar (or key) token in whatever role the current frame expects.
    fn emit_token(&mut self, token: String) {
        match self.stack.last_mut() {
            Some(Frame::Object(state @ (ObjectState::Key | ObjectState::Next))) => {
                if *state == ObjectState::Next {
                    self.out.push(',');
                }
                *state = ObjectState::Colon;
                self.out.push_str(&token);
            }
            _ => {
                self.prepare_value();
                self.out.push_str(&token);
                self.finish_value();
            }
        }
    }

    fn prepare_value(&mut self) {
        match self.stack.last_mut() {
            Some(Frame::Array(state)) => {
                if *state == ArrayState::Next {
                    self.out.push(',');
                }
                *state = ArrayState::Value;
            }
            Some(Frame::Object(state @ ObjectState::Colon)) => {
                self.out.push(':');
                *state = ObjectState::Value;
            }
            _ => {}
        }
    }

    fn finish_value(&mut self) {
        match self.stack.last_mut() {
            Some(Frame::Array(state)) => *state = ArrayState::Next,
            Some(Frame::Object(state)) => *state = ObjectState::Next,
            None => self.root_done = true,
        }
    }

    fn close(&mut self, object: bool) {
        let matches_kind = |frame: &Frame| matches!(frame, Frame::Object(_)) == object;
        if !self.stack.iter().any(matches_kind) {
            return;
        }
        while let Some(frame) = self.stack.last().copied() {
            self.close_top();
            if matches_kind(&frame) {
                break;
            }
        }
    }

    fn close_top(&mut self) {
        match self.stack.pop() {
            Some(Frame::Object(state)) => {
                match state {
                    ObjectState::Colon => self.out.push_str(":null"),
                    ObjectState::Value => self.out.push_str("null"),
                    ObjectState::Key | ObjectState::Next => {}
                }
                self.out.push('}');
            }
            Some(Frame::Array(_)) => self.out.push(']'),
            None => return,
        }
        self.finish_value();
    }

    fn skip_comment(&mut self) {
        let block = self.peek(1) == Some('*');
        self.pos += 2;
        while self.pos < self.chars.len() {
            if block && self.chars[self.pos] == '*' && self.peek(1) == Some('/') {
                self.pos += 2;
                return;
            }
            if !block && self.chars[self.pos] == '\n' {
                return;
            }
            self.pos += 1;
        }
    }

    /// Reads a quoted string and returns its body re-escaped for a
    /// double-quoted JSON string. An unterminated string runs to the end.
    fn read_string(&mut self, quote: char) -> String {
        let mut body = String::new();
        self.pos += 1;
        while let Some(c) = self.peek(0) {
            if c == '\\' {
                match self.peek(1) {
                    Some(n @ ('"' | '\\' | '/' | 'b' | 'f' | 'n' | 'r' | 't')) => {
                        body.push('\\');
                        body.push(n);
                        self.pos += 2;
                    }
                    Some('u') if self.unicode_escape_follows() => {
                        body.extend(&self.chars[self.pos..self.pos + 6]);
                        self.pos += 6;
                    }
                    Some('\'') => {
                        body.push('\'');
                        self.pos += 2;
                    }
                    Some(_) => {
                        body.push_str("\\\\");
                        self.pos += 1;
                    }
                    None => self.pos += 1,
                }
                continue;
            }
            self.pos += 1;
            match c {
                c if c == quote => return body,
                '"' => body.push_str("\\\""),
                '\n' => body.push_str("\\n"),
                '\r' => body.push_str("\\r"),
                '\t' => body.push_str("\\t"),
                c if c.is_control() => body.push_str(&format!("\\u{:04x}", c as u32)),
                c => body.push(c),
            }
        }
        body
    }

    fn unicode_escape_follows(&self) -> bool {
        self.chars
            .get(self.pos + 2..self.pos + 6)
            .is_some_and(|hex| hex.iter().all(char::is_ascii_hexdigit))
    }

    /// An unquoted key runs to the next delimiter or line end, so
    /// `meal type:` stays one key.
    fn read_bare_key(&mut self) -> String {
        let start = self.pos;
        while self.peek(0).is_some_and(|c| c != '\n') && !self.at_delimiter() {
            self.pos += 1;
        }
        self.chars[start..self.pos].iter().collect::<String>().trim().to_string()
    }

    /// An unquoted value stops at whitespace so `[1 2]` splits.
    fn read_bare_value(&mut self) -> String {
        let start = self.pos;
        while self.peek(0).is_some_and(|c| !c.is_whitespace()) && !self.at_delimiter() {
            self.pos += 1;
        }
        self.chars[start..self.pos].iter().collect()
    }

    fn at_delimiter(&self) -> bool {
        match self.peek(0) {
            Some(',' | '{' | '}' | '[' | ']' | ':' | '"') => true,
            Some('/') => matches!(self.peek(1), Some('/') | Some('*')),
            _ => false,
        }
    }
}

fn quote(word: &str) -> String {
    Value::String(word.to_string()).to_string()
}

/// JSON text for numbers and the literal spellings models use.
fn scalar_literal(word: &str) -> Option<String> {
    let literal = match word {
        "true" | "True" | "TRUE" => "true",
        "false" | "False" | "FALSE" => "false",
        "null" | "Null" | "NULL" | "None" | "nil" | "undefined" | "NaN" | "Infinity"
        | "-Infinity" => "null",
        _ if serde_json::from_str::<serde_json::Number>(word).is_ok() => word,
        _ => {
            return word
                .parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(|number| number.to_string())
        }
    };
    Some(literal.to_string())
}
