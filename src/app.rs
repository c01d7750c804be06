use std::time::Duration;

use anyhow::Result;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

use crate::client::{self, Answer, AnswerField, AskClient, AskResponse};
use crate::config::Config;
use crate::tui::AppEvent;

pub const CONNECTION_ERROR_MSG: &str = "Error connecting to server.";
pub const TIMEOUT_MSG: &str = "Request timed out. The server may still be processing.";
pub const UNKNOWN_FORMAT_MSG: &str = "Unknown response format from server.";
pub const NO_RESULT_MSG: &str = "No result returned from server.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone)]
pub struct TableData {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<serde_json::Value>>,
    pub insight: Option<String>,
}

#[derive(Debug, Clone)]
pub enum EntryBody {
    Text(String),
    Table(TableData),
}

/// How the backend produced a reply: which pipeline path and what SQL ran.
#[derive(Debug, Clone, Default)]
pub struct ReplyMeta {
    pub source: Option<String>,
    pub sql_used: Option<String>,
    pub tables_used: Option<Vec<String>>,
}

impl ReplyMeta {
    fn from_envelope(envelope: &AskResponse) -> Option<Self> {
        if envelope.source.is_none() && envelope.sql_used.is_none() && envelope.tables_used.is_none()
        {
            return None;
        }
        Some(Self {
            source: envelope.source.clone(),
            sql_used: envelope.sql_used.clone(),
            tables_used: envelope.tables_used.clone(),
        })
    }
}

/// One transcript entry. Entries are appended on their triggering event and
/// never mutated afterwards.
#[derive(Debug, Clone)]
pub struct ChatEntry {
    pub role: Role,
    pub body: EntryBody,
    pub meta: Option<ReplyMeta>,
}

pub struct App {
    pub should_quit: bool,
    pub input_mode: InputMode,

    // Input state
    pub input: String,
    pub cursor: usize, // cursor position in chars

    // Transcript state
    pub transcript: Vec<ChatEntry>,
    pub chat_scroll: u16,
    pub chat_height: u16, // inner size of the chat area, set during render
    pub chat_width: u16,

    // Pending request: the sequence number of the submission whose reply we
    // are waiting for. A reply with any other number is stale and ignored,
    // and submitting is a no-op while one is outstanding.
    pending: Option<u64>,
    next_seq: u64,

    // Animation state (0-2 for the ellipsis)
    pub animation_frame: u8,

    pub show_sql: bool,
    pub server_up: bool,

    pub client: AskClient,
    events: UnboundedSender<AppEvent>,
}

impl App {
    pub fn new(endpoint: &str, config: &Config, events: UnboundedSender<AppEvent>) -> Result<Self> {
        let client = AskClient::new(endpoint, Duration::from_secs(config.timeout_secs()))?;

        Ok(Self {
            should_quit: false,
            input_mode: InputMode::Editing,
            input: String::new(),
            cursor: 0,
            transcript: Vec::new(),
            chat_scroll: 0,
            chat_height: 0,
            chat_width: 0,
            pending: None,
            next_seq: 0,
            animation_frame: 0,
            show_sql: config.show_sql(),
            server_up: false,
            client,
            events,
        })
    }

    /// One-time reachability probe, shown in the header.
    pub async fn probe_server(&mut self) {
        self.server_up = self.client.health().await;
        if !self.server_up {
            warn!("server not reachable at {}", self.client.base_url());
        }
    }

    pub fn is_loading(&self) -> bool {
        self.pending.is_some()
    }

    /// Submit the current input as a question.
    ///
    /// Whitespace-only input is a no-op: nothing is appended and no request
    /// goes out. So is submitting while a request is already pending.
    pub fn submit_question(&mut self) {
        let question = self.input.trim().to_string();
        if question.is_empty() || self.pending.is_some() {
            return;
        }

        self.transcript.push(ChatEntry {
            role: Role::User,
            body: EntryBody::Text(question.clone()),
            meta: None,
        });
        self.input.clear();
        self.cursor = 0;

        let seq = self.next_seq;
        self.next_seq += 1;
        self.pending = Some(seq);
        info!(seq, "submitting question");

        let client = self.client.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            let result = client.ask(&question).await;
            // Receiver gone means the app is shutting down.
            let _ = events.send(AppEvent::Reply(seq, result));
        });

        self.scroll_to_bottom();
    }

    /// Apply a finished request. Clears the pending indicator and appends
    /// exactly one assistant entry, whatever shape came back.
    pub fn handle_reply(&mut self, seq: u64, result: Result<AskResponse>) {
        if self.pending != Some(seq) {
            debug!(seq, "dropping stale reply");
            return;
        }
        self.pending = None;

        match result {
            Ok(envelope) => self.push_envelope(envelope),
            Err(err) => {
                warn!(seq, error = %err, "request failed");
                let message = if client::is_timeout(&err) {
                    TIMEOUT_MSG
                } else {
                    CONNECTION_ERROR_MSG
                };
                self.push_assistant_text(message.to_string(), None);
            }
        }

        self.scroll_to_bottom();
    }

    fn push_envelope(&mut self, envelope: AskResponse) {
        let meta = ReplyMeta::from_envelope(&envelope);

        // A top-level error short-circuits any answer.
        if let Some(error) = envelope.error {
            self.push_assistant_text(error, meta);
            return;
        }

        match envelope.answer {
            Some(AnswerField::Tagged(Answer::Text { message })) => {
                self.push_assistant_text(message, meta);
            }
            Some(AnswerField::Tagged(Answer::Table {
                columns,
                rows,
                insight,
            })) => {
                self.transcript.push(ChatEntry {
                    role: Role::Assistant,
                    body: EntryBody::Table(TableData {
                        columns,
                        rows,
                        insight,
                    }),
                    meta,
                });
            }
            // Cache and rule-engine replies carry the answer as a bare string.
            Some(AnswerField::Plain(text)) => {
                self.push_assistant_text(text, meta);
            }
            Some(AnswerField::Tagged(Answer::Unknown)) | Some(AnswerField::Other(_)) => {
                self.push_assistant_text(UNKNOWN_FORMAT_MSG.to_string(), meta);
            }
            None => {
                self.push_assistant_text(NO_RESULT_MSG.to_string(), meta);
            }
        }
    }

    fn push_assistant_text(&mut self, text: String, meta: Option<ReplyMeta>) {
        self.transcript.push(ChatEntry {
            role: Role::Assistant,
            body: EntryBody::Text(text),
            meta,
        });
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.pending.is_some() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    pub fn scroll_up(&mut self) {
        self.chat_scroll = self.chat_scroll.saturating_sub(1);
    }

    pub fn scroll_down(&mut self) {
        self.chat_scroll = self.chat_scroll.saturating_add(1);
    }

    /// Scroll the transcript so the newest entry (or the pending indicator)
    /// is visible.
    pub fn scroll_to_bottom(&mut self) {
        let wrap_width = if self.chat_width > 0 {
            self.chat_width as usize
        } else {
            50
        };

        let mut total_lines: u16 = 0;
        for entry in &self.transcript {
            total_lines += self.entry_line_count(entry, wrap_width);
        }

        if self.pending.is_some() {
            total_lines += 2; // "Assistant:" + "Thinking..."
        }

        let visible_height = if self.chat_height > 0 {
            self.chat_height
        } else {
            20
        };

        if total_lines > visible_height {
            self.chat_scroll = total_lines.saturating_sub(visible_height);
        } else {
            self.chat_scroll = 0;
        }
    }

    fn entry_line_count(&self, entry: &ChatEntry, wrap_width: usize) -> u16 {
        let mut lines: u16 = 1; // role line ("You:" or "Assistant:")

        match &entry.body {
            EntryBody::Text(text) => {
                for line in text.lines() {
                    // Character count, not byte length, for proper UTF-8
                    // handling.
                    let char_count = line.chars().count();
                    if char_count == 0 {
                        lines += 1;
                    } else {
                        lines += ((char_count.saturating_sub(1) / wrap_width) + 1) as u16;
                    }
                }
            }
            EntryBody::Table(table) => {
                lines += (table.rows.len() + 2) as u16; // header + separator
                if table.insight.is_some() {
                    lines += 2; // blank + insight line
                }
            }
        }

        if entry.meta.is_some() && entry.role == Role::Assistant {
            lines += 1; // source/SQL line
        }

        lines + 1 // blank line after the entry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn test_app() -> App {
        let (tx, rx) = mpsc::unbounded_channel();
        // Keep the receiver alive so spawned tasks can send without error.
        std::mem::forget(rx);
        App::new(crate::config::DEFAULT_ENDPOINT, &Config::default(), tx).unwrap()
    }

    fn envelope(json: &str) -> AskResponse {
        serde_json::from_str(json).unwrap()
    }

    fn assistant_text(app: &App, idx: usize) -> &str {
        match &app.transcript[idx].body {
            EntryBody::Text(text) => text,
            other => panic!("expected text entry, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_whitespace_input_is_noop() {
        let mut app = test_app();
        for input in ["", "   ", "\t\n  "] {
            app.input = input.to_string();
            app.submit_question();
            assert!(app.transcript.is_empty());
            assert!(!app.is_loading());
        }
    }

    #[tokio::test]
    async fn test_submit_appends_one_user_entry() {
        let mut app = test_app();
        app.input = "  What is the total revenue?  ".to_string();
        app.submit_question();

        assert_eq!(app.transcript.len(), 1);
        assert_eq!(app.transcript[0].role, Role::User);
        match &app.transcript[0].body {
            EntryBody::Text(text) => assert_eq!(text, "What is the total revenue?"),
            other => panic!("expected text entry, got {:?}", other),
        }
        assert!(app.input.is_empty());
        assert_eq!(app.cursor, 0);
        assert!(app.is_loading());
    }

    #[tokio::test]
    async fn test_submit_while_pending_is_noop() {
        let mut app = test_app();
        app.input = "first".to_string();
        app.submit_question();
        app.input = "second".to_string();
        app.submit_question();

        assert_eq!(app.transcript.len(), 1);
        assert_eq!(app.input, "second");
    }

    #[tokio::test]
    async fn test_stale_reply_is_ignored() {
        let mut app = test_app();
        app.input = "question".to_string();
        app.submit_question();

        app.handle_reply(99, Ok(envelope("{}")));
        assert!(app.is_loading());
        assert_eq!(app.transcript.len(), 1);

        app.handle_reply(0, Ok(envelope("{}")));
        assert!(!app.is_loading());
        assert_eq!(app.transcript.len(), 2);
    }

    #[tokio::test]
    async fn test_text_answer_scenario() {
        let mut app = test_app();
        app.input = "What is the total revenue?".to_string();
        app.submit_question();
        app.handle_reply(
            0,
            Ok(envelope(r#"{"answer":{"type":"text","message":"$42,000"}}"#)),
        );

        assert!(!app.is_loading());
        assert_eq!(app.transcript.len(), 2);
        assert_eq!(assistant_text(&app, 1), "$42,000");
        assert_eq!(app.transcript[1].role, Role::Assistant);
    }

    #[tokio::test]
    async fn test_table_answer_scenario() {
        let mut app = test_app();
        app.input = "list users".to_string();
        app.submit_question();
        app.handle_reply(
            0,
            Ok(envelope(
                r#"{"answer":{"type":"table","columns":["id","name"],"rows":[["1","Alice"],["2","Bob"]]}}"#,
            )),
        );

        match &app.transcript[1].body {
            EntryBody::Table(table) => {
                assert_eq!(table.columns, vec!["id", "name"]);
                assert_eq!(table.rows.len(), 2);
                assert_eq!(table.rows[0][1], serde_json::json!("Alice"));
            }
            other => panic!("expected table entry, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_error_envelope_scenario() {
        let mut app = test_app();
        app.input = "bad question".to_string();
        app.submit_question();
        app.handle_reply(0, Ok(envelope(r#"{"error":"Invalid query"}"#)));

        assert_eq!(assistant_text(&app, 1), "Invalid query");
    }

    #[tokio::test]
    async fn test_error_short_circuits_answer() {
        let mut app = test_app();
        app.input = "q".to_string();
        app.submit_question();
        app.handle_reply(
            0,
            Ok(envelope(
                r#"{"error":"Invalid query","answer":{"type":"text","message":"ignored"}}"#,
            )),
        );

        assert_eq!(assistant_text(&app, 1), "Invalid query");
    }

    #[tokio::test]
    async fn test_transport_failure_scenario() {
        let mut app = test_app();
        app.input = "q".to_string();
        app.submit_question();
        app.handle_reply(0, Err(anyhow::anyhow!("connection refused")));

        assert!(!app.is_loading());
        assert_eq!(assistant_text(&app, 1), CONNECTION_ERROR_MSG);
    }

    #[tokio::test]
    async fn test_empty_envelope_scenario() {
        let mut app = test_app();
        app.input = "q".to_string();
        app.submit_question();
        app.handle_reply(0, Ok(envelope("{}")));

        assert_eq!(assistant_text(&app, 1), NO_RESULT_MSG);
    }

    #[tokio::test]
    async fn test_unknown_answer_type_scenario() {
        let mut app = test_app();
        app.input = "q".to_string();
        app.submit_question();
        app.handle_reply(0, Ok(envelope(r#"{"answer":{"type":"chart","series":[]}}"#)));

        assert_eq!(assistant_text(&app, 1), UNKNOWN_FORMAT_MSG);
    }

    #[tokio::test]
    async fn test_plain_string_answer_rendered_as_text() {
        let mut app = test_app();
        app.input = "q".to_string();
        app.submit_question();
        app.handle_reply(
            0,
            Ok(envelope(r#"{"answer":"cached result","source":"cache"}"#)),
        );

        assert_eq!(assistant_text(&app, 1), "cached result");
        let meta = app.transcript[1].meta.as_ref().unwrap();
        assert_eq!(meta.source.as_deref(), Some("cache"));
    }

    #[tokio::test]
    async fn test_entries_never_mutated_on_new_replies() {
        let mut app = test_app();
        let payload = r#"{"answer":{"type":"text","message":"same"}}"#;

        app.input = "q1".to_string();
        app.submit_question();
        app.handle_reply(0, Ok(envelope(payload)));
        let first = assistant_text(&app, 1).to_string();

        app.input = "q2".to_string();
        app.submit_question();
        app.handle_reply(1, Ok(envelope(payload)));

        // Same envelope twice appends two independent entries.
        assert_eq!(app.transcript.len(), 4);
        assert_eq!(assistant_text(&app, 1), first);
        assert_eq!(assistant_text(&app, 3), "same");
    }

    #[tokio::test]
    async fn test_loading_indicator_lifecycle() {
        let mut app = test_app();
        app.input = "q".to_string();

        assert!(!app.is_loading());
        app.submit_question();
        assert!(app.is_loading());

        app.tick_animation();
        assert_eq!(app.animation_frame, 1);

        app.handle_reply(0, Ok(envelope("{}")));
        assert!(!app.is_loading());
    }
}
