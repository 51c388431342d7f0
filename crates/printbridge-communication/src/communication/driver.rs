//! Serial transport driver
//!
//! Owns the link and the command queue. Each loop pass calls
//! [`TransportDriver::send_commands`] and then
//! [`TransportDriver::receive_responses`]:
//! - send writes at most one command, when nothing is in flight or the
//!   estimated printer receive buffer is under 75% full
//! - receive splits incoming bytes into lines, retires one command per `ok`,
//!   classifies everything else and watches for lost commands

use super::queue::CommandQueue;
use super::serial::SerialLink;
use crate::firmware::marlin::commands::{
    autoreport_enables, is_autoreport_command, TEMPERATURE_QUERY,
};
use crate::firmware::marlin::response_parser::{classify, is_acknowledgment, parse_temperatures};
use printbridge_core::{
    BridgeEvent, ConnectionError, EventDispatcher, QueueError, ResponseKind, SessionState,
};

/// Default keepalive before an unanswered command is considered lost
pub const DEFAULT_KEEPALIVE_MS: u64 = 2500;

/// Accumulated response text is dropped beyond this many bytes
const MAX_RESPONSE_LEN: usize = 4096;

/// Transport tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportConfig {
    /// Printer receive buffer estimate in bytes; 0 means stop-and-wait
    pub rx_buffer_size: usize,
    /// Time without a completed line before the in-flight command counts as lost
    pub keepalive_ms: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            rx_buffer_size: 0,
            keepalive_ms: DEFAULT_KEEPALIVE_MS,
        }
    }
}

/// One complete line received from the printer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseLine {
    /// Line text without its newline
    pub text: String,
    pub kind: ResponseKind,
}

/// Line-oriented, ack-paced transport over a [`SerialLink`]
pub struct TransportDriver {
    link: Box<dyn SerialLink>,
    queue: CommandQueue,
    config: TransportConfig,
    events: EventDispatcher,
    /// Bytes sent but not yet acknowledged, as estimated from command lengths
    used_buffer: usize,
    /// Current response, possibly spanning several incomplete lines
    response: String,
    /// Offset in `response` where the line being received starts
    line_start: usize,
    /// Loop clock of the last line event or idle send
    timer_ms: u64,
    read_buf: Vec<u8>,
}

impl TransportDriver {
    /// Create a driver around a link that is not open yet
    pub fn new(
        link: Box<dyn SerialLink>,
        queue: CommandQueue,
        config: TransportConfig,
        events: EventDispatcher,
    ) -> Self {
        Self {
            link,
            queue,
            config,
            events,
            used_buffer: 0,
            response: String::new(),
            line_start: 0,
            timer_ms: 0,
            read_buf: Vec::with_capacity(256),
        }
    }

    pub fn queue(&self) -> &CommandQueue {
        &self.queue
    }

    pub fn events(&self) -> &EventDispatcher {
        &self.events
    }

    /// Estimated bytes outstanding in the printer receive buffer
    pub fn used_buffer(&self) -> usize {
        self.used_buffer
    }

    /// Queue a command for transmission
    pub fn push(&mut self, command: impl Into<String>) -> Result<(), QueueError> {
        let command = command.into();
        self.queue.push(command.as_str()).inspect_err(|e| {
            tracing::debug!("Command '{}' not queued: {}", command, e);
        })
    }

    /// Discard every queued and in-flight command and the buffer estimate
    pub fn clear_queue(&mut self) {
        self.queue.clear();
        self.used_buffer = 0;
    }

    /// Reopen the link at another baud rate
    pub fn reopen(&mut self, baud_rate: u32) -> Result<(), ConnectionError> {
        self.link.open(baud_rate)
    }

    pub fn baud_rate(&self) -> Option<u32> {
        self.link.baud_rate()
    }

    pub fn port_name(&self) -> &str {
        self.link.name()
    }

    fn may_send(&self, no_response_pending: bool) -> bool {
        no_response_pending || self.used_buffer < self.config.rx_buffer_size * 3 / 4
    }

    /// Transmit the next queued command if flow control allows it
    ///
    /// Returns whether a command left the queue. A command whose write fails
    /// still leaves the send cursor: the keepalive timeout then recovers
    /// exactly as for a command the printer dropped.
    pub fn send_commands(
        &mut self,
        session: &mut SessionState,
        now_ms: u64,
    ) -> Result<bool, ConnectionError> {
        let Some(command) = self.queue.peek_send().map(str::to_string) else {
            return Ok(false);
        };

        let no_response_pending = self.queue.is_ack_empty();
        if !self.may_send(no_response_pending) {
            return Ok(false);
        }

        // The keepalive only restarts when the printer was idle
        if no_response_pending {
            self.timer_ms = now_ms;
        }

        let written = self.link.write_line(&command);
        self.used_buffer += command.len();
        self.queue.pop_send();
        session.last_command_sent = command.clone();

        match written {
            Ok(()) => {
                tracing::debug!("> {}", command);
                self.events.publish(BridgeEvent::Transmitted(command));
                Ok(true)
            }
            Err(e) => {
                tracing::warn!("Failed to write '{}' to {}: {}", command, self.link.name(), e);
                Err(e)
            }
        }
    }

    /// Read pending bytes and process every completed line
    ///
    /// The keepalive check runs even when the read fails.
    pub fn receive_responses(
        &mut self,
        session: &mut SessionState,
        now_ms: u64,
    ) -> Result<Vec<ResponseLine>, ConnectionError> {
        self.read_buf.clear();
        let read = self.link.read_available(&mut self.read_buf);

        let mut lines = Vec::new();
        let bytes = std::mem::take(&mut self.read_buf);
        for &byte in &bytes {
            if byte == b'\r' {
                continue;
            }
            self.response.push(char::from(byte));
            if byte == b'\n' {
                lines.push(self.complete_line(session, now_ms));
            }
        }
        self.read_buf = bytes;

        self.check_timeout(session, now_ms);
        read.map(|_| lines)
    }

    fn complete_line(&mut self, session: &mut SessionState, now_ms: u64) -> ResponseLine {
        let kind = if is_acknowledgment(&self.response) {
            self.acknowledge(session);
            ResponseKind::Ok
        } else if session.printer_connected {
            let kind = classify(
                &self.response,
                session.firmware.extruders,
                &mut session.temperatures,
            );
            if kind == ResponseKind::Error {
                tracing::warn!("Printer error, cancelling: {}", self.current_line());
                session.job.cancel_requested = true;
            }
            kind
        } else {
            ResponseKind::Discovering
        };

        let text = self.current_line().to_string();
        tracing::trace!("< {} [{}]", text, kind);

        if matches!(kind, ResponseKind::Incomplete | ResponseKind::Discovering) {
            if self.response.len() > MAX_RESPONSE_LEN {
                tracing::debug!("Dropping {} bytes of unterminated response", self.response.len());
                self.reset_line_state();
            } else {
                self.line_start = self.response.len();
            }
        } else {
            session.last_received_response = std::mem::take(&mut self.response);
            self.line_start = 0;
        }
        self.timer_ms = now_ms;

        self.events.publish(BridgeEvent::Received {
            line: text.clone(),
            kind,
        });
        ResponseLine { text, kind }
    }

    /// The line just completed, without its newline
    fn current_line(&self) -> &str {
        let end = self.response.len().saturating_sub(1);
        self.response.get(self.line_start..end).unwrap_or_default()
    }

    fn acknowledge(&mut self, session: &mut SessionState) {
        let last = &session.last_command_sent;
        if last.starts_with(TEMPERATURE_QUERY) {
            parse_temperatures(
                &self.response,
                session.firmware.extruders,
                &mut session.temperatures,
            );
        } else if session.firmware.autoreport_temp && is_autoreport_command(last) {
            session.autoreport_enabled = autoreport_enables(last);
            tracing::info!("Temperature auto-report enabled: {}", session.autoreport_enabled);
        }

        let length = self.queue.pop_acknowledge().map_or(0, |c| c.len());
        self.used_buffer = self.used_buffer.saturating_sub(length);
    }

    /// Handle an in-flight command the printer never answered
    ///
    /// Once connected this is only reported; during detection the whole
    /// queue is abandoned so the next probe starts clean.
    fn check_timeout(&mut self, session: &SessionState, now_ms: u64) -> bool {
        if self.queue.is_ack_empty()
            || now_ms.saturating_sub(self.timer_ms) <= self.config.keepalive_ms
        {
            return false;
        }

        if session.printer_connected {
            tracing::warn!(
                "No response to '{}' within {} ms",
                session.last_command_sent,
                self.config.keepalive_ms
            );
            self.events.publish(BridgeEvent::Timeout);
        } else {
            tracing::debug!("No response while discovering, clearing queue");
            self.clear_queue();
        }

        self.reset_line_state();
        self.timer_ms = now_ms;
        true
    }

    fn reset_line_state(&mut self) {
        self.response.clear();
        self.line_start = 0;
    }
}
