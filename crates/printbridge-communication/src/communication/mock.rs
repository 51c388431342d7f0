//! In-memory serial link driven by a script
//!
//! Stands in for a printer wherever a real port is unavailable. Clones share
//! state, so a test can keep one handle while the driver owns another.

use super::serial::SerialLink;
use parking_lot::Mutex;
use printbridge_core::ConnectionError;
use std::collections::VecDeque;
use std::sync::Arc;

/// Produces the printer's answer to a written line at a given baud rate
pub type Responder = Box<dyn FnMut(u32, &str) -> Option<String> + Send>;

#[derive(Default)]
struct ScriptState {
    baud_rate: Option<u32>,
    opened: Vec<u32>,
    written: Vec<(u32, String)>,
    incoming: VecDeque<u8>,
    responder: Option<Responder>,
    fail_open: bool,
    fail_write: bool,
}

/// Scripted printer implementing [`SerialLink`]
#[derive(Clone, Default)]
pub struct ScriptedPrinter {
    state: Arc<Mutex<ScriptState>>,
}

impl ScriptedPrinter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every written line through `responder`
    pub fn with_responder(
        responder: impl FnMut(u32, &str) -> Option<String> + Send + 'static,
    ) -> Self {
        let printer = Self::new();
        printer.state.lock().responder = Some(Box::new(responder));
        printer
    }

    /// A printer that acknowledges everything and identifies itself at `baud`
    pub fn marlin(baud: u32, m115_answer: &str) -> Self {
        let answer = m115_answer.to_string();
        Self::with_responder(move |rate, line| {
            if rate != baud {
                return None;
            }
            if line == "M115" {
                Some(answer.clone())
            } else {
                Some("ok\n".to_string())
            }
        })
    }

    /// Queue bytes for the driver to read
    pub fn feed(&self, text: &str) {
        self.state.lock().incoming.extend(text.bytes());
    }

    /// Every line written so far
    pub fn written(&self) -> Vec<String> {
        self.state
            .lock()
            .written
            .iter()
            .map(|(_, line)| line.clone())
            .collect()
    }

    /// Every line written so far with the baud rate it was written at
    pub fn written_at(&self) -> Vec<(u32, String)> {
        self.state.lock().written.clone()
    }

    /// Baud rates the link was opened at, in order
    pub fn opened(&self) -> Vec<u32> {
        self.state.lock().opened.clone()
    }

    pub fn set_fail_open(&self, fail: bool) {
        self.state.lock().fail_open = fail;
    }

    pub fn set_fail_write(&self, fail: bool) {
        self.state.lock().fail_write = fail;
    }
}

impl SerialLink for ScriptedPrinter {
    fn open(&mut self, baud_rate: u32) -> Result<(), ConnectionError> {
        let mut state = self.state.lock();
        if state.fail_open {
            state.baud_rate = None;
            return Err(ConnectionError::FailedToOpen {
                port: "scripted".to_string(),
                reason: "open refused".to_string(),
            });
        }
        state.baud_rate = Some(baud_rate);
        state.opened.push(baud_rate);
        state.incoming.clear();
        Ok(())
    }

    fn write_line(&mut self, line: &str) -> Result<(), ConnectionError> {
        let mut state = self.state.lock();
        let Some(baud) = state.baud_rate else {
            return Err(ConnectionError::NotOpen {
                port: "scripted".to_string(),
            });
        };
        if state.fail_write {
            return Err(ConnectionError::SerialError {
                reason: "write refused".to_string(),
            });
        }

        state.written.push((baud, line.to_string()));
        let reply = state.responder.as_mut().and_then(|respond| respond(baud, line));
        if let Some(reply) = reply {
            state.incoming.extend(reply.bytes());
        }
        Ok(())
    }

    fn read_available(&mut self, buf: &mut Vec<u8>) -> Result<usize, ConnectionError> {
        let mut state = self.state.lock();
        let count = state.incoming.len();
        buf.extend(state.incoming.drain(..));
        Ok(count)
    }

    fn baud_rate(&self) -> Option<u32> {
        self.state.lock().baud_rate
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
