//! Telnet console
//!
//! Mirrors serial traffic to one connected client and queues whatever the
//! client types. A new connection replaces the previous one.

use crate::handle::BridgeHandle;
use printbridge_core::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

const CTRL_C: u8 = 0x03;

/// What a byte of client input completed
#[derive(Debug, PartialEq, Eq)]
pub enum ConsoleInput {
    Line(String),
    /// Ctrl-C typed at the start of a line
    Disconnect,
}

/// Assembles client bytes into command lines
#[derive(Debug, Default)]
pub struct LineAssembler {
    line: Vec<u8>,
}

impl LineAssembler {
    pub fn feed(&mut self, byte: u8) -> Option<ConsoleInput> {
        match byte {
            b'\r' | b'\n' if self.line.is_empty() => None,
            b'\r' | b'\n' => {
                let line = String::from_utf8_lossy(&self.line).into_owned();
                self.line.clear();
                Some(ConsoleInput::Line(line))
            }
            CTRL_C if self.line.is_empty() => Some(ConsoleInput::Disconnect),
            CTRL_C => None,
            _ => {
                self.line.push(byte);
                None
            }
        }
    }
}

/// Accept clients until the listener fails
pub async fn serve(listener: TcpListener, handle: BridgeHandle) -> std::io::Result<()> {
    tracing::info!("Telnet console listening on {}", listener.local_addr()?);
    let mut current: Option<JoinHandle<()>> = None;

    loop {
        let (stream, peer) = listener.accept().await?;
        if let Some(previous) = current.take() {
            previous.abort();
            tracing::info!("Telnet client replaced by {}", peer);
        } else {
            tracing::info!("Telnet client {} connected", peer);
        }
        current = Some(tokio::spawn(session(stream, handle.clone())));
    }
}

async fn session(stream: TcpStream, handle: BridgeHandle) {
    let peer = stream
        .peer_addr()
        .map(|addr| addr.to_string())
        .unwrap_or_else(|_| "unknown".to_string());
    if let Err(e) = console(stream, handle).await {
        tracing::debug!("Telnet client {}: {}", peer, e);
    }
    tracing::info!("Telnet client {} disconnected", peer);
}

async fn console(stream: TcpStream, handle: BridgeHandle) -> std::io::Result<()> {
    let (mut reader, mut writer) = stream.into_split();
    let mut events = handle.subscribe();
    let mut input = LineAssembler::default();
    let mut buf = [0u8; 256];

    loop {
        tokio::select! {
            read = reader.read(&mut buf) => {
                let count = read?;
                if count == 0 {
                    return Ok(());
                }
                for &byte in &buf[..count] {
                    match input.feed(byte) {
                        Some(ConsoleInput::Line(line)) => {
                            if let Err(e) = handle.send_command(line).await {
                                if e.is_queue_full() {
                                    writer.write_all(b"command queue full\r\n").await?;
                                } else if matches!(e, Error::Other(_)) {
                                    return Ok(());
                                }
                            }
                        }
                        Some(ConsoleInput::Disconnect) => return Ok(()),
                        None => {}
                    }
                }
            }
            event = events.recv() => match event {
                Ok(event) => writer.write_all(format!("{}\r\n", event).as_bytes()).await?,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("Telnet client missed {} events", skipped);
                }
                Err(RecvError::Closed) => return Ok(()),
            },
        }
    }
}
