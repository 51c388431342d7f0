//! Front-end access to a running bridge
//!
//! Network front-ends never touch the session directly. They send
//! [`Request`]s to the loop task and read the latest [`StatusSnapshot`]
//! from a watch channel, so the core stays single-writer.

use crate::bridge::Bridge;
use printbridge_communication::JogDirection;
use printbridge_core::{BridgeEvent, Error, EventDispatcher, JobFile, Result, StatusSnapshot};
use printbridge_job::{FileListing, JobCommand, Upload};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;

/// Pause between loop passes
pub const LOOP_PERIOD: Duration = Duration::from_millis(10);

const REQUEST_BUFFER: usize = 32;

type Reply<T> = oneshot::Sender<Result<T>>;

/// A request applied by the loop between ticks
pub enum Request {
    Commands {
        commands: Vec<String>,
        reply: Reply<()>,
    },
    Job {
        command: JobCommand,
        reply: Reply<()>,
    },
    Jog {
        direction: JogDirection,
        distance: u32,
        reply: Reply<()>,
    },
    ListFiles {
        index: usize,
        id: Option<String>,
        reply: Reply<FileListing>,
    },
    ChooseFile {
        id: String,
        reply: Reply<JobFile>,
    },
    DeleteFile {
        id: String,
        reply: Reply<JobFile>,
    },
    BeginUpload {
        name: String,
        reply: Reply<Upload>,
    },
    FinishUpload {
        upload: Upload,
        reply: Reply<Option<JobFile>>,
    },
    AbortUpload {
        upload: Upload,
    },
}

/// Cloneable handle to a bridge loop task
#[derive(Clone)]
pub struct BridgeHandle {
    requests: mpsc::Sender<Request>,
    status: watch::Receiver<StatusSnapshot>,
    events: EventDispatcher,
}

/// Start the loop task for `bridge`
pub fn spawn(bridge: Bridge, period: Duration) -> (BridgeHandle, JoinHandle<()>) {
    let (requests, receiver) = mpsc::channel(REQUEST_BUFFER);
    let (status_tx, status) = watch::channel(bridge.snapshot(0));
    let events = bridge.events().clone();
    let task = tokio::spawn(bridge.run(receiver, status_tx, period));

    (
        BridgeHandle {
            requests,
            status,
            events,
        },
        task,
    )
}

fn loop_stopped() -> Error {
    Error::other("bridge loop stopped")
}

impl BridgeHandle {
    async fn request<T>(&self, build: impl FnOnce(Reply<T>) -> Request) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.requests
            .send(build(reply))
            .await
            .map_err(|_| loop_stopped())?;
        response.await.map_err(|_| loop_stopped())?
    }

    /// Queue one command; fails with a queue error on back-pressure
    pub async fn send_command(&self, command: impl Into<String>) -> Result<()> {
        self.send_commands(vec![command.into()]).await
    }

    /// Queue commands in order, stopping at the first that does not fit
    pub async fn send_commands(&self, commands: Vec<String>) -> Result<()> {
        self.request(|reply| Request::Commands { commands, reply })
            .await
    }

    pub async fn job(&self, command: JobCommand) -> Result<()> {
        self.request(|reply| Request::Job { command, reply }).await
    }

    /// Jog or home; refused while printing
    pub async fn jog(&self, direction: JogDirection, distance: u32) -> Result<()> {
        self.request(|reply| Request::Jog {
            direction,
            distance,
            reply,
        })
        .await
    }

    pub async fn list_files(&self, index: usize, id: Option<String>) -> Result<FileListing> {
        self.request(|reply| Request::ListFiles { index, id, reply })
            .await
    }

    pub async fn choose_file(&self, id: impl Into<String>) -> Result<JobFile> {
        let id = id.into();
        self.request(|reply| Request::ChooseFile { id, reply }).await
    }

    pub async fn delete_file(&self, id: impl Into<String>) -> Result<JobFile> {
        let id = id.into();
        self.request(|reply| Request::DeleteFile { id, reply }).await
    }

    /// Start an upload; chunks are written directly with [`Upload::write_chunk`]
    pub async fn begin_upload(&self, name: impl Into<String>) -> Result<Upload> {
        let name = name.into();
        self.request(|reply| Request::BeginUpload { name, reply })
            .await
    }

    pub async fn finish_upload(&self, upload: Upload) -> Result<Option<JobFile>> {
        self.request(|reply| Request::FinishUpload { upload, reply })
            .await
    }

    pub async fn abort_upload(&self, upload: Upload) -> Result<()> {
        self.requests
            .send(Request::AbortUpload { upload })
            .await
            .map_err(|_| loop_stopped())
    }

    /// Latest status published by the loop
    pub fn status(&self) -> StatusSnapshot {
        self.status.borrow().clone()
    }

    /// Receiver notified after every loop pass
    pub fn watch_status(&self) -> watch::Receiver<StatusSnapshot> {
        self.status.clone()
    }

    /// Serial traffic and notices as they happen
    pub fn subscribe(&self) -> broadcast::Receiver<BridgeEvent> {
        self.events.subscribe()
    }
}
