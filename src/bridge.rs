//! The cooperative core loop
//!
//! [`Bridge`] owns the transport, the detector, the print driver, the file
//! store and the session. One [`Bridge::tick`] runs, in order: firmware
//! detection (until a printer answers), the print driver, the temperature
//! poll, then the transport's send and receive phases. Front-end requests
//! are applied between ticks by [`Bridge::run`], so nothing else ever writes
//! the session.

use crate::handle::Request;
use printbridge_communication::firmware::marlin::commands::{
    lcd, ABSOLUTE_POSITIONING, TEMPERATURE_QUERY,
};
use printbridge_communication::{
    CommandQueue, FirmwareDetector, JogDirection, SerialLink, TransportDriver,
};
use printbridge_core::{
    BridgeEvent, ConnectionState, Error, EventDispatcher, JobError, JobFile, QueueError, Result,
    SessionState, StatusSnapshot, StorageError,
};
use printbridge_job::{FileListing, GcodeStore, JobCommand, PrintDriver, StoreOptions, Upload};
use printbridge_settings::Config;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, MissedTickBehavior};

/// One printer session
pub struct Bridge {
    transport: TransportDriver,
    detector: FirmwareDetector,
    printer: PrintDriver,
    store: GcodeStore,
    session: SessionState,
    temperature_interval_ms: u64,
    last_state: ConnectionState,
}

impl Bridge {
    /// Assemble a bridge over `link`; the file selection is restored from the store
    pub fn new(link: Box<dyn SerialLink>, config: &Config, events: EventDispatcher) -> Result<Self> {
        let transport = TransportDriver::new(
            link,
            CommandQueue::new(config.printer.queue_capacity),
            config.transport(),
            events,
        );

        let store = GcodeStore::open(
            &config.storage.root,
            StoreOptions {
                marker_file: config.storage.marker_file.clone(),
                max_files_per_list: config.storage.max_files_per_list,
                max_path_length: config.storage.max_path_length,
            },
        )?;

        let mut session = SessionState::new();
        session.job.file = store.restore_selection().unwrap_or_else(|e| {
            tracing::warn!("Could not restore the selected file: {}", e);
            None
        });

        Ok(Self {
            transport,
            detector: FirmwareDetector::new(
                config.serial.bauds.clone(),
                config.serial.identify_retries,
            ),
            printer: PrintDriver::new(
                config.printer.print_headroom,
                config.printer.shutdown_sequence.clone(),
            ),
            store,
            session,
            temperature_interval_ms: config.printer.temperature_interval_secs * 1000,
            last_state: ConnectionState::Discovering,
        })
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    pub fn events(&self) -> &EventDispatcher {
        self.transport.events()
    }

    pub fn queue(&self) -> &CommandQueue {
        self.transport.queue()
    }

    pub fn snapshot(&self, now_ms: u64) -> StatusSnapshot {
        StatusSnapshot::capture(&self.session, now_ms)
    }

    /// One pass of the core loop
    pub fn tick(&mut self, now_ms: u64) {
        if !self.detector.is_connected() {
            self.detector
                .step(&mut self.transport, &mut self.session, now_ms);
        } else {
            if let Err(e) =
                self.printer
                    .tick(&mut self.session, &mut self.transport, &self.store, now_ms)
            {
                tracing::debug!("Print not started: {}", e);
            }
            self.poll_temperature(now_ms);
        }

        if let Err(e) = self.transport.send_commands(&mut self.session, now_ms) {
            tracing::debug!("Send phase failed: {}", e);
        }
        if let Err(e) = self.transport.receive_responses(&mut self.session, now_ms) {
            tracing::debug!("Receive phase failed: {}", e);
        }

        let state = self.session.connection_state();
        if state != self.last_state {
            tracing::info!("Printer state: {}", state);
            self.last_state = state;
            self.events().publish(BridgeEvent::StateChanged(state));
        }
    }

    fn poll_temperature(&mut self, now_ms: u64) {
        if self.session.autoreport_enabled || now_ms < self.session.temperature_deadline_ms {
            return;
        }
        let _ = self.transport.push(TEMPERATURE_QUERY);
        self.session.temperature_deadline_ms = now_ms + self.temperature_interval_ms;
    }

    /// Display text on the printer once one is connected
    fn lcd(&mut self, text: &str) {
        if self.session.printer_connected {
            let _ = self.transport.push(lcd(text));
        }
    }

    fn refuse_while_printing(&self, action: &str) -> Result<()> {
        if self.session.job.is_printing() {
            return Err(JobError::conflict(action, "printing").into());
        }
        Ok(())
    }

    /// Queue commands in order, stopping at the first one that does not fit
    pub fn push_commands(&mut self, commands: &[String]) -> std::result::Result<(), QueueError> {
        commands
            .iter()
            .try_for_each(|command| self.transport.push(command.trim()))
    }

    pub fn job_command(&mut self, command: JobCommand) -> std::result::Result<(), JobError> {
        command.apply(&mut self.session)
    }

    /// Move or home an axis; positioning is left absolute afterwards
    pub fn jog(&mut self, direction: JogDirection, distance: u32) -> Result<()> {
        self.refuse_while_printing("jog")?;
        let moved = direction
            .commands(distance)
            .into_iter()
            .try_for_each(|command| self.transport.push(command));
        let restored = self.transport.push(ABSOLUTE_POSITIONING);
        moved.and(restored).map_err(Error::from)
    }

    pub fn list_files(
        &self,
        index: usize,
        id: Option<&str>,
    ) -> std::result::Result<FileListing, StorageError> {
        self.store.list(index, id)
    }

    pub fn choose_file(&mut self, id: &str) -> Result<JobFile> {
        self.refuse_while_printing("choose")?;
        let file = self.store.choose_by_id(id)?;
        self.session.job.file = Some(file.clone());
        Ok(file)
    }

    pub fn delete_file(&mut self, id: &str) -> Result<JobFile> {
        self.refuse_while_printing("delete")?;
        let file = self.store.delete_by_id(id)?;
        if self.session.job.file.as_ref().is_some_and(|f| f.name == file.name) {
            self.session.job.file = self.store.restore_selection()?;
        }
        Ok(file)
    }

    pub fn begin_upload(&mut self, name: &str) -> Result<Upload> {
        self.refuse_while_printing("upload")?;
        match self.store.begin_upload(name) {
            Ok(upload) => {
                self.lcd(&format!("Receiving: {}", upload.name()));
                Ok(upload)
            }
            Err(e) => {
                self.lcd("Error receiving file");
                Err(e.into())
            }
        }
    }

    /// Store a completed upload; tiny uploads are dropped and yield `None`
    ///
    /// A print started after the upload began refuses it and the received
    /// data is discarded, leaving the printing file untouched.
    pub fn finish_upload(&mut self, upload: Upload) -> Result<Option<JobFile>> {
        if let Err(e) = self.refuse_while_printing("upload") {
            self.store.abort_upload(upload);
            return Err(e);
        }

        match self.store.finish_upload(upload) {
            Ok(Some(file)) => {
                tracing::info!("Received {} ({} bytes)", file.name, file.size);
                self.events()
                    .notice(format!("Received {} ({} bytes)", file.name, file.size));
                self.session.job.file = Some(file.clone());
                Ok(Some(file))
            }
            Ok(None) => Ok(None),
            Err(e) => {
                self.lcd("Error receiving file");
                Err(e.into())
            }
        }
    }

    pub fn abort_upload(&mut self, upload: Upload) {
        self.store.abort_upload(upload);
        self.lcd("Error receiving file");
    }

    /// Apply one front-end request
    pub fn handle_request(&mut self, request: Request) {
        match request {
            Request::Commands { commands, reply } => {
                let _ = reply.send(self.push_commands(&commands).map_err(Error::from));
            }
            Request::Job { command, reply } => {
                let _ = reply.send(self.job_command(command).map_err(Error::from));
            }
            Request::Jog {
                direction,
                distance,
                reply,
            } => {
                let _ = reply.send(self.jog(direction, distance));
            }
            Request::ListFiles { index, id, reply } => {
                let _ = reply.send(self.list_files(index, id.as_deref()).map_err(Error::from));
            }
            Request::ChooseFile { id, reply } => {
                let _ = reply.send(self.choose_file(&id));
            }
            Request::DeleteFile { id, reply } => {
                let _ = reply.send(self.delete_file(&id));
            }
            Request::BeginUpload { name, reply } => {
                let _ = reply.send(self.begin_upload(&name));
            }
            Request::FinishUpload { upload, reply } => {
                let _ = reply.send(self.finish_upload(upload));
            }
            Request::AbortUpload { upload } => self.abort_upload(upload),
        }
    }

    /// Drive the bridge until every handle is dropped
    ///
    /// Ticks every `period` and publishes a fresh snapshot after each tick.
    pub async fn run(
        mut self,
        mut requests: mpsc::Receiver<Request>,
        status: watch::Sender<StatusSnapshot>,
        period: Duration,
    ) {
        let started = Instant::now();
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let now_ms = started.elapsed().as_millis() as u64;
                    self.tick(now_ms);
                    status.send_replace(self.snapshot(now_ms));
                }
                request = requests.recv() => match request {
                    Some(request) => self.handle_request(request),
                    None => {
                        tracing::info!("All handles dropped, stopping the bridge loop");
                        break;
                    }
                },
            }
        }
    }
}
