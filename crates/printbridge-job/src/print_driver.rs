//! Print driver
//!
//! Streams the selected file into the command queue one line per loop pass,
//! leaving a few free slots for user and status commands. Start, restart,
//! pause and cancel are requested through flags on
//! [`printbridge_core::PrintJobState`] and take effect on the next
//! [`PrintDriver::tick`].

use crate::storage::GcodeStore;
use printbridge_communication::firmware::marlin::commands::{
    build_percent, lcd, progress_percent, progress_start, BEEP, DEFAULT_SHUTDOWN_SEQUENCE,
    PROGRESS_END,
};
use printbridge_communication::TransportDriver;
use printbridge_core::{JobError, PrintPhase, SessionState};
use std::fs::File;
use std::io::{BufRead, BufReader};

/// Free queue slots kept out of reach of the file stream
pub const DEFAULT_PRINT_HEADROOM: usize = 4;

/// G-code with its comment removed, or `None` when nothing is left to send
///
/// Lines starting with `;`, `(` or a carriage return are skipped whole.
pub fn strip_comment(line: &str) -> Option<&str> {
    if line.is_empty() || line.starts_with([';', '(', '\r']) {
        return None;
    }

    let code = match line.find(';') {
        Some(pos) => &line[..pos],
        None => line,
    }
    .trim_end();

    (!code.is_empty()).then_some(code)
}

/// Streams one file at a time into the transport's command queue
pub struct PrintDriver {
    reader: Option<BufReader<File>>,
    headroom: usize,
    shutdown_sequence: Vec<String>,
    /// Completion at the last `M73` report
    reported_build_percent: f32,
    /// Completion at the last `M532` report
    reported_progress: f32,
}

impl Default for PrintDriver {
    fn default() -> Self {
        Self::new(
            DEFAULT_PRINT_HEADROOM,
            DEFAULT_SHUTDOWN_SEQUENCE.iter().map(|c| c.to_string()).collect(),
        )
    }
}

impl PrintDriver {
    pub fn new(headroom: usize, shutdown_sequence: Vec<String>) -> Self {
        Self {
            reader: None,
            headroom,
            shutdown_sequence,
            reported_build_percent: 0.0,
            reported_progress: 0.0,
        }
    }

    /// Whether a file is open for streaming
    pub fn is_streaming(&self) -> bool {
        self.reader.is_some()
    }

    /// Advance the print job by one loop pass
    ///
    /// Returns an error only when a requested start could not open its file;
    /// the job then stays idle.
    pub fn tick(
        &mut self,
        session: &mut SessionState,
        transport: &mut TransportDriver,
        store: &GcodeStore,
        now_ms: u64,
    ) -> Result<(), JobError> {
        if session.job.is_printing() {
            self.service(session, transport, now_ms);
        }

        let mut result = Ok(());
        let job = &session.job;
        if !job.is_printing() && (job.start_requested || job.restart_requested) {
            result = self.start(session, transport, store, now_ms);
        }

        if session.job.cancel_requested && !session.job.is_printing() {
            self.shutdown(session, transport);
        }

        result
    }

    fn service(&mut self, session: &mut SessionState, transport: &mut TransportDriver, now_ms: u64) {
        let job = &mut session.job;
        job.print_time_secs = now_ms.saturating_sub(job.started_at_ms) / 1000;

        let aborted = job.cancel_requested || job.restart_requested;
        if aborted || !self.has_more() {
            self.finish(session, transport, aborted);
            return;
        }

        if !job.is_paused() && transport.queue().free_slots() > self.headroom {
            self.feed_line(session, transport);
        }
    }

    fn has_more(&mut self) -> bool {
        match self.reader.as_mut().map(|reader| reader.fill_buf()) {
            Some(Ok(buf)) => !buf.is_empty(),
            Some(Err(e)) => {
                tracing::warn!("Print file read failed: {}", e);
                false
            }
            None => false,
        }
    }

    fn feed_line(&mut self, session: &mut SessionState, transport: &mut TransportDriver) {
        let Some(reader) = self.reader.as_mut() else {
            return;
        };

        let mut raw = Vec::new();
        if let Err(e) = reader.read_until(b'\n', &mut raw) {
            tracing::warn!("Print file read failed: {}", e);
            self.reader = None;
            return;
        }
        if raw.last() == Some(&b'\n') {
            raw.pop();
        }

        let job = &mut session.job;
        job.lines_read += 1;
        let size = job.file.as_ref().map_or(0, |file| file.size);
        job.file_pos = (job.file_pos + raw.len() as u64 + 1).min(size);
        job.completion = if size > 0 {
            job.file_pos as f32 / size as f32 * 100.0
        } else {
            100.0
        };

        let line = String::from_utf8_lossy(&raw);
        if let Some(command) = strip_comment(&line) {
            // Headroom guarantees a free slot
            let _ = transport.push(command);
        }

        self.report_progress(session, transport);
    }

    fn report_progress(&mut self, session: &SessionState, transport: &mut TransportDriver) {
        let completion = session.job.completion;

        if session.firmware.build_percent && completion - self.reported_build_percent >= 1.0 {
            let _ = transport.push(build_percent(completion));
            self.reported_build_percent = completion;
        }

        if session.firmware.progress && completion - self.reported_progress >= 0.1 {
            let _ = transport.push(progress_percent(completion));
            self.reported_progress = completion;
        }
    }

    fn finish(&mut self, session: &mut SessionState, transport: &mut TransportDriver, aborted: bool) {
        self.reader = None;

        if session.firmware.progress {
            let _ = transport.push(PROGRESS_END);
        }

        let name = session.job.file_name().to_string();
        if aborted {
            tracing::info!("Print of {} aborted after {} lines", name, session.job.lines_read);
        } else {
            let _ = transport.push(lcd("Complete"));
            tracing::info!(
                "Print of {} complete in {}s",
                name,
                session.job.print_time_secs
            );
            transport.events().notice(format!("Print of {} complete", name));
        }

        session.job.phase = PrintPhase::Idle;
    }

    fn start(
        &mut self,
        session: &mut SessionState,
        transport: &mut TransportDriver,
        store: &GcodeStore,
        now_ms: u64,
    ) -> Result<(), JobError> {
        let job = &mut session.job;
        job.start_requested = false;
        job.restart_requested = false;
        job.file_pos = 0;
        job.lines_read = 0;
        job.completion = 0.0;
        job.print_time_secs = 0;
        self.reported_build_percent = 0.0;
        self.reported_progress = 0.0;

        let Some(name) = job.file.as_ref().map(|file| file.name.clone()) else {
            let _ = transport.push(lcd("Can't open file"));
            tracing::warn!("Print requested without a selected file");
            return Err(JobError::NoFileSelected);
        };

        let opened = store
            .file_info(&name)
            .and_then(|info| store.open_file(&name).map(|reader| (info, reader)));
        let (info, reader) = match opened {
            Ok(opened) => opened,
            Err(e) => {
                let _ = transport.push(lcd("Can't open file"));
                tracing::warn!("Can't open {}: {}", name, e);
                transport.events().notice(format!("Can't open {}", name));
                return Err(JobError::FileOpen {
                    path: name,
                    reason: e.to_string(),
                });
            }
        };

        job.file = Some(info);
        self.reader = Some(reader);

        let _ = transport.push(lcd("Printing..."));
        let _ = transport.push(BEEP);
        job.started_at_ms = now_ms;
        job.phase = PrintPhase::Printing;

        if session.firmware.progress {
            for command in progress_start(&name) {
                let _ = transport.push(command);
            }
        }

        tracing::info!("Printing {}", name);
        transport.events().notice(format!("Printing {}", name));
        Ok(())
    }

    /// Replace everything queued with the shutdown sequence
    fn shutdown(&mut self, session: &mut SessionState, transport: &mut TransportDriver) {
        session.job.cancel_requested = false;
        transport.clear_queue();

        for command in &self.shutdown_sequence {
            if let Err(e) = transport.push(command.as_str()) {
                tracing::warn!("Shutdown command '{}' not queued: {}", command, e);
            }
        }

        tracing::info!("Print cancelled, {} shutdown commands queued", self.shutdown_sequence.len());
        transport.events().notice("Print cancelled");
    }
}
