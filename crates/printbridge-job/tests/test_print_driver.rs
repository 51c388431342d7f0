//! Print driver tests against a scripted printer and a real store directory

use printbridge_communication::firmware::marlin::commands::DEFAULT_SHUTDOWN_SEQUENCE;
use printbridge_communication::{
    CommandQueue, ScriptedPrinter, SerialLink, TransportConfig, TransportDriver,
};
use printbridge_core::{EventDispatcher, FirmwareInfo, JobError, JobFile, PrintPhase, SessionState};
use printbridge_job::{GcodeStore, JobCommand, PauseAction, PrintDriver, StoreOptions};
use tempfile::TempDir;

struct Harness {
    _dir: TempDir,
    printer: ScriptedPrinter,
    transport: TransportDriver,
    driver: PrintDriver,
    store: GcodeStore,
    session: SessionState,
    now_ms: u64,
}

impl Harness {
    /// `printer` acknowledges or not; `part.gcode` holds `contents` and is selected
    fn new(printer: ScriptedPrinter, contents: &str, firmware: FirmwareInfo) -> Self {
        let dir = TempDir::new().unwrap();
        let store = GcodeStore::open(dir.path(), StoreOptions::default()).unwrap();
        std::fs::write(dir.path().join("part.gcode"), contents).unwrap();

        let mut link = printer.clone();
        link.open(115200).unwrap();
        let transport = TransportDriver::new(
            Box::new(link),
            CommandQueue::new(10),
            TransportConfig::default(),
            EventDispatcher::default(),
        );

        let mut session = SessionState::new();
        session.printer_connected = true;
        session.firmware = firmware;
        session.job.file = Some(store.select("part.gcode").unwrap());

        Self {
            _dir: dir,
            printer,
            transport,
            driver: PrintDriver::default(),
            store,
            session,
            now_ms: 0,
        }
    }

    fn acking(contents: &str) -> Self {
        Self::new(ScriptedPrinter::marlin(115200, ""), contents, FirmwareInfo::default())
    }

    fn tick(&mut self) -> Result<(), JobError> {
        self.now_ms += 10;
        let result = self.driver.tick(
            &mut self.session,
            &mut self.transport,
            &self.store,
            self.now_ms,
        );
        let _ = self.transport.send_commands(&mut self.session, self.now_ms);
        let _ = self
            .transport
            .receive_responses(&mut self.session, self.now_ms);
        result
    }

    fn apply(&mut self, command: JobCommand) {
        command.apply(&mut self.session).unwrap();
    }

    fn run_to_completion(&mut self) {
        for _ in 0..10_000 {
            let job = &self.session.job;
            let pending = job.start_requested || job.restart_requested;
            if !job.is_printing() && !pending && self.transport.queue().is_empty() {
                return;
            }
            self.tick().unwrap();
        }
        panic!("print did not finish");
    }

    /// Written lines that came from the file
    fn streamed(&self) -> Vec<String> {
        self.printer
            .written()
            .into_iter()
            .filter(|line| line.starts_with('G'))
            .collect()
    }
}

fn numbered_lines(count: usize) -> String {
    // Ten bytes per line including the newline
    (0..count).map(|i| format!("G1 X{:05}\n", i)).collect()
}

#[test]
fn test_completion_follows_bytes_consumed() {
    let mut harness = Harness::acking(&numbered_lines(100));
    harness.apply(JobCommand::Start);

    while harness.session.job.lines_read < 25 {
        assert!(harness.now_ms < 10_000, "print stalled");
        harness.tick().unwrap();
    }
    assert_eq!(harness.session.job.file_pos, 250);
    assert_eq!(harness.session.job.completion, 25.0);

    harness.run_to_completion();
    assert_eq!(harness.session.job.phase, PrintPhase::Idle);
    assert_eq!(harness.session.job.file_pos, 1000);
    assert_eq!(harness.session.job.completion, 100.0);
    assert_eq!(harness.streamed().len(), 100);
    assert_eq!(harness.streamed()[99], "G1 X00099");
    assert_eq!(
        harness.printer.written().last().map(String::as_str),
        Some("M117 Complete")
    );
}

#[test]
fn test_comments_and_blank_lines_are_skipped() {
    let mut harness = Harness::acking("; sliced\n(header)\nG28 ; home\n\n\rM84\nG1 X10\n");
    harness.apply(JobCommand::Start);
    harness.run_to_completion();

    assert_eq!(harness.streamed(), vec!["G28", "G1 X10"]);
    assert_eq!(harness.session.job.lines_read, 6);
    let size = harness.session.job.file.as_ref().unwrap().size;
    assert_eq!(harness.session.job.file_pos, size);
}

#[test]
fn test_progress_reports_when_supported() {
    // Four lines of 250 bytes each; the padding is a comment
    let contents: String = (1..=4)
        .map(|i| format!("G1 X{} ;{}\n", i, "x".repeat(242)))
        .collect();
    assert_eq!(contents.len(), 1000);

    let firmware = FirmwareInfo {
        progress: true,
        build_percent: true,
        ..Default::default()
    };
    let mut harness = Harness::new(ScriptedPrinter::marlin(115200, ""), &contents, firmware);
    harness.apply(JobCommand::Start);
    harness.run_to_completion();

    assert_eq!(
        harness.printer.written(),
        vec![
            "M117 Printing...",
            "M300 S500 P50",
            "M530 S1 L0",
            "M531 part.gcode",
            "G1 X1",
            "M73 P25",
            "M532 X25.00",
            "G1 X2",
            "M73 P50",
            "M532 X50.00",
            "G1 X3",
            "M73 P75",
            "M532 X75.00",
            "G1 X4",
            "M73 P100",
            "M532 X100.00",
            "M530 S0",
            "M117 Complete",
        ]
    );
}

#[test]
fn test_headroom_is_kept_free() {
    // Never acknowledges, so the queue only fills
    let mut harness = Harness::new(
        ScriptedPrinter::new(),
        &numbered_lines(50),
        FirmwareInfo::default(),
    );
    harness.apply(JobCommand::Start);

    for _ in 0..20 {
        harness.tick().unwrap();
    }
    assert_eq!(harness.transport.queue().free_slots(), 4);
    assert!(harness.session.job.is_printing());
}

#[test]
fn test_cancel_replaces_queue_with_shutdown_sequence() {
    let mut harness = Harness::new(
        ScriptedPrinter::new(),
        &numbered_lines(50),
        FirmwareInfo::default(),
    );
    harness.apply(JobCommand::Start);
    for _ in 0..10 {
        harness.tick().unwrap();
    }
    assert!(harness.transport.queue().iter().any(|c| c.starts_with("G1")));

    harness.apply(JobCommand::Cancel);
    harness.tick().unwrap();

    assert_eq!(harness.session.job.phase, PrintPhase::Idle);
    assert!(!harness.session.job.cancel_requested);
    assert!(!harness.driver.is_streaming());
    let queued: Vec<&str> = harness.transport.queue().iter().collect();
    assert_eq!(queued, DEFAULT_SHUTDOWN_SEQUENCE.to_vec());
    assert!(!harness.printer.written().iter().any(|c| c == "M117 Complete"));
}

#[test]
fn test_cancel_queues_what_fits_of_an_oversized_sequence() {
    let mut harness = Harness::new(
        ScriptedPrinter::new(),
        &numbered_lines(50),
        FirmwareInfo::default(),
    );
    let sequence: Vec<String> = (0..11).map(|i| format!("M117 off {}", i)).collect();
    harness.driver = PrintDriver::new(4, sequence.clone());

    harness.apply(JobCommand::Start);
    for _ in 0..10 {
        harness.tick().unwrap();
    }
    harness.apply(JobCommand::Cancel);
    harness.tick().unwrap();

    // Ten slots, one always free
    let queued: Vec<&str> = harness.transport.queue().iter().collect();
    assert_eq!(queued, sequence[..9].iter().map(String::as_str).collect::<Vec<_>>());
    assert_eq!(harness.session.job.phase, PrintPhase::Idle);
}

#[test]
fn test_pause_stops_streaming_until_resumed() {
    let mut harness = Harness::acking(&numbered_lines(40));
    harness.apply(JobCommand::Start);
    for _ in 0..5 {
        harness.tick().unwrap();
    }

    harness.apply(JobCommand::Pause {
        action: PauseAction::Pause,
    });
    let lines_read = harness.session.job.lines_read;
    for _ in 0..20 {
        harness.tick().unwrap();
    }
    assert_eq!(harness.session.job.lines_read, lines_read);
    assert!(harness.session.job.is_paused());

    harness.apply(JobCommand::Pause {
        action: PauseAction::Resume,
    });
    harness.run_to_completion();
    assert_eq!(harness.streamed().len(), 40);
}

#[test]
fn test_restart_starts_over_from_pause() {
    let mut harness = Harness::acking(&numbered_lines(40));
    harness.apply(JobCommand::Start);
    for _ in 0..10 {
        harness.tick().unwrap();
    }
    harness.apply(JobCommand::Pause {
        action: PauseAction::Pause,
    });
    harness.apply(JobCommand::Restart);

    harness.tick().unwrap();
    assert_eq!(harness.session.job.phase, PrintPhase::Printing);
    assert_eq!(harness.session.job.file_pos, 0);
    assert_eq!(harness.session.job.lines_read, 0);
    assert!(!harness.session.job.restart_requested);

    harness.run_to_completion();
    let printing = harness
        .printer
        .written()
        .iter()
        .filter(|line| *line == "M117 Printing...")
        .count();
    assert_eq!(printing, 2);
    assert_eq!(
        harness.streamed().iter().filter(|line| *line == "G1 X00000").count(),
        2
    );
}

#[test]
fn test_missing_file_leaves_job_idle() {
    let mut harness = Harness::acking("G28\n");
    harness.session.job.file = Some(JobFile::new("gone.gcode", 10, 0));
    harness.apply(JobCommand::Start);

    let err = harness.tick().unwrap_err();
    assert!(matches!(err, JobError::FileOpen { ref path, .. } if path == "gone.gcode"));
    assert_eq!(harness.session.job.phase, PrintPhase::Idle);
    assert!(!harness.session.job.start_requested);

    harness.tick().unwrap();
    assert_eq!(harness.printer.written(), vec!["M117 Can't open file"]);
}
