//! printbridge Job Crate
//!
//! Everything between a G-code file on disk and the command queue:
//! - [`storage`]: upload, listing, selection marker
//! - [`print_driver`]: streams the selected file into the queue
//! - [`job_command`]: the start/cancel/restart/pause vocabulary

pub mod job_command;
pub mod print_driver;
pub mod storage;

pub use job_command::{JobCommand, PauseAction};
pub use print_driver::{strip_comment, PrintDriver, DEFAULT_PRINT_HEADROOM};
pub use storage::{is_gcode_file, FileEntry, FileListing, GcodeStore, StoreOptions, Upload};
