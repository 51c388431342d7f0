use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable external identifier for a stored file, derived from its name
pub fn file_id(name: &str) -> String {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes())
        .simple()
        .to_string()
}

/// The file currently selected for printing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobFile {
    /// Logical name inside the file store (no leading slash)
    pub name: String,
    /// Size in bytes
    pub size: u64,
    /// Creation time, seconds since the Unix epoch
    pub created: i64,
}

impl JobFile {
    pub fn new(name: impl Into<String>, size: u64, created: i64) -> Self {
        Self {
            name: name.into(),
            size,
            created,
        }
    }

    pub fn id(&self) -> String {
        file_id(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_id_is_stable() {
        assert_eq!(file_id("benchy.gcode"), file_id("benchy.gcode"));
        assert_ne!(file_id("benchy.gcode"), file_id("cube.gcode"));
        assert_eq!(file_id("cube.gcode").len(), 32);
    }
}
