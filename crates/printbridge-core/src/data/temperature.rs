use serde::{Deserialize, Serialize};

/// Number of extruders whose temperatures are tracked
pub const MAX_SUPPORTED_EXTRUDERS: usize = 6;

/// One heater zone reading in hundredths of a degree
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Temperature {
    /// Measured temperature (x100)
    pub actual: i32,
    /// Set point (x100)
    pub target: i32,
}

impl Temperature {
    /// Create a reading from hundredths of a degree
    pub fn new(actual: i32, target: i32) -> Self {
        Self { actual, target }
    }

    /// Measured temperature in degrees
    pub fn actual_degrees(&self) -> f64 {
        self.actual as f64 / 100.0
    }

    /// Set point in degrees
    pub fn target_degrees(&self) -> f64 {
        self.target as f64 / 100.0
    }
}

/// Readings for every tracked extruder plus the heated bed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Temperatures {
    pub tools: [Temperature; MAX_SUPPORTED_EXTRUDERS],
    pub bed: Temperature,
}

impl Temperatures {
    /// Reset every zone to zero
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_degrees_conversion() {
        let t = Temperature::new(21050, 21000);
        assert_eq!(t.actual_degrees(), 210.5);
        assert_eq!(t.target_degrees(), 210.0);
    }
}
