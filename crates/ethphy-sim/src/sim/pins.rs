//! Simulated pins
//!
//! Every pin is a small unsigned value of a fixed width. Writes are masked
//! to the width. A write only counts as a change, and only wakes waiting
//! tasks, when the value actually differs.

use ethphy_core::SimTime;

use crate::error::{SimError, SimResult};

/// Handle to a pin in a [`PinBank`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PinId(pub(crate) usize);

impl PinId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// One recorded value change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinEvent {
    pub time: SimTime,
    pub pin: PinId,
    pub value: u32,
}

#[derive(Debug, Clone)]
struct Pin {
    name: String,
    width: u32,
    value: u32,
}

impl Pin {
    fn mask(&self) -> u32 {
        if self.width >= 32 {
            u32::MAX
        } else {
            (1 << self.width) - 1
        }
    }
}

/// All pins of a simulation
#[derive(Debug, Clone, Default)]
pub struct PinBank {
    pins: Vec<Pin>,
    trace: Option<Vec<PinEvent>>,
}

impl PinBank {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a pin, initially 0
    pub fn add(&mut self, name: impl Into<String>, width: u32) -> PinId {
        self.pins.push(Pin {
            name: name.into(),
            width: width.clamp(1, 32),
            value: 0,
        });
        PinId(self.pins.len() - 1)
    }

    /// Look a pin up by name
    pub fn find(&self, name: &str) -> Option<PinId> {
        self.pins.iter().position(|p| p.name == name).map(PinId)
    }

    fn pin(&self, id: PinId) -> SimResult<&Pin> {
        self.pins.get(id.0).ok_or(SimError::UnknownPin(id.0))
    }

    pub fn name(&self, id: PinId) -> SimResult<&str> {
        Ok(self.pin(id)?.name.as_str())
    }

    pub fn width(&self, id: PinId) -> SimResult<u32> {
        Ok(self.pin(id)?.width)
    }

    /// Fail with a configuration error unless `id` is `expected` bits wide
    pub fn require_width(&self, id: PinId, expected: u32) -> SimResult<()> {
        let pin = self.pin(id)?;
        if pin.width != expected {
            return Err(SimError::PinWidth {
                pin: pin.name.clone(),
                expected,
                actual: pin.width,
            });
        }
        Ok(())
    }

    /// Current value of a pin
    pub fn sample(&self, id: PinId) -> SimResult<u32> {
        Ok(self.pin(id)?.value)
    }

    /// Write the bits of `value` selected by `mask`, leaving the others.
    /// Returns true if the pin value changed.
    pub fn drive_bits(&mut self, id: PinId, mask: u32, value: u32, now: SimTime) -> SimResult<bool> {
        let pin = self.pins.get_mut(id.0).ok_or(SimError::UnknownPin(id.0))?;
        let mask = mask & pin.mask();
        let new = (pin.value & !mask) | (value & mask);
        if new == pin.value {
            return Ok(false);
        }
        pin.value = new;
        if let Some(trace) = self.trace.as_mut() {
            trace.push(PinEvent {
                time: now,
                pin: id,
                value: new,
            });
        }
        Ok(true)
    }

    /// Write the whole pin. Returns true if the value changed.
    pub fn drive(&mut self, id: PinId, value: u32, now: SimTime) -> SimResult<bool> {
        self.drive_bits(id, u32::MAX, value, now)
    }

    /// Start recording value changes
    pub fn enable_trace(&mut self) {
        self.trace.get_or_insert_with(Vec::new);
    }

    /// Changes recorded so far
    pub fn trace(&self) -> &[PinEvent] {
        self.trace.as_deref().unwrap_or(&[])
    }

    /// Recorded changes of one pin
    pub fn trace_of(&self, id: PinId) -> Vec<PinEvent> {
        self.trace().iter().filter(|e| e.pin == id).copied().collect()
    }

    pub fn len(&self) -> usize {
        self.pins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pins.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_masking() {
        let mut pins = PinBank::new();
        let data = pins.add("rxd", 4);
        assert!(pins.drive(data, 0x1f, 0).unwrap());
        assert_eq!(pins.sample(data).unwrap(), 0xf);
        assert!(!pins.drive(data, 0xf, 1).unwrap());
    }

    #[test]
    fn test_drive_bits_preserves_others() {
        let mut pins = PinBank::new();
        let data = pins.add("rxd", 4);
        pins.drive(data, 0b1000, 0).unwrap();
        pins.drive_bits(data, 0b0011, 0b0110, 0).unwrap();
        assert_eq!(pins.sample(data).unwrap(), 0b1010);
    }

    #[test]
    fn test_trace_records_changes_only() {
        let mut pins = PinBank::new();
        let dv = pins.add("rxdv", 1);
        pins.drive(dv, 1, 5).unwrap();
        pins.enable_trace();
        pins.drive(dv, 1, 10).unwrap();
        pins.drive(dv, 0, 20).unwrap();
        assert_eq!(
            pins.trace(),
            &[PinEvent {
                time: 20,
                pin: dv,
                value: 0
            }]
        );
    }

    #[test]
    fn test_width_check() {
        let mut pins = PinBank::new();
        let p = pins.add("txd", 1);
        assert!(pins.require_width(p, 1).is_ok());
        let err = pins.require_width(p, 4).unwrap_err();
        assert!(err.is_config_error());
        assert_eq!(pins.find("txd"), Some(p));
        assert!(matches!(pins.sample(PinId(9)), Err(SimError::UnknownPin(9))));
    }
}
