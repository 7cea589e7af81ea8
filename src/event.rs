//! Module implementing the units routed between neurons and synapses.

use serde::{Deserialize, Serialize};

/// Represents a spike produced by a specific neuron.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Spike {
    /// The ID of the neuron producing the spike.
    source_id: usize,
    /// The time at which the spike is produced.
    time: f64,
}

impl Spike {
    /// Create a new spike with the specified parameters.
    pub fn new(source_id: usize, time: f64) -> Self {
        Spike { source_id, time }
    }

    /// Returns the ID of the neuron producing the spike.
    pub fn source_id(&self) -> usize {
        self.source_id
    }

    /// Returns the time at which the spike is produced.
    pub fn time(&self) -> f64 {
        self.time
    }
}

/// A weighted spike event travelling along a synapse.
///
/// The weight is the synaptic weight at emission time, the delay is the
/// connection's transmission delay quantized to simulation steps.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct SpikeEvent {
    /// The ID of the neuron producing the spike.
    pub source_id: usize,
    /// The ID of the neuron receiving the spike.
    pub target_id: usize,
    /// The time at which the spike was produced.
    pub time: f64,
    /// The weight transmitted with the spike.
    pub weight: f64,
    /// The transmission delay in simulation steps (at least 1).
    pub delay_steps: usize,
    /// The receptor port on the receiving neuron.
    pub rport: usize,
}

/// A current event targeting a neuron.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct CurrentEvent {
    /// The ID of the sender.
    pub source_id: usize,
    /// The ID of the neuron receiving the current.
    pub target_id: usize,
    /// The time at which the current was produced.
    pub time: f64,
    /// The injected current amplitude.
    pub current: f64,
    /// The transmission delay in simulation steps (at least 1).
    pub delay_steps: usize,
    /// The receptor port on the receiving neuron.
    pub rport: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spike_accessors() {
        let spike = Spike::new(42, 1.5);
        assert_eq!(spike.source_id(), 42);
        assert_eq!(spike.time(), 1.5);
    }

    #[test]
    fn test_spike_event_roundtrip() {
        let event = SpikeEvent {
            source_id: 0,
            target_id: 1,
            time: 12.5,
            weight: 0.75,
            delay_steps: 10,
            rport: 0,
        };
        let serialized = serde_json::to_string(&event).unwrap();
        let deserialized: SpikeEvent = serde_json::from_str(&serialized).unwrap();
        assert_eq!(event, deserialized);
    }
}
