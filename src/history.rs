//! Module implementing the per-neuron spike history.
//!
//! The history is an append-only log of a neuron's own spike times, each entry
//! carrying the value of the post-synaptic trace at that spike and an access
//! counter. Plastic synapses targeting the neuron replay ranges of this log to
//! reconstruct causal potentiation contributions; once every registered reader
//! has consumed an entry it is pruned, except for the most recent one which
//! anchors the trace.
//!
//! Readers must present non-decreasing query ranges, see `read_range`.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// A single recorded spike.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct HistEntry {
    /// The spike time in ms.
    pub time: f64,
    /// The post-synaptic trace immediately after this spike.
    pub trace: f64,
    /// How many registered readers have consumed this entry.
    access_counter: usize,
}

/// Append-only spike log with trace values and prune-on-exhaustion.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct SpikeHistory {
    entries: VecDeque<HistEntry>,
    /// Decay constant of the post-synaptic trace in ms, owned by the neuron.
    tau_minus: f64,
    /// Number of plastic connections registered as readers.
    num_readers: usize,
    /// Time of the most recent spike, in ms.
    last_spike: f64,
    /// Running trace value immediately after the most recent spike.
    last_trace: f64,
}

impl SpikeHistory {
    /// Create an empty history with the given trace decay constant.
    pub fn new(tau_minus: f64) -> Self {
        SpikeHistory {
            entries: VecDeque::new(),
            tau_minus,
            num_readers: 0,
            last_spike: 0.0,
            last_trace: 0.0,
        }
    }

    /// Returns the trace decay constant in ms.
    pub fn tau_minus(&self) -> f64 {
        self.tau_minus
    }

    /// Set the trace decay constant. The owning neuron calls this on calibration.
    pub fn set_tau_minus(&mut self, tau_minus: f64) {
        self.tau_minus = tau_minus;
    }

    /// Returns the number of recorded (unpruned) spikes.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true iff no spike is recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Register one more reading synapse.
    ///
    /// Entries at or before `t_low` are counted as already consumed by the new
    /// reader, since its queries will always start strictly after that time.
    pub fn register_reader(&mut self, t_low: f64) {
        self.num_readers += 1;
        for entry in self.entries.iter_mut() {
            if entry.time <= t_low {
                entry.access_counter += 1;
            }
        }
    }

    /// Record a spike at time `t`, advancing the post-synaptic trace.
    pub fn add_spike(&mut self, t: f64) {
        let trace = self.last_trace * ((self.last_spike - t) / self.tau_minus).exp() + 1.0;
        self.entries.push_back(HistEntry {
            time: t,
            trace,
            access_counter: 0,
        });
        self.last_spike = t;
        self.last_trace = trace;
        self.prune();
    }

    /// Return all entries with time in the half-open interval `(t_from, t_to]`,
    /// as `(time, trace)` pairs in increasing time order.
    ///
    /// Each returned entry's access counter is incremented; entries consumed by
    /// every registered reader are pruned afterwards. Since queries per reader
    /// are non-decreasing and half-open, no entry is ever returned twice to the
    /// same reader.
    pub fn read_range(&mut self, t_from: f64, t_to: f64) -> Vec<(f64, f64)> {
        let mut read = vec![];
        for entry in self.entries.iter_mut() {
            if entry.time > t_to {
                break;
            }
            if entry.time > t_from {
                entry.access_counter += 1;
                read.push((entry.time, entry.trace));
            }
        }
        self.prune();
        read
    }

    /// Sample the post-synaptic trace at time `t`, i.e. the trace of the most
    /// recent spike strictly before `t`, decayed to `t`. Returns 0.0 before the
    /// first recorded spike.
    pub fn trace_at(&self, t: f64) -> f64 {
        for entry in self.entries.iter().rev() {
            if entry.time < t {
                return entry.trace * ((entry.time - t) / self.tau_minus).exp();
            }
        }
        0.0
    }

    // Drop exhausted entries from the front. The most recent entry is always
    // retained so trace sampling stays anchored.
    fn prune(&mut self) {
        while self.entries.len() > 1 {
            let front = &self.entries[0];
            if self.num_readers == 0 || front.access_counter >= self.num_readers {
                self.entries.pop_front();
            } else {
                break;
            }
        }
    }
}

impl Default for SpikeHistory {
    fn default() -> Self {
        SpikeHistory::new(20.0)
    }
}
