//! Network structure wiring neurons and plastic connections.
//!
//! The network drives all neurons once per step in increasing step order and
//! routes every emitted spike through the outgoing connections of its source,
//! so a neuron's own history always reflects its spikes before any synapse
//! targeting it replays a range that could include them. Per-synapse
//! deliveries are therefore presented in non-decreasing time order, as the
//! plasticity rule requires.

use itertools::Itertools;
use log::info;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use crate::error::SNNError;
use crate::event::{CurrentEvent, Spike, SpikeEvent};
use crate::neuron::{NeuronParameters, PointProcessNeuron};
use crate::synapse::{PlasticConnection, SynapseParameters};

/// A network of point-process neurons and plastic connections.
///
/// The network owns the seeded random deviate stream driving all stochastic
/// decisions, so a run is reproducible from the seed and a checkpoint resumes
/// exactly where it left off.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Network {
    /// Simulation time step in ms.
    h: f64,
    /// Number of steps simulated so far.
    num_steps: u64,
    neurons: Vec<PointProcessNeuron>,
    synapses: Vec<PlasticConnection>,
    rng: ChaCha8Rng,
}

impl Network {
    /// Create an empty network with time step `h` in ms and an RNG seed.
    pub fn build(h: f64, seed: u64) -> Result<Self, SNNError> {
        if !(h > 0.0) {
            return Err(SNNError::InvalidParameter(
                "Time step must be positive".to_string(),
            ));
        }
        Ok(Network {
            h,
            num_steps: 0,
            neurons: vec![],
            synapses: vec![],
            rng: ChaCha8Rng::seed_from_u64(seed),
        })
    }

    /// Returns the simulation time step in ms.
    pub fn h(&self) -> f64 {
        self.h
    }

    /// Returns the current simulation time in ms.
    pub fn time(&self) -> f64 {
        self.num_steps as f64 * self.h
    }

    /// Returns the number of neurons in the network.
    pub fn num_neurons(&self) -> usize {
        self.neurons.len()
    }

    /// Returns the number of synapses in the network.
    pub fn num_synapses(&self) -> usize {
        self.synapses.len()
    }

    /// A reference to a specific neuron, if it exists.
    pub fn neuron(&self, id: usize) -> Option<&PointProcessNeuron> {
        self.neurons.get(id)
    }

    /// A mutable reference to a specific neuron, if it exists.
    pub fn neuron_mut(&mut self, id: usize) -> Option<&mut PointProcessNeuron> {
        self.neurons.get_mut(id)
    }

    /// A reference to a specific synapse, if it exists.
    pub fn synapse(&self, id: usize) -> Option<&PlasticConnection> {
        self.synapses.get(id)
    }

    /// A mutable reference to a specific synapse, if it exists.
    pub fn synapse_mut(&mut self, id: usize) -> Option<&mut PlasticConnection> {
        self.synapses.get_mut(id)
    }

    /// Add a neuron to the network and return its ID.
    pub fn add_neuron(&mut self, params: NeuronParameters) -> Result<usize, SNNError> {
        let id = self.neurons.len();
        self.neurons.push(PointProcessNeuron::build(id, params, self.h)?);
        Ok(id)
    }

    /// Add a plastic connection to the network and return its index.
    ///
    /// Validates the endpoint IDs and the receptor handshake, quantizes the
    /// delay to the step grid, and registers the synapse as a reader of the
    /// target's spike history.
    pub fn connect(
        &mut self,
        source_id: usize,
        target_id: usize,
        weight: f64,
        delay: f64,
        params: SynapseParameters,
    ) -> Result<usize, SNNError> {
        if source_id >= self.neurons.len() {
            return Err(SNNError::OutOfBounds(format!(
                "No neuron with ID {}",
                source_id
            )));
        }
        if target_id >= self.neurons.len() {
            return Err(SNNError::OutOfBounds(format!(
                "No neuron with ID {}",
                target_id
            )));
        }

        let synapse =
            PlasticConnection::build(source_id, target_id, weight, delay, self.h, params)?;
        synapse.check_connection(&mut self.neurons[target_id])?;
        self.synapses.push(synapse);
        Ok(self.synapses.len() - 1)
    }

    /// Inject an external spike into a neuron, arriving after `delay_steps`.
    pub fn inject_spike(
        &mut self,
        target_id: usize,
        weight: f64,
        delay_steps: usize,
    ) -> Result<(), SNNError> {
        let time = self.time();
        let neuron = self.neurons.get_mut(target_id).ok_or_else(|| {
            SNNError::OutOfBounds(format!("No neuron with ID {}", target_id))
        })?;
        neuron.handle_spike(&SpikeEvent {
            source_id: target_id,
            target_id,
            time,
            weight,
            delay_steps,
            rport: 0,
        })
    }

    /// Inject an external current into a neuron, arriving after `delay_steps`.
    pub fn inject_current(
        &mut self,
        target_id: usize,
        current: f64,
        delay_steps: usize,
    ) -> Result<(), SNNError> {
        let time = self.time();
        let neuron = self.neurons.get_mut(target_id).ok_or_else(|| {
            SNNError::OutOfBounds(format!("No neuron with ID {}", target_id))
        })?;
        neuron.handle_current(&CurrentEvent {
            source_id: target_id,
            target_id,
            time,
            current,
            delay_steps,
            rport: 0,
        })
    }

    /// Advance the network by one step and return the spikes emitted.
    pub fn step(&mut self) -> Result<Vec<Spike>, SNNError> {
        self.num_steps += 1;
        let t = self.num_steps as f64 * self.h;

        let mut spikes = vec![];
        for idx in 0..self.neurons.len() {
            if let Some(spike) = self.neurons[idx].update(t, &mut self.rng) {
                spikes.push(spike);
            }
        }

        if !spikes.is_empty() {
            let outgoing: HashMap<usize, Vec<usize>> = self
                .synapses
                .iter()
                .enumerate()
                .map(|(idx, synapse)| (synapse.source_id(), idx))
                .into_group_map();

            for spike in &spikes {
                for &syn_idx in outgoing.get(&spike.source_id()).into_iter().flatten() {
                    let target_id = self.synapses[syn_idx].target_id();
                    let event =
                        self.synapses[syn_idx].deliver(spike.time(), &mut self.neurons[target_id])?;
                    self.neurons[target_id].handle_spike(&event)?;
                }
            }
        }

        Ok(spikes)
    }

    /// Simulate the network for the given number of steps and return all
    /// emitted spikes in time order.
    pub fn run(&mut self, num_steps: u64) -> Result<Vec<Spike>, SNNError> {
        let mut spikes = vec![];
        for _ in 0..num_steps {
            spikes.extend(self.step()?);
        }
        info!(
            "Simulated {} steps ({} ms): {} spikes emitted.",
            num_steps,
            num_steps as f64 * self.h,
            spikes.len()
        );
        Ok(spikes)
    }

    /// Save the network (neurons, synapses and RNG stream) to a JSON file.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> Result<(), SNNError> {
        let file = File::create(path).map_err(|e| SNNError::IOError(e.to_string()))?;
        serde_json::to_writer(BufWriter::new(file), self)
            .map_err(|e| SNNError::IOError(e.to_string()))
    }

    /// Load a network from a JSON file produced by [`Network::save_to`].
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, SNNError> {
        let file = File::open(path).map_err(|e| SNNError::IOError(e.to_string()))?;
        serde_json::from_reader(BufReader::new(file)).map_err(|e| SNNError::IOError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    const SEED: u64 = 42;

    fn silent_params() -> NeuronParameters {
        NeuronParameters {
            c_1: 0.0,
            c_2: 0.0,
            c_3: 0.0,
            c_4: 0.0,
            ..NeuronParameters::default()
        }
    }

    fn saturated_params() -> NeuronParameters {
        NeuronParameters {
            c_1: 0.0,
            c_2: 1e9,
            c_3: 0.0,
            c_4: 0.0,
            dead_time: 2.0,
            ..NeuronParameters::default()
        }
    }

    #[test]
    fn test_connect_validation() {
        let mut network = Network::build(0.1, SEED).unwrap();
        let source = network.add_neuron(silent_params()).unwrap();
        let target = network.add_neuron(silent_params()).unwrap();

        assert!(matches!(
            network.connect(7, target, 1.0, 1.0, SynapseParameters::default()),
            Err(SNNError::OutOfBounds(_))
        ));
        assert!(matches!(
            network.connect(source, 7, 1.0, 1.0, SynapseParameters::default()),
            Err(SNNError::OutOfBounds(_))
        ));
        // Delay below one step is rejected.
        assert!(network
            .connect(source, target, 1.0, 0.01, SynapseParameters::default())
            .is_err());

        assert_eq!(
            network.connect(source, target, 1.0, 1.0, SynapseParameters::default()),
            Ok(0)
        );
        assert_eq!(network.num_synapses(), 1);
    }

    #[test]
    fn test_same_seed_replays_identically() {
        let build = || {
            let mut network = Network::build(0.1, SEED).unwrap();
            let mut params = silent_params();
            params.c_1 = 20.0;
            params.i_e = 5.0;
            network.add_neuron(params).unwrap();
            network.add_neuron(saturated_params()).unwrap();
            network
        };

        let spikes_a = build().run(2000).unwrap();
        let spikes_b = build().run(2000).unwrap();
        assert!(!spikes_a.is_empty());
        assert_eq!(spikes_a, spikes_b);
    }

    #[test]
    fn test_spike_propagation_drives_target() {
        let mut network = Network::build(0.1, SEED).unwrap();
        let source = network.add_neuron(saturated_params()).unwrap();
        let target = network.add_neuron(silent_params()).unwrap();
        network
            .connect(source, target, 2.0, 1.0, SynapseParameters::default())
            .unwrap();

        let mut max_v: f64 = 0.0;
        for _ in 0..300 {
            network.step().unwrap();
            max_v = max_v.max(network.neuron(target).unwrap().v_m());
        }
        // The target sees PSPs of roughly weight * z_scale peak height.
        assert!(max_v > 1.0);
    }

    #[test]
    fn test_offset_depression_accumulates_per_pre_spike() {
        // With a silent target the depression factor is zero, so each
        // pre-synaptic spike changes the weight by exactly -lambda * A.
        let mut network = Network::build(0.1, SEED).unwrap();
        let source = network.add_neuron(saturated_params()).unwrap();
        let target = network.add_neuron(silent_params()).unwrap();
        let params = SynapseParameters {
            a: 0.1,
            ..SynapseParameters::default()
        };
        let synapse = network.connect(source, target, 1.0, 1.0, params).unwrap();

        let spikes = network.run(210).unwrap();
        let num_pre = spikes.len();
        assert!(num_pre > 0);

        assert_relative_eq!(
            network.synapse(synapse).unwrap().weight(),
            1.0 - num_pre as f64 * 0.01 * 0.1,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_external_injection_moves_potential() {
        let mut network = Network::build(0.1, SEED).unwrap();
        let id = network.add_neuron(silent_params()).unwrap();

        network.inject_current(id, 3.0, 1).unwrap();
        network.step().unwrap();
        assert_relative_eq!(network.neuron(id).unwrap().v_m(), 3.0, epsilon = 1e-12);

        // The current is not integrated: it is gone on the next step.
        network.step().unwrap();
        assert_relative_eq!(network.neuron(id).unwrap().v_m(), 0.0, epsilon = 1e-12);

        assert!(matches!(
            network.inject_current(9, 1.0, 1),
            Err(SNNError::OutOfBounds(_))
        ));
    }
}
