//! This crate provides tools for simulating soft winner-take-all spiking networks in Rust.
//!
//! Networks are made of stochastically firing point-process neurons with
//! double-exponential PSPs, spike-frequency adaptation and a (possibly random)
//! dead time, connected by plastic synapses implementing a generalized
//! spike-timing-dependent plasticity rule with multiplicative weight dependence.
//!
//! # Building Networks
//!
//! ```rust
//! use swta_snn::network::Network;
//! use swta_snn::neuron::NeuronParameters;
//! use swta_snn::synapse::SynapseParameters;
//!
//! // Init an empty network with a 0.1 ms time step
//! let mut network = Network::build(0.1, 42).unwrap();
//!
//! // Add neurons and connections to the network
//! let source = network.add_neuron(NeuronParameters::default()).unwrap();
//! let target = network.add_neuron(NeuronParameters::default()).unwrap();
//! network.connect(source, target, 1.0, 1.0, SynapseParameters::default()).unwrap();
//!
//! // Check the number of neurons and connections
//! assert_eq!(network.num_neurons(), 2);
//! assert_eq!(network.num_synapses(), 1);
//! ```
//!
//! # Simulating Networks
//!
//! ```rust
//! use swta_snn::network::Network;
//! use swta_snn::neuron::NeuronParameters;
//!
//! let mut network = Network::build(0.1, 42).unwrap();
//!
//! // A neuron with a positive bias current fires spontaneously
//! let mut params = NeuronParameters::default();
//! params.c_1 = 10.0;
//! params.i_e = 5.0;
//! let id = network.add_neuron(params).unwrap();
//!
//! // Simulate 1 second of activity
//! let spikes = network.run(10_000).unwrap();
//! assert!(spikes.iter().all(|spike| spike.source_id() == id));
//! ```

pub mod config;
pub mod error;
pub mod event;
pub mod history;
pub mod network;
pub mod neuron;
pub mod synapse;
pub mod utils;

/// The number of milliseconds per second, used to convert rates in Hz to per-step probabilities.
pub const MS_PER_S: f64 = 1000.0;
/// The default simulation time step in ms.
pub const DEFAULT_TIME_STEP: f64 = 0.1;
