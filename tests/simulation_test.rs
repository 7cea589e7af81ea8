//! End-to-end simulation tests exercising neurons, synapses and the network.

use swta_snn::error::SNNError;
use swta_snn::network::Network;
use swta_snn::neuron::NeuronParameters;
use swta_snn::synapse::SynapseParameters;

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

// Fires at a moderate, input-dependent stochastic rate.
fn stochastic_params() -> NeuronParameters {
    NeuronParameters {
        c_1: 50.0,
        c_2: 0.0,
        c_3: 0.0,
        c_4: 0.0,
        i_e: 2.0,
        dead_time: 2.0,
        ..NeuronParameters::default()
    }
}

#[test]
fn zero_rate_network_stays_silent() {
    let mut network = Network::build(0.1, SEED).unwrap();
    let id = network.add_neuron(silent_params()).unwrap();

    // Even with massive input the rectified rate stays at zero.
    network.inject_spike(id, 1000.0, 1).unwrap();
    network.inject_current(id, 1000.0, 1).unwrap();
    let spikes = network.run(10_000).unwrap();
    assert!(spikes.is_empty());
}

#[test]
fn fixed_dead_time_enforces_refractory_window() {
    // dead_time = 2 ms at h = 0.1 ms: 20 refractory steps after every spike,
    // so consecutive spikes of a saturated neuron are exactly 2.1 ms apart.
    let params = NeuronParameters {
        c_1: 0.0,
        c_2: 1e9,
        c_3: 0.0,
        c_4: 0.0,
        dead_time: 2.0,
        ..NeuronParameters::default()
    };
    let mut network = Network::build(0.1, SEED).unwrap();
    network.add_neuron(params).unwrap();

    let spikes = network.run(1000).unwrap();
    assert!(spikes.len() > 10);
    for pair in spikes.windows(2) {
        let dt = pair[1].time() - pair[0].time();
        assert!((dt - 2.1).abs() < 1e-9);
    }
}

#[test]
fn plastic_weight_stays_bounded_and_sign_locked() {
    let mut network = Network::build(0.1, SEED).unwrap();
    let source = network.add_neuron(stochastic_params()).unwrap();
    let target = network.add_neuron(stochastic_params()).unwrap();

    let params = SynapseParameters {
        lambda: 0.1,
        a: 0.05,
        nu_plus: 0.5,
        nu_minus: 0.5,
        scale_with_wmax: true,
        ..SynapseParameters::default()
    };
    let synapse = network.connect(source, target, 1.0, 1.0, params).unwrap();

    let spikes = network.run(20_000).unwrap();
    assert!(spikes.iter().any(|s| s.source_id() == source));
    assert!(spikes.iter().any(|s| s.source_id() == target));

    let weight = network.synapse(synapse).unwrap().weight();
    assert!(weight.is_finite());
    assert!((0.0..=100.0).contains(&weight));
    // The offset term guarantees every pre-synaptic spike moved the weight.
    assert!(weight != 1.0);
}

#[test]
fn learning_switch_freezes_weight() {
    let mut network = Network::build(0.1, SEED).unwrap();
    let source = network.add_neuron(stochastic_params()).unwrap();
    let target = network.add_neuron(stochastic_params()).unwrap();

    let params = SynapseParameters {
        lambda: 0.1,
        a: 0.05,
        learning_is_active: false,
        ..SynapseParameters::default()
    };
    let synapse = network.connect(source, target, 0.5, 1.0, params).unwrap();

    let spikes = network.run(20_000).unwrap();
    assert!(spikes.iter().any(|s| s.source_id() == source));
    assert_eq!(network.synapse(synapse).unwrap().weight(), 0.5);
}

#[test]
fn unsupported_receptor_port_is_a_configuration_error() {
    let mut network = Network::build(0.1, SEED).unwrap();
    let id = network.add_neuron(silent_params()).unwrap();
    assert_eq!(
        network.neuron(id).unwrap().handles_spike_event(2),
        Err(SNNError::UnknownReceptor { port: 2 })
    );
}

#[test]
fn checkpoint_resumes_identically() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("network.json");

    let mut network = Network::build(0.1, SEED).unwrap();
    let source = network.add_neuron(stochastic_params()).unwrap();
    let target = network.add_neuron(stochastic_params()).unwrap();
    let params = SynapseParameters {
        lambda: 0.1,
        a: 0.05,
        scale_with_wmax: true,
        ..SynapseParameters::default()
    };
    network.connect(source, target, 1.0, 1.0, params).unwrap();

    network.run(5000).unwrap();
    network.save_to(&path).unwrap();

    let mut resumed = Network::load_from(&path).unwrap();
    assert_eq!(resumed, network);

    // The checkpoint restores neurons, synapses and the RNG stream, so the
    // continuation replays exactly.
    let spikes_original = network.run(5000).unwrap();
    let spikes_resumed = resumed.run(5000).unwrap();
    assert!(!spikes_original.is_empty());
    assert_eq!(spikes_original, spikes_resumed);
}
