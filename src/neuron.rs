//! Module implementing the stochastic point-process neuron.
//!
//! The neuron fires with rate `rho = c_1 * V' + c_2 * (exp(c_3 * V') - c_4)`,
//! rectified at zero, where the effective potential `V' = V + E_sfa` combines
//! the actual membrane potential with an optional spike-frequency adaptation
//! offset. Incoming spikes produce double-exponential PSPs with rise time
//! `tau_r` and fall time `tau_f`, normalized so that a unit-weight spike peaks
//! at `z_scale`. Currents are not integrated but scaled by `I_scale` and added
//! to the potential directly. After each spike the neuron is silenced for a
//! fixed or gamma-distributed dead time.

use log::debug;
use rand::Rng;
use rand_distr::{Distribution, Gamma};
use serde::{Deserialize, Serialize};

use crate::config::{self, StatusDict};
use crate::error::SNNError;
use crate::event::{CurrentEvent, Spike, SpikeEvent};
use crate::history::SpikeHistory;
use crate::utils::RingBuffer;
use crate::MS_PER_S;

/// Independent parameters of the neuron model.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct NeuronParameters {
    /// PSP rise time in ms.
    pub tau_r: f64,
    /// PSP fall time in ms.
    pub tau_f: f64,
    /// Duration of the dead time in ms.
    pub dead_time: f64,
    /// Draw a random dead time after each spike?
    pub dead_time_random: bool,
    /// Shape parameter of the dead time gamma distribution.
    pub dead_time_shape: u64,
    /// Reset the membrane potential after each spike?
    pub with_reset: bool,
    /// Adaptation time constants in ms, one per adaptation channel.
    pub tau_sfa: Vec<f64>,
    /// Adaptation jumps in mV, one per adaptation channel.
    pub q_sfa: Vec<f64>,
    /// Slope of the linear part of the transfer function in Hz/mV.
    pub c_1: f64,
    /// Prefactor of the exponential part of the transfer function in Hz.
    pub c_2: f64,
    /// Coefficient of the exponential non-linearity in 1/mV.
    pub c_3: f64,
    /// Offset coefficient for the exponential part.
    pub c_4: f64,
    /// Constant input current.
    pub i_e: f64,
    /// Membrane reset potential in mV.
    pub v_reset: f64,
    /// Scaling of incoming spike responses.
    pub z_scale: f64,
    /// Scaling of incoming currents.
    pub i_scale: f64,
    /// Remaining dead time at simulation start, in ms.
    pub t_ref_remaining: f64,
    /// Clip E_sfa against E_sfa_max?
    pub e_sfa_clip: bool,
    /// Maximum (or minimum, for negative jumps) allowed value of E_sfa.
    pub e_sfa_max: f64,
    /// Decay constant of the post-synaptic STDP trace in ms.
    pub tau_minus: f64,
}

impl Default for NeuronParameters {
    fn default() -> Self {
        NeuronParameters {
            tau_r: 1.0,
            tau_f: 10.0,
            dead_time: 10.0,
            dead_time_random: false,
            dead_time_shape: 1,
            with_reset: true,
            tau_sfa: vec![],
            q_sfa: vec![],
            c_1: 0.0,
            c_2: 1.238,
            c_3: 0.25,
            c_4: 0.0,
            i_e: 0.0,
            v_reset: 0.0,
            z_scale: 1.0,
            i_scale: 1.0,
            t_ref_remaining: 0.0,
            e_sfa_clip: false,
            e_sfa_max: 0.0,
            tau_minus: 20.0,
        }
    }
}

impl NeuronParameters {
    /// Check the parameter set for consistency.
    pub fn validate(&self) -> Result<(), SNNError> {
        if !(self.tau_r > 0.0 && self.tau_f > 0.0) {
            return Err(SNNError::InvalidParameter(
                "PSP time constants must be positive".to_string(),
            ));
        }
        if self.tau_r >= self.tau_f {
            return Err(SNNError::InvalidParameter(
                "PSP rise time must be smaller than the fall time".to_string(),
            ));
        }
        if self.dead_time < 0.0 {
            return Err(SNNError::InvalidParameter(
                "Dead time must be non-negative".to_string(),
            ));
        }
        if self.dead_time_random && !(self.dead_time > 0.0) {
            return Err(SNNError::InvalidParameter(
                "Random dead time requires a positive mean dead time".to_string(),
            ));
        }
        if self.dead_time_random && self.dead_time_shape < 1 {
            return Err(SNNError::InvalidParameter(
                "Dead time shape must be at least 1".to_string(),
            ));
        }
        if self.t_ref_remaining < 0.0 {
            return Err(SNNError::InvalidParameter(
                "Remaining dead time must be non-negative".to_string(),
            ));
        }
        if self.tau_sfa.len() != self.q_sfa.len() {
            return Err(SNNError::InvalidParameter(
                "tau_sfa and q_sfa must have the same length".to_string(),
            ));
        }
        if self.tau_sfa.iter().any(|tau| !(*tau > 0.0)) {
            return Err(SNNError::InvalidParameter(
                "Adaptation time constants must be positive".to_string(),
            ));
        }
        if !(self.tau_minus > 0.0) {
            return Err(SNNError::InvalidParameter(
                "tau_minus must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// State variables of the neuron model.
#[derive(Debug, PartialEq, Clone, Default, Serialize, Deserialize)]
struct NeuronState {
    /// Membrane potential relative to rest, in mV.
    v: f64,
    /// Contribution of the rise exponential to the membrane potential.
    u_rise: f64,
    /// Contribution of the fall exponential to the membrane potential.
    u_fall: f64,
    /// Adaptation offset, the (possibly clipped) sum of all channels.
    e_sfa: f64,
    /// Per-channel adaptation values.
    q_elems: Vec<f64>,
    /// Number of refractory steps remaining.
    r: usize,
}

/// Internal variables derived from the parameters and the time step.
#[derive(Debug, PartialEq, Clone, Default, Serialize, Deserialize)]
struct Internals {
    /// Simulation time step in ms.
    h: f64,
    /// Per-step propagator of the rise channel, exp(-h/tau_r).
    p_rise: f64,
    /// Per-step propagator of the fall channel, exp(-h/tau_f).
    p_fall: f64,
    /// Per-step propagators of the adaptation channels.
    p_sfa: Vec<f64>,
    /// PSP amplitude normalization: a unit-weight spike peaks at z_scale.
    psp_norm: f64,
    /// Fixed dead time in steps.
    dead_time_steps: usize,
}

/// A stochastically firing point-process neuron with double-exponential PSPs.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct PointProcessNeuron {
    id: usize,
    params: NeuronParameters,
    state: NeuronState,
    internals: Internals,
    /// Buffered incoming spike weights, indexed by arrival step.
    spikes_in: RingBuffer,
    /// Buffered incoming currents, indexed by arrival step.
    currents_in: RingBuffer,
    /// The neuron's own spike history, read by plastic synapses.
    history: SpikeHistory,
}

impl PointProcessNeuron {
    /// Create a new neuron with the given parameters and time step `h` in ms.
    /// Returns an error if the parameters are inconsistent or `h` is not positive.
    pub fn build(id: usize, params: NeuronParameters, h: f64) -> Result<Self, SNNError> {
        if !(h > 0.0) {
            return Err(SNNError::InvalidParameter(
                "Time step must be positive".to_string(),
            ));
        }
        params.validate()?;

        let mut neuron = PointProcessNeuron {
            id,
            params,
            state: NeuronState::default(),
            internals: Internals::default(),
            spikes_in: RingBuffer::new(),
            currents_in: RingBuffer::new(),
            history: SpikeHistory::default(),
        };
        neuron.calibrate(h);
        neuron.state.r = (neuron.params.t_ref_remaining / h).round() as usize;
        Ok(neuron)
    }

    // Recompute the derived variables. The parameters must be valid.
    fn calibrate(&mut self, h: f64) {
        let p = &self.params;
        self.internals.h = h;
        self.internals.p_rise = (-h / p.tau_r).exp();
        self.internals.p_fall = (-h / p.tau_f).exp();
        self.internals.p_sfa = p.tau_sfa.iter().map(|tau| (-h / tau).exp()).collect();

        // Peak of exp(-t/tau_f) - exp(-t/tau_r); division is safe since
        // tau_r < tau_f is enforced by validation.
        let t_peak = p.tau_r * p.tau_f * (p.tau_f / p.tau_r).ln() / (p.tau_f - p.tau_r);
        let m = (-t_peak / p.tau_f).exp() - (-t_peak / p.tau_r).exp();
        self.internals.psp_norm = 1.0 / m;

        self.internals.dead_time_steps = (p.dead_time / h).round() as usize;

        self.state.q_elems.resize(p.tau_sfa.len(), 0.0);
        self.history.set_tau_minus(p.tau_minus);
    }

    /// Returns the neuron ID.
    pub fn id(&self) -> usize {
        self.id
    }

    /// Returns the neuron parameters.
    pub fn params(&self) -> &NeuronParameters {
        &self.params
    }

    /// Returns the membrane potential in mV, relative to rest.
    pub fn v_m(&self) -> f64 {
        self.state.v
    }

    /// Returns the adaptation offset in mV.
    pub fn e_sfa(&self) -> f64 {
        self.state.e_sfa
    }

    /// Returns the number of refractory steps remaining.
    pub fn refractory_steps(&self) -> usize {
        self.state.r
    }

    /// Returns the neuron's spike history.
    pub fn history(&self) -> &SpikeHistory {
        &self.history
    }

    /// Returns a mutable reference to the neuron's spike history.
    /// Synapses targeting this neuron read (and thereby consume) ranges of it.
    pub fn history_mut(&mut self) -> &mut SpikeHistory {
        &mut self.history
    }

    /// Connection handshake for spike events. Only port 0 is supported.
    pub fn handles_spike_event(&self, rport: usize) -> Result<(), SNNError> {
        if rport != 0 {
            return Err(SNNError::UnknownReceptor { port: rport });
        }
        Ok(())
    }

    /// Connection handshake for current events. Only port 0 is supported.
    pub fn handles_current_event(&self, rport: usize) -> Result<(), SNNError> {
        if rport != 0 {
            return Err(SNNError::UnknownReceptor { port: rport });
        }
        Ok(())
    }

    /// Buffer an incoming spike event for delivery after its delay.
    pub fn handle_spike(&mut self, event: &SpikeEvent) -> Result<(), SNNError> {
        self.handles_spike_event(event.rport)?;
        if event.delay_steps < 1 {
            return Err(SNNError::InvalidParameter(
                "Event delay must be at least one step".to_string(),
            ));
        }
        self.spikes_in.add(event.delay_steps - 1, event.weight);
        Ok(())
    }

    /// Buffer an incoming current event for delivery after its delay.
    pub fn handle_current(&mut self, event: &CurrentEvent) -> Result<(), SNNError> {
        self.handles_current_event(event.rport)?;
        if event.delay_steps < 1 {
            return Err(SNNError::InvalidParameter(
                "Event delay must be at least one step".to_string(),
            ));
        }
        self.currents_in.add(event.delay_steps - 1, event.current);
        Ok(())
    }

    // Recompute the adaptation offset from the channels, clipping if enabled.
    // The clip is a ceiling when the total jump is non-negative, a floor
    // otherwise.
    fn refresh_e_sfa(&mut self) {
        let mut e_sfa: f64 = self.state.q_elems.iter().sum();
        if self.params.e_sfa_clip {
            let total_jump: f64 = self.params.q_sfa.iter().sum();
            if total_jump >= 0.0 {
                e_sfa = e_sfa.min(self.params.e_sfa_max);
            } else {
                e_sfa = e_sfa.max(self.params.e_sfa_max);
            }
        }
        self.state.e_sfa = e_sfa;
    }

    // Draw the dead time after a spike, in steps.
    fn draw_dead_time<R: Rng>(&self, rng: &mut R) -> usize {
        if !self.params.dead_time_random {
            return self.internals.dead_time_steps;
        }
        let shape = self.params.dead_time_shape as f64;
        // The distribution parameters are guaranteed valid by validation;
        // the fixed dead time is a safe fallback either way.
        match Gamma::new(shape, self.params.dead_time / shape) {
            Ok(dist) => {
                let dead_time: f64 = dist.sample(rng);
                (dead_time / self.internals.h).round().max(0.0) as usize
            }
            Err(_) => self.internals.dead_time_steps,
        }
    }

    /// Advance the neuron by one step ending at time `t` (in ms).
    /// Returns the emitted spike, if any.
    pub fn update<R: Rng>(&mut self, t: f64, rng: &mut R) -> Option<Spike> {
        let spike_input = self.spikes_in.pop();
        let current_input = self.currents_in.pop();

        // Integrate the PSP channels and recompose the potential.
        let bump = spike_input * self.params.z_scale * self.internals.psp_norm;
        self.state.u_rise = self.state.u_rise * self.internals.p_rise + bump;
        self.state.u_fall = self.state.u_fall * self.internals.p_fall + bump;
        self.state.v =
            (self.state.u_fall - self.state.u_rise) + self.params.i_scale * current_input
                + self.params.i_e;

        // Decay the adaptation channels.
        for (q, prop) in self
            .state
            .q_elems
            .iter_mut()
            .zip(self.internals.p_sfa.iter())
        {
            *q *= prop;
        }
        self.refresh_e_sfa();

        if self.state.r > 0 {
            self.state.r -= 1;
            return None;
        }

        let v_eff = self.state.v + self.state.e_sfa;
        let rate = (self.params.c_1 * v_eff
            + self.params.c_2 * ((self.params.c_3 * v_eff).exp() - self.params.c_4))
            .max(0.0);

        // Poisson thinning over one step; rate is in Hz, h in ms.
        let p_spike = -(-rate * self.internals.h / MS_PER_S).exp_m1();
        if p_spike > 0.0 && rng.gen::<f64>() < p_spike {
            Some(self.emit_spike(t, rng))
        } else {
            None
        }
    }

    // Apply the spike side effects and produce the outgoing spike.
    fn emit_spike<R: Rng>(&mut self, t: f64, rng: &mut R) -> Spike {
        self.history.add_spike(t);

        for (q, jump) in self.state.q_elems.iter_mut().zip(self.params.q_sfa.iter()) {
            *q += jump;
        }
        self.refresh_e_sfa();

        if self.params.with_reset {
            self.state.u_rise = 0.0;
            self.state.u_fall = 0.0;
            self.state.v = self.params.v_reset;
        }

        self.state.r = self.draw_dead_time(rng);
        Spike::new(self.id, t)
    }

    /// Returns all parameters and live state variables as a dictionary.
    pub fn get_status(&self) -> StatusDict {
        let mut d = StatusDict::new();
        let p = &self.params;
        config::def(&mut d, "tau_r", p.tau_r);
        config::def(&mut d, "tau_f", p.tau_f);
        config::def(&mut d, "dead_time", p.dead_time);
        config::def(&mut d, "dead_time_random", p.dead_time_random);
        config::def(&mut d, "dead_time_shape", p.dead_time_shape);
        config::def(&mut d, "with_reset", p.with_reset);
        config::def(&mut d, "tau_sfa", p.tau_sfa.clone());
        config::def(&mut d, "q_sfa", p.q_sfa.clone());
        config::def(&mut d, "c_1", p.c_1);
        config::def(&mut d, "c_2", p.c_2);
        config::def(&mut d, "c_3", p.c_3);
        config::def(&mut d, "c_4", p.c_4);
        config::def(&mut d, "I_e", p.i_e);
        config::def(&mut d, "V_reset", p.v_reset);
        config::def(&mut d, "z_scale", p.z_scale);
        config::def(&mut d, "I_scale", p.i_scale);
        config::def(&mut d, "t_ref_remaining", p.t_ref_remaining);
        config::def(&mut d, "E_sfa_clip", p.e_sfa_clip);
        config::def(&mut d, "E_sfa_max", p.e_sfa_max);
        config::def(&mut d, "tau_minus", p.tau_minus);
        config::def(&mut d, "V_m", self.state.v);
        config::def(&mut d, "E_sfa", self.state.e_sfa);
        config::def(&mut d, "size_of", std::mem::size_of::<Self>() as u64);
        d
    }

    /// Set parameters and state from a dictionary.
    ///
    /// Unknown keys are ignored, type mismatches and inconsistent values are
    /// rejected. The update is all-or-nothing: on error, nothing is changed.
    pub fn set_status(&mut self, d: &StatusDict) -> Result<(), SNNError> {
        let mut tmp = self.params.clone();
        config::update_f64(d, "tau_r", &mut tmp.tau_r)?;
        config::update_f64(d, "tau_f", &mut tmp.tau_f)?;
        config::update_f64(d, "dead_time", &mut tmp.dead_time)?;
        config::update_bool(d, "dead_time_random", &mut tmp.dead_time_random)?;
        config::update_u64(d, "dead_time_shape", &mut tmp.dead_time_shape)?;
        config::update_bool(d, "with_reset", &mut tmp.with_reset)?;
        config::update_f64_vec(d, "tau_sfa", &mut tmp.tau_sfa)?;
        config::update_f64_vec(d, "q_sfa", &mut tmp.q_sfa)?;
        config::update_f64(d, "c_1", &mut tmp.c_1)?;
        config::update_f64(d, "c_2", &mut tmp.c_2)?;
        config::update_f64(d, "c_3", &mut tmp.c_3)?;
        config::update_f64(d, "c_4", &mut tmp.c_4)?;
        config::update_f64(d, "I_e", &mut tmp.i_e)?;
        config::update_f64(d, "V_reset", &mut tmp.v_reset)?;
        config::update_f64(d, "z_scale", &mut tmp.z_scale)?;
        config::update_f64(d, "I_scale", &mut tmp.i_scale)?;
        config::update_f64(d, "t_ref_remaining", &mut tmp.t_ref_remaining)?;
        config::update_bool(d, "E_sfa_clip", &mut tmp.e_sfa_clip)?;
        config::update_f64(d, "E_sfa_max", &mut tmp.e_sfa_max)?;
        config::update_f64(d, "tau_minus", &mut tmp.tau_minus)?;

        let mut v_m = self.state.v;
        config::update_f64(d, "V_m", &mut v_m)?;

        tmp.validate()?;

        self.params = tmp;
        self.state.v = v_m;
        self.calibrate(self.internals.h);
        debug!("Neuron {}: configuration committed", self.id);
        Ok(())
    }
}
