//! Module implementing plastic connections between neurons.
//!
//! On every pre-synaptic spike the connection replays the relevant window of
//! the target neuron's spike history and applies the update rule
//!
//! ```text
//! dw = lambda * (K_+(w) * F_+(t) - A)              (facilitation)
//! dw = lambda * (-alpha * K_-(w) * F_-(t) - A)     (depression)
//! ```
//!
//! with the weight dependencies `K_±(w) = exp(nu_± * w)`. The facilitation
//! eligibility `F_+` is the synapse's own pre-trace decayed back to each
//! post-synaptic spike; the depression factor `F_-` is the target's
//! post-synaptic trace sampled at delivery. Choosing `nu_±` interpolates
//! between additive and multiplicative STDP; the offset `A` and the asymmetry
//! `alpha` realize competitive learning regimes.

use serde::{Deserialize, Serialize};

use crate::config::{self, StatusDict};
use crate::error::SNNError;
use crate::event::SpikeEvent;
use crate::neuron::PointProcessNeuron;
use crate::utils::same_sign;

/// Plasticity parameters of a connection.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct SynapseParameters {
    /// Maximum allowed weight; also the normalization denominator.
    pub wmax: f64,
    /// Step size of the weight updates.
    pub lambda: f64,
    /// Shape of the depression term.
    pub alpha: f64,
    /// Weight dependency of the facilitating update.
    pub nu_plus: f64,
    /// Weight dependency of the depressing update.
    pub nu_minus: f64,
    /// Negative offset applied to both updates.
    pub a: f64,
    /// Decay constant of the pre-synaptic trace in ms.
    /// (The post-synaptic constant is owned by the target neuron.)
    pub tau_plus: f64,
    /// Normalize weights to [0, 1] by Wmax before applying the update?
    pub scale_with_wmax: bool,
    /// Global switch for plasticity; the weight is held fixed when false.
    pub learning_is_active: bool,
}

impl Default for SynapseParameters {
    fn default() -> Self {
        SynapseParameters {
            wmax: 100.0,
            lambda: 0.01,
            alpha: 1.0,
            nu_plus: 0.0,
            nu_minus: 0.0,
            a: 0.0,
            tau_plus: 20.0,
            scale_with_wmax: false,
            learning_is_active: true,
        }
    }
}

impl SynapseParameters {
    /// Check the parameter set for consistency.
    pub fn validate(&self) -> Result<(), SNNError> {
        if !(self.tau_plus > 0.0) {
            return Err(SNNError::InvalidParameter(
                "tau_plus must be positive".to_string(),
            ));
        }
        if self.scale_with_wmax && self.wmax == 0.0 {
            return Err(SNNError::InvalidParameter(
                "Wmax must be non-zero when scaling by it".to_string(),
            ));
        }
        Ok(())
    }
}

/// A plastic connection between two neurons.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct PlasticConnection {
    source_id: usize,
    target_id: usize,
    /// Receptor port on the target.
    rport: usize,
    /// Transmission delay in ms, quantized to the step grid.
    delay: f64,
    /// Transmission delay in simulation steps.
    delay_steps: usize,
    /// The synaptic weight, sign-locked to Wmax.
    weight: f64,
    /// Pre-synaptic trace, incremented on every pre-synaptic spike.
    kplus: f64,
    /// Time of the previous pre-synaptic spike on this connection.
    t_last_spike: f64,
    params: SynapseParameters,
}

impl PlasticConnection {
    /// Create a new connection with the specified parameters.
    ///
    /// The delay is quantized to the step grid of `h` and must be at least one
    /// step; `weight` and `Wmax` must have the same sign.
    pub fn build(
        source_id: usize,
        target_id: usize,
        weight: f64,
        delay: f64,
        h: f64,
        params: SynapseParameters,
    ) -> Result<Self, SNNError> {
        if !(h > 0.0) {
            return Err(SNNError::InvalidParameter(
                "Time step must be positive".to_string(),
            ));
        }
        params.validate()?;
        if !same_sign(weight, params.wmax) {
            return Err(SNNError::InvalidParameter(
                "Weight and Wmax must have same sign".to_string(),
            ));
        }
        let delay_steps = (delay / h).round() as isize;
        if delay_steps < 1 {
            return Err(SNNError::InvalidParameter(
                "Connection delay must be at least one time step".to_string(),
            ));
        }
        let delay_steps = delay_steps as usize;

        Ok(PlasticConnection {
            source_id,
            target_id,
            rport: 0,
            delay: delay_steps as f64 * h,
            delay_steps,
            weight,
            kplus: 0.0,
            t_last_spike: 0.0,
            params,
        })
    }

    /// Returns the ID of the source neuron.
    pub fn source_id(&self) -> usize {
        self.source_id
    }

    /// Returns the ID of the target neuron.
    pub fn target_id(&self) -> usize {
        self.target_id
    }

    /// Returns the weight of the connection.
    pub fn weight(&self) -> f64 {
        self.weight
    }

    /// Returns the pre-synaptic trace of the connection.
    pub fn kplus(&self) -> f64 {
        self.kplus
    }

    /// Returns the transmission delay in ms (quantized to the step grid).
    pub fn delay(&self) -> f64 {
        self.delay
    }

    /// Returns the transmission delay in simulation steps.
    pub fn delay_steps(&self) -> usize {
        self.delay_steps
    }

    /// Returns the plasticity parameters of the connection.
    pub fn params(&self) -> &SynapseParameters {
        &self.params
    }

    /// Validate the connection against its target and register this synapse
    /// as a reader of the target's spike history.
    pub fn check_connection(&self, target: &mut PointProcessNeuron) -> Result<(), SNNError> {
        target.handles_spike_event(self.rport)?;
        target
            .history_mut()
            .register_reader(self.t_last_spike - self.delay);
        Ok(())
    }

    // Facilitation half of the update rule.
    fn facilitate(&self, w: f64, kplus: f64) -> f64 {
        if !self.params.learning_is_active {
            return w;
        }

        let w = if self.params.scale_with_wmax {
            w / self.params.wmax
        } else {
            w
        };

        let k_w = (self.params.nu_plus * w).exp();
        let dw = self.params.lambda * (k_w * kplus - self.params.a);
        let new_w = w + dw;

        if self.params.scale_with_wmax {
            // new_w is normalized
            if new_w < 1.0 {
                new_w * self.params.wmax
            } else {
                self.params.wmax
            }
        } else {
            // new_w is the absolute proposed value
            if new_w < self.params.wmax {
                new_w
            } else {
                self.params.wmax
            }
        }
    }

    // Depression half of the update rule.
    fn depress(&self, w: f64, kminus: f64) -> f64 {
        if !self.params.learning_is_active {
            return w;
        }

        let w = if self.params.scale_with_wmax {
            w / self.params.wmax
        } else {
            w
        };

        let k_w = (self.params.nu_minus * w).exp();
        let dw = self.params.lambda * (-self.params.alpha * k_w * kminus - self.params.a);
        let new_w = w + dw;

        if self.params.scale_with_wmax {
            // new_w is normalized
            if new_w > 0.0 {
                new_w * self.params.wmax
            } else {
                0.0
            }
        } else {
            // new_w is the absolute proposed value
            if new_w > 0.0 {
                new_w
            } else {
                0.0
            }
        }
    }

    /// Process a pre-synaptic spike at time `t_spike` (ms).
    ///
    /// Replays the target's history window `(t_last - delay, t_spike - delay]`
    /// to apply all facilitation contributions, applies one depression step
    /// from the target's trace, advances the pre-trace, and returns the
    /// weighted spike event to forward to the target.
    ///
    /// Deliveries must be presented in non-decreasing time order.
    pub fn deliver(
        &mut self,
        t_spike: f64,
        target: &mut PointProcessNeuron,
    ) -> Result<SpikeEvent, SNNError> {
        if t_spike < self.t_last_spike {
            return Err(SNNError::NonMonotoneDelivery {
                t1: self.t_last_spike,
                t2: t_spike,
            });
        }

        // Facilitation due to post-synaptic spikes since the last
        // pre-synaptic spike.
        let window = target
            .history_mut()
            .read_range(self.t_last_spike - self.delay, t_spike - self.delay);
        for (t_post, _) in window {
            let minus_dt = self.t_last_spike - (t_post + self.delay);
            if minus_dt == 0.0 {
                continue;
            }
            let eligibility = self.kplus * (minus_dt / self.params.tau_plus).exp();
            self.weight = self.facilitate(self.weight, eligibility);
        }

        // Depression due to the new pre-synaptic spike.
        let kminus = target.history().trace_at(t_spike - self.delay);
        self.weight = self.depress(self.weight, kminus);

        let event = SpikeEvent {
            source_id: self.source_id,
            target_id: self.target_id,
            time: t_spike,
            weight: self.weight,
            delay_steps: self.delay_steps,
            rport: self.rport,
        };

        self.kplus =
            self.kplus * ((self.t_last_spike - t_spike) / self.params.tau_plus).exp() + 1.0;
        self.t_last_spike = t_spike;

        Ok(event)
    }

    /// Returns all parameters and live state variables as a dictionary.
    pub fn get_status(&self) -> StatusDict {
        let mut d = StatusDict::new();
        config::def(&mut d, "weight", self.weight);
        config::def(&mut d, "Wmax", self.params.wmax);
        config::def(&mut d, "lambda", self.params.lambda);
        config::def(&mut d, "alpha", self.params.alpha);
        config::def(&mut d, "nu_plus", self.params.nu_plus);
        config::def(&mut d, "nu_minus", self.params.nu_minus);
        config::def(&mut d, "A", self.params.a);
        config::def(&mut d, "tau_plus", self.params.tau_plus);
        config::def(&mut d, "scale_with_Wmax", self.params.scale_with_wmax);
        config::def(&mut d, "learning_is_active", self.params.learning_is_active);
        config::def(&mut d, "Kplus", self.kplus);
        config::def(&mut d, "size_of", std::mem::size_of::<Self>() as u64);
        d
    }

    /// Set parameters and weight from a dictionary.
    ///
    /// Unknown keys are ignored, type mismatches and sign violations are
    /// rejected. The update is all-or-nothing: on error, nothing is changed.
    pub fn set_status(&mut self, d: &StatusDict) -> Result<(), SNNError> {
        let mut tmp = self.params.clone();
        let mut weight = self.weight;
        config::update_f64(d, "weight", &mut weight)?;
        config::update_f64(d, "Wmax", &mut tmp.wmax)?;
        config::update_f64(d, "lambda", &mut tmp.lambda)?;
        config::update_f64(d, "alpha", &mut tmp.alpha)?;
        config::update_f64(d, "nu_plus", &mut tmp.nu_plus)?;
        config::update_f64(d, "nu_minus", &mut tmp.nu_minus)?;
        config::update_f64(d, "A", &mut tmp.a)?;
        config::update_f64(d, "tau_plus", &mut tmp.tau_plus)?;
        config::update_bool(d, "scale_with_Wmax", &mut tmp.scale_with_wmax)?;
        config::update_bool(d, "learning_is_active", &mut tmp.learning_is_active)?;

        tmp.validate()?;
        if !same_sign(weight, tmp.wmax) {
            return Err(SNNError::InvalidParameter(
                "Weight and Wmax must have same sign".to_string(),
            ));
        }

        self.params = tmp;
        self.weight = weight;
        Ok(())
    }
}
