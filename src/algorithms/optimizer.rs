use crate::config::TrainingConfig;
use crate::error::{MfError, Result};
use ndarray::{Array1, Zip};

pub trait Optimizer {
    fn update(&mut self, params: &mut Array1<f64>, gradients: &Array1<f64>) -> Result<()>;
    fn reset(&mut self);
}

/// Adam over a flat parameter vector. Moments are allocated on the first update.
#[derive(Debug, Clone)]
pub struct Adam {
    learning_rate: f64,
    beta1: f64,
    beta2: f64,
    epsilon: f64,
    t: usize,
    m: Array1<f64>,
    v: Array1<f64>,
}

impl Adam {
    pub fn new(learning_rate: f64, beta1: f64, beta2: f64, epsilon: f64) -> Self {
        Self {
            learning_rate,
            beta1,
            beta2,
            epsilon,
            t: 0,
            m: Array1::zeros(0),
            v: Array1::zeros(0),
        }
    }

    pub fn from_config(config: &TrainingConfig) -> Self {
        Self::new(config.learning_rate, config.beta1, config.beta2, config.epsilon)
    }

    /// Number of updates applied since the last reset.
    pub fn steps(&self) -> usize {
        self.t
    }

    pub fn first_moment(&self) -> &Array1<f64> {
        &self.m
    }

    pub fn second_moment(&self) -> &Array1<f64> {
        &self.v
    }
}

impl Default for Adam {
    fn default() -> Self {
        Self::new(0.001, 0.9, 0.999, 1e-8)
    }
}

impl Optimizer for Adam {
    fn update(&mut self, params: &mut Array1<f64>, gradients: &Array1<f64>) -> Result<()> {
        if gradients.len() != params.len() {
            return Err(MfError::ShapeMismatch {
                what: "gradients",
                got: gradients.len(),
                expected: params.len(),
            });
        }
        if self.t == 0 {
            self.m = Array1::zeros(params.len());
            self.v = Array1::zeros(params.len());
        } else if self.m.len() != params.len() {
            return Err(MfError::ShapeMismatch {
                what: "parameters",
                got: params.len(),
                expected: self.m.len(),
            });
        }

        self.t += 1;
        let (beta1, beta2) = (self.beta1, self.beta2);
        let (learning_rate, epsilon) = (self.learning_rate, self.epsilon);
        let bias1 = 1.0 - beta1.powf(self.t as f64);
        let bias2 = 1.0 - beta2.powf(self.t as f64);

        Zip::from(params)
            .and(&mut self.m)
            .and(&mut self.v)
            .and(gradients)
            .for_each(|x, m, v, &g| {
                *m = (1.0 - beta1) * g + beta1 * *m;
                *v = (1.0 - beta2) * g * g + beta2 * *v;
                let m_hat = *m / bias1;
                let v_hat = *v / bias2;
                *x -= learning_rate * m_hat / (v_hat.sqrt() + epsilon);
            });
        Ok(())
    }

    fn reset(&mut self) {
        self.t = 0;
        self.m = Array1::zeros(0);
        self.v = Array1::zeros(0);
    }
}
