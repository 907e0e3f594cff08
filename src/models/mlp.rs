//! One-hidden-layer feed-forward network trained with mini-batch Adam.
//!
//! Inputs and targets are z-scored with statistics from the training set; the
//! network works entirely in standardized units and `predict` maps back.
//! With a validation set, training stops once the validation loss has not
//! improved for `patience` epochs and the best parameters are restored.

use nalgebra::DMatrix;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand_distr::{Distribution, Normal};
use tracing::debug;

use crate::domain::MlpParams;
use crate::error::ModelError;
use crate::models::forecaster::{
    FitReport, Forecaster, Standardizer, ValidationSet, check_pairs, from_matrix, mse, to_matrix,
};

const BETA1: f64 = 0.9;
const BETA2: f64 = 0.999;
const EPSILON: f64 = 1e-8;

#[derive(Debug, Clone)]
struct Network {
    w1: DMatrix<f64>,
    b1: DMatrix<f64>,
    w2: DMatrix<f64>,
    b2: DMatrix<f64>,
}

impl Network {
    /// He-normal weights, zero biases.
    fn init(
        inputs: usize,
        hidden: usize,
        outputs: usize,
        rng: &mut StdRng,
    ) -> Result<Self, ModelError> {
        let w1 = he_normal(inputs, hidden, rng)?;
        let w2 = he_normal(hidden, outputs, rng)?;
        Ok(Self {
            w1,
            b1: DMatrix::zeros(1, hidden),
            w2,
            b2: DMatrix::zeros(1, outputs),
        })
    }

    fn zeros_like(&self) -> Self {
        Self {
            w1: DMatrix::zeros(self.w1.nrows(), self.w1.ncols()),
            b1: DMatrix::zeros(1, self.b1.ncols()),
            w2: DMatrix::zeros(self.w2.nrows(), self.w2.ncols()),
            b2: DMatrix::zeros(1, self.b2.ncols()),
        }
    }

    fn forward(&self, x: &DMatrix<f64>) -> DMatrix<f64> {
        self.forward_cached(x).2
    }

    /// Returns (hidden pre-activation, hidden activation, output).
    fn forward_cached(&self, x: &DMatrix<f64>) -> (DMatrix<f64>, DMatrix<f64>, DMatrix<f64>) {
        let z1 = add_row(&(x * &self.w1), &self.b1);
        let a1 = z1.map(|v| v.max(0.0));
        let out = add_row(&(&a1 * &self.w2), &self.b2);
        (z1, a1, out)
    }

    /// Gradients of the mean squared error over the batch.
    fn gradients(&self, x: &DMatrix<f64>, y: &DMatrix<f64>) -> Self {
        let (z1, a1, out) = self.forward_cached(x);
        let scale = 2.0 / (out.len().max(1) as f64);
        let d_out = (out - y) * scale;

        let w2 = a1.transpose() * &d_out;
        let b2 = column_sums(&d_out);

        let relu_mask = z1.map(|v| if v > 0.0 { 1.0 } else { 0.0 });
        let d_z1 = (&d_out * self.w2.transpose()).component_mul(&relu_mask);
        let w1 = x.transpose() * &d_z1;
        let b1 = column_sums(&d_z1);

        Self { w1, b1, w2, b2 }
    }
}

fn he_normal(rows: usize, cols: usize, rng: &mut StdRng) -> Result<DMatrix<f64>, ModelError> {
    let std = (2.0 / rows.max(1) as f64).sqrt();
    let dist = Normal::new(0.0, std).map_err(|e| ModelError::Numerical(e.to_string()))?;
    Ok(DMatrix::from_fn(rows, cols, |_, _| dist.sample(&mut *rng)))
}

fn add_row(m: &DMatrix<f64>, row: &DMatrix<f64>) -> DMatrix<f64> {
    DMatrix::from_fn(m.nrows(), m.ncols(), |i, j| m[(i, j)] + row[(0, j)])
}

fn column_sums(m: &DMatrix<f64>) -> DMatrix<f64> {
    DMatrix::from_fn(1, m.ncols(), |_, j| m.column(j).sum())
}

#[derive(Debug, Clone)]
struct Adam {
    m: Network,
    v: Network,
    t: i32,
}

impl Adam {
    fn new(net: &Network) -> Self {
        Self {
            m: net.zeros_like(),
            v: net.zeros_like(),
            t: 0,
        }
    }

    fn step(&mut self, net: &mut Network, grad: &Network, lr: f64) {
        self.t += 1;
        let t = self.t;
        adam_update(&mut net.w1, &mut self.m.w1, &mut self.v.w1, &grad.w1, lr, t);
        adam_update(&mut net.b1, &mut self.m.b1, &mut self.v.b1, &grad.b1, lr, t);
        adam_update(&mut net.w2, &mut self.m.w2, &mut self.v.w2, &grad.w2, lr, t);
        adam_update(&mut net.b2, &mut self.m.b2, &mut self.v.b2, &grad.b2, lr, t);
    }
}

fn adam_update(
    param: &mut DMatrix<f64>,
    m: &mut DMatrix<f64>,
    v: &mut DMatrix<f64>,
    grad: &DMatrix<f64>,
    lr: f64,
    t: i32,
) {
    let bias1 = 1.0 - BETA1.powi(t);
    let bias2 = 1.0 - BETA2.powi(t);
    for i in 0..param.len() {
        let g = grad[i];
        m[i] = BETA1 * m[i] + (1.0 - BETA1) * g;
        v[i] = BETA2 * v[i] + (1.0 - BETA2) * g * g;
        let m_hat = m[i] / bias1;
        let v_hat = v[i] / bias2;
        param[i] -= lr * m_hat / (v_hat.sqrt() + EPSILON);
    }
}

#[derive(Debug, Clone)]
struct Fitted {
    net: Network,
    x_scale: Standardizer,
    y_scale: Standardizer,
}

/// Feed-forward forecaster. Deterministic for a given `MlpParams::seed`.
#[derive(Debug, Clone)]
pub struct Mlp {
    params: MlpParams,
    state: Option<Fitted>,
}

impl Mlp {
    pub fn new(params: MlpParams) -> Self {
        Self { params, state: None }
    }
}

impl Forecaster for Mlp {
    fn name(&self) -> &'static str {
        "MLP"
    }

    fn fit(
        &mut self,
        x: &[Vec<f64>],
        y: &[Vec<f64>],
        valid: Option<ValidationSet<'_>>,
    ) -> Result<FitReport, ModelError> {
        check_pairs(x, y)?;
        if self.params.hidden == 0 {
            return Err(ModelError::ShapeMismatch(
                "hidden layer must have at least one unit".to_string(),
            ));
        }
        let xm = to_matrix(x)?;
        let ym = to_matrix(y)?;
        let x_scale = Standardizer::fit(&xm);
        let y_scale = Standardizer::fit(&ym);
        let xz = x_scale.transform(&xm);
        let yz = y_scale.transform(&ym);

        let valid_z = match valid {
            Some((vx, vy)) if !vx.is_empty() => {
                check_pairs(vx, vy)?;
                let vxm = to_matrix(vx)?;
                let vym = to_matrix(vy)?;
                if vxm.ncols() != xm.ncols() || vym.ncols() != ym.ncols() {
                    return Err(ModelError::ShapeMismatch(format!(
                        "validation windows are {}x{}, training windows are {}x{}",
                        vxm.ncols(),
                        vym.ncols(),
                        xm.ncols(),
                        ym.ncols()
                    )));
                }
                Some((x_scale.transform(&vxm), y_scale.transform(&vym)))
            }
            _ => None,
        };

        let mut rng = StdRng::seed_from_u64(self.params.seed);
        let mut net = Network::init(xm.ncols(), self.params.hidden, ym.ncols(), &mut rng)?;
        let mut adam = Adam::new(&net);
        let mut order: Vec<usize> = (0..xz.nrows()).collect();
        let batch_size = self.params.batch_size.max(1);

        let mut history = Vec::with_capacity(self.params.epochs);
        let mut best: Option<(f64, Network)> = None;
        let mut stale = 0usize;

        for epoch in 0..self.params.epochs {
            order.shuffle(&mut rng);
            for chunk in order.chunks(batch_size) {
                let bx = xz.select_rows(chunk.iter());
                let by = yz.select_rows(chunk.iter());
                let grad = net.gradients(&bx, &by);
                adam.step(&mut net, &grad, self.params.learning_rate);
            }

            let train_loss = mse(&net.forward(&xz), &yz);
            if !train_loss.is_finite() {
                return Err(ModelError::Numerical(format!(
                    "training loss diverged at epoch {}",
                    epoch + 1
                )));
            }
            history.push(train_loss);

            let Some((vx, vy)) = &valid_z else {
                continue;
            };
            let valid_loss = mse(&net.forward(vx), vy);
            if best.as_ref().is_none_or(|(best_loss, _)| valid_loss < *best_loss) {
                best = Some((valid_loss, net.clone()));
                stale = 0;
            } else {
                stale += 1;
                if self.params.patience > 0 && stale >= self.params.patience {
                    debug!(epoch = epoch + 1, valid_loss, "early stopping");
                    break;
                }
            }
        }

        let epochs_run = history.len();
        let best_valid_loss = best.as_ref().map(|(loss, _)| *loss);
        if let Some((_, best_net)) = best {
            net = best_net;
        }
        let final_train_loss = mse(&net.forward(&xz), &yz);

        self.state = Some(Fitted { net, x_scale, y_scale });
        Ok(FitReport {
            epochs_run,
            final_train_loss,
            best_valid_loss,
            history,
        })
    }

    fn predict(&self, x: &[Vec<f64>]) -> Result<Vec<Vec<f64>>, ModelError> {
        let fitted = self.state.as_ref().ok_or(ModelError::NotFitted)?;
        if x.is_empty() {
            return Ok(Vec::new());
        }
        let xm = to_matrix(x)?;
        if xm.ncols() != fitted.x_scale.width() {
            return Err(ModelError::ShapeMismatch(format!(
                "model expects {} inputs, got {}",
                fitted.x_scale.width(),
                xm.ncols()
            )));
        }
        let out = fitted.net.forward(&fitted.x_scale.transform(&xm));
        Ok(from_matrix(&fitted.y_scale.inverse(&out)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toy_data(n: usize) -> (Vec<Vec<f64>>, Vec<Vec<f64>>) {
        let x: Vec<Vec<f64>> = (0..n)
            .map(|i| {
                let a = (i as f64 * 0.37).sin();
                let b = (i as f64 * 0.11).cos();
                vec![a, b, a * b]
            })
            .collect();
        let y = x.iter().map(|r| vec![2.0 * r[0] - r[1], r[2].abs()]).collect();
        (x, y)
    }

    fn params(epochs: usize) -> MlpParams {
        MlpParams {
            hidden: 16,
            epochs,
            learning_rate: 0.01,
            batch_size: 8,
            patience: 0,
            seed: 7,
        }
    }

    #[test]
    fn training_reduces_loss() {
        let (x, y) = toy_data(120);
        let mut mlp = Mlp::new(params(60));
        let report = mlp.fit(&x, &y, None).unwrap();
        assert_eq!(report.epochs_run, 60);
        assert_eq!(report.history.len(), 60);
        assert!(report.history[59] < report.history[0]);
        assert!(report.best_valid_loss.is_none());

        let pred = mlp.predict(&x[..5]).unwrap();
        assert_eq!(pred.len(), 5);
        assert_eq!(pred[0].len(), 2);
    }

    #[test]
    fn same_seed_same_model() {
        let (x, y) = toy_data(40);
        let mut a = Mlp::new(params(5));
        let mut b = Mlp::new(params(5));
        a.fit(&x, &y, None).unwrap();
        b.fit(&x, &y, None).unwrap();
        assert_eq!(a.predict(&x).unwrap(), b.predict(&x).unwrap());
    }

    #[test]
    fn early_stopping_keeps_best_validation_loss() {
        let (x, y) = toy_data(100);
        let mut p = params(300);
        p.patience = 3;
        let mut mlp = Mlp::new(p);
        let report = mlp.fit(&x[..80], &y[..80], Some((&x[80..], &y[80..]))).unwrap();
        assert!(report.epochs_run <= 300);
        let best = report.best_valid_loss.unwrap();
        assert!(best.is_finite());
    }

    #[test]
    fn predict_requires_fit_and_matching_width() {
        let mlp = Mlp::new(params(1));
        assert_eq!(mlp.predict(&[vec![1.0]]).unwrap_err(), ModelError::NotFitted);

        let (x, y) = toy_data(10);
        let mut mlp = Mlp::new(params(1));
        mlp.fit(&x, &y, None).unwrap();
        assert!(matches!(
            mlp.predict(&[vec![1.0]]),
            Err(ModelError::ShapeMismatch(_))
        ));
    }

    #[test]
    fn mismatched_pairs_are_rejected() {
        let mut mlp = Mlp::new(params(1));
        let err = mlp.fit(&[vec![1.0], vec![2.0]], &[vec![1.0]], None).unwrap_err();
        assert!(matches!(err, ModelError::ShapeMismatch(_)));
        assert_eq!(mlp.fit(&[], &[], None).unwrap_err(), ModelError::EmptyTrainingSet);
    }
}
