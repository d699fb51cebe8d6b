use crate::rppg::config::{self, RppgConfig};
use std::collections::VecDeque;

// --- Adaptive Filter Parameters ---

/// First-order filter coefficients and smoothing width, selected by the
/// motion state each time processing is requested.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterParams {
    pub alpha_lp: f64,
    pub alpha_hp: f64,
    pub smoothing_window: usize,
}

impl FilterParams {
    pub fn nominal() -> Self {
        FilterParams {
            alpha_lp: config::NOMINAL_ALPHA_LP,
            alpha_hp: config::NOMINAL_ALPHA_HP,
            smoothing_window: config::NOMINAL_SMOOTHING_WINDOW,
        }
    }

    pub fn under_motion() -> Self {
        FilterParams {
            alpha_lp: config::MOTION_ALPHA_LP,
            alpha_hp: config::MOTION_ALPHA_HP,
            smoothing_window: config::MOTION_SMOOTHING_WINDOW,
        }
    }
}

/// Processed view of the ring buffer, valid until the next chain call.
pub struct ProcessedSignal<'a> {
    pub samples: &'a [f64],
    pub motion_detected: bool,
}

// --- Signal Chain ---

/// Rolling sample window with outlier clipping, first-order bandpass and
/// motion-adaptive smoothing. Owns both ring buffers.
pub struct SignalChain {
    sample_rate: usize,
    capacity: usize,
    motion_capacity: usize,
    min_process_len: usize,
    samples: VecDeque<f64>,
    motion_samples: VecDeque<f64>,
    params: FilterParams,
    motion_detected: bool,
    window_vars: Vec<f64>,
    stage: Vec<f64>,
    processed: Vec<f64>,
}

impl SignalChain {
    pub fn new(config: &RppgConfig) -> Self {
        let capacity = config.window_len();
        let motion_capacity = config.motion_window_len();
        SignalChain {
            sample_rate: config.sample_rate as usize,
            capacity,
            motion_capacity,
            min_process_len: config.min_process_len(),
            samples: VecDeque::with_capacity(capacity),
            motion_samples: VecDeque::with_capacity(motion_capacity),
            params: FilterParams::nominal(),
            motion_detected: false,
            window_vars: Vec::new(),
            stage: Vec::with_capacity(capacity),
            processed: Vec::with_capacity(capacity),
        }
    }

    /// Append one sample to both rings, evicting the oldest on overflow.
    pub fn push(&mut self, sample: f64) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
        if self.motion_samples.len() == self.motion_capacity {
            self.motion_samples.pop_front();
        }
        self.motion_samples.push_back(sample);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
        self.motion_samples.clear();
        self.motion_detected = false;
        self.params = FilterParams::nominal();
    }

    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        self.samples.iter().copied()
    }

    /// Motion state from the last processing request.
    pub fn motion_detected(&self) -> bool {
        self.motion_detected
    }

    /// Filter parameters from the last processing request.
    pub fn params(&self) -> FilterParams {
        self.params
    }

    /// Run the pipeline over a snapshot of the ring: outlier clipping,
    /// high-pass, low-pass, trailing moving average. None until one second
    /// of samples has accumulated.
    pub fn process(&mut self) -> Option<ProcessedSignal<'_>> {
        if self.samples.len() < self.min_process_len {
            return None;
        }
        self.motion_detected = self.detect_motion();
        self.params = if self.motion_detected {
            FilterParams::under_motion()
        } else {
            FilterParams::nominal()
        };

        self.stage.clear();
        self.stage.extend(self.samples.iter().copied());
        clip_outliers(&mut self.stage);
        bandpass_in_place(&mut self.stage, self.params.alpha_hp, self.params.alpha_lp);
        trailing_moving_average(&self.stage, self.params.smoothing_window, &mut self.processed);

        Some(ProcessedSignal {
            samples: &self.processed,
            motion_detected: self.motion_detected,
        })
    }

    /// Variance-of-variances test over consecutive one-second windows of the
    /// motion ring.
    fn detect_motion(&mut self) -> bool {
        let window = self.sample_rate;
        let n_windows = self.motion_samples.len() / window;
        if n_windows < 2 {
            return false;
        }
        self.window_vars.clear();
        let mut sum = 0.0;
        let mut sum_sq = 0.0;
        let mut count = 0usize;
        for &x in self.motion_samples.iter().take(n_windows * window) {
            sum += x;
            sum_sq += x * x;
            count += 1;
            if count == window {
                let mean = sum / window as f64;
                self.window_vars
                    .push((sum_sq / window as f64 - mean * mean).max(0.0));
                sum = 0.0;
                sum_sq = 0.0;
                count = 0;
            }
        }
        let (var_mean, var_var) = mean_and_variance(&self.window_vars);
        let motion = var_var > config::MOTION_VARIANCE_RATIO * var_mean;
        if motion && !self.motion_detected {
            log::debug!(
                "Signal: motion artefacts detected (var of vars {:.4} vs mean {:.4})",
                var_var,
                var_mean
            );
        }
        motion
    }
}

// --- Pipeline Stages ---

/// Population mean and variance.
pub(crate) fn mean_and_variance(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|x| (x - mean) * (x - mean)).sum::<f64>() / n;
    (mean, variance)
}

/// Replace samples farther than `OUTLIER_SIGMA` deviations from the mean by
/// the mean. Statistics are those of the unmodified input.
pub(crate) fn clip_outliers(samples: &mut [f64]) {
    let (mean, variance) = mean_and_variance(samples);
    let stddev = variance.sqrt();
    if stddev <= 0.0 {
        return;
    }
    let limit = config::OUTLIER_SIGMA * stddev;
    for x in samples.iter_mut() {
        if (*x - mean).abs() > limit {
            *x = mean;
        }
    }
}

/// Causal first-order high-pass then low-pass, both seeded with the first
/// sample.
pub(crate) fn bandpass_in_place(samples: &mut [f64], alpha_hp: f64, alpha_lp: f64) {
    if samples.is_empty() {
        return;
    }
    let mut prev_x = samples[0];
    let mut prev_y = samples[0];
    for i in 1..samples.len() {
        let x = samples[i];
        let y = alpha_hp * (prev_y + x - prev_x);
        samples[i] = y;
        prev_x = x;
        prev_y = y;
    }
    let mut prev_z = samples[0];
    for i in 1..samples.len() {
        let z = alpha_lp * samples[i] + (1.0 - alpha_lp) * prev_z;
        samples[i] = z;
        prev_z = z;
    }
}

/// Trailing moving average into `out`; the leading edge averages what is
/// available.
pub(crate) fn trailing_moving_average(input: &[f64], window: usize, out: &mut Vec<f64>) {
    out.clear();
    if window == 0 {
        out.extend_from_slice(input);
        return;
    }
    let mut sum = 0.0;
    for (i, &x) in input.iter().enumerate() {
        sum += x;
        if i >= window {
            sum -= input[i - window];
        }
        let n = (i + 1).min(window);
        out.push(sum / n as f64);
    }
}
