use crate::rppg::analysis::hr_estimator::HrEstimator;
use crate::rppg::analysis::quality_analyzer::QualityAnalyzer;
use crate::rppg::calibration::HeartRateSmoother;
use crate::rppg::config::{self, RppgConfig};
use crate::rppg::errors::ConfigError;
use crate::rppg::roi;
use crate::rppg::sampler::{PixelSource, RoiSampler};
use crate::rppg::signal::SignalChain;
use crate::rppg::types::{BpmDisplay, FaceDetection, SignalQuality, TickOutput};
use std::collections::VecDeque;

/// One user-initiated detection session. The host owns the timer and every
/// suspension point (camera, face detection); each tick it hands the current
/// frame, the face-detection result and the clock to `advance`, which runs
/// sampling, the signal chain, estimation and display smoothing in order and
/// returns what the UI should show.
pub struct Session {
    config: RppgConfig,
    sampler: RoiSampler,
    chain: SignalChain,
    estimator: HrEstimator,
    quality: QualityAnalyzer,
    smoother: HeartRateSmoother,
    waveform: VecDeque<f64>,
    is_detecting: bool,
    frame_count: u64,
    fallback_logged: bool,
}

impl Session {
    /// Fatal configuration errors are reported here; a session that
    /// constructs will never error during a running tick.
    pub fn new(config: RppgConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let sampler = RoiSampler::new(config.roi_weights);
        let chain = SignalChain::new(&config);
        let estimator = HrEstimator::new(&config)?;
        let quality = QualityAnalyzer::new(&config)?;
        let smoother = HeartRateSmoother::new(&config);
        Ok(Session {
            config,
            sampler,
            chain,
            estimator,
            quality,
            smoother,
            waveform: VecDeque::with_capacity(config::WAVEFORM_RING_CAPACITY),
            is_detecting: false,
            frame_count: 0,
            fallback_logged: false,
        })
    }

    pub fn with_defaults() -> Result<Self, ConfigError> {
        Session::new(RppgConfig::default())
    }

    pub fn config(&self) -> &RppgConfig {
        &self.config
    }

    pub fn is_detecting(&self) -> bool {
        self.is_detecting
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Recent processed waveform, oldest first, for the UI overlay.
    pub fn waveform(&self) -> impl Iterator<Item = f64> + '_ {
        self.waveform.iter().copied()
    }

    /// Begin detecting. Buffers and history are cleared so a restart never
    /// inherits samples from the previous session.
    pub fn start(&mut self, now_ms: u64) {
        log::info!("Session: starting detection");
        self.chain.clear();
        self.waveform.clear();
        self.smoother.start(now_ms);
        self.is_detecting = true;
        self.frame_count = 0;
        self.fallback_logged = false;
    }

    /// Stop detecting. The rings are retained; `start` decides whether the
    /// next session clears them.
    pub fn stop(&mut self) {
        log::info!(
            "Session: stopping detection after {} frames",
            self.frame_count
        );
        self.is_detecting = false;
        self.smoother.stop();
    }

    /// One tick: sample the frame, update the rings, estimate and smooth.
    /// Total for every input; a tick can degrade but never fail.
    pub fn advance<P: PixelSource + ?Sized>(
        &mut self,
        frame: &P,
        face: Option<&FaceDetection>,
        now_ms: u64,
    ) -> TickOutput {
        if !self.is_detecting {
            return TickOutput {
                display: BpmDisplay::Unavailable,
                quality: SignalQuality::Insufficient,
                waveform_sample: None,
            };
        }
        self.frame_count += 1;

        let rois = match face {
            Some(detection) => {
                roi::rois_from_landmarks(detection, frame.width(), frame.height())
            }
            None => {
                if !self.fallback_logged {
                    log::warn!("Session: no face available, sampling default regions");
                    self.fallback_logged = true;
                }
                roi::default_rois(frame.width(), frame.height())
            }
        };

        // A frame without a usable sample is skipped: the rings are left
        // untouched and the window simply ages.
        if let Some(sample) = self.sampler.sample(frame, &rois) {
            self.chain.push(sample);
        }

        let mut quality = SignalQuality::Insufficient;
        let mut waveform_sample = None;
        if let Some(processed) = self.chain.process() {
            if let Some(bpm) = self.estimator.estimate(processed.samples) {
                self.smoother.push_estimate(bpm, now_ms);
            }
            let report = self
                .quality
                .assess(processed.samples, processed.motion_detected);
            quality = report.label;
            waveform_sample = processed.samples.last().copied();
        }

        if let Some(sample) = waveform_sample {
            if self.waveform.len() == config::WAVEFORM_RING_CAPACITY {
                self.waveform.pop_front();
            }
            self.waveform.push_back(sample);
        }

        TickOutput {
            display: self.smoother.display(now_ms),
            quality,
            waveform_sample,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rppg::sampler::Frame;
    use std::f64::consts::PI;

    const WIDTH: u32 = 64;
    const HEIGHT: u32 = 64;

    /// A face-toned frame whose green channel carries a pulse.
    fn pulse_frame(tick: u64, pulse_hz: f64) -> Frame {
        let t = tick as f64 / 30.0;
        let green = 120.0 + 8.0 * (2.0 * PI * pulse_hz * t).sin();
        let px = [180u8, green.round() as u8, 100, 255];
        let pixels = px
            .iter()
            .copied()
            .cycle()
            .take((WIDTH * HEIGHT * 4) as usize)
            .collect();
        Frame::new(WIDTH, HEIGHT, pixels)
    }

    fn dark_frame() -> Frame {
        let pixels = [5u8, 5, 5, 255]
            .iter()
            .copied()
            .cycle()
            .take((WIDTH * HEIGHT * 4) as usize)
            .collect();
        Frame::new(WIDTH, HEIGHT, pixels)
    }

    fn tick_ms(tick: u64) -> u64 {
        tick * 1_000 / 30
    }

    #[test]
    fn test_session_does_not_tick_before_start() {
        let mut session = Session::with_defaults().unwrap();
        let out = session.advance(&pulse_frame(0, 1.0), None, 0);
        assert_eq!(out.display, BpmDisplay::Unavailable);
        assert_eq!(out.quality, SignalQuality::Insufficient);
        assert_eq!(session.frame_count(), 0);
    }

    #[test]
    fn test_pulse_reaches_display_after_calibration() {
        let mut session = Session::with_defaults().unwrap();
        session.start(0);
        let mut last = None;
        for tick in 0..600u64 {
            let frame = pulse_frame(tick, 1.0);
            last = Some(session.advance(&frame, None, tick_ms(tick)));
        }
        let out = last.unwrap();
        match out.display {
            BpmDisplay::Bpm { bpm } => assert!((59..=61).contains(&bpm), "got {}", bpm),
            other => panic!("expected a numeric display, got {:?}", other),
        }
        assert!(out.quality >= SignalQuality::Fair);
        assert!(out.waveform_sample.is_some());
        assert_eq!(session.frame_count(), 600);
    }

    #[test]
    fn test_calibration_progress_is_reported_first() {
        let mut session = Session::with_defaults().unwrap();
        session.start(0);
        let out = session.advance(&pulse_frame(0, 1.0), None, 0);
        assert_eq!(out.display, BpmDisplay::Calibrating { progress: 0 });
        let out = session.advance(&pulse_frame(1, 1.0), None, 7_500);
        assert_eq!(out.display, BpmDisplay::Calibrating { progress: 50 });
    }

    #[test]
    fn test_dark_frames_are_skipped() {
        let mut session = Session::with_defaults().unwrap();
        session.start(0);
        for tick in 0..120u64 {
            let out = session.advance(&dark_frame(), None, tick_ms(tick));
            assert_eq!(out.quality, SignalQuality::Insufficient);
            assert_eq!(out.waveform_sample, None);
        }
        // Four seconds of frames, none of them sampled.
        assert_eq!(session.frame_count(), 120);
        assert_eq!(session.chain_len_for_tests(), 0);
    }

    #[test]
    fn test_waveform_ring_is_bounded() {
        let mut session = Session::with_defaults().unwrap();
        session.start(0);
        for tick in 0..400u64 {
            session.advance(&pulse_frame(tick, 1.2), None, tick_ms(tick));
        }
        let count = session.waveform().count();
        assert_eq!(count, config::WAVEFORM_RING_CAPACITY);
    }

    #[test]
    fn test_restart_clears_previous_session() {
        let mut session = Session::with_defaults().unwrap();
        session.start(0);
        for tick in 0..300u64 {
            session.advance(&pulse_frame(tick, 1.0), None, tick_ms(tick));
        }
        session.stop();
        assert!(!session.is_detecting());
        session.start(100_000);
        assert_eq!(session.frame_count(), 0);
        assert_eq!(session.chain_len_for_tests(), 0);
        let out = session.advance(&pulse_frame(0, 1.0), None, 100_000);
        assert_eq!(out.display, BpmDisplay::Calibrating { progress: 0 });
    }
}

#[cfg(test)]
impl Session {
    fn chain_len_for_tests(&self) -> usize {
        self.chain.len()
    }
}
