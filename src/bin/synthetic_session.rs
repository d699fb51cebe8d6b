//! Synthetic host: drives a session from a generated camera at 30 Hz and
//! prints each tick output as a JSON line.
//!
//! Usage: `synthetic_session [bpm] [seconds]` (defaults: 72 BPM, 30 s).

use open_pulse_lib::rppg::config::RppgConfig;
use open_pulse_lib::rppg::errors::FaceSourceError;
use open_pulse_lib::rppg::sampler::{FaceSource, Frame, PixelSource};
use open_pulse_lib::rppg::session::Session;
use open_pulse_lib::rppg::types::FaceDetection;
use std::f64::consts::PI;

const WIDTH: u32 = 320;
const HEIGHT: u32 = 240;

/// Camera stand-in: a face-toned image whose green channel pulses at the
/// requested rate, with a little deterministic sensor noise.
struct SyntheticCamera {
    pulse_hz: f64,
    frame: Frame,
    noise_state: u64,
}

impl SyntheticCamera {
    fn new(bpm: f64) -> Self {
        SyntheticCamera {
            pulse_hz: bpm / 60.0,
            frame: Frame::new(WIDTH, HEIGHT, vec![0; (WIDTH * HEIGHT * 4) as usize]),
            noise_state: 0x5eed,
        }
    }

    fn render(&mut self, t_secs: f64) -> &Frame {
        let pulse = 6.0 * (2.0 * PI * self.pulse_hz * t_secs).sin();
        for px in self.frame.pixels.chunks_exact_mut(4) {
            // xorshift64 keeps the noise cheap and reproducible
            self.noise_state ^= self.noise_state << 13;
            self.noise_state ^= self.noise_state >> 7;
            self.noise_state ^= self.noise_state << 17;
            let noise = (self.noise_state % 5) as f64 - 2.0;
            px[0] = 182;
            px[1] = (122.0 + pulse + noise).clamp(0.0, 255.0) as u8;
            px[2] = 98;
            px[3] = 255;
        }
        &self.frame
    }
}

/// Face source without model assets: reports the missing capability once,
/// after which the session keeps running on default regions.
struct UnavailableFaceSource;

impl FaceSource for UnavailableFaceSource {
    fn detect(
        &mut self,
        _frame: &dyn PixelSource,
    ) -> Result<Option<FaceDetection>, FaceSourceError> {
        Err(FaceSourceError::AssetsUnavailable(
            "no landmark model bundled with the synthetic host".to_string(),
        ))
    }
}

fn main() {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let bpm: f64 = args
        .next()
        .and_then(|a| a.parse().ok())
        .unwrap_or(72.0);
    let seconds: u64 = args.next().and_then(|a| a.parse().ok()).unwrap_or(30);

    let config = RppgConfig::default();
    let tick_interval = config.tick_interval_ms();
    let ticks = seconds * config.sample_rate as u64;

    let mut session = match Session::new(config) {
        Ok(session) => session,
        Err(err) => {
            log::error!("Host: invalid configuration: {}", err);
            std::process::exit(1);
        }
    };
    let mut camera = SyntheticCamera::new(bpm);
    let mut face_source = UnavailableFaceSource;
    let mut face_warning_shown = false;

    log::info!("Host: simulating {} BPM for {} s", bpm, seconds);
    session.start(0);

    for tick in 0..ticks {
        let now_ms = (tick as f64 * tick_interval) as u64;
        let frame = camera.render(now_ms as f64 / 1000.0);

        let face = match face_source.detect(frame) {
            Ok(detection) => detection,
            Err(err) => {
                if !face_warning_shown {
                    log::warn!("Host: face source unavailable ({}), falling back", err);
                    face_warning_shown = true;
                }
                None
            }
        };

        let output = session.advance(frame, face.as_ref(), now_ms);
        match serde_json::to_string(&output) {
            Ok(line) => println!("{}", line),
            Err(err) => log::error!("Host: failed to encode tick output: {}", err),
        }
    }

    session.stop();
}
