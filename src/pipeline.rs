//! Producer thread and consumer loop around the analysis engine.
//!
//! The producer stands in for the audio callback: it slices decoded PCM
//! into buffer-sized frames, runs the transform and the engine, and
//! publishes each result. The consumer polls the [`FrameBuffer`] at its own
//! rate and only ever sees whole frames.

use anyhow::{anyhow, Result};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::analysis::pitch::NOTE_NAMES;
use crate::analysis::{Analysis, AnalysisError, AnalysisFrame, AnalysisSettings, FrameBuffer};
use crate::audio::decode::AudioData;
use crate::audio::spectrum::SpectrumTransform;

/// Transform + engine + publish, for one frame at a time.
pub struct Producer {
    transform: SpectrumTransform,
    analysis: Analysis,
    buffer: FrameBuffer,
}

impl Producer {
    pub fn new(settings: AnalysisSettings) -> Result<Self, AnalysisError> {
        let analysis = Analysis::new(settings)?;
        let transform = SpectrumTransform::new(settings.buffer_size, settings.window);
        let buffer = FrameBuffer::new(analysis.scale_size(), transform.bin_count());
        Ok(Self {
            transform,
            analysis,
            buffer,
        })
    }

    /// Analyse one PCM frame and publish the result. Returns `frame_ready`.
    pub fn process(&mut self, samples: &[f32]) -> bool {
        let spectrum = self.transform.magnitude_spectrum(samples);
        let frame = self.analysis.analyze_spectrum(spectrum);
        debug_assert!(frame.is_sane());
        self.buffer.publish(frame);
        frame.frame_ready
    }

    pub fn buffer(&self) -> FrameBuffer {
        self.buffer.clone()
    }

    pub fn analysis(&self) -> &Analysis {
        &self.analysis
    }
}

/// Totals reported when the producer stops.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StreamStats {
    pub frames: u64,
    pub invalid: u64,
}

/// A running producer thread.
pub struct Stream {
    buffer: FrameBuffer,
    running: Arc<AtomicBool>,
    invalid: Arc<AtomicU64>,
    thread: Option<thread::JoinHandle<u64>>,
}

impl Stream {
    /// Start feeding `audio` through `producer`. With `realtime`, frames are
    /// paced at the buffer period like a sound card callback; otherwise
    /// they run back to back.
    pub fn spawn(mut producer: Producer, audio: AudioData, realtime: bool) -> Result<Self> {
        let buffer = producer.buffer();
        let invalid = producer.analysis().invalid_frame_counter();
        let running = Arc::new(AtomicBool::new(true));
        let running_thread = Arc::clone(&running);

        let size = producer.analysis().settings().buffer_size;
        let period = Duration::from_secs_f32(producer.analysis().settings().frame_period());

        let thread = thread::Builder::new()
            .name("analysis".into())
            .spawn(move || {
                let start = Instant::now();
                let mut frames = 0u32;
                for frame in audio.frames(size) {
                    if !running_thread.load(Ordering::Acquire) {
                        break;
                    }
                    producer.process(frame);
                    frames += 1;

                    if realtime {
                        let deadline = start + period * frames;
                        if let Some(wait) = deadline.checked_duration_since(Instant::now()) {
                            thread::sleep(wait);
                        }
                    }
                }
                running_thread.store(false, Ordering::Release);
                u64::from(frames)
            })?;

        log::info!(
            "Analysis stream started: {} samples/frame, {:.1}ms period{}",
            size,
            period.as_secs_f32() * 1000.0,
            if realtime { "" } else { " (unpaced)" }
        );

        Ok(Self {
            buffer,
            running,
            invalid,
            thread: Some(thread),
        })
    }

    pub fn buffer(&self) -> &FrameBuffer {
        &self.buffer
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Frames rejected so far, as counted by the engine.
    pub fn invalid_frames(&self) -> u64 {
        self.invalid.load(Ordering::Relaxed)
    }

    /// Ask the producer to stop after its current frame.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }

    pub fn join(mut self) -> Result<StreamStats> {
        self.stop();
        let handle = self
            .thread
            .take()
            .ok_or_else(|| anyhow!("analysis thread already joined"))?;
        let frames = handle
            .join()
            .map_err(|_| anyhow!("analysis thread panicked"))?;
        let stats = StreamStats {
            frames,
            invalid: self.invalid_frames(),
        };
        log::info!(
            "Analysis stream stopped: {} frames, {} invalid",
            stats.frames,
            stats.invalid
        );
        Ok(stats)
    }
}

impl Drop for Stream {
    fn drop(&mut self) {
        self.stop();
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}

/// Poll `stream` every `interval` until the producer finishes, calling
/// `on_frame` once for each newly published frame seen.
pub fn consume<F>(stream: &Stream, interval: Duration, mut on_frame: F)
where
    F: FnMut(u64, &AnalysisFrame),
{
    let mut frame = stream.buffer().snapshot();
    let mut last = 0;
    loop {
        let finished = !stream.is_running();
        if stream.buffer().sequence() != last {
            last = stream.buffer().snapshot_into(&mut frame);
            on_frame(last, &frame);
        }
        if finished {
            break;
        }
        thread::sleep(interval);
    }
}

const LEVELS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

/// One character per pitch class, scaled to the smoothed level.
pub fn chroma_line(frame: &AnalysisFrame) -> String {
    frame
        .octave_smoothed
        .iter()
        .map(|&v| {
            let level = (v.clamp(0.0, 1.0) * (LEVELS.len() - 1) as f32).round() as usize;
            LEVELS[level]
        })
        .collect()
}

/// `"C#"` for the loudest pitch class, `"-"` when nothing stands out.
pub fn dominant_name(frame: &AnalysisFrame) -> &'static str {
    frame
        .dominant_pitch(0.05)
        .map_or("-", |i| NOTE_NAMES[i])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    fn settings() -> AnalysisSettings {
        AnalysisSettings {
            sample_rate: 44100,
            buffer_size: 2048,
            ..AnalysisSettings::default()
        }
    }

    fn tone(freq: f32, seconds: f32) -> AudioData {
        let sample_rate = 44100;
        let len = (seconds * sample_rate as f32) as usize;
        AudioData {
            samples: (0..len)
                .map(|i| 0.5 * (2.0 * PI * freq * i as f32 / sample_rate as f32).sin())
                .collect(),
            sample_rate,
        }
    }

    #[test]
    fn producer_finds_the_played_note() {
        let mut producer = Producer::new(settings()).unwrap();
        let audio = tone(523.25, 1.0);
        for frame in audio.frames(2048) {
            assert!(producer.process(frame));
        }
        let frame = producer.buffer().snapshot();
        assert!(frame.frame_ready);
        assert_eq!(dominant_name(&frame), "C");
        assert_eq!(producer.buffer().sequence(), audio.frame_count(2048) as u64);
    }

    #[test]
    fn silence_and_nan_frames() {
        let mut producer = Producer::new(settings()).unwrap();
        assert!(producer.process(&[0.0; 2048]));

        let mut poisoned = vec![0.1; 2048];
        poisoned[7] = f32::NAN;
        assert!(!producer.process(&poisoned));
        let frame = producer.buffer().snapshot();
        assert!(!frame.frame_ready);
        assert!(frame.is_sane());
    }

    #[test]
    fn stream_runs_to_completion() {
        let producer = Producer::new(settings()).unwrap();
        let audio = tone(440.0, 0.5);
        let expected = audio.frame_count(2048) as u64;
        let stream = Stream::spawn(producer, audio, false).unwrap();

        let mut seen = Vec::new();
        consume(&stream, Duration::from_millis(1), |seq, frame| {
            assert!(frame.is_sane());
            seen.push(seq);
        });

        let stats = stream.join().unwrap();
        assert_eq!(stats.frames, expected);
        assert_eq!(stats.invalid, 0);
        assert!(seen.windows(2).all(|w| w[1] > w[0]));
        assert_eq!(seen.last().copied(), Some(expected));
    }

    #[test]
    fn stream_summary_counts_engine_rejections() {
        let producer = Producer::new(settings()).unwrap();
        let mut audio = tone(440.0, 0.5);
        audio.samples[10] = f32::NAN;
        audio.samples[2048 * 3 + 5] = f32::NAN;
        let expected = audio.frame_count(2048) as u64;
        let stream = Stream::spawn(producer, audio, false).unwrap();

        consume(&stream, Duration::from_millis(1), |_, frame| assert!(frame.is_sane()));
        assert_eq!(stream.invalid_frames(), 2);

        let stats = stream.join().unwrap();
        assert_eq!(stats, StreamStats { frames: expected, invalid: 2 });
    }

    #[test]
    fn chroma_line_has_one_glyph_per_pitch() {
        let mut frame = AnalysisFrame::new(72, 16);
        frame.octave_smoothed[0] = 1.0;
        let line = chroma_line(&frame);
        assert_eq!(line.chars().count(), 12);
        assert_eq!(line.chars().next(), Some('█'));
        assert_eq!(line.chars().nth(1), Some('▁'));
    }
}
