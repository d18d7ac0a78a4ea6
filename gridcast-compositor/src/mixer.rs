//! Audio mixing for the composite output.
//!
//! Each contributing source feeds an [`AudioTap`], a single-chunk mailbox the
//! source handle overwrites as audio arrives. Every tick the mixer drains the
//! taps, sums the contributions with energy normalization, and emits one
//! output chunk. A source that produced nothing since the last tick simply
//! contributes silence.

use std::collections::HashMap;
use std::sync::Arc;

use gridcast_core::models::SourceId;
use gridcast_media::AudioFrame;
use parking_lot::{Mutex, RwLock};

/// Single-chunk mailbox between a source handle and the mixer.
///
/// `push` overwrites any unread chunk, `take` consumes it. Clones share the
/// same cell.
#[derive(Debug, Clone, Default)]
pub struct AudioTap {
    cell: Arc<Mutex<Option<AudioFrame>>>,
}

impl AudioTap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, chunk: AudioFrame) {
        *self.cell.lock() = Some(chunk);
    }

    pub fn take(&self) -> Option<AudioFrame> {
        self.cell.lock().take()
    }

    pub fn clear(&self) {
        *self.cell.lock() = None;
    }
}

/// Sums the latest chunk of every attached tap into one output chunk.
pub struct AudioMixer {
    sample_rate: u32,
    channels: u16,
    taps: RwLock<HashMap<SourceId, AudioTap>>,
}

impl AudioMixer {
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels,
            taps: RwLock::new(HashMap::new()),
        }
    }

    /// Attach a source's tap. Attaching the same source again replaces its
    /// slot, so a source never contributes twice.
    pub fn attach(&self, source: SourceId, tap: AudioTap) {
        self.taps.write().insert(source, tap);
    }

    pub fn detach(&self, source: &SourceId) {
        self.taps.write().remove(source);
    }

    pub fn detach_all(&self) {
        self.taps.write().clear();
    }

    /// Swap the whole tap set in one step. Used on reconfigure so there is no
    /// window where a kept source is detached.
    pub fn replace(&self, taps: HashMap<SourceId, AudioTap>) {
        *self.taps.write() = taps;
    }

    #[must_use]
    pub fn tap_count(&self) -> usize {
        self.taps.read().len()
    }

    /// Produce the next output chunk of `frame_len` interleaved samples.
    ///
    /// Consumes the pending chunk of every tap, sums them, scales the sum by
    /// `1/sqrt(k)` for `k` contributing sources and clamps every sample to
    /// `[-1.0, 1.0]`. With no contributions the output is silence.
    pub fn mix(&self, frame_len: usize) -> AudioFrame {
        let taps: Vec<AudioTap> = self.taps.read().values().cloned().collect();

        let mut buffer = vec![0.0f32; frame_len];
        let mut contributors = 0usize;
        for tap in taps {
            if let Some(chunk) = tap.take() {
                contributors += 1;
                for (slot, sample) in buffer.iter_mut().zip(chunk.samples.iter()) {
                    *slot += *sample;
                }
            }
        }

        if contributors > 0 {
            let gain = 1.0 / (contributors as f32).sqrt();
            for sample in buffer.iter_mut() {
                *sample = (*sample * gain).clamp(-1.0, 1.0);
            }
        }

        AudioFrame::new(self.sample_rate, self.channels, buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LEN: usize = 64;

    fn chunk(value: f32) -> AudioFrame {
        AudioFrame::new(48000, 2, vec![value; LEN])
    }

    #[test]
    fn test_mix_without_taps_is_silence() {
        let mixer = AudioMixer::new(48000, 2);
        let out = mixer.mix(LEN);
        assert_eq!(out.samples.len(), LEN);
        assert!(out.samples.iter().all(|s| *s == 0.0));
    }

    #[test]
    fn test_single_tap_passes_through() {
        let mixer = AudioMixer::new(48000, 2);
        let tap = AudioTap::new();
        mixer.attach("cam-a".into(), tap.clone());
        tap.push(chunk(0.5));

        let out = mixer.mix(LEN);
        assert!(out.samples.iter().all(|s| (*s - 0.5).abs() < 1e-6));
    }

    #[test]
    fn test_attach_same_source_twice_counts_once() {
        let mixer = AudioMixer::new(48000, 2);
        let tap = AudioTap::new();
        mixer.attach("cam-a".into(), tap.clone());
        mixer.attach("cam-a".into(), tap.clone());
        assert_eq!(mixer.tap_count(), 1);

        tap.push(chunk(0.5));
        let out = mixer.mix(LEN);
        assert!(out.samples.iter().all(|s| (*s - 0.5).abs() < 1e-6));
    }

    #[test]
    fn test_two_taps_are_energy_normalized() {
        let mixer = AudioMixer::new(48000, 2);
        let a = AudioTap::new();
        let b = AudioTap::new();
        mixer.attach("cam-a".into(), a.clone());
        mixer.attach("cam-b".into(), b.clone());
        a.push(chunk(0.5));
        b.push(chunk(0.5));

        let expected = 1.0 / 2.0_f32.sqrt();
        let out = mixer.mix(LEN);
        assert!(out.samples.iter().all(|s| (*s - expected).abs() < 1e-5));
    }

    #[test]
    fn test_loud_sum_is_clamped() {
        let mixer = AudioMixer::new(48000, 2);
        let a = AudioTap::new();
        let b = AudioTap::new();
        mixer.attach("cam-a".into(), a.clone());
        mixer.attach("cam-b".into(), b.clone());
        a.push(chunk(1.0));
        b.push(chunk(1.0));

        let out = mixer.mix(LEN);
        assert!(out.samples.iter().all(|s| *s <= 1.0));
        assert!(out.samples.iter().all(|s| (*s - 1.0).abs() < 1e-6));
    }

    #[test]
    fn test_mix_consumes_the_chunk() {
        let mixer = AudioMixer::new(48000, 2);
        let tap = AudioTap::new();
        mixer.attach("cam-a".into(), tap.clone());
        tap.push(chunk(0.5));

        let first = mixer.mix(LEN);
        assert!(first.samples.iter().any(|s| *s != 0.0));
        let second = mixer.mix(LEN);
        assert!(second.samples.iter().all(|s| *s == 0.0));
    }

    #[test]
    fn test_detach_restores_silence() {
        let mixer = AudioMixer::new(48000, 2);
        let tap = AudioTap::new();
        mixer.attach("cam-a".into(), tap.clone());
        tap.push(chunk(0.5));
        mixer.detach(&"cam-a".into());
        assert_eq!(mixer.tap_count(), 0);

        let out = mixer.mix(LEN);
        assert!(out.samples.iter().all(|s| *s == 0.0));
    }

    #[test]
    fn test_short_chunk_pads_with_silence() {
        let mixer = AudioMixer::new(48000, 2);
        let tap = AudioTap::new();
        mixer.attach("cam-a".into(), tap.clone());
        tap.push(AudioFrame::new(48000, 2, vec![0.25; LEN / 2]));

        let out = mixer.mix(LEN);
        assert!(out.samples[..LEN / 2].iter().all(|s| (*s - 0.25).abs() < 1e-6));
        assert!(out.samples[LEN / 2..].iter().all(|s| *s == 0.0));
    }
}
