use bytes::Bytes;

/// Milliseconds since the unix epoch, used to stamp frames at capture time.
pub fn now_timestamp_ms() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}

/// One uncompressed RGBA8 video frame.
///
/// `data` holds `width * height * 4` bytes, row-major, no padding. Cloning is
/// cheap: the pixel buffer is reference counted.
#[derive(Debug, Clone)]
pub struct VideoFrame {
    pub width: u32,
    pub height: u32,
    pub data: Bytes,
    pub timestamp_ms: u64,
}

impl VideoFrame {
    pub fn new(width: u32, height: u32, data: Bytes) -> Self {
        Self {
            width,
            height,
            data,
            timestamp_ms: now_timestamp_ms(),
        }
    }

    /// A black, fully transparent frame of the given size.
    pub fn blank(width: u32, height: u32) -> Self {
        Self::new(
            width,
            height,
            Bytes::from(vec![0u8; (width as usize) * (height as usize) * 4]),
        )
    }

    /// A frame of the given size with every pixel set to `rgba`.
    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let mut data = Vec::with_capacity((width as usize) * (height as usize) * 4);
        for _ in 0..(width as usize) * (height as usize) {
            data.extend_from_slice(&rgba);
        }
        Self::new(width, height, Bytes::from(data))
    }

    /// Byte length the pixel buffer must have for the declared dimensions.
    #[must_use]
    pub fn expected_len(&self) -> usize {
        (self.width as usize) * (self.height as usize) * 4
    }

    /// Whether the buffer length matches the declared dimensions.
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        self.width > 0 && self.height > 0 && self.data.len() == self.expected_len()
    }
}

/// A chunk of interleaved f32 PCM audio.
#[derive(Debug, Clone)]
pub struct AudioFrame {
    pub sample_rate: u32,
    pub channels: u16,
    /// Interleaved samples, nominally in `[-1.0, 1.0]`. Length is a multiple
    /// of `channels`.
    pub samples: Vec<f32>,
    pub timestamp_ms: u64,
}

impl AudioFrame {
    pub fn new(sample_rate: u32, channels: u16, samples: Vec<f32>) -> Self {
        Self {
            sample_rate,
            channels,
            samples,
            timestamp_ms: now_timestamp_ms(),
        }
    }

    /// A silent chunk of `len` interleaved samples.
    pub fn silence(sample_rate: u32, channels: u16, len: usize) -> Self {
        Self::new(sample_rate, channels, vec![0.0; len])
    }

    #[must_use]
    pub fn samples_per_channel(&self) -> usize {
        if self.channels == 0 {
            return 0;
        }
        self.samples.len() / self.channels as usize
    }

    /// Root mean square of the chunk, a cheap loudness measure for tests and
    /// level metering.
    #[must_use]
    pub fn rms(&self) -> f32 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let sum: f32 = self.samples.iter().map(|s| s * s).sum();
        (sum / self.samples.len() as f32).sqrt()
    }
}

/// What a subscriber pulls off its queue.
#[derive(Debug, Clone)]
pub enum MediaFrameEvent {
    Video(VideoFrame),
    Audio(AudioFrame),
    /// The publisher released the source. The subscription stays open; a new
    /// publisher may claim the source and frames will flow again.
    PublisherClosed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_frame_is_well_formed() {
        let frame = VideoFrame::blank(16, 9);
        assert!(frame.is_well_formed());
        assert_eq!(frame.data.len(), 16 * 9 * 4);
        assert!(frame.data.iter().all(|b| *b == 0));
    }

    #[test]
    fn test_filled_frame_repeats_pixel() {
        let frame = VideoFrame::filled(4, 4, [9, 8, 7, 255]);
        assert!(frame.is_well_formed());
        assert_eq!(&frame.data[..4], &[9, 8, 7, 255]);
        assert_eq!(&frame.data[60..64], &[9, 8, 7, 255]);
    }

    #[test]
    fn test_truncated_frame_is_malformed() {
        let frame = VideoFrame::new(16, 9, Bytes::from(vec![0u8; 10]));
        assert!(!frame.is_well_formed());
    }

    #[test]
    fn test_audio_samples_per_channel() {
        let chunk = AudioFrame::silence(48000, 2, 960);
        assert_eq!(chunk.samples_per_channel(), 480);
    }

    #[test]
    fn test_rms_of_constant_signal() {
        let chunk = AudioFrame::new(48000, 1, vec![0.5; 128]);
        assert!((chunk.rms() - 0.5).abs() < 1e-6);
        assert_eq!(AudioFrame::silence(48000, 2, 64).rms(), 0.0);
    }
}
