//! Synthesized speech: PCM16 decoding and the one-clip-at-a-time player.
//!
//! The speech backend returns raw little-endian signed 16-bit PCM, channels
//! interleaved, at a fixed sample rate. Decoding yields normalized f32 samples
//! per channel.

use std::time::Duration;

use crate::error::AudioError;

#[derive(Clone, Debug, PartialEq)]
pub struct AudioBuffer {
    pub sample_rate: u32,
    /// One vector of samples in [-1, 1] per channel, all of equal length.
    pub channels: Vec<Vec<f32>>,
}

impl AudioBuffer {
    pub fn frames(&self) -> usize {
        self.channels.first().map(Vec::len).unwrap_or(0)
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.frames() as f64 / self.sample_rate as f64)
    }
}

/// Decode interleaved LE PCM16 into per-channel f32 samples (`sample / 32768.0`).
///
/// Frame count is `bytes.len() / 2 / channels`; a trailing partial frame is dropped.
pub fn decode_pcm16(bytes: &[u8], channels: u16, sample_rate: u32) -> Result<AudioBuffer, AudioError> {
    if channels == 0 {
        return Err(AudioError::NoChannels);
    }
    let channel_count = channels as usize;
    let frames = bytes.len() / 2 / channel_count;
    if frames == 0 {
        return Err(AudioError::Empty);
    }

    let mut out = vec![Vec::with_capacity(frames); channel_count];
    for (i, pair) in bytes.chunks_exact(2).take(frames * channel_count).enumerate() {
        let sample = i16::from_le_bytes([pair[0], pair[1]]);
        out[i % channel_count].push(sample as f32 / 32768.0);
    }

    Ok(AudioBuffer { sample_rate, channels: out })
}

/// Playback affordance state reported to the client.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlaybackState {
    Ready,
    Speaking,
}

/// Identifies one play request so late completions can be told apart.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClipTicket(u64);

/// At most one clip per player; a request while speaking is a no-op.
#[derive(Debug)]
pub struct SpeechPlayer {
    state: PlaybackState,
    clips: u64,
}

impl Default for SpeechPlayer {
    fn default() -> Self {
        Self { state: PlaybackState::Ready, clips: 0 }
    }
}

impl SpeechPlayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_speaking(&self) -> bool {
        self.state == PlaybackState::Speaking
    }

    /// Start a clip. Returns None if one is already playing.
    pub fn try_begin(&mut self) -> Option<ClipTicket> {
        if self.is_speaking() {
            return None;
        }
        self.clips += 1;
        self.state = PlaybackState::Speaking;
        Some(ClipTicket(self.clips))
    }

    /// True while `ticket` is the clip being played.
    pub fn is_current(&self, ticket: ClipTicket) -> bool {
        self.is_speaking() && ticket.0 == self.clips
    }

    /// Clip ended or failed. Returns true if this reset the player.
    pub fn finish(&mut self, ticket: ClipTicket) -> bool {
        if self.is_speaking() && ticket.0 == self.clips {
            self.state = PlaybackState::Ready;
            true
        } else {
            false
        }
    }

    /// Reset regardless of which clip is playing (client reported the end).
    pub fn stop(&mut self) -> bool {
        let was = self.is_speaking();
        self.state = PlaybackState::Ready;
        was
    }
}
