//! Audio framing and container helpers.
//!
//! All audio in the service is mono PCM16 at 24 kHz. Synthesized speech is
//! chunked into fixed 20 ms frames before it reaches the transport, and
//! caller utterances are wrapped in a minimal WAV container for the
//! transcription API.

use bytes::Bytes;

pub const SAMPLE_RATE_HZ: u32 = 24_000;
pub const BYTES_PER_SAMPLE: u32 = 2;
pub const FRAME_MS: u32 = 20;

/// Bytes in one playback frame.
pub const fn frame_len() -> usize {
    (SAMPLE_RATE_HZ / 1000 * FRAME_MS * BYTES_PER_SAMPLE) as usize
}

/// Splits a PCM16 buffer into playback frames, in order. The final frame may
/// be shorter than `frame_len()`; nothing is padded or dropped.
pub fn frames(pcm: &Bytes) -> Vec<Bytes> {
    let mut out = Vec::with_capacity(pcm.len().div_ceil(frame_len()).max(1));
    let mut offset = 0;
    while offset < pcm.len() {
        let end = (offset + frame_len()).min(pcm.len());
        out.push(pcm.slice(offset..end));
        offset = end;
    }
    out
}

/// Wraps raw PCM16 mono samples in a 44-byte RIFF/WAV header.
pub fn pcm16_to_wav(pcm: &[u8]) -> Vec<u8> {
    let byte_rate = SAMPLE_RATE_HZ * BYTES_PER_SAMPLE;
    let block_align = BYTES_PER_SAMPLE as u16;
    let data_len = pcm.len() as u32;

    let mut wav = Vec::with_capacity(44 + pcm.len());
    wav.extend_from_slice(b"RIFF");
    wav.extend_from_slice(&(36 + data_len).to_le_bytes());
    wav.extend_from_slice(b"WAVE");
    wav.extend_from_slice(b"fmt ");
    wav.extend_from_slice(&16u32.to_le_bytes());
    wav.extend_from_slice(&1u16.to_le_bytes()); // PCM
    wav.extend_from_slice(&1u16.to_le_bytes()); // mono
    wav.extend_from_slice(&SAMPLE_RATE_HZ.to_le_bytes());
    wav.extend_from_slice(&byte_rate.to_le_bytes());
    wav.extend_from_slice(&block_align.to_le_bytes());
    wav.extend_from_slice(&16u16.to_le_bytes()); // bits per sample
    wav.extend_from_slice(b"data");
    wav.extend_from_slice(&data_len.to_le_bytes());
    wav.extend_from_slice(pcm);
    wav
}
