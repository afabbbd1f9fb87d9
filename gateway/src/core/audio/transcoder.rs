//! Audio format translation between the telephony leg and the live session.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use super::codec::{decode_ulaw, encode_ulaw};

/// How audio payloads are translated between the two legs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioTranscoding {
    /// Payloads are relayed byte for byte in both directions
    #[default]
    Passthrough,
    /// μ-law 8kHz on the telephony leg, PCM16 on the session leg
    Mulaw,
}

impl AudioTranscoding {
    /// Parse from string, accepting common aliases.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "passthrough" | "none" | "raw" => Some(Self::Passthrough),
            "mulaw" | "ulaw" | "g711_ulaw" | "pcmu" => Some(Self::Mulaw),
            _ => None,
        }
    }

    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Passthrough => "passthrough",
            Self::Mulaw => "mulaw",
        }
    }
}

impl std::fmt::Display for AudioTranscoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-bridge audio translator.
///
/// Outbound chunks are PCM16 at `source_rate` and may split samples or
/// decimation groups across chunk boundaries; the remainder is carried over
/// to the next chunk.
#[derive(Debug, Clone)]
pub struct AudioTranscoder {
    mode: AudioTranscoding,
    /// Source samples folded into one telephony sample
    ratio: usize,
    carry: Vec<u8>,
}

impl AudioTranscoder {
    pub fn new(mode: AudioTranscoding, source_rate: u32, target_rate: u32) -> Self {
        let ratio = if target_rate == 0 {
            1
        } else {
            ((source_rate as f64 / target_rate as f64).round() as usize).max(1)
        };
        Self {
            mode,
            ratio,
            carry: Vec::new(),
        }
    }

    pub fn mode(&self) -> AudioTranscoding {
        self.mode
    }

    /// Translate one telephony frame for the live session.
    pub fn inbound(&self, frame: Bytes) -> Bytes {
        match self.mode {
            AudioTranscoding::Passthrough => frame,
            AudioTranscoding::Mulaw => Bytes::from(decode_ulaw(&frame)),
        }
    }

    /// Translate one session chunk for the telephony leg.
    ///
    /// Returns `None` while not enough audio has accumulated for a single
    /// telephony sample.
    pub fn outbound(&mut self, chunk: Bytes) -> Option<Bytes> {
        match self.mode {
            AudioTranscoding::Passthrough => Some(chunk).filter(|c| !c.is_empty()),
            AudioTranscoding::Mulaw => {
                self.carry.extend_from_slice(&chunk);

                let group_bytes = self.ratio * 2;
                let complete = self.carry.len() / group_bytes * group_bytes;
                if complete == 0 {
                    return None;
                }

                let samples: Vec<i16> = self.carry[..complete]
                    .chunks_exact(group_bytes)
                    .map(|group| {
                        let sum: i32 = group
                            .chunks_exact(2)
                            .map(|b| i16::from_le_bytes([b[0], b[1]]) as i32)
                            .sum();
                        (sum / self.ratio as i32) as i16
                    })
                    .collect();

                self.carry.drain(..complete);
                Some(Bytes::from(encode_ulaw(&samples)))
            }
        }
    }

    /// Drop any partial outbound audio (after a barge-in).
    pub fn reset(&mut self) {
        self.carry.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::audio::codec::{linear_to_ulaw, ulaw_to_linear};

    fn pcm(samples: &[i16]) -> Bytes {
        Bytes::from(
            samples
                .iter()
                .flat_map(|s| s.to_le_bytes())
                .collect::<Vec<u8>>(),
        )
    }

    #[test]
    fn test_parse() {
        assert_eq!(AudioTranscoding::parse("MULAW"), Some(AudioTranscoding::Mulaw));
        assert_eq!(
            AudioTranscoding::parse("passthrough"),
            Some(AudioTranscoding::Passthrough)
        );
        assert_eq!(AudioTranscoding::parse("opus"), None);
        assert_eq!(AudioTranscoding::default(), AudioTranscoding::Passthrough);
    }

    #[test]
    fn test_passthrough_is_identity() {
        let mut transcoder = AudioTranscoder::new(AudioTranscoding::Passthrough, 24000, 8000);
        let frame = Bytes::from_static(&[1, 2, 3]);
        assert_eq!(transcoder.inbound(frame.clone()), frame);
        assert_eq!(transcoder.outbound(frame.clone()), Some(frame));
        assert_eq!(transcoder.outbound(Bytes::new()), None);
    }

    #[test]
    fn test_mulaw_inbound_decodes() {
        let transcoder = AudioTranscoder::new(AudioTranscoding::Mulaw, 24000, 8000);
        let pcm = transcoder.inbound(Bytes::from_static(&[0xFF, 0xFF]));
        assert_eq!(pcm.as_ref(), &[0, 0, 0, 0]);
    }

    #[test]
    fn test_mulaw_outbound_decimates() {
        let mut transcoder = AudioTranscoder::new(AudioTranscoding::Mulaw, 24000, 8000);
        let out = transcoder
            .outbound(pcm(&[1000, 1000, 1000, -2000, -2000, -2000]))
            .unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0], linear_to_ulaw(1000));
        assert_eq!(out[1], linear_to_ulaw(-2000));
    }

    #[test]
    fn test_mulaw_outbound_carries_partial_groups() {
        let mut transcoder = AudioTranscoder::new(AudioTranscoding::Mulaw, 24000, 8000);
        let all = pcm(&[500, 500, 500, 500]);

        // 5 bytes: not a full group of three samples yet
        assert_eq!(transcoder.outbound(all.slice(0..5)), None);
        let out = transcoder.outbound(all.slice(5..8)).unwrap();
        assert_eq!(out.len(), 1);
        assert!((ulaw_to_linear(out[0]) as i32 - 500).abs() < 32);

        // One sample left over
        transcoder.reset();
        assert_eq!(transcoder.outbound(pcm(&[7, 7])), None);
    }

    #[test]
    fn test_equal_rates_do_not_decimate() {
        let mut transcoder = AudioTranscoder::new(AudioTranscoding::Mulaw, 8000, 8000);
        let out = transcoder.outbound(pcm(&[0, 0, 0])).unwrap();
        assert_eq!(out.len(), 3);
    }
}
