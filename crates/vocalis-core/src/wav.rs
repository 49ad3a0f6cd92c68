//! WAV encoding and PCM helpers.
//!
//! Encoding happens entirely in memory; the HTTP layer returns the buffer as-is.

use std::io::Cursor;

use hound::{SampleFormat, WavSpec, WavWriter};

/// MIME type of [`encode_wav`] output.
pub const CONTENT_TYPE: &str = "audio/wav";

/// Encode 16-bit mono PCM samples as a complete WAV file.
pub fn encode_wav(samples: &[i16], sample_rate: u32) -> Result<Vec<u8>, hound::Error> {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::with_capacity(44 + samples.len() * 2));
    {
        let mut writer = WavWriter::new(&mut cursor, spec)?;
        for &sample in samples {
            writer.write_sample(sample)?;
        }
        writer.finalize()?;
    }
    Ok(cursor.into_inner())
}

/// Decode little-endian 16-bit PCM. A trailing odd byte is dropped.
pub fn pcm_bytes_to_i16(bytes: &[u8]) -> Vec<i16> {
    bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}

/// `ms` milliseconds of silence at `sample_rate`.
pub fn silence(sample_rate: u32, ms: u32) -> Vec<i16> {
    let len = (sample_rate as u64 * ms as u64 / 1000) as usize;
    vec![0; len]
}

/// Playback length of mono samples.
pub fn duration_secs(samples: &[i16], sample_rate: u32) -> f32 {
    if sample_rate == 0 {
        return 0.0;
    }
    samples.len() as f32 / sample_rate as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_wav_produces_valid_header() {
        let wav = encode_wav(&[0i16; 100], 24_000).unwrap();
        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(&wav[8..12], b"WAVE");
        assert_eq!(&wav[12..16], b"fmt ");
        assert_eq!(wav.len(), 44 + 200);
    }

    #[test]
    fn encode_wav_is_readable() {
        let samples = [0i16, 1, -1, i16::MAX, i16::MIN];
        let wav = encode_wav(&samples, 24_000).unwrap();

        let reader = hound::WavReader::new(Cursor::new(wav)).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.sample_rate, 24_000);
        assert_eq!(spec.bits_per_sample, 16);
        let decoded: Vec<i16> = reader.into_samples().map(Result::unwrap).collect();
        assert_eq!(decoded, samples);
    }

    #[test]
    fn encode_wav_empty() {
        let wav = encode_wav(&[], 16_000).unwrap();
        assert_eq!(wav.len(), 44);
    }

    #[test]
    fn pcm_bytes_basic() {
        assert_eq!(pcm_bytes_to_i16(&[0x01, 0x00, 0xFF, 0x7F]), vec![1, 32767]);
    }

    #[test]
    fn pcm_bytes_drops_trailing_byte() {
        assert_eq!(pcm_bytes_to_i16(&[0x00, 0x80, 0x42]), vec![i16::MIN]);
        assert!(pcm_bytes_to_i16(&[0x42]).is_empty());
    }

    #[test]
    fn silence_length() {
        assert_eq!(silence(24_000, 100).len(), 2_400);
        assert!(silence(24_000, 0).is_empty());
        assert!(silence(24_000, 10).iter().all(|&s| s == 0));
    }

    #[test]
    fn duration() {
        assert_eq!(duration_secs(&[0; 12_000], 24_000), 0.5);
        assert_eq!(duration_secs(&[0; 10], 0), 0.0);
    }
}
