//! Audio resampling (nearest sample, interleaved s16 only).

use crate::error::{MediaError, MediaResult};
use crate::frame::{Frame, FrameBuilder};
use crate::layout::ChannelLayout;
use crate::properties::{MediaKind, SampleFormat};

/// Converts interleaved s16 audio between two sample rates
///
/// Nearest-sample selection, no filtering. The channel layout passes
/// through unchanged.
#[derive(Debug, Clone)]
pub struct Resampler {
    src_rate: u32,
    dst_rate: u32,
    layout: ChannelLayout,
}

impl Resampler {
    /// Create a resampler between the given rates
    pub fn new(src_rate: u32, dst_rate: u32, layout: ChannelLayout) -> MediaResult<Self> {
        if src_rate == 0 || dst_rate == 0 {
            return Err(MediaError::InvalidInput("zero sample rate".into()));
        }
        Ok(Self {
            src_rate,
            dst_rate,
            layout,
        })
    }

    /// Destination sample rate in Hz
    #[inline]
    pub fn dst_rate(&self) -> u32 {
        self.dst_rate
    }

    /// Output sample count for a given input sample count
    pub fn output_samples(&self, input_samples: usize) -> usize {
        (input_samples as u64 * self.dst_rate as u64 / self.src_rate as u64) as usize
    }

    /// Resample one frame into freshly allocated storage
    pub fn run(&self, input: &Frame) -> MediaResult<Frame> {
        if input.sample_format() != Some(SampleFormat::S16) {
            return Err(MediaError::InvalidInput(
                "resampler handles interleaved s16 only".into(),
            ));
        }
        if input.sample_rate() != self.src_rate || input.channel_layout() != Some(&self.layout) {
            return Err(MediaError::InvalidInput(
                "frame format does not match configured resampler".into(),
            ));
        }
        let data = input
            .data()
            .ok_or_else(|| MediaError::InvalidInput("frame has no storage".into()))?;
        let src = data
            .row(0, 0)
            .ok_or_else(|| MediaError::InvalidInput("frame has no sample plane".into()))?;

        let channels = self.layout.channel_count();
        let frame_bytes = channels * 2;
        let in_samples = input.nb_samples();
        if in_samples == 0 {
            return Err(MediaError::InvalidInput("frame has zero samples".into()));
        }
        let out_samples = self.output_samples(in_samples).max(1);

        let mut builder = FrameBuilder::audio(out_samples, SampleFormat::S16, &self.layout)?;
        {
            let dst = builder.row_mut(0, 0).expect("single interleaved plane");
            for i in 0..out_samples {
                let j = (i as u64 * self.src_rate as u64 / self.dst_rate as u64) as usize;
                let j = j.min(in_samples - 1);
                dst[i * frame_bytes..(i + 1) * frame_bytes]
                    .copy_from_slice(&src[j * frame_bytes..(j + 1) * frame_bytes]);
            }
        }

        let mut out = Frame::new(MediaKind::Audio)?;
        out.adopt_storage_audio(
            out_samples,
            SampleFormat::S16,
            self.dst_rate,
            self.layout.clone(),
            builder.publish(),
        )?;
        out.set_time_base(input.time_base());
        out.set_pts(input.pts());
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s16_frame(samples: &[i16], rate: u32) -> Frame {
        let mut builder =
            FrameBuilder::audio(samples.len(), SampleFormat::S16, &ChannelLayout::MONO).unwrap();
        {
            let row = builder.row_mut(0, 0).unwrap();
            for (i, s) in samples.iter().enumerate() {
                row[i * 2..i * 2 + 2].copy_from_slice(&s.to_le_bytes());
            }
        }
        let mut frame = Frame::new(MediaKind::Audio).unwrap();
        frame
            .adopt_storage_audio(
                samples.len(),
                SampleFormat::S16,
                rate,
                ChannelLayout::MONO,
                builder.publish(),
            )
            .unwrap();
        frame
    }

    #[test]
    fn test_downsample_halves_count() {
        let input = s16_frame(&[0, 1, 2, 3, 4, 5, 6, 7], 48_000);
        let resampler = Resampler::new(48_000, 24_000, ChannelLayout::MONO).unwrap();
        let out = resampler.run(&input).unwrap();
        assert_eq!(out.nb_samples(), 4);
        assert_eq!(out.sample_rate(), 24_000);
        let row = out.data().unwrap().row(0, 0).unwrap();
        // every second input sample survives
        assert_eq!(i16::from_le_bytes([row[0], row[1]]), 0);
        assert_eq!(i16::from_le_bytes([row[2], row[3]]), 2);
    }

    #[test]
    fn test_upsample_repeats_samples() {
        let input = s16_frame(&[10, 20], 8_000);
        let resampler = Resampler::new(8_000, 16_000, ChannelLayout::MONO).unwrap();
        let out = resampler.run(&input).unwrap();
        assert_eq!(out.nb_samples(), 4);
        let row = out.data().unwrap().row(0, 0).unwrap();
        assert_eq!(i16::from_le_bytes([row[0], row[1]]), 10);
        assert_eq!(i16::from_le_bytes([row[2], row[3]]), 10);
        assert_eq!(i16::from_le_bytes([row[4], row[5]]), 20);
    }

    #[test]
    fn test_zero_sample_frame_rejected() {
        // a shell can adopt storage claiming zero samples; reject it here
        let storage = FrameBuilder::audio(1, SampleFormat::S16, &ChannelLayout::MONO)
            .unwrap()
            .publish();
        let mut frame = Frame::new(MediaKind::Audio).unwrap();
        frame
            .adopt_storage_audio(0, SampleFormat::S16, 48_000, ChannelLayout::MONO, storage)
            .unwrap();
        let resampler = Resampler::new(48_000, 16_000, ChannelLayout::MONO).unwrap();
        assert!(matches!(
            resampler.run(&frame).unwrap_err(),
            MediaError::InvalidInput(_)
        ));
    }

    #[test]
    fn test_wrong_rate_rejected() {
        let input = s16_frame(&[1, 2, 3], 44_100);
        let resampler = Resampler::new(48_000, 16_000, ChannelLayout::MONO).unwrap();
        assert!(matches!(
            resampler.run(&input).unwrap_err(),
            MediaError::InvalidInput(_)
        ));
    }
}
