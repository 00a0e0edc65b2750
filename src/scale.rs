//! Video scaling (nearest neighbor, format preserving).

use crate::error::{MediaError, MediaResult};
use crate::frame::{Frame, FrameBuilder};
use crate::properties::PixelFormat;

/// Bytes per horizontal sample group of a plane
fn group_size(format: PixelFormat, plane: usize) -> usize {
    match format {
        PixelFormat::Rgba => 4,
        // interleaved UV pairs move together
        PixelFormat::Nv12 if plane == 1 => 2,
        _ => 1,
    }
}

/// Resizes video frames between two fixed geometries
///
/// The pixel format passes through unchanged; only the dimensions move.
/// Nearest-neighbor sampling per plane, so chroma subsampling is preserved.
#[derive(Debug, Clone)]
pub struct Scaler {
    src_width: u32,
    src_height: u32,
    dst_width: u32,
    dst_height: u32,
    format: PixelFormat,
}

impl Scaler {
    /// Create a scaler for the given source and destination geometry
    pub fn new(
        src_width: u32,
        src_height: u32,
        dst_width: u32,
        dst_height: u32,
        format: PixelFormat,
    ) -> MediaResult<Self> {
        if src_width == 0 || src_height == 0 || dst_width == 0 || dst_height == 0 {
            return Err(MediaError::InvalidInput("zero scaler dimension".into()));
        }
        Ok(Self {
            src_width,
            src_height,
            dst_width,
            dst_height,
            format,
        })
    }

    /// Destination width in pixels
    #[inline]
    pub fn dst_width(&self) -> u32 {
        self.dst_width
    }

    /// Destination height in pixels
    #[inline]
    pub fn dst_height(&self) -> u32 {
        self.dst_height
    }

    /// Scale one frame into freshly allocated storage
    ///
    /// Timing metadata carries over; the input frame is untouched.
    pub fn run(&self, input: &Frame) -> MediaResult<Frame> {
        if input.width() != self.src_width
            || input.height() != self.src_height
            || input.pixel_format() != Some(self.format)
        {
            return Err(MediaError::InvalidInput(format!(
                "frame {}x{} {:?} does not match configured {}x{} {:?}",
                input.width(),
                input.height(),
                input.pixel_format(),
                self.src_width,
                self.src_height,
                self.format
            )));
        }
        let data = input
            .data()
            .ok_or_else(|| MediaError::InvalidInput("frame has no storage".into()))?;

        let mut builder = FrameBuilder::video(self.dst_width, self.dst_height, self.format)?;
        for plane in 0..self.format.plane_count() {
            let g = group_size(self.format, plane);
            let src_rows = self.format.plane_rows(plane, self.src_height);
            let dst_rows = self.format.plane_rows(plane, self.dst_height);
            let src_groups = self.format.row_bytes(plane, self.src_width) / g;
            let dst_groups = self.format.row_bytes(plane, self.dst_width) / g;
            for dst_row in 0..dst_rows {
                let src_row_idx = dst_row * src_rows / dst_rows;
                let src_row = data
                    .row(plane, src_row_idx)
                    .ok_or_else(|| MediaError::InvalidInput("truncated frame storage".into()))?;
                let out = builder
                    .row_mut(plane, dst_row)
                    .ok_or_else(|| MediaError::InvalidInput("truncated scaler output".into()))?;
                for dst_group in 0..dst_groups {
                    let src_group = dst_group * src_groups / dst_groups;
                    out[dst_group * g..(dst_group + 1) * g]
                        .copy_from_slice(&src_row[src_group * g..(src_group + 1) * g]);
                }
            }
        }

        let mut out = Frame::new(crate::properties::MediaKind::Video)?;
        out.adopt_storage_video(self.dst_width, self.dst_height, self.format, builder.publish())?;
        out.set_time_base(input.time_base());
        out.set_pts(input.pts());
        out.set_duration(input.duration());
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_downscale_gray() {
        let mut builder = FrameBuilder::video(8, 8, PixelFormat::Gray8).unwrap();
        for row in 0..8 {
            builder.row_mut(0, row).unwrap().fill(row as u8 * 10);
        }
        let mut input = Frame::new(crate::properties::MediaKind::Video).unwrap();
        input
            .adopt_storage_video(8, 8, PixelFormat::Gray8, builder.publish())
            .unwrap();
        input.set_pts(Some(42));

        let scaler = Scaler::new(8, 8, 4, 4, PixelFormat::Gray8).unwrap();
        let out = scaler.run(&input).unwrap();
        assert_eq!(out.width(), 4);
        assert_eq!(out.height(), 4);
        assert_eq!(out.pts(), Some(42));
        // row 1 of the half-size output samples row 2 of the input
        assert_eq!(out.data().unwrap().row(0, 1).unwrap()[0], 20);
    }

    #[test]
    fn test_upscale_preserves_subsampling() {
        let input = Frame::alloc_video(16, 16, PixelFormat::Yuv420p).unwrap();
        let scaler = Scaler::new(16, 16, 32, 32, PixelFormat::Yuv420p).unwrap();
        let out = scaler.run(&input).unwrap();
        assert_eq!(out.data().unwrap().plane_count(), 3);
        assert_eq!(out.data().unwrap().plane(1).unwrap().rows(), 16);
        assert_eq!(out.data().unwrap().plane(1).unwrap().row_bytes(), 16);
    }

    #[test]
    fn test_mismatched_input_rejected() {
        let input = Frame::alloc_video(8, 8, PixelFormat::Rgba).unwrap();
        let scaler = Scaler::new(16, 16, 8, 8, PixelFormat::Rgba).unwrap();
        assert!(matches!(
            scaler.run(&input).unwrap_err(),
            MediaError::InvalidInput(_)
        ));
    }
}
