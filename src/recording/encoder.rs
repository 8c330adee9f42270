//! H.264 encoder wrapper using openh264

use super::config::VideoParams;
use crate::errors::CaptureError;
use crate::types::VideoFrame;
use openh264::encoder::{BitRate, Encoder, EncoderConfig, FrameRate, FrameType, RateControlMode};
use openh264::formats::YUVBuffer;
use openh264::OpenH264API;

/// H.264 encoder producing Annex B access units from RGB24 frames
pub struct H264Encoder {
    encoder: Encoder,
    width: u32,
    height: u32,
    frames_encoded: u64,
}

impl H264Encoder {
    /// Create an encoder for `params`.
    ///
    /// Rate control runs in bitrate mode at `params.bitrate` and
    /// `params.fps`. Dimensions are taken from the YUV source at encode time.
    pub fn new(params: &VideoParams) -> Result<Self, CaptureError> {
        if params.width % 2 != 0 || params.height % 2 != 0 {
            return Err(CaptureError::Prepare(format!(
                "H.264 needs even dimensions, got {}x{}",
                params.width, params.height
            )));
        }

        let config = EncoderConfig::new()
            .bitrate(BitRate::from_bps(params.bitrate))
            .max_frame_rate(FrameRate::from_hz(params.fps as f32))
            .rate_control_mode(RateControlMode::Bitrate)
            .skip_frames(false);
        let encoder = Encoder::with_api_config(OpenH264API::from_source(), config)
            .map_err(|e| CaptureError::Prepare(format!("Failed to create encoder: {}", e)))?;

        Ok(Self {
            encoder,
            width: params.width,
            height: params.height,
            frames_encoded: 0,
        })
    }

    /// Encode one captured frame
    pub fn encode_frame(&mut self, frame: &VideoFrame) -> Result<EncodedFrame, CaptureError> {
        if frame.width != self.width || frame.height != self.height {
            return Err(CaptureError::Encoding(format!(
                "Frame dimensions {}x{} don't match recording {}x{}",
                frame.width, frame.height, self.width, self.height
            )));
        }
        if !frame.is_valid() {
            return Err(CaptureError::Encoding(format!(
                "Invalid frame size: {} bytes for {}x{}",
                frame.data.len(),
                frame.width,
                frame.height
            )));
        }

        let yuv = rgb_to_yuv420(&frame.data, self.width, self.height);
        let yuv_buffer = YUVBuffer::from_vec(yuv, self.width as usize, self.height as usize);

        let bitstream = self
            .encoder
            .encode(&yuv_buffer)
            .map_err(|e| CaptureError::Encoding(format!("Encoding failed: {}", e)))?;

        self.frames_encoded += 1;

        Ok(EncodedFrame {
            is_keyframe: matches!(bitstream.frame_type(), FrameType::IDR | FrameType::I),
            data: bitstream.to_vec(),
        })
    }

    pub fn frames_encoded(&self) -> u64 {
        self.frames_encoded
    }
}

/// Result of encoding a single frame
#[derive(Debug, Clone)]
pub struct EncodedFrame {
    /// H.264 data in Annex B format (with start codes)
    pub data: Vec<u8>,
    pub is_keyframe: bool,
}

/// Convert RGB24 to planar YUV420 (BT.601)
fn rgb_to_yuv420(rgb: &[u8], width: u32, height: u32) -> Vec<u8> {
    let w = width as usize;
    let h = height as usize;
    let y_size = w * h;
    let uv_size = (w / 2) * (h / 2);
    let mut yuv = vec![0u8; y_size + uv_size * 2];

    let (y_plane, uv_planes) = yuv.split_at_mut(y_size);
    let (u_plane, v_plane) = uv_planes.split_at_mut(uv_size);

    for (row, line) in rgb.chunks_exact(w * 3).take(h).enumerate() {
        for (col, px) in line.chunks_exact(3).enumerate() {
            let (r, g, b) = (px[0] as i32, px[1] as i32, px[2] as i32);

            let luma = ((66 * r + 129 * g + 25 * b + 128) >> 8) + 16;
            y_plane[row * w + col] = luma.clamp(0, 255) as u8;

            // 2x2 chroma subsampling, sampled at the top-left pixel
            if row % 2 == 0 && col % 2 == 0 {
                let uv_idx = (row / 2) * (w / 2) + (col / 2);
                if uv_idx < uv_size {
                    let u = ((-38 * r - 74 * g + 112 * b + 128) >> 8) + 128;
                    let v = ((112 * r - 94 * g - 18 * b + 128) >> 8) + 128;
                    u_plane[uv_idx] = u.clamp(0, 255) as u8;
                    v_plane[uv_idx] = v.clamp(0, 255) as u8;
                }
            }
        }
    }

    yuv
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::synthetic_video_frame;

    #[test]
    fn test_rgb_to_yuv420_size() {
        let rgb = vec![128u8; 64 * 48 * 3];
        let yuv = rgb_to_yuv420(&rgb, 64, 48);
        assert_eq!(yuv.len(), 64 * 48 * 3 / 2);
    }

    #[test]
    fn test_white_maps_to_studio_white() {
        let rgb = vec![255u8; 4 * 4 * 3];
        let yuv = rgb_to_yuv420(&rgb, 4, 4);
        assert_eq!(yuv[0], 235);
        assert_eq!(yuv[16], 128);
    }

    #[test]
    fn test_odd_dimensions_rejected() {
        let params = VideoParams::new(321, 240, 30.0);
        assert!(matches!(
            H264Encoder::new(&params),
            Err(CaptureError::Prepare(_))
        ));
    }

    #[test]
    fn test_mismatched_frame_rejected() {
        let mut encoder = H264Encoder::new(&VideoParams::new(320, 240, 30.0)).unwrap();
        let frame = synthetic_video_frame(0, 160, 120);
        assert!(matches!(
            encoder.encode_frame(&frame),
            Err(CaptureError::Encoding(_))
        ));
    }

    #[test]
    fn test_first_frame_is_annex_b_keyframe() {
        let mut encoder = H264Encoder::new(&VideoParams::new(320, 240, 30.0)).unwrap();
        let encoded = encoder
            .encode_frame(&synthetic_video_frame(0, 320, 240))
            .unwrap();
        assert!(!encoded.data.is_empty());
        assert!(
            encoded.data.starts_with(&[0, 0, 0, 1]) || encoded.data.starts_with(&[0, 0, 1])
        );
        assert!(encoded.is_keyframe);
        assert_eq!(encoder.frames_encoded(), 1);
    }
}
