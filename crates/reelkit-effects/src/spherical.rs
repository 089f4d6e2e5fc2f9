//! Reprojection of equirectangular (360°) footage.
//!
//! Casts a perspective ray per output pixel, rotates it by the
//! keyframed yaw/pitch/roll, and samples the source as a sphere,
//! hemisphere, or inverse circular fisheye. Roll is inverted and
//! offset by 180° so positive values read naturally in the UI.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use reelkit_core::frame::BYTES_PER_PIXEL;
use reelkit_core::{ImageBuffer, Keyframe, VideoFrame};

use crate::Effect;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectionMode {
    #[default]
    Sphere,
    Hemisphere,
    Fisheye,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleFilter {
    #[default]
    Nearest,
    Bilinear,
}

/// Spherical projection effect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SphericalProjection {
    /// Degrees.
    pub yaw: Keyframe,
    pub pitch: Keyframe,
    pub roll: Keyframe,
    /// Field of view in degrees.
    pub fov: Keyframe,
    pub projection_mode: ProjectionMode,
    pub invert: bool,
    pub interpolation: SampleFilter,
}

impl Default for SphericalProjection {
    fn default() -> Self {
        Self {
            yaw: Keyframe::constant(0.0),
            pitch: Keyframe::constant(0.0),
            roll: Keyframe::constant(0.0),
            fov: Keyframe::constant(90.0),
            projection_mode: ProjectionMode::Sphere,
            invert: false,
            interpolation: SampleFilter::Nearest,
        }
    }
}

impl SphericalProjection {
    pub fn new(yaw: Keyframe, pitch: Keyframe, roll: Keyframe, fov: Keyframe) -> Self {
        Self {
            yaw,
            pitch,
            roll,
            fov,
            ..Self::default()
        }
    }
}

impl Effect for SphericalProjection {
    fn name(&self) -> &'static str {
        "SphericalProjection"
    }

    fn apply(&self, mut frame: VideoFrame, frame_number: i64) -> VideoFrame {
        let w = frame.image.width();
        let h = frame.image.height();
        if w == 0 || h == 0 {
            return frame;
        }
        let wf = w as f64;
        let hf = h as f64;

        // Roll is inverted and offset by 180°
        let yaw_r = self.yaw.value(frame_number) * PI / 180.0;
        let pitch_r = self.pitch.value(frame_number) * PI / 180.0;
        let roll_r = -self.roll.value(frame_number) * PI / 180.0 + PI;
        let fov_r = self.fov.value(frame_number) * PI / 180.0;

        // Composite rotation R = Ry(yaw) · Rx(pitch) · Rz(roll)
        let (sy, cy) = yaw_r.sin_cos();
        let (sp, cp) = pitch_r.sin_cos();
        let (sr, cr) = roll_r.sin_cos();

        let r00 = cy * cr + sy * sp * sr;
        let r01 = -cy * sr + sy * sp * cr;
        let r02 = sy * cp;
        let r10 = cp * sr;
        let r11 = cp * cr;
        let r12 = -sp;
        let r20 = -sy * cr + cy * sp * sr;
        let r21 = sy * sr + cy * sp * cr;
        let r22 = cy * cp;

        // Perspective scalars
        let hx = (fov_r * 0.5).tan();
        let vy = hx * hf / wf;

        let mode = self.projection_mode;
        let invert = self.invert;
        let filter = self.interpolation;
        let src = frame.image.clone();

        let mut output = ImageBuffer::new(w, h);
        let stride = w as usize * BYTES_PER_PIXEL;
        output
            .data_mut()
            .par_chunks_mut(stride)
            .enumerate()
            .for_each(|(yy, dst_row)| {
                let ndc_y = (2.0 * (yy as f64 + 0.5) / hf - 1.0) * vy;

                for xx in 0..w as usize {
                    // Ray in camera space
                    let ndc_x = (2.0 * (xx as f64 + 0.5) / wf - 1.0) * hx;
                    let (mut vx, mut vy2, mut vz) = (ndc_x, -ndc_y, -1.0);
                    let inv = 1.0 / (vx * vx + vy2 * vy2 + vz * vz).sqrt();
                    vx *= inv;
                    vy2 *= inv;
                    vz *= inv;

                    // Rotate into world coordinates
                    let mut dx = r00 * vx + r01 * vy2 + r02 * vz;
                    let dy = r10 * vx + r11 * vy2 + r12 * vz;
                    let mut dz = r20 * vx + r21 * vy2 + r22 * vz;

                    // Sphere/hemisphere invert flips the view by 180°
                    if mode != ProjectionMode::Fisheye && invert {
                        dx = -dx;
                        dz = -dz;
                    }

                    let (uf, vf) = match mode {
                        ProjectionMode::Fisheye => {
                            // Inverse circular fisheye around ±z
                            let az = if invert { -1.0 } else { 1.0 };
                            let theta = (dz * az).clamp(-1.0, 1.0).acos();
                            let rpx = (theta / fov_r) * (wf / 2.0);
                            let phi = dy.atan2(dx);
                            (wf * 0.5 + rpx * phi.cos(), hf * 0.5 + rpx * phi.sin())
                        }
                        ProjectionMode::Sphere => {
                            let lon = dx.atan2(dz);
                            let lat = dy.clamp(-1.0, 1.0).asin();
                            (
                                (lon + PI) / (2.0 * PI) * wf,
                                (lat + PI / 2.0) / PI * hf,
                            )
                        }
                        ProjectionMode::Hemisphere => {
                            let lon = dx.atan2(dz).clamp(-PI / 2.0, PI / 2.0);
                            let lat = dy.clamp(-1.0, 1.0).asin();
                            (
                                (lon + PI / 2.0) / PI * wf,
                                (lat + PI / 2.0) / PI * hf,
                            )
                        }
                    };

                    let d = &mut dst_row[xx * BYTES_PER_PIXEL..xx * BYTES_PER_PIXEL + 4];
                    match filter {
                        SampleFilter::Nearest => {
                            let px = src.pixel_clamped(uf.floor() as i64, vf.floor() as i64);
                            d.copy_from_slice(&px);
                        }
                        SampleFilter::Bilinear => {
                            let x0 = uf.floor() as i64;
                            let y0 = vf.floor() as i64;
                            let dxr = uf - uf.floor();
                            let dyr = vf - vf.floor();
                            let p00 = src.pixel_clamped(x0, y0);
                            let p10 = src.pixel_clamped(x0 + 1, y0);
                            let p01 = src.pixel_clamped(x0, y0 + 1);
                            let p11 = src.pixel_clamped(x0 + 1, y0 + 1);
                            for c in 0..4 {
                                let v0 = p00[c] as f64 * (1.0 - dxr) + p10[c] as f64 * dxr;
                                let v1 = p01[c] as f64 * (1.0 - dxr) + p11[c] as f64 * dxr;
                                d[c] = (v0 * (1.0 - dyr) + v1 * dyr + 0.5).clamp(0.0, 255.0) as u8;
                            }
                        }
                    }
                }
            });

        frame.image = output;
        frame
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Equirectangular fixture: eight vertical longitude stripes, each
    /// a distinct solid colour.
    fn stripe_frame(w: u32, h: u32) -> (VideoFrame, [[u8; 4]; 8]) {
        let colors: [[u8; 4]; 8] = [
            [255, 0, 0, 255],
            [0, 255, 0, 255],
            [0, 0, 255, 255],
            [255, 255, 0, 255],
            [0, 255, 255, 255],
            [255, 0, 255, 255],
            [128, 128, 128, 255],
            [255, 255, 255, 255],
        ];
        let mut frame = VideoFrame::new(1, w, h);
        for y in 0..h {
            for x in 0..w {
                let stripe = (x * 8 / w).min(7) as usize;
                frame.image.set_pixel(x, y, colors[stripe]);
            }
        }
        (frame, colors)
    }

    fn centre_pixel(frame: &VideoFrame) -> [u8; 4] {
        frame
            .image
            .pixel_clamped(frame.image.width() as i64 / 2, frame.image.height() as i64 / 2)
    }

    /// The stripe the centre ray lands in for a given yaw (degrees).
    /// With the default roll offset the centre ray maps to longitude
    /// `yaw − 180°`, i.e. source column `u = yaw/360 · W`.
    fn expected_stripe(yaw_deg: f64) -> usize {
        ((yaw_deg.rem_euclid(360.0) / 360.0 * 8.0) as usize).min(7)
    }

    #[test]
    fn test_sphere_centre_at_yaw_zero() {
        let (frame, colors) = stripe_frame(256, 128);
        let effect = SphericalProjection::default();
        let out = effect.apply(frame, 1);
        let expected = colors[expected_stripe(0.0)];
        assert_eq!(centre_pixel(&out), expected);
    }

    #[test]
    fn test_sphere_yaw_45_shifts_stripe() {
        let (frame, colors) = stripe_frame(256, 128);
        let mut effect = SphericalProjection::default();
        effect.yaw = Keyframe::constant(45.0);
        let out = effect.apply(frame, 1);
        let expected = colors[expected_stripe(45.0)];
        assert_eq!(centre_pixel(&out), expected);
    }

    #[test]
    fn test_invert_samples_antipode() {
        let (frame, colors) = stripe_frame(256, 128);
        let mut effect = SphericalProjection::default();
        effect.invert = true;
        let out = effect.apply(frame, 1);
        // 180° away from the non-inverted stripe
        let expected = colors[expected_stripe(180.0)];
        assert_eq!(centre_pixel(&out), expected);
    }

    #[test]
    fn test_bilinear_matches_nearest_on_solid() {
        let mut frame = VideoFrame::new(1, 64, 32);
        frame.image = reelkit_core::ImageBuffer::filled(64, 32, [7, 77, 177, 255]);

        let mut nearest = SphericalProjection::default();
        nearest.interpolation = SampleFilter::Nearest;
        let mut bilinear = SphericalProjection::default();
        bilinear.interpolation = SampleFilter::Bilinear;

        let out_n = nearest.apply(frame.clone(), 1);
        let out_b = bilinear.apply(frame, 1);
        assert_eq!(out_n.image.data(), out_b.image.data());
    }

    #[test]
    fn test_output_dimensions_preserved() {
        let (frame, _) = stripe_frame(128, 64);
        let mut effect = SphericalProjection::default();
        effect.projection_mode = ProjectionMode::Fisheye;
        let out = effect.apply(frame, 1);
        assert_eq!(out.image.width(), 128);
        assert_eq!(out.image.height(), 64);
    }

    #[test]
    fn test_hemisphere_clamps_longitude() {
        let (frame, _) = stripe_frame(128, 64);
        let mut effect = SphericalProjection::default();
        effect.projection_mode = ProjectionMode::Hemisphere;
        // Must not panic and must produce in-range samples everywhere
        let out = effect.apply(frame, 1);
        assert_eq!(out.image.width(), 128);
    }

    #[test]
    fn test_json_round_trip() {
        let mut effect = SphericalProjection::default();
        effect.projection_mode = ProjectionMode::Fisheye;
        effect.invert = true;
        effect.interpolation = SampleFilter::Bilinear;
        effect.yaw.set(5, 45.0, reelkit_core::Interpolation::Linear);
        let json = serde_json::to_value(&effect).unwrap();
        let back: SphericalProjection = serde_json::from_value(json).unwrap();
        assert_eq!(back.projection_mode, effect.projection_mode);
        assert_eq!(back.invert, effect.invert);
        assert_eq!(back.interpolation, effect.interpolation);
        assert_eq!(back.yaw.value(5), effect.yaw.value(5));
    }
}
