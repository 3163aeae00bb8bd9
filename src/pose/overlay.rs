//! Skeleton overlay for echoed frames

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::codecs::jpeg::JpegEncoder;
use image::{Rgb, RgbImage};

use crate::analysis::landmarks::SKELETON;
use crate::analysis::{Landmark, LandmarkSet};
use crate::assets::{JOINT_RADIUS, SKELETON_COLOR};
use crate::session::SessionError;

/// Draw detected joints and bones onto `image` in place
pub fn annotate(image: &mut RgbImage, landmarks: &LandmarkSet, min_visibility: f32) {
    let color = Rgb(SKELETON_COLOR);

    for (from, to) in SKELETON {
        if let (Some(a), Some(b)) = (
            landmarks.point(from, min_visibility),
            landmarks.point(to, min_visibility),
        ) {
            let (x0, y0) = to_pixel(image, a);
            let (x1, y1) = to_pixel(image, b);
            draw_line(image, x0, y0, x1, y1, color);
        }
    }

    for landmark in landmarks.iter().flatten() {
        if landmark.is_finite() && landmark.visibility >= min_visibility {
            let (x, y) = to_pixel(image, *landmark);
            draw_dot(image, x, y, JOINT_RADIUS, color);
        }
    }
}

/// JPEG encode and wrap as a data URI the browser can display directly
pub fn encode_data_uri(image: &RgbImage, quality: u8) -> Result<String, SessionError> {
    let mut buf = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100));
    image
        .write_with_encoder(encoder)
        .map_err(|e| SessionError::Decode(format!("could not encode frame: {}", e)))?;
    Ok(format!("data:image/jpeg;base64,{}", STANDARD.encode(buf)))
}

/// Normalized coordinates further out than one frame are pinned there
const COORD_MARGIN: f32 = 1.0;

fn to_pixel(image: &RgbImage, landmark: Landmark) -> (i64, i64) {
    let bound = |v: f32| v.clamp(-COORD_MARGIN, 1.0 + COORD_MARGIN);
    let x = (bound(landmark.x) * image.width() as f32).round() as i64;
    let y = (bound(landmark.y) * image.height() as f32).round() as i64;
    (x, y)
}

fn put(image: &mut RgbImage, x: i64, y: i64, color: Rgb<u8>) {
    if x >= 0 && y >= 0 && (x as u32) < image.width() && (y as u32) < image.height() {
        image.put_pixel(x as u32, y as u32, color);
    }
}

// Bresenham, clipped per pixel
fn draw_line(image: &mut RgbImage, x0: i64, y0: i64, x1: i64, y1: i64, color: Rgb<u8>) {
    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let (mut x, mut y) = (x0, y0);
    let mut err = dx + dy;

    loop {
        put(image, x, y, color);
        if x == x1 && y == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x += sx;
        }
        if e2 <= dx {
            err += dx;
            y += sy;
        }
    }
}

fn draw_dot(image: &mut RgbImage, cx: i64, cy: i64, radius: i64, color: Rgb<u8>) {
    for y in (cy - radius)..=(cy + radius) {
        for x in (cx - radius)..=(cx + radius) {
            if (x - cx).pow(2) + (y - cy).pow(2) <= radius * radius {
                put(image, x, y, color);
            }
        }
    }
}
