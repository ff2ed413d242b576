// ============================================================
// Layer 6 — Debug Image Rendering
// ============================================================
// Builds the collage written to the test summary stream:
//
//   ┌──────────────┬──────────────┐
//   │ input RGB    │ probability  │   ← one row per test image
//   ├──────────────┼──────────────┤
//   │ ...          │ ...          │
//   └──────────────┴──────────────┘
//
// Probability maps are drawn in grey. Predicted centroids are
// marked red and labelled points green.

use image::{imageops, Rgb, RgbImage};

pub const PREDICTED_COLOUR: Rgb<u8> = Rgb([255, 0, 0]);
pub const LABELLED_COLOUR:  Rgb<u8> = Rgb([0, 255, 0]);

/// Grey rendering of a row-major probability map in [0, 1]
pub fn probability_map(probs: &[f32], width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        let p = probs
            .get((y * width + x) as usize)
            .copied()
            .unwrap_or(0.0)
            .clamp(0.0, 1.0);
        let v = (p * 255.0).round() as u8;
        Rgb([v, v, v])
    })
}

/// Draw a small cross at each point, clipped to the image
pub fn mark_points(img: &mut RgbImage, points: &[(f32, f32)], colour: Rgb<u8>) {
    let (w, h) = (img.width() as i64, img.height() as i64);
    for &(px, py) in points {
        let (cx, cy) = (px.round() as i64, py.round() as i64);
        for d in -2..=2i64 {
            for (x, y) in [(cx + d, cy), (cx, cy + d)] {
                if (0..w).contains(&x) && (0..h).contains(&y) {
                    img.put_pixel(x as u32, y as u32, colour);
                }
            }
        }
    }
}

/// Place `left` and `right` next to each other, top aligned
pub fn side_by_side(left: &RgbImage, right: &RgbImage) -> RgbImage {
    let width  = left.width() + right.width();
    let height = left.height().max(right.height());
    let mut out = RgbImage::new(width, height);
    imageops::replace(&mut out, left, 0, 0);
    imageops::replace(&mut out, right, left.width() as i64, 0);
    out
}

/// Stack rows top to bottom. An empty input gives a 1x1 black image.
pub fn stack_vertically(rows: &[RgbImage]) -> RgbImage {
    if rows.is_empty() {
        return RgbImage::new(1, 1);
    }

    let width  = rows.iter().map(|r| r.width()).max().unwrap_or(1);
    let height = rows.iter().map(|r| r.height()).sum();
    let mut out = RgbImage::new(width, height);

    let mut y = 0i64;
    for row in rows {
        imageops::replace(&mut out, row, 0, y);
        y += row.height() as i64;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probability_map_scales_to_grey() {
        let img = probability_map(&[0.0, 1.0, 0.5, 2.0], 2, 2);
        assert_eq!(img.get_pixel(0, 0), &Rgb([0, 0, 0]));
        assert_eq!(img.get_pixel(1, 0), &Rgb([255, 255, 255]));
        assert_eq!(img.get_pixel(0, 1), &Rgb([128, 128, 128]));
        assert_eq!(img.get_pixel(1, 1), &Rgb([255, 255, 255]));
    }

    #[test]
    fn test_collage_layout() {
        let a = RgbImage::from_pixel(4, 3, Rgb([10, 0, 0]));
        let b = RgbImage::from_pixel(4, 3, Rgb([0, 20, 0]));
        let row = side_by_side(&a, &b);
        assert_eq!(row.dimensions(), (8, 3));
        assert_eq!(row.get_pixel(5, 1), &Rgb([0, 20, 0]));

        let collage = stack_vertically(&[row.clone(), row]);
        assert_eq!(collage.dimensions(), (8, 6));
        assert_eq!(collage.get_pixel(0, 4), &Rgb([10, 0, 0]));
        assert_eq!(stack_vertically(&[]).dimensions(), (1, 1));
    }

    #[test]
    fn test_marks_are_clipped() {
        let mut img = RgbImage::new(3, 3);
        mark_points(&mut img, &[(0.0, 0.0), (-10.0, 50.0)], PREDICTED_COLOUR);
        assert_eq!(img.get_pixel(0, 0), &PREDICTED_COLOUR);
        assert_eq!(img.get_pixel(2, 0), &PREDICTED_COLOUR);
        assert_eq!(img.get_pixel(2, 2), &Rgb([0, 0, 0]));
    }
}
