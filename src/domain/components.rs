// ============================================================
// Layer 3 — Connected Components
// ============================================================
// Turns a per-pixel probability map into a list of detections.
//
//   1. Threshold: pixels with p > threshold are foreground
//   2. Label 4-connected foreground regions (iterative flood fill)
//   3. Report each region's centroid in (x, y) pixel coordinates
//
// Regions are reported in raster order of their first pixel, so
// the output is deterministic for a given map.

/// One detected region
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Component {
    pub x: f32,
    pub y: f32,
}

/// Label foreground regions of a row-major `width x height` map.
pub fn connected_components(
    probs:     &[f32],
    width:     usize,
    height:    usize,
    threshold: f32,
) -> Vec<Component> {
    assert_eq!(probs.len(), width * height, "probability map has wrong size");

    let mut visited    = vec![false; probs.len()];
    let mut components = Vec::new();
    let mut stack      = Vec::new();

    for start in 0..probs.len() {
        if visited[start] || probs[start] <= threshold {
            continue;
        }

        visited[start] = true;
        stack.push(start);

        let (mut sum_x, mut sum_y, mut pixels) = (0.0f64, 0.0f64, 0usize);

        while let Some(idx) = stack.pop() {
            let (x, y) = (idx % width, idx / width);
            sum_x  += x as f64;
            sum_y  += y as f64;
            pixels += 1;

            let mut visit = |n: usize| {
                if !visited[n] && probs[n] > threshold {
                    visited[n] = true;
                    stack.push(n);
                }
            };
            if x > 0          { visit(idx - 1); }
            if x + 1 < width  { visit(idx + 1); }
            if y > 0          { visit(idx - width); }
            if y + 1 < height { visit(idx + width); }
        }

        components.push(Component {
            x: (sum_x / pixels as f64) as f32,
            y: (sum_y / pixels as f64) as f32,
        });
    }

    components
}

/// Centroids only, as (x, y) pairs
pub fn centroids(probs: &[f32], width: usize, height: usize, threshold: f32) -> Vec<(f32, f32)> {
    connected_components(probs, width, height, threshold)
        .into_iter()
        .map(|c| (c.x, c.y))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_separate_blobs() {
        // 5x3 map: blob at top-left (2 px), blob at right column (3 px)
        #[rustfmt::skip]
        let probs = vec![
            0.9, 0.8, 0.0, 0.0, 0.7,
            0.0, 0.0, 0.0, 0.0, 0.7,
            0.0, 0.0, 0.0, 0.0, 0.7,
        ];
        let comps = connected_components(&probs, 5, 3, 0.5);
        assert_eq!(comps.len(), 2);
        assert_eq!(comps[0], Component { x: 0.5, y: 0.0 });
        assert_eq!(comps[1], Component { x: 4.0, y: 1.0 });
    }

    #[test]
    fn test_diagonal_pixels_are_not_connected() {
        let probs = vec![1.0, 0.0, 0.0, 1.0];
        assert_eq!(connected_components(&probs, 2, 2, 0.5).len(), 2);
    }

    #[test]
    fn test_threshold_is_exclusive() {
        let probs = vec![0.05, 0.05, 0.06, 0.0];
        let c = centroids(&probs, 2, 2, 0.05);
        assert_eq!(c, vec![(0.0, 1.0)]);
    }

    #[test]
    fn test_empty_map() {
        assert!(connected_components(&[0.0; 16], 4, 4, 0.5).is_empty());
    }
}
