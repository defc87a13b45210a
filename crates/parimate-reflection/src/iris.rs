use parimate_types::{DetectionError, Frame, ReflectionConfig};

use crate::mask::Mask;

const CANNY_SIGMA: f64 = 2.0;
const CANNY_LOW: f64 = 40.0;
const CANNY_HIGH: f64 = 70.0;
/// Edges this close to the corneal outline are the outline itself.
const BOUNDARY_BAND: usize = 2;

/// Single-channel float raster.
#[derive(Debug, Clone, PartialEq)]
pub struct Plane {
    pub width: usize,
    pub height: usize,
    pub data: Vec<f64>,
}

impl Plane {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0.0; width * height],
        }
    }

    pub fn at(&self, x: usize, y: usize) -> f64 {
        self.data[y * self.width + x]
    }

    /// Lookup with coordinates clamped to the raster.
    fn at_clamped(&self, x: isize, y: isize) -> f64 {
        let x = x.clamp(0, self.width as isize - 1) as usize;
        let y = y.clamp(0, self.height as isize - 1) as usize;
        self.at(x, y)
    }
}

fn srgb_to_linear(c: u8) -> f64 {
    let c = c as f64 / 255.0;
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

/// CIE L* of each pixel, scaled to `0..=255`.
pub fn lab_lightness(frame: &Frame) -> Plane {
    let data = frame
        .data
        .chunks_exact(3)
        .map(|p| {
            let y = 0.212_671 * srgb_to_linear(p[0])
                + 0.715_160 * srgb_to_linear(p[1])
                + 0.072_169 * srgb_to_linear(p[2]);
            let l = if y > 0.008_856 {
                116.0 * y.cbrt() - 16.0
            } else {
                903.3 * y
            };
            l * 255.0 / 100.0
        })
        .collect();
    Plane {
        width: frame.width,
        height: frame.height,
        data,
    }
}

/// Separable Gaussian blur, kernel truncated at four sigma.
pub fn gaussian_blur(plane: &Plane, sigma: f64) -> Plane {
    if plane.width == 0 || plane.height == 0 || sigma <= 0.0 {
        return plane.clone();
    }
    let radius = (4.0 * sigma).ceil() as isize;
    let mut kernel: Vec<f64> = (-radius..=radius)
        .map(|i| (-(i * i) as f64 / (2.0 * sigma * sigma)).exp())
        .collect();
    let total: f64 = kernel.iter().sum();
    kernel.iter_mut().for_each(|k| *k /= total);

    let mut horizontal = Plane::new(plane.width, plane.height);
    for y in 0..plane.height {
        for x in 0..plane.width {
            horizontal.data[y * plane.width + x] = kernel
                .iter()
                .enumerate()
                .map(|(i, k)| k * plane.at_clamped(x as isize + i as isize - radius, y as isize))
                .sum();
        }
    }
    let mut out = Plane::new(plane.width, plane.height);
    for y in 0..plane.height {
        for x in 0..plane.width {
            out.data[y * plane.width + x] = kernel
                .iter()
                .enumerate()
                .map(|(i, k)| {
                    k * horizontal.at_clamped(x as isize, y as isize + i as isize - radius)
                })
                .sum();
        }
    }
    out
}

/// Canny edge detector: Gaussian smoothing, Sobel gradient, non-maximum
/// suppression and hysteresis between `low` and `high` magnitudes.
pub fn canny(plane: &Plane, sigma: f64, low: f64, high: f64) -> Mask {
    let (w, h) = (plane.width, plane.height);
    let mut edges = Mask::new(w, h);
    if w < 3 || h < 3 {
        return edges;
    }
    let smooth = gaussian_blur(plane, sigma);

    let mut gx = vec![0.0; w * h];
    let mut gy = vec![0.0; w * h];
    let mut magnitude = vec![0.0; w * h];
    for y in 0..h {
        for x in 0..w {
            let p = |dx: isize, dy: isize| smooth.at_clamped(x as isize + dx, y as isize + dy);
            let sx = (p(1, -1) + 2.0 * p(1, 0) + p(1, 1)) - (p(-1, -1) + 2.0 * p(-1, 0) + p(-1, 1));
            let sy = (p(-1, 1) + 2.0 * p(0, 1) + p(1, 1)) - (p(-1, -1) + 2.0 * p(0, -1) + p(1, -1));
            let i = y * w + x;
            gx[i] = sx;
            gy[i] = sy;
            magnitude[i] = sx.hypot(sy);
        }
    }

    let mag = |x: isize, y: isize| {
        if x < 0 || y < 0 || x >= w as isize || y >= h as isize {
            0.0
        } else {
            magnitude[y as usize * w + x as usize]
        }
    };

    // Thin to local maxima along the gradient direction.
    let mut thin = vec![0.0; w * h];
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let i = y * w + x;
            let m = magnitude[i];
            if m < low {
                continue;
            }
            let angle = gy[i].atan2(gx[i]).to_degrees().rem_euclid(180.0);
            let (dx, dy) = if !(22.5..157.5).contains(&angle) {
                (1, 0)
            } else if angle < 67.5 {
                (1, 1)
            } else if angle < 112.5 {
                (0, 1)
            } else {
                (-1, 1)
            };
            let (xi, yi) = (x as isize, y as isize);
            if m >= mag(xi + dx, yi + dy) && m >= mag(xi - dx, yi - dy) {
                thin[i] = m;
            }
        }
    }

    // Hysteresis: grow strong edges through connected weak ones.
    let mut stack: Vec<(usize, usize)> = Vec::new();
    for y in 0..h {
        for x in 0..w {
            if thin[y * w + x] >= high {
                edges.set(x, y, true);
                stack.push((x, y));
            }
        }
    }
    while let Some((x, y)) = stack.pop() {
        for ny in y.saturating_sub(1)..=(y + 1).min(h - 1) {
            for nx in x.saturating_sub(1)..=(x + 1).min(w - 1) {
                if !edges.get(nx, ny) && thin[ny * w + nx] >= low {
                    edges.set(nx, ny, true);
                    stack.push((nx, ny));
                }
            }
        }
    }
    edges
}

/// Strongest circle in an edge map over the given radii.
///
/// Votes are normalised by the circumference of each radius so that
/// small and large circles compete fairly. Returns `(cx, cy, r)` or `None`
/// when there are no edges or no radii.
pub fn hough_circle(edges: &Mask, radii: std::ops::Range<usize>) -> Option<(usize, usize, usize)> {
    let (w, h) = (edges.width, edges.height);
    let points: Vec<(isize, isize)> = (0..h)
        .flat_map(|y| (0..w).map(move |x| (x, y)))
        .filter(|&(x, y)| edges.get(x, y))
        .map(|(x, y)| (x as isize, y as isize))
        .collect();
    if points.is_empty() {
        return None;
    }

    let mut best: Option<(f64, usize, usize, usize)> = None;
    let mut accumulator = vec![0u32; w * h];
    for r in radii.filter(|r| *r > 0) {
        let ring = ring_offsets(r);
        accumulator.iter_mut().for_each(|a| *a = 0);
        for &(px, py) in &points {
            for &(ox, oy) in &ring {
                let (cx, cy) = (px + ox, py + oy);
                if cx >= 0 && cy >= 0 && (cx as usize) < w && (cy as usize) < h {
                    accumulator[cy as usize * w + cx as usize] += 1;
                }
            }
        }
        for (i, votes) in accumulator.iter().enumerate() {
            if *votes == 0 {
                continue;
            }
            let score = *votes as f64 / ring.len() as f64;
            if best.is_none_or(|(s, ..)| score > s) {
                best = Some((score, i % w, i / w, r));
            }
        }
    }
    best.map(|(_, cx, cy, r)| (cx, cy, r))
}

/// Integer offsets lying on a one pixel wide ring of radius `r`.
fn ring_offsets(r: usize) -> Vec<(isize, isize)> {
    let r = r as isize;
    let mut ring = Vec::new();
    for dy in -r - 1..=r + 1 {
        for dx in -r - 1..=r + 1 {
            let d = ((dx * dx + dy * dy) as f64).sqrt();
            if (d - r as f64).abs() < 0.5 {
                ring.push((dx, dy));
            }
        }
    }
    ring
}

/// Iris location within an eye crop.
#[derive(Debug, Clone)]
pub struct IrisSegment {
    /// Iris pixels, clipped to the cornea, in crop coordinates.
    pub mask: Mask,
    pub center: (f64, f64),
    pub radius: f64,
    /// Whether the circle came from the Hough search rather than the
    /// centroid fallback.
    pub from_hough: bool,
}

/// Locate the iris inside the corneal mask of an eye crop.
pub fn segment_iris(
    image: &Frame,
    cornea: &Mask,
    config: &ReflectionConfig,
) -> Result<IrisSegment, DetectionError> {
    let bbox = cornea.bbox().ok_or(DetectionError::EmptyCornea)?;
    let roi = image.crop(bbox);
    let roi_mask = Mask::from_fn(bbox.width(), bbox.height(), |x, y| {
        cornea.get(x + bbox.x0, y + bbox.y0)
    });

    let mut lightness = lab_lightness(&roi);
    for y in 0..roi.height {
        for x in 0..roi.width {
            if !roi_mask.get(x, y) {
                lightness.data[y * roi.width + x] = 0.0;
            }
        }
    }
    let edges = canny(&lightness, CANNY_SIGMA, CANNY_LOW, CANNY_HIGH)
        .and(&roi_mask.erode(BOUNDARY_BAND));

    let diam = (bbox.width() - 1) as f64;
    let r_min = (diam / config.radius_min_scale) as usize;
    let r_max = (diam / config.radius_max_scale) as usize;

    let (center, radius, from_hough) = match hough_circle(&edges, r_min..r_max) {
        Some((cx, cy, r)) => (
            ((cx + bbox.x0) as f64, (cy + bbox.y0) as f64),
            r as f64,
            true,
        ),
        None => {
            let centroid = cornea.centroid().ok_or(DetectionError::EmptyCornea)?;
            (centroid, (diam / 4.0).floor(), false)
        }
    };

    let mask = Mask::disc(cornea.width, cornea.height, center.0, center.1, radius).and(cornea);
    if mask.is_empty() {
        return Err(DetectionError::EmptyIris);
    }
    Ok(IrisSegment {
        mask,
        center,
        radius,
        from_hough,
    })
}
