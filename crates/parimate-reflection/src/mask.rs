use parimate_types::Rect;

use crate::landmarks::Point;

/// Binary raster, row major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mask {
    pub width: usize,
    pub height: usize,
    bits: Vec<bool>,
}

impl Mask {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            bits: vec![false; width * height],
        }
    }

    /// Build from a predicate over pixel coordinates.
    pub fn from_fn(width: usize, height: usize, f: impl Fn(usize, usize) -> bool) -> Self {
        let mut mask = Self::new(width, height);
        for y in 0..height {
            for x in 0..width {
                if f(x, y) {
                    mask.bits[y * width + x] = true;
                }
            }
        }
        mask
    }

    pub fn get(&self, x: usize, y: usize) -> bool {
        x < self.width && y < self.height && self.bits[y * self.width + x]
    }

    /// Signed lookup; anything outside the raster is unset.
    pub fn get_signed(&self, x: isize, y: isize) -> bool {
        x >= 0 && y >= 0 && self.get(x as usize, y as usize)
    }

    pub fn set(&mut self, x: usize, y: usize, value: bool) {
        if x < self.width && y < self.height {
            self.bits[y * self.width + x] = value;
        }
    }

    pub fn count(&self) -> usize {
        self.bits.iter().filter(|b| **b).count()
    }

    pub fn is_empty(&self) -> bool {
        !self.bits.iter().any(|b| *b)
    }

    pub fn and(&self, other: &Mask) -> Mask {
        Mask::from_fn(self.width, self.height, |x, y| {
            self.get(x, y) && other.get(x, y)
        })
    }

    /// Tight bounding box of set pixels, exclusive upper corner.
    pub fn bbox(&self) -> Option<Rect> {
        let mut rect: Option<Rect> = None;
        for y in 0..self.height {
            for x in 0..self.width {
                if !self.get(x, y) {
                    continue;
                }
                let r = rect.get_or_insert(Rect {
                    x0: x,
                    y0: y,
                    x1: x + 1,
                    y1: y + 1,
                });
                r.x0 = r.x0.min(x);
                r.y0 = r.y0.min(y);
                r.x1 = r.x1.max(x + 1);
                r.y1 = r.y1.max(y + 1);
            }
        }
        rect
    }

    /// Mean coordinate of set pixels.
    pub fn centroid(&self) -> Option<(f64, f64)> {
        let (mut sx, mut sy, mut n) = (0.0, 0.0, 0usize);
        for y in 0..self.height {
            for x in 0..self.width {
                if self.get(x, y) {
                    sx += x as f64;
                    sy += y as f64;
                    n += 1;
                }
            }
        }
        (n > 0).then(|| (sx / n as f64, sy / n as f64))
    }

    /// Strip `depth` rings of boundary pixels. A pixel survives a pass only
    /// when its four neighbours are set; the raster edge counts as unset.
    pub fn erode(&self, depth: usize) -> Mask {
        let mut current = self.clone();
        for _ in 0..depth {
            let prev = current.clone();
            current = Mask::from_fn(self.width, self.height, |x, y| {
                let (x, y) = (x as isize, y as isize);
                prev.get_signed(x, y)
                    && prev.get_signed(x - 1, y)
                    && prev.get_signed(x + 1, y)
                    && prev.get_signed(x, y - 1)
                    && prev.get_signed(x, y + 1)
            });
        }
        current
    }

    /// Translate by `(dx, dy)`; vacated pixels are unset.
    pub fn shifted(&self, dx: isize, dy: isize) -> Mask {
        Mask::from_fn(self.width, self.height, |x, y| {
            self.get_signed(x as isize - dx, y as isize - dy)
        })
    }

    /// Grow the raster to `width × height`, new area unset.
    pub fn padded(&self, width: usize, height: usize) -> Mask {
        let width = width.max(self.width);
        let height = height.max(self.height);
        Mask::from_fn(width, height, |x, y| self.get(x, y))
    }

    /// Filled disc clipped to the raster.
    pub fn disc(width: usize, height: usize, cx: f64, cy: f64, radius: f64) -> Mask {
        let r2 = radius * radius;
        Mask::from_fn(width, height, |x, y| {
            let (dx, dy) = (x as f64 - cx, y as f64 - cy);
            dx * dx + dy * dy <= r2
        })
    }

    /// Rasterize the convex hull of `points`, boundary included.
    /// Fewer than three non-collinear points yield an empty mask.
    pub fn convex_fill(width: usize, height: usize, points: &[Point]) -> Mask {
        let hull = convex_hull(points);
        if hull.len() < 3 {
            return Mask::new(width, height);
        }
        Mask::from_fn(width, height, |x, y| {
            let p = Point::new(x as f64, y as f64);
            hull.iter()
                .zip(hull.iter().cycle().skip(1))
                .all(|(a, b)| cross(*a, *b, p) >= -1e-9)
        })
    }
}

fn cross(o: Point, a: Point, b: Point) -> f64 {
    (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x)
}

/// Counter-clockwise hull (monotone chain), collinear points dropped.
pub fn convex_hull(points: &[Point]) -> Vec<Point> {
    let mut pts: Vec<Point> = points
        .iter()
        .map(|p| Point::new(p.x.round(), p.y.round()))
        .collect();
    pts.sort_by(|a, b| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y)));
    pts.dedup();
    if pts.len() < 3 {
        return pts;
    }

    let mut lower: Vec<Point> = Vec::new();
    for p in &pts {
        while lower.len() >= 2 && cross(lower[lower.len() - 2], lower[lower.len() - 1], *p) <= 0.0 {
            lower.pop();
        }
        lower.push(*p);
    }
    let mut upper: Vec<Point> = Vec::new();
    for p in pts.iter().rev() {
        while upper.len() >= 2 && cross(upper[upper.len() - 2], upper[upper.len() - 1], *p) <= 0.0 {
            upper.pop();
        }
        upper.push(*p);
    }
    lower.pop();
    upper.pop();
    lower.extend(upper);
    lower
}
