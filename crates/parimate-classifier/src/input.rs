use parimate_types::Frame;

/// One frame resized to the model's square input, RGB scaled to `[0, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifierInput {
    pub side: usize,
    /// `side × side × 3` values, row major.
    pub pixels: Vec<f32>,
}

/// Bilinear resize to `side × side` with pixel-centre alignment.
/// Returns `None` for an empty frame or a zero side.
pub fn prepare(frame: &Frame, side: usize) -> Option<ClassifierInput> {
    if frame.is_empty() || side == 0 {
        return None;
    }
    let sx = frame.width as f64 / side as f64;
    let sy = frame.height as f64 / side as f64;
    let max_x = (frame.width - 1) as f64;
    let max_y = (frame.height - 1) as f64;

    let mut pixels = Vec::with_capacity(side * side * 3);
    for oy in 0..side {
        let fy = ((oy as f64 + 0.5) * sy - 0.5).clamp(0.0, max_y);
        let y0 = fy.floor() as usize;
        let y1 = (y0 + 1).min(frame.height - 1);
        let ty = fy - y0 as f64;
        for ox in 0..side {
            let fx = ((ox as f64 + 0.5) * sx - 0.5).clamp(0.0, max_x);
            let x0 = fx.floor() as usize;
            let x1 = (x0 + 1).min(frame.width - 1);
            let tx = fx - x0 as f64;

            let (a, b) = (frame.pixel(x0, y0), frame.pixel(x1, y0));
            let (c, d) = (frame.pixel(x0, y1), frame.pixel(x1, y1));
            for ch in 0..3 {
                let top = a[ch] as f64 * (1.0 - tx) + b[ch] as f64 * tx;
                let bottom = c[ch] as f64 * (1.0 - tx) + d[ch] as f64 * tx;
                let v = top * (1.0 - ty) + bottom * ty;
                pixels.push((v / 255.0) as f32);
            }
        }
    }
    Some(ClassifierInput { side, pixels })
}
