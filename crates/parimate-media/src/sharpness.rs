use parimate_types::Frame;

/// Variance of the 4-neighbour Laplacian over the luma plane. Blurry frames
/// score low.
pub fn laplacian_variance(frame: &Frame) -> f64 {
    let (w, h) = (frame.width, frame.height);
    if w < 3 || h < 3 {
        return 0.0;
    }
    let luma = frame.luma();
    let mut responses = Vec::with_capacity((w - 2) * (h - 2));
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let c = luma[y * w + x];
            let lap = luma[(y - 1) * w + x] + luma[(y + 1) * w + x] + luma[y * w + x - 1]
                + luma[y * w + x + 1]
                - 4.0 * c;
            responses.push(lap);
        }
    }
    let n = responses.len() as f64;
    let mean = responses.iter().sum::<f64>() / n;
    responses.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n
}

/// Keep the sharpest `fraction` of frames (at least one when any exist),
/// preserving their original order.
pub fn keep_sharpest(frames: Vec<Frame>, fraction: f64) -> Vec<Frame> {
    if frames.is_empty() {
        return frames;
    }
    let fraction = fraction.clamp(0.0, 1.0);
    let keep = ((frames.len() as f64 * fraction).floor() as usize).max(1);
    if keep >= frames.len() {
        return frames;
    }

    let mut ranked: Vec<(usize, f64)> = frames
        .iter()
        .enumerate()
        .map(|(i, f)| (i, laplacian_variance(f)))
        .collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));

    let mut chosen: Vec<usize> = ranked.into_iter().take(keep).map(|(i, _)| i).collect();
    chosen.sort_unstable();

    let mut chosen = chosen.into_iter().peekable();
    frames
        .into_iter()
        .enumerate()
        .filter_map(|(i, f)| {
            if chosen.peek() == Some(&i) {
                chosen.next();
                Some(f)
            } else {
                None
            }
        })
        .collect()
}
