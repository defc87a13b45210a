use parimate_types::{Frame, ReflectionConfig};

use crate::mask::Mask;

/// HSV value channel: the brightest of the three components.
pub fn hsv_value(rgb: [u8; 3]) -> u8 {
    rgb[0].max(rgb[1]).max(rgb[2])
}

/// Specular highlights and pupil pixels inside the iris.
pub fn extract_reflection(image: &Frame, iris: &Mask, config: &ReflectionConfig) -> Mask {
    Mask::from_fn(iris.width, iris.height, |x, y| {
        if !iris.get(x, y) || x >= image.width || y >= image.height {
            return false;
        }
        let v = hsv_value(image.pixel(x, y));
        v >= config.highlight_level || v <= config.pupil_level
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hsv_value() {
        assert_eq!(hsv_value([10, 200, 30]), 200);
        assert_eq!(hsv_value([0, 0, 0]), 0);
    }

    #[test]
    fn test_keeps_bright_and_dark_iris_pixels() {
        let mut image = Frame::filled(4, 1, [100, 100, 100]);
        image.set_pixel(0, 0, [250, 250, 250]);
        image.set_pixel(1, 0, [20, 20, 20]);
        image.set_pixel(3, 0, [250, 250, 250]);
        let iris = Mask::from_fn(4, 1, |x, _| x < 3);

        let reflection = extract_reflection(&image, &iris, &ReflectionConfig::default());
        assert!(reflection.get(0, 0));
        assert!(reflection.get(1, 0));
        assert!(!reflection.get(2, 0));
        assert!(!reflection.get(3, 0), "outside the iris");
    }
}
