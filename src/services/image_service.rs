//! Pixel transforms applied by the worker to every uploaded image.
//!
//! All transforms operate on 8-bit RGB buffers. Input of any other layout is
//! normalized by [`decode_rgb`] before it reaches them.

use image::{DynamicImage, GrayImage, ImageFormat, Luma, RgbImage, imageops};
use std::io::Cursor;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("failed to decode image: {0}")]
    Decode(#[source] image::ImageError),
    #[error("failed to encode image as {format:?}: {source}")]
    Encode {
        format: ImageFormat,
        #[source]
        source: image::ImageError,
    },
    #[error("image is empty ({width}x{height})")]
    Empty { width: u32, height: u32 },
}

pub type ImageResult<T> = Result<T, ImageError>;

/// Which RGB channel a channel-isolated image keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Red = 0,
    Green = 1,
    Blue = 2,
}

/// Decode raw bytes into an RGB buffer, converting from whatever color type
/// the source uses (alpha is dropped, grayscale expanded).
pub fn decode_rgb(data: &[u8]) -> ImageResult<RgbImage> {
    let img = image::load_from_memory(data).map_err(ImageError::Decode)?;
    if img.width() == 0 || img.height() == 0 {
        return Err(ImageError::Empty {
            width: img.width(),
            height: img.height(),
        });
    }
    Ok(img.to_rgb8())
}

/// Copy of `img` with every channel except `keep` set to zero.
pub fn isolate_channel(img: &RgbImage, keep: Channel) -> RgbImage {
    let keep = keep as usize;
    let mut out = img.clone();
    for pixel in out.pixels_mut() {
        for (idx, value) in pixel.0.iter_mut().enumerate() {
            if idx != keep {
                *value = 0;
            }
        }
    }
    out
}

/// Red, green and blue isolations of `img`, in that order.
pub fn create_channel_images(img: &RgbImage) -> (RgbImage, RgbImage, RgbImage) {
    (
        isolate_channel(img, Channel::Red),
        isolate_channel(img, Channel::Green),
        isolate_channel(img, Channel::Blue),
    )
}

/// Single-channel luma using the ITU-R 601-2 weights, rounded to nearest.
pub fn create_bw_image(img: &RgbImage) -> GrayImage {
    GrayImage::from_fn(img.width(), img.height(), |x, y| {
        let [r, g, b] = img.get_pixel(x, y).0;
        Luma([luma(r, g, b)])
    })
}

fn luma(r: u8, g: u8, b: u8) -> u8 {
    // 0.299, 0.587, 0.114 in 16.16 fixed point
    let weighted = u32::from(r) * 19595 + u32::from(g) * 38470 + u32::from(b) * 7471;
    ((weighted + 0x8000) >> 16) as u8
}

/// `255 - value` on every channel.
pub fn create_inverted_image(img: &RgbImage) -> RgbImage {
    let mut out = img.clone();
    imageops::invert(&mut out);
    out
}

/// Hue, saturation and value planes of `img`, each sorted in descending order
/// and laid back out row-major at the source dimensions.
///
/// Not part of the default pipeline; the worker runs it only when the
/// sorted-HSV extension is switched on.
pub fn create_sorted_hsv_images(img: &RgbImage) -> (GrayImage, GrayImage, GrayImage) {
    let count = (img.width() * img.height()) as usize;
    let mut hues = Vec::with_capacity(count);
    let mut saturations = Vec::with_capacity(count);
    let mut values = Vec::with_capacity(count);

    for pixel in img.pixels() {
        let [h, s, v] = rgb_to_hsv(pixel.0);
        hues.push(h);
        saturations.push(s);
        values.push(v);
    }

    let plane = |mut samples: Vec<u8>| {
        samples.sort_unstable_by(|a, b| b.cmp(a));
        GrayImage::from_raw(img.width(), img.height(), samples)
            .unwrap_or_else(|| GrayImage::new(img.width(), img.height()))
    };

    (plane(hues), plane(saturations), plane(values))
}

/// RGB to HSV with every component scaled to `0..=255`.
fn rgb_to_hsv([r, g, b]: [u8; 3]) -> [u8; 3] {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    if max == min {
        return [0, 0, max];
    }

    let delta = f32::from(max - min);
    let saturation = (delta * 255.0 / f32::from(max)).round() as u8;

    let (r, g, b) = (f32::from(r), f32::from(g), f32::from(b));
    let max_f = f32::from(max);
    let sector = if max_f == r {
        (g - b) / delta
    } else if max_f == g {
        2.0 + (b - r) / delta
    } else {
        4.0 + (r - g) / delta
    };
    let hue = (sector / 6.0).rem_euclid(1.0);

    [(hue * 255.0).round() as u8, saturation, max]
}

/// Encode any buffer as a JPEG byte vector.
pub fn encode_jpeg(img: DynamicImage) -> ImageResult<Vec<u8>> {
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Jpeg)
        .map_err(|source| ImageError::Encode {
            format: ImageFormat::Jpeg,
            source,
        })?;
    Ok(buf.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn sample() -> RgbImage {
        RgbImage::from_fn(7, 5, |x, y| {
            Rgb([(x * 37) as u8, (y * 51) as u8, ((x + y) * 19) as u8])
        })
    }

    #[test]
    fn channel_images_keep_only_their_channel() {
        let img = sample();
        let (red, green, blue) = create_channel_images(&img);

        for ((src, r), (g, b)) in img
            .pixels()
            .zip(red.pixels())
            .zip(green.pixels().zip(blue.pixels()))
        {
            assert_eq!(r.0, [src.0[0], 0, 0]);
            assert_eq!(g.0, [0, src.0[1], 0]);
            assert_eq!(b.0, [0, 0, src.0[2]]);
        }
        assert_eq!(red.dimensions(), img.dimensions());
    }

    #[test]
    fn inversion_is_an_involution() {
        let img = sample();
        let inverted = create_inverted_image(&img);
        assert_eq!(inverted.get_pixel(1, 1).0, {
            let [r, g, b] = img.get_pixel(1, 1).0;
            [255 - r, 255 - g, 255 - b]
        });
        assert_eq!(create_inverted_image(&inverted), img);
    }

    #[test]
    fn bw_has_one_channel_per_pixel() {
        let img = sample();
        let bw = create_bw_image(&img);
        assert_eq!(bw.dimensions(), img.dimensions());
        assert_eq!(bw.as_raw().len(), (img.width() * img.height()) as usize);
    }

    #[test]
    fn luma_matches_reference_weights() {
        assert_eq!(luma(0, 0, 0), 0);
        assert_eq!(luma(255, 255, 255), 255);
        assert_eq!(luma(255, 0, 0), 76);
        assert_eq!(luma(0, 255, 0), 150);
        assert_eq!(luma(0, 0, 255), 29);
    }

    #[test]
    fn decode_normalizes_to_rgb() {
        let rgba = image::RgbaImage::from_pixel(3, 2, image::Rgba([10, 20, 30, 40]));
        let mut png = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(rgba)
            .write_to(&mut png, ImageFormat::Png)
            .unwrap();

        let rgb = decode_rgb(png.get_ref()).unwrap();
        assert_eq!(rgb.dimensions(), (3, 2));
        assert_eq!(rgb.get_pixel(0, 0).0, [10, 20, 30]);

        let gray = GrayImage::from_pixel(2, 2, Luma([99]));
        let mut png = Cursor::new(Vec::new());
        DynamicImage::ImageLuma8(gray)
            .write_to(&mut png, ImageFormat::Png)
            .unwrap();
        assert_eq!(decode_rgb(png.get_ref()).unwrap().get_pixel(1, 1).0, [99, 99, 99]);
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(matches!(
            decode_rgb(b"definitely not an image"),
            Err(ImageError::Decode(_))
        ));
    }

    #[test]
    fn sorted_hsv_planes_are_descending() {
        let img = sample();
        let (hue, sat, val) = create_sorted_hsv_images(&img);
        for plane in [&hue, &sat, &val] {
            assert_eq!(plane.dimensions(), img.dimensions());
            assert!(plane.as_raw().windows(2).all(|w| w[0] >= w[1]));
        }
        let max_value = img.pixels().map(|p| *p.0.iter().max().unwrap()).max().unwrap();
        assert_eq!(val.as_raw()[0], max_value);
    }

    #[test]
    fn hsv_of_primaries() {
        assert_eq!(rgb_to_hsv([255, 0, 0]), [0, 255, 255]);
        assert_eq!(rgb_to_hsv([0, 255, 0]), [85, 255, 255]);
        assert_eq!(rgb_to_hsv([0, 0, 255]), [170, 255, 255]);
        assert_eq!(rgb_to_hsv([40, 40, 40]), [0, 0, 40]);
    }

    #[test]
    fn encodes_rgb_and_gray_as_jpeg() {
        let img = sample();
        let rgb = encode_jpeg(DynamicImage::ImageRgb8(img.clone())).unwrap();
        let gray = encode_jpeg(DynamicImage::ImageLuma8(create_bw_image(&img))).unwrap();
        for bytes in [rgb, gray] {
            assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
            assert_eq!(
                image::guess_format(&bytes).unwrap(),
                ImageFormat::Jpeg
            );
        }
    }
}
