//! Decoding of height map rasters.
//!
//! TIFF files are read with the `tiff` crate, everything else goes through the `image` crate.
//! Only the first channel of a raster is used, it is normalized to `[0, 1]`.
//! Floating point rasters have to be normalized already.

mod tiff;

use anyhow::{bail, Context, Result};
use image::{DynamicImage, ImageReader};
use ndarray::Array2;
use std::path::Path;

/// Reads the first channel of the raster at `path` as normalized height samples indexed by `[y, x]`.
pub fn read_height_map(path: impl AsRef<Path>) -> Result<Array2<f32>> {
    let path = path.as_ref();

    let is_tiff = path
        .extension()
        .and_then(|extension| extension.to_str())
        .is_some_and(|extension| matches!(extension.to_ascii_lowercase().as_str(), "tif" | "tiff"));

    if is_tiff {
        tiff::read_tiff(path)
    } else {
        read_image(path)
    }
}

fn read_image(path: &Path) -> Result<Array2<f32>> {
    let image = ImageReader::open(path)?
        .with_guessed_format()?
        .decode()
        .context("failed to decode image")?;

    let (width, height) = (image.width(), image.height());
    let channels = image.color().channel_count() as usize;

    let samples = match &image {
        DynamicImage::ImageLuma8(buffer) => first_channel(buffer.as_raw(), channels, u8::MAX),
        DynamicImage::ImageLumaA8(buffer) => first_channel(buffer.as_raw(), channels, u8::MAX),
        DynamicImage::ImageRgb8(buffer) => first_channel(buffer.as_raw(), channels, u8::MAX),
        DynamicImage::ImageRgba8(buffer) => first_channel(buffer.as_raw(), channels, u8::MAX),
        DynamicImage::ImageLuma16(buffer) => first_channel(buffer.as_raw(), channels, u16::MAX),
        DynamicImage::ImageLumaA16(buffer) => first_channel(buffer.as_raw(), channels, u16::MAX),
        DynamicImage::ImageRgb16(buffer) => first_channel(buffer.as_raw(), channels, u16::MAX),
        DynamicImage::ImageRgba16(buffer) => first_channel(buffer.as_raw(), channels, u16::MAX),
        _ => bail!("unsupported bit depth of {:?}", image.color()),
    };

    to_raster(width, height, samples)
}

/// Picks every `channels`-th value and normalizes it by `max`.
pub(crate) fn first_channel<T: Copy + Into<f32>>(data: &[T], channels: usize, max: T) -> Vec<f32> {
    let max = max.into();

    data.iter()
        .step_by(channels.max(1))
        .map(|&value| value.into() / max)
        .collect()
}

pub(crate) fn to_raster(width: u32, height: u32, samples: Vec<f32>) -> Result<Array2<f32>> {
    Array2::from_shape_vec((height as usize, width as usize), samples)
        .context("the amount of samples does not match the image dimensions")
}

#[cfg(test)]
mod tests {
    use super::*;
    use ::tiff::encoder::{colortype, TiffEncoder};
    use image::{ImageBuffer, Luma, Rgb};
    use std::{env, fs::File, path::PathBuf};

    fn temp_path(name: &str) -> PathBuf {
        env::temp_dir().join(format!("bevy_lod_terrain_{}_{name}", std::process::id()))
    }

    #[test]
    fn reads_16_bit_png() {
        let path = temp_path("height_16.png");
        let buffer: ImageBuffer<Luma<u16>, Vec<u16>> =
            ImageBuffer::from_fn(4, 4, |x, y| Luma([(x * 4 + y) as u16 * 4369]));
        buffer.save(&path).unwrap();

        let samples = read_height_map(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(samples.dim(), (4, 4));
        assert_eq!(samples[[0, 0]], 0.0);
        assert_eq!(samples[[3, 3]], 1.0);
        // indexed by [y, x]
        assert_eq!(samples[[1, 0]], 4369.0 / 65535.0);
    }

    #[test]
    fn uses_first_channel_of_color_images() {
        let path = temp_path("height_rgb.png");
        let buffer: ImageBuffer<Rgb<u8>, Vec<u8>> =
            ImageBuffer::from_fn(2, 2, |x, _| Rgb([x as u8 * 255, 7, 9]));
        buffer.save(&path).unwrap();

        let samples = read_height_map(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(samples[[0, 0]], 0.0);
        assert_eq!(samples[[1, 1]], 1.0);
    }

    #[test]
    fn reads_16_bit_tiff() {
        let path = temp_path("height_16.tiff");
        let data = (0..16).map(|value| value * 4369).collect::<Vec<u16>>();

        let mut encoder = TiffEncoder::new(File::create(&path).unwrap()).unwrap();
        encoder
            .write_image::<colortype::Gray16>(4, 4, &data)
            .unwrap();

        let samples = read_height_map(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(samples.dim(), (4, 4));
        assert_eq!(samples[[0, 1]], 4369.0 / 65535.0);
        assert_eq!(samples[[3, 3]], 1.0);
    }

    #[test]
    fn rejects_unsupported_bit_depth() {
        let path = temp_path("height_32.tif");
        let data = vec![0u32; 16];

        let mut encoder = TiffEncoder::new(File::create(&path).unwrap()).unwrap();
        encoder
            .write_image::<colortype::Gray32>(4, 4, &data)
            .unwrap();

        let error = read_height_map(&path).unwrap_err();
        std::fs::remove_file(&path).unwrap();

        assert!(format!("{error:#}").contains("unsupported bit depth"));
    }

    #[test]
    fn reads_normalized_float_tiff() {
        let path = temp_path("height_f32.tiff");
        let data = (0..16).map(|value| value as f32 / 15.0).collect::<Vec<f32>>();

        let mut encoder = TiffEncoder::new(File::create(&path).unwrap()).unwrap();
        encoder
            .write_image::<colortype::Gray32Float>(4, 4, &data)
            .unwrap();

        let samples = read_height_map(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(samples[[0, 0]], 0.0);
        assert_eq!(samples[[3, 3]], 1.0);
    }

    #[test]
    fn rejects_float_samples_outside_unit_range() {
        for (name, sample) in [("above", 1.5_f32), ("below", -0.25), ("nan", f32::NAN)] {
            let path = temp_path(&format!("height_f32_{name}.tiff"));
            let mut data = vec![0.5_f32; 16];
            data[5] = sample;

            let mut encoder = TiffEncoder::new(File::create(&path).unwrap()).unwrap();
            encoder
                .write_image::<colortype::Gray32Float>(4, 4, &data)
                .unwrap();

            let error = read_height_map(&path).unwrap_err();
            std::fs::remove_file(&path).unwrap();

            assert!(format!("{error:#}").contains("have to be normalized"));
        }
    }

    #[test]
    fn reports_missing_files() {
        assert!(read_height_map(temp_path("missing.png")).is_err());
    }
}
