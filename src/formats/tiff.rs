use crate::formats::{first_channel, to_raster};
use anyhow::{bail, Context, Result};
use ndarray::Array2;
use std::{fs::File, io::BufReader, path::Path};
use tiff::{
    decoder::{Decoder, DecodingResult},
    ColorType,
};

pub(super) fn read_tiff(path: &Path) -> Result<Array2<f32>> {
    let file = File::open(path).context("failed to open tiff file")?;
    let mut decoder = Decoder::new(BufReader::new(file)).context("invalid tiff file")?;

    let (width, height) = decoder.dimensions()?;

    let channels = match decoder.colortype()? {
        ColorType::Gray(_) => 1,
        ColorType::GrayA(_) => 2,
        ColorType::RGB(_) => 3,
        ColorType::RGBA(_) => 4,
        color_type => bail!("unsupported color type {color_type:?}"),
    };

    let samples = match decoder.read_image()? {
        DecodingResult::U8(data) => first_channel(&data, channels, u8::MAX),
        DecodingResult::U16(data) => first_channel(&data, channels, u16::MAX),
        DecodingResult::F32(data) => {
            let samples = first_channel(&data, channels, 1.0);

            if let Some(sample) = samples
                .iter()
                .find(|sample| !(0.0..=1.0).contains(*sample))
            {
                bail!("floating point samples have to be normalized, found {sample}");
            }

            samples
        }
        _ => bail!("unsupported bit depth"),
    };

    to_raster(width, height, samples)
}
