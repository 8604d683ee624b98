//! TIFF-backed raster I/O.
//!
//! Sensor frames are single-band 16-bit TIFFs. Reflectance rasters are written
//! as single-band 32-bit float TIFFs, and stacks as one 32-bit float page per
//! band in band order.

use std::fs::File;
use std::io::{BufReader, Cursor, Write};
use std::path::Path;

use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::encoder::colortype::Gray32Float;
use tiff::encoder::compression::DeflateLevel;
use tiff::encoder::{Compression, TiffEncoder};
use tracing::debug;

use crate::multispectral::common::error::{PreprocessError, Result};
use crate::multispectral::config::TiffCompression;
use crate::multispectral::raster::io::RasterIo;
use crate::multispectral::raster::thumbnail::render_rgb_preview;
use crate::multispectral::raster::types::{FloatImage, RawFrame};

pub struct TiffRasterIo;

fn tiff_compression(compression: TiffCompression) -> Compression {
    match compression {
        TiffCompression::None => Compression::Uncompressed,
        TiffCompression::Lzw => Compression::Lzw,
        TiffCompression::DeflateFast => Compression::Deflate(DeflateLevel::Fast),
        TiffCompression::DeflateBalanced => Compression::Deflate(DeflateLevel::Balanced),
        TiffCompression::DeflateBest => Compression::Deflate(DeflateLevel::Best),
    }
}

fn open_decoder(path: &Path) -> Result<Decoder<BufReader<File>>> {
    let file = File::open(path).map_err(|e| {
        PreprocessError::InputReadError(format!("{}: {}", path.display(), e))
    })?;
    // Altum frames are small, but stacks of full-resolution bands exceed the default limits
    Decoder::new(BufReader::new(file))
        .map(|decoder| decoder.with_limits(Limits::unlimited()))
        .map_err(|e| PreprocessError::DecodeError(format!("{}: {}", path.display(), e)))
}

fn check_dimensions(image: &FloatImage) -> Result<()> {
    if image.width == 0 || image.height == 0 || image.data.len() != image.width * image.height {
        return Err(PreprocessError::InvalidDimensions(image.width, image.height));
    }
    Ok(())
}

/// Encodes float bands as consecutive pages of one TIFF into `output`.
pub fn encode_float_pages(
    bands: &[FloatImage],
    output: &mut dyn Write,
    compression: TiffCompression,
) -> Result<()> {
    let mut buffer = Vec::new();

    {
        let mut encoder = TiffEncoder::new(Cursor::new(&mut buffer))
            .map_err(|e| PreprocessError::EncodeError(e.to_string()))?
            .with_compression(tiff_compression(compression));

        for band in bands {
            check_dimensions(band)?;
            encoder
                .write_image::<Gray32Float>(band.width as u32, band.height as u32, &band.data)
                .map_err(|e| PreprocessError::EncodeError(e.to_string()))?;
        }
    }

    output.write_all(&buffer)?;
    Ok(())
}

fn write_file(path: &Path, bands: &[FloatImage], compression: TiffCompression) -> Result<()> {
    let mut file = File::create(path).map_err(|e| {
        PreprocessError::OutputWriteError(format!("{}: {}", path.display(), e))
    })?;
    encode_float_pages(bands, &mut file, compression)?;
    file.flush()?;
    Ok(())
}

impl TiffRasterIo {
    /// Reads every float page of a stack written by [`RasterIo::write_stack`].
    pub fn read_stack(&self, path: &Path) -> Result<Vec<FloatImage>> {
        let mut decoder = open_decoder(path)?;
        let mut bands = Vec::new();
        loop {
            let (width, height) = decoder
                .dimensions()
                .map_err(|e| PreprocessError::DecodeError(e.to_string()))?;
            let data = match decoder
                .read_image()
                .map_err(|e| PreprocessError::DecodeError(e.to_string()))?
            {
                DecodingResult::F32(values) => values,
                other => {
                    return Err(PreprocessError::UnsupportedFormat(format!(
                        "expected 32-bit float pages, found {:?}",
                        std::mem::discriminant(&other)
                    )));
                }
            };
            bands.push(FloatImage::new(width as usize, height as usize, data));

            if !decoder.more_images() {
                break;
            }
            decoder
                .next_image()
                .map_err(|e| PreprocessError::DecodeError(e.to_string()))?;
        }
        Ok(bands)
    }
}

impl RasterIo for TiffRasterIo {
    fn read_frame(&self, path: &Path) -> Result<RawFrame> {
        debug!("Decoding frame {}", path.display());

        let mut decoder = open_decoder(path)?;
        let (width, height) = decoder
            .dimensions()
            .map_err(|e| PreprocessError::DecodeError(e.to_string()))?;
        let bits_per_sample = match decoder
            .colortype()
            .map_err(|e| PreprocessError::DecodeError(e.to_string()))?
        {
            tiff::ColorType::Gray(bits) => bits as u32,
            other => {
                return Err(PreprocessError::UnsupportedFormat(format!(
                    "{}: expected a single-band frame, found {:?}",
                    path.display(),
                    other
                )));
            }
        };

        let data: Vec<u16> = match decoder
            .read_image()
            .map_err(|e| PreprocessError::DecodeError(e.to_string()))?
        {
            DecodingResult::U16(values) => values,
            DecodingResult::U8(values) => values.into_iter().map(u16::from).collect(),
            _ => {
                return Err(PreprocessError::UnsupportedFormat(format!(
                    "{}: {}-bit samples are not supported",
                    path.display(),
                    bits_per_sample
                )));
            }
        };

        debug!("Decoded frame: {}x{}", width, height);

        Ok(RawFrame {
            width: width as usize,
            height: height as usize,
            data,
            bits_per_sample,
        })
    }

    fn write_band(&self, path: &Path, image: &FloatImage, compression: TiffCompression) -> Result<()> {
        debug!("Encoding band {}x{} to {}", image.width, image.height, path.display());
        write_file(path, std::slice::from_ref(image), compression)
    }

    fn write_stack(&self, path: &Path, bands: &[FloatImage], compression: TiffCompression) -> Result<()> {
        let Some(first) = bands.first() else {
            return Err(PreprocessError::CaptureError(format!(
                "refusing to write an empty stack to {}",
                path.display()
            )));
        };
        if let Some(band) = bands.iter().find(|b| b.dimensions() != first.dimensions()) {
            return Err(PreprocessError::InvalidDimensions(band.width, band.height));
        }

        debug!(
            "Encoding {}-band stack {}x{} to {}",
            bands.len(),
            first.width,
            first.height,
            path.display()
        );
        write_file(path, bands, compression)
    }

    fn write_rgb_preview(&self, path: &Path, rgb: [&FloatImage; 3]) -> Result<()> {
        let preview = render_rgb_preview(rgb)?;
        preview
            .save_with_format(path, image::ImageFormat::Jpeg)
            .map_err(|e| PreprocessError::OutputWriteError(format!("{}: {}", path.display(), e)))
    }
}
