use crate::error::{Error, Result};
use flate2::read::GzDecoder;
use itertools::Itertools;
use ndarray::Array1;
use ndarray_rand::rand::{Rng, seq::SliceRandom};
use std::{fs, io::Read, path::Path};

/// One handwritten digit: its pixel intensities normalized to [0, 1] and the
/// digit it depicts.
pub struct Sample {
    pub pixels: Array1<f64>,
    pub label: u8,
}

/// An ordered collection of samples sharing one dimensionality. Mini-batches
/// are borrowed sub-slices of `samples`, so the order matters and can be
/// permuted in place between iterations.
pub struct Dataset {
    pub samples: Vec<Sample>,
    pub dimensions: usize,
}

impl Dataset {
    /// Loads a dataset from an image file and a label file in the IDX format:
    /// big-endian 32-bit integers for the magic number, the sample count, and
    /// (for images) the row and column counts, followed by one byte per pixel
    /// or label. Gzip-compressed files are accepted as well. The two files
    /// must agree on the sample count.
    pub fn load(image_path: &Path, label_path: &Path) -> Result<Dataset> {
        let mut image_bytes = read_bytes(image_path)?.into_iter();
        let mut label_bytes = read_bytes(label_path)?.into_iter();

        // Headers. The magic numbers are skipped, not validated, so files
        // with nonstandard magic values still load as long as their layout
        // matches.
        let _magic = read_u32(&mut image_bytes, "image")?;
        let image_count = read_u32(&mut image_bytes, "image")?;
        let rows = read_u32(&mut image_bytes, "image")?;
        let columns = read_u32(&mut image_bytes, "image")?;

        let _magic = read_u32(&mut label_bytes, "label")?;
        let label_count = read_u32(&mut label_bytes, "label")?;

        if image_count != label_count {
            return Err(Error::SampleCountMismatch {
                images: image_count,
                labels: label_count,
            });
        }

        if rows == 0 || columns == 0 {
            return Err(Error::InvalidImageSize { rows, columns });
        }
        let dimensions = (rows * columns) as usize;
        let count = image_count as usize;

        // Both iterators now sit at the start of their data sections. Chunk
        // the image bytes per sample and pair each chunk with its label.
        let mut samples = Vec::with_capacity(count);
        for (pixel_chunk, label) in image_bytes
            .chunks(dimensions)
            .into_iter()
            .zip(label_bytes)
            .take(count)
        {
            let pixels: Array1<f64> = pixel_chunk.map(|byte| f64::from(byte) / 255.0).collect();
            if pixels.len() != dimensions {
                return Err(Error::TruncatedData("image"));
            }
            samples.push(Sample { pixels, label });
        }
        if samples.len() != count {
            return Err(Error::TruncatedData("label"));
        }

        Ok(Dataset {
            samples,
            dimensions,
        })
    }

    /// Permutes the sample order in place, uniformly at random.
    pub fn shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.samples.shuffle(rng);
    }
}

// Reads a whole file into memory, transparently decompressing it when it
// starts with the gzip magic bytes.
fn read_bytes(path: &Path) -> Result<Vec<u8>> {
    let bytes = fs::read(path)?;
    if bytes.starts_with(&[0x1f, 0x8b]) {
        let mut decompressed = Vec::new();
        GzDecoder::new(bytes.as_slice()).read_to_end(&mut decompressed)?;
        Ok(decompressed)
    } else {
        Ok(bytes)
    }
}

// Consumes the next four bytes as one big-endian u32. `stream` names the file
// in the error when the bytes run out.
fn read_u32<I: Iterator<Item = u8>>(bytes: &mut I, stream: &'static str) -> Result<u32> {
    let header: Vec<u8> = bytes.take(4).collect();
    let header: [u8; 4] = header
        .try_into()
        .map_err(|_| Error::TruncatedData(stream))?;
    Ok(u32::from_be_bytes(header))
}
