use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageReader};
use std::fmt;
use std::io::Cursor;
use std::path::Path;

/// Difference hash: one bit per horizontal neighbour comparison on a
/// downsized grayscale grid, row-major. Length is `hash_size * hash_size`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DHash {
    bits: Vec<bool>,
}

impl DHash {
    pub fn from_bits(bits: Vec<bool>) -> Self {
        Self { bits }
    }

    /// Parse a string of `0`/`1` characters.
    pub fn from_bit_string(s: &str) -> Option<Self> {
        s.chars()
            .map(|c| match c {
                '0' => Some(false),
                '1' => Some(true),
                _ => None,
            })
            .collect::<Option<Vec<bool>>>()
            .map(Self::from_bits)
    }

    pub fn bits(&self) -> &[bool] {
        &self.bits
    }

    pub fn len(&self) -> usize {
        self.bits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    pub fn distance(&self, other: &DHash) -> Result<u32, HashError> {
        hamming(&self.bits, &other.bits)
    }
}

impl fmt::Display for DHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &bit in &self.bits {
            f.write_str(if bit { "1" } else { "0" })?;
        }
        Ok(())
    }
}

/// Hamming distance between two equal-length bit strings.
pub fn hamming(a: &[bool], b: &[bool]) -> Result<u32, HashError> {
    if a.len() != b.len() {
        return Err(HashError::LengthMismatch {
            left: a.len(),
            right: b.len(),
        });
    }
    Ok(a.iter().zip(b.iter()).filter(|(a, b)| a != b).count() as u32)
}

/// Hash plus the source resolution, which representative selection needs.
#[derive(Debug, Clone, PartialEq)]
pub struct Fingerprint {
    pub hash: DHash,
    pub width: u32,
    pub height: u32,
}

/// Compute the dHash of an already decoded image.
///
/// 1. Convert to 8-bit luma
/// 2. Resize to `(hash_size + 1) x hash_size`
/// 3. For each row, bit = pixel is strictly brighter than its right neighbour
pub fn compute_dhash(img: &DynamicImage, hash_size: u32) -> Result<DHash, HashError> {
    if hash_size == 0 {
        return Err(HashError::InvalidHashSize(hash_size));
    }
    if img.width() == 0 || img.height() == 0 {
        return Err(HashError::Decode("image has no pixels".into()));
    }

    let gray = img.to_luma8();
    let small = imageops::resize(&gray, hash_size + 1, hash_size, FilterType::Triangle);

    let mut bits = Vec::with_capacity((hash_size * hash_size) as usize);
    for y in 0..hash_size {
        for x in 0..hash_size {
            let left = small.get_pixel(x, y).0[0];
            let right = small.get_pixel(x + 1, y).0[0];
            bits.push(left > right);
        }
    }
    Ok(DHash::from_bits(bits))
}

/// Decode encoded image bytes (any format `image` can guess) and hash them.
pub fn fingerprint_bytes(data: &[u8], hash_size: u32) -> Result<Fingerprint, HashError> {
    let img = ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|e| HashError::Decode(e.to_string()))?
        .decode()
        .map_err(|e| HashError::Decode(e.to_string()))?;
    Ok(Fingerprint {
        hash: compute_dhash(&img, hash_size)?,
        width: img.width(),
        height: img.height(),
    })
}

pub fn fingerprint_file(path: &Path, hash_size: u32) -> Result<Fingerprint, HashError> {
    let data =
        std::fs::read(path).map_err(|e| HashError::Read(path.display().to_string(), e))?;
    fingerprint_bytes(&data, hash_size)
}

#[derive(Debug, thiserror::Error)]
pub enum HashError {
    #[error("failed to read {0}: {1}")]
    Read(String, std::io::Error),
    #[error("failed to decode image: {0}")]
    Decode(String),
    #[error("hash size must be at least 1, got {0}")]
    InvalidHashSize(u32),
    #[error("hash lengths differ: {left} vs {right}")]
    LengthMismatch { left: usize, right: usize },
}
