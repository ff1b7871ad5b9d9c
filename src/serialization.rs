//! Checkpoint container in `SafeTensors` format.
//!
//! Wire layout:
//!
//! ```text
//! [8-byte little-endian header: metadata length]
//! [JSON metadata: name -> { dtype, shape, data_offsets }]
//! [raw tensor data, little-endian F32]
//! ```
//!
//! Only F32 tensors are supported; the checkpoint is a single snapshot
//! overwritten in place, with no versioning.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CentinelaError, Result};

/// Metadata for a single tensor in `SafeTensors` format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TensorMetadata {
    /// Data type of the tensor (always "F32" here).
    pub dtype: String,
    /// Shape of the tensor.
    pub shape: Vec<usize>,
    /// Data offsets `[start, end]` in the raw data section.
    pub data_offsets: [usize; 2],
}

/// Complete metadata structure. `BTreeMap` gives deterministic JSON
/// serialization (sorted keys).
pub type SafeTensorsMetadata = BTreeMap<String, TensorMetadata>;

/// Saves tensors to `SafeTensors` format.
///
/// # Arguments
///
/// * `path` - File path to write to
/// * `tensors` - Map of tensor names to (data, shape) tuples
///
/// # Errors
///
/// Returns an error if file writing or JSON serialization fails.
pub fn save_safetensors<P: AsRef<Path>>(
    path: P,
    tensors: &BTreeMap<String, (Vec<f32>, Vec<usize>)>,
) -> Result<()> {
    let mut metadata = SafeTensorsMetadata::new();
    let mut raw_data = Vec::new();
    let mut current_offset = 0;

    for (name, (data, shape)) in tensors {
        let start_offset = current_offset;
        let data_size = data.len() * 4; // F32 = 4 bytes
        let end_offset = current_offset + data_size;

        metadata.insert(
            name.clone(),
            TensorMetadata {
                dtype: "F32".to_string(),
                shape: shape.clone(),
                data_offsets: [start_offset, end_offset],
            },
        );

        for &value in data {
            raw_data.extend_from_slice(&value.to_le_bytes());
        }

        current_offset = end_offset;
    }

    let metadata_json = serde_json::to_string(&metadata)
        .map_err(|e| CentinelaError::Serialization(format!("JSON serialization failed: {e}")))?;
    let metadata_bytes = metadata_json.as_bytes();
    let metadata_len = metadata_bytes.len() as u64;

    let mut output = Vec::new();
    output.extend_from_slice(&metadata_len.to_le_bytes());
    output.extend_from_slice(metadata_bytes);
    output.extend_from_slice(&raw_data);

    fs::write(path, output)?;
    Ok(())
}

/// Loads the metadata table and raw data section from a `SafeTensors` file.
///
/// # Errors
///
/// Returns an error on I/O failure or a malformed header.
pub fn load_safetensors<P: AsRef<Path>>(path: P) -> Result<(SafeTensorsMetadata, Vec<u8>)> {
    let bytes = fs::read(path)?;

    if bytes.len() < 8 {
        return Err(CentinelaError::Serialization(
            "File too short for SafeTensors header".to_string(),
        ));
    }

    let mut len_bytes = [0u8; 8];
    len_bytes.copy_from_slice(&bytes[..8]);
    let metadata_len = u64::from_le_bytes(len_bytes) as usize;

    if bytes.len() < 8 + metadata_len {
        return Err(CentinelaError::Serialization(
            "Metadata length exceeds file size".to_string(),
        ));
    }

    let metadata: SafeTensorsMetadata = serde_json::from_slice(&bytes[8..8 + metadata_len])
        .map_err(|e| CentinelaError::Serialization(format!("Invalid metadata JSON: {e}")))?;
    let raw_data = bytes[8 + metadata_len..].to_vec();

    Ok((metadata, raw_data))
}

/// Extract one tensor's F32 values from the raw data section.
///
/// # Errors
///
/// Returns an error for a non-F32 dtype or out-of-range offsets.
pub fn extract_tensor(raw_data: &[u8], tensor_meta: &TensorMetadata) -> Result<Vec<f32>> {
    if tensor_meta.dtype != "F32" {
        return Err(CentinelaError::Serialization(format!(
            "Unsupported dtype '{}', expected F32",
            tensor_meta.dtype
        )));
    }

    let [start, end] = tensor_meta.data_offsets;
    if end > raw_data.len() || start > end {
        return Err(CentinelaError::Serialization(format!(
            "Tensor offsets [{start}, {end}] out of range for {} data bytes",
            raw_data.len()
        )));
    }

    let bytes = &raw_data[start..end];
    if bytes.len() % 4 != 0 {
        return Err(CentinelaError::Serialization(
            "Tensor byte length not a multiple of 4".to_string(),
        ));
    }

    let values = bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect();

    Ok(values)
}
