//! Model state serialization.
//!
//! Extracts a module's parameters into a state dictionary keyed by
//! parameter position, saved to and restored from a single `SafeTensors`
//! checkpoint file.

use std::collections::BTreeMap;
use std::path::Path;

use super::Module;
use crate::error::{CentinelaError, Result};
use crate::serialization::{extract_tensor, load_safetensors, save_safetensors};
use crate::tensor::Tensor;

/// State dictionary: parameter name to tensor data and shape.
pub type StateDict = BTreeMap<String, (Vec<f32>, Vec<usize>)>;

/// Extract a state dictionary from a module.
///
/// Parameter names are positional indices, optionally namespaced with a
/// prefix for nested modules.
pub fn state_dict<M: Module + ?Sized>(module: &M, prefix: &str) -> StateDict {
    let mut state = StateDict::new();

    for (i, param) in module.parameters().iter().enumerate() {
        let name = if prefix.is_empty() {
            format!("{i}")
        } else {
            format!("{prefix}.{i}")
        };

        state.insert(name, (param.data().to_vec(), param.shape().to_vec()));
    }

    state
}

/// Load a state dictionary into a module.
///
/// # Errors
///
/// Returns a serialization error when a parameter is missing from the
/// state dict or its shape disagrees with the module.
pub fn load_state_dict_into<M: Module + ?Sized>(
    module: &mut M,
    state: &StateDict,
    prefix: &str,
) -> Result<()> {
    let params = module.parameters_mut();

    for (i, param) in params.into_iter().enumerate() {
        let name = if prefix.is_empty() {
            format!("{i}")
        } else {
            format!("{prefix}.{i}")
        };

        let (data, shape) = state.get(&name).ok_or_else(|| {
            CentinelaError::Serialization(format!("Missing parameter '{name}' in state dict"))
        })?;

        if param.shape() != shape.as_slice() {
            return Err(CentinelaError::Serialization(format!(
                "Shape mismatch for parameter '{name}': expected {:?}, got {:?}",
                param.shape(),
                shape
            )));
        }

        *param = Tensor::new(data, shape);
    }

    Ok(())
}

/// Save a module's parameters to a `SafeTensors` file.
///
/// # Errors
///
/// Returns an error on I/O or serialization failure.
pub fn save_model<M: Module + ?Sized, P: AsRef<Path>>(module: &M, path: P) -> Result<()> {
    let state = state_dict(module, "");
    save_safetensors(path, &state)
}

/// Load parameters from a `SafeTensors` file into a module.
///
/// # Errors
///
/// Returns an error on I/O failure, malformed file, or shape mismatch.
pub fn load_model<M: Module + ?Sized, P: AsRef<Path>>(module: &mut M, path: P) -> Result<()> {
    let (metadata, raw_data) = load_safetensors(path)?;

    let mut state = StateDict::new();
    for (name, tensor_meta) in metadata {
        let data = extract_tensor(&raw_data, &tensor_meta)?;
        state.insert(name, (data, tensor_meta.shape));
    }

    load_state_dict_into(module, &state, "")
}

/// Total number of scalar parameters a module would save.
pub fn count_parameters<M: Module + ?Sized>(module: &M) -> usize {
    module.parameters().iter().map(|p| p.numel()).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nn::Linear;

    #[test]
    fn test_state_dict_linear() {
        let layer = Linear::with_seed(10, 5, Some(42));
        let state = state_dict(&layer, "");

        assert_eq!(state.len(), 2); // weight + bias

        let (weight_data, weight_shape) = &state["0"];
        assert_eq!(weight_shape, &[5, 10]);
        assert_eq!(weight_data.len(), 50);

        let (bias_data, bias_shape) = &state["1"];
        assert_eq!(bias_shape, &[5]);
        assert_eq!(bias_data.len(), 5);
    }

    #[test]
    fn test_load_state_dict_into() {
        let layer1 = Linear::with_seed(10, 5, Some(42));
        let state = state_dict(&layer1, "");

        let mut layer2 = Linear::with_seed(10, 5, Some(99));
        assert_ne!(layer1.parameters()[0].data(), layer2.parameters()[0].data());

        load_state_dict_into(&mut layer2, &state, "").expect("load should succeed");
        assert_eq!(layer1.parameters()[0].data(), layer2.parameters()[0].data());
    }

    #[test]
    fn test_save_and_load_model() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("linear.safetensors");

        let model1 = Linear::with_seed(10, 5, Some(42));
        save_model(&model1, &path).expect("save should succeed");

        let mut model2 = Linear::with_seed(10, 5, Some(99));
        load_model(&mut model2, &path).expect("load should succeed");

        assert_eq!(model1.parameters()[0].data(), model2.parameters()[0].data());
        assert_eq!(model1.parameters()[1].data(), model2.parameters()[1].data());
    }

    #[test]
    fn test_load_state_dict_shape_mismatch() {
        let layer1 = Linear::with_seed(10, 5, Some(42));
        let state = state_dict(&layer1, "");

        let mut layer2 = Linear::with_seed(20, 10, Some(99));
        let result = load_state_dict_into(&mut layer2, &state, "");

        assert!(matches!(result, Err(CentinelaError::Serialization(_))));
    }

    #[test]
    fn test_count_parameters() {
        let layer = Linear::with_seed(10, 8, Some(1)); // 10*8 + 8 = 88
        assert_eq!(count_parameters(&layer), 88);
    }
}
