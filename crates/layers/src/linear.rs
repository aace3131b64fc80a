//! Dense projection constructors with transformer-style initialisation.
//!
//! All projections in this project are built through [`linear`] so parameters
//! land in the caller's `VarBuilder` scope and share the Xavier/Glorot
//! uniform recipe for weights with zero-initialised biases.

use candle_core::Result;
use candle_nn::{init::Init, Linear, VarBuilder};

/// Builds a `d_in -> d_out` affine projection.
///
/// The weight is sampled from `U(-b, b)` with `b = sqrt(6 / (d_in + d_out))`;
/// the bias starts at zero. Parameters register under `weight` and `bias`
/// inside the provided scope.
pub fn linear(d_in: usize, d_out: usize, vb: VarBuilder) -> Result<Linear> {
    let bound = (6.0 / (d_in + d_out) as f64).sqrt();
    let weight = vb.get_with_hints(
        (d_out, d_in),
        "weight",
        Init::Uniform {
            lo: -bound,
            up: bound,
        },
    )?;
    let bias = vb.get_with_hints(d_out, "bias", Init::Const(0.0))?;
    Ok(Linear::new(weight, Some(bias)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device, Module, Tensor};
    use candle_nn::{VarBuilder, VarMap};

    fn vb(device: &Device) -> (VarMap, VarBuilder<'static>) {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, device);
        (varmap, vb)
    }

    #[test]
    fn projects_to_requested_width() -> Result<()> {
        let device = Device::Cpu;
        let (_varmap, vb) = vb(&device);
        let proj = linear(8, 12, vb)?;
        let input = Tensor::zeros((2, 5, 8), DType::F32, &device)?;
        let output = proj.forward(&input)?;
        assert_eq!(output.dims(), &[2, 5, 12]);
        Ok(())
    }

    #[test]
    fn weights_respect_xavier_bound() -> Result<()> {
        let device = Device::Cpu;
        let (varmap, vb) = vb(&device);
        let _proj = linear(16, 16, vb)?;
        let bound = (6.0f32 / 32.0).sqrt();
        for var in varmap.all_vars() {
            let values = var.flatten_all()?.to_vec1::<f32>()?;
            assert!(values.iter().all(|v| v.abs() <= bound + 1e-6));
        }
        Ok(())
    }
}
