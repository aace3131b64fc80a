//! Additive attention masks.
//!
//! Masks are `f32` tensors added to attention scores before softmax: `0.0`
//! keeps an entry, `f32::NEG_INFINITY` removes it. All builders emit
//! broadcast-friendly shapes so one mask serves every head, and a causal
//! mask built once serves every batch.

pub mod causal;
pub mod padding;

pub use causal::causal_mask;
pub use padding::{combine_masks, padding_mask};

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{Device, Result, Tensor};

    #[test]
    fn causal_mask_is_lower_triangular() -> Result<()> {
        let device = Device::Cpu;
        let mask = causal_mask(4, &device)?;
        assert_eq!(mask.dims(), &[1, 1, 4, 4]);
        let rows = mask.squeeze(0)?.squeeze(0)?.to_vec2::<f32>()?;
        for (q, row) in rows.iter().enumerate() {
            for (k, &v) in row.iter().enumerate() {
                if k <= q {
                    assert_eq!(v, 0.0, "({q},{k}) should stay open");
                } else {
                    assert_eq!(v, f32::NEG_INFINITY, "({q},{k}) should be closed");
                }
            }
        }
        Ok(())
    }

    #[test]
    fn causal_mask_of_one_is_open() -> Result<()> {
        let device = Device::Cpu;
        let mask = causal_mask(1, &device)?;
        assert_eq!(mask.dims(), &[1, 1, 1, 1]);
        let v = mask.flatten_all()?.to_vec1::<f32>()?;
        assert_eq!(v, vec![0.0]);
        Ok(())
    }

    #[test]
    fn padding_mask_closes_pad_keys_only() -> Result<()> {
        let device = Device::Cpu;
        let ids = Tensor::new(&[[5u32, 9, 0, 0], [7, 0, 0, 0]], &device)?;
        let mask = padding_mask(&ids, 0, &device)?;
        assert_eq!(mask.dims(), &[2, 1, 1, 4]);
        let rows = mask.squeeze(1)?.squeeze(1)?.to_vec2::<f32>()?;
        assert_eq!(rows[0], vec![0.0, 0.0, f32::NEG_INFINITY, f32::NEG_INFINITY]);
        assert_eq!(
            rows[1],
            vec![0.0, f32::NEG_INFINITY, f32::NEG_INFINITY, f32::NEG_INFINITY]
        );
        Ok(())
    }

    #[test]
    fn padding_mask_rejects_non_2d_input() -> Result<()> {
        let device = Device::Cpu;
        let ids = Tensor::new(&[1u32, 2, 3], &device)?;
        assert!(padding_mask(&ids, 0, &device).is_err());
        Ok(())
    }

    #[test]
    fn combined_mask_is_intersection() -> Result<()> {
        let device = Device::Cpu;
        let causal = causal_mask(3, &device)?;
        let ids = Tensor::new(&[[4u32, 0, 6]], &device)?;
        let padding = padding_mask(&ids, 0, &device)?;
        let combined = combine_masks(&causal, &padding)?;
        assert_eq!(combined.dims(), &[1, 1, 3, 3]);
        let rows = combined.squeeze(0)?.squeeze(0)?.to_vec2::<f32>()?;
        // Row 2 sees keys 0 and 2; key 1 is padding, key 2 is causal-open.
        assert_eq!(rows[2], vec![0.0, f32::NEG_INFINITY, 0.0]);
        // Row 0 sees only key 0.
        assert_eq!(rows[0], vec![0.0, f32::NEG_INFINITY, f32::NEG_INFINITY]);
        Ok(())
    }
}
