//! Input checks applied before any store call.

use crate::{Result, ShopError};

/// Longest accepted `Idempotency-Key`.
pub const MAX_IDEMPOTENCY_KEY_LEN: usize = 128;

pub(crate) fn positive_quantity(quantity: i32) -> Result<()> {
    if quantity <= 0 {
        return Err(ShopError::Validation(
            "quantity must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

/// Checks an idempotency key: 1 to 128 visible ASCII characters.
pub fn idempotency_key(key: &str) -> Result<()> {
    if key.is_empty() || key.len() > MAX_IDEMPOTENCY_KEY_LEN {
        return Err(ShopError::Validation(format!(
            "idempotency key must be 1 to {MAX_IDEMPOTENCY_KEY_LEN} characters"
        )));
    }
    if !key.bytes().all(|b| b.is_ascii_graphic()) {
        return Err(ShopError::Validation(
            "idempotency key must be visible ASCII".to_string(),
        ));
    }
    Ok(())
}
