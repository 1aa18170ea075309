// LineItem model
//
// A line item is one billable entry on an invoice. Quantities and prices are
// integers (price in minor currency units) and the line amount is computed
// once at creation; line items never change after the invoice exists.

use serde::{Deserialize, Serialize};

use crate::core::{AppError, Result};

/// Represents a single line item in an invoice
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    /// Description of the product or service
    pub description: String,

    /// Quantity billed
    pub quantity: i64,

    /// Price per unit in minor units
    pub unit_price: i64,

    /// quantity × unit_price in minor units
    pub amount: i64,
}

impl LineItem {
    /// Create a new line item with validation
    ///
    /// # Arguments
    /// * `description` - Product/service description (max 255 chars)
    /// * `quantity` - Must be positive
    /// * `unit_price` - Must be non-negative
    pub fn new(description: String, quantity: i64, unit_price: i64) -> Result<Self> {
        Self::validate_description(&description)?;

        if quantity <= 0 {
            return Err(AppError::validation("Line item quantity must be positive"));
        }

        if unit_price < 0 {
            return Err(AppError::validation(
                "Line item unit price cannot be negative",
            ));
        }

        let amount = quantity
            .checked_mul(unit_price)
            .ok_or_else(|| AppError::validation("Line item amount is too large"))?;

        Ok(Self {
            description,
            quantity,
            unit_price,
            amount,
        })
    }

    fn validate_description(description: &str) -> Result<()> {
        if description.trim().is_empty() {
            return Err(AppError::validation(
                "Line item description cannot be empty",
            ));
        }

        if description.chars().count() > 255 {
            return Err(AppError::validation(
                "Line item description cannot exceed 255 characters",
            ));
        }

        Ok(())
    }
}
