//! Step-size lot rounding, configured from `[backtest] lot_step` and
//! `[backtest] min_quantity`.

use crate::domain::error::ScalptraderError;
use crate::ports::config_port::ConfigPort;
use crate::ports::lot_port::LotRounding;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepLotRounding {
    step: f64,
    min_qty: f64,
}

impl StepLotRounding {
    pub fn new(step: f64, min_qty: f64) -> Result<Self, ScalptraderError> {
        if !(step.is_finite() && step > 0.0) {
            return Err(ScalptraderError::invalid(
                "backtest",
                "lot_step",
                "lot_step must be positive",
            ));
        }
        if !(min_qty.is_finite() && min_qty >= 0.0) {
            return Err(ScalptraderError::invalid(
                "backtest",
                "min_quantity",
                "min_quantity must be non-negative",
            ));
        }
        Ok(StepLotRounding { step, min_qty })
    }

    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, ScalptraderError> {
        Self::new(
            config.get_double("backtest", "lot_step", 0.001),
            config.get_double("backtest", "min_quantity", 0.001),
        )
    }
}

impl LotRounding for StepLotRounding {
    fn round_down(&self, quantity: f64) -> f64 {
        if !(quantity.is_finite() && quantity > 0.0) {
            return 0.0;
        }
        // Nudge so exact multiples like 0.3 / 0.1 do not floor to 2.
        let steps = (quantity / self.step + 1e-9).floor();
        steps * self.step
    }

    fn min_quantity(&self) -> f64 {
        self.min_qty
    }
}
