//! Exchange lot-size constraints port.

/// Rounds order quantities to what the venue accepts.
pub trait LotRounding {
    /// Largest tradable quantity not above `quantity`.
    fn round_down(&self, quantity: f64) -> f64;

    /// Smallest quantity the venue will accept.
    fn min_quantity(&self) -> f64;
}
