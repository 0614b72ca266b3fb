//! Sale totals.
//!
//! All sums are unrounded; [`SaleTotals::rounded`] produces the values
//! that get persisted.

use rust_decimal::Decimal;

use crate::money::Money;
use crate::types::TaxRate;

/// Billing inputs of one sale line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineAmount {
    pub quantity: Decimal,
    pub unit_price: Money,
    pub tax_rate: TaxRate,
}

impl LineAmount {
    /// quantity × unit price, before tax.
    pub fn net(&self) -> Money {
        self.unit_price.multiply_quantity(self.quantity)
    }

    pub fn tax(&self) -> Money {
        self.net().calculate_tax(self.tax_rate)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SaleTotals {
    pub subtotal: Money,
    pub tax_total: Money,
    pub grand_total: Money,
}

impl SaleTotals {
    /// subtotal = Σ net, tax = Σ net × rate / 100, grand = subtotal + tax.
    pub fn compute<'a, I>(lines: I) -> Self
    where
        I: IntoIterator<Item = &'a LineAmount>,
    {
        let mut totals = SaleTotals::default();
        for line in lines {
            totals.subtotal += line.net();
            totals.tax_total += line.tax();
        }
        totals.grand_total = totals.subtotal + totals.tax_total;
        totals
    }

    /// Each field rounded independently to currency scale.
    pub fn rounded(&self) -> Self {
        SaleTotals {
            subtotal: self.subtotal.round_currency(),
            tax_total: self.tax_total.round_currency(),
            grand_total: self.grand_total.round_currency(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn line(qty: &str, price: &str, rate: &str) -> LineAmount {
        LineAmount {
            quantity: dec(qty),
            unit_price: Money::from_decimal(dec(price)),
            tax_rate: TaxRate::from_percent(dec(rate)),
        }
    }

    #[test]
    fn test_compute_totals() {
        let lines = [line("2", "50", "5"), line("1", "100", "0")];
        let t = SaleTotals::compute(&lines);
        assert_eq!(t.subtotal.amount(), dec("200"));
        assert_eq!(t.tax_total.amount(), dec("5"));
        assert_eq!(t.grand_total.amount(), dec("205"));
    }

    #[test]
    fn test_rounding_happens_after_summing() {
        // 3 × 0.333 at 0% = 0.999 → 1.00, not 3 × 0.33
        let lines = [line("1", "0.333", "0"), line("1", "0.333", "0"), line("1", "0.333", "0")];
        let t = SaleTotals::compute(&lines).rounded();
        assert_eq!(t.grand_total.amount(), dec("1.00"));
    }

    #[test]
    fn test_fractional_quantity_tax() {
        let t = SaleTotals::compute(&[line("1.5", "64.99", "18")]);
        assert_eq!(t.subtotal.amount(), dec("97.485"));
        assert_eq!(t.tax_total.amount(), dec("17.5473"));
        let r = t.rounded();
        assert_eq!(r.subtotal.amount(), dec("97.49"));
        assert_eq!(r.tax_total.amount(), dec("17.55"));
        assert_eq!(r.grand_total.amount(), dec("115.03"));
    }

    #[test]
    fn test_empty_sale_is_zero() {
        let none: Vec<LineAmount> = Vec::new();
        let t = SaleTotals::compute(&none);
        assert!(t.grand_total.is_zero());
    }
}
