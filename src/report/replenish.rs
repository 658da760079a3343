//! Replenishment math: shipment need, package-size classification and the
//! fulfillable estimate. Pure functions over one location's stock+sales
//! view.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;

use crate::store::models::Dimensions;

/// Units to ship into the warehouse to cover recent demand.
///
/// `Opportunity` means "no recent demand and no stock" and is
/// categorically distinct from a numeric need of zero (healthy stock, no
/// demand).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "units")]
pub enum ShipmentNeed {
    Units(i64),
    Opportunity,
}

impl ShipmentNeed {
    pub fn compute(sales_units: i64, available: i64, in_transit: i64, inbound: i64) -> Self {
        if sales_units > 0 {
            Self::Units((sales_units - (available + in_transit + inbound)).max(0))
        } else if available == 0 {
            Self::Opportunity
        } else {
            Self::Units(0)
        }
    }

}

impl std::fmt::Display for ShipmentNeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Units(n) => write!(f, "{}", n),
            Self::Opportunity => write!(f, "opportunity"),
        }
    }
}

/// How many units the external warehouse could actually supply. `None`
/// when no WMS figure exists for the item.
pub fn fulfillable(need: ShipmentNeed, wms_available: Option<i64>) -> Option<i64> {
    let wms = wms_available?;
    Some(match need {
        ShipmentNeed::Units(n) if n > 0 => n.min(wms),
        // No shortfall: report the external figure as "available to ship
        // anyway".
        ShipmentNeed::Units(_) => wms,
        ShipmentNeed::Opportunity => 0,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SizeClass {
    Small,
    Medium,
    Large,
    ExtraLarge,
}

impl SizeClass {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Small => "small",
            Self::Medium => "medium",
            Self::Large => "large",
            Self::ExtraLarge => "extra_large",
        }
    }
}

const WEIGHT_CEILING_KG: Decimal = dec!(18);

/// Ascending per-axis ceilings in centimeters.
const SIZE_TIERS: [(SizeClass, [Decimal; 3]); 3] = [
    (SizeClass::Small, [dec!(12), dec!(15), dec!(25)]),
    (SizeClass::Medium, [dec!(28), dec!(36), dec!(51)]),
    (SizeClass::Large, [dec!(60), dec!(60), dec!(70)]),
];

/// Classify a package against the ordered size tiers. The three axes are
/// sorted ascending and compared per axis; the first tier satisfying all
/// three ceilings and the shared 18 kg weight ceiling wins, otherwise the
/// overflow tier. Weight is stored in grams. `None` when any of the three
/// axes is absent.
pub fn classify_package(dims: &Dimensions) -> Option<SizeClass> {
    let mut axes = [dims.height?, dims.width?, dims.length?];
    axes.sort();
    let weight_kg = dims.weight.unwrap_or_default() / dec!(1000);

    for (class, ceilings) in SIZE_TIERS {
        let fits_axes = axes
            .iter()
            .zip(ceilings.iter())
            .all(|(axis, ceiling)| axis <= ceiling);
        if fits_axes && weight_kg <= WEIGHT_CEILING_KG {
            return Some(class);
        }
    }
    Some(SizeClass::ExtraLarge)
}

/// Cubic volume in m³ (dimensions are centimeters), rounded to 6 decimal
/// places. Independent of classification success.
pub fn cubage_m3(dims: &Dimensions) -> Option<Decimal> {
    let (h, w, l) = (dims.height?, dims.width?, dims.length?);
    Some(((h / dec!(100)) * (w / dec!(100)) * (l / dec!(100))).round_dp(6))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dims(h: Decimal, w: Decimal, l: Decimal, weight_g: Decimal) -> Dimensions {
        Dimensions {
            height: Some(h),
            width: Some(w),
            length: Some(l),
            weight: Some(weight_g),
        }
    }

    #[test]
    fn need_is_demand_minus_pipeline_stock_clamped_at_zero() {
        assert_eq!(ShipmentNeed::compute(10, 3, 2, 0), ShipmentNeed::Units(5));
        assert_eq!(ShipmentNeed::compute(5, 10, 0, 0), ShipmentNeed::Units(0));
        assert_eq!(ShipmentNeed::compute(7, 2, 1, 4), ShipmentNeed::Units(0));
    }

    #[test]
    fn no_demand_no_stock_is_an_opportunity_not_zero() {
        assert_eq!(ShipmentNeed::compute(0, 0, 0, 0), ShipmentNeed::Opportunity);
        assert_eq!(ShipmentNeed::compute(0, 4, 0, 0), ShipmentNeed::Units(0));
        // In-transit units alone do not make the entry "stocked".
        assert_eq!(ShipmentNeed::compute(0, 0, 3, 0), ShipmentNeed::Opportunity);
    }

    #[test]
    fn fulfillable_caps_at_external_stock() {
        assert_eq!(fulfillable(ShipmentNeed::Units(5), Some(3)), Some(3));
        assert_eq!(fulfillable(ShipmentNeed::Units(5), Some(9)), Some(5));
        assert_eq!(fulfillable(ShipmentNeed::Units(0), Some(9)), Some(9));
        assert_eq!(fulfillable(ShipmentNeed::Opportunity, Some(9)), Some(0));
        assert_eq!(fulfillable(ShipmentNeed::Units(5), None), None);
        assert_eq!(fulfillable(ShipmentNeed::Opportunity, None), None);
    }

    #[test]
    fn tiers_match_on_sorted_axes() {
        let d = dims(dec!(20), dec!(10), dec!(12), dec!(2000));
        assert_eq!(classify_package(&d), Some(SizeClass::Small));

        let d = dims(dec!(50), dec!(25), dec!(35), dec!(10000));
        assert_eq!(classify_package(&d), Some(SizeClass::Medium));

        let d = dims(dec!(55), dec!(40), dec!(45), dec!(10000));
        assert_eq!(classify_package(&d), Some(SizeClass::Large));
    }

    #[test]
    fn overflow_when_axes_or_weight_exceed_every_tier() {
        let d = dims(dec!(80), dec!(80), dec!(80), dec!(25000));
        assert_eq!(classify_package(&d), Some(SizeClass::ExtraLarge));
        // Small axes but over the weight ceiling.
        let d = dims(dec!(10), dec!(12), dec!(20), dec!(19000));
        assert_eq!(classify_package(&d), Some(SizeClass::ExtraLarge));
    }

    #[test]
    fn missing_axes_leave_classification_unknown() {
        let d = Dimensions {
            height: Some(dec!(10)),
            width: None,
            length: Some(dec!(20)),
            weight: Some(dec!(500)),
        };
        assert_eq!(classify_package(&d), None);
        assert_eq!(cubage_m3(&d), None);
    }

    #[test]
    fn cubage_converts_centimeters_to_cubic_meters() {
        let d = dims(dec!(25.5), dec!(10), dec!(40), dec!(1000));
        assert_eq!(cubage_m3(&d), Some(dec!(0.0102)));
    }
}
