//! Photometric light-level tables.
//!
//! Each catalog maps a human readable label to a physical magnitude. The
//! bulb catalog is expressed in lumens (luminous power), the hemisphere
//! catalog in lux (irradiance). Both tables are `'static` and ordered from
//! the brightest to the darkest level for the bulb and from the darkest to
//! the brightest level for the sky, matching the order they are presented
//! in.

use serde::{Deserialize, Serialize};

use crate::error::CatalogError;

/// Label and magnitude of one selectable light level.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightLevel {
    pub label: &'static str,
    pub value: f32,
}

const fn level(label: &'static str, value: f32) -> LightLevel {
    LightLevel { label, value }
}

// ref for lumens: http://www.power-sure.com/lumens.htm
const BULB_LUMINOUS_POWERS: &[LightLevel] = &[
    level("110000 lm (1000W)", 110_000.0),
    level("3500 lm (300W)", 3_500.0),
    level("1700 lm (100W)", 1_700.0),
    level("800 lm (60W)", 800.0),
    level("400 lm (40W)", 400.0),
    level("180 lm (25W)", 180.0),
    level("20 lm (4W)", 20.0),
    level("Off", 0.0),
];

// ref for solar irradiances: https://en.wikipedia.org/wiki/Lux
const HEMI_IRRADIANCES: &[LightLevel] = &[
    level("0.0001 lx (Moonless Night)", 0.0001),
    level("0.002 lx (Night Airglow)", 0.002),
    level("0.5 lx (Full Moon)", 0.5),
    level("3.4 lx (City Twilight)", 3.4),
    level("50 lx (Living Room)", 50.0),
    level("100 lx (Very Overcast)", 100.0),
    level("350 lx (Office Room)", 350.0),
    level("400 lx (Sunrise/Sunset)", 400.0),
    level("1000 lx (Overcast)", 1_000.0),
    level("18000 lx (Daylight)", 18_000.0),
    level("50000 lx (Direct Sun)", 50_000.0),
];

/// Which physical quantity a catalog describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Catalog {
    /// Point light luminous power, in lumens.
    BulbPower,
    /// Hemisphere light irradiance, in lux.
    HemiIrradiance,
}

impl Catalog {
    pub fn levels(self) -> &'static [LightLevel] {
        match self {
            Self::BulbPower => BULB_LUMINOUS_POWERS,
            Self::HemiIrradiance => HEMI_IRRADIANCES,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::BulbPower => "bulb power",
            Self::HemiIrradiance => "hemisphere irradiance",
        }
    }

    pub fn unit(self) -> &'static str {
        match self {
            Self::BulbPower => "lm",
            Self::HemiIrradiance => "lx",
        }
    }

    /// Labels in presentation order.
    pub fn labels(self) -> impl Iterator<Item = &'static str> {
        self.levels().iter().map(|level| level.label)
    }

    pub fn value_of(self, label: &str) -> Option<f32> {
        self.levels()
            .iter()
            .find(|level| level.label == label)
            .map(|level| level.value)
    }

    /// Validates a label and returns a selection that always resolves.
    pub fn select(self, label: &str) -> Result<Selection, CatalogError> {
        self.levels()
            .iter()
            .position(|level| level.label == label)
            .map(|index| Selection {
                catalog: self,
                index,
            })
            .ok_or_else(|| CatalogError::UnknownLabel {
                catalog: self.name(),
                label: label.to_string(),
                expected: self.labels().collect::<Vec<_>>().join(", "),
            })
    }

    /// Mid-range bulb and the darkest sky, so the first frame is not blown out.
    pub fn default_selection(self) -> Selection {
        let index = match self {
            Self::BulbPower => 4,
            Self::HemiIrradiance => 0,
        };
        Selection {
            catalog: self,
            index,
        }
    }
}

/// A validated position inside one catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Selection {
    catalog: Catalog,
    index: usize,
}

impl Selection {
    pub fn catalog(self) -> Catalog {
        self.catalog
    }

    pub fn level(self) -> LightLevel {
        // `index` only ever comes from `select`, `default_selection` or `next`.
        self.catalog.levels()[self.index]
    }

    pub fn label(self) -> &'static str {
        self.level().label
    }

    pub fn value(self) -> f32 {
        self.level().value
    }

    /// The following level, wrapping around at the end of the table.
    pub fn next(self) -> Self {
        Self {
            catalog: self.catalog,
            index: (self.index + 1) % self.catalog.levels().len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    const CATALOGS: [Catalog; 2] = [Catalog::BulbPower, Catalog::HemiIrradiance];

    #[test]
    fn every_level_is_non_negative() {
        for catalog in CATALOGS {
            for level in catalog.levels() {
                assert!(level.value >= 0.0, "{} is negative", level.label);
            }
        }
        assert_eq!(Catalog::BulbPower.value_of("Off"), Some(0.0));
    }

    #[test]
    fn labels_are_unique_within_a_catalog() {
        for catalog in CATALOGS {
            let unique: HashSet<_> = catalog.labels().collect();
            assert_eq!(unique.len(), catalog.levels().len());
        }
    }

    #[test]
    fn catalogs_do_not_share_labels() {
        let bulb: HashSet<_> = Catalog::BulbPower.labels().collect();
        assert!(Catalog::HemiIrradiance
            .labels()
            .all(|label| !bulb.contains(label)));
    }

    #[test]
    fn selecting_a_label_resolves_to_the_stored_value() {
        for catalog in CATALOGS {
            for level in catalog.levels() {
                let selection = catalog.select(level.label).unwrap();
                assert_eq!(selection.value(), level.value);
                assert_eq!(selection.label(), level.label);
                assert_eq!(catalog.value_of(level.label), Some(level.value));
            }
        }
    }

    #[test]
    fn defaults_pick_the_40w_bulb_and_darkest_sky() {
        let bulb = Catalog::BulbPower.default_selection();
        assert_eq!(bulb.label(), "400 lm (40W)");
        assert_eq!(bulb.value(), 400.0);
        let hemi = Catalog::HemiIrradiance.default_selection();
        assert_eq!(hemi.label(), "0.0001 lx (Moonless Night)");
        assert_eq!(hemi.value(), 0.0001);
    }

    #[test]
    fn unknown_label_is_rejected() {
        let err = Catalog::HemiIrradiance.select("9000 lx").unwrap_err();
        let CatalogError::UnknownLabel { catalog, label, .. } = err;
        assert_eq!(catalog, "hemisphere irradiance");
        assert_eq!(label, "9000 lx");
        assert_eq!(Catalog::BulbPower.value_of("0.5 lx (Full Moon)"), None);
    }

    #[test]
    fn next_wraps_around() {
        let last = Catalog::BulbPower.select("Off").unwrap();
        assert_eq!(last.next().label(), "110000 lm (1000W)");
        let first = Catalog::HemiIrradiance.default_selection();
        assert_eq!(first.next().label(), "0.002 lx (Night Airglow)");
    }
}
