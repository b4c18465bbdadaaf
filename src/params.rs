use log::info;

use crate::catalog::{Catalog, Selection};
use crate::error::CatalogError;
use crate::input::KeyCode;

/// Exposure change applied by one press of the exposure keys.
pub const EXPOSURE_STEP: f32 = 0.02;

/// Live, user-adjustable lighting configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParameterState {
    pub shadows_enabled: bool,
    exposure: f32,
    pub bulb: Selection,
    pub hemi: Selection,
}

impl Default for ParameterState {
    fn default() -> Self {
        Self {
            shadows_enabled: true,
            exposure: 0.68,
            bulb: Catalog::BulbPower.default_selection(),
            hemi: Catalog::HemiIrradiance.default_selection(),
        }
    }
}

impl ParameterState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn exposure(&self) -> f32 {
        self.exposure
    }

    /// Stores `exposure` clamped into `[0, 1]`. NaN falls back to zero.
    pub fn set_exposure(&mut self, exposure: f32) {
        self.exposure = if exposure.is_nan() {
            0.0
        } else {
            exposure.clamp(0.0, 1.0)
        };
    }

    pub fn select_bulb(&mut self, label: &str) -> Result<(), CatalogError> {
        self.bulb = Catalog::BulbPower.select(label)?;
        Ok(())
    }

    pub fn select_hemi(&mut self, label: &str) -> Result<(), CatalogError> {
        self.hemi = Catalog::HemiIrradiance.select(label)?;
        Ok(())
    }

    pub fn apply(&mut self, command: ParameterCommand) {
        match command {
            ParameterCommand::NextBulbLevel => self.bulb = self.bulb.next(),
            ParameterCommand::NextHemiLevel => self.hemi = self.hemi.next(),
            ParameterCommand::RaiseExposure => self.set_exposure(self.exposure + EXPOSURE_STEP),
            ParameterCommand::LowerExposure => self.set_exposure(self.exposure - EXPOSURE_STEP),
            ParameterCommand::ToggleShadows => self.shadows_enabled = !self.shadows_enabled,
        }
        info!(
            "settings: bulb={:?} hemi={:?} exposure={:.2} shadows={}",
            self.bulb.label(),
            self.hemi.label(),
            self.exposure,
            self.shadows_enabled
        );
    }
}

/// Edit requested through the keyboard settings bindings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterCommand {
    NextBulbLevel,
    NextHemiLevel,
    RaiseExposure,
    LowerExposure,
    ToggleShadows,
}

impl ParameterCommand {
    pub fn for_key(key: KeyCode) -> Option<Self> {
        match key {
            KeyCode::Character('B') => Some(Self::NextBulbLevel),
            KeyCode::Character('H') => Some(Self::NextHemiLevel),
            KeyCode::Character('E') => Some(Self::RaiseExposure),
            KeyCode::Character('Q') => Some(Self::LowerExposure),
            KeyCode::Character('S') => Some(Self::ToggleShadows),
            _ => None,
        }
    }
}
