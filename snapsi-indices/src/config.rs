use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::calendar::DayOfYear;
use crate::labeled::{LAT, LON};
use crate::lowpass::window_length;
use crate::region::Region;
use crate::types::IndexError;

/// Which circulation index a preset describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexKind {
    /// North Atlantic Oscillation
    Nao,
    /// Northern Annular Mode
    Nam,
    /// Southern Annular Mode
    Sam,
}

/// Latitudes compared to fix the sign of a pattern.
///
/// The sign is chosen so that the zonal-mean pattern at `mid_lat` minus the
/// zonal-mean pattern at `high_lat` is positive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignConvention {
    pub mid_lat: f64,
    pub high_lat: f64,
}

impl SignConvention {
    pub const NORTH: SignConvention = SignConvention {
        mid_lat: 35.0,
        high_lat: 70.0,
    };
    pub const SOUTH: SignConvention = SignConvention {
        mid_lat: -35.0,
        high_lat: -70.0,
    };
}

/// Configuration for EOF and index computation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Lowpass window in days.
    pub window_days: f64,
    /// Time step of the data in days (0.25 for 6-hourly).
    pub dt: f64,
    /// Trim filter edges affected by wrap-around.
    pub valid: bool,
    /// Calendar months kept for the EOF (1..=12).
    pub season_months: Vec<u32>,
    /// Spatial axes the EOF is computed over.
    pub stack_axes: Vec<String>,
    pub region: Region,
    pub sign: SignConvention,
    /// Day-of-year grouping used when removing the climatological index.
    pub day_of_year: DayOfYear,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self::preset(IndexKind::Nao)
    }
}

impl IndexConfig {
    /// Winter (DJF) 30-day lowpass on 6-hourly data, over the preset's region.
    pub fn preset(kind: IndexKind) -> Self {
        let (region, sign) = match kind {
            IndexKind::Nao => (Region::NAO, SignConvention::NORTH),
            IndexKind::Nam => (Region::NAM, SignConvention::NORTH),
            IndexKind::Sam => (Region::SAM, SignConvention::SOUTH),
        };
        Self {
            window_days: 30.0,
            dt: 0.25,
            valid: false,
            season_months: vec![12, 1, 2],
            stack_axes: vec![LAT.to_string(), LON.to_string()],
            region,
            sign,
            day_of_year: DayOfYear::Standard,
        }
    }

    /// Filter window length in samples.
    pub fn window_length(&self) -> Result<usize, IndexError> {
        window_length(self.window_days, self.dt)
    }

    pub fn stack_axes(&self) -> Vec<&str> {
        self.stack_axes.iter().map(String::as_str).collect()
    }

    /// Check parameter ranges.
    pub fn validate(&self) -> Result<(), IndexError> {
        self.window_length()?;
        if self.season_months.is_empty() {
            return Err(IndexError::InvalidInput("no season months configured".into()));
        }
        if let Some(bad) = self.season_months.iter().find(|m| !(1..=12).contains(*m)) {
            return Err(IndexError::InvalidInput(format!("invalid month {bad}")));
        }
        if self.stack_axes.is_empty() {
            return Err(IndexError::InvalidInput("no stack axes configured".into()));
        }
        Ok(())
    }

    /// Parse a TOML document. Keys that are present override the preset named
    /// by `preset` (NAO if absent).
    ///
    /// ```toml
    /// preset = "sam"
    /// window_days = 20.0
    /// season_months = [6, 7, 8]
    /// ```
    pub fn from_toml_str(s: &str) -> Result<Self, IndexError> {
        let t: IndexToml = toml::from_str(s)?;
        let mut cfg = Self::preset(t.preset.unwrap_or(IndexKind::Nao));
        if let Some(v) = t.window_days {
            cfg.window_days = v;
        }
        if let Some(v) = t.dt {
            cfg.dt = v;
        }
        if let Some(v) = t.valid {
            cfg.valid = v;
        }
        if let Some(v) = t.season_months {
            cfg.season_months = v;
        }
        if let Some(v) = t.stack_axes {
            cfg.stack_axes = v;
        }
        if let Some(v) = t.region {
            cfg.region = v;
        }
        if let Some(v) = t.sign {
            cfg.sign = v;
        }
        if let Some(v) = t.day_of_year {
            cfg.day_of_year = v;
        }
        cfg.validate()?;
        Ok(cfg)
    }

    /// Read and parse a TOML file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, IndexError> {
        let path = path.as_ref();
        let s = std::fs::read_to_string(path)?;
        let cfg = Self::from_toml_str(&s)?;
        info!(path = %path.display(), window = cfg.window_length()?, "loaded index config");
        Ok(cfg)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct IndexToml {
    preset: Option<IndexKind>,
    window_days: Option<f64>,
    dt: Option<f64>,
    valid: Option<bool>,
    season_months: Option<Vec<u32>>,
    stack_axes: Option<Vec<String>>,
    region: Option<Region>,
    sign: Option<SignConvention>,
    day_of_year: Option<DayOfYear>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_nao() {
        let cfg = IndexConfig::default();
        assert_eq!(cfg.window_length().unwrap(), 121);
        assert_eq!(cfg.region, Region::NAO);
        assert_eq!(cfg.season_months, vec![12, 1, 2]);
        assert_eq!(cfg.stack_axes(), vec!["lat", "lon"]);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_sam_preset_signs_southward() {
        let cfg = IndexConfig::preset(IndexKind::Sam);
        assert_eq!(cfg.sign, SignConvention::SOUTH);
        assert_eq!(cfg.region.lat, (-90.0, -20.0));
    }

    #[test]
    fn test_toml_overrides_preset() {
        let cfg = IndexConfig::from_toml_str(
            r#"
            preset = "nam"
            window_days = 10.0
            dt = 1.0
            valid = true
            day_of_year = "noleap"

            [region]
            lat = [30.0, 85.0]
            "#,
        )
        .unwrap();
        assert_eq!(cfg.window_length().unwrap(), 11);
        assert!(cfg.valid);
        assert_eq!(cfg.day_of_year, DayOfYear::NoLeap);
        assert_eq!(cfg.region.lat, (30.0, 85.0));
        assert_eq!(cfg.region.lon, None);
        assert_eq!(cfg.sign, SignConvention::NORTH);
    }

    #[test]
    fn test_toml_rejects_bad_values() {
        assert!(matches!(
            IndexConfig::from_toml_str("unknown_key = 1"),
            Err(IndexError::Config(_))
        ));
        assert!(matches!(
            IndexConfig::from_toml_str("season_months = [0]"),
            Err(IndexError::InvalidInput(_))
        ));
        assert!(matches!(
            IndexConfig::from_toml_str("dt = -1.0"),
            Err(IndexError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_from_missing_path() {
        assert!(matches!(
            IndexConfig::from_path("/nonexistent/index.toml"),
            Err(IndexError::Io(_))
        ));
    }
}
