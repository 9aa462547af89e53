use crate::algorithms::fusion::{FusionParams, RangingMode};
use crate::api::shared::Shared;
use log::LevelFilter;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Number of stored SEAKER configuration presets
pub const MAX_ACOUSTIC_PRESETS: usize = 4;

/// Acoustic sensor mounting calibration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    /// Mirror the bearing before applying the offset
    pub invert_angle: bool,
    /// Added to the (possibly inverted) bearing (degrees)
    pub angle_offset_deg: f64,
}

/// Acoustic measurement error model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UncertaintyConfig {
    /// Bearing standard deviation (degrees)
    pub angle_sigma_deg: f64,
    /// Range standard deviation as a fraction of range
    pub range_rel_error: f64,
}

/// Target filter tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KalmanConfig {
    /// Process noise as acceleration standard deviation (m/s^2)
    pub accel_std: f64,
    /// Innovation gate (sigma); filtered fixes need innovation below it
    pub gate: f64,
}

/// When fusion runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionCadenceConfig {
    /// Minimum spacing of ping-triggered computations (ms)
    pub min_emit_interval_ms: u64,
    /// Fallback computation period (ms), 0 disables
    pub periodic_interval_ms: u64,
}

/// Runtime configuration shared by the readers and the tracker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub calibration: CalibrationConfig,
    pub uncertainty: UncertaintyConfig,
    pub kalman: KalmanConfig,
    pub ranging_mode: RangingMode,
    /// Reject pings whose turnaround time is off the ping period
    pub tat_filter_enabled: bool,
    pub fusion: FusionCadenceConfig,
    /// `CONFIG,...` payloads that can be sent to the SEAKER unit
    pub acoustic_presets: Vec<String>,
    /// Console log level (error, warn, info, debug, trace, off)
    pub log_level: String,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            invert_angle: false,
            angle_offset_deg: 0.0,
        }
    }
}

impl Default for UncertaintyConfig {
    fn default() -> Self {
        Self {
            angle_sigma_deg: 3.0,
            range_rel_error: 0.005,
        }
    }
}

impl Default for KalmanConfig {
    fn default() -> Self {
        Self {
            accel_std: 0.5,
            gate: 4.0,
        }
    }
}

impl Default for FusionCadenceConfig {
    fn default() -> Self {
        Self {
            min_emit_interval_ms: 250,
            periodic_interval_ms: 2000,
        }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            calibration: CalibrationConfig::default(),
            uncertainty: UncertaintyConfig::default(),
            kalman: KalmanConfig::default(),
            ranging_mode: RangingMode::Normal,
            tat_filter_enabled: true,
            fusion: FusionCadenceConfig::default(),
            acoustic_presets: vec![
                "CONFIG,1,1,1500,0,0,0,0,0,0,1,1,1,0,0,0,0,0,0,0".to_string(),
                "CONFIG,2,1,1500,0,0,0,0,0,2,1,6,1,0,0,0,0,0,0,0".to_string(),
                "CONFIG,5,1,1500,0,0,0,0,0,2,1,5,1,0,0,0,0,0,0,0".to_string(),
                "CONFIG,7,1,1500,0,0,0,0,0,2,1,7,1,0,0,0,0,0,0,0".to_string(),
            ],
            log_level: "info".to_string(),
        }
    }
}

impl RuntimeConfig {
    /// Parameters for one fusion computation
    pub fn fusion_params(&self) -> FusionParams {
        FusionParams {
            invert_angle: self.calibration.invert_angle,
            angle_offset_deg: self.calibration.angle_offset_deg,
            angle_sigma_deg: self.uncertainty.angle_sigma_deg,
            range_rel_error: self.uncertainty.range_rel_error,
            ranging_mode: self.ranging_mode,
        }
    }

    /// Parsed log level, `Info` when the text is not a level name
    pub fn level_filter(&self) -> LevelFilter {
        LevelFilter::from_str(&self.log_level).unwrap_or(LevelFilter::Info)
    }
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// Invalid parameter value
    #[error("invalid {parameter} = {value}: {reason}")]
    InvalidParameter { parameter: String, value: String, reason: String },
    /// Configuration file I/O error
    #[error("{message}")]
    IoError { message: String },
    /// JSON serialization/deserialization error
    #[error("{message}")]
    SerializationError { message: String },
}

impl ConfigError {
    fn invalid(parameter: &str, value: impl ToString, reason: &str) -> Self {
        ConfigError::InvalidParameter {
            parameter: parameter.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Configuration validation result
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// Whether configuration is valid
    pub is_valid: bool,
    pub errors: Vec<ConfigError>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    fn into_result(self) -> Result<(), ConfigError> {
        match self.errors.into_iter().next() {
            Some(first) => Err(first),
            None => Ok(()),
        }
    }
}

fn check_angle_offset(value: f64) -> Result<(), ConfigError> {
    if !value.is_finite() {
        return Err(ConfigError::invalid("calibration.angle_offset_deg", value, "must be finite"));
    }
    Ok(())
}

fn check_angle_sigma(value: f64) -> Result<(), ConfigError> {
    if !value.is_finite() || value < 0.0 {
        return Err(ConfigError::invalid(
            "uncertainty.angle_sigma_deg",
            value,
            "must be a non-negative number of degrees",
        ));
    }
    Ok(())
}

fn check_range_rel_error(value: f64) -> Result<(), ConfigError> {
    if !value.is_finite() || !(0.0..=1.0).contains(&value) {
        return Err(ConfigError::invalid("uncertainty.range_rel_error", value, "must be between 0 and 1"));
    }
    Ok(())
}

fn check_accel_std(value: f64) -> Result<(), ConfigError> {
    if !value.is_finite() || value < 0.0 {
        return Err(ConfigError::invalid("kalman.accel_std", value, "must be non-negative"));
    }
    Ok(())
}

fn check_gate(value: f64) -> Result<(), ConfigError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(ConfigError::invalid("kalman.gate", value, "must be positive"));
    }
    Ok(())
}

fn check_ranging_mode(mode: &RangingMode) -> Result<(), ConfigError> {
    match *mode {
        RangingMode::Normal => Ok(()),
        RangingMode::Offset { offset_m } if offset_m.is_finite() => Ok(()),
        RangingMode::Offset { offset_m } => {
            Err(ConfigError::invalid("ranging_mode.offset_m", offset_m, "must be finite"))
        }
        RangingMode::Transponder { delay_ms } if delay_ms.is_finite() && delay_ms >= 0.0 => Ok(()),
        RangingMode::Transponder { delay_ms } => {
            Err(ConfigError::invalid("ranging_mode.delay_ms", delay_ms, "must be non-negative"))
        }
    }
}

fn check_preset(index: usize, payload: &str) -> Result<(), ConfigError> {
    if index >= MAX_ACOUSTIC_PRESETS {
        return Err(ConfigError::invalid(
            "acoustic_presets",
            index,
            "preset slot out of range",
        ));
    }
    if payload.contains(&['$', '*', '\r', '\n'][..]) {
        return Err(ConfigError::invalid(
            "acoustic_presets",
            payload,
            "payload must not contain framing characters",
        ));
    }
    Ok(())
}

fn check_log_level(level: &str) -> Result<(), ConfigError> {
    LevelFilter::from_str(level)
        .map(|_| ())
        .map_err(|_| ConfigError::invalid("log_level", level, "unknown log level"))
}

/// Owns the runtime configuration and its file.
///
/// Every accepted change is published to the shared handle, so readers and
/// the tracker see it on their next computation.
pub struct ConfigurationManager {
    config: Shared<RuntimeConfig>,
    /// Configuration file path
    config_file_path: Option<String>,
    /// Whether configuration has been modified
    is_modified: bool,
}

impl Default for ConfigurationManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigurationManager {
    /// Create a new configuration manager with default settings
    pub fn new() -> Self {
        Self {
            config: Shared::new(RuntimeConfig::default()),
            config_file_path: None,
            is_modified: false,
        }
    }

    /// Create configuration manager and load from file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut manager = Self::new();
        manager.load_from_file(path)?;
        Ok(manager)
    }

    /// Handle read by the runtime
    pub fn handle(&self) -> Shared<RuntimeConfig> {
        self.config.clone()
    }

    /// Copy of the current configuration
    pub fn config(&self) -> RuntimeConfig {
        self.config.snapshot()
    }

    /// Replace the whole configuration with validation
    pub fn update_config(&mut self, config: RuntimeConfig) -> Result<(), ConfigError> {
        Self::validate(&config).into_result()?;
        self.config.publish(config);
        self.is_modified = true;
        Ok(())
    }

    /// Check every field; errors make the configuration unusable, warnings do not
    pub fn validate(config: &RuntimeConfig) -> ValidationResult {
        let mut result = ValidationResult::default();
        let checks = [
            check_angle_offset(config.calibration.angle_offset_deg),
            check_angle_sigma(config.uncertainty.angle_sigma_deg),
            check_range_rel_error(config.uncertainty.range_rel_error),
            check_accel_std(config.kalman.accel_std),
            check_gate(config.kalman.gate),
            check_ranging_mode(&config.ranging_mode),
            check_log_level(&config.log_level),
        ];
        result.errors.extend(checks.into_iter().filter_map(Result::err));

        if config.acoustic_presets.len() > MAX_ACOUSTIC_PRESETS {
            result.errors.push(ConfigError::invalid(
                "acoustic_presets",
                config.acoustic_presets.len(),
                "too many presets",
            ));
        }
        for (index, preset) in config.acoustic_presets.iter().enumerate().take(MAX_ACOUSTIC_PRESETS) {
            if let Err(e) = check_preset(index, preset) {
                result.errors.push(e);
            }
        }

        if config.uncertainty.angle_sigma_deg > 45.0 {
            result.warnings.push("Bearing sigma above 45 degrees makes fixes meaningless".to_string());
        }
        if config.kalman.gate < 1.0 {
            result.warnings.push("Gate below 1 sigma rejects most measurements".to_string());
        }
        if !config.tat_filter_enabled {
            result.warnings.push("TAT filter disabled: spurious pings reach the tracker".to_string());
        }
        if config.fusion.periodic_interval_ms != 0
            && config.fusion.periodic_interval_ms < config.fusion.min_emit_interval_ms
        {
            result.warnings.push("Periodic fusion interval shorter than the ping rate limit".to_string());
        }

        result.is_valid = result.errors.is_empty();
        result
    }

    /// Load configuration from JSON file
    pub fn load_from_file<P: AsRef<Path>>(&mut self, path: P) -> Result<(), ConfigError> {
        let path_str = path.as_ref().to_string_lossy().to_string();

        let content = fs::read_to_string(&path).map_err(|e| ConfigError::IoError {
            message: format!("Failed to read config file '{}': {}", path_str, e),
        })?;

        let config: RuntimeConfig = serde_json::from_str(&content).map_err(|e| ConfigError::SerializationError {
            message: format!("Failed to parse config file '{}': {}", path_str, e),
        })?;

        Self::validate(&config).into_result()?;

        self.config.publish(config);
        self.config_file_path = Some(path_str);
        self.is_modified = false;
        Ok(())
    }

    /// Save configuration to JSON file
    pub fn save_to_file<P: AsRef<Path>>(&mut self, path: P) -> Result<(), ConfigError> {
        let path_str = path.as_ref().to_string_lossy().to_string();

        let content = serde_json::to_string_pretty(&self.config.snapshot()).map_err(|e| {
            ConfigError::SerializationError {
                message: format!("Failed to serialize config: {}", e),
            }
        })?;

        fs::write(&path, content).map_err(|e| ConfigError::IoError {
            message: format!("Failed to write config file '{}': {}", path_str, e),
        })?;

        self.config_file_path = Some(path_str);
        self.is_modified = false;
        Ok(())
    }

    /// Save to the currently loaded file path
    pub fn save(&mut self) -> Result<(), ConfigError> {
        match self.config_file_path.clone() {
            Some(path) => self.save_to_file(path),
            None => Err(ConfigError::IoError {
                message: "No file path set for saving configuration".to_string(),
            }),
        }
    }

    /// Check if configuration has been modified since last save
    pub fn is_modified(&self) -> bool {
        self.is_modified
    }

    // Runtime parameter adjustment; each setter returns the previous value

    fn apply<T>(&mut self, f: impl FnOnce(&mut RuntimeConfig) -> T) -> T {
        let old = self.config.update(f);
        self.is_modified = true;
        old
    }

    pub fn set_invert_angle(&mut self, invert: bool) -> bool {
        self.apply(|c| std::mem::replace(&mut c.calibration.invert_angle, invert))
    }

    pub fn set_angle_offset(&mut self, offset_deg: f64) -> Result<f64, ConfigError> {
        check_angle_offset(offset_deg)?;
        Ok(self.apply(|c| std::mem::replace(&mut c.calibration.angle_offset_deg, offset_deg)))
    }

    pub fn set_angle_sigma(&mut self, sigma_deg: f64) -> Result<f64, ConfigError> {
        check_angle_sigma(sigma_deg)?;
        Ok(self.apply(|c| std::mem::replace(&mut c.uncertainty.angle_sigma_deg, sigma_deg)))
    }

    pub fn set_range_rel_error(&mut self, rel: f64) -> Result<f64, ConfigError> {
        check_range_rel_error(rel)?;
        Ok(self.apply(|c| std::mem::replace(&mut c.uncertainty.range_rel_error, rel)))
    }

    pub fn set_kalman_accel_std(&mut self, accel_std: f64) -> Result<f64, ConfigError> {
        check_accel_std(accel_std)?;
        Ok(self.apply(|c| std::mem::replace(&mut c.kalman.accel_std, accel_std)))
    }

    pub fn set_kalman_gate(&mut self, gate: f64) -> Result<f64, ConfigError> {
        check_gate(gate)?;
        Ok(self.apply(|c| std::mem::replace(&mut c.kalman.gate, gate)))
    }

    pub fn set_ranging_mode(&mut self, mode: RangingMode) -> Result<RangingMode, ConfigError> {
        check_ranging_mode(&mode)?;
        Ok(self.apply(|c| std::mem::replace(&mut c.ranging_mode, mode)))
    }

    pub fn set_tat_filter(&mut self, enabled: bool) -> bool {
        self.apply(|c| std::mem::replace(&mut c.tat_filter_enabled, enabled))
    }

    pub fn set_fusion_cadence(&mut self, min_emit_interval_ms: u64, periodic_interval_ms: u64) -> FusionCadenceConfig {
        let cadence = FusionCadenceConfig {
            min_emit_interval_ms,
            periodic_interval_ms,
        };
        self.apply(|c| std::mem::replace(&mut c.fusion, cadence))
    }

    /// Store a SEAKER preset payload (without `$` and checksum) in a slot
    pub fn set_acoustic_preset(&mut self, index: usize, payload: &str) -> Result<String, ConfigError> {
        check_preset(index, payload)?;
        let payload = payload.trim().to_string();
        Ok(self.apply(|c| {
            if c.acoustic_presets.len() <= index {
                c.acoustic_presets.resize(index + 1, String::new());
            }
            std::mem::replace(&mut c.acoustic_presets[index], payload)
        }))
    }

    pub fn set_log_level(&mut self, level: &str) -> Result<String, ConfigError> {
        check_log_level(level)?;
        let level = level.to_ascii_lowercase();
        let old = self.apply(|c| std::mem::replace(&mut c.log_level, level));
        log::set_max_level(self.config.read(|c| c.level_filter()));
        Ok(old)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = RuntimeConfig::default();
        let result = ConfigurationManager::validate(&config);
        assert!(result.is_valid);
        assert!(result.warnings.is_empty());
        assert_eq!(config.acoustic_presets.len(), MAX_ACOUSTIC_PRESETS);
        assert_eq!(config.level_filter(), LevelFilter::Info);

        let params = config.fusion_params();
        assert_eq!(params, FusionParams::default());
    }

    #[test]
    fn test_setters_return_previous_value() {
        let mut manager = ConfigurationManager::new();
        let handle = manager.handle();
        assert!(!manager.is_modified());

        assert_eq!(manager.set_angle_offset(12.5).unwrap(), 0.0);
        assert_eq!(manager.set_angle_offset(-3.0).unwrap(), 12.5);
        assert!(!manager.set_invert_angle(true));
        assert_eq!(manager.set_kalman_gate(3.0).unwrap(), 4.0);
        assert_eq!(
            manager.set_ranging_mode(RangingMode::Transponder { delay_ms: 1000.0 }).unwrap(),
            RangingMode::Normal
        );
        assert!(manager.set_tat_filter(false));
        assert!(manager.is_modified());

        // Published to the shared handle
        let seen = handle.snapshot();
        assert_eq!(seen.calibration.angle_offset_deg, -3.0);
        assert!(seen.calibration.invert_angle);
        assert_eq!(seen.kalman.gate, 3.0);
        assert!(!seen.tat_filter_enabled);
    }

    #[test]
    fn test_setter_validation() {
        let mut manager = ConfigurationManager::new();
        assert!(manager.set_angle_sigma(-1.0).is_err());
        assert!(manager.set_range_rel_error(1.5).is_err());
        assert!(manager.set_kalman_accel_std(f64::NAN).is_err());
        assert!(manager.set_kalman_gate(0.0).is_err());
        assert!(manager.set_ranging_mode(RangingMode::Transponder { delay_ms: -5.0 }).is_err());
        assert!(manager.set_acoustic_preset(4, "CONFIG,1").is_err());
        assert!(manager.set_acoustic_preset(0, "$CONFIG,1").is_err());
        assert!(manager.set_log_level("loud").is_err());
        assert!(!manager.is_modified());
        assert_eq!(manager.config(), RuntimeConfig::default());
    }

    #[test]
    fn test_preset_slots() {
        let mut manager = ConfigurationManager::new();
        let old = manager.set_acoustic_preset(1, " CONFIG,9,1,1500 ").unwrap();
        assert!(old.starts_with("CONFIG,2,"));
        assert_eq!(manager.config().acoustic_presets[1], "CONFIG,9,1,1500");
    }

    #[test]
    fn test_validation_reports_every_error() {
        let mut config = RuntimeConfig::default();
        config.kalman.gate = -1.0;
        config.uncertainty.angle_sigma_deg = f64::INFINITY;
        config.log_level = "chatty".to_string();
        let result = ConfigurationManager::validate(&config);
        assert!(!result.is_valid);
        assert_eq!(result.errors.len(), 3);

        let mut manager = ConfigurationManager::new();
        assert!(manager.update_config(config).is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: RuntimeConfig = serde_json::from_str(
            r#"{"kalman":{"gate":5.0},"ranging_mode":{"mode":"offset","offset_m":1.5}}"#,
        )
        .unwrap();
        assert_eq!(config.kalman.gate, 5.0);
        assert_eq!(config.kalman.accel_std, 0.5);
        assert_eq!(config.ranging_mode, RangingMode::Offset { offset_m: 1.5 });
        assert!(config.tat_filter_enabled);
    }

    #[test]
    fn test_file_round_trip() {
        let path = std::env::temp_dir().join(format!("seaker-config-{}.json", std::process::id()));
        let mut manager = ConfigurationManager::new();
        manager.set_angle_offset(7.0).unwrap();
        manager.save_to_file(&path).unwrap();
        assert!(!manager.is_modified());

        let loaded = ConfigurationManager::from_file(&path).unwrap();
        assert_eq!(loaded.config().calibration.angle_offset_deg, 7.0);
        let _ = fs::remove_file(&path);

        assert!(matches!(
            ConfigurationManager::from_file(path.with_extension("missing")),
            Err(ConfigError::IoError { .. })
        ));
        assert!(matches!(ConfigurationManager::new().save(), Err(ConfigError::IoError { .. })));
    }
}
