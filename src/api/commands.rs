//! Capability document construction.
//!
//! Maps the user-facing cooking vocabulary (pressure level names, venting
//! modes, durations) onto the vendor's capability/setting document shape.
//! The ids and value layouts come straight from traffic captures of the
//! vendor app; the executor treats the finished document as opaque.

use serde::Serialize;
use thiserror::Error;

const CAPABILITY_PRESSURE_COOK: &str = "kitchenos:InstantBrands:PressureCook";
const CAPABILITY_KEEP_WARM: &str = "kitchenos:InstantBrands:KeepWarm";

const SETTING_PRESSURE: &str = "kitchenos:InstantBrands:PressureSetting";
const SETTING_TIME: &str = "kitchenos:InstantBrands:TimeSetting";
const SETTING_VENTING: &str = "kitchenos:InstantBrands:VentingSetting";
const SETTING_VENTING_TIME: &str = "kitchenos:InstantBrands:VentingTimeSetting";
const SETTING_NUTRIBOOST: &str = "kitchenos:InstantBrands:NutriBoostSetting";
const SETTING_TEMPERATURE: &str = "kitchenos:InstantBrands:TemperatureSetting";

const UNIT_CELSIUS: &str = "cckg:Celsius";
const UNIT_SECOND: &str = "cckg:Second";

/// Command kind accepted by `/cooking/execute`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CommandKind {
    #[serde(rename = "kitchenos:Command:Start")]
    Start,
    #[serde(rename = "kitchenos:Command:Update")]
    Update,
    #[serde(rename = "kitchenos:Command:Cancel")]
    Cancel,
}

impl CommandKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandKind::Start => "kitchenos:Command:Start",
            CommandKind::Update => "kitchenos:Command:Update",
            CommandKind::Cancel => "kitchenos:Command:Cancel",
        }
    }
}

impl std::fmt::Display for CommandKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pressure level selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PressureLevel {
    Low,
    High,
    Max,
}

impl PressureLevel {
    fn reference_value_id(&self) -> &'static str {
        match self {
            PressureLevel::Low => "kitchenos:InstantBrands:PressureLow",
            PressureLevel::High => "kitchenos:InstantBrands:PressureHigh",
            PressureLevel::Max => "kitchenos:InstantBrands:PressureMax",
        }
    }
}

/// Steam venting behavior after the cook completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VentingMode {
    #[default]
    Natural,
    Pulse,
    Quick,
    NaturalQuick,
}

impl VentingMode {
    fn reference_value_id(&self) -> &'static str {
        match self {
            VentingMode::Natural => "kitchenos:InstantBrands:VentingNatural",
            VentingMode::Pulse => "kitchenos:InstantBrands:VentingPulse",
            VentingMode::Quick => "kitchenos:InstantBrands:VentingQuick",
            VentingMode::NaturalQuick => "kitchenos:InstantBrands:VentingNaturalQuick",
        }
    }
}

/// Keep-warm temperature: an explicit Celsius value or a vendor preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeepWarmTarget {
    Celsius(u32),
    Low,
    High,
}

impl KeepWarmTarget {
    fn setting(&self) -> CapabilitySetting {
        match self {
            KeepWarmTarget::Celsius(temp) => CapabilitySetting::new(
                SETTING_TEMPERATURE,
                SettingValue::numeric(i64::from(*temp), UNIT_CELSIUS),
            ),
            KeepWarmTarget::Low => CapabilitySetting::new(
                SETTING_TEMPERATURE,
                SettingValue::nominal("kitchenos:InstantBrands:TemperatureLow"),
            ),
            KeepWarmTarget::High => CapabilitySetting::new(
                SETTING_TEMPERATURE,
                SettingValue::nominal("kitchenos:InstantBrands:TemperatureHigh"),
            ),
        }
    }
}

/// One setting value in the vendor's `{type, value, reference_unit_id,
/// reference_value_id}` layout. Unused slots are serialized as explicit
/// nulls, matching the captured traffic.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SettingValue {
    Numeric {
        value: i64,
        reference_unit_id: Option<String>,
        reference_value_id: Option<String>,
    },
    Nominal {
        reference_value_id: Option<String>,
        reference_unit_id: Option<String>,
    },
    Boolean {
        value: bool,
        reference_unit_id: Option<String>,
        reference_value_id: Option<String>,
    },
}

impl SettingValue {
    pub fn numeric(value: i64, unit: &str) -> Self {
        SettingValue::Numeric {
            value,
            reference_unit_id: Some(unit.to_string()),
            reference_value_id: None,
        }
    }

    pub fn nominal(reference_value_id: &str) -> Self {
        SettingValue::Nominal {
            reference_value_id: Some(reference_value_id.to_string()),
            reference_unit_id: None,
        }
    }

    pub fn boolean(value: bool) -> Self {
        SettingValue::Boolean {
            value,
            reference_unit_id: None,
            reference_value_id: None,
        }
    }
}

/// One setting attached to a capability.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CapabilitySetting {
    pub reference_setting_id: String,
    pub value: SettingValue,
}

impl CapabilitySetting {
    pub fn new(reference_setting_id: &str, value: SettingValue) -> Self {
        Self {
            reference_setting_id: reference_setting_id.to_string(),
            value,
        }
    }
}

/// A controllable feature plus its settings, ready for `/cooking/execute`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CapabilityDocument {
    pub reference_capability_id: String,
    pub settings: Vec<CapabilitySetting>,
}

/// Capability builder error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    /// An update document with no settings would be rejected by the cloud.
    #[error("provide at least one setting to update")]
    EmptyUpdate,
}

/// Settings for starting a pressure cook.
#[derive(Debug, Clone, PartialEq)]
pub struct PressureCookSettings {
    pub pressure: PressureLevel,
    pub cook_time_secs: u32,
    pub venting: VentingMode,
    pub vent_time_secs: Option<u32>,
    pub nutriboost: bool,
}

impl PressureCookSettings {
    pub fn new(pressure: PressureLevel, cook_time_secs: u32) -> Self {
        Self {
            pressure,
            cook_time_secs,
            venting: VentingMode::default(),
            vent_time_secs: None,
            nutriboost: false,
        }
    }

    /// Build the full Start document. Every setting is present; the cloud
    /// rejects partial Start documents.
    pub fn capability(&self) -> CapabilityDocument {
        let mut settings = vec![
            CapabilitySetting::new(
                SETTING_PRESSURE,
                SettingValue::nominal(self.pressure.reference_value_id()),
            ),
            CapabilitySetting::new(
                SETTING_TIME,
                SettingValue::numeric(i64::from(self.cook_time_secs), UNIT_SECOND),
            ),
            CapabilitySetting::new(
                SETTING_VENTING,
                SettingValue::nominal(self.venting.reference_value_id()),
            ),
            CapabilitySetting::new(SETTING_NUTRIBOOST, SettingValue::boolean(self.nutriboost)),
        ];
        if let Some(vent_time) = self.vent_time_secs {
            settings.push(CapabilitySetting::new(
                SETTING_VENTING_TIME,
                SettingValue::numeric(i64::from(vent_time), UNIT_SECOND),
            ));
        }
        CapabilityDocument {
            reference_capability_id: CAPABILITY_PRESSURE_COOK.to_string(),
            settings,
        }
    }
}

/// Partial settings for updating a running pressure cook.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PressureCookUpdate {
    pub pressure: Option<PressureLevel>,
    pub cook_time_secs: Option<u32>,
    pub venting: Option<VentingMode>,
    pub vent_time_secs: Option<u32>,
    pub nutriboost: Option<bool>,
}

impl PressureCookUpdate {
    /// Build an Update document carrying only the provided settings.
    pub fn capability(&self) -> Result<CapabilityDocument, CommandError> {
        let mut settings = Vec::new();
        if let Some(pressure) = self.pressure {
            settings.push(CapabilitySetting::new(
                SETTING_PRESSURE,
                SettingValue::nominal(pressure.reference_value_id()),
            ));
        }
        if let Some(cook_time) = self.cook_time_secs {
            settings.push(CapabilitySetting::new(
                SETTING_TIME,
                SettingValue::numeric(i64::from(cook_time), UNIT_SECOND),
            ));
        }
        if let Some(venting) = self.venting {
            settings.push(CapabilitySetting::new(
                SETTING_VENTING,
                SettingValue::nominal(venting.reference_value_id()),
            ));
        }
        if let Some(vent_time) = self.vent_time_secs {
            settings.push(CapabilitySetting::new(
                SETTING_VENTING_TIME,
                SettingValue::numeric(i64::from(vent_time), UNIT_SECOND),
            ));
        }
        if let Some(nutriboost) = self.nutriboost {
            settings.push(CapabilitySetting::new(
                SETTING_NUTRIBOOST,
                SettingValue::boolean(nutriboost),
            ));
        }
        if settings.is_empty() {
            return Err(CommandError::EmptyUpdate);
        }
        Ok(CapabilityDocument {
            reference_capability_id: CAPABILITY_PRESSURE_COOK.to_string(),
            settings,
        })
    }
}

/// Build a keep-warm Start document.
pub fn keep_warm_start(target: KeepWarmTarget, duration_secs: u32) -> CapabilityDocument {
    CapabilityDocument {
        reference_capability_id: CAPABILITY_KEEP_WARM.to_string(),
        settings: vec![
            target.setting(),
            CapabilitySetting::new(
                SETTING_TIME,
                SettingValue::numeric(i64::from(duration_secs), UNIT_SECOND),
            ),
        ],
    }
}

/// Build a keep-warm Update document from whichever fields are present.
pub fn keep_warm_update(
    target: Option<KeepWarmTarget>,
    duration_secs: Option<u32>,
) -> Result<CapabilityDocument, CommandError> {
    let mut settings = Vec::new();
    if let Some(target) = target {
        settings.push(target.setting());
    }
    if let Some(duration) = duration_secs {
        settings.push(CapabilitySetting::new(
            SETTING_TIME,
            SettingValue::numeric(i64::from(duration), UNIT_SECOND),
        ));
    }
    if settings.is_empty() {
        return Err(CommandError::EmptyUpdate);
    }
    Ok(CapabilityDocument {
        reference_capability_id: CAPABILITY_KEEP_WARM.to_string(),
        settings,
    })
}
