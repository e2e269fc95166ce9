use serde::Serialize;

use crate::metrics::MetricDescriptor;

static MANUFACTURER: &str = "Hoymiles";

/// `DeviceConfig` is used to define the configuration for a Home Assistant
/// device in the MQTT discovery protocol and is used to group entities
/// together. The DTU and each microinverter are separate devices.
#[derive(Serialize, Clone)]
pub struct DeviceConfig {
    name: String,
    identifiers: Vec<String>,
    manufacturer: String,
}

impl DeviceConfig {
    pub fn dtu(serial: &str) -> Self {
        Self::new(format!("DTU_{serial}"), serial)
    }

    pub fn inverter(serial: &str) -> Self {
        Self::new(format!("inv_{serial}"), serial)
    }

    fn new(name: String, serial: &str) -> Self {
        Self {
            name,
            identifiers: vec![format!("hoymiles_mqtt_{serial}")],
            manufacturer: MANUFACTURER.to_string(),
        }
    }
}

/// `SensorConfig` is used to define the configuration for a Home Assistant
/// sensor or binary_sensor entity in the MQTT discovery protocol.
///
/// More information about the MQTT discovery protocol can be found here:
/// https://www.home-assistant.io/docs/mqtt/discovery/
///
/// Field order is serialization order and is part of the published payload.
#[derive(Serialize)]
pub struct SensorConfig {
    device: DeviceConfig,
    name: String,
    unique_id: String,
    state_topic: String,
    value_template: String, // A template to extract the value from the state payload.
    // exclude optionals the metric does not carry
    #[serde(skip_serializing_if = "Option::is_none")]
    device_class: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    unit_of_measurement: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    state_class: Option<String>,
}

impl SensorConfig {
    pub fn new(
        device: &DeviceConfig,
        name: &str,
        unique_id: String,
        state_topic: &str,
        metric: &str,
        descriptor: &MetricDescriptor,
    ) -> Self {
        SensorConfig {
            device: device.clone(),
            name: name.to_string(),
            unique_id,
            state_topic: state_topic.to_string(),
            value_template: format!("{{{{ value_json.{metric} }}}}"),
            device_class: descriptor.device_class.map(str::to_string),
            unit_of_measurement: descriptor.unit.map(str::to_string),
            state_class: descriptor.state_class.map(str::to_string),
        }
    }
}
