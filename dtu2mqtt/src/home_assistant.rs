use std::collections::HashSet;

use crate::home_assistant_config::{DeviceConfig, SensorConfig};
use crate::metric_collector::MetricCollector;
use crate::metrics::{self, MetricValue, DTU_ENTITIES, MI_ENTITIES, PORT_ENTITIES};
use crate::mqtt_config::MqttConfig;
use crate::mqtt_wrapper::{MqttWrapper, QoS};
use crate::plant_data::PlantData;

use anyhow::{bail, Result};
use log::{debug, error};

static DISCOVERY_PREFIX: &str = "homeassistant";
static STATE_PREFIX: &str = "homeassistant/hoymiles_mqtt";

/// Topic/payload pair, ready for an MQTT client.
pub type Message = (String, String);

/// Maps plant snapshots onto Home Assistant MQTT messages: discovery configs
/// announcing every entity, and state payloads grouped per device.
///
/// The formatter is a pure transform. It holds only the validated metric
/// selections; every call to [`get_configs`](Self::get_configs) or
/// [`get_states`](Self::get_states) derives a fresh message sequence from the
/// snapshot it is given.
pub struct HassFormatter {
    mi_entities: Vec<String>,
    port_entities: Vec<String>,
}

impl HassFormatter {
    /// Fails if any selected metric is unknown or not legal for its scope,
    /// so that a bad selection surfaces at startup rather than mid-stream.
    pub fn new(mi_entities: &[String], port_entities: &[String]) -> Result<Self> {
        validate_selection(mi_entities, MI_ENTITIES, "microinverter")?;
        validate_selection(port_entities, PORT_ENTITIES, "port")?;
        Ok(Self {
            mi_entities: mi_entities.to_vec(),
            port_entities: port_entities.to_vec(),
        })
    }

    /// Discovery configs for every entity of the plant: the DTU first, then
    /// each physical microinverter (first-seen order), then each port.
    pub fn get_configs<'a>(&'a self, plant: &'a PlantData) -> impl Iterator<Item = Message> + 'a {
        let dtu_device = DeviceConfig::dtu(&plant.dtu_sn);
        let dtu_configs = DTU_ENTITIES.iter().map(move |metric| {
            config_message(
                &dtu_device,
                &plant.dtu_sn,
                &format!("DTU_{metric}"),
                metric,
                format!("hoymiles_mqtt_DTU_{}_{metric}", plant.dtu_sn),
                &state_topic(&plant.dtu_sn),
                metric,
            )
        });

        let inverter_configs = plant
            .distinct_inverters()
            .into_iter()
            .flat_map(move |unit| {
                let device = DeviceConfig::inverter(&unit.serial_number);
                self.mi_entities.iter().map(move |metric| {
                    config_message(
                        &device,
                        &unit.serial_number,
                        &format!("inv_{metric}"),
                        metric,
                        format!("hoymiles_mqtt_inv_{}_{metric}", unit.serial_number),
                        &state_topic(&unit.serial_number),
                        metric,
                    )
                })
            });

        let port_configs = plant.microinverters.iter().flat_map(move |unit| {
            let device = DeviceConfig::inverter(&unit.serial_number);
            self.port_entities.iter().map(move |metric| {
                let object_id = format!("port_{}_{metric}", unit.port_number);
                config_message(
                    &device,
                    &unit.serial_number,
                    &object_id,
                    &object_id,
                    format!(
                        "hoymiles_mqtt_port_{}_{}_{metric}",
                        unit.port_number, unit.serial_number
                    ),
                    &port_state_topic(&unit.serial_number, unit.port_number),
                    metric,
                )
            })
        });

        dtu_configs.chain(inverter_configs).chain(port_configs)
    }

    /// State payloads, one message per entity, in the same entity order as
    /// [`get_configs`](Self::get_configs). Metrics missing from an entity are
    /// left out of its payload; an entity with nothing to report is skipped.
    pub fn get_states<'a>(&'a self, plant: &'a PlantData) -> impl Iterator<Item = Message> + 'a {
        let dtu_state = state_message(
            state_topic(&plant.dtu_sn),
            DTU_ENTITIES
                .iter()
                .map(|metric| (*metric, plant.dtu_metric(metric))),
        );

        let inverter_states = plant
            .distinct_inverters()
            .into_iter()
            .filter_map(move |unit| {
                state_message(
                    state_topic(&unit.serial_number),
                    self.mi_entities
                        .iter()
                        .map(|metric| (metric.as_str(), unit.inverter_metric(metric))),
                )
            });

        let port_states = plant.microinverters.iter().filter_map(move |unit| {
            state_message(
                port_state_topic(&unit.serial_number, unit.port_number),
                self.port_entities
                    .iter()
                    .map(|metric| (metric.as_str(), unit.port_metric(metric))),
            )
        });

        dtu_state.into_iter().chain(inverter_states).chain(port_states)
    }
}

fn validate_selection(requested: &[String], known: &[&str], scope: &str) -> Result<()> {
    for name in requested {
        if metrics::descriptor(name).is_none() {
            bail!("unknown metric: {name}");
        }
        if !known.contains(&name.as_str()) {
            bail!("{name} is not a {scope} metric");
        }
    }
    Ok(())
}

fn state_topic(serial: &str) -> String {
    format!("{STATE_PREFIX}/{serial}/state")
}

fn port_state_topic(serial: &str, port: u16) -> String {
    format!("{STATE_PREFIX}/{serial}/{port}/state")
}

fn config_message(
    device: &DeviceConfig,
    node_serial: &str,
    object_id: &str,
    display_name: &str,
    unique_id: String,
    state_topic: &str,
    metric: &str,
) -> Message {
    let descriptor = metrics::descriptor(metric).expect("metric selections are validated up front");
    let topic = format!(
        "{DISCOVERY_PREFIX}/{}/{node_serial}/{object_id}/config",
        descriptor.component()
    );
    let config = SensorConfig::new(device, display_name, unique_id, state_topic, metric, descriptor);
    (topic, serde_json::to_string(&config).unwrap())
}

fn state_message<'m>(
    topic: String,
    values: impl Iterator<Item = (&'m str, Option<MetricValue>)>,
) -> Option<Message> {
    let mut payload = serde_json::Map::new();
    for (metric, value) in values {
        if let Some(value) = value {
            payload.insert(metric.to_string(), value.to_json());
        }
    }
    if payload.is_empty() {
        return None;
    }
    Some((topic, serde_json::to_string(&payload).unwrap()))
}

/// Output channel that feeds a Home Assistant instance over MQTT. Discovery
/// configs are published once per DTU serial number seen by this process;
/// states go out on every update.
pub struct HomeAssistant<MQTT: MqttWrapper> {
    client: MQTT,
    formatter: HassFormatter,
    configured_dtus: HashSet<String>,
}

impl<MQTT: MqttWrapper> HomeAssistant<MQTT> {
    pub fn new(
        config: &MqttConfig,
        mi_entities: &[String],
        port_entities: &[String],
    ) -> Result<Self> {
        Ok(Self {
            client: MQTT::new(config, "-ha"),
            formatter: HassFormatter::new(mi_entities, port_entities)?,
            configured_dtus: HashSet::new(),
        })
    }

    fn publish_message(&mut self, topic: &str, payload: String) {
        debug!("Publishing to {topic} with payload {payload}");

        if let Err(e) = self
            .client
            .publish(topic, QoS::AtMostOnce, true, payload)
        {
            error!("Failed to publish message: {e:?}");
        }
    }
}

impl<MQTT: MqttWrapper> MetricCollector for HomeAssistant<MQTT> {
    fn publish(&mut self, plant: &PlantData) {
        if self.configured_dtus.insert(plant.dtu_sn.clone()) {
            debug!("announcing entities of DTU {}", plant.dtu_sn);
            let configs: Vec<Message> = self.formatter.get_configs(plant).collect();
            for (topic, payload) in configs {
                self.publish_message(&topic, payload);
            }
        }

        let states: Vec<Message> = self.formatter.get_states(plant).collect();
        for (topic, payload) in states {
            self.publish_message(&topic, payload);
        }
    }
}
