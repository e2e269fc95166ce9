use crate::{
    metric_collector::MetricCollector,
    metrics::{DTU_ENTITIES, MI_ENTITIES, PORT_ENTITIES},
    mqtt_config::MqttConfig,
    mqtt_wrapper::{MqttWrapper, QoS},
    plant_data::PlantData,
};

use chrono::Local;
use log::{debug, warn};

static BASE_TOPIC: &str = "hoymiles";

/// Output channel for brokers without Home Assistant: every metric goes to
/// its own plain topic under `hoymiles/`, one scalar per message.
pub struct SimpleMqtt<MQTT: MqttWrapper> {
    client: MQTT,
}

impl<MQTT: MqttWrapper> SimpleMqtt<MQTT> {
    pub fn new(config: &MqttConfig) -> Self {
        let client = MQTT::new(config, "-sm");
        Self { client }
    }
}

impl<MQTT: MqttWrapper> MetricCollector for SimpleMqtt<MQTT> {
    fn publish(&mut self, plant: &PlantData) {
        debug!(
            "publishing plant {} with {} microinverter records",
            plant.dtu_sn,
            plant.microinverters.len()
        );

        let mut topic_payload_pairs: Vec<(String, String)> = Vec::new();

        let last_update = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        topic_payload_pairs.push((
            format!("{BASE_TOPIC}/{}/last_update", plant.dtu_sn),
            last_update,
        ));

        for metric in DTU_ENTITIES {
            if let Some(value) = plant.dtu_metric(metric) {
                topic_payload_pairs.push((
                    format!("{BASE_TOPIC}/{}/{metric}", plant.dtu_sn),
                    value.to_string(),
                ));
            }
        }

        for unit in plant.distinct_inverters() {
            for metric in MI_ENTITIES {
                if let Some(value) = unit.inverter_metric(metric) {
                    topic_payload_pairs.push((
                        format!("{BASE_TOPIC}/{}/{metric}", unit.serial_number),
                        value.to_string(),
                    ));
                }
            }
        }

        for unit in &plant.microinverters {
            for metric in PORT_ENTITIES {
                if let Some(value) = unit.port_metric(metric) {
                    topic_payload_pairs.push((
                        format!(
                            "{BASE_TOPIC}/{}/{}/{metric}",
                            unit.serial_number, unit.port_number
                        ),
                        value.to_string(),
                    ));
                }
            }
        }

        topic_payload_pairs.into_iter().for_each(|(topic, payload)| {
            if let Err(e) = self.client.publish(topic, QoS::AtMostOnce, true, payload) {
                warn!("mqtt error: {e:?}")
            }
        });
    }
}
