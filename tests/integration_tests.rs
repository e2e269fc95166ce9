use std::sync::{Mutex, OnceLock};

use dtu2mqtt::home_assistant::HomeAssistant;
use dtu2mqtt::metric_collector::MetricCollector;
use dtu2mqtt::mqtt_config::MqttConfig;
use dtu2mqtt::mqtt_wrapper::MqttWrapper;
use dtu2mqtt::plant_data::{MicroinverterData, PlantData};
use dtu2mqtt::simple_mqtt::SimpleMqtt;

fn example_plant() -> PlantData {
    PlantData {
        dtu_sn: "dtu_serial".to_string(),
        microinverters: vec![MicroinverterData {
            data_type: 0,
            serial_number: "102162804827".to_string(),
            port_number: 3,
            pv_voltage: 1.234,
            pv_current: 2.34,
            grid_voltage: 22.33,
            grid_frequency: 32.12,
            pv_power: 40.31,
            today_production: 431,
            total_production: 8844,
            temperature: 20.4,
            operating_status: 3,
            alarm_code: 0,
            alarm_count: 2,
            link_status: 1,
        }],
    }
}

struct MqttTester {
    published_values: Vec<(String, Vec<u8>)>,
}

impl MqttTester {
    pub fn len(&self) -> usize {
        self.published_values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl MqttWrapper for MqttTester {
    fn subscribe(&mut self, _topic: &str, _qos: dtu2mqtt::mqtt_wrapper::QoS) -> anyhow::Result<()> {
        Ok(())
    }

    fn publish<S, V>(
        &mut self,
        topic: S,
        _qos: dtu2mqtt::mqtt_wrapper::QoS,
        _retain: bool,
        payload: V,
    ) -> anyhow::Result<()>
    where
        S: Clone + Into<String>,
        V: Clone + Into<Vec<u8>>,
    {
        self.published_values.push((topic.into(), payload.into()));
        Ok(())
    }

    fn new(_config: &MqttConfig, _suffix: &str) -> Self {
        Self {
            published_values: Vec::new(),
        }
    }
}

#[test]
fn publish_one_message() {
    let mut mqtt = MqttTester::new(
        &MqttConfig {
            host: "frob".to_owned(),
            port: Some(1234),
            username: None,
            password: None,
            tls: None,
            client_id: Some("myclient".to_string()),
        },
        "-test",
    );
    let result = mqtt.publish(
        "foo",
        dtu2mqtt::mqtt_wrapper::QoS::AtMostOnce,
        true,
        "Hooray".to_string(),
    );
    assert!(result.is_ok());
    assert!(!mqtt.is_empty());
    assert_eq!(mqtt.len(), 1);
}

// The collectors build their MQTT client internally, so these fakes record
// into process-wide logs, one per test, to observe what got published.
fn ha_log() -> &'static Mutex<Vec<(String, String)>> {
    static LOG: OnceLock<Mutex<Vec<(String, String)>>> = OnceLock::new();
    LOG.get_or_init(|| Mutex::new(Vec::new()))
}

struct HaRecorder;

impl MqttWrapper for HaRecorder {
    fn subscribe(&mut self, _topic: &str, _qos: dtu2mqtt::mqtt_wrapper::QoS) -> anyhow::Result<()> {
        Ok(())
    }

    fn publish<S, V>(
        &mut self,
        topic: S,
        _qos: dtu2mqtt::mqtt_wrapper::QoS,
        _retain: bool,
        payload: V,
    ) -> anyhow::Result<()>
    where
        S: Clone + Into<String>,
        V: Clone + Into<Vec<u8>>,
    {
        ha_log()
            .lock()
            .unwrap()
            .push((topic.into(), String::from_utf8(payload.into())?));
        Ok(())
    }

    fn new(_config: &MqttConfig, _suffix: &str) -> Self {
        Self
    }
}

#[test]
fn home_assistant_announces_each_dtu_once() {
    let mut channel = HomeAssistant::<HaRecorder>::new(
        &MqttConfig {
            host: "localhost".to_string(),
            ..Default::default()
        },
        &["grid_voltage".to_string()],
        &["pv_voltage".to_string()],
    )
    .unwrap();

    let plant = example_plant();
    channel.publish(&plant);
    // 4 DTU + 1 inverter + 1 port configs, then one state per entity
    assert_eq!(ha_log().lock().unwrap().len(), 6 + 3);

    channel.publish(&plant);
    let messages = ha_log().lock().unwrap();
    assert_eq!(messages.len(), 6 + 3 + 3);
    assert_eq!(
        messages[0].0,
        "homeassistant/sensor/dtu_serial/DTU_pv_power/config"
    );
    assert_eq!(
        messages[6].0,
        "homeassistant/hoymiles_mqtt/dtu_serial/state"
    );
    assert!(messages
        .iter()
        .any(|(topic, _)| topic == "homeassistant/hoymiles_mqtt/102162804827/3/state"));
}

fn simple_log() -> &'static Mutex<Vec<(String, String)>> {
    static LOG: OnceLock<Mutex<Vec<(String, String)>>> = OnceLock::new();
    LOG.get_or_init(|| Mutex::new(Vec::new()))
}

struct SimpleRecorder;

impl MqttWrapper for SimpleRecorder {
    fn subscribe(&mut self, _topic: &str, _qos: dtu2mqtt::mqtt_wrapper::QoS) -> anyhow::Result<()> {
        Ok(())
    }

    fn publish<S, V>(
        &mut self,
        topic: S,
        _qos: dtu2mqtt::mqtt_wrapper::QoS,
        _retain: bool,
        payload: V,
    ) -> anyhow::Result<()>
    where
        S: Clone + Into<String>,
        V: Clone + Into<Vec<u8>>,
    {
        simple_log()
            .lock()
            .unwrap()
            .push((topic.into(), String::from_utf8(payload.into())?));
        Ok(())
    }

    fn new(_config: &MqttConfig, _suffix: &str) -> Self {
        Self
    }
}

#[test]
fn simple_mqtt_publishes_scalar_topics() {
    let mut channel = SimpleMqtt::<SimpleRecorder>::new(&MqttConfig {
        host: "localhost".to_string(),
        ..Default::default()
    });

    channel.publish(&example_plant());
    let messages = simple_log().lock().unwrap();
    // last_update + 4 DTU metrics + 7 inverter metrics + 5 port metrics
    assert_eq!(messages.len(), 1 + 4 + 7 + 5);
    assert!(messages
        .iter()
        .any(|(topic, payload)| topic == "hoymiles/102162804827/grid_voltage" && payload == "22.33"));
    assert!(messages
        .iter()
        .any(|(topic, payload)| topic == "hoymiles/102162804827/3/pv_power" && payload == "40.31"));
    assert!(messages
        .iter()
        .any(|(topic, payload)| topic == "hoymiles/dtu_serial/alarm_flag" && payload == "OFF"));
}
