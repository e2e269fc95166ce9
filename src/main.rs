// TODO: support an async implementation so a slow DTU cannot stall publishing

mod config;
mod logging;
mod rumqttc_wrapper;

use config::Config;
use dtu2mqtt::dtu::Dtu;
use dtu2mqtt::home_assistant::HomeAssistant;
use dtu2mqtt::metric_collector::MetricCollector;
use dtu2mqtt::metrics::{MI_ENTITIES, PORT_ENTITIES};
use dtu2mqtt::simple_mqtt::SimpleMqtt;
use rumqttc_wrapper::RumqttcWrapper;
use std::thread;
use std::time::Duration;

use log::{error, info};

static UPDATE_INTERVAL_DEFAULT: u64 = 60_000;

fn owned(names: &[&str]) -> Vec<String> {
    names.iter().map(|name| name.to_string()).collect()
}

fn main() {
    logging::init_logger();
    info!("Running revision: {}", env!("GIT_HASH"));
    if std::env::args().len() > 1 {
        error!("Arguments passed. Tool is configured by config.toml in its path");
    }

    let config = Config::load();
    if !config.is_valid() {
        panic!("dtu_host and at least one of home_assistant/simple_mqtt must be configured");
    }
    info!("DTU host: {}", config.dtu_host);

    let mi_entities = config
        .mi_entities
        .clone()
        .unwrap_or_else(|| owned(MI_ENTITIES));
    let port_entities = config
        .port_entities
        .clone()
        .unwrap_or_else(|| owned(PORT_ENTITIES));

    let mut dtu = Dtu::new(&config.dtu_host);

    let mut output_channels: Vec<Box<dyn MetricCollector>> = Vec::new();
    if let Some(mqtt_config) = &config.home_assistant {
        info!("Publishing to Home Assistant");
        let channel =
            HomeAssistant::<RumqttcWrapper>::new(mqtt_config, &mi_entities, &port_entities)
                .expect("metric selection rejected");
        output_channels.push(Box::new(channel));
    }

    if let Some(mqtt_config) = &config.simple_mqtt {
        info!("Publishing to simple MQTT broker");
        output_channels.push(Box::new(SimpleMqtt::<RumqttcWrapper>::new(mqtt_config)));
    }

    let update_interval = config.update_interval.unwrap_or(UPDATE_INTERVAL_DEFAULT);
    info!("using update interval of {:.2}s", update_interval as f64 / 1000.);

    loop {
        if let Some(plant) = dtu.update_state() {
            output_channels.iter_mut().for_each(|channel| {
                channel.publish(&plant);
            })
        }

        thread::sleep(Duration::from_millis(update_interval));
    }
}
