// externally visible interfaces
pub mod dtu;
pub mod home_assistant;
pub mod metric_collector;
pub mod metrics;
pub mod mqtt_config;
pub mod mqtt_wrapper;
pub mod plant_data;
pub mod simple_mqtt;

// internal interfaces
mod home_assistant_config;
