use crate::plant_data::PlantData;

pub trait MetricCollector {
    fn publish(&mut self, plant: &PlantData);
}
