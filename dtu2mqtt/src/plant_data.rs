use crate::metrics::MetricValue;

/// One reading of one port of a physical microinverter, as reported by the
/// DTU. Multiple entries may carry the same `serial_number` with different
/// `port_number`s; those are different PV inputs of the same unit.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MicroinverterData {
    pub data_type: u8,
    pub serial_number: String,
    pub port_number: u16,
    pub pv_voltage: f64,
    pub pv_current: f64,
    pub grid_voltage: f64,
    pub grid_frequency: f64,
    pub pv_power: f64,
    pub today_production: u32,
    pub total_production: u32,
    pub temperature: f64,
    pub operating_status: u16,
    pub alarm_code: u16,
    pub alarm_count: u16,
    pub link_status: u16,
}

impl MicroinverterData {
    /// Reading for an inverter-scope metric, shared by all ports of the unit.
    pub fn inverter_metric(&self, name: &str) -> Option<MetricValue> {
        match name {
            "grid_voltage" => Some(MetricValue::Float(self.grid_voltage)),
            "grid_frequency" => Some(MetricValue::Float(self.grid_frequency)),
            "temperature" => Some(MetricValue::Float(self.temperature)),
            "operating_status" => Some(MetricValue::Int(self.operating_status.into())),
            "alarm_code" => Some(MetricValue::Int(self.alarm_code.into())),
            "alarm_count" => Some(MetricValue::Int(self.alarm_count.into())),
            "link_status" => Some(MetricValue::Int(self.link_status.into())),
            _ => None,
        }
    }

    /// Reading for a port-scope metric.
    pub fn port_metric(&self, name: &str) -> Option<MetricValue> {
        match name {
            "pv_voltage" => Some(MetricValue::Float(self.pv_voltage)),
            "pv_current" => Some(MetricValue::Float(self.pv_current)),
            "pv_power" => Some(MetricValue::Float(self.pv_power)),
            "today_production" => Some(MetricValue::Int(self.today_production.into())),
            "total_production" => Some(MetricValue::Int(self.total_production.into())),
            _ => None,
        }
    }
}

/// Snapshot of a whole plant: the DTU serial number plus one record per
/// microinverter port, in the order the DTU reports them.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PlantData {
    pub dtu_sn: String,
    pub microinverters: Vec<MicroinverterData>,
}

impl PlantData {
    /// Reading for a DTU-scope metric. Production counters are summed over
    /// all port records; the alarm flag is set when any unit reports a
    /// non-zero alarm code. The DTU has no power reading of its own, so
    /// `pv_power` is published as a constant zero.
    pub fn dtu_metric(&self, name: &str) -> Option<MetricValue> {
        match name {
            "pv_power" => Some(MetricValue::Float(0.0)),
            "today_production" => Some(MetricValue::Int(
                self.microinverters
                    .iter()
                    .map(|unit| u64::from(unit.today_production))
                    .sum(),
            )),
            "total_production" => Some(MetricValue::Int(
                self.microinverters
                    .iter()
                    .map(|unit| u64::from(unit.total_production))
                    .sum(),
            )),
            "alarm_flag" => Some(MetricValue::Bool(
                self.microinverters.iter().any(|unit| unit.alarm_code != 0),
            )),
            _ => None,
        }
    }

    /// One record per physical microinverter, first occurrence wins. Used
    /// wherever inverter-scope values are published so that a unit with
    /// several ports appears exactly once.
    pub fn distinct_inverters(&self) -> Vec<&MicroinverterData> {
        let mut inverters: Vec<&MicroinverterData> = Vec::new();
        for unit in &self.microinverters {
            if !inverters
                .iter()
                .any(|seen| seen.serial_number == unit.serial_number)
            {
                inverters.push(unit);
            }
        }
        inverters
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(serial: &str, port: u16, grid_voltage: f64) -> MicroinverterData {
        MicroinverterData {
            serial_number: serial.to_string(),
            port_number: port,
            grid_voltage,
            today_production: 100,
            total_production: 1000,
            ..Default::default()
        }
    }

    #[test]
    fn distinct_inverters_keeps_first_record_per_serial() {
        let plant = PlantData {
            dtu_sn: "dtu".to_string(),
            microinverters: vec![
                unit("aaa", 1, 230.1),
                unit("aaa", 2, 231.5),
                unit("bbb", 1, 229.9),
            ],
        };
        let inverters = plant.distinct_inverters();
        assert_eq!(inverters.len(), 2);
        assert_eq!(inverters[0].serial_number, "aaa");
        assert_eq!(inverters[0].grid_voltage, 230.1);
        assert_eq!(inverters[1].serial_number, "bbb");
    }

    #[test]
    fn dtu_production_sums_over_all_ports() {
        let plant = PlantData {
            dtu_sn: "dtu".to_string(),
            microinverters: vec![unit("aaa", 1, 230.0), unit("aaa", 2, 230.0)],
        };
        assert_eq!(
            plant.dtu_metric("today_production"),
            Some(MetricValue::Int(200))
        );
        assert_eq!(
            plant.dtu_metric("total_production"),
            Some(MetricValue::Int(2000))
        );
        assert_eq!(plant.dtu_metric("pv_power"), Some(MetricValue::Float(0.0)));
        assert_eq!(
            plant.dtu_metric("alarm_flag"),
            Some(MetricValue::Bool(false))
        );
    }

    #[test]
    fn any_alarm_code_raises_the_plant_alarm_flag() {
        let mut plant = PlantData {
            dtu_sn: "dtu".to_string(),
            microinverters: vec![unit("aaa", 1, 230.0), unit("bbb", 1, 230.0)],
        };
        plant.microinverters[1].alarm_code = 129;
        assert_eq!(plant.dtu_metric("alarm_flag"), Some(MetricValue::Bool(true)));
    }
}
