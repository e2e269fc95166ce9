use std::fmt;

/// How a metric's raw field turns into a published value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MetricKind {
    /// Analog reading, passed through as a float.
    Numeric,
    /// Integer counter, passed through as an integer.
    Counter,
    /// Derived boolean: true whenever the underlying field is non-zero.
    Binary,
}

/// Discovery metadata for one metric. The registry below is the only place
/// these are defined; it is never mutated at runtime.
#[derive(Debug)]
pub struct MetricDescriptor {
    pub unit: Option<&'static str>,
    pub device_class: Option<&'static str>,
    pub state_class: Option<&'static str>,
    pub kind: MetricKind,
}

impl MetricDescriptor {
    /// Home Assistant discovery component this metric is announced under.
    pub fn component(&self) -> &'static str {
        match self.kind {
            MetricKind::Binary => "binary_sensor",
            _ => "sensor",
        }
    }
}

/// Metrics published for the DTU itself. Always announced, not configurable.
pub const DTU_ENTITIES: &[&str] = &[
    "pv_power",
    "today_production",
    "total_production",
    "alarm_flag",
];

/// Every metric that exists at microinverter scope, in publish order.
/// Doubles as the default selection.
pub const MI_ENTITIES: &[&str] = &[
    "grid_voltage",
    "grid_frequency",
    "temperature",
    "operating_status",
    "alarm_code",
    "alarm_count",
    "link_status",
];

/// Every metric that exists at port scope, in publish order.
/// Doubles as the default selection.
pub const PORT_ENTITIES: &[&str] = &[
    "pv_voltage",
    "pv_current",
    "pv_power",
    "today_production",
    "total_production",
];

// "today_production" resets at midnight; Home Assistant's total_increasing
// state class handles counter resets as new metering cycles, so both energy
// counters carry it.
static METRICS: &[(&str, MetricDescriptor)] = &[
    (
        "pv_power",
        MetricDescriptor {
            unit: Some("W"),
            device_class: Some("power"),
            state_class: Some("measurement"),
            kind: MetricKind::Numeric,
        },
    ),
    (
        "pv_voltage",
        MetricDescriptor {
            unit: Some("V"),
            device_class: Some("voltage"),
            state_class: Some("measurement"),
            kind: MetricKind::Numeric,
        },
    ),
    (
        "pv_current",
        MetricDescriptor {
            unit: Some("A"),
            device_class: Some("current"),
            state_class: Some("measurement"),
            kind: MetricKind::Numeric,
        },
    ),
    (
        "grid_voltage",
        MetricDescriptor {
            unit: Some("V"),
            device_class: Some("voltage"),
            state_class: Some("measurement"),
            kind: MetricKind::Numeric,
        },
    ),
    (
        "grid_frequency",
        MetricDescriptor {
            unit: Some("Hz"),
            device_class: Some("frequency"),
            state_class: Some("measurement"),
            kind: MetricKind::Numeric,
        },
    ),
    (
        "temperature",
        MetricDescriptor {
            unit: Some("°C"),
            device_class: Some("temperature"),
            state_class: Some("measurement"),
            kind: MetricKind::Numeric,
        },
    ),
    (
        "today_production",
        MetricDescriptor {
            unit: Some("Wh"),
            device_class: Some("energy"),
            state_class: Some("total_increasing"),
            kind: MetricKind::Counter,
        },
    ),
    (
        "total_production",
        MetricDescriptor {
            unit: Some("Wh"),
            device_class: Some("energy"),
            state_class: Some("total_increasing"),
            kind: MetricKind::Counter,
        },
    ),
    (
        "operating_status",
        MetricDescriptor {
            unit: None,
            device_class: None,
            state_class: None,
            kind: MetricKind::Numeric,
        },
    ),
    (
        "alarm_code",
        MetricDescriptor {
            unit: None,
            device_class: None,
            state_class: None,
            kind: MetricKind::Numeric,
        },
    ),
    (
        "alarm_count",
        MetricDescriptor {
            unit: None,
            device_class: None,
            state_class: None,
            kind: MetricKind::Numeric,
        },
    ),
    (
        "link_status",
        MetricDescriptor {
            unit: None,
            device_class: None,
            state_class: None,
            kind: MetricKind::Numeric,
        },
    ),
    (
        "alarm_flag",
        MetricDescriptor {
            unit: None,
            device_class: Some("problem"),
            state_class: None,
            kind: MetricKind::Binary,
        },
    ),
];

/// Look up the descriptor for a metric name. `None` means the name is not a
/// known metric at all.
pub fn descriptor(name: &str) -> Option<&'static MetricDescriptor> {
    METRICS
        .iter()
        .find(|(metric, _)| *metric == name)
        .map(|(_, descriptor)| descriptor)
}

/// A single metric reading taken from a snapshot.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MetricValue {
    Float(f64),
    Int(u64),
    Bool(bool),
}

impl MetricValue {
    /// JSON representation used in Home Assistant state payloads. Booleans
    /// become the "ON"/"OFF" tokens binary sensors expect.
    pub fn to_json(self) -> serde_json::Value {
        match self {
            MetricValue::Float(value) => serde_json::Value::from(value),
            MetricValue::Int(value) => serde_json::Value::from(value),
            MetricValue::Bool(value) => serde_json::Value::from(if value { "ON" } else { "OFF" }),
        }
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricValue::Float(value) => write!(f, "{value}"),
            MetricValue::Int(value) => write!(f, "{value}"),
            MetricValue::Bool(value) => f.write_str(if *value { "ON" } else { "OFF" }),
        }
    }
}
