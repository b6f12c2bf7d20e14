use phf::{phf_map, Map};

pub mod uuid {
    use uuid::{uuid, Uuid};

    pub const HEART_RATE:               Uuid = uuid!("0000180d-0000-1000-8000-00805f9b34fb");
    pub const HEART_RATE_MEASUREMENT:   Uuid = uuid!("00002a37-0000-1000-8000-00805f9b34fb");
    pub const HEART_RATE_CONTROL_POINT: Uuid = uuid!("00002a39-0000-1000-8000-00805f9b34fb");
}

static NAMES: Map<&'static str, &'static str> = phf_map! {
    "00001800-0000-1000-8000-00805f9b34fb" => "Generic Access",
    "00001801-0000-1000-8000-00805f9b34fb" => "Generic Attribute",
    "0000180d-0000-1000-8000-00805f9b34fb" => "Heart Rate",
    "0000180f-0000-1000-8000-00805f9b34fb" => "Battery",
    "00002a19-0000-1000-8000-00805f9b34fb" => "Battery Level",
    "00002a37-0000-1000-8000-00805f9b34fb" => "Heart Rate Measurement",
    "00002a38-0000-1000-8000-00805f9b34fb" => "Body Sensor Location",
    "00002a39-0000-1000-8000-00805f9b34fb" => "Heart Rate Control Point",
};

pub fn display(id: ::uuid::Uuid) -> String {
    let id = id.to_string();

    match NAMES.get(id.as_str()) {
        Some(name) => format!("{name} ({id})"),
        None => id,
    }
}
