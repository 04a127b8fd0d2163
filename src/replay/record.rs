//! JSON telemetry envelope.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// CSV column names, in file order.
pub const COLUMNS: [&str; 10] = [
    "Time",
    "Bus_Voltage",
    "Bus_Current",
    "RPM",
    "Torque",
    "Current_U",
    "Current_V",
    "Current_W",
    "Throttle_Voltage",
    "SOC",
];

/// One telemetry sample as sent over the link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryRecord {
    pub time: String,
    pub motor_data: MotorData,
    pub phase_currents: PhaseCurrents,
    pub system_status: SystemStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotorData {
    #[serde(rename = "busVoltage")]
    pub bus_voltage: f64,
    #[serde(rename = "busCurrent")]
    pub bus_current: f64,
    pub rpm: f64,
    pub torque: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhaseCurrents {
    pub u: f64,
    pub v: f64,
    pub w: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SystemStatus {
    pub throttle_voltage: f64,
    pub soc: f64,
}

impl TelemetryRecord {
    /// Build from the time column and the nine numeric columns, in
    /// [`COLUMNS`] order.
    pub fn from_columns(time: String, values: [f64; 9]) -> Self {
        let [bus_voltage, bus_current, rpm, torque, u, v, w, throttle_voltage, soc] = values;
        Self {
            time,
            motor_data: MotorData {
                bus_voltage,
                bus_current,
                rpm,
                torque,
            },
            phase_currents: PhaseCurrents { u, v, w },
            system_status: SystemStatus {
                throttle_voltage,
                soc,
            },
        }
    }

    /// Compact JSON encoding.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// One CSV row in [`COLUMNS`] order.
    pub fn to_csv_row(&self) -> String {
        format!(
            "{},{:.2},{:.2},{:.0},{:.2},{:.2},{:.2},{:.2},{:.2},{:.1}",
            self.time,
            self.motor_data.bus_voltage,
            self.motor_data.bus_current,
            self.motor_data.rpm,
            self.motor_data.torque,
            self.phase_currents.u,
            self.phase_currents.v,
            self.phase_currents.w,
            self.system_status.throttle_voltage,
            self.system_status.soc,
        )
    }
}
