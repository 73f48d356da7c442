//! Protocol tables
//!
//! Everything the Rosco protocol knows, as embedded read-only data. The
//! tables are plain `static` slices so there is nothing to build or mutate
//! at runtime.

/// Revision of the table set below. Bump when any table changes.
pub const TABLE_REVISION: u32 = 2;

/// Byte appended to an echoed command when the ECU has no specific reply
pub const OK_MARKER: [u8; 1] = [0x00];

/// One step of the initialization handshake
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InitStep {
    /// Byte sent to the ECU
    pub tx: u8,
    /// Reply the ECU is expected to send back
    pub response: &'static [u8],
}

/// A complete, versioned set of protocol tables
#[derive(Debug)]
pub struct ProtocolTables {
    /// Table revision
    pub revision: u32,
    /// Command name to opcode
    pub commands: &'static [(&'static str, u8)],
    /// Opcode to canned response
    pub responses: &'static [(u8, &'static [u8])],
    /// Opcode to positional field names of its data frame ("" = reserved byte)
    pub dataframes: &'static [(u8, &'static [&'static str])],
    /// Firmware label to the `0xD0` reply that identifies it
    pub versions: &'static [(&'static str, &'static [u8])],
    /// Opening exchange, in order
    pub initialization: &'static [InitStep],
}

/// Firmware signature returned by the MNE101170 ECU in reply to `0xD0`
pub const MNE101170_SIGNATURE: &[u8] = &[0xD0, 0x99, 0x00, 0x03, 0x03];

/// Firmware signature returned by the MNE101070 ECU in reply to `0xD0`
pub const MNE101070_SIGNATURE: &[u8] = &[0xD0, 0x99, 0x00, 0x02, 0x03];

const COMMANDS: &[(&str, u8)] = &[
    ("open_fuel_pump_relay", 0x01),
    ("open_ptc_relay", 0x02),
    ("open_aircond_relay", 0x03),
    ("close_purge_valve", 0x08),
    ("open_heater_relay", 0x09),
    ("close_fuel_pump_relay", 0x11),
    ("close_ptc_relay", 0x12),
    ("close_aircond_relay", 0x13),
    ("open_purge_valve", 0x18),
    ("close_heater_relay", 0x19),
    ("close_fan_relay", 0x1E),
    ("request_data_frame_a", 0x7D),
    ("inc_fuel_trim", 0x79),
    ("dec_fuel_trim", 0x7A),
    ("inc_fuel_trim_alt", 0x7B),
    ("dec_fuel_trim_alt", 0x7C),
    ("request_data_frame_b", 0x80),
    ("inc_idle_decay", 0x89),
    ("dec_idle_decay", 0x8A),
    ("inc_idle_speed", 0x91),
    ("dec_idle_speed", 0x92),
    ("inc_ignition_advance", 0x93),
    ("dec_ignition_advance", 0x94),
    ("clear_fault_codes", 0xCC),
    ("heartbeat", 0xF4),
    ("actuate_fuel_injector", 0xF7),
    ("fire_ignition_coil", 0xF8),
    ("current_iac_position", 0xFB),
    ("open_iac_by_one_step", 0xFD),
    ("close_iac_by_one_step", 0xFE),
];

// Captured from an idling MNE101170
const DATAFRAME_7D: &[u8] = &[
    0x7D, 0x20, 0x10, 0x0D, 0xFF, 0x92, 0x00, 0x69, 0xFF, 0xFF, 0x00, 0x00, 0x96, 0x64, 0x00,
    0xFF, 0x34, 0xFF, 0xFF, 0x30, 0x80, 0x7F, 0xFE, 0xFF, 0x19, 0x00, 0x1E, 0x80, 0x26, 0x40,
    0x34, 0xC0, 0x1A,
];

const DATAFRAME_80: &[u8] = &[
    0x80, 0x1C, 0x03, 0x5B, 0x8B, 0xFF, 0x56, 0xFF, 0x22, 0x8B, 0x1D, 0x00, 0x10, 0x01, 0x00,
    0x00, 0x00, 0x24, 0x90, 0x2E, 0x00, 0x03, 0x00, 0x48, 0x06, 0x61, 0x10, 0x00, 0x00,
];

const RESPONSES: &[(u8, &[u8])] = &[
    // initialization
    (0xCA, &[0xCA]),
    (0x75, &[0x75]),
    (0xD0, MNE101170_SIGNATURE),
    // heartbeat
    (0xF4, &[0xF4, 0x00]),
    // data frames
    (0x7D, DATAFRAME_7D),
    (0x80, DATAFRAME_80),
    // adjustments answer with the new setting
    (0x79, &[0x79, 0x8A]),
    (0x7A, &[0x7A, 0x8A]),
    (0x7B, &[0x7B, 0x8A]),
    (0x7C, &[0x7C, 0x8A]),
    (0x89, &[0x89, 0x23]),
    (0x8A, &[0x8A, 0x23]),
    (0x91, &[0x91, 0x80]),
    (0x92, &[0x92, 0x80]),
    (0x93, &[0x93, 0x80]),
    (0x94, &[0x94, 0x80]),
];

// Multi-byte fields are big-endian; low/high halves are listed separately.
const DATAFRAME_7D_FIELDS: &[&str] = &[
    "command",
    "dataframe_size",
    "",
    "throttle_angle",
    "",
    "",
    "lambda_voltage",
    "lambda_frequency",
    "lambda_duty_cycle",
    "lambda_status",
    "loop_indicator",
    "long_term_trim",
    "short_term_trim",
    "carbon_canister_purge_valve_duty_cycle",
    "",
    "idle_base_position",
    "",
    "",
    "",
    "",
    "idle_error",
    "",
    "",
    "",
    "",
    "",
    "",
    "",
    "",
    "",
    "",
    "",
    "",
];

const DATAFRAME_80_FIELDS: &[&str] = &[
    "command",
    "dataframe_size",
    "engine_speed_low_byte",
    "engine_speed_high_byte",
    "coolant_temperature",
    "ambient_temperature",
    "intake_air_temperature",
    "fuel_temperature",
    "map_sensor",
    "battery_voltage",
    "throttle_pot_voltage",
    "idle_switch",
    "",
    "park_neutral_switch",
    "coolant_temp_inlet_air_temp_sensor_fault",
    "fuel_pump_throttle_pot_circuit_fault",
    "",
    "",
    "",
    "idle_air_control_position",
    "idle_speed_deviation_low_byte",
    "idle_speed_deviation_high_byte",
    "",
    "ignition_advance",
    "coil_time_low_byte",
    "coil_time_high_byte",
    "",
    "",
    "",
];

const DATAFRAMES: &[(u8, &[&str])] = &[(0x7D, DATAFRAME_7D_FIELDS), (0x80, DATAFRAME_80_FIELDS)];

const VERSIONS: &[(&str, &[u8])] = &[
    ("MNE101070", MNE101070_SIGNATURE),
    ("MNE101170", MNE101170_SIGNATURE),
];

const INITIALIZATION: &[InitStep] = &[
    InitStep {
        tx: 0xCA,
        response: &[0xCA],
    },
    InitStep {
        tx: 0x75,
        response: &[0x75],
    },
    InitStep {
        tx: 0xD0,
        response: MNE101170_SIGNATURE,
    },
];

/// The canonical Rosco table set
pub static ROSCO_TABLES: ProtocolTables = ProtocolTables {
    revision: TABLE_REVISION,
    commands: COMMANDS,
    responses: RESPONSES,
    dataframes: DATAFRAMES,
    versions: VERSIONS,
    initialization: INITIALIZATION,
};
