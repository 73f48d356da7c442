use memsulator_core::protocol::{Codec, Frame, OK_MARKER, ROSCO_TABLES, TABLE_REVISION};
use pretty_assertions::assert_eq;

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

#[test]
fn test_every_command_resolves_to_its_opcode() {
    let codec = Codec::default();
    for (name, opcode) in COMMANDS {
        assert_eq!(codec.resolve_command(*name).as_bytes(), &[*opcode], "{name}");
    }
    assert_eq!(ROSCO_TABLES.commands.len(), COMMANDS.len());
}

#[test]
fn test_unmapped_commands_pass_through() {
    let codec = Codec::default();
    assert_eq!(codec.resolve_command(&[0x05u8]).as_bytes(), &[0x05]);
    assert_eq!(codec.resolve_command(&[0xF4u8, 0x01]).as_bytes(), &[0xF4, 0x01]);
    assert_eq!(codec.resolve_command("not_a_command").as_bytes(), b"not_a_command");
}

#[test]
fn test_documented_responses() {
    let codec = Codec::default();
    assert_eq!(codec.expected_response(&[0xF4]), Some(&[0xF4, 0x00][..]));
    assert_eq!(codec.expected_response(&[0xCA]), Some(&[0xCA][..]));
    assert_eq!(codec.expected_response(&[0x75]), Some(&[0x75][..]));
    assert_eq!(
        codec.expected_response(&[0xD0]),
        Some(&[0xD0, 0x99, 0x00, 0x03, 0x03][..])
    );
    assert_eq!(codec.expected_response(&[0x79]), Some(&[0x79, 0x8A][..]));
    assert_eq!(codec.expected_response(&[0x8A]), Some(&[0x8A, 0x23][..]));
    assert_eq!(codec.expected_response(&[0x93]), Some(&[0x93, 0x80][..]));
    assert_eq!(codec.expected_response_len(&[0x7D]), 33);
    assert_eq!(codec.expected_response_len(&[0x80]), 29);
    assert_eq!(ROSCO_TABLES.responses.len(), 16);
}

#[test]
fn test_missing_response_is_absent() {
    let codec = Codec::default();
    assert_eq!(codec.expected_response(&[0xCC]), None);
    assert_eq!(codec.expected_response_len(&[0xCC]), 0);
    assert_eq!(
        codec.fallback_response(&[0xCC]),
        Frame::from([0xCC, OK_MARKER[0]])
    );
}

#[test]
fn test_initialization_sequence() {
    let codec = Codec::default();
    let steps: Vec<(u8, &[u8])> = codec
        .initialization_sequence()
        .iter()
        .map(|step| (step.tx, step.response))
        .collect();

    assert_eq!(
        steps,
        vec![
            (0xCA, &[0xCA][..]),
            (0x75, &[0x75][..]),
            (0xD0, &[0xD0, 0x99, 0x00, 0x03, 0x03][..]),
        ]
    );

    let signature = steps[2].1;
    assert_eq!(codec.version_label(signature), Some("MNE101170"));
}

#[test]
fn test_version_labels() {
    let codec = Codec::default();
    assert_eq!(
        codec.version_label(&[0xD0, 0x99, 0x00, 0x02, 0x03]),
        Some("MNE101070")
    );
    assert_eq!(codec.version_label(&[0xD0, 0x99]), None);
}

#[test]
fn test_dataframe_layouts() {
    let codec = Codec::default();

    let frame_a = codec.dataframe_fields("request_data_frame_a").unwrap();
    assert_eq!(frame_a.len(), 33);
    assert_eq!(frame_a[3], "throttle_angle");
    assert_eq!(frame_a[2], "");

    let frame_b = codec.dataframe_fields(&[0x80u8]).unwrap();
    assert_eq!(frame_b.len(), 29);
    assert_eq!(&frame_b[..4], &["command", "dataframe_size", "engine_speed_low_byte", "engine_speed_high_byte"]);
    assert_eq!(frame_b[23], "ignition_advance");
}

#[test]
fn test_parse_canned_dataframe() {
    let codec = Codec::default();
    let response = codec.expected_response(&[0x80]).unwrap();
    let dataframe = codec.parse_dataframe(response).unwrap();

    assert_eq!(dataframe.opcode, 0x80);
    assert_eq!(dataframe.get("dataframe_size"), Some(0x1C));
    assert_eq!(dataframe.get("coolant_temperature"), Some(0x8B));
    assert_eq!(dataframe.get("battery_voltage"), Some(0x8B));
    assert!(dataframe.fields.iter().all(|f| !f.name.is_empty()));

    assert!(codec.parse_dataframe(&[0xF4, 0x00]).is_none());
}

#[test]
fn test_table_revision() {
    assert_eq!(ROSCO_TABLES.revision, TABLE_REVISION);
}
