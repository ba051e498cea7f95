use data_runloop::Settings;

#[test]
fn parses_full_settings_document() {
    let yaml = "\
threaded_data_runloop_enable: true
nbio_pos_increment: 10
image_pos_increment: 0
image_processing_pos_increment: 0
queue_capacity: 16
";
    let settings = Settings::from_yaml_str(yaml).expect("valid settings document");
    assert!(settings.threaded_data_runloop_enable);
    assert_eq!(settings.nbio_pos_increment, 10);
    assert_eq!(settings.queue_capacity, 16);
}

#[test]
fn missing_fields_fall_back_to_defaults() {
    let yaml = "queue_capacity: 32\n";
    let settings = Settings::from_yaml_str(yaml).expect("partial document is valid");
    assert_eq!(settings.queue_capacity, 32);
    assert!(!settings.threaded_data_runloop_enable);
    assert_eq!(settings.nbio_pos_increment(), 5);
}

#[test]
fn duplicate_field_is_a_parse_error() {
    let yaml = "\
threaded_data_runloop_enable: true
threaded_data_runloop_enable: false
";
    let err = Settings::from_yaml_str(yaml).unwrap_err();
    assert!(err.message.contains("Duplicate field"));
}

#[test]
fn unknown_field_is_skipped_not_rejected() {
    let yaml = "\
queue_capacity: 4
some_future_knob: yes
";
    let settings = Settings::from_yaml_str(yaml).expect("unknown fields are tolerated");
    assert_eq!(settings.queue_capacity, 4);
}

#[test]
fn zero_nbio_pos_increment_falls_back_to_the_hardcoded_default() {
    let yaml = "nbio_pos_increment: 0\n";
    let settings = Settings::from_yaml_str(yaml).expect("zero is a valid token, just not a valid step count");
    assert_eq!(settings.nbio_pos_increment, 0);
    assert_eq!(settings.nbio_pos_increment(), 5);
}
