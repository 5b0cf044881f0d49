//! Assembly properties over real flow records

#[cfg(test)]
mod assembly_tests {
    use crate::logic::features::layout::{stats_index, STATS_FEATURES};
    use crate::logic::features::{assemble, FlowRecord};

    fn full_record(value: f64) -> FlowRecord {
        STATS_FEATURES
            .iter()
            .fold(FlowRecord::new(), |record, name| record.with(*name, value))
    }

    /// The 78-vector is always the port followed by the 77-vector
    #[test]
    fn test_port_vector_is_port_plus_stats() {
        let records = [
            FlowRecord::new(),
            full_record(3.5).with("Destination Port", 8080i64),
            FlowRecord::new().with("Destination Port", "https"),
            FlowRecord::new().with("Flow IAT Mean", "0.75"),
        ];

        for record in &records {
            let out = assemble(record);
            assert_eq!(out.stats.len(), 77);
            assert_eq!(out.port_stats.len(), 78);
            assert_eq!(out.port_stats.stats(), out.stats.as_slice());
        }
    }

    /// Every missing canonical field reads as zero, one at a time
    #[test]
    fn test_missing_field_slot_is_zero() {
        for (index, missing) in STATS_FEATURES.iter().enumerate() {
            let record = STATS_FEATURES
                .iter()
                .filter(|name| *name != missing)
                .fold(FlowRecord::new(), |record, name| record.with(*name, 9.0));

            let out = assemble(&record);
            assert_eq!(out.stats.get(index), Some(0.0), "slot for {missing}");
            assert_eq!(out.port_stats.get(index + 1), Some(0.0));
        }
    }

    /// Non-numeric values never raise and read as zero
    #[test]
    fn test_non_numeric_values_are_zero() {
        let record = FlowRecord::from_json_str(
            r#"{
                "Destination Port": "http",
                "Flow Duration": null,
                "Total Fwd Packets": [1, 2],
                "Total Backward Packets": {"n": 3},
                "Flow Bytes/s": "",
                "SYN Flag Count": true,
                "Idle Max": "42"
            }"#,
        )
        .unwrap();

        let out = assemble(&record);

        assert_eq!(out.port_stats.destination_port(), 0.0);
        for name in [
            "Flow Duration",
            "Total Fwd Packets",
            "Total Backward Packets",
            "Flow Bytes/s",
        ] {
            assert_eq!(out.stats.get(stats_index(name).unwrap()), Some(0.0), "{name}");
        }
        assert_eq!(out.stats.get(stats_index("SYN Flag Count").unwrap()), Some(1.0));
        assert_eq!(out.stats.get(stats_index("Idle Max").unwrap()), Some(42.0));
    }

    /// Extra, non-canonical fields never shift the layout
    #[test]
    fn test_extra_fields_ignored() {
        let plain = full_record(1.0).with("Destination Port", 80i64);
        let noisy = plain
            .clone()
            .with("src_ip", "192.168.1.2")
            .with("application_name", "TLS.Google")
            .with("bidirectional_packets", 12i64);

        assert_eq!(assemble(&plain), assemble(&noisy));
    }
}
