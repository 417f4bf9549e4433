#[cfg(test)]
mod tests {
    use crate::{
        error::SessionError,
        flows::flow_features::FlowFeatures,
        tests::util::{entry_of, loopback_key, packet_at, SECOND_US},
    };

    #[test]
    fn test_single_packet_flow() {
        let key = loopback_key(40000, 8080);
        let features =
            FlowFeatures::from_entry(entry_of(key, vec![packet_at(key, 74, 5 * SECOND_US)]))
                .unwrap();

        assert_eq!(features.protocol, 6);
        assert_eq!(features.src_port, 40000);
        assert_eq!(features.dst_port, 8080);
        assert_eq!(features.fwd_pkt_count, 1);
        assert_eq!(features.bwd_pkt_count, 0);
        assert_eq!(features.total_pkt_count, 1);
        assert_eq!(features.fwd_bytes_sum, 74);
        assert_eq!(features.bwd_bytes_sum, 0);
        assert_eq!(features.total_bytes_sum, 74);
        assert_eq!(features.flow_duration, 0.0);
        assert_eq!(features.fwd_iat_mean, 0.0);
        assert_eq!(features.fwd_iat_std, 0.0);
        assert_eq!(features.bwd_iat_mean, 0.0);
        assert_eq!(features.bwd_iat_std, 0.0);
        assert_eq!(features.fwd_pkt_len_mean, 74.0);
        assert_eq!(features.bwd_pkt_len_mean, 0.0);
        assert_eq!(features.pkt_len_max, 74);
        assert_eq!(features.pkt_len_min, 74);
    }

    #[test]
    fn test_evenly_spaced_flow() {
        let key = loopback_key(40000, 80);
        let packets = (0..3)
            .map(|i| packet_at(key, 100, i * SECOND_US))
            .collect();
        let features = FlowFeatures::from_entry(entry_of(key, packets)).unwrap();

        assert_eq!(features.total_pkt_count, 3);
        assert_eq!(features.total_bytes_sum, 300);
        assert_eq!(features.flow_duration, 2_000_000.0);
        assert_eq!(features.fwd_iat_mean, 1_000_000.0);
        assert_eq!(features.fwd_iat_std, 0.0);
        assert_eq!(features.pkt_len_max, 100);
        assert_eq!(features.pkt_len_min, 100);
    }

    #[test]
    fn test_packets_are_sorted_before_computing() {
        let key = loopback_key(40000, 80);
        let packets = vec![
            packet_at(key, 300, 4 * SECOND_US),
            packet_at(key, 100, 0),
            packet_at(key, 200, SECOND_US),
        ];
        let features = FlowFeatures::from_entry(entry_of(key, packets)).unwrap();

        // Gaps of 1s and 3s
        assert_eq!(features.flow_duration, 4_000_000.0);
        assert_eq!(features.fwd_iat_mean, 2_000_000.0);
        assert_eq!(features.fwd_iat_std, 1_000_000.0);
        assert_eq!(features.fwd_pkt_len_mean, 200.0);
        assert_eq!(features.pkt_len_max, 300);
        assert_eq!(features.pkt_len_min, 100);
    }

    #[test]
    fn test_direction_split_follows_packet_keys() {
        let key = loopback_key(40000, 80);
        let reply = key.reversed();
        let packets = vec![
            packet_at(key, 60, 0),
            packet_at(reply, 1500, 10),
            packet_at(key, 60, 20),
            packet_at(reply, 900, 50),
            packet_at(key, 60, 40),
        ];
        let features = FlowFeatures::from_entry(entry_of(key, packets)).unwrap();

        assert_eq!(features.fwd_pkt_count, 3);
        assert_eq!(features.bwd_pkt_count, 2);
        assert_eq!(
            features.fwd_pkt_count + features.bwd_pkt_count,
            features.total_pkt_count
        );
        assert_eq!(features.fwd_bytes_sum, 180);
        assert_eq!(features.bwd_bytes_sum, 2400);
        assert_eq!(features.total_bytes_sum, 2580);
        assert_eq!(features.fwd_iat_mean, 20.0);
        assert_eq!(features.fwd_iat_std, 0.0);
        assert_eq!(features.bwd_iat_mean, 40.0);
        assert_eq!(features.bwd_iat_std, 0.0);
        assert_eq!(features.fwd_pkt_len_mean, 60.0);
        assert_eq!(features.bwd_pkt_len_mean, 1200.0);
        assert_eq!(features.pkt_len_max, 1500);
        assert_eq!(features.pkt_len_min, 60);
        assert_eq!(features.flow_duration, 50.0);
    }

    #[test]
    fn test_equal_timestamps_keep_arrival_order() {
        let key = loopback_key(40000, 80);
        let reply = key.reversed();
        let packets = vec![packet_at(reply, 100, 7), packet_at(key, 100, 7)];
        let features = FlowFeatures::from_entry(entry_of(key, packets)).unwrap();

        // The identity columns come from the first packet, the reply
        assert_eq!(features.src_port, 80);
        assert_eq!(features.dst_port, 40000);
        assert_eq!(features.flow_duration, 0.0);
    }

    #[test]
    fn test_empty_flow_is_rejected() {
        let key = loopback_key(1, 2);
        let result = FlowFeatures::from_entry(entry_of(key, Vec::new()));

        assert!(matches!(result, Err(SessionError::EmptyFlow(k)) if k == key));
    }

    #[test]
    fn test_counts_and_sums_match_packets() {
        let key = loopback_key(5353, 53);
        let lengths = [42u32, 1400, 512, 60, 60, 1500, 99];
        let packets = lengths
            .iter()
            .enumerate()
            .map(|(i, &length)| packet_at(key, length, i as i64 * 1_337))
            .collect();
        let features = FlowFeatures::from_entry(entry_of(key, packets)).unwrap();

        assert_eq!(features.total_pkt_count, lengths.len() as u64);
        assert_eq!(
            features.total_bytes_sum,
            lengths.iter().map(|&l| l as u64).sum::<u64>()
        );
        assert_eq!(features.pkt_len_max, 1500);
        assert_eq!(features.pkt_len_min, 42);
        assert_eq!(features.bwd_pkt_count, 0);
    }
}
