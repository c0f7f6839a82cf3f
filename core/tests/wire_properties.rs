// Property tests for the wire codec layers.

use cfn_core::wire::{self, MessageKind, PeerReport, StateAdvertisement, WireFrame};
use proptest::prelude::*;

fn key_strategy() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9]{0,7}"
}

fn fields_strategy() -> impl Strategy<Value = Vec<(String, Vec<u8>)>> {
    prop::collection::vec(
        (key_strategy(), prop::collection::vec(any::<u8>(), 0..64)),
        0..12,
    )
}

fn report_strategy() -> impl Strategy<Value = PeerReport> {
    (
        prop::option::of(any::<u32>()),
        any::<u32>(),
        any::<u32>(),
        any::<u32>(),
        prop::option::of(any::<u32>()),
        prop::option::of(any::<i64>()),
    )
        .prop_map(
            |(node_id, cores, occupied_cores, queued_jobs, utility, rtt)| PeerReport {
                node_id,
                cores,
                occupied_cores,
                queued_jobs,
                utility,
                rtt,
            },
        )
}

proptest! {
    #[test]
    fn record_roundtrip(fields in fields_strategy()) {
        let refs: Vec<(&str, &[u8])> = fields
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_slice()))
            .collect();
        let raw = wire::encode(&refs).unwrap();

        let grammar: Vec<&str> = fields.iter().map(|(k, _)| k.as_str()).collect();
        let values = wire::decode(&raw, &grammar).unwrap();

        prop_assert_eq!(values.len(), fields.len());
        for (value, (_, expected)) in values.iter().zip(&fields) {
            prop_assert_eq!(*value, expected.as_slice());
        }
    }

    #[test]
    fn record_rejects_shuffled_grammar(
        (a, b) in (key_strategy(), key_strategy()).prop_filter("distinct", |(a, b)| a != b)
    ) {
        let raw = wire::encode(&[(a.as_str(), b"1"), (b.as_str(), b"2")]).unwrap();
        // Asking for the fields out of order must fail, not mis-slice.
        prop_assert!(wire::decode(&raw, &[b.as_str(), a.as_str()]).is_err());
    }

    #[test]
    fn frame_roundtrip(payload in prop::collection::vec(any::<u8>(), 0..2048)) {
        let frame = WireFrame::new(MessageKind::StateAdvert, payload);
        let bytes = frame.to_bytes().unwrap();
        prop_assert_eq!(WireFrame::from_bytes(&bytes).unwrap(), frame);
    }

    #[test]
    fn frame_rejects_any_truncation(
        payload in prop::collection::vec(any::<u8>(), 1..256),
        cut in 1usize..8,
    ) {
        let bytes = WireFrame::new(MessageKind::GraphUpdate, payload)
            .to_bytes()
            .unwrap();
        let cut = cut.min(bytes.len());
        prop_assert!(WireFrame::from_bytes(&bytes[..bytes.len() - cut]).is_err());
    }

    #[test]
    fn advertisement_roundtrip(reports in prop::collection::vec(report_strategy(), 0..16)) {
        let advert = StateAdvertisement { reports };
        let payload = advert.encode().unwrap();
        prop_assert_eq!(StateAdvertisement::decode(&payload).unwrap(), advert);
    }
}
