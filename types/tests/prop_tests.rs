use proptest::prelude::*;

use std::net::Ipv4Addr;
use wotcrawl_types::{BlockUid, Endpoint, Timestamp};

proptest! {
    /// BlockUid display/parse agree for any number and hex hash.
    #[test]
    fn blockstamp_text_form(number in 0u64..u64::MAX, hash in "[0-9A-F]{64}") {
        let uid = BlockUid::new(number, hash.clone());
        let parsed: BlockUid = uid.to_string().parse().unwrap();
        prop_assert_eq!(parsed.number, number);
        prop_assert_eq!(parsed.hash, hash);
    }

    /// Hashes of the wrong length are rejected.
    #[test]
    fn blockstamp_rejects_short_hash(number in 0u64..1_000_000, hash in "[0-9A-F]{1,63}") {
        let text = format!("{number}-{hash}");
        prop_assert!(text.parse::<BlockUid>().is_err());
    }

    /// A BMA endpoint built from an IPv4 address keeps host and port.
    #[test]
    fn bma_ipv4_endpoint(a in 1u8..255, b in 0u8..255, c in 0u8..255, d in 1u8..255, port in 1u16..u16::MAX) {
        let ip = Ipv4Addr::new(a, b, c, d);
        let line = format!("BASIC_MERKLED_API {ip} {port}");
        let endpoint: Endpoint = line.parse().unwrap();
        prop_assert_eq!(endpoint.to_string(), line);
        prop_assert_eq!(
            endpoint.http_url("/node/summary"),
            Some(format!("http://{ip}:{port}/node/summary"))
        );
    }

    /// Timestamp has_elapsed agrees with manual arithmetic.
    #[test]
    fn timestamp_has_elapsed(
        start in 0u64..500_000,
        duration in 1u64..500_000,
        offset in 0u64..1_000_000,
    ) {
        let t = Timestamp::new(start);
        let now = Timestamp::new(start + offset);
        prop_assert_eq!(t.has_elapsed(duration, now), offset >= duration);
    }

    /// Timestamp elapsed_since saturates to 0 when now < self.
    #[test]
    fn timestamp_elapsed_since_saturates(
        base in 1u64..1_000_000,
        deficit in 1u64..1_000_000,
    ) {
        let later = Timestamp::new(base + deficit);
        let earlier = Timestamp::new(base);
        prop_assert_eq!(later.elapsed_since(earlier), 0);
    }
}
