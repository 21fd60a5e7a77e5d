#![no_main]
use ipenrich::geo::{GeoDatabase, LookupFlags};
use libfuzzer_sys::fuzz_target;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

fuzz_target!(|data: &[u8]| {
    // Arbitrary images must never crash, only count bad reads
    let Ok(db) = GeoDatabase::from_bytes(data.to_vec()) else {
        return;
    };

    let probes = [
        IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        IpAddr::V4(Ipv4Addr::new(8, 8, 8, 8)),
        IpAddr::V4(Ipv4Addr::BROADCAST),
        IpAddr::V6(Ipv6Addr::LOCALHOST),
        IpAddr::V6(Ipv6Addr::new(0x2a06, 0xe480, 0, 0, 0, 0, 0, 1)),
        IpAddr::V6(Ipv6Addr::from(u128::MAX)),
    ];
    for addr in probes {
        let _ = db.lookup_with(addr, LookupFlags::all());
    }
    let _ = db.index_errors();
});
