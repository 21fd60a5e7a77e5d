#![no_main]
use ipenrich::blocklist::{parse_drop_line, parse_dropv6_line, RangeMatcher};
use ipenrich::file_reader::load_sorted_from_reader;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(drop) = load_sorted_from_reader(data, parse_drop_line) else {
        return;
    };
    let Ok(dropv6) = load_sorted_from_reader(data, parse_dropv6_line) else {
        return;
    };

    let matcher = RangeMatcher::from_lists(drop, dropv6);

    // Overlapping ranges may resolve to a neighbour, but the hit must
    // always cover the address
    for entry in matcher.entries() {
        let addr = entry.network.address();
        let hit = matcher.find(addr);
        assert!(
            hit.is_some_and(|hit| hit.network.contains(addr)),
            "{} resolved to {:?}",
            entry.network,
            hit.map(|hit| hit.network.to_string())
        );
    }
});
