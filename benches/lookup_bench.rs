use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use ipenrich::blocklist::{parse_drop_line, parse_dropv6_line, RangeMatcher};
use ipenrich::geo::{GeoDatabase, GeoImageBuilder, GeoLocation};
use ipenrich::SortedList;
use std::hint::black_box;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// Deterministic pseudo-random addresses (xorshift)
fn generate_ipv4(count: usize, seed: u32) -> Vec<Ipv4Addr> {
    let mut x = seed | 1;
    (0..count)
        .map(|_| {
            x ^= x << 13;
            x ^= x >> 17;
            x ^= x << 5;
            Ipv4Addr::from(x)
        })
        .collect()
}

fn build_geo(rows: u32, with_index: bool) -> GeoDatabase {
    let mut builder = GeoImageBuilder::new(5).with_index(with_index);
    let step = u32::MAX / rows;
    for i in 0..rows {
        let location = if i % 2 == 0 {
            GeoLocation::new("US", "United States of America", "Texas", "Austin")
                .with_position(30.2672, -97.7431)
        } else {
            GeoLocation::new("DE", "Germany", "Berlin", &format!("City {}", i % 500))
        };
        builder
            .add_ipv4(Ipv4Addr::from(i * step), location)
            .unwrap();
        builder
            .add_ipv6(Ipv6Addr::from((i as u128) << 100), GeoLocation::unknown())
            .unwrap();
    }
    GeoDatabase::from_bytes(builder.build().unwrap()).unwrap()
}

fn bench_geo_lookup(c: &mut Criterion) {
    let addrs = generate_ipv4(1000, 0x2545_F491);
    let mut group = c.benchmark_group("geo_lookup");
    group.throughput(Throughput::Elements(addrs.len() as u64));

    for rows in [1_000u32, 100_000].iter() {
        for with_index in [false, true] {
            let db = build_geo(*rows, with_index);
            let name = if with_index { "indexed" } else { "plain" };
            group.bench_with_input(BenchmarkId::new(name, rows), &addrs, |b, addrs| {
                b.iter(|| {
                    for addr in addrs {
                        black_box(db.lookup_ipv4(*addr));
                    }
                });
            });
        }
    }

    group.finish();
}

fn build_matcher(count: u32) -> RangeMatcher {
    let drop: SortedList<_> = (0..count)
        .filter_map(|i| {
            let net = Ipv4Addr::from(0x0100_0000 + i * 0x1000);
            parse_drop_line(&format!("{}/20 ; SBL{}", net, 100_000 + i))
        })
        .collect();
    let dropv6: SortedList<_> = (0..count / 4)
        .filter_map(|i| {
            let net = Ipv6Addr::from((0x2a06u128 << 112) | ((i as u128) << 96));
            parse_dropv6_line(&format!("{}/32 ; SBL{}", net, 300_000 + i))
        })
        .collect();
    RangeMatcher::from_lists(drop, dropv6)
}

fn bench_range_matcher(c: &mut Criterion) {
    let addrs: Vec<IpAddr> = generate_ipv4(1000, 0x9E37_79B9)
        .into_iter()
        .map(IpAddr::V4)
        .collect();
    let mut group = c.benchmark_group("range_matcher");
    group.throughput(Throughput::Elements(addrs.len() as u64));

    for entries in [1_000u32, 10_000].iter() {
        let matcher = build_matcher(*entries);
        group.bench_with_input(
            BenchmarkId::new("is_listed", entries),
            &addrs,
            |b, addrs| {
                b.iter(|| {
                    for addr in addrs {
                        black_box(matcher.is_listed(*addr));
                    }
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_geo_lookup, bench_range_matcher);
criterion_main!(benches);
