//! Benchmarks pour la fusion et les requêtes d'indicateurs

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use enr_indicateurs::indicator::{merge, Fact};
use enr_indicateurs::{
    EnergySource, FacilityStore, Indicator, IndicatorKey, IndicatorQuery, Provenance,
    QueryService, Selector, TerritoryType, Zone,
};

/// Faits synthétiques: `zones` territoires par niveau, 4 filières, 10 ans
fn synthetic_facts(zones: usize) -> Vec<(Provenance, Vec<Fact>)> {
    let mut registre = Vec::new();
    let mut sdes = Vec::new();
    for kind in TerritoryType::ALL {
        for z in 0..zones {
            for source in EnergySource::ALL {
                for year in 2013..2023u16 {
                    for indicator in Indicator::ALL {
                        let fact = Fact {
                            key: IndicatorKey::new(
                                kind,
                                Zone::named(format!("Zone {z:04}")),
                                source,
                                year,
                            ),
                            indicator,
                            value: (z * 7 + year as usize) as f64,
                        };
                        if z % 3 == 0 {
                            sdes.push(fact.clone());
                        }
                        registre.push(fact);
                    }
                }
            }
        }
    }
    vec![(Provenance::Registre, registre), (Provenance::Sdes, sdes)]
}

fn bench_merge(c: &mut Criterion) {
    let mut group = c.benchmark_group("merge");
    for zones in [20, 100, 400] {
        let facts = synthetic_facts(zones);
        let count: usize = facts.iter().map(|(_, f)| f.len()).sum();
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(zones), &facts, |b, facts| {
            b.iter(|| black_box(merge(facts.clone())))
        });
    }
    group.finish();
}

fn bench_query(c: &mut Criterion) {
    let (table, _) = merge(synthetic_facts(400));
    let store = FacilityStore::default();
    let service = QueryService::new(&table, &store);

    let single = IndicatorQuery::new(TerritoryType::Epci)
        .zones(Zone::named("Zone 0123"))
        .indicators(Indicator::Power);
    c.bench_function("query_single_zone", |b| {
        b.iter(|| black_box(service.query(black_box(&single))))
    });

    let zones: Vec<Zone> = (0..10).map(|z| Zone::named(format!("Zone {:04}", z * 37))).collect();
    let base = IndicatorQuery::new(TerritoryType::Department)
        .years(Selector::Many(vec![2020, 2021, 2022]));
    c.bench_function("compare_ten_zones", |b| {
        b.iter(|| black_box(service.compare(&base, black_box(&zones))))
    });

    c.bench_function("total_nationwide", |b| {
        b.iter(|| {
            black_box(service.total(
                TerritoryType::Region,
                &Zone::All,
                &Selector::All,
                2020,
                Indicator::Energy,
            ))
        })
    });
}

criterion_group!(benches, bench_merge, bench_query);
criterion_main!(benches);
