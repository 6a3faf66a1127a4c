// Criterion benchmarks for Nest Match

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use nest_match::core::{build_predicates, spelling_variants, FilterRelaxationMatcher};
use nest_match::models::{Collection, PropertyType, SearchCriteria, NO_BROKER_FEE};
use nest_match::services::InMemoryListingStore;
use serde_json::{json, Value};
use std::sync::Arc;

const NEIGHBORHOODS: &[&str] = &[
    "Carroll Gardens",
    "Cobble Hill",
    "Park Slope",
    "Williamsburg",
    "Astoria",
    "East Village",
];

fn create_rental(id: usize) -> Value {
    json!({
        "id": format!("r{}", id),
        "status": "active",
        "neighborhood": NEIGHBORHOODS[id % NEIGHBORHOODS.len()],
        "borough": "Brooklyn",
        "bedrooms": id % 4,
        "monthly_rent": 1800 + (id % 30) * 100,
        "discount_percent": (id % 40) as f64,
        "no_fee": id % 5 == 0
    })
}

fn create_criteria() -> SearchCriteria {
    SearchCriteria::new(PropertyType::Rent)
        .with_bedrooms(2)
        .with_max_budget(2500.0)
        .with_neighborhood("carroll-gardens")
        .with_neighborhood("all-brooklyn")
        .with_must_have(NO_BROKER_FEE)
        .with_discount_threshold(20.0)
}

fn bench_spelling_variants(c: &mut Criterion) {
    c.bench_function("spelling_variants", |b| {
        b.iter(|| spelling_variants(black_box("Prospect Lefferts-Gardens")));
    });
}

fn bench_build_predicates(c: &mut Criterion) {
    let criteria = create_criteria();

    c.bench_function("build_predicates", |b| {
        b.iter(|| build_predicates(black_box(&criteria), black_box(Collection::Rentals)));
    });
}

fn bench_resolution(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().expect("Failed to build runtime");
    let criteria = create_criteria();

    let mut group = c.benchmark_group("resolution");

    for listing_count in [100, 1000, 5000].iter() {
        let store = Arc::new(
            InMemoryListingStore::new()
                .with_documents(Collection::Rentals, (0..*listing_count).map(create_rental)),
        );
        let matcher = FilterRelaxationMatcher::with_builtin_neighborhoods(store);

        group.bench_with_input(
            BenchmarkId::new("resolve", listing_count),
            listing_count,
            |b, _| {
                b.iter(|| runtime.block_on(matcher.resolve(black_box(&criteria), true)));
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_spelling_variants,
    bench_build_predicates,
    bench_resolution
);

criterion_main!(benches);
