use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;
use takeout_fix::parse::parse_exif_date;
use takeout_fix::{CompanionMatcher, DirListing};

fn takeout_listing() -> DirListing {
    let mut names = Vec::new();
    for i in 0..500 {
        names.push(format!("IMG_{:04}.jpg", i));
        names.push(format!("IMG_{:04}.jpg.supplemental-metadata.json", i));
    }
    names.push("BonannoJohn1959VacavilleCalifWithEvaAndDelgadoK.jpg".to_string());
    names.push("BonannoJohn1959VacavilleCalifWithEvaAndDelgado.json".to_string());
    names.push("metadata.json".to_string());
    DirListing::from_names("/takeout/Photos from 2023", names)
}

fn bench_companion(c: &mut Criterion) {
    let matcher = CompanionMatcher::default();
    let listing = takeout_listing();

    c.bench_function("resolve exact", |b| {
        b.iter(|| matcher.resolve_with(black_box("IMG_0250.jpg"), &listing, |_| true))
    });

    c.bench_function("resolve progressive prefix", |b| {
        b.iter(|| {
            matcher.resolve_with(
                black_box("BonannoJohn1959VacavilleCalifWithEvaAndDelgadoK.jpg"),
                &listing,
                |_| true,
            )
        })
    });

    c.bench_function("resolve miss", |b| {
        b.iter(|| matcher.resolve_with(black_box("DSC_9999.jpg"), &listing, |_| true))
    });
}

fn bench_dates(c: &mut Criterion) {
    c.bench_function("parse exif date", |b| {
        b.iter(|| parse_exif_date(black_box("2023:01:01 12:30:45")))
    });

    c.bench_function("parse zoned date", |b| {
        b.iter(|| parse_exif_date(black_box("2023:01:01 14:30:45+02:00")))
    });
}

criterion_group!(benches, bench_companion, bench_dates);
criterion_main!(benches);
