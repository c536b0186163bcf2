use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;

use chrono::{TimeZone, Utc};
use mailias::alias::merge::{Candidate, MergeEngine, MergeOptions};
use mailias::model::alias::StoreLine;
use mailias::parser::address::parse_address_list;

const HEADER: &str = concat!(
    "\"Doe, Jürgen\" <jurgen@example.com>, Doe, John <john.doe@example.com>, ",
    "=?UTF-8?B?Sm9zw6k=?= <jose@example.com>, no-reply@service.example, ",
    "\"Smith (Work), Jane\" <jane.smith@corp.example>, ",
    "=?ISO-8859-1?Q?Fran=E7ois_Lef=E8vre?= <francois@example.fr>"
);

fn bench_split_header(c: &mut Criterion) {
    c.bench_function("parse_address_list", |b| {
        b.iter(|| parse_address_list(black_box(HEADER)))
    });
}

fn bench_merge(c: &mut Criterion) {
    let store: Vec<StoreLine> = (0..1000)
        .map(|i| StoreLine::parse(&format!("alias person{i} <person{i}@example.com>")))
        .collect();
    let addresses = parse_address_list(HEADER);
    let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
    let sent_at = mailias::parser::date::resolve("Mon, 15 Jan 2024 10:00:00 +0100");

    c.bench_function("merge_into_1000_lines", |b| {
        b.iter(|| {
            let mut engine = MergeEngine::new(store.clone(), MergeOptions::default(), now);
            for address in &addresses {
                engine.offer(Candidate {
                    address: address.clone(),
                    sent_at: sent_at.clone(),
                });
            }
            engine.finish().lines.len()
        })
    });
}

fn bench_resolve_dates(c: &mut Criterion) {
    let dates = [
        "Mon, 15 Jan 2024 10:00:00 +0100",
        "16 Jan 2024 08:30 EST",
        "Di, 16 Jan 2024 08:30:00 +0100",
        "16-JUL-2025 10:11:12 +0000",
        "garbage",
    ];
    c.bench_function("resolve_dates", |b| {
        b.iter(|| {
            for d in &dates {
                black_box(mailias::parser::date::resolve(d));
            }
        })
    });
}

criterion_group!(benches, bench_split_header, bench_merge, bench_resolve_dates);
criterion_main!(benches);
