use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rawnav_core::{
    match_nearest, match_trips, repair_monotonic_order, LocalTangentPlane, NoticeContainer,
};
use rawnav_model::{ReferencePoint, TracePoint};

// Zigzag trace heading south, one fix roughly every 11 m.
fn generate_trips(num_trips: u32, points_per_trip: u32) -> Vec<TracePoint> {
    let mut traces = Vec::with_capacity((num_trips * points_per_trip) as usize);
    for trip in 0..num_trips {
        for i in 0..points_per_trip {
            let wiggle = if i % 2 == 0 { 0.0 } else { 0.00003 };
            traces.push(TracePoint {
                filename: format!("rawnav{:05}191007.txt", trip % 7).into(),
                index_trip_start_in_clean_data: trip,
                route: "79".into(),
                pattern: 1,
                index_loc: i,
                lat: 38.99 - i as f64 * 0.0001,
                long: -77.0273 + wiggle,
                odomt_ft: i as f64 * 36.4,
                sec_past_st: i as f64 * 4.0,
                heading: None,
                start_date_time: None,
            });
        }
    }
    traces
}

fn generate_stops(num_stops: u32, spacing: u32) -> Vec<ReferencePoint> {
    (0..num_stops)
        .map(|k| ReferencePoint {
            route: "79".into(),
            pattern: 1,
            stop_id: Some(format!("{}", 2000 + k).into()),
            stop_sort_order: k + 1,
            stop_lat: 38.99 - (k * spacing) as f64 * 0.0001,
            stop_lon: -77.02725,
            geo_description: None,
            trip_length: None,
            route_text: None,
        })
        .collect()
}

fn bench_matching(c: &mut Criterion) {
    let plane = LocalTangentPlane::new(38.97, -77.0273);
    let single_trace = generate_trips(1, 5_000);
    let stops = generate_stops(40, 120);

    c.bench_function("match_nearest 40 stops x 5000 fixes", |b| {
        b.iter(|| match_nearest(black_box(&stops), black_box(&single_trace), &plane))
    });

    let traces = generate_trips(200, 1_500);
    let stops = generate_stops(40, 35);
    c.bench_function("match_trips 200 trips", |b| {
        b.iter(|| {
            let mut notices = NoticeContainer::new();
            match_trips(black_box(&stops), black_box(&traces), &plane, &mut notices, None)
        })
    });

    let mut notices = NoticeContainer::new();
    let matches = match_trips(&stops, &traces, &plane, &mut notices, None);
    c.bench_function("repair_monotonic_order 200 trips", |b| {
        b.iter(|| repair_monotonic_order(black_box(matches.clone())))
    });
}

criterion_group!(benches, bench_matching);
criterion_main!(benches);
