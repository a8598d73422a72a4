//! Throughput benchmarks for timeline operations
//!
//! Measures push rate by frame size and lookup rate on a full timeline.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use sight_timeline::timeline::{
    matrix, Direction, FrameTimeline, Matrix4, MatrixTimeline, PixelFormat, PixelType, RawLayout,
    RawTimeline, SlotLayout,
};

fn bench_raw_push(c: &mut Criterion) {
    let timeline = RawTimeline::new();
    timeline.init_pool_size(RawLayout::new(64), 100).unwrap();
    let mut ms = 0.0;

    c.bench_function("raw_push_64b", |b| {
        b.iter(|| {
            ms += 1.0;
            let mut buffer = timeline.create_buffer(ms).unwrap();
            buffer.as_bytes_mut().fill(7);
            timeline.push(black_box(buffer)).unwrap();
        })
    });
}

fn bench_frame_push_by_size(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame_push");

    let sizes = vec![
        (64, 64, "64x64"),
        (256, 256, "256x256"),
        (640, 480, "640x480"),
        (1024, 1024, "1024x1024"),
    ];

    for (width, height, name) in sizes {
        group.throughput(Throughput::Bytes((width * height) as u64));

        let timeline = FrameTimeline::new();
        timeline
            .init_frame_pool(width, height, PixelType::Uint8, PixelFormat::GrayScale, 30)
            .unwrap();
        let frame = vec![128u8; width * height];

        group.bench_with_input(BenchmarkId::from_parameter(name), &frame, |b, frame| {
            let mut ms = 0.0;
            b.iter(|| {
                ms += 33.0;
                let mut buffer = timeline.create_buffer(ms).unwrap();
                buffer.set_frame(0, frame).unwrap();
                timeline.push(buffer).unwrap();
            });
        });
    }

    group.finish();
}

fn bench_matrix_push(c: &mut Criterion) {
    let timeline = MatrixTimeline::new();
    timeline
        .init_pool_size(SlotLayout::of::<Matrix4>(8), 500)
        .unwrap();
    let pose = matrix::translation(1.0, 2.0, 3.0);
    let mut ms = 0.0;

    c.bench_function("matrix_push_8_tools", |b| {
        b.iter(|| {
            ms += 1.0;
            let mut sample = timeline.create_buffer(ms).unwrap();
            for tool in [0, 3, 5] {
                sample.set_element(pose, tool).unwrap();
            }
            timeline.push(sample).unwrap();
        })
    });
}

fn bench_closest_lookup_by_len(c: &mut Criterion) {
    let mut group = c.benchmark_group("closest_lookup");

    for len in [10usize, 100, 1_000, 10_000] {
        let timeline = RawTimeline::new();
        timeline.init_pool_size(RawLayout::new(8), len).unwrap();
        for i in 0..len {
            timeline
                .push(timeline.create_buffer(i as f64 * 10.0).unwrap())
                .unwrap();
        }
        let span = len as f64 * 10.0;

        group.bench_with_input(BenchmarkId::from_parameter(len), &span, |b, &span| {
            let mut query = 0.0;
            b.iter(|| {
                query = (query + 37.3) % span;
                black_box(timeline.get_closest_object(query, Direction::Both));
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_raw_push,
    bench_frame_push_by_size,
    bench_matrix_push,
    bench_closest_lookup_by_len
);

criterion_main!(benches);
