//! Benchmarks for the tile animation pipeline.

use std::borrow::Cow;
use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use rand::Rng;

use animap::{
    animation::TableBuilder,
    compute::{MapPalette, PaletteEncoder, Timeline},
    schema::{PipelineConfig, TileGrid},
};

/// Noise GIF with a 16-color global palette.
fn noise_gif(width: u16, height: u16, frames: usize) -> Vec<u8> {
    let mut rng = rand::thread_rng();
    let palette: Vec<u8> = (0..16 * 3).map(|_| rng.r#gen::<u8>()).collect();

    let mut bytes = Vec::new();
    {
        let mut encoder = gif::Encoder::new(&mut bytes, width, height, &palette).unwrap();
        encoder.set_repeat(gif::Repeat::Infinite).unwrap();
        for _ in 0..frames {
            let indices: Vec<u8> = (0..usize::from(width) * usize::from(height))
                .map(|_| rng.gen_range(0..16))
                .collect();
            let mut frame = gif::Frame::default();
            frame.width = width;
            frame.height = height;
            frame.delay = 10;
            frame.buffer = Cow::Owned(indices);
            encoder.write_frame(&frame).unwrap();
        }
    }
    bytes
}

fn bench_decode(c: &mut Criterion) {
    let bytes = noise_gif(320, 240, 10);
    c.bench_function("timeline_decode_320x240x10", |b| {
        b.iter(|| Timeline::decode(black_box(&bytes)).unwrap());
    });
}

fn bench_encode_tile(c: &mut Criterion) {
    let encoder = PaletteEncoder::new(Arc::new(MapPalette::new()), 128);
    let mut rng = rand::thread_rng();
    let tile = image::RgbaImage::from_fn(128, 128, |_, _| {
        image::Rgba([rng.r#gen(), rng.r#gen(), rng.r#gen(), 255])
    });

    c.bench_function("palette_encode_128", |b| {
        b.iter(|| encoder.encode(black_box(&tile)).unwrap());
    });
}

fn bench_build_table(c: &mut Criterion) {
    let mut group = c.benchmark_group("table_build");
    group.sample_size(10);

    let timeline = Timeline::decode(&noise_gif(160, 120, 6)).unwrap();
    for (w, h) in [(1, 1), (2, 2), (4, 3)] {
        let grid = TileGrid::new(w, h).unwrap();
        let builder = TableBuilder::new(
            grid,
            &PipelineConfig::default(),
            Arc::new(MapPalette::new()),
        );

        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}x{}", w, h)),
            &grid,
            |b, _| {
                b.iter(|| builder.build(black_box(&timeline)).unwrap());
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_decode, bench_encode_tile, bench_build_table);
criterion_main!(benches);
