use criterion::{criterion_group, criterion_main, Criterion};
use sixel_kit::{
    sixel_decode, sixel_encode, DiffusionMethod, EncodeOptions, PixelFormat, Quality,
};
use std::hint::black_box;

fn generate_gradient_rgb(width: usize, height: usize) -> Vec<u8> {
    let mut pixels = Vec::with_capacity(width * height * 3);
    for y in 0..height {
        for x in 0..width {
            pixels.push(((x * 255) / width.max(1)) as u8);
            pixels.push(((y * 255) / height.max(1)) as u8);
            pixels.push(128);
        }
    }
    pixels
}

fn generate_noise_rgb(width: usize, height: usize, mut state: u32) -> Vec<u8> {
    let mut pixels = Vec::with_capacity(width * height * 3);
    for _ in 0..width * height * 3 {
        state ^= state << 13;
        state ^= state >> 17;
        state ^= state << 5;
        pixels.push((state >> 8) as u8);
    }
    pixels
}

fn bench_encode_gradient(c: &mut Criterion) {
    let (width, height) = (640, 480);
    let rgb = generate_gradient_rgb(width, height);
    let opts = EncodeOptions::default();

    c.bench_function("encode_gradient_640x480", |b| {
        b.iter(|| {
            let result = sixel_encode(black_box(&rgb), width, height, PixelFormat::RGB888, &opts);
            assert!(result.is_ok());
            result
        })
    });
}

fn bench_encode_noise_high_quality(c: &mut Criterion) {
    let (width, height) = (256, 256);
    let rgb = generate_noise_rgb(width, height, 42);
    let opts = EncodeOptions {
        quality: Quality::High,
        ..EncodeOptions::default()
    };

    c.bench_function("encode_noise_256x256_high", |b| {
        b.iter(|| {
            let result = sixel_encode(black_box(&rgb), width, height, PixelFormat::RGB888, &opts);
            assert!(result.is_ok());
            result
        })
    });
}

fn bench_encode_few_colors(c: &mut Criterion) {
    let (width, height) = (640, 480);
    let rgb = generate_gradient_rgb(width, height);
    let opts = EncodeOptions {
        req_colors: 16,
        diffusion: DiffusionMethod::FS,
        ..EncodeOptions::default()
    };

    c.bench_function("encode_gradient_640x480_16colors_fs", |b| {
        b.iter(|| {
            let result = sixel_encode(black_box(&rgb), width, height, PixelFormat::RGB888, &opts);
            assert!(result.is_ok());
            result
        })
    });
}

fn bench_roundtrip(c: &mut Criterion) {
    let (width, height) = (320, 240);
    let rgb = generate_gradient_rgb(width, height);
    let sixel =
        sixel_encode(&rgb, width, height, PixelFormat::RGB888, &EncodeOptions::default()).unwrap();

    c.bench_function("decode_gradient_320x240", |b| {
        b.iter(|| {
            let result = sixel_decode(black_box(sixel.as_bytes()));
            assert!(result.is_ok());
            result
        })
    });
}

criterion_group!(
    benches,
    bench_encode_gradient,
    bench_encode_noise_high_quality,
    bench_encode_few_colors,
    bench_roundtrip
);
criterion_main!(benches);
