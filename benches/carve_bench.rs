use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use sector_carver::simd_search::find_pattern_simd;
use sector_carver::{Carver, ScanConfig};

const PNG_HEADER: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
const IEND: [u8; 8] = [0x49, 0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82];

/// 16 MiB image with a PNG every 64 KiB and a JPG header in between
fn synthetic_image() -> Vec<u8> {
    let mut blob = vec![0x5Au8; 16 * 1024 * 1024];
    for base in (0..blob.len()).step_by(64 * 1024) {
        blob[base..base + 8].copy_from_slice(&PNG_HEADER);
        blob[base + 4000..base + 4008].copy_from_slice(&IEND);
        blob[base + 8192..base + 8196].copy_from_slice(&[0xFF, 0xD8, 0xFF, 0xE0]);
    }
    blob
}

fn bench_pattern_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("pattern_search");

    let haystack = vec![0u8; 1024 * 1024];
    group.throughput(Throughput::Bytes(haystack.len() as u64));

    group.bench_function("png_header_miss", |b| {
        b.iter(|| black_box(find_pattern_simd(&haystack, &PNG_HEADER)))
    });

    group.bench_function("zero_prefixed_miss", |b| {
        b.iter(|| black_box(find_pattern_simd(&haystack, &[0x00, 0x00, 0x01, 0xB3])))
    });

    group.finish();
}

fn bench_full_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("full_scan");
    group.sample_size(10);

    let blob = synthetic_image();
    group.throughput(Throughput::Bytes(blob.len() as u64));

    for threads in [1usize, 0] {
        let carver = Carver::new(ScanConfig::new(threads));
        group.bench_function(format!("threads_{}", threads), |b| {
            b.iter(|| black_box(carver.scan(&blob).map(|r| r.len())))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_pattern_search, bench_full_scan);
criterion_main!(benches);
