use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use paint_recipe::{Paint, PaintMixingService, Rgb, SuggestOptions};

fn palette(size: u32) -> Vec<Paint> {
    (0..size)
        .map(|i| {
            Paint::new(
                format!("Paint {i}"),
                Rgb::new(
                    ((i * 37) % 256) as u8,
                    ((i * 91 + 40) % 256) as u8,
                    ((i * 53 + 120) % 256) as u8,
                ),
            )
        })
        .collect()
}

fn bench_prepare(c: &mut Criterion) {
    let service: PaintMixingService = PaintMixingService::default();
    let paints = palette(12);
    c.bench_function("prepare_palette_12", |b| {
        b.iter(|| service.prepare_palette(black_box(&paints)))
    });
}

fn bench_suggest(c: &mut Criterion) {
    let service: PaintMixingService = PaintMixingService::default();
    let target = Rgb::new(128, 90, 160);
    let mut group = c.benchmark_group("suggest");

    for size in [6u32, 12, 40] {
        let prepared = service.prepare_palette(&palette(size));
        for max_colors in [2usize, 3] {
            let options = SuggestOptions::new(max_colors, 10);
            group.bench_with_input(
                BenchmarkId::new(format!("{max_colors}_colors"), size),
                &prepared,
                |b, prepared| b.iter(|| service.suggest(prepared, black_box(target), &options)),
            );
        }
    }

    group.finish();
}

criterion_group!(benches, bench_prepare, bench_suggest);
criterion_main!(benches);
