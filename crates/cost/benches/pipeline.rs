//! Benchmarks for the cost-surface pipeline

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use skiroute_core::{GeoTransform, Raster};
use skiroute_cost::membership::{apply_transform, CostBounds, LayerTransform, MembershipFunction};
use skiroute_cost::{CostSurfaceConfig, CostSurfacePipeline, FeatureMask, MaskLayer, PipelineInputs, RawLayer};

fn create_layer(size: usize, lo: f32, hi: f32, seed: usize) -> Raster<f32> {
    let mut raster = Raster::new(size, size);
    raster.set_transform(GeoTransform::new(0.0, size as f64 * 10.0, 10.0, -10.0));

    for row in 0..size {
        for col in 0..size {
            let t = ((row * 7 + col * 13 + seed * 31) % 100) as f32 / 100.0;
            raster.set(row, col, lo + t * (hi - lo)).unwrap();
        }
    }
    raster
}

fn create_mask(size: usize, every: usize) -> FeatureMask {
    let mut raster = create_layer(size, 0.0, 0.0, 0);
    for row in 0..size {
        for col in (row % every..size).step_by(every) {
            raster.set(row, col, 1.0).unwrap();
        }
    }
    FeatureMask::from_raster(&raster)
}

fn create_inputs(size: usize) -> PipelineInputs {
    PipelineInputs::new()
        .with_raw(RawLayer::Elevation, create_layer(size, 400.0, 1400.0, 0))
        .with_raw(RawLayer::Slope, create_layer(size, 0.0, 60.0, 1))
        .with_raw(RawLayer::Curvature, create_layer(size, -8.0, 8.0, 2))
        .with_raw(RawLayer::TravelAngle, create_layer(size, 10.0, 50.0, 3))
        .with_mask(MaskLayer::Roads, create_mask(size, 37))
        .with_mask(MaskLayer::Trails, create_mask(size, 17))
        .with_mask(MaskLayer::Rivers, create_mask(size, 53))
        .with_mask(MaskLayer::Bridges, create_mask(size, 101))
        .with_mask(MaskLayer::Forest, create_mask(size, 2))
}

fn bench_transform(c: &mut Criterion) {
    let mut group = c.benchmark_group("bell_transform");
    let transform = LayerTransform::new(MembershipFunction::GeneralizedBell {
        scale: 11.0,
        shape: 4.0,
        center: 43.0,
    });

    for size in [256, 512, 1024].iter() {
        let slope = create_layer(*size, 0.0, 60.0, 1);

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| apply_transform(black_box(&slope), &transform, CostBounds::default()).unwrap())
        });
    }

    group.finish();
}

fn bench_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("cost_surface");
    let pipeline = CostSurfacePipeline::new(CostSurfaceConfig::default()).unwrap();

    for size in [256, 512, 1024, 2048].iter() {
        let inputs = create_inputs(*size);

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| pipeline.run(black_box(&inputs)).unwrap())
        });
    }

    group.finish();
}

criterion_group!(benches, bench_transform, bench_pipeline);
criterion_main!(benches);
