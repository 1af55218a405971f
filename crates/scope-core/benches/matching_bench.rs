//! Criterion benchmarks for matching and support-grid erosion.
//!
//! Run with: `cargo bench -p scope-core`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use scope_core::matching::MatchGraph;
use scope_core::support::OccupancyGrid;
use scope_core::types::{ObjectId, RoleId};

/// Dense-ish bipartite graph: role `i` connects to objects `i..i+3`
fn banded_graph(roles: usize) -> MatchGraph {
    let mut graph = MatchGraph::new();
    for i in 0..roles {
        let role = RoleId::new(format!("role_{i}"));
        for j in i..i + 3 {
            graph.add_edge(&role, ObjectId(j as u32));
        }
    }
    graph
}

fn bench_matching(c: &mut Criterion) {
    let mut group = c.benchmark_group("perfect_matching");
    for roles in [4, 16, 64] {
        let graph = banded_graph(roles);
        group.bench_with_input(BenchmarkId::from_parameter(roles), &graph, |b, g| {
            b.iter(|| black_box(g.perfect_matching()));
        });
    }
    group.finish();
}

fn bench_erosion(c: &mut Criterion) {
    // a 1.2 m x 0.8 m table top
    let grid = OccupancyGrid::covering(-0.6, 0.6, -0.4, 0.4);
    c.bench_function("erode_table_top_10x10", |b| {
        b.iter(|| black_box(grid.erode(10, 10)));
    });
}

criterion_group!(benches, bench_matching, bench_erosion);
criterion_main!(benches);
