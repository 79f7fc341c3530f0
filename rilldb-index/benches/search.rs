// SPDX-License-Identifier: AGPL-3.0-or-later
// RillDB - Real-Time Vector Search Engine
// Copyright (C) 2026 Sushanth Reddy Vanagala (https://github.com/sushanthpy)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Search throughput: IVF-PQ scan vs direct scan.

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::Rng;

use rilldb_core::{DeleteBitmap, EngineCounters};
use rilldb_index::{IvfPqIndex, IvfPqParams, Metric, RawVectorStore, SearchCondition, SearchResult};

const DIM: usize = 32;
const NVEC: usize = 10_000;

fn build_index() -> (IvfPqIndex, Vec<f32>) {
    let mut rng = rand::thread_rng();
    let store = Arc::new(RawVectorStore::new(DIM));
    for i in 0..NVEC as i64 {
        let v: Vec<f32> = (0..DIM).map(|_| rng.gen::<f32>()).collect();
        store.add(i, &v, b"").unwrap();
    }

    let index = IvfPqIndex::new(
        IvfPqParams::new(DIM, DIM, 64, 8, 8, Metric::L2),
        store,
        Arc::new(DeleteBitmap::with_capacity(NVEC)),
        Arc::new(EngineCounters::new()),
    )
    .unwrap();
    index.indexing().unwrap();
    index.add_rt_vecs_to_index().unwrap();

    let query: Vec<f32> = (0..DIM).map(|_| rng.gen::<f32>()).collect();
    (index, query)
}

fn bench_search(c: &mut Criterion) {
    let (index, query) = build_index();

    let mut group = c.benchmark_group("search");

    group.bench_function("ivfpq_top10", |b| {
        let condition = SearchCondition {
            topn: 10,
            recall_num: 100,
            has_rank: true,
            ..Default::default()
        };
        let mut result = SearchResult::default();
        b.iter(|| {
            index
                .search(black_box(&query), &condition, &mut result)
                .unwrap();
            black_box(result.docids[0])
        });
    });

    group.bench_function("direct_top10", |b| {
        let condition = SearchCondition {
            topn: 10,
            use_direct_search: true,
            ..Default::default()
        };
        let mut result = SearchResult::default();
        b.iter(|| {
            index
                .search(black_box(&query), &condition, &mut result)
                .unwrap();
            black_box(result.docids[0])
        });
    });

    group.finish();
}

criterion_group!(benches, bench_search);
criterion_main!(benches);
