//! Benchmarks for brine-core live in `benches/`.
