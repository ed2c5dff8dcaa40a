#![no_main]

use libfuzzer_sys::fuzz_target;
use rb_gw::{BinEdges, BinningConfig, FrequencyGrid};

fn f64_at(data: &[u8], i: usize) -> f64 {
    let mut b = [0u8; 8];
    b.copy_from_slice(&data[8 * i..8 * i + 8]);
    f64::from_le_bytes(b)
}

fuzz_target!(|data: &[u8]| {
    if data.len() < 64 {
        return;
    }

    // Keep the grid small so the fuzzer stays fast.
    let sampling_frequency = f64_at(data, 0).abs() % 4096.0;
    let duration = f64_at(data, 1).abs() % 16.0;
    let Ok(grid) = FrequencyGrid::new(sampling_frequency, duration, f64_at(data, 2), f64_at(data, 3))
    else {
        return;
    };
    let config = BinningConfig {
        min_bin_frequency: f64_at(data, 4),
        max_bin_frequency: f64_at(data, 5),
        chi: f64_at(data, 6),
        epsilon: f64_at(data, 7),
    };
    let Ok(edges) = BinEdges::from_grid(&grid, &config) else {
        return;
    };

    let (first, last) = grid.valid_range();
    let indices = edges.indices();
    assert!(indices.len() >= 2);
    assert!(indices.windows(2).all(|w| w[0] < w[1]));
    assert!(indices[0] >= first && indices[indices.len() - 1] <= last);
});
