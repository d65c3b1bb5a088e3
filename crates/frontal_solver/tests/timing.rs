// SPDX-License-Identifier: LGPL-2.1-or-later
use frontal_solver::timing::NOISE_FLOOR;
use frontal_solver::{Stopwatch, tic, toc};

#[test]
fn toc_right_after_tic_is_below_noise_or_zero() {
    let start = tic();
    let elapsed = toc(&start);
    for v in [elapsed.wall, elapsed.cpu] {
        assert!(v >= 0.0);
        assert!(v == 0.0 || v >= NOISE_FLOOR);
    }
}

#[test]
fn stopwatch_measures_busy_work() {
    let sw = Stopwatch::start();
    let mut acc = 0u64;
    for i in 0..2_000_000u64 {
        acc = acc.wrapping_mul(31).wrapping_add(i);
    }
    std::hint::black_box(acc);
    let elapsed = sw.stop();
    assert!(elapsed.wall >= 0.0 && elapsed.cpu >= 0.0);
}
