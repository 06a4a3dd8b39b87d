//! Baseline SIRS run printed as a table.
//!
//! Integrates the reference scenario (N = 1, beta = 0.5, gamma = 0.1,
//! zeta = 0.01, S0 = 0.8, I0 = R0 = 0.1) over 160 days and prints every
//! tenth day, then compares against plain SIR (zeta = 0).
//!
//! Run with:
//!   cargo run --example baseline

use sirs_sweep::{simulate, Parameters, State, TimeGrid};

fn main() {
    let params = Parameters::new(1.0, 0.5, 0.1, 0.01);
    let initial = State::new(0.8, 0.1, 0.1);
    let grid = TimeGrid::linspace(0.0, 160.0, 17).unwrap();

    let sirs = simulate(&params, initial, &grid).unwrap();
    let sir = simulate(&params.with_zeta(0.0), initial, &grid).unwrap();

    println!("Baseline SIRS run (R0 = {:.1})", params.basic_reproduction_number());
    println!();
    println!(
        "  {:>6}  {:>10}  {:>10}  {:>10}  {:>12}",
        "t", "S", "I", "R", "I (zeta=0)"
    );
    for ((t, state), plain) in sirs.iter().zip(sir.states()) {
        println!(
            "  {:6.1}  {:10.6}  {:10.6}  {:10.6}  {:12.3e}",
            t, state.s, state.i, state.r, plain.i
        );
    }
    println!();

    let (t_peak, i_peak) = sirs.peak_infected().unwrap();
    println!("  Largest sampled I: {i_peak:.6} at t = {t_peak}");
    println!(
        "  Max |S + I + R - N|: {:.2e}",
        sirs.max_total_deviation(params.population)
    );
    if let Some(eq) = params.endemic_equilibrium() {
        println!(
            "  Endemic equilibrium: S* = {:.6}, I* = {:.6}, R* = {:.6}",
            eq.s, eq.i, eq.r
        );
    }
}
