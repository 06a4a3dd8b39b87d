//! Event detection: epidemic waves in the SIRS model.
//!
//! Demonstrates `EventAction::Stop` (halt at the first infection peak) and
//! `EventAction::Continue` (collect every peak and trough as waning immunity
//! feeds damped waves toward the endemic equilibrium).
//!
//! Run with:
//!   cargo run --example infection_peak

use sirs_sweep::{
    derivative, Dopri5, EventAction, EventConfig, EventDirection, InfectionPeak, IntegrationResult,
    Parameters, SirsModel, State, Tolerances,
};

fn main() {
    let params = Parameters::new(1.0, 0.5, 0.1, 0.01);
    let sys = SirsModel::new(params);
    let event = InfectionPeak::new(params);
    let y0: [f64; 3] = State::new(0.8, 0.1, 0.1).into();

    println!("Event Detection: Infection Peaks");
    println!(
        "  beta = {}, gamma = {}, zeta = {}, R0 = {:.1}",
        params.beta,
        params.gamma,
        params.zeta,
        params.basic_reproduction_number()
    );
    println!();

    // --- Part 1: Stop at the first peak ---
    let config = EventConfig {
        direction: EventDirection::Falling,
        ..Default::default()
    };
    let mut solver = Dopri5::new(Tolerances::new(1e-10, 1e-10));
    let result = solver
        .integrate_to_event(&sys, &event, &config, 0.0, &y0, 160.0, 0.1)
        .unwrap();

    match result {
        IntegrationResult::Event(ev) => {
            println!("Part 1: EventAction::Stop");
            println!("  Peak at t = {:.4} days", ev.t);
            println!("  I = {:.6}, S = {:.6}", ev.y[1], ev.y[0]);
            println!(
                "  S - gamma N / beta = {:.2e}",
                ev.y[0] - params.gamma * params.population / params.beta
            );
            println!("  Brent iterations: {}", ev.iterations);
        }
        IntegrationResult::Completed { t, .. } => {
            println!("Part 1: No peak found (reached t = {t})");
        }
    }

    println!();

    // --- Part 2: every peak and trough over 1000 days ---
    let config_continue = EventConfig {
        direction: EventDirection::Any,
        action: EventAction::Continue,
        ..Default::default()
    };
    let mut solver2 = Dopri5::new(Tolerances::new(1e-10, 1e-10));
    let _ = solver2
        .integrate_to_event(&sys, &event, &config_continue, 0.0, &y0, 1000.0, 0.1)
        .unwrap();

    println!("Part 2: EventAction::Continue (1000 days)");
    for (i, ev) in solver2.collected_events.iter().enumerate() {
        // dg/dt has the sign of dS/dt: g falls through zero at a peak
        let kind = if derivative(&State::from(ev.y), &params).s < 0.0 {
            "peak"
        } else {
            "trough"
        };
        println!(
            "    #{}: {:6} t = {:8.3} days  I = {:.6}",
            i + 1,
            kind,
            ev.t,
            ev.y[1]
        );
    }
    if let Some(eq) = params.endemic_equilibrium() {
        println!("  Endemic equilibrium: I* = {:.6}", eq.i);
    }
}
