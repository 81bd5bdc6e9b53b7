//! Instances shared by the engine and orchestrator tests.

use crate::model::{Instance, Patient, Ward};

/// Three wards with capacities [2, 2, 1], five one-day patients, a two-day
/// horizon, every ward compatible with every patient.
pub(crate) fn three_wards() -> Instance {
    let wards = [2, 2, 1]
        .into_iter()
        .enumerate()
        .map(|(i, capacity)| {
            Ward::new(format!("W{i}"), capacity)
                .with_specializations([0])
                .with_operating_time([120, 120])
        })
        .collect();
    let patients = (0..5)
        .map(|i| {
            Patient::new(format!("P{i}"), 0)
                .with_window(0, 1)
                .with_operating_time(20 + 10 * i as u32)
        })
        .collect();
    Instance::new(2, wards, patients).unwrap()
}

/// A week-long instance with two specializations, multi-day stays and
/// operating-time limits; feasible in hard mode with room to spare.
pub(crate) fn week() -> Instance {
    let wards = vec![
        Ward::new("surgery", 4)
            .with_specializations([0])
            .with_operating_time([240, 240, 240, 240, 240, 0, 0])
            .with_carryover([2, 1, 0, 0, 0, 0, 0]),
        Ward::new("general", 5)
            .with_specializations([0, 1])
            .with_operating_time([120, 120, 120, 120, 120, 60, 60]),
        Ward::new("medicine", 3)
            .with_specializations([1])
            .with_operating_time([60; 7]),
    ];
    let patients = (0..18)
        .map(|i: usize| {
            let earliest = i % 4;
            Patient::new(format!("P{i:02}"), (i % 3 == 0) as u32)
                .with_window(earliest, earliest + 2 + i % 2)
                .with_length_of_stay(1 + i % 3)
                .with_operating_time(if i % 3 == 0 { 15 } else { 30 + 5 * (i % 4) as u32 })
        })
        .collect();
    Instance::new(7, wards, patients).unwrap()
}
