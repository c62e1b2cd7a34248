//! Two robot pairs bracketing a dead band: long seams run through the gap
//! and land on the upper pair via reach.

use gantryline::{GantrySpec, RobotSpec, Scene, Side, Weld, ZoneSpec};

pub fn bracketed_line() -> (Scene, Vec<Weld>) {
    let scene = Scene::new(
        GantrySpec { x_length: 6000.0, x_speed: 300.0 },
        vec![
            RobotSpec::new("R1", Side::XPlus, (0.0, 1000.0), 120.0),
            RobotSpec::new("R2", Side::XMinus, (0.0, 1000.0), 120.0),
            RobotSpec::new("R3", Side::XPlus, (2000.0, 3000.0), 120.0),
            RobotSpec::new("R4", Side::XMinus, (2000.0, 3000.0), 120.0),
        ],
    )
    .with_zone(ZoneSpec::new("s1", (900.0, 1100.0), &["R1", "R3"]))
    .with_zone(ZoneSpec::new("s2", (1900.0, 2100.0), &["R2", "R4"]));

    let welds = vec![
        Weld::new(1, 300.0, 2700.0, 300.0, Side::XPlus),
        Weld::new(2, 700.0, 1200.0, 700.0, Side::XMinus),
        Weld::new(3, 1200.0, 3300.0, 1300.0, Side::XPlus),
        Weld::new(4, 300.0, 2700.0, 1700.0, Side::XMinus),
    ];
    (scene, welds)
}
