//! A deterministic field of panel seams: long stiffener welds mixed with
//! short tack welds, on both sides, including seams inside the shared band
//! between the two robot pairs.

use gantryline::{GantrySpec, RobotSpec, Scene, Side, Weld, ZoneSpec};

const ROWS: [f64; 5] = [250.0, 700.0, 1500.0, 2200.0, 2800.0];

pub fn panel_field() -> (Scene, Vec<Weld>) {
    let scene = Scene::new(
        GantrySpec { x_length: 6000.0, x_speed: 300.0 },
        vec![
            RobotSpec::new("R1", Side::XPlus, (0.0, 1400.0), 120.0),
            RobotSpec::new("R2", Side::XMinus, (0.0, 1400.0), 100.0),
            RobotSpec::new("R3", Side::XPlus, (1600.0, 3000.0), 120.0),
            RobotSpec::new("R4", Side::XMinus, (1600.0, 3000.0), 100.0),
        ],
    )
    .with_zone(ZoneSpec::new("s1", (1300.0, 1700.0), &["R1", "R3"]))
    .with_zone(ZoneSpec::new("s2", (1300.0, 1700.0), &["R2", "R4"]));

    let mut welds = vec![];
    for i in 0..12_usize {
        let x = 200.0 + 450.0 * i as f64;
        let side = if i % 2 == 0 { Side::XPlus } else { Side::XMinus };
        let y = ROWS[i % ROWS.len()];
        // every third seam is a short tack, the rest are stiffeners
        let length = if i % 3 == 2 { 150.0 } else { 800.0 };
        welds.push(Weld::new(i + 1, x, x + length, y, side));
    }
    (scene, welds)
}
