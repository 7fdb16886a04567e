use std::sync::{Arc, Barrier};
use std::thread;

use overlay_frame_model::element::{Geometry, OverlayContent, OverlayElement};
use overlay_frame_model::frame::Rgba;
use overlay_registry::OverlayRegistry;
use proptest::prelude::*;

/// Element whose fields all encode the same generation number, so a torn
/// write would show up as mismatched fields.
fn stamped(id: &str, generation: u32) -> OverlayElement {
    let g = generation as i32;
    OverlayElement::new(
        id,
        Geometry::new(g, g, generation + 1, generation + 1),
        OverlayContent::Solid(Rgba::new(generation as u8, generation as u8, 0, 255)),
    )
    .with_z_order(g % 7)
}

fn is_consistent(element: &OverlayElement) -> bool {
    let g = element.geometry.x;
    element.geometry.y == g
        && element.geometry.width == g as u32 + 1
        && element.geometry.height == g as u32 + 1
        && element.z_order == g % 7
        && element.content == OverlayContent::Solid(Rgba::new(g as u8, g as u8, 0, 255))
}

#[test]
fn concurrent_snapshots_match_a_serial_history() {
    let registry = Arc::new(OverlayRegistry::new());
    let barrier = Arc::new(Barrier::new(3));

    // The writer is the only mutator, so the id list after each mutation is
    // a pure function of the version it produced.
    let writer = {
        let registry = Arc::clone(&registry);
        let barrier = Arc::clone(&barrier);
        thread::spawn(move || {
            let mut history = vec![(registry.version(), Vec::<String>::new())];
            barrier.wait();
            for generation in 0..400u32 {
                let id = format!("e{}", generation % 13);
                if generation % 5 == 4 {
                    registry.remove(&id);
                } else {
                    registry.upsert(stamped(&id, generation)).unwrap();
                }
                history.push((registry.version(), registry.ids()));
            }
            history
        })
    };

    let readers: Vec<_> = (0..2)
        .map(|_| {
            let registry = Arc::clone(&registry);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                let mut seen = Vec::new();
                for _ in 0..400 {
                    let snapshot = registry.snapshot();
                    for element in snapshot.iter() {
                        assert!(is_consistent(element), "torn element {element:?}");
                    }
                    let z: Vec<i32> = snapshot.iter().map(|e| e.z_order).collect();
                    assert!(z.windows(2).all(|w| w[0] <= w[1]));
                    seen.push((
                        snapshot.version(),
                        snapshot.iter().map(|e| e.id.clone()).collect::<Vec<_>>(),
                    ));
                }
                seen
            })
        })
        .collect();

    let history = writer.join().unwrap();
    for reader in readers {
        let mut last_version = 0;
        for (version, ids) in reader.join().unwrap() {
            assert!(version >= last_version, "snapshot versions went backwards");
            last_version = version;
            let expected = history
                .iter()
                .find(|(v, _)| *v == version)
                .map(|(_, ids)| ids)
                .expect("snapshot version produced by the writer");
            assert_eq!(&ids, expected);
        }
    }
}

#[derive(Debug, Clone)]
enum Op {
    Upsert { id: u8, z: i8 },
    Remove { id: u8 },
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (0u8..6, -3i8..3).prop_map(|(id, z)| Op::Upsert { id, z }),
        1 => (0u8..6).prop_map(|id| Op::Remove { id }),
    ]
}

proptest! {
    #[test]
    fn snapshot_matches_ordered_model(ops in proptest::collection::vec(op_strategy(), 0..40)) {
        let registry = OverlayRegistry::new();
        // (id, z, first insertion sequence)
        let mut model: Vec<(String, i32, usize)> = Vec::new();
        let mut seq = 0usize;

        for op in ops {
            match op {
                Op::Upsert { id, z } => {
                    let id = format!("o{id}");
                    let element = OverlayElement::new(
                        id.clone(),
                        Geometry::new(0, 0, 1, 1),
                        OverlayContent::Solid(Rgba::WHITE),
                    )
                    .with_z_order(z as i32);
                    registry.upsert(element).unwrap();
                    match model.iter_mut().find(|(mid, _, _)| *mid == id) {
                        Some(entry) => entry.1 = z as i32,
                        None => {
                            model.push((id, z as i32, seq));
                            seq += 1;
                        }
                    }
                }
                Op::Remove { id } => {
                    let id = format!("o{id}");
                    registry.remove(&id);
                    model.retain(|(mid, _, _)| *mid != id);
                }
            }
        }

        model.sort_by_key(|(_, z, s)| (*z, *s));
        let expected: Vec<String> = model.into_iter().map(|(id, _, _)| id).collect();
        let actual: Vec<String> = registry.snapshot().iter().map(|e| e.id.clone()).collect();
        prop_assert_eq!(actual, expected);
    }
}
