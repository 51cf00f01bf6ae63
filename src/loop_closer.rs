/// LOOP CLOSER
///
/// A lap cut between two returns usually stops a few metres short of where
/// it began. Renderers and the orientation test want a closed ring, so the
/// first fix is repeated at the end when the gap exceeds the tolerance.

use crate::track_loader::Fix;

/// Closes `ring` in place. Returns true when a closing point was added.
///
/// The appended point is an exact copy of the first fix, elevation
/// included, so the recorded start elevation is kept rather than the last
/// fix's.
pub fn close_loop(ring: &mut Vec<Fix>, tolerance_m: f64) -> bool {
    let (first, last) = match (ring.first(), ring.last()) {
        (Some(first), Some(last)) => (*first, *last),
        _ => return false,
    };

    if first.distance_to(&last) > tolerance_m {
        ring.push(first);
        true
    } else {
        false
    }
}

/// Whether the ring's ends already lie within `tolerance_m`.
pub fn is_closed(ring: &[Fix], tolerance_m: f64) -> bool {
    match (ring.first(), ring.last()) {
        (Some(first), Some(last)) => first.distance_to(last) <= tolerance_m,
        _ => false,
    }
}
