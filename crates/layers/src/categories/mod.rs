mod chargers;
mod drives;
mod laundries;
mod listings;
mod stations;

pub use chargers::ChargersLayer;
pub use drives::DrivesLayer;
pub use laundries::LaundriesLayer;
pub use listings::ListingsLayer;
pub use stations::StationsLayer;

use std::fmt::Write;

use foundation::ids::EntityId;
use scene::entity::Entity;

/// `"/{base}/{id}"` with the id percent-encoded as a single path segment.
pub(crate) fn detail_href(base: &str, id: &EntityId) -> String {
    format!("/{base}/{}", encode_path_segment(&id.to_string()))
}

/// Turn-by-turn link when the entity has a position, detail page otherwise.
pub(crate) fn navigate_href(entity: &Entity, base: &str) -> String {
    match entity.map_position() {
        Some(p) => format!(
            "https://www.google.com/maps/dir/?api=1&destination={:.6},{:.6}",
            p.lat, p.lon
        ),
        None => detail_href(base, &entity.id),
    }
}

fn encode_path_segment(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        if b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.' | b'~') {
            out.push(b as char);
        } else {
            let _ = write!(out, "%{b:02X}");
        }
    }
    out
}
