//! Rectangular world of named rooms (`W8N3`, `E2S5`, ...).
//!
//! Room names encode a coordinate: `W{n}` is x = -n-1, `E{n}` is x = n,
//! `N{n}` is y = -n-1 and `S{n}` is y = n. Rooms connect to their four
//! orthogonal neighbors inside the grid bounds.

use std::collections::HashSet;

use coopos_core::Location;

use crate::topology::Topology;

/// Largest room index accepted in a name. Keeps grid arithmetic well away
/// from `i32` overflow.
pub const MAX_ROOM_INDEX: i32 = 1 << 20;

/// Parse a room name into grid coordinates.
pub fn room_name_to_coord(name: &str) -> Option<(i32, i32)> {
    let bytes = name.as_bytes();
    let h = *bytes.first()?;
    if h != b'W' && h != b'E' {
        return None;
    }
    let split = name[1..].find(|c: char| !c.is_ascii_digit())? + 1;
    let x_num: i32 = name[1..split]
        .parse()
        .ok()
        .filter(|n| (0..=MAX_ROOM_INDEX).contains(n))?;
    let v = *bytes.get(split)?;
    if v != b'N' && v != b'S' {
        return None;
    }
    let y_num: i32 = name[split + 1..]
        .parse()
        .ok()
        .filter(|n| (0..=MAX_ROOM_INDEX).contains(n))?;

    let x = if h == b'W' { -x_num - 1 } else { x_num };
    let y = match v {
        b'N' => -y_num - 1,
        b'S' => y_num,
        _ => return None,
    };
    Some((x, y))
}

/// Inverse of [`room_name_to_coord`].
pub fn coord_to_room_name(x: i32, y: i32) -> Location {
    let h = if x < 0 { format!("W{}", x.unsigned_abs() - 1) } else { format!("E{x}") };
    let v = if y < 0 { format!("N{}", y.unsigned_abs() - 1) } else { format!("S{y}") };
    format!("{h}{v}")
}

/// Bounded grid of rooms with optionally closed (unavailable) rooms.
#[derive(Debug, Clone)]
pub struct RoomGrid {
    min: (i32, i32),
    max: (i32, i32),
    closed: HashSet<(i32, i32)>,
}

impl RoomGrid {
    /// Grid spanning the rectangle between two room names (inclusive).
    pub fn between(a: &str, b: &str) -> Option<Self> {
        let (ax, ay) = room_name_to_coord(a)?;
        let (bx, by) = room_name_to_coord(b)?;
        Some(Self {
            min: (ax.min(bx), ay.min(by)),
            max: (ax.max(bx), ay.max(by)),
            closed: HashSet::new(),
        })
    }

    pub fn close(&mut self, room: &str) {
        if let Some(coord) = room_name_to_coord(room) {
            self.closed.insert(coord);
        }
    }

    pub fn bounds(&self) -> ((i32, i32), (i32, i32)) {
        (self.min, self.max)
    }

    fn in_bounds(&self, (x, y): (i32, i32)) -> bool {
        x >= self.min.0 && x <= self.max.0 && y >= self.min.1 && y <= self.max.1
    }

    /// All room names, row by row from the top-left corner.
    pub fn rooms(&self) -> Vec<Location> {
        let mut rooms = Vec::new();
        for y in self.min.1..=self.max.1 {
            for x in self.min.0..=self.max.0 {
                rooms.push(coord_to_room_name(x, y));
            }
        }
        rooms
    }
}

impl Topology for RoomGrid {
    fn neighbors(&self, location: &str) -> Vec<Location> {
        let Some((x, y)) = room_name_to_coord(location) else {
            return Vec::new();
        };
        if !self.in_bounds((x, y)) {
            return Vec::new();
        }
        [(x, y - 1), (x + 1, y), (x, y + 1), (x - 1, y)]
            .into_iter()
            .filter(|c| self.in_bounds(*c))
            .map(|(nx, ny)| coord_to_room_name(nx, ny))
            .collect()
    }

    fn is_available(&self, location: &str) -> bool {
        match room_name_to_coord(location) {
            Some(coord) => self.in_bounds(coord) && !self.closed.contains(&coord),
            None => false,
        }
    }

    fn linear_distance(&self, a: &str, b: &str) -> Option<u32> {
        let (ax, ay) = room_name_to_coord(a)?;
        let (bx, by) = room_name_to_coord(b)?;
        Some(ax.abs_diff(bx).max(ay.abs_diff(by)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_all_quadrants() {
        assert_eq!(room_name_to_coord("W0N0"), Some((-1, -1)));
        assert_eq!(room_name_to_coord("E0S0"), Some((0, 0)));
        assert_eq!(room_name_to_coord("W8N3"), Some((-9, -4)));
        assert_eq!(room_name_to_coord("E12S40"), Some((12, 40)));
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(room_name_to_coord(""), None);
        assert_eq!(room_name_to_coord("X1N1"), None);
        assert_eq!(room_name_to_coord("W1Q1"), None);
        assert_eq!(room_name_to_coord("WN1"), None);
        assert_eq!(room_name_to_coord("W1N"), None);
        assert_eq!(room_name_to_coord("W1N-1"), None);
    }

    #[test]
    fn oversized_indices_are_rejected() {
        assert_eq!(room_name_to_coord("W2147483647N0"), None);
        assert_eq!(room_name_to_coord("E0S99999999999"), None);
        assert!(room_name_to_coord("W1048576N0").is_some());

        let grid = RoomGrid::between("W2N2", "W0N0").unwrap();
        assert!(grid.neighbors("W2147483647N0").is_empty());
        assert!(!grid.is_available("W2147483647N0"));
        assert_eq!(grid.linear_distance("W2147483647N0", "W0N0"), None);
    }

    #[test]
    fn extreme_coordinates_still_name() {
        assert_eq!(coord_to_room_name(i32::MIN, 0), "W2147483647S0");
        assert_eq!(coord_to_room_name(0, i32::MIN), "E0N2147483647");
    }

    #[test]
    fn coord_names_invert() {
        for name in ["W0N0", "E0S0", "W8N3", "E5N9", "W3S2"] {
            let (x, y) = room_name_to_coord(name).unwrap();
            assert_eq!(coord_to_room_name(x, y), name);
        }
    }

    #[test]
    fn neighbors_stay_in_bounds() {
        let grid = RoomGrid::between("W2N2", "W0N0").unwrap();
        assert_eq!(grid.rooms().len(), 9);

        let corner = grid.neighbors("W2N2");
        assert_eq!(corner.len(), 2);
        assert!(corner.contains(&"W1N2".to_string()));
        assert!(corner.contains(&"W2N1".to_string()));

        assert_eq!(grid.neighbors("W1N1").len(), 4);
        assert!(grid.neighbors("E5S5").is_empty());
    }

    #[test]
    fn linear_distance_is_chebyshev() {
        let grid = RoomGrid::between("W9N9", "W0N0").unwrap();
        assert_eq!(grid.linear_distance("W9N9", "W0N0"), Some(9));
        assert_eq!(grid.linear_distance("W1N1", "W3N2"), Some(2));
        assert_eq!(grid.linear_distance("W1N1", "bogus"), None);
    }

    #[test]
    fn closed_rooms_unavailable() {
        let mut grid = RoomGrid::between("W2N2", "W0N0").unwrap();
        grid.close("W1N1");
        assert!(!grid.is_available("W1N1"));
        assert!(grid.is_available("W0N0"));
        assert!(!grid.is_available("E4S4"));
    }
}
