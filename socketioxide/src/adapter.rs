//! The room↔socket bipartite index for one namespace (spec.md §4.4), and the
//! `Adapter` trait that makes it pluggable for a future out-of-process
//! implementation (never provided here — spec.md §1 Non-goals).

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use engineioxide::Sid;

use crate::errors::AdapterError;

/// A room name. Plain `String` rather than a newtype: the adapter treats a
/// bare socket id string as a room too (the self-room, and the selector
/// heuristic in spec.md §4.4's last paragraph), so there is no useful
/// distinction to enforce at the type level.
pub type Room = String;

/// Anything that can be turned into a list of room names: a single room, a
/// `Vec`, an array, or anything else that is `IntoIterator<Item = Room>`-ish.
/// Mirrors the teacher's `RoomParam` used throughout `socket.rs`/`operators.rs`.
pub trait RoomParam: Send + 'static {
    type IntoIter: Iterator<Item = Room>;
    fn into_room_iter(self) -> Self::IntoIter;
}

impl RoomParam for Room {
    type IntoIter = std::option::IntoIter<Room>;
    fn into_room_iter(self) -> Self::IntoIter {
        Some(self).into_iter()
    }
}

impl RoomParam for &'static str {
    type IntoIter = std::option::IntoIter<Room>;
    fn into_room_iter(self) -> Self::IntoIter {
        Some(self.to_string()).into_iter()
    }
}

impl RoomParam for Vec<Room> {
    type IntoIter = std::vec::IntoIter<Room>;
    fn into_room_iter(self) -> Self::IntoIter {
        self.into_iter()
    }
}

impl<const N: usize> RoomParam for [&'static str; N] {
    type IntoIter = std::vec::IntoIter<Room>;
    fn into_room_iter(self) -> Self::IntoIter {
        self.into_iter().map(str::to_string).collect::<Vec<_>>().into_iter()
    }
}

impl RoomParam for Vec<&'static str> {
    type IntoIter = std::vec::IntoIter<Room>;
    fn into_room_iter(self) -> Self::IntoIter {
        self.into_iter().map(str::to_string).collect::<Vec<_>>().into_iter()
    }
}

/// The room index backing one namespace. Implementations of a distributed
/// adapter would replace this with RPCs to peer nodes; the contract is the
/// same set of operations described in spec.md §4.4.
pub trait Adapter: Send + Sync + 'static {
    type Error: std::error::Error + Send + 'static;

    fn new() -> Self;

    /// Adds `sid` to every room in `rooms`, creating rooms on demand.
    fn add_all(&self, sid: Sid, rooms: impl RoomParam) -> Result<(), Self::Error>;

    /// Removes `sid` from every room in `rooms`. Rooms left empty are
    /// deleted eagerly.
    fn del(&self, sid: Sid, rooms: impl RoomParam) -> Result<(), Self::Error>;

    /// Removes `sid` from every room it belongs to.
    fn del_all(&self, sid: Sid) -> Result<(), Self::Error>;

    /// Every room `sid` currently belongs to.
    fn socket_rooms(&self, sid: Sid) -> Result<Vec<Room>, Self::Error>;

    /// `sockets(∅)` is every socket in the namespace; otherwise the union of
    /// `rooms[r]` for `r` in `include`.
    fn sockets(&self, include: impl RoomParam) -> Result<HashSet<Sid>, Self::Error>;

    /// `(⋃ rooms[r] for r in include) \ (⋃ rooms[r] for r in exclude)`,
    /// snapshotted at call time, per spec.md §8's selector-algebra invariant.
    fn candidates(&self, include: &[Room], exclude: &[Room]) -> Result<HashSet<Sid>, Self::Error>;
}

/// In-memory `Adapter` for a single process. The only implementation this
/// crate ships, per spec.md's Non-goals (clustering is out of scope).
#[derive(Debug, Default)]
pub struct LocalAdapter {
    rooms: RwLock<HashMap<Room, HashSet<Sid>>>,
    sids: RwLock<HashMap<Sid, HashSet<Room>>>,
}

impl Adapter for LocalAdapter {
    type Error = std::convert::Infallible;

    fn new() -> Self {
        Self::default()
    }

    fn add_all(&self, sid: Sid, rooms: impl RoomParam) -> Result<(), Self::Error> {
        let mut rooms_map = self.rooms.write().unwrap();
        let mut sids_map = self.sids.write().unwrap();
        for room in rooms.into_room_iter() {
            rooms_map.entry(room.clone()).or_default().insert(sid);
            sids_map.entry(sid).or_default().insert(room);
        }
        Ok(())
    }

    fn del(&self, sid: Sid, rooms: impl RoomParam) -> Result<(), Self::Error> {
        let mut rooms_map = self.rooms.write().unwrap();
        let mut sids_map = self.sids.write().unwrap();
        for room in rooms.into_room_iter() {
            if let Some(members) = rooms_map.get_mut(&room) {
                members.remove(&sid);
                if members.is_empty() {
                    rooms_map.remove(&room);
                }
            }
            if let Some(owned) = sids_map.get_mut(&sid) {
                owned.remove(&room);
            }
        }
        Ok(())
    }

    fn del_all(&self, sid: Sid) -> Result<(), Self::Error> {
        let mut rooms_map = self.rooms.write().unwrap();
        let mut sids_map = self.sids.write().unwrap();
        if let Some(owned) = sids_map.remove(&sid) {
            for room in owned {
                if let Some(members) = rooms_map.get_mut(&room) {
                    members.remove(&sid);
                    if members.is_empty() {
                        rooms_map.remove(&room);
                    }
                }
            }
        }
        Ok(())
    }

    fn socket_rooms(&self, sid: Sid) -> Result<Vec<Room>, Self::Error> {
        Ok(self
            .sids
            .read()
            .unwrap()
            .get(&sid)
            .map(|rooms| rooms.iter().cloned().collect())
            .unwrap_or_default())
    }

    fn sockets(&self, include: impl RoomParam) -> Result<HashSet<Sid>, Self::Error> {
        let include: Vec<Room> = include.into_room_iter().collect();
        if include.is_empty() {
            return Ok(self.sids.read().unwrap().keys().copied().collect());
        }
        let rooms_map = self.rooms.read().unwrap();
        Ok(include
            .iter()
            .filter_map(|r| rooms_map.get(r))
            .flatten()
            .copied()
            .collect())
    }

    fn candidates(&self, include: &[Room], exclude: &[Room]) -> Result<HashSet<Sid>, Self::Error> {
        let rooms_map = self.rooms.read().unwrap();
        let included: HashSet<Sid> = if include.is_empty() {
            self.sids.read().unwrap().keys().copied().collect()
        } else {
            include.iter().filter_map(|r| rooms_map.get(r)).flatten().copied().collect()
        };
        let excluded: HashSet<Sid> = exclude.iter().filter_map(|r| rooms_map.get(r)).flatten().copied().collect();
        Ok(included.difference(&excluded).copied().collect())
    }
}

impl From<std::convert::Infallible> for AdapterError {
    fn from(e: std::convert::Infallible) -> Self {
        match e {}
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn membership_is_mutually_consistent() {
        let adapter = LocalAdapter::new();
        let sid = Sid::new();
        adapter.add_all(sid, vec!["room1".to_string(), "room2".to_string()]).unwrap();
        assert!(adapter.sockets("room1".to_string()).unwrap().contains(&sid));
        assert_eq!(adapter.socket_rooms(sid).unwrap().len(), 2);

        adapter.del(sid, "room1".to_string()).unwrap();
        assert!(!adapter.sockets("room1".to_string()).unwrap().contains(&sid));
        assert_eq!(adapter.socket_rooms(sid).unwrap(), vec!["room2".to_string()]);
    }

    #[test]
    fn empty_rooms_are_deleted_eagerly() {
        let adapter = LocalAdapter::new();
        let sid = Sid::new();
        adapter.add_all(sid, "room1".to_string()).unwrap();
        adapter.del(sid, "room1".to_string()).unwrap();
        assert!(adapter.rooms.read().unwrap().is_empty());
    }

    #[test]
    fn del_all_removes_every_membership() {
        let adapter = LocalAdapter::new();
        let sid = Sid::new();
        adapter.add_all(sid, vec!["r1".to_string(), "r2".to_string()]).unwrap();
        adapter.del_all(sid).unwrap();
        assert!(adapter.socket_rooms(sid).unwrap().is_empty());
        assert!(adapter.rooms.read().unwrap().is_empty());
    }

    #[test]
    fn candidates_computes_include_minus_exclude() {
        let adapter = LocalAdapter::new();
        let a = Sid::new();
        let b = Sid::new();
        let c = Sid::new();
        adapter.add_all(a, "r1".to_string()).unwrap();
        adapter.add_all(b, vec!["r1".to_string(), "rE".to_string()]).unwrap();
        adapter.add_all(c, "r2".to_string()).unwrap();

        let got = adapter
            .candidates(&["r1".to_string(), "r2".to_string()], &["rE".to_string()])
            .unwrap();
        assert!(got.contains(&a));
        assert!(got.contains(&c));
        assert!(!got.contains(&b));
    }
}
