//! Turn cost table
//!
//! Entries for one via node form a singly linked list; the head lives in the node record.
//!
//! ```text
//! entry (16 bytes): from_edge i32 | to_edge i32 | cost i32 | next i32
//! ```

use roadgraph_common::{Error, Result};
use roadgraph_io::DataAccess;

use crate::storage::fixed::int_to_turn_cost;
use crate::types::{EdgeId, NodeId, MAX_ID_COUNT, NO_REF};

pub const TURN_COSTS_VERSION: i32 = 1;

const TC_FROM: u64 = 0;
const TC_TO: u64 = 4;
const TC_COST: u64 = 8;
const TC_NEXT: u64 = 12;
const ENTRY_BYTES: u64 = 16;

// header slots
const H_VERSION: usize = 0;
const H_STRIDE: usize = 1;
const H_COUNT: usize = 2;

/// One decoded entry
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TurnCostEntry {
    pub from_edge: EdgeId,
    pub via_node: NodeId,
    pub to_edge: EdgeId,
    /// Cost in seconds-equivalent units, `f64::INFINITY` when forbidden
    pub cost: f64,
}

impl TurnCostEntry {
    pub fn is_forbidden(&self) -> bool {
        self.cost.is_infinite()
    }
}

pub(crate) struct TurnCostStorage {
    data: Box<dyn DataAccess>,
    count: u32,
}

impl TurnCostStorage {
    pub fn new(data: Box<dyn DataAccess>) -> Self {
        Self { data, count: 0 }
    }

    pub fn create(&mut self, bytes: u64) -> Result<()> {
        self.data.create(bytes)
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    /// Insert or overwrite `(from, to)` in the list starting at `head`.
    ///
    /// Returns the new list head.
    pub fn set(&mut self, head: i32, from: EdgeId, to: EdgeId, cost: i32) -> Result<i32> {
        let mut entry = head;
        while entry != NO_REF {
            let pos = entry as u64 * ENTRY_BYTES;
            if self.data.get_int(pos + TC_FROM) == from as i32
                && self.data.get_int(pos + TC_TO) == to as i32
            {
                self.data.set_int(pos + TC_COST, cost);
                return Ok(head);
            }
            entry = self.data.get_int(pos + TC_NEXT);
        }

        if self.count as u64 >= MAX_ID_COUNT {
            return Err(Error::CapacityExceeded {
                what: "turn cost entry",
                limit: MAX_ID_COUNT,
            });
        }
        let new_entry = self.count;
        let pos = new_entry as u64 * ENTRY_BYTES;
        self.data.ensure_capacity(pos + ENTRY_BYTES)?;
        self.data.set_int(pos + TC_FROM, from as i32);
        self.data.set_int(pos + TC_TO, to as i32);
        self.data.set_int(pos + TC_COST, cost);
        self.data.set_int(pos + TC_NEXT, head);
        self.count += 1;
        Ok(new_entry as i32)
    }

    /// Stored cost of `(from, to)`, `None` when there is no entry
    pub fn get(&self, head: i32, from: EdgeId, to: EdgeId) -> Option<i32> {
        self.iter(head)
            .find(|&(f, t, _)| f == from && t == to)
            .map(|(_, _, cost)| cost)
    }

    pub fn iter(&self, head: i32) -> RawEntries<'_> {
        RawEntries {
            data: self.data.as_ref(),
            next: head,
        }
    }

    pub fn entries(&self, head: i32, via: NodeId) -> impl Iterator<Item = TurnCostEntry> + '_ {
        self.iter(head).map(move |(from, to, cost)| TurnCostEntry {
            from_edge: from,
            via_node: via,
            to_edge: to,
            cost: int_to_turn_cost(cost),
        })
    }

    pub fn flush(&mut self) -> Result<()> {
        self.data.set_header(H_VERSION, TURN_COSTS_VERSION);
        self.data.set_header(H_STRIDE, ENTRY_BYTES as i32);
        self.data.set_header(H_COUNT, self.count as i32);
        self.data.flush()
    }

    pub fn load_existing(&mut self) -> Result<bool> {
        if !self.data.load_existing()? {
            return Ok(false);
        }
        let version = self.data.get_header(H_VERSION);
        if version != TURN_COSTS_VERSION {
            return Err(Error::VersionMismatch {
                name: self.data.name().to_string(),
                expected: TURN_COSTS_VERSION,
                found: version,
            });
        }
        self.count = self.data.get_header(H_COUNT) as u32;
        Ok(true)
    }

    pub fn close(&mut self) {
        self.data.close();
    }
}

/// `(from, to, raw cost)` triples of one via node
pub(crate) struct RawEntries<'a> {
    data: &'a dyn DataAccess,
    next: i32,
}

impl Iterator for RawEntries<'_> {
    type Item = (EdgeId, EdgeId, i32);

    fn next(&mut self) -> Option<Self::Item> {
        if self.next == NO_REF {
            return None;
        }
        let pos = self.next as u64 * ENTRY_BYTES;
        let item = (
            self.data.get_int(pos + TC_FROM) as EdgeId,
            self.data.get_int(pos + TC_TO) as EdgeId,
            self.data.get_int(pos + TC_COST),
        );
        self.next = self.data.get_int(pos + TC_NEXT);
        Some(item)
    }
}
