//! Wired networks: nodes joined by cables, sharing the peripherals any of
//! them expose.
//!
//! A [`WiredGraph`] owns every node and keeps network membership up to date
//! as cables are connected and cut. Each element is notified with a
//! [`WiredNetworkChange`] whenever the peripherals visible on its network
//! change.
//!
//! ```
//! use std::collections::BTreeMap;
//! use cubicle_wired::{Position, WiredElement, WiredGraph, WiredNetworkChange};
//!
//! #[derive(Default)]
//! struct Cable {
//!     seen: BTreeMap<String, u32>,
//! }
//!
//! impl WiredElement for Cable {
//!     type Peripheral = u32;
//!     type Payload = String;
//!
//!     fn level(&self) -> &str {
//!         "overworld"
//!     }
//!
//!     fn position(&self) -> Position {
//!         Position::default()
//!     }
//!
//!     fn network_changed(&mut self, change: &WiredNetworkChange<u32>) {
//!         change.apply(&mut self.seen);
//!     }
//! }
//!
//! let mut graph = WiredGraph::new();
//! let a = graph.add_node(Cable::default());
//! let b = graph.add_node(Cable::default());
//! graph.update_peripherals(a, BTreeMap::from([("monitor_0".to_string(), 7)])).unwrap();
//!
//! graph.connect(a, b).unwrap();
//! assert!(graph.same_network(a, b).unwrap());
//! assert_eq!(graph.element(b).unwrap().seen.get("monitor_0"), Some(&7));
//!
//! graph.disconnect(a, b).unwrap();
//! assert!(graph.element(b).unwrap().seen.is_empty());
//! ```

mod change;
mod element;
mod error;
mod graph;
mod slotmap;

pub use change::WiredNetworkChange;
pub use element::{Packet, PacketReceiver, PacketSender, Position, WiredElement};
pub use error::{Result, WiredError};
pub use graph::{NetworkId, NodeId, PeripheralPrecedence, Peripherals, WiredGraph};
