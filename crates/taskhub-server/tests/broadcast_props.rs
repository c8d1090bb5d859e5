//! Property tests for broadcaster fan-out.

use std::collections::HashMap;
use std::sync::Arc;

use proptest::prelude::*;
use serde_json::{Value, json};
use taskhub_core::Envelope;
use taskhub_core::events::TASK_UPDATE;
use taskhub_core::ids::ConnectionId;
use taskhub_server::websocket::{Broadcaster, ClientConnection};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
enum Op {
    Attach,
    Detach(usize),
    Broadcast,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        2 => Just(Op::Attach),
        1 => (0usize..16).prop_map(Op::Detach),
        3 => Just(Op::Broadcast),
    ]
}

struct Peer {
    id: ConnectionId,
    rx: mpsc::Receiver<Arc<String>>,
    expected: Vec<u64>,
    attached: bool,
}

proptest! {
    #[test]
    fn attached_connections_see_each_broadcast_once_in_order(ops in prop::collection::vec(op(), 1..60)) {
        let bm = Broadcaster::default();
        let mut peers: Vec<Peer> = Vec::new();
        let mut seq = 0u64;

        for op in ops {
            match op {
                Op::Attach => {
                    let (tx, rx) = mpsc::channel(128);
                    let id = ConnectionId::from_raw(format!("c{}", peers.len()));
                    let conn = ClientConnection::new(id.clone(), tx, None, CancellationToken::new());
                    bm.attach(Arc::new(conn)).unwrap();
                    peers.push(Peer { id, rx, expected: Vec::new(), attached: true });
                }
                Op::Detach(i) => {
                    if let Some(peer) = peers.get_mut(i) {
                        let _ = bm.detach(&peer.id);
                        peer.attached = false;
                    }
                }
                Op::Broadcast => {
                    seq += 1;
                    let report = bm.broadcast(&Envelope::new(TASK_UPDATE, json!({ "seq": seq })));
                    let live = peers.iter().filter(|p| p.attached).count();
                    prop_assert_eq!(report.recipients, live);
                    prop_assert_eq!(report.delivered, live);
                    for peer in peers.iter_mut().filter(|p| p.attached) {
                        peer.expected.push(seq);
                    }
                }
            }
        }

        let mut seen: HashMap<String, Vec<u64>> = HashMap::new();
        for peer in &mut peers {
            let got = seen.entry(peer.id.to_string()).or_default();
            while let Ok(frame) = peer.rx.try_recv() {
                let value: Value = serde_json::from_str(&frame).unwrap();
                got.push(value["data"]["seq"].as_u64().unwrap());
            }
            prop_assert_eq!(got, &peer.expected);
        }
        prop_assert_eq!(bm.connection_count(), peers.iter().filter(|p| p.attached).count());
    }
}
