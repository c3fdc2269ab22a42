#![allow(dead_code)]

use std::convert::Infallible;

use gpa::testing::BoxedGpa;
use gpa::{KeyPair, NodeId, PublicKey};
use gpa_clique::{CliqueInput, CliqueMessage};

pub type Node = BoxedGpa<CliqueInput, CliqueMessage, Infallible>;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("warn")
        .with_test_writer()
        .try_init();
}

pub struct Peer {
    pub key: KeyPair,
    pub pub_key: PublicKey,
    pub id: NodeId,
}

pub fn peers(n: u8) -> Vec<Peer> {
    (0..n)
        .map(|i| {
            let key = KeyPair::from_seed(&[i + 1; 32]);
            let pub_key = key.public_key();
            Peer {
                id: NodeId::from_public_key(&pub_key),
                key,
                pub_key,
            }
        })
        .collect()
}

pub fn pub_keys(peers: &[Peer]) -> Vec<PublicKey> {
    peers.iter().map(|p| p.pub_key).collect()
}
