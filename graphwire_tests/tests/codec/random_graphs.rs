use crate::helpers::classes::{self, Classes};
use crate::helpers::{init_tracing, iso, stream};
use anyhow::Result;
use graphwire_codec::{decode, encode};
use graphwire_types::format::SegmentTag;
use graphwire_types::runtime::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn pick_node(rng: &mut StdRng, nodes: &[Addr]) -> FieldValue {
    if rng.gen_bool(0.25) {
        FieldValue::Null
    } else {
        FieldValue::from(nodes[rng.gen_range(0..nodes.len())])
    }
}

/// Nodes with random links, random numeric arrays (some shared), and random child lists.
fn random_graph(heap: &mut Heap, cl: &Classes, rng: &mut StdRng, node_count: usize) -> Result<Addr> {
    let nodes = (0..node_count)
        .map(|_| heap.new_object(cl.node))
        .collect::<Result<Vec<_>>>()?;

    let shared_list = heap.new_array(cl.i16_list, rng.gen_range(0..5))?;
    for i in 0..heap.array_len(shared_list)? {
        heap.array_set(shared_list, i, Num::i16(rng.gen()))?;
    }

    for (i, node) in nodes.iter().copied().enumerate() {
        heap.set_field(node, "id", Num::i32(i as i32))?;
        heap.set_field(node, "weight", Num::f64(rng.gen_range(-1e6..1e6)))?;
        heap.set_field(node, "flag", Num::u8(rng.gen()))?;
        heap.set_field(node, "next", pick_node(rng, &nodes))?;
        heap.set_field(node, "other", pick_node(rng, &nodes))?;

        match rng.gen_range(0..3) {
            0 => {}
            1 => heap.set_field(node, "nums", shared_list)?,
            _ => {
                let len = rng.gen_range(0..6);
                let arr = heap.new_static_array(cl.f64_array, len)?;
                for j in 0..len {
                    heap.array_set(arr, j, Num::f64(rng.gen()))?;
                }
                heap.set_field(node, "nums", arr)?;
            }
        }

        if rng.gen_bool(0.4) {
            let len = rng.gen_range(0..4);
            let kids = heap.new_array(cl.node_list, len)?;
            for j in 0..len {
                heap.array_set(kids, j, pick_node(rng, &nodes))?;
            }
            heap.set_field(node, "kids", kids)?;
        }
    }
    Ok(nodes[0])
}

#[test]
fn random_graphs_round_trip() -> Result<()> {
    init_tracing();

    for seed in 0..40u64 {
        let (mut src, mut dst, cl) = classes::heaps()?;
        let mut rng = StdRng::seed_from_u64(seed);
        let node_count = rng.gen_range(1..30);
        let root = random_graph(&mut src, &cl, &mut rng, node_count)?;

        let buf = encode(&src, root)?;
        stream::check_brackets(&buf)?;

        let decoded = decode(&buf, &mut dst)?;
        let reachable = iso::assert_isomorphic(&src, root, &dst, decoded)?;

        let defined = stream::count(&buf, SegmentTag::Reference)? + stream::count(&buf, SegmentTag::Array)?;
        assert_eq!(defined, reachable, "seed {seed}");

        assert_eq!(dst.pinned_count(), 0);
        assert_eq!(dst.collect(&[decoded]), 0, "seed {seed}");
        assert_eq!(encode(&dst, decoded)?, buf, "seed {seed}");
    }
    Ok(())
}

#[test]
fn one_decoder_heap_holds_many_graphs() -> Result<()> {
    let (mut src, mut dst, cl) = classes::heaps()?;
    let mut rng = StdRng::seed_from_u64(7);

    let mut pairs = vec![];
    for _ in 0..5 {
        let root = random_graph(&mut src, &cl, &mut rng, 12)?;
        let buf = encode(&src, root)?;
        pairs.push((root, decode(&buf, &mut dst)?));
    }

    let roots = pairs.iter().map(|(_, decoded)| *decoded).collect::<Vec<_>>();
    dst.collect(&roots);
    for (root, decoded) in pairs {
        iso::assert_isomorphic(&src, root, &dst, decoded)?;
    }
    Ok(())
}
