use crate::helpers::classes::{self, Classes};
use crate::helpers::stream;
use anyhow::Result;
use graphwire_codec::{decode, encode, CodecErr};
use graphwire_types::format::{FormatErrKind, SegmentTag};
use graphwire_types::runtime::*;
use itertools::Itertools;

/// A graph that uses every segment kind.
fn sample(heap: &mut Heap, cl: &Classes) -> Result<Addr> {
    let root = heap.new_object(cl.node)?;
    let nums = heap.new_array(cl.i16_list, 3)?;
    let kids = heap.new_static_array(cl.node_array, 3)?;
    let kid = heap.new_object(cl.node)?;
    heap.set_field(root, "id", Num::i32(-4))?;
    heap.set_field(root, "nums", nums)?;
    heap.set_field(root, "kids", kids)?;
    heap.array_set(kids, 0, kid)?;
    heap.array_set(kids, 2, root)?;
    heap.set_field(kid, "nums", nums)?;
    Ok(root)
}

fn assert_format_err(res: Result<Addr, CodecErr>) {
    match res {
        Err(CodecErr::Format(_)) => {}
        other => panic!("expected a format error, got {other:?}"),
    }
}

fn assert_nothing_kept(heap: &mut Heap) {
    assert_eq!(heap.pinned_count(), 0);
    heap.collect(&[]);
    assert_eq!(heap.live_count(), 0);
}

#[test]
fn every_strict_prefix_is_rejected() -> Result<()> {
    let (mut src, mut dst, cl) = classes::heaps()?;
    let root = sample(&mut src, &cl)?;
    let buf = encode(&src, root)?;

    for len in 0..buf.len() {
        assert_format_err(decode(&buf[..len], &mut dst));
        assert_eq!(dst.pinned_count(), 0);
    }
    assert_nothing_kept(&mut dst);

    decode(&buf, &mut dst)?;
    Ok(())
}

#[test]
fn corrupt_tags_are_rejected() -> Result<()> {
    let (mut src, mut dst, cl) = classes::heaps()?;
    let root = sample(&mut src, &cl)?;
    let buf = encode(&src, root)?;

    for (pos, _) in stream::positions(&buf)? {
        let mut bad = buf.clone();
        bad[pos] = 0xEE;
        match decode(&bad, &mut dst) {
            Err(CodecErr::Format(e)) => {
                assert_eq!(e.kind, FormatErrKind::UnknownTag(0xEE));
                assert_eq!(e.pos, pos);
            }
            other => panic!("{other:?}"),
        }
    }
    assert_nothing_kept(&mut dst);
    Ok(())
}

#[test]
fn deleted_pops_are_rejected() -> Result<()> {
    let (mut src, mut dst, cl) = classes::heaps()?;
    let root = sample(&mut src, &cl)?;
    let buf = encode(&src, root)?;

    let pops = stream::positions(&buf)?
        .into_iter()
        .filter(|(_, tag)| *tag == SegmentTag::Pop)
        .collect_vec();
    assert_eq!(pops.len(), 4);

    for (pos, _) in pops {
        let mut bad = buf.clone();
        bad.remove(pos);
        assert_format_err(decode(&bad, &mut dst));
    }
    assert_nothing_kept(&mut dst);
    Ok(())
}

#[test]
fn swapped_tags_are_rejected() -> Result<()> {
    let (mut src, mut dst, cl) = classes::heaps()?;
    let root = sample(&mut src, &cl)?;
    let buf = encode(&src, root)?;

    let positions = stream::positions(&buf)?;
    let (end_pos, _) = positions[positions.len() - 1];
    let (last_pop, _) = positions[positions.len() - 2];

    let mut bad = buf.clone();
    bad[last_pop] = SegmentTag::End as u8;
    assert_format_err(decode(&bad, &mut dst));

    let mut bad = buf.clone();
    bad[end_pos] = SegmentTag::Pop as u8;
    assert_format_err(decode(&bad, &mut dst));

    let mut bad = buf.clone();
    bad.extend_from_slice(&buf);
    assert_format_err(decode(&bad, &mut dst));

    assert_nothing_kept(&mut dst);
    Ok(())
}
