use crate::helpers::classes::{self, ref_field};
use crate::helpers::{init_tracing, iso, stream};
use anyhow::Result;
use graphwire_codec::{decode, decode_expecting, encode};
use graphwire_types::format::{self, Segment, SegmentTag};
use graphwire_types::runtime::*;

#[test]
fn struct_with_bytes_and_self_reference() -> Result<()> {
    init_tracing();
    let (mut src, mut dst, cl) = classes::heaps()?;

    let root = src.new_object(cl.scenario)?;
    let bytes = src.new_array(cl.byte_list, 5)?;
    for (i, b) in [1u8, 2, 3, 4, 5].into_iter().enumerate() {
        src.array_set(bytes, i as u32, Num::u8(b))?;
    }
    src.set_field(root, "a", Num::f32(64.0))?;
    src.set_field(root, "b", bytes)?;
    src.set_field(root, "c", root)?;

    let buf = encode(&src, root)?;
    let data_lens = format::dump(&buf)?
        .into_iter()
        .filter_map(|segm| match segm {
            Segment::Data(data) => Some(data.bytes.len()),
            _ => None,
        })
        .collect::<Vec<_>>();
    assert_eq!(data_lens, vec![5]);
    assert_eq!(stream::count(&buf, SegmentTag::Value)?, 1);

    let t = decode_expecting(&buf, &mut dst, cl.scenario)?;
    assert_eq!(
        dst.field(t, "a")?.as_num().and_then(|n| n.as_f32()),
        Some(64.0)
    );
    let b = ref_field(&dst, t, "b")?;
    assert_eq!(dst.array_bytes(b)?, &[1, 2, 3, 4, 5]);
    assert_eq!(dst.field(t, "c")?, FieldValue::Ref(t));

    assert_eq!(iso::assert_isomorphic(&src, root, &dst, t)?, 2);
    assert_eq!(dst.pinned_count(), 0);
    Ok(())
}

#[test]
fn null_field_is_restored_without_allocating() -> Result<()> {
    let (mut src, mut dst, cl) = classes::heaps()?;
    let holder = src.new_object(cl.holder)?;

    let buf = encode(&src, holder)?;
    assert_eq!(stream::count(&buf, SegmentTag::Null)?, 1);

    let decoded = decode(&buf, &mut dst)?;
    assert_eq!(dst.field(decoded, "maybe")?, FieldValue::Null);
    assert_eq!(dst.stats().allocations, 1);
    assert_eq!(dst.live_count(), 1);
    Ok(())
}

#[test]
fn raw_buffer_field_keeps_its_bytes() -> Result<()> {
    let (mut src, mut dst, cl) = classes::heaps()?;

    let raw = src.allocate(ClassId::ARRAY_BUFFER, 6)?;
    src.store(raw, 0, &[9, 8, 7, 6, 5, 4])?;
    let node = src.new_object(cl.node)?;
    src.set_field(node, "next", raw)?;
    src.set_field(node, "other", raw)?;

    let buf = encode(&src, node)?;
    assert_eq!(stream::count(&buf, SegmentTag::Data)?, 1);
    assert_eq!(stream::count(&buf, SegmentTag::Circular)?, 1);

    let decoded = decode_expecting(&buf, &mut dst, cl.node)?;
    let next = ref_field(&dst, decoded, "next")?;
    assert_eq!(ref_field(&dst, decoded, "other")?, next);
    assert_eq!(dst.class_id_of(next)?, ClassId::ARRAY_BUFFER);
    assert_eq!(dst.load(next, 0, 6)?, &[9, 8, 7, 6, 5, 4]);

    assert_eq!(iso::assert_isomorphic(&src, node, &dst, decoded)?, 2);
    assert_eq!(dst.pinned_count(), 0);
    Ok(())
}

#[test]
fn siblings_share_one_array() -> Result<()> {
    let (mut src, mut dst, cl) = classes::heaps()?;

    let shared = src.new_static_array(cl.f64_array, 3)?;
    src.array_set(shared, 1, Num::f64(-0.5))?;
    let siblings = src.new_object(cl.siblings)?;
    src.set_field(siblings, "left", shared)?;
    src.set_field(siblings, "right", shared)?;

    let buf = encode(&src, siblings)?;
    assert_eq!(stream::count(&buf, SegmentTag::Array)?, 1);
    assert_eq!(stream::count(&buf, SegmentTag::Circular)?, 1);

    let decoded = decode(&buf, &mut dst)?;
    let left = ref_field(&dst, decoded, "left")?;
    let right = ref_field(&dst, decoded, "right")?;
    assert_eq!(left, right);
    assert_eq!(dst.array_get(left, 1)?, FieldValue::Num(Num::f64(-0.5)));
    assert_eq!(dst.array_len(left)?, 3);
    Ok(())
}

#[test]
fn numeric_arrays_take_the_bulk_path() -> Result<()> {
    let (mut src, mut dst, cl) = classes::heaps()?;

    for n in [0u32, 1, 7, 300] {
        let list = src.new_array(cl.i16_list, n)?;
        for i in 0..n {
            src.array_set(list, i, Num::i16(i as i16 * 3 - 100))?;
        }

        let buf = encode(&src, list)?;
        let segms = format::dump(&buf)?;
        assert_eq!(segms.len(), 4);
        match segms[1] {
            Segment::Data(data) => assert_eq!(data.bytes.len(), n as usize * 2),
            other => panic!("{other}"),
        }
        assert_eq!(stream::count(&buf, SegmentTag::Value)?, 0);

        let decoded = decode(&buf, &mut dst)?;
        assert_eq!(dst.array_bytes(decoded)?, src.array_bytes(list)?);
        iso::assert_isomorphic(&src, list, &dst, decoded)?;
    }
    Ok(())
}

#[test]
fn reference_arrays_go_element_by_element() -> Result<()> {
    let (mut src, mut dst, cl) = classes::heaps()?;

    let arr = src.new_static_array(cl.node_array, 4)?;
    let a = src.new_object(cl.node)?;
    let b = src.new_object(cl.node)?;
    src.set_field(a, "id", Num::i32(1))?;
    src.set_field(b, "id", Num::i32(2))?;
    src.array_set(arr, 0, a)?;
    src.array_set(arr, 1, b)?;
    src.array_set(arr, 3, a)?;

    let buf = encode(&src, arr)?;
    stream::check_brackets(&buf)?;
    assert_eq!(stream::count(&buf, SegmentTag::Data)?, 0);

    let decoded = decode(&buf, &mut dst)?;
    assert_eq!(dst.array_get(decoded, 2)?, FieldValue::Null);
    assert_eq!(dst.array_get(decoded, 0)?, dst.array_get(decoded, 3)?);
    assert_eq!(iso::assert_isomorphic(&src, arr, &dst, decoded)?, 3);
    Ok(())
}
