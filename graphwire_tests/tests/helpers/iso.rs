use anyhow::{anyhow, ensure, Result};
use graphwire_types::runtime::*;
use std::collections::HashMap;

/// Compares the graphs reachable from `a` and from `b`: classes, values, opaque bodies, and which slots share an object.
/// Returns the number of distinct objects in either graph.
pub fn assert_isomorphic(ha: &Heap, a: Addr, hb: &Heap, b: Addr) -> Result<usize> {
    let mut fwd: HashMap<Addr, Addr> = HashMap::new();
    let mut bwd: HashMap<Addr, Addr> = HashMap::new();
    let mut pending = vec![(a, b)];

    while let Some((a, b)) = pending.pop() {
        match (fwd.get(&a), bwd.get(&b)) {
            (Some(fa), Some(fb)) if *fa == b && *fb == a => continue,
            (None, None) => {}
            _ => return Err(anyhow!("Sharing differs at {a} vs {b}")),
        }
        fwd.insert(a, b);
        bwd.insert(b, a);

        match (ha.shape_of(a)?, hb.shape_of(b)?) {
            (Shape::Object(ca), Shape::Object(cb)) => {
                ensure!(ca == cb, "{a} is {ca} but {b} is {cb}");
                ensure!(ha.size_of(a)? == hb.size_of(b)?);
                let fields_a = ha.registry().visit_fields(ha, ca, a, &[])?;
                let fields_b = hb.registry().visit_fields(hb, cb, b, &[])?;
                ensure!(fields_a.len() == fields_b.len());
                for ((off_a, va), (off_b, vb)) in fields_a.into_iter().zip(fields_b) {
                    ensure!(off_a == off_b);
                    pair(va, vb, &mut pending)?;
                }
            }
            (Shape::Array(va), Shape::Array(vb)) => {
                ensure!(
                    (va.class_id, va.is_static, va.elem, va.length)
                        == (vb.class_id, vb.is_static, vb.elem, vb.length),
                    "{va:?} vs {vb:?}"
                );
                for i in 0..va.length {
                    pair(ha.array_get(a, i)?, hb.array_get(b, i)?, &mut pending)?;
                }
            }
            (Shape::Opaque(ca), Shape::Opaque(cb)) => {
                ensure!(ca == cb, "{a} is {ca} but {b} is {cb}");
                let size = ha.size_of(a)?;
                ensure!(size == hb.size_of(b)?);
                ensure!(
                    ha.load(a, 0, size)? == hb.load(b, 0, size)?,
                    "Bodies of {a} and {b} differ"
                );
            }
            (sa, sb) => return Err(anyhow!("{a} is {sa:?} but {b} is {sb:?}")),
        }
    }
    Ok(fwd.len())
}

fn pair(va: FieldValue, vb: FieldValue, pending: &mut Vec<(Addr, Addr)>) -> Result<()> {
    match (va, vb) {
        (FieldValue::Ref(a), FieldValue::Ref(b)) => pending.push((a, b)),
        (va, vb) => ensure!(va == vb, "{va:?} != {vb:?}"),
    }
    Ok(())
}
