use anyhow::{anyhow, ensure, Result};
use graphwire_types::format::{self, Segment, SegmentReader, SegmentTag};

pub fn count(buf: &[u8], tag: SegmentTag) -> Result<usize> {
    Ok(format::dump(buf)?
        .iter()
        .filter(|segm| segm.tag() == tag)
        .count())
}

/// Start position of every segment.
pub fn positions(buf: &[u8]) -> Result<Vec<(usize, SegmentTag)>> {
    let mut r = SegmentReader::new(buf);
    let mut positions = vec![];
    while r.remaining() > 0 {
        let segm = r.read_segment()?;
        positions.push((r.segm_pos(), segm.tag()));
    }
    Ok(positions)
}

/// Every Reference/Array is closed by one Pop, and a single End sits at the very end.
pub fn check_brackets(buf: &[u8]) -> Result<()> {
    let segms = format::dump(buf)?;
    let (last, body) = match segms.split_last() {
        Some(split) => split,
        None => return Err(anyhow!("empty stream")),
    };
    ensure!(*last == Segment::End, "stream ends with {last}");

    let mut depth: usize = 0;
    for (i, segm) in body.iter().enumerate() {
        match segm {
            Segment::Reference(_) | Segment::Array(_) => depth += 1,
            Segment::Pop => {
                ensure!(depth > 0, "unbalanced Pop at segment {i}");
                depth -= 1;
                ensure!(depth > 0 || i == body.len() - 1, "root closed early at segment {i}");
            }
            Segment::End => return Err(anyhow!("End at segment {i} is not last")),
            Segment::Data(_) => {
                ensure!(
                    matches!(body.get(i.wrapping_sub(1)), Some(Segment::Array(_))),
                    "Data at segment {i} does not follow an Array"
                );
            }
            Segment::Value(_) | Segment::Null(_) | Segment::Circular(_) => {
                ensure!(depth > 0, "segment {i} outside any bracket");
            }
        }
    }
    ensure!(depth == 0, "{depth} brackets left open");
    Ok(())
}
