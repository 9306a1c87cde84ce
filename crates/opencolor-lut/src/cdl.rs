//! ASC CDL XML files: `.cc` (single correction) and `.ccc` (collection).
//!
//! ```xml
//! <ColorCorrection id="shot_010">
//!   <SOPNode>
//!     <Slope>1.2 1.3 1.4</Slope>
//!     <Offset>0 0 0</Offset>
//!     <Power>1 1 1</Power>
//!   </SOPNode>
//!   <SatNode>
//!     <Saturation>1.0</Saturation>
//!   </SatNode>
//! </ColorCorrection>
//! ```
//!
//! A collection wraps multiple corrections; they are addressed by their
//! `id` attribute, with a 0-based index accepted as a fallback.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::{parse_float, LutError, LutResult};

/// One ASC color correction.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorCorrection {
    /// Correction id.
    pub id: String,
    /// Description strings.
    pub descriptions: Vec<String>,
    /// Slope per channel.
    pub slope: [f32; 3],
    /// Offset per channel.
    pub offset: [f32; 3],
    /// Power per channel.
    pub power: [f32; 3],
    /// Saturation.
    pub saturation: f32,
}

impl Default for ColorCorrection {
    fn default() -> Self {
        Self {
            id: String::new(),
            descriptions: Vec::new(),
            slope: [1.0; 3],
            offset: [0.0; 3],
            power: [1.0; 3],
            saturation: 1.0,
        }
    }
}

/// A `.ccc` collection of corrections.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColorCorrectionCollection {
    /// Corrections in file order.
    pub corrections: Vec<ColorCorrection>,
}

impl ColorCorrectionCollection {
    /// Looks up a correction by `cccId`: first by id attribute, then as a
    /// 0-based index.
    pub fn find(&self, ccc_id: &str) -> Option<&ColorCorrection> {
        if let Some(cc) = self.corrections.iter().find(|cc| cc.id == ccc_id) {
            return Some(cc);
        }
        ccc_id
            .parse::<usize>()
            .ok()
            .and_then(|i| self.corrections.get(i))
    }
}

/// Reads a `.cc` file (exactly one correction).
pub fn read_cc(path: &Path) -> LutResult<ColorCorrection> {
    let file = File::open(path)?;
    let collection = parse_cdl_xml(BufReader::new(file))?;
    collection
        .corrections
        .into_iter()
        .next()
        .ok_or_else(|| LutError::Parse("no ColorCorrection element found".into()))
}

/// Reads a `.ccc` collection.
pub fn read_ccc(path: &Path) -> LutResult<ColorCorrectionCollection> {
    let file = File::open(path)?;
    parse_cdl_xml(BufReader::new(file))
}

/// Parses `.cc` / `.ccc` XML from a reader.
pub fn parse_cdl_xml<R: BufRead>(reader: R) -> LutResult<ColorCorrectionCollection> {
    let mut xml = Reader::from_reader(reader);
    xml.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut collection = ColorCorrectionCollection::default();
    let mut current: Option<ColorCorrection> = None;
    let mut text = String::new();

    loop {
        match xml.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                if e.name().as_ref() == b"ColorCorrection" {
                    let mut cc = ColorCorrection::default();
                    for attr in e.attributes().flatten() {
                        if attr.key.as_ref() == b"id" {
                            cc.id = String::from_utf8_lossy(&attr.value).into();
                        }
                    }
                    current = Some(cc);
                }
                text.clear();
            }
            Ok(Event::Text(ref e)) => {
                text = e
                    .decode()
                    .map_err(|err| LutError::Parse(err.to_string()))?
                    .into_owned();
            }
            Ok(Event::End(ref e)) => {
                let Some(cc) = current.as_mut() else {
                    buf.clear();
                    continue;
                };
                match e.name().as_ref() {
                    b"Slope" => cc.slope = parse_triplet(&text)?,
                    b"Offset" => cc.offset = parse_triplet(&text)?,
                    b"Power" => cc.power = parse_triplet(&text)?,
                    b"Saturation" => cc.saturation = parse_float(text.trim(), 0)?,
                    b"Description" => cc.descriptions.push(text.clone()),
                    b"ColorCorrection" => {
                        if let Some(done) = current.take() {
                            collection.corrections.push(done);
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(LutError::Parse(e.to_string())),
            _ => {}
        }
        buf.clear();
    }

    if collection.corrections.is_empty() {
        return Err(LutError::Parse("no ColorCorrection element found".into()));
    }
    Ok(collection)
}

fn parse_triplet(text: &str) -> LutResult<[f32; 3]> {
    let fields: Vec<&str> = text.split_whitespace().collect();
    if fields.len() != 3 {
        return Err(LutError::Parse(format!(
            "expected 3 values, got {:?}",
            text
        )));
    }
    Ok([
        parse_float(fields[0], 0)?,
        parse_float(fields[1], 0)?,
        parse_float(fields[2], 0)?,
    ])
}

/// Writes a single correction as a `.cc` file.
pub fn write_cc(path: &Path, cc: &ColorCorrection) -> LutResult<()> {
    let file = File::create(path)?;
    write_cc_to(BufWriter::new(file), cc)
}

/// Writes `.cc` content to any writer.
pub fn write_cc_to<W: Write>(mut w: W, cc: &ColorCorrection) -> LutResult<()> {
    writeln!(w, "<ColorCorrection id=\"{}\">", cc.id)?;
    write_sop(&mut w, cc, "  ")?;
    writeln!(w, "</ColorCorrection>")?;
    Ok(())
}

/// Writes a collection as a `.ccc` file.
pub fn write_ccc(path: &Path, collection: &ColorCorrectionCollection) -> LutResult<()> {
    let file = File::create(path)?;
    let mut w = BufWriter::new(file);
    writeln!(w, "<ColorCorrectionCollection>")?;
    for cc in &collection.corrections {
        writeln!(w, "  <ColorCorrection id=\"{}\">", cc.id)?;
        write_sop(&mut w, cc, "    ")?;
        writeln!(w, "  </ColorCorrection>")?;
    }
    writeln!(w, "</ColorCorrectionCollection>")?;
    Ok(())
}

fn write_sop<W: Write>(w: &mut W, cc: &ColorCorrection, indent: &str) -> LutResult<()> {
    writeln!(w, "{indent}<SOPNode>")?;
    writeln!(
        w,
        "{indent}  <Slope>{:.7} {:.7} {:.7}</Slope>",
        cc.slope[0], cc.slope[1], cc.slope[2]
    )?;
    writeln!(
        w,
        "{indent}  <Offset>{:.7} {:.7} {:.7}</Offset>",
        cc.offset[0], cc.offset[1], cc.offset[2]
    )?;
    writeln!(
        w,
        "{indent}  <Power>{:.7} {:.7} {:.7}</Power>",
        cc.power[0], cc.power[1], cc.power[2]
    )?;
    writeln!(w, "{indent}</SOPNode>")?;
    writeln!(w, "{indent}<SatNode>")?;
    writeln!(
        w,
        "{indent}  <Saturation>{:.7}</Saturation>",
        cc.saturation
    )?;
    writeln!(w, "{indent}</SatNode>")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const CC: &str = r#"<ColorCorrection id="shot_010">
  <SOPNode>
    <Description>warm grade</Description>
    <Slope>1.2 1.3 1.4</Slope>
    <Offset>0.0 0.0 0.0</Offset>
    <Power>1.0 1.0 1.0</Power>
  </SOPNode>
  <SatNode>
    <Saturation>0.9</Saturation>
  </SatNode>
</ColorCorrection>"#;

    #[test]
    fn parse_single_cc() {
        let collection = parse_cdl_xml(Cursor::new(CC)).unwrap();
        let cc = &collection.corrections[0];
        assert_eq!(cc.id, "shot_010");
        assert_eq!(cc.slope, [1.2, 1.3, 1.4]);
        assert_eq!(cc.saturation, 0.9);
        assert_eq!(cc.descriptions, vec!["warm grade".to_string()]);
    }

    #[test]
    fn collection_lookup_by_id_and_index() {
        let ccc = format!(
            "<ColorCorrectionCollection>{}{}</ColorCorrectionCollection>",
            CC,
            CC.replace("shot_010", "shot_020")
        );
        let collection = parse_cdl_xml(Cursor::new(ccc)).unwrap();
        assert_eq!(collection.corrections.len(), 2);
        assert_eq!(collection.find("shot_020").unwrap().id, "shot_020");
        assert_eq!(collection.find("0").unwrap().id, "shot_010");
        assert!(collection.find("missing").is_none());
    }

    #[test]
    fn malformed_slope_rejected() {
        let bad = CC.replace("1.2 1.3 1.4", "1.2 oops 1.4");
        assert!(parse_cdl_xml(Cursor::new(bad)).is_err());
    }

    #[test]
    fn write_and_re_read() {
        let collection = parse_cdl_xml(Cursor::new(CC)).unwrap();
        let mut out = Vec::new();
        write_cc_to(&mut out, &collection.corrections[0]).unwrap();
        let again = parse_cdl_xml(Cursor::new(out)).unwrap();
        assert_eq!(again.corrections[0].slope, [1.2, 1.3, 1.4]);
    }
}
