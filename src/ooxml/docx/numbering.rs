/// Numbering (list) definitions.
///
/// [`NumberingStore`] owns the parsed `numbering.xml` of a package. It builds
/// new multi-level abstract definitions, binds numbering instances to them
/// and finds structurally equivalent definitions when content is imported
/// from another document.
use crate::common::unit::cm_to_twip;
use crate::common::xml::{XmlDocument, XmlElement, XmlNode};
use crate::ooxml::docx::template;
use crate::ooxml::error::{OoxmlError, Result};
use crate::ooxml::opc::PackURI;
use std::borrow::Cow;
use std::fmt;

/// Maximum number of levels in one abstract definition (`w:ilvl` 0..=8).
pub const MAX_LEVELS: usize = 9;

/// Left indent added per level, 0.74 cm.
pub fn level_indent_twips() -> i64 {
    cm_to_twip(0.74)
}

/// `ST_NumberFormat` values.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NumberFormat {
    Decimal,
    DecimalZero,
    Bullet,
    LowerLetter,
    UpperLetter,
    LowerRoman,
    UpperRoman,
    Ordinal,
    CardinalText,
    OrdinalText,
    ChineseCounting,
    ChineseCountingThousand,
    IdeographTraditional,
    None,
    Other(String),
}

impl NumberFormat {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Decimal => "decimal",
            Self::DecimalZero => "decimalZero",
            Self::Bullet => "bullet",
            Self::LowerLetter => "lowerLetter",
            Self::UpperLetter => "upperLetter",
            Self::LowerRoman => "lowerRoman",
            Self::UpperRoman => "upperRoman",
            Self::Ordinal => "ordinal",
            Self::CardinalText => "cardinalText",
            Self::OrdinalText => "ordinalText",
            Self::ChineseCounting => "chineseCounting",
            Self::ChineseCountingThousand => "chineseCountingThousand",
            Self::IdeographTraditional => "ideographTraditional",
            Self::None => "none",
            Self::Other(s) => s,
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "decimal" => Self::Decimal,
            "decimalZero" => Self::DecimalZero,
            "bullet" => Self::Bullet,
            "lowerLetter" => Self::LowerLetter,
            "upperLetter" => Self::UpperLetter,
            "lowerRoman" => Self::LowerRoman,
            "upperRoman" => Self::UpperRoman,
            "ordinal" => Self::Ordinal,
            "cardinalText" => Self::CardinalText,
            "ordinalText" => Self::OrdinalText,
            "chineseCounting" => Self::ChineseCounting,
            "chineseCountingThousand" => Self::ChineseCountingThousand,
            "ideographTraditional" => Self::IdeographTraditional,
            "none" => Self::None,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for NumberFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One list level: the number format and its level text pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NumberingFormat {
    format: NumberFormat,
    level_text: Cow<'static, str>,
}

impl NumberingFormat {
    /// `1. 2. 3.`
    pub const DECIMAL: NumberingFormat = NumberingFormat::preset(NumberFormat::Decimal, "%1.");
    /// `1) 2) 3)`
    pub const DECIMAL_PARENTHESES: NumberingFormat =
        NumberingFormat::preset(NumberFormat::Decimal, "%1)");
    pub const BULLET: NumberingFormat = NumberingFormat::preset(NumberFormat::Bullet, "●");
    /// `a. b. c.`
    pub const LOWER_LETTER: NumberingFormat =
        NumberingFormat::preset(NumberFormat::LowerLetter, "%1.");
    /// `i. ii. iii.`
    pub const LOWER_ROMAN: NumberingFormat =
        NumberingFormat::preset(NumberFormat::LowerRoman, "%1.");
    /// `A. B. C.`
    pub const UPPER_LETTER: NumberingFormat =
        NumberingFormat::preset(NumberFormat::UpperLetter, "%1.");
    /// `I. II. III.`
    pub const UPPER_ROMAN: NumberingFormat =
        NumberingFormat::preset(NumberFormat::UpperRoman, "%1.");

    const fn preset(format: NumberFormat, level_text: &'static str) -> Self {
        Self {
            format,
            level_text: Cow::Borrowed(level_text),
        }
    }

    /// A custom level, e.g. `NumberingFormat::new(NumberFormat::Decimal, "(%1)")`.
    pub fn new(format: NumberFormat, level_text: impl Into<String>) -> Self {
        Self {
            format,
            level_text: Cow::Owned(level_text.into()),
        }
    }

    #[inline]
    pub fn format(&self) -> &NumberFormat {
        &self.format
    }

    #[inline]
    pub fn level_text(&self) -> &str {
        &self.level_text
    }
}

/// Ids produced by [`NumberingStore::allocate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NumberingAllocation {
    /// The `w:numId` paragraphs reference
    pub num_id: u32,
    pub abstract_num_id: u32,
}

/// Read-only view of one level of an abstract definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelInfo {
    pub ilvl: u32,
    pub start: Option<u32>,
    pub format: Option<NumberFormat>,
    pub level_text: Option<String>,
    pub justification: Option<String>,
    pub indent_left: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct NumberingStore {
    partname: PackURI,
    xml: XmlDocument,
    dirty: bool,
}

impl NumberingStore {
    pub fn from_document(partname: PackURI, xml: XmlDocument) -> Self {
        Self {
            partname,
            xml,
            dirty: false,
        }
    }

    /// A store for a numbering part that does not exist yet.
    pub fn empty(partname: PackURI) -> Result<Self> {
        let xml = XmlDocument::parse(template::EMPTY_NUMBERING_XML.as_bytes())?;
        Ok(Self {
            partname,
            xml,
            dirty: true,
        })
    }

    #[inline]
    pub fn partname(&self) -> &PackURI {
        &self.partname
    }

    #[inline]
    pub fn xml(&self) -> &XmlDocument {
        &self.xml
    }

    /// Whether the store changed since it was loaded or last committed.
    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    #[inline]
    pub(crate) fn mark_clean(&mut self) {
        self.dirty = false;
    }

    /// `w:abstractNumId` of every abstract definition, in document order.
    pub fn abstract_num_ids(&self) -> Vec<u32> {
        self.xml
            .root()
            .elements_named("abstractNum")
            .filter_map(|e| e.attr_u32("abstractNumId"))
            .collect()
    }

    /// `w:numId` of every numbering instance, in document order.
    pub fn num_ids(&self) -> Vec<u32> {
        self.xml
            .root()
            .elements_named("num")
            .filter_map(|e| e.attr_u32("numId"))
            .collect()
    }

    /// Max existing abstract id plus one, or zero.
    pub fn next_abstract_num_id(&self) -> u32 {
        self.abstract_num_ids()
            .into_iter()
            .max()
            .map_or(0, |max| max + 1)
    }

    /// Max existing instance id plus one; instance ids start at 1.
    pub fn next_num_id(&self) -> u32 {
        self.num_ids().into_iter().max().map_or(1, |max| max + 1)
    }

    pub fn abstract_num(&self, abstract_num_id: u32) -> Option<&XmlElement> {
        self.xml
            .root()
            .elements_named("abstractNum")
            .find(|e| e.attr_u32("abstractNumId") == Some(abstract_num_id))
    }

    /// Abstract definition an instance is bound to.
    pub fn abstract_num_id_of(&self, num_id: u32) -> Option<u32> {
        self.xml
            .root()
            .elements_named("num")
            .find(|e| e.attr_u32("numId") == Some(num_id))
            .and_then(|num| num.child("abstractNumId"))
            .and_then(|e| e.attr_u32("val"))
    }

    /// Levels of an abstract definition, in document order.
    pub fn levels(&self, abstract_num_id: u32) -> Vec<LevelInfo> {
        let Some(abstract_num) = self.abstract_num(abstract_num_id) else {
            return Vec::new();
        };
        abstract_num
            .elements_named("lvl")
            .map(|lvl| LevelInfo {
                ilvl: lvl.attr_u32("ilvl").unwrap_or(0),
                start: lvl.child("start").and_then(|e| e.attr_u32("val")),
                format: lvl
                    .child("numFmt")
                    .and_then(|e| e.attr_local("val"))
                    .map(|v| NumberFormat::parse(&v)),
                level_text: lvl
                    .child("lvlText")
                    .and_then(|e| e.attr_local("val"))
                    .map(|v| v.into_owned()),
                justification: lvl
                    .child("lvlJc")
                    .and_then(|e| e.attr_local("val"))
                    .map(|v| v.into_owned()),
                indent_left: lvl
                    .child("pPr")
                    .and_then(|p| p.child("ind"))
                    .and_then(|ind| ind.attr_local("left").or_else(|| ind.attr_local("start")))
                    .and_then(|v| v.trim().parse::<i64>().ok()),
            })
            .collect()
    }

    /// Build a new abstract definition from `levels` and bind a new
    /// numbering instance to it.
    ///
    /// Level `i` gets `w:ilvl="i"`, starts at 1 and is indented by `i`
    /// times the level indent. Bullet levels are left justified.
    pub fn allocate(&mut self, levels: &[NumberingFormat]) -> Result<NumberingAllocation> {
        if levels.is_empty() || levels.len() > MAX_LEVELS {
            return Err(OoxmlError::InvalidFormat(format!(
                "a numbering definition needs 1 to {} levels, got {}",
                MAX_LEVELS,
                levels.len()
            )));
        }

        let abstract_num_id = self.next_abstract_num_id();
        let mut abstract_num = XmlElement::new("w:abstractNum")
            .with_attr("w:abstractNumId", &abstract_num_id.to_string());
        for (i, level) in levels.iter().enumerate() {
            abstract_num.push(build_level(i as u32, level));
        }
        self.insert_abstract_num(abstract_num);

        let num_id = self.add_num(abstract_num_id);
        Ok(NumberingAllocation {
            num_id,
            abstract_num_id,
        })
    }

    /// Create a numbering instance bound to an existing abstract definition.
    pub fn add_num(&mut self, abstract_num_id: u32) -> u32 {
        let num_id = self.next_num_id();
        let num = XmlElement::new("w:num")
            .with_attr("w:numId", &num_id.to_string())
            .with_child(
                XmlElement::new("w:abstractNumId").with_attr("w:val", &abstract_num_id.to_string()),
            );

        let root = self.xml.root_mut();
        let index = last_index_of(root, "num")
            .map(|i| i + 1)
            .or_else(|| root.position("numIdMacAtCleanup"))
            .unwrap_or(root.children().len());
        root.insert(index, num);
        self.dirty = true;
        num_id
    }

    /// Copy a foreign abstract definition under a fresh id and return it.
    pub fn import_abstract_num(&mut self, foreign: &XmlElement) -> u32 {
        let abstract_num_id = self.next_abstract_num_id();
        let mut copy = foreign.clone();
        copy.set_attr("w:abstractNumId", &abstract_num_id.to_string());
        // Linked style definitions are not imported
        copy.children_mut().retain(|n| {
            !matches!(n, XmlNode::Element(e) if e.is("numStyleLink") || e.is("styleLink"))
        });
        self.insert_abstract_num(copy);
        abstract_num_id
    }

    /// Abstract definition structurally equal to `foreign`, ignoring ids,
    /// `w:nsid` and `w:tmpl`.
    pub fn find_equivalent(&self, foreign: &XmlElement) -> Option<u32> {
        let wanted = structural_key(foreign);
        self.xml
            .root()
            .elements_named("abstractNum")
            .find(|e| structural_key(e) == wanted)
            .and_then(|e| e.attr_u32("abstractNumId"))
    }

    fn insert_abstract_num(&mut self, abstract_num: XmlElement) {
        let root = self.xml.root_mut();
        let index = last_index_of(root, "abstractNum")
            .map(|i| i + 1)
            .or_else(|| root.position("num"))
            .or_else(|| root.position("numIdMacAtCleanup"))
            .unwrap_or(root.children().len());
        root.insert(index, abstract_num);
        self.dirty = true;
    }
}

fn build_level(ilvl: u32, level: &NumberingFormat) -> XmlElement {
    let mut lvl = XmlElement::new("w:lvl")
        .with_attr("w:ilvl", &ilvl.to_string())
        .with_child(XmlElement::new("w:start").with_attr("w:val", "1"))
        .with_child(XmlElement::new("w:numFmt").with_attr("w:val", level.format().as_str()))
        .with_child(XmlElement::new("w:lvlText").with_attr("w:val", level.level_text()));
    if *level.format() == NumberFormat::Bullet {
        lvl.push(XmlElement::new("w:lvlJc").with_attr("w:val", "left"));
    }
    let indent = level_indent_twips() * ilvl as i64;
    lvl.with_child(
        XmlElement::new("w:pPr")
            .with_child(XmlElement::new("w:ind").with_attr("w:left", &indent.to_string())),
    )
}

fn last_index_of(root: &XmlElement, local: &str) -> Option<usize> {
    root.indexed_elements()
        .filter(|(_, e)| e.is(local))
        .map(|(i, _)| i)
        .last()
}

/// Serialized form of an abstract definition without its identity.
fn structural_key(abstract_num: &XmlElement) -> String {
    let mut copy = abstract_num.clone();
    copy.remove_attr("w:abstractNumId");
    copy.remove_attr("w15:restartNumberingAfterBreak");
    copy.children_mut().retain(|n| match n {
        XmlNode::Element(e) => !(e.is("nsid") || e.is("tmpl")),
        XmlNode::Text(t) => !t.trim().is_empty(),
        _ => false,
    });
    copy.to_xml()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn empty_store() -> NumberingStore {
        NumberingStore::empty(PackURI::new("/word/numbering.xml").unwrap()).unwrap()
    }

    #[test]
    fn test_allocate_on_empty_store() {
        let mut store = empty_store();
        let allocation = store
            .allocate(&[NumberingFormat::DECIMAL, NumberingFormat::LOWER_LETTER])
            .unwrap();
        assert_eq!(allocation.num_id, 1);
        assert_eq!(allocation.abstract_num_id, 0);
        assert_eq!(store.abstract_num_id_of(1), Some(0));

        let levels = store.levels(0);
        assert_eq!(levels.len(), 2);
        assert_eq!(levels[0].indent_left, Some(0));
        assert_eq!(levels[1].indent_left, Some(level_indent_twips()));
        assert_eq!(levels[1].format, Some(NumberFormat::LowerLetter));
        assert_eq!(levels[0].level_text.as_deref(), Some("%1."));
        assert_eq!(levels[0].start, Some(1));
        assert_eq!(levels[0].justification, None);
    }

    #[test]
    fn test_bullet_is_left_justified() {
        let mut store = empty_store();
        let allocation = store.allocate(&[NumberingFormat::BULLET]).unwrap();
        let levels = store.levels(allocation.abstract_num_id);
        assert_eq!(levels[0].justification.as_deref(), Some("left"));
        assert_eq!(levels[0].level_text.as_deref(), Some("●"));
    }

    #[test]
    fn test_level_count_limits() {
        let mut store = empty_store();
        assert!(store.allocate(&[]).is_err());
        let ten = vec![NumberingFormat::DECIMAL; MAX_LEVELS + 1];
        assert!(store.allocate(&ten).is_err());
        assert!(store.allocate(&ten[..MAX_LEVELS]).is_ok());
    }

    #[test]
    fn test_insertion_keeps_schema_order() {
        let xml = r#"<w:numbering xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:abstractNum w:abstractNumId="4"><w:nsid w:val="1A2B3C4D"/><w:lvl w:ilvl="0"><w:numFmt w:val="decimal"/></w:lvl></w:abstractNum><w:num w:numId="7"><w:abstractNumId w:val="4"/></w:num></w:numbering>"#;
        let mut store = NumberingStore::from_document(
            PackURI::new("/word/numbering.xml").unwrap(),
            XmlDocument::parse(xml.as_bytes()).unwrap(),
        );
        let allocation = store.allocate(&[NumberingFormat::UPPER_ROMAN]).unwrap();
        assert_eq!(allocation, NumberingAllocation { num_id: 8, abstract_num_id: 5 });

        let order: Vec<&str> = store.xml().root().elements().map(|e| e.local_name()).collect();
        assert_eq!(order, ["abstractNum", "abstractNum", "num", "num"]);
        assert!(store.is_dirty());
    }

    #[test]
    fn test_equivalence_ignores_identity() {
        let mut store = empty_store();
        let allocation = store.allocate(&[NumberingFormat::DECIMAL]).unwrap();
        let mut foreign = store.abstract_num(allocation.abstract_num_id).unwrap().clone();
        foreign.set_attr("w:abstractNumId", "42");
        foreign.insert(0, XmlElement::new("w:nsid").with_attr("w:val", "DEADBEEF"));
        assert_eq!(store.find_equivalent(&foreign), Some(allocation.abstract_num_id));

        foreign.push(XmlElement::new("w:lvl").with_attr("w:ilvl", "1"));
        assert_eq!(store.find_equivalent(&foreign), None);
        let imported = store.import_abstract_num(&foreign);
        assert_eq!(imported, allocation.abstract_num_id + 1);
        assert_eq!(store.find_equivalent(&foreign), Some(imported));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_allocations_are_monotonic(sizes in prop::collection::vec(1usize..=MAX_LEVELS, 1..12)) {
            let mut store = empty_store();
            let mut seen = std::collections::HashSet::new();
            let mut expected_abstract = 0;
            for size in sizes {
                let levels = vec![NumberingFormat::LOWER_ROMAN; size];
                let allocation = store.allocate(&levels).unwrap();
                prop_assert!(seen.insert(allocation.num_id));
                prop_assert_eq!(allocation.abstract_num_id, expected_abstract);
                expected_abstract += 1;
            }
        }
    }
}
