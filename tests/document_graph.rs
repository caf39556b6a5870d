use rambutan::ooxml::docx::{
    Document, LoadOptions, NumberFormat, NumberingFormat, Package, PictureData, PictureFormat,
    Placement,
};
use rambutan::ooxml::opc::constants::{content_type as ct, relationship_type as rt};
use rambutan::ooxml::opc::{PackURI, Part, XmlPart};
use rambutan::OoxmlError;

const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0x0D, b'I', b'H', b'D', b'R'];

#[test]
fn test_numbering_presets_on_empty_package() {
    let mut doc = Document::new().unwrap();
    let allocation = doc
        .allocate_numbering(&[NumberingFormat::DECIMAL, NumberingFormat::LOWER_LETTER])
        .unwrap();
    assert_eq!(allocation.num_id, 1);
    assert_eq!(allocation.abstract_num_id, 0);

    let levels = doc.numbering().unwrap().levels(0);
    assert_eq!(levels.len(), 2);
    assert_eq!(levels[0].indent_left, Some(0));
    assert_eq!(levels[1].indent_left, Some(420));
    assert_eq!(levels[1].format, Some(NumberFormat::LowerLetter));

    let second = doc.allocate_numbering(&[NumberingFormat::BULLET]).unwrap();
    assert_eq!((second.num_id, second.abstract_num_id), (2, 1));
    let bullet = doc.numbering().unwrap().levels(1);
    assert_eq!(bullet[0].justification.as_deref(), Some("left"));

    let custom = NumberingFormat::new(NumberFormat::UpperRoman, "Part %1");
    let third = doc.allocate_numbering(&[custom]).unwrap();
    assert_eq!(third.num_id, 3);
}

#[test]
fn test_same_picture_is_stored_once() {
    let mut doc = Document::new().unwrap();
    let picture = PictureData::from_bytes(32, 32, PNG.to_vec()).unwrap();
    assert_eq!(picture.format(), PictureFormat::Png);

    let mut ids = Vec::new();
    for _ in 0..3 {
        let run = doc.append_run().unwrap();
        ids.push(doc.insert_picture(&run, &picture).unwrap());
    }
    assert_eq!(ids, [1, 2, 3]);
    assert_eq!(doc.media().len(), 1);

    let drawings = doc.drawings();
    assert_eq!(drawings.len(), 3);
    assert!(drawings.iter().all(|d| d.placement() == Placement::Inline));
    assert!(drawings.iter().all(|d| d.is_picture()));
}

#[test]
fn test_comments_part_is_created_once() {
    let mut doc = Document::new().unwrap();
    assert!(doc.comments().is_none());

    doc.comments_mut().unwrap();
    assert_eq!(doc.comments().unwrap().len(), 0);
    doc.add_comment("Ada", None, "one").unwrap();
    doc.add_comment("Ada", None, "two").unwrap();
    doc.comments_mut().unwrap();

    let main = doc.package().main_partname().unwrap();
    let rels = doc.package().part(&main).unwrap().rels();
    assert_eq!(rels.iter_by_type(rt::COMMENTS).count(), 1);
    let comment_parts = doc
        .package()
        .opc_package()
        .iter_parts()
        .filter(|p| p.content_type() == ct::WML_COMMENTS)
        .count();
    assert_eq!(comment_parts, 1);
    assert_eq!(doc.comments().unwrap().len(), 2);
}

#[test]
fn test_save_and_open_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("round-trip.docx");

    let mut doc = Document::new().unwrap();
    let list = doc.allocate_numbering(&[NumberingFormat::DECIMAL]).unwrap();
    let run = doc.append_run().unwrap();
    doc.set_run_text(&run, "numbered").unwrap();
    let run = doc.set_numbering(&run, list.num_id, 0).unwrap();
    let picture_run = doc.append_run().unwrap();
    doc.insert_picture(&picture_run, &PictureData::from_bytes(8, 8, PNG.to_vec()).unwrap())
        .unwrap();
    let comment = doc.add_comment("Ada", Some("AL"), "note").unwrap();
    doc.comment_run(&run, comment).unwrap();
    doc.save(&path).unwrap();

    let reopened = Document::open(&path).unwrap();
    let texts: Vec<String> = reopened.paragraphs().iter().map(|p| p.text()).collect();
    assert_eq!(texts, ["numbered", ""]);
    assert_eq!(reopened.paragraphs()[0].numbering(), Some((1, 0)));
    assert_eq!(reopened.pictures().len(), 1);
    assert_eq!(reopened.media().len(), 1);
    assert_eq!(reopened.comments().unwrap()[0].initials(), Some("AL"));
    assert!(reopened.identifiers().is_reserved(1));
}

#[test]
fn test_headers_are_indexed_in_declaration_order() {
    let mut package = Package::new().unwrap();
    let main = package.main_partname().unwrap();
    let header_xml = concat!(
        r#"<w:hdr xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main" "#,
        r#"xmlns:wp="http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing">"#,
        r#"<w:p><w:r><w:drawing><wp:anchor><wp:docPr id="9" name="logo"/></wp:anchor></w:drawing></w:r></w:p>"#,
        r#"</w:hdr>"#,
    );
    for n in [1, 2] {
        let partname = PackURI::new(format!("/word/header{}.xml", n)).unwrap();
        let header = XmlPart::new(partname.clone(), ct::WML_HEADER.to_string(), header_xml.as_bytes().to_vec());
        package.opc_package_mut().add_part(Box::new(header));
        package.part_mut(&main).unwrap().relate_to(&partname, rt::HEADER);
    }

    let loaded = Document::load(package, LoadOptions::new().with_adjust_drawing_ids(true)).unwrap();
    let headers = loaded.headers();
    assert_eq!(headers.len(), 2);
    assert_eq!(loaded.partname(headers[0]).unwrap().as_str(), "/word/header1.xml");
    assert_eq!(loaded.partname(headers[1]).unwrap().as_str(), "/word/header2.xml");
    assert!(loaded.footers().is_empty());

    let drawings = loaded.drawings();
    assert_eq!(drawings.len(), 2);
    assert_eq!(drawings[0].part(), headers[0]);
    assert_eq!(drawings[0].placement(), Placement::Floating);
    assert_eq!(drawings[0].id(), Some(9));
    assert_eq!(drawings[1].id(), Some(10));
    assert_eq!(loaded.blocks(headers[1]).len(), 1);
}

#[test]
fn test_bad_comments_partname_keeps_load_working() {
    let options = LoadOptions::new().with_comments_partname("no-leading-slash.xml");
    let mut doc = Document::load(Package::new().unwrap(), options).unwrap();
    assert!(doc.append_run().is_ok());
    assert!(matches!(doc.add_comment("Ada", None, "x"), Err(OoxmlError::RelationInit(_))));
    assert!(doc.comments().is_none());
}
