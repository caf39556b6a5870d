use rambutan::ooxml::docx::template::default_document_xml;
use rambutan::ooxml::docx::{
    Document, LoadOptions, MergeOptions, Package, PartId, PictureData, RunAnchor,
};
use rambutan::ooxml::opc::constants::{content_type as ct, namespace as ns, relationship_type as rt};
use rambutan::ooxml::opc::{BlobPart, PackURI, Part, XmlPart};
use rambutan::OoxmlError;

const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0x0D, b'I', b'H', b'D', b'R'];

fn package_with_body(body: &str) -> Package {
    let mut xml = default_document_xml();
    let at = xml.find("<w:sectPr>").unwrap();
    xml.insert_str(at, body);
    let mut package = Package::new().unwrap();
    let main = package.main_partname().unwrap();
    package.part_mut(&main).unwrap().set_blob(xml.into_bytes());
    package
}

fn document_with_body(body: &str) -> Document {
    Document::load(package_with_body(body), LoadOptions::default()).unwrap()
}

fn text(text: &str) -> String {
    format!(r#"<w:p><w:r><w:t xml:space="preserve">{}</w:t></w:r></w:p>"#, text)
}

fn drawing(id: u32) -> String {
    format!(
        r#"<w:p><w:r><w:drawing><wp:inline><wp:extent cx="10" cy="10"/><wp:docPr id="{}" name="shape"/></wp:inline></w:drawing></w:r></w:p>"#,
        id
    )
}

fn paragraph_texts(doc: &Document) -> Vec<String> {
    doc.paragraphs().iter().map(|p| p.text()).collect()
}

fn count_parts(doc: &Document, content_type: &str) -> usize {
    doc.package()
        .opc_package()
        .iter_parts()
        .filter(|p| p.content_type() == content_type)
        .count()
}

#[test]
fn test_guests_are_merged_in_order() {
    let mut host = document_with_body(&format!("{}{}{}", text("title"), text("{{chapters}}"), text("end")));
    let anchor = host.find_run(|run| run.text() == "{{chapters}}").unwrap();
    let guests = vec![
        document_with_body(&format!("{}{}", text("one"), drawing(1))),
        document_with_body(&format!("{}{}", text("two"), drawing(1))),
    ];

    let report = host.merge(guests, &anchor, &MergeOptions::default()).unwrap();
    assert_eq!(report.guests, 2);
    assert_eq!(report.blocks, 4);
    assert_eq!(report.renumbered_drawings, 1);

    assert_eq!(paragraph_texts(&host), ["title", "one", "", "two", "", "end"]);
    let mut ids: Vec<u32> = host.drawings().iter().filter_map(|d| d.id()).collect();
    ids.sort_unstable();
    assert_eq!(ids, [1, 2]);
}

#[test]
fn test_merge_at_paragraph_with_text_keeps_it() {
    let mut host = document_with_body(r#"<w:p><w:r><w:t>Intro:</w:t></w:r><w:r><w:t>{{x}}</w:t></w:r></w:p>"#);
    let anchor = host.find_run(|run| run.text() == "{{x}}").unwrap();

    host.merge([document_with_body(&text("body"))], &anchor, &MergeOptions::default())
        .unwrap();
    assert_eq!(paragraph_texts(&host), ["Intro:{{x}}", "body"]);
}

#[test]
fn test_anchor_on_paragraph_is_rejected() {
    let mut host = document_with_body(&text("{{x}}"));
    let before = host.part_xml(PartId::MAIN).unwrap().to_xml();

    let paragraph = host.paragraphs()[0].path().clone();
    let bogus = RunAnchor::new(PartId::MAIN, paragraph);
    let result = host.merge([document_with_body(&drawing(1))], &bogus, &MergeOptions::default());
    assert!(matches!(result, Err(OoxmlError::InvalidTarget(_))));
    assert_eq!(host.part_xml(PartId::MAIN).unwrap().to_xml(), before);
    assert!(host.drawings().is_empty());
}

#[test]
fn test_no_guests_changes_nothing() {
    let mut host = document_with_body(&text("{{x}}"));
    let before = host.part_xml(PartId::MAIN).unwrap().to_xml();
    let anchor = host.find_run(|_| true).unwrap();

    let report = host
        .merge(Vec::<Document>::new(), &anchor, &MergeOptions::default())
        .unwrap();
    assert_eq!(report, Default::default());
    assert_eq!(host.part_xml(PartId::MAIN).unwrap().to_xml(), before);
}

#[test]
fn test_shared_picture_survives_save_and_reload() {
    let picture = PictureData::from_bytes(16, 16, PNG.to_vec()).unwrap();

    let mut host = document_with_body(&text("{{x}}"));
    let logo = host.append_run().unwrap();
    host.insert_picture(&logo, &picture).unwrap();

    let mut guest = Document::new().unwrap();
    let run = guest.append_run().unwrap();
    guest.insert_picture(&run, &picture).unwrap();

    let anchor = host.find_run(|run| run.text() == "{{x}}").unwrap();
    let report = host.merge([guest], &anchor, &MergeOptions::default()).unwrap();
    assert_eq!(report.reused_media, 1);
    assert_eq!(host.pictures().len(), 2);

    let reloaded = Document::from_bytes(host.to_bytes().unwrap()).unwrap();
    assert_eq!(reloaded.media().len(), 1);
    assert_eq!(count_parts(&reloaded, ct::PNG), 1);

    let pictures = reloaded.pictures();
    let targets: Vec<PackURI> = pictures
        .iter()
        .map(|p| {
            let r_id = p.image_rel_id().unwrap();
            reloaded
                .package()
                .part(reloaded.partname(p.part()).unwrap())
                .unwrap()
                .related_partname(&r_id)
                .unwrap()
        })
        .collect();
    assert_eq!(targets[0], targets[1]);
}

#[test]
fn test_guest_chart_brings_its_workbook() {
    let body = format!(
        concat!(
            r#"<w:p><w:r><w:drawing><wp:inline><wp:docPr id="1" name="Chart 1"/>"#,
            r#"<a:graphic xmlns:a="{a}"><a:graphicData uri="{c}">"#,
            r#"<c:chart xmlns:c="{c}" r:id="rId90"/>"#,
            r#"</a:graphicData></a:graphic></wp:inline></w:drawing></w:r></w:p>"#,
        ),
        a = ns::DML_MAIN,
        c = ns::DML_CHART,
    );
    let mut package = package_with_body(&body);
    let chart_xml = format!(
        r#"<c:chartSpace xmlns:c="{}" xmlns:r="{}"><c:chart/><c:externalData r:id="rId1"/></c:chartSpace>"#,
        ns::DML_CHART,
        ns::OFC_RELATIONSHIPS,
    );
    let chart_name = PackURI::new("/word/charts/chart1.xml").unwrap();
    let workbook_name = PackURI::new("/word/embeddings/data.xlsx").unwrap();
    let mut chart = XmlPart::new(chart_name.clone(), ct::DML_CHART.to_string(), chart_xml.into_bytes());
    chart
        .rels_mut()
        .add_relationship(rt::PACKAGE.to_string(), "../embeddings/data.xlsx".to_string(), "rId1".to_string(), false);
    let opc = package.opc_package_mut();
    opc.add_part(Box::new(chart));
    opc.add_part(Box::new(BlobPart::new(workbook_name, ct::SML_SHEET.to_string(), b"workbook".to_vec())));
    let main = package.main_partname().unwrap();
    package
        .part_mut(&main)
        .unwrap()
        .rels_mut()
        .add_relationship(rt::CHART.to_string(), "charts/chart1.xml".to_string(), "rId90".to_string(), false);
    let guest = Document::load(package, LoadOptions::default()).unwrap();

    let mut host = document_with_body(&text("{{x}}"));
    let anchor = host.find_run(|_| true).unwrap();
    host.merge([guest], &anchor, &MergeOptions::default()).unwrap();

    assert_eq!(count_parts(&host, ct::DML_CHART), 1);
    assert_eq!(count_parts(&host, ct::SML_SHEET), 1);

    let drawings = host.drawings();
    let r_id = drawings[0].chart_rel_id().unwrap();
    let main = host.package().main_partname().unwrap();
    let chart_name = host
        .package()
        .part(&main)
        .unwrap()
        .related_partname(&r_id)
        .unwrap();
    let origin = host.chart_origin(&chart_name).unwrap();
    assert_eq!(origin.partname().map(|p| p.as_str()), Some("/word/charts/chart1.xml"));
    assert_eq!(host.chart_source(&chart_name).unwrap().workbook(), Some(&b"workbook"[..]));
}

fn header_xml(content: &str) -> String {
    format!(
        r#"<w:hdr xmlns:w="{}" xmlns:wp="{}" xmlns:r="{}">{}</w:hdr>"#,
        "http://schemas.openxmlformats.org/wordprocessingml/2006/main",
        ns::DML_WORDPROCESSING_DRAWING,
        ns::OFC_RELATIONSHIPS,
        content
    )
}

/// Add a header part related from the main document under `r_id`.
fn add_header(package: &mut Package, name: &str, content: &str, r_id: &str) {
    let partname = PackURI::new(name).unwrap();
    let header = XmlPart::new(partname.clone(), ct::WML_HEADER.to_string(), header_xml(content).into_bytes());
    package.opc_package_mut().add_part(Box::new(header));
    let main = package.main_partname().unwrap();
    package.part_mut(&main).unwrap().rels_mut().add_relationship(
        rt::HEADER.to_string(),
        partname.filename().to_string(),
        r_id.to_string(),
        false,
    );
}

fn distinct_ids(doc: &Document) -> bool {
    let mut ids: Vec<u32> = doc.drawings().iter().filter_map(|d| d.id()).collect();
    let total = ids.len();
    ids.sort_unstable();
    ids.dedup();
    ids.len() == total
}

#[test]
fn test_failing_guest_keeps_earlier_guests() {
    let mut broken = package_with_body(&format!(
        concat!(
            r#"<w:p><w:r><w:drawing><wp:inline><wp:docPr id="3" name="pic"/>"#,
            r#"<a:graphic xmlns:a="{a}"><a:graphicData><a:blip r:embed="rId99"/></a:graphicData></a:graphic>"#,
            r#"</wp:inline></w:drawing></w:r></w:p>"#,
        ),
        a = ns::DML_MAIN,
    ));
    let main = broken.main_partname().unwrap();
    broken.part_mut(&main).unwrap().rels_mut().add_relationship(
        rt::IMAGE.to_string(),
        "media/missing.png".to_string(),
        "rId99".to_string(),
        false,
    );
    let broken = Document::load(broken, LoadOptions::default()).unwrap();
    let table = document_with_body("<w:tbl><w:tr><w:tc><w:p/></w:tc></w:tr></w:tbl>");

    let mut host = document_with_body(&text("{{x}}"));
    let anchor = host.find_run(|run| run.text() == "{{x}}").unwrap();
    let result = host.merge([table, broken], &anchor, &MergeOptions::default());

    assert!(result.is_err());
    assert_eq!(host.tables().len(), 1);
    assert!(host.find_run(|run| run.text() == "{{x}}").is_none());
    assert!(host.drawings().is_empty());

    let reloaded = Document::from_bytes(host.to_bytes().unwrap()).unwrap();
    assert_eq!(reloaded.tables().len(), 1);
}

#[test]
fn test_failing_first_guest_leaves_anchor_paragraph() {
    let mut broken = package_with_body(r#"<w:p><w:hyperlink r:id="rId77"><w:r><w:t>x</w:t></w:r></w:hyperlink></w:p>"#);
    let main = broken.main_partname().unwrap();
    broken.part_mut(&main).unwrap().rels_mut().add_relationship(
        rt::IMAGE.to_string(),
        "media/gone.png".to_string(),
        "rId77".to_string(),
        false,
    );
    let broken = Document::load(broken, LoadOptions::default()).unwrap();

    let mut host = document_with_body(&text("{{x}}"));
    let anchor = host.find_run(|run| run.text() == "{{x}}").unwrap();
    assert!(host.merge([broken], &anchor, &MergeOptions::default()).is_err());
    assert_eq!(paragraph_texts(&host), ["{{x}}"]);
}

#[test]
fn test_guest_section_header_is_remapped_and_indexed() {
    let mut guest = package_with_body(concat!(
        r#"<w:p><w:pPr><w:sectPr><w:headerReference w:type="default" r:id="rId80"/></w:sectPr></w:pPr></w:p>"#,
        r#"<w:p><w:r><w:t>second section</w:t></w:r></w:p>"#,
    ));
    add_header(&mut guest, "/word/header1.xml", &drawing(5), "rId80");
    let guest = Document::load(guest, LoadOptions::default()).unwrap();

    let mut host = document_with_body(&format!("{}{}", drawing(5), text("{{x}}")));
    let anchor = host.find_run(|run| run.text() == "{{x}}").unwrap();
    let report = host.merge([guest], &anchor, &MergeOptions::default()).unwrap();
    assert_eq!(report.renumbered_drawings, 1);

    let headers = host.headers();
    assert_eq!(headers.len(), 1);
    let drawings = host.drawings();
    assert_eq!(drawings.len(), 2);
    assert_eq!(drawings[1].part(), headers[0]);
    assert!(distinct_ids(&host));

    let reloaded = Document::from_bytes(host.to_bytes().unwrap()).unwrap();
    assert_eq!(reloaded.headers().len(), 1);
    assert_eq!(reloaded.drawings().len(), 2);
    assert!(distinct_ids(&reloaded));
}

#[test]
fn test_merge_at_run_in_header() {
    let mut package = package_with_body(&text("body"));
    add_header(
        &mut package,
        "/word/header1.xml",
        &format!("{}{}", drawing(1), text("{{logo}}")),
        "rId70",
    );
    let mut host = Document::load(package, LoadOptions::default()).unwrap();
    let header = host.headers()[0];

    let mut guest = Document::new().unwrap();
    let run = guest.append_run().unwrap();
    guest
        .insert_picture(&run, &PictureData::from_bytes(8, 8, PNG.to_vec()).unwrap())
        .unwrap();

    let anchor = host.find_run(|run| run.text() == "{{logo}}").unwrap();
    assert_eq!(anchor.part(), header);
    host.merge([guest], &anchor, &MergeOptions::default()).unwrap();

    let header_name = host.partname(header).unwrap().clone();
    let header_rels = host.package().part(&header_name).unwrap().rels();
    assert_eq!(header_rels.iter_by_type(rt::IMAGE).count(), 1);
    let main = host.package().main_partname().unwrap();
    let main_rels = host.package().part(&main).unwrap().rels();
    assert_eq!(main_rels.iter_by_type(rt::IMAGE).count(), 0);

    let pictures = host.pictures();
    assert_eq!(pictures.len(), 1);
    assert_eq!(pictures[0].part(), header);
    let r_id = pictures[0].image_rel_id().unwrap();
    assert!(header_rels.get(&r_id).is_some());
    assert_eq!(host.drawings().len(), 2);
    assert!(distinct_ids(&host));
    assert_eq!(paragraph_texts(&host), ["body", "", ""]);
}
