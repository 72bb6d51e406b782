use std::sync::Arc;

use confpp::{LoadError, MemoryLoader, Options, PreprocessError, Preprocessor};
use confpp_xml::{WriteOptions, to_string};
use rstest::{fixture, rstest};
use url::Url;

const NS: &str = "urn:confpp:preprocessor";

fn render(document: &confpp_xml::Document) -> String {
    to_string(&document.children, &WriteOptions::default()).unwrap()
}

#[fixture]
fn loader() -> MemoryLoader {
    MemoryLoader::new()
        .with_document(
            "mem:/conf/common.xml",
            format!(r#"<?xml version="1.0"?><pp:config-template xmlns:pp="{NS}"><common ver="{{version}}"/><pp:define seen="yes"/></pp:config-template>"#),
        )
        .with_document(
            "mem:/conf/nested/outer.xml",
            format!(r#"<pp:include xmlns:pp="{NS}" href="inner.xml"/>"#),
        )
        .with_document("mem:/conf/nested/inner.xml", "<inner/>")
        .with_document("mem:/conf/loop-a.xml", format!(r#"<pp:include xmlns:pp="{NS}" href="loop-b.xml"/>"#))
        .with_document("mem:/conf/loop-b.xml", format!(r#"<pp:include xmlns:pp="{NS}" href="loop-a.xml"/>"#))
        .with_document("mem:/conf/broken.xml", "<open>")
        .with_document(
            "mem:/conf/defs.xml",
            format!(r#"<pp:config-template xmlns:pp="{NS}"><pp:define name="broken"><pp:if/></pp:define></pp:config-template>"#),
        )
}

fn process(loader: MemoryLoader, body: &str) -> Result<String, PreprocessError> {
    let preprocessor = Preprocessor::new(Options::new().with_loader(Arc::new(loader)));
    let source = format!(r#"<root xmlns:pp="{NS}">{body}</root>"#);
    let base = Url::parse("mem:/conf/main.xml").ok();
    preprocessor.process_str(&source, base).map(|document| render(&document))
}

#[rstest]
fn include_inlines_content_in_current_scope(loader: MemoryLoader) {
    let output = process(loader, r#"<pp:define version="3"/><pp:include href="common.xml"/><seen>{seen}</seen>"#).unwrap();
    assert_eq!(output, r#"<root><common ver="3"/><seen>yes</seen></root>"#);
}

#[rstest]
fn nested_includes_resolve_relative_to_their_document(loader: MemoryLoader) {
    assert_eq!(process(loader, r#"<pp:include href="nested/outer.xml"/>"#).unwrap(), "<root><inner/></root>");
}

#[rstest]
fn include_cycle_fails_fast(loader: MemoryLoader) {
    let error = process(loader, r#"<pp:include href="loop-a.xml"/>"#).unwrap_err();
    assert!(matches!(error.root_cause(), PreprocessError::IncludeCycle(uri) if uri == "mem:/conf/loop-a.xml"));
}

#[rstest]
fn including_self_is_a_cycle(loader: MemoryLoader) {
    let error = process(loader, r#"<pp:include href="main.xml"/>"#).unwrap_err();
    assert!(matches!(error.root_cause(), PreprocessError::IncludeCycle(_)));
}

#[rstest]
fn missing_include_is_reported(loader: MemoryLoader) {
    let error = process(loader, r#"<pp:include href="nope.xml"/>"#).unwrap_err();
    assert!(matches!(
        error.root_cause(),
        PreprocessError::IncludeNotFound { href, source: LoadError::NotFound(_) } if href == "nope.xml"
    ));
}

#[rstest]
fn errors_in_included_templates_point_at_their_own_document(loader: MemoryLoader) {
    let error = process(loader, "<pp:include href=\"defs.xml\"/>\n\n<pp:broken/>").unwrap_err();
    let PreprocessError::At { element, location, .. } = &error else { panic!("unlocated error: {error}") };
    assert_eq!(element, "pp:if");
    assert!(location.starts_with("mem:/conf/defs.xml:1:"), "{location}");
    assert!(matches!(error.root_cause(), PreprocessError::MissingAttribute { .. }));
}

#[rstest]
fn malformed_include_is_a_parse_error(loader: MemoryLoader) {
    let error = process(loader, r#"<pp:include href="broken.xml"/>"#).unwrap_err();
    assert!(matches!(error.root_cause(), PreprocessError::Parse(_)));
}

#[rstest]
fn include_href_is_interpolated_and_trimmed(loader: MemoryLoader) {
    let output = process(loader, r#"<pp:define dir="nested"/><pp:include href=" {dir}/inner.xml "/>"#).unwrap();
    assert_eq!(output, "<root><inner/></root>");
}

#[rstest]
fn process_file_resolves_includes_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(dir.path().join("parts")).unwrap();
    std::fs::write(dir.path().join("parts/db.xml"), r#"<db host="{host}"/>"#).unwrap();
    let main = dir.path().join("main.xml");
    std::fs::write(
        &main,
        format!(r#"<services xmlns:pp="{NS}"><pp:scope host="localhost"><pp:include href="parts/db.xml"/></pp:scope></services>"#),
    )
    .unwrap();

    let document = Preprocessor::default().process_file(&main).unwrap();
    assert_eq!(render(&document), r#"<services><db host="localhost"/></services>"#);
    assert_eq!(document.uri, Url::from_file_path(&main).ok());
}
