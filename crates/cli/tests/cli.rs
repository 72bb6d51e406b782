use clap::Parser;
use confpp_cli::{Cli, execute, render};
use rstest::{fixture, rstest};
use tempfile::TempDir;

const NS: &str = "urn:confpp:preprocessor";

#[fixture]
fn workspace() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("build.xml"),
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<build xmlns:pp="{NS}">
  <pp:ifdef name="release"><opt level="{{release}}"/></pp:ifdef>
  <pp:else><debug/></pp:else>
  <pp:include href="parts/jobs.xml"/>
</build>"#
        ),
    )
    .unwrap();
    std::fs::create_dir(dir.path().join("parts")).unwrap();
    std::fs::write(
        dir.path().join("parts/jobs.xml"),
        format!(r#"<pp:count xmlns:pp="{NS}" name="n" max="2"><job id="{{n}}"/></pp:count>"#),
    )
    .unwrap();
    dir
}

fn cli(args: &[&str]) -> Cli {
    Cli::try_parse_from(std::iter::once("confpp").chain(args.iter().copied())).unwrap()
}

#[rstest]
fn renders_file_with_definitions(workspace: TempDir) {
    let input = workspace.path().join("build.xml");
    let output = render(&cli(&[input.to_str().unwrap(), "-D", "release=3", "--no-declaration"])).unwrap();
    assert_eq!(output, "<build><opt level=\"3\"/><job id=\"1\"/><job id=\"2\"/></build>\n");
}

#[rstest]
fn else_branch_without_definition(workspace: TempDir) {
    let input = workspace.path().join("build.xml");
    let output = render(&cli(&[input.to_str().unwrap(), "--no-declaration"])).unwrap();
    assert!(output.starts_with("<build><debug/><job id=\"1\"/>"));
}

#[rstest]
fn writes_output_file_with_declaration(workspace: TempDir) {
    let input = workspace.path().join("build.xml");
    let target = workspace.path().join("out.xml");
    execute(&cli(&[input.to_str().unwrap(), "-o", target.to_str().unwrap()])).unwrap();
    let written = std::fs::read_to_string(target).unwrap();
    assert!(written.starts_with(r#"<?xml version="1.0" encoding="UTF-8"?>"#));
    assert!(written.contains("<debug/>"));
}

#[rstest]
fn missing_input_is_reported(workspace: TempDir) {
    let input = workspace.path().join("absent.xml");
    let error = render(&cli(&[input.to_str().unwrap()])).unwrap_err();
    assert!(error.to_string().contains("input file not found"));
}

#[rstest]
fn preprocessing_errors_keep_their_chain(workspace: TempDir) {
    let input = workspace.path().join("bad.xml");
    std::fs::write(&input, format!(r#"<a xmlns:pp="{NS}"><pp:count name="i"/></a>"#)).unwrap();
    let error = render(&cli(&[input.to_str().unwrap()])).unwrap_err();
    let chain = format!("{error:#}");
    assert!(chain.contains("pp:count"), "{chain}");
    assert!(chain.contains("missing required attribute(s): max"), "{chain}");
}

#[rstest]
#[case(&["-D", "9x=1"])]
#[case(&["--max-depth", "many"])]
fn rejects_bad_arguments(#[case] args: &[&str]) {
    let argv = std::iter::once("confpp").chain(args.iter().copied());
    assert!(Cli::try_parse_from(argv).is_err());
}

#[rstest]
fn options_follow_flags() {
    let parsed = cli(&["--namespace", "urn:x", "--preserve-whitespace", "--max-iterations", "5", "-D", "a=1", "-vv"]);
    let options = parsed.options();
    assert_eq!(options.namespace(), "urn:x");
    assert_eq!(options.whitespace(), confpp::Whitespace::Preserve);
    assert_eq!(options.max_iterations(), 5);
    assert_eq!(options.definitions(), &[("a".to_string(), "1".to_string())]);
    assert_eq!(parsed.verbose, 2);
}
