//! Integration tests for the content transform pipeline

use ferry::core::transform::{build_pipeline, Dialect};
use std::io::Write;
use tempfile::NamedTempFile;
use test_case::test_case;

#[test_case("[quote=alice;22]text[/quote]" ; "post quote")]
#[test_case("[post=19]the start[/post]" ; "post link")]
#[test_case("[thread=10]welcome[/thread]" ; "thread link")]
#[test_case("[attach]7[/attach]" ; "attachment")]
#[test_case("hi @alice" ; "mention")]
fn test_bbcode_keeps_reference_tokens(token: &str) {
    let pipeline = build_pipeline(Dialect::Bbcode, None).unwrap();
    assert!(pipeline.apply(token).contains(token), "{}", pipeline.apply(token));
}

#[test]
fn test_passthrough_leaves_content_alone() {
    let pipeline = build_pipeline(Dialect::Passthrough, None).unwrap();
    let raw = "[b]already markdown?[/b] <br>";
    assert_eq!(pipeline.apply(raw), raw);
}

#[test]
fn test_rules_file_extends_dialect() {
    let mut rules = NamedTempFile::new().unwrap();
    write!(
        rules,
        r#"
[[rules]]
name = "smf_spoiler"
pattern = '(?is)\[spoiler\](.*?)\[/spoiler\]'
replacement = "[spoiler]${{1}}[/spoiler]"

[[rules]]
name = "legacy_host"
pattern = 'http://old\.example\.com'
replacement = "https://forum.example.com"
after = ["named_links"]
"#
    )
    .unwrap();

    let pipeline = build_pipeline(Dialect::Bbcode, Some(rules.path())).unwrap();
    assert!(pipeline.rule_names().contains(&"legacy_host"));

    let out = pipeline.apply("[url=http://old.example.com/x]old[/url] [b]bold[/b]");
    assert_eq!(out, "[old](https://forum.example.com/x) **bold**");
}

#[test]
fn test_rules_file_with_invalid_pattern_fails() {
    let mut rules = NamedTempFile::new().unwrap();
    write!(
        rules,
        r#"
[[rules]]
name = "broken"
pattern = '(unclosed'
replacement = ""
"#
    )
    .unwrap();

    assert!(build_pipeline(Dialect::Bbcode, Some(rules.path())).is_err());
}
