//! HTML output tests for determinism, structure, and escaping.

use trace_html::Converter;
use trace_html::format::SingleHtmlFile;

const FIXTURE: &str = r#"REQUEST http://example.com/a via http://example.com/b from 10.0.0.1 mem:100->120 [1500 us]
    HEADER REPLACE "Content-Type: text/html"
    INCLUDE "/srv/app/bootstrap.php" mem:120->140 [300 us]
        setup()
            Config::load(this=#1|"app.ini") -> true [80 us]
    WRITE(5): "hello"
    SEND_HEADERS
EXIT [10 us]
"#;

fn convert(trace: &str, title: &str) -> String {
    let mut out = Vec::new();
    Converter::new(trace.as_bytes(), &mut out, SingleHtmlFile::new(title))
        .convert()
        .unwrap();
    String::from_utf8(out).unwrap()
}

#[test]
fn output_is_deterministic() {
    let first = convert(FIXTURE, "Trace");
    let second = convert(FIXTURE, "Trace");
    assert_eq!(first, second);
}

#[test]
fn document_structure() {
    let html = convert(FIXTURE, "Example Trace");

    assert!(html.starts_with("<!DOCTYPE html>"));
    assert!(html.contains("<title>Example Trace</title>"));
    assert!(html.contains("<h1>Example Trace</h1>"));
    assert!(html.ends_with("</body></html>\n"));

    // One item per input line, ids in sequence.
    for id in 1..=8 {
        assert!(html.contains(&format!("id=\"traceline-{id}\"")), "missing id {id}");
    }

    // Category classes.
    for class in [
        "class=\"request\"",
        "class=\"header\"",
        "class=\"include\"",
        "class=\"functioncall\"",
        "class=\"functioncall method\"",
        "class=\"write\"",
        "class=\"sendheaders\"",
        "class=\"exit\"",
    ] {
        assert!(html.contains(class), "missing {class}");
    }

    assert!(html.contains("header: <label>Content-Type: text/html</label> (replace)"));
    assert!(html.contains("include <label>/srv/app/bootstrap.php</label>"));
    assert!(html.contains("<h2>Request for http://example.com/a from 10.0.0.1</h2>"));
    assert!(html.contains("--- write 5 bytes to output ---"));
}

#[test]
fn name_table_lists_each_name_once_in_first_seen_order() {
    let html = convert(FIXTURE, "Trace");
    assert!(html.contains(
        "<script type=\"application/json\" id=\"funcname-table\">[\"setup\",\"Config->load\"]</script>"
    ));
}

#[test]
fn nested_lists_follow_the_depth_changes() {
    let html = convert(FIXTURE, "Trace");
    // Root list plus one per enter-level call; the fixture nests to depth
    // 3 and returns to 0, so every list is closed again.
    assert_eq!(html.matches("<ul>").count(), html.matches("</ul>").count());
}

#[test]
fn stream_ending_deep_leaves_outer_lists_unterminated() {
    let html = convert("a()\n    b()\n", "Trace");
    // end-document closes the pending item and the root container only.
    assert!(html.matches("<ul>").count() > html.matches("</ul>").count());
}

#[test]
fn title_is_escaped() {
    let html = convert(FIXTURE, "<script>alert(1)</script> & Co");
    assert!(!html.contains("<script>alert"));
    assert!(html.contains("&lt;script&gt;alert(1)&lt;/script&gt; &amp; Co"));
}

#[test]
fn user_content_cannot_break_out_of_the_script_tags() {
    let trace = "evil</script><img src=x onerror=alert(1)>() -> 1\n";
    let html = convert(trace, "Trace");

    // Exactly two closing script tags: the page script and the name table.
    assert_eq!(html.matches("</script>").count(), 2);
    assert!(html.contains("\\u003c/script>\\u003cimg"));
    assert!(!html.contains("<img src=x"));
}

#[test]
fn argument_text_with_markup_is_escaped() {
    let trace = "render(\"<b>&amp;</b>\") -> null\n";
    let html = convert(trace, "Trace");
    assert!(html.contains("Arguments: &quot;&lt;b&gt;&amp;amp;&lt;/b&gt;&quot;"));
    assert!(!html.contains("<b>&amp;</b>"));
}

#[test]
fn writes_to_a_file_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("trace.html");

    let file = std::fs::File::create(&path).unwrap();
    Converter::new(
        FIXTURE.as_bytes(),
        std::io::BufWriter::new(file),
        SingleHtmlFile::new("Trace"),
    )
    .convert()
    .unwrap();

    let html = std::fs::read_to_string(&path).unwrap();
    assert!(html.starts_with("<!DOCTYPE html>"));
    assert!(html.ends_with("</body></html>\n"));
}
