//! Single-file HTML formatter.
//!
//! Produces a standalone page with embedded CSS and JS: the trace as a
//! collapsible nested list, one `<li>` per step, colored by category.
//! Function names are deduplicated into a table emitted once at the end
//! of the document; the markup carries small integer references that the
//! embedded script resolves on load.

use std::borrow::Cow;
use std::collections::HashMap;

use tracing::warn;

use crate::format::Formatter;
use crate::step::{CallOutcome, Step, StepKind};

/// Escape user-supplied text for insertion into HTML content.
fn esc(text: &str) -> Cow<'_, str> {
    html_escape::encode_safe(text)
}

/// Escape JSON for safe embedding inside an HTML
/// `<script type="application/json">` tag.
///
/// `<` becomes `\u003c` so no `</script>` or `<!--` sequence survives;
/// the output is still valid JSON for `JSON.parse()`.
fn escape_json_for_html_script(json: &str) -> String {
    json.replace('<', "\\u003c")
}

/// Renders the trace as one self-contained HTML document.
///
/// State is deliberately O(1) in trace depth: a sequence counter, an
/// open-item flag, and the function-name dedup table. Construct one
/// instance per conversion run.
pub struct SingleHtmlFile {
    title: String,
    trace_id: u64,
    open_item: bool,
    name_index: HashMap<String, usize>,
    names: Vec<String>,
}

impl SingleHtmlFile {
    pub fn new(title: impl Into<String>) -> Self {
        SingleHtmlFile {
            title: title.into(),
            trace_id: 0,
            open_item: false,
            name_index: HashMap::new(),
            names: Vec::new(),
        }
    }

    /// First-seen index for a fully qualified function name.
    fn name_ref(&mut self, name: String) -> usize {
        if let Some(&index) = self.name_index.get(&name) {
            return index;
        }
        let index = self.names.len();
        self.name_index.insert(name.clone(), index);
        self.names.push(name);
        index
    }

    /// Category class and inner markup for one step, or `None` when the
    /// kind has no defined rendering (reserved `Error`).
    fn step_body(&mut self, kind: &StepKind) -> Option<(String, String)> {
        match kind {
            StepKind::Include { path, .. } => Some((
                "include".to_string(),
                format!("include <label>{}</label>", esc(path)),
            )),

            StepKind::Call {
                name,
                class_name,
                receiver,
                arguments,
                outcome,
                ..
            } => {
                let mut class = "functioncall".to_string();
                if class_name.is_some() {
                    class.push_str(" method");
                    if receiver.is_none() {
                        class.push_str(" static");
                    }
                }
                let qualified = kind.qualified_name().unwrap_or_else(|| name.clone());

                let mut body = format!("<label class=\"fn\">{}</label>", self.name_ref(qualified));
                body.push_str("<div class=\"step-tooltip\">");
                if let Some(recv) = receiver {
                    body.push_str(&format!("<div>Instance: {}</div>", esc(recv)));
                }
                if let Some(args) = arguments {
                    body.push_str(&format!("<div>Arguments: {}</div>", esc(args)));
                }
                body.push_str("<div>");
                match outcome {
                    Some(CallOutcome::Returned(value)) => {
                        body.push_str("Returned: ");
                        body.push_str(&esc(value));
                    }
                    Some(CallOutcome::Threw(value)) => {
                        class.push_str(" throws");
                        body.push_str("Exception Thrown: ");
                        body.push_str(&esc(value));
                    }
                    None if name == "__construct" => class.push_str(" constructor"),
                    None => body.push_str("Returned: null"),
                }
                body.push_str("</div></div>");
                Some((class, body))
            }

            StepKind::Header { text, replace } => {
                let mut body = format!("header: <label>{}</label>", esc(text));
                if *replace {
                    body.push_str(" (replace)");
                }
                Some(("header".to_string(), body))
            }

            StepKind::Request {
                final_url,
                remote_ip,
                ..
            } => Some((
                "request".to_string(),
                format!(
                    "<h2>Request for {} from {}</h2>",
                    esc(final_url),
                    esc(remote_ip)
                ),
            )),

            StepKind::Write {
                byte_count,
                output,
                truncated,
                ..
            } => {
                let count = byte_count
                    .map(|n| n.to_string())
                    .unwrap_or_else(|| "?".to_string());
                let mut body = format!("<strong>--- write {count} bytes to output ---</strong>");
                if let Some(text) = output {
                    body.push_str("<div class=\"step-tooltip\"><div>Output: ");
                    body.push_str(&esc(text));
                    body.push_str("</div>");
                    if *truncated {
                        body.push_str("<div>(truncated)</div>");
                    }
                    body.push_str("</div>");
                }
                Some(("write".to_string(), body))
            }

            StepKind::SendHeaders => Some((
                "sendheaders".to_string(),
                "<strong>--- SEND HEADERS ---</strong>".to_string(),
            )),

            StepKind::ScriptExit => Some((
                "exit".to_string(),
                "<strong>--- END SCRIPT ---</strong>".to_string(),
            )),

            StepKind::Error => None,
        }
    }
}

impl Formatter for SingleHtmlFile {
    fn begin_document(&mut self) -> String {
        let title = esc(&self.title);

        let mut html = String::with_capacity(8 * 1024);
        html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"UTF-8\">\n<title>");
        html.push_str(&title);
        html.push_str("</title>\n");
        html.push_str(PAGE_STYLE);
        html.push_str(PAGE_SCRIPT);
        html.push_str("</head>\n<body>\n<div id=\"heading\">\n<h1>");
        html.push_str(&title);
        html.push_str(concat!(
            "</h1>\n<div id=\"controls\">\n",
            "<div class=\"filter-control\">\n",
            "<label>Filter out calls to: </label><input id=\"filter-out-input\" type=\"text\">\n",
            "<button onclick=\"filterOut(document.getElementById('filter-out-input').value);\">filter out</button>\n",
            "</div>\n</div>\n</div>\n\n<div id=\"trace\">\n<ul>\n",
        ));

        self.open_item = false;
        html
    }

    fn enter_level(&mut self) -> String {
        if self.open_item {
            self.open_item = false;
            "<ul>\n".to_string()
        } else {
            // No open item to nest under, so synthesize a parent.
            "<li><ul>\n".to_string()
        }
    }

    fn leave_level(&mut self) -> String {
        if self.open_item {
            self.open_item = false;
            "</li></ul>\n".to_string()
        } else {
            "</ul>".to_string()
        }
    }

    fn render_step(&mut self, step: &Step) -> String {
        let mut out = String::new();
        if self.open_item {
            out.push_str("</li>");
        }
        self.trace_id += 1;

        match self.step_body(&step.kind) {
            Some((class, body)) => {
                out.push_str(&format!(
                    "<li class=\"{class}\" id=\"traceline-{id}\"><div>{body}\n",
                    id = self.trace_id
                ));
                if self.trace_id > 1 {
                    out.push_str(
                        "<span class=\"line-controls\"><a href=\"#\" onclick=\"toParent(this); return false;\">to parent</a></span>",
                    );
                }
                out.push_str(&format!(
                    "<span class=\"trace-id\">{}</span></div>",
                    self.trace_id
                ));
            }
            None => {
                warn!(trace_id = self.trace_id, "unhandled step kind in renderer");
                out.push_str("<li>&nbsp;");
            }
        }

        self.open_item = true;
        out
    }

    fn end_document(&mut self) -> String {
        let mut out = String::new();
        if self.open_item {
            self.open_item = false;
            out.push_str("\n</li>");
        } else {
            out.push('\n');
        }
        out.push_str("</ul></div>\n");

        let table = serde_json::to_string(&self.names).unwrap_or_else(|_| "[]".to_string());
        out.push_str("<script type=\"application/json\" id=\"funcname-table\">");
        out.push_str(&escape_json_for_html_script(&table));
        out.push_str("</script>\n</body></html>\n");
        out
    }
}

const PAGE_STYLE: &str = r#"<style>
body { font-family: Tahoma, sans-serif; font-size: 9pt; padding: 0; margin: 0; }
h2 { margin: 0; }
#heading { padding: 1em; border-bottom: 1px solid #a0a0a0; position: fixed; top: 0; left: 0; width: 100%; box-shadow: 5px 5px 10px #a0a0a0; height: 90px; background-color: #ffffff; z-index: 10; }
#trace { padding: 1em; position: fixed; left: 0; right: 0; top: 122px; bottom: 0; overflow: auto; }
#trace ul { margin: 0; padding: 0; list-style-type: none; }
#trace li ul { padding-left: 1em; }
#trace ul li.folded { background-color: #e0e0e0; color: #a0a0a0; }
#trace .include > div { background-color: #9edede; }
#trace .functioncall > div { background-color: #ffffff; }
#trace .header > div { background-color: #bcbcff; }
#trace .throws > div { background-color: #ffbcbc !important; }
#trace .write > div,
#trace .exit > div,
#trace .sendheaders > div { background-color: #fcfc20; }
#trace label { font-family: monospace; font-weight: bold; }
#trace li div .line-controls { display: none; margin: 0 1em; }
#trace li > div:hover .line-controls { display: inline-block; }
#trace li .trace-id { display: inline-block; float: right; }
#trace li > div { position: relative; }
#trace li > div:hover { background-color: #f0f000; }
#trace li > div .step-tooltip { display: none; }
#trace li > div:hover > .step-tooltip { display: block; position: absolute; left: 2em; top: 1.4em; background: #333; color: #fff; padding: 5px 8px; border-radius: 3px; box-shadow: 3px 3px 5px #aaa; z-index: 3000; opacity: 0.9; }
.folded-info { margin-left: 1em; font-style: italic; }
</style>
"#;

const PAGE_SCRIPT: &str = r#"<script>
document.addEventListener('DOMContentLoaded', function () {
    var table = document.getElementById('funcname-table');
    var names = table ? JSON.parse(table.textContent) : [];

    // Replace function name references with the looked-up names.
    document.querySelectorAll('#trace label.fn').forEach(function (label) {
        var name = names[parseInt(label.textContent, 10)];
        if (name) { label.textContent = name; }
    });

    // Attach collapse / expand to every item with a nested list.
    document.querySelectorAll('#trace li').forEach(function (item) {
        var list = item.querySelector(':scope > ul');
        var head = item.querySelector(':scope > div label');
        if (!list || !head) { return; }
        head.addEventListener('click', function () {
            item.classList.toggle('folded');
            var folded = item.classList.contains('folded');
            list.style.display = folded ? 'none' : '';
            var info = item.querySelector(':scope > div .folded-info');
            if (folded && !info) {
                var span = document.createElement('span');
                span.className = 'folded-info';
                span.textContent = '[' + list.querySelectorAll('li').length + ' lines hidden]';
                item.querySelector(':scope > div').appendChild(span);
            } else if (!folded && info) {
                info.remove();
            }
        });
    });
});

function toParent(anchor) {
    var parent = anchor.closest('ul').closest('li');
    if (parent && parent.id) { window.location.hash = '#' + parent.id; }
}

function filterOut(text) {
    if (!text) { return; }
    var hidden = 0;
    document.querySelectorAll('#trace label').forEach(function (label) {
        if (label.textContent.indexOf(text) !== -1) {
            var item = label.closest('li');
            if (item && item.style.display !== 'none') {
                item.style.display = 'none';
                hidden++;
            }
        }
    });
    alert('Filtered out ' + hidden + ' lines');
}
</script>
"#;

#[cfg(test)]
mod tests {
    use super::*;

    fn call(name: &str, arguments: Option<&str>) -> Step {
        Step {
            depth: 0,
            kind: StepKind::Call {
                name: name.to_string(),
                class_name: None,
                receiver: None,
                arguments: arguments.map(str::to_string),
                outcome: None,
                mem_delta_kb: 0,
                runtime_ms: 0.0,
            },
        }
    }

    #[test]
    fn title_is_escaped_exactly_once() {
        let mut fmt = SingleHtmlFile::new("Trace & <Friends>");
        let head = fmt.begin_document();
        assert!(head.contains("<title>Trace &amp; &lt;Friends&gt;</title>"));
        assert!(!head.contains("&amp;amp;"));
        assert!(!head.contains("<Friends>"));
    }

    #[test]
    fn enter_level_depends_on_open_item() {
        let mut fmt = SingleHtmlFile::new("t");
        fmt.begin_document();
        // No item open yet: a parent must be synthesized.
        assert_eq!(fmt.enter_level(), "<li><ul>\n");
        fmt.render_step(&call("a", None));
        assert_eq!(fmt.enter_level(), "<ul>\n");
    }

    #[test]
    fn leave_level_depends_on_open_item() {
        let mut fmt = SingleHtmlFile::new("t");
        fmt.begin_document();
        fmt.render_step(&call("a", None));
        assert_eq!(fmt.leave_level(), "</li></ul>\n");
        assert_eq!(fmt.leave_level(), "</ul>");
    }

    #[test]
    fn sibling_item_is_closed_before_the_next_one() {
        let mut fmt = SingleHtmlFile::new("t");
        fmt.begin_document();
        let first = fmt.render_step(&call("a", None));
        assert!(!first.starts_with("</li>"));
        let second = fmt.render_step(&call("b", None));
        assert!(second.starts_with("</li>"));
    }

    #[test]
    fn sequence_ids_are_stable_and_start_at_one() {
        let mut fmt = SingleHtmlFile::new("t");
        fmt.begin_document();
        let first = fmt.render_step(&call("a", None));
        assert!(first.contains("id=\"traceline-1\""));
        assert!(!first.contains("to parent"));
        let second = fmt.render_step(&call("b", None));
        assert!(second.contains("id=\"traceline-2\""));
        assert!(second.contains("to parent"));
    }

    #[test]
    fn argument_text_is_html_escaped() {
        let mut fmt = SingleHtmlFile::new("t");
        fmt.begin_document();
        let out = fmt.render_step(&call("f", Some("<b>\"x\" & y</b>")));
        assert!(out.contains("&lt;b&gt;"));
        assert!(!out.contains("<b>"));
        assert!(out.contains("&quot;x&quot;"));
        assert!(out.contains("&amp; y"));
    }

    #[test]
    fn function_names_are_deduplicated_in_first_seen_order() {
        let mut fmt = SingleHtmlFile::new("t");
        fmt.begin_document();
        let a1 = fmt.render_step(&call("alpha", None));
        let b = fmt.render_step(&call("beta", None));
        let a2 = fmt.render_step(&call("alpha", None));
        assert!(a1.contains("<label class=\"fn\">0</label>"));
        assert!(b.contains("<label class=\"fn\">1</label>"));
        assert!(a2.contains("<label class=\"fn\">0</label>"));

        let tail = fmt.end_document();
        assert!(tail.contains("[\"alpha\",\"beta\"]"));
    }

    #[test]
    fn qualified_names_distinguish_static_and_instance() {
        let mut fmt = SingleHtmlFile::new("t");
        fmt.begin_document();
        let step = Step {
            depth: 0,
            kind: StepKind::Call {
                name: "run".to_string(),
                class_name: Some("Job".to_string()),
                receiver: Some("#3".to_string()),
                arguments: None,
                outcome: None,
                mem_delta_kb: 0,
                runtime_ms: 0.0,
            },
        };
        let out = fmt.render_step(&step);
        assert!(out.contains("class=\"functioncall method\""));
        assert!(out.contains("Instance: #3"));
        let tail = fmt.end_document();
        assert!(tail.contains("Job-&gt;run") || tail.contains("Job->run"));
    }

    #[test]
    fn throwing_call_gets_the_throws_class() {
        let mut fmt = SingleHtmlFile::new("t");
        fmt.begin_document();
        let step = Step {
            depth: 0,
            kind: StepKind::Call {
                name: "boom".to_string(),
                class_name: Some("Job".to_string()),
                receiver: None,
                arguments: None,
                outcome: Some(CallOutcome::Threw("E".to_string())),
                mem_delta_kb: 0,
                runtime_ms: 0.0,
            },
        };
        let out = fmt.render_step(&step);
        assert!(out.contains("class=\"functioncall method static throws\""));
        assert!(out.contains("Exception Thrown: E"));
    }

    #[test]
    fn constructor_modifier() {
        let mut fmt = SingleHtmlFile::new("t");
        fmt.begin_document();
        let step = Step {
            depth: 0,
            kind: StepKind::Call {
                name: "__construct".to_string(),
                class_name: Some("Job".to_string()),
                receiver: Some("#1".to_string()),
                arguments: None,
                outcome: None,
                mem_delta_kb: 0,
                runtime_ms: 0.0,
            },
        };
        let out = fmt.render_step(&step);
        assert!(out.contains("class=\"functioncall method constructor\""));
    }

    #[test]
    fn reserved_error_kind_renders_a_placeholder() {
        let mut fmt = SingleHtmlFile::new("t");
        fmt.begin_document();
        let out = fmt.render_step(&Step {
            depth: 0,
            kind: StepKind::Error,
        });
        assert!(out.contains("<li>&nbsp;"));
    }

    #[test]
    fn end_document_closes_one_pending_item() {
        let mut fmt = SingleHtmlFile::new("t");
        fmt.begin_document();
        fmt.render_step(&call("a", None));
        let tail = fmt.end_document();
        assert!(tail.starts_with("\n</li>"));
        assert!(tail.contains("</body></html>"));
    }

    #[test]
    fn name_table_escapes_script_breakout() {
        let mut fmt = SingleHtmlFile::new("t");
        fmt.begin_document();
        fmt.render_step(&call("evil</script><img src=x>", None));
        let tail = fmt.end_document();
        assert!(tail.contains("\\u003c/script>\\u003cimg"));
        // The only </script> is the table's own closing tag.
        assert_eq!(tail.matches("</script>").count(), 1);
    }
}
