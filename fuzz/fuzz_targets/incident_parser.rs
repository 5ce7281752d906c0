#![no_main]

use faultline::ingest::{parse_composite, parse_incident};
use faultline::template::TemplateSet;
use libfuzzer_sys::fuzz_target;
use std::sync::OnceLock;

fn templates() -> &'static TemplateSet {
    static TEMPLATES: OnceLock<TemplateSet> = OnceLock::new();
    TEMPLATES.get_or_init(|| {
        let corpus: Vec<String> = ["disk full", "link down", "oom killer"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        TemplateSet::mine(&corpus, 0.8)
    })
}

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        // Neither parser may panic on any input
        let _ = parse_composite(input);
        let _ = parse_incident(input, templates(), false);
        let _ = parse_incident(input, templates(), true);
    }
});
