use regex::{Captures, Regex, Replacer};
use std::sync::LazyLock;

// Identifiers the downloader knows how to fill. Only `%0[width]d` is permitted as a format
// tag, eg. "$RepresentationID$/$Number%06d$.m4s".
static TEMPLATE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$(?:(RepresentationID|Number|Bandwidth)(?:%0(\d+)d)?)?\$").unwrap()
});

/// Substitution values of one Representation.
///
/// Identifiers without a value are left in the output unchanged, and `$$` collapses to `$`.
#[derive(Debug, Clone, Default)]
pub struct Template<'a> {
    representation_id: Option<&'a str>,
    bandwidth: Option<u64>,
    number: Option<u64>,
}

impl<'a> Template<'a> {
    pub fn new(representation_id: &'a str) -> Self {
        Self {
            representation_id: Some(representation_id),
            ..Default::default()
        }
    }

    pub fn with_bandwidth(mut self, bandwidth: Option<u64>) -> Self {
        self.bandwidth = bandwidth;
        self
    }

    pub fn with_number(mut self, number: u64) -> Self {
        self.number = Some(number);
        self
    }

    pub fn resolve(&self, template: &str) -> String {
        TEMPLATE_REGEX
            .replace_all(template, TemplateReplacer(self))
            .into_owned()
    }

    fn value_of(&self, identifier: &str) -> Option<String> {
        match identifier {
            "RepresentationID" => self.representation_id.map(str::to_string),
            "Number" => self.number.map(|n| n.to_string()),
            "Bandwidth" => self.bandwidth.map(|b| b.to_string()),
            _ => None,
        }
    }
}

struct TemplateReplacer<'t, 'a>(&'t Template<'a>);

impl Replacer for TemplateReplacer<'_, '_> {
    fn replace_append(&mut self, caps: &Captures<'_>, dst: &mut String) {
        let Some(identifier) = caps.get(1) else {
            // escaped dollar sign
            dst.push('$');
            return;
        };

        let Some(value) = self.0.value_of(identifier.as_str()) else {
            dst.push_str(&caps[0]);
            return;
        };

        match caps.get(2).and_then(|m| m.as_str().parse::<usize>().ok()) {
            Some(width) => dst.push_str(&format!("{value:0>width$}")),
            None => dst.push_str(&value),
        }
    }
}
