//! Placeholder substitution for message templates.

use std::sync::OnceLock;

use regex::{Captures, Regex};

use crate::models::stay::{Cabin, Guest, Stay};

/// Date format used for check-in/check-out placeholders.
const DATE_FORMAT: &str = "%d/%m/%Y";

/// Data available to a template.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateContext<'a> {
    /// Tenant display name.
    pub property_name: Option<&'a str>,
    /// Recipient guest.
    pub guest: Option<&'a Guest>,
    /// Assigned cabin, when resolved.
    pub cabin: Option<&'a Cabin>,
    /// Originating stay.
    pub stay: Option<&'a Stay>,
}

impl TemplateContext<'_> {
    fn lookup(&self, key: &str) -> Option<String> {
        match key {
            "guest_name" => self.guest.map(|g| g.full_name.clone()),
            "guest_first_name" => self.guest.map(|g| g.first_name().to_owned()),
            "cabin_name" => self.cabin.map(|c| c.name.clone()),
            "property_name" => self.property_name.map(str::to_owned),
            "check_in" => self.stay.map(|s| s.check_in.format(DATE_FORMAT).to_string()),
            "check_out" => self.stay.map(|s| s.check_out.format(DATE_FORMAT).to_string()),
            "stay_id" => self.stay.map(|s| s.id.clone()),
            _ => None,
        }
    }
}

fn placeholder_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        #[allow(clippy::expect_used)]
        Regex::new(r"\{\{\s*([a-z_]+)\s*\}\}").expect("placeholder regex is valid")
    })
}

/// Substitute `{{placeholder}}` markers in `body`.
///
/// Unknown placeholders, or placeholders whose data is missing, are left
/// untouched.
#[must_use]
pub fn render(body: &str, ctx: &TemplateContext<'_>) -> String {
    placeholder_regex()
        .replace_all(body, |caps: &Captures<'_>| {
            ctx.lookup(&caps[1]).unwrap_or_else(|| caps[0].to_owned())
        })
        .into_owned()
}
