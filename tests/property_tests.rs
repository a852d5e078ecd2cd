//! Property-Based Tests for the installer
//!
//! Uses proptest for invariants of the text-processing layers:
//! - Template rendering substitutes exactly and fails closed
//! - Settings documents keep untouched content byte for byte
//! - Backup names sort chronologically

use chrono::NaiveDate;
use nbdns::steps::backup_name;
use nbdns::{InstallModule, Literal, SettingsDocument, Template};
use proptest::prelude::*;
use std::collections::HashMap;
use std::path::Path;

// =============================================================================
// Template Property Tests
// =============================================================================

/// Text that never contains a `$`.
fn plain_text() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 .,;:{}\\[\\]\n_-]{0,60}"
}

fn identifier() -> impl Strategy<Value = String> {
    "[a-z_][a-z0-9_]{0,12}"
}

proptest! {
    /// Text without placeholders renders unchanged
    #[test]
    fn template_plain_text_is_identity(text in plain_text()) {
        let rendered = Template::parse(&text).unwrap().render(&HashMap::new()).unwrap();
        prop_assert_eq!(rendered, text);
    }

    /// `${name}` is replaced by exactly the supplied value
    #[test]
    fn template_substitutes_value(
        before in plain_text(),
        after in plain_text(),
        name in identifier(),
        value in "[ -~]{0,30}",
    ) {
        let source = format!("{}${{{}}}{}", before, name, after);
        let values = HashMap::from([(name, value.clone())]);
        let rendered = Template::parse(&source).unwrap().render(&values).unwrap();
        prop_assert_eq!(rendered, format!("{}{}{}", before, value, after));
    }

    /// A placeholder without a value always fails
    #[test]
    fn template_missing_value_fails(before in plain_text(), name in identifier()) {
        let source = format!("{}${{{}}}", before, name);
        let result = Template::parse(&source).unwrap().render(&HashMap::new());
        prop_assert!(result.is_err());
    }

    /// `$$` escapes survive as a single `$`
    #[test]
    fn template_dollar_escape(text in plain_text()) {
        let source = format!("$${}$$", text);
        let rendered = Template::parse(&source).unwrap().render(&HashMap::new()).unwrap();
        prop_assert_eq!(rendered, format!("${}$", text));
    }
}

// =============================================================================
// Settings Document Property Tests
// =============================================================================

/// Comment or blank lines that the parser must pass through.
fn raw_line() -> impl Strategy<Value = String> {
    prop_oneof![
        "# [ -~]{0,40}",
        Just(String::new()),
        "    [a-z]{1,10}\\(\\)",
    ]
}

proptest! {
    /// Parse then render without edits reproduces the input
    #[test]
    fn settings_render_is_lossless(
        lines in prop::collection::vec(raw_line(), 0..8),
        token in "[a-zA-Z0-9]{0,20}",
    ) {
        let mut source = lines.join("\n");
        source.push_str(&format!("\nNETBOX_TOKEN = \"{}\"  # keep quotes\n", token));
        let doc = SettingsDocument::parse(&source).unwrap();
        prop_assert_eq!(doc.render(), source);
    }

    /// Editing one assignment leaves every other line intact
    #[test]
    fn settings_edit_is_local(
        lines in prop::collection::vec(raw_line(), 0..8),
        token in "[a-zA-Z0-9]{0,20}",
    ) {
        let header = lines.join("\n");
        let source = format!("{}\nNETBOX_TOKEN = ''\nPLUGINS = ['a']\n", header);
        let mut doc = SettingsDocument::parse(&source).unwrap();
        doc.set("NETBOX_TOKEN", Literal::str(token.clone())).unwrap();

        let rendered = doc.render();
        let expected_prefix = format!("{}\n", header);
        prop_assert!(rendered.starts_with(&expected_prefix));
        prop_assert!(rendered.ends_with("PLUGINS = ['a']\n"));
        let reparsed = SettingsDocument::parse(&rendered).unwrap();
        prop_assert_eq!(reparsed.get("NETBOX_TOKEN"), Some(&Literal::str(token)));
    }

    /// Adding a plugin twice changes the document once
    #[test]
    fn settings_list_add_is_idempotent(plugin in "[a-z_]{1,15}") {
        let mut doc = SettingsDocument::parse("PLUGINS = []\n").unwrap();
        prop_assert!(doc.list_add_unique("PLUGINS", Literal::str(plugin.clone())).unwrap());
        let once = doc.render();
        prop_assert!(!doc.list_add_unique("PLUGINS", Literal::str(plugin)).unwrap());
        prop_assert_eq!(doc.render(), once);
    }
}

// =============================================================================
// Backup Name Property Tests
// =============================================================================

proptest! {
    /// Lexical order of backup names equals chronological order
    #[test]
    fn backup_names_sort_chronologically(
        a in 0i64..4_000_000_000,
        b in 0i64..4_000_000_000,
    ) {
        let epoch = NaiveDate::from_ymd_opt(2000, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
        let ta = epoch + chrono::Duration::seconds(a);
        let tb = epoch + chrono::Duration::seconds(b);
        let na = backup_name(Path::new("/etc/named.conf"), ta).unwrap();
        let nb = backup_name(Path::new("/etc/named.conf"), tb).unwrap();
        prop_assert_eq!(na.cmp(&nb), ta.cmp(&tb));
        prop_assert!(na.to_string_lossy().starts_with("named.conf."));
        prop_assert_eq!(na.len(), "named.conf.".len() + 15);
    }
}

// =============================================================================
// InstallModule Enum Property Tests
// =============================================================================

fn module_strategy() -> impl Strategy<Value = InstallModule> {
    prop_oneof![
        Just(InstallModule::PipPackages),
        Just(InstallModule::Dns),
        Just(InstallModule::Octodns),
        Just(InstallModule::Ipdns),
    ]
}

proptest! {
    /// InstallModule: to_string → parse round-trip is identity
    #[test]
    fn install_module_roundtrip(module in module_strategy()) {
        let parsed: InstallModule = module.to_string().parse().expect("Should parse");
        prop_assert_eq!(module, parsed);
    }
}
