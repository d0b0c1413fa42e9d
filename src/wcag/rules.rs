//! WCAG rule implementations over the accessibility tree
//!
//! Each rule is a pure function from the tree to a list of issues. Rules
//! iterate nodes in document order, so issue order is stable per page.

use crate::accessibility::AxTree;

use super::types::{Impact, Issue, IssueType, RuleMetadata, WcagLevel};

pub const TEXT_ALTERNATIVES: RuleMetadata = RuleMetadata {
    code: "1.1.1",
    name: "Non-text Content",
    level: WcagLevel::A,
    impact: Impact::Serious,
    help_url: "https://www.w3.org/WAI/WCAG21/Understanding/non-text-content.html",
};

pub const NAME_ROLE_VALUE: RuleMetadata = RuleMetadata {
    code: "4.1.2",
    name: "Name, Role, Value",
    level: WcagLevel::A,
    impact: Impact::Critical,
    help_url: "https://www.w3.org/WAI/WCAG21/Understanding/name-role-value.html",
};

pub const PAGE_TITLED: RuleMetadata = RuleMetadata {
    code: "2.4.2",
    name: "Page Titled",
    level: WcagLevel::A,
    impact: Impact::Serious,
    help_url: "https://www.w3.org/WAI/WCAG21/Understanding/page-titled.html",
};

pub const LINK_PURPOSE: RuleMetadata = RuleMetadata {
    code: "2.4.4",
    name: "Link Purpose (In Context)",
    level: WcagLevel::A,
    impact: Impact::Moderate,
    help_url: "https://www.w3.org/WAI/WCAG21/Understanding/link-purpose-in-context.html",
};

pub const BYPASS_BLOCKS: RuleMetadata = RuleMetadata {
    code: "2.4.1",
    name: "Bypass Blocks",
    level: WcagLevel::A,
    impact: Impact::Moderate,
    help_url: "https://www.w3.org/WAI/WCAG21/Understanding/bypass-blocks.html",
};

pub const LANGUAGE_OF_PAGE: RuleMetadata = RuleMetadata {
    code: "3.1.1",
    name: "Language of Page",
    level: WcagLevel::A,
    impact: Impact::Serious,
    help_url: "https://www.w3.org/WAI/WCAG21/Understanding/language-of-page.html",
};

pub const HEADINGS_AND_LABELS: RuleMetadata = RuleMetadata {
    code: "2.4.6",
    name: "Headings and Labels",
    level: WcagLevel::AA,
    impact: Impact::Serious,
    help_url: "https://www.w3.org/WAI/WCAG21/Understanding/headings-and-labels.html",
};

pub const SECTION_HEADINGS: RuleMetadata = RuleMetadata {
    code: "2.4.10",
    name: "Section Headings",
    level: WcagLevel::AAA,
    impact: Impact::Minor,
    help_url: "https://www.w3.org/WAI/WCAG21/Understanding/section-headings.html",
};

fn issue_for(meta: &RuleMetadata, issue_type: IssueType, message: impl Into<String>) -> Issue {
    Issue::new(meta.code, issue_type, message)
        .with_impact(meta.impact)
        .with_help_url(meta.help_url)
}

/// 1.1.1: every image exposes an accessible name.
pub fn check_text_alternatives(tree: &AxTree) -> Vec<Issue> {
    let mut issues = Vec::new();
    for image in tree.images() {
        if image.ignored {
            // Intentionally hidden from assistive technology.
            continue;
        }
        if !image.has_name() {
            issues.push(
                issue_for(
                    &TEXT_ALTERNATIVES,
                    IssueType::Error,
                    "Image is missing alternative text",
                )
                .with_selector(image.locator())
                .with_context(image.context_snippet())
                .with_help(
                    "Add an alt attribute describing the image, or alt=\"\" if decorative",
                ),
            );
        }
    }
    issues
}

/// 4.1.2: buttons and form controls expose an accessible name.
pub fn check_control_labels(tree: &AxTree) -> Vec<Issue> {
    let mut issues = Vec::new();

    for button in tree.buttons() {
        if !button.ignored && !button.has_name() {
            issues.push(
                issue_for(&NAME_ROLE_VALUE, IssueType::Error, "Button has no accessible name")
                    .with_selector(button.locator())
                    .with_context(button.context_snippet())
                    .with_help("Add visible text, aria-label, or aria-labelledby"),
            );
        }
    }

    for control in tree.form_controls() {
        if !control.ignored && !control.has_name() {
            issues.push(
                issue_for(
                    &NAME_ROLE_VALUE,
                    IssueType::Error,
                    format!(
                        "Form control ({}) has no label",
                        control.role.as_deref().unwrap_or("control")
                    ),
                )
                .with_selector(control.locator())
                .with_context(control.context_snippet())
                .with_help("Associate a <label> element or add aria-label"),
            );
        }
    }

    issues
}

/// 2.4.2: the page has a non-empty title.
pub fn check_page_title(tree: &AxTree) -> Vec<Issue> {
    let titled = tree.root().is_some_and(|root| root.has_name());
    if titled {
        return Vec::new();
    }
    vec![issue_for(&PAGE_TITLED, IssueType::Error, "Page has no title")
        .with_selector("document".to_string())
        .with_help("Add a descriptive <title> element")]
}

/// 2.4.4: link text describes the link target.
pub fn check_link_purpose(tree: &AxTree) -> Vec<Issue> {
    const GENERIC: &[&str] = &[
        "click here",
        "here",
        "read more",
        "more",
        "link",
        "learn more",
    ];

    let mut issues = Vec::new();
    for link in tree.links() {
        if link.ignored {
            continue;
        }
        match link.name.as_deref().map(str::trim) {
            None | Some("") => {
                issues.push(
                    issue_for(&LINK_PURPOSE, IssueType::Error, "Link has no accessible name")
                        .with_selector(link.locator())
                        .with_context(link.context_snippet())
                        .with_help("Give the link text that describes its target"),
                );
            }
            Some(text) if GENERIC.contains(&text.to_lowercase().as_str()) => {
                issues.push(
                    issue_for(
                        &LINK_PURPOSE,
                        IssueType::Warning,
                        format!("Link text \"{}\" does not describe its target", text),
                    )
                    .with_selector(link.locator())
                    .with_context(link.context_snippet())
                    .with_impact(Impact::Moderate)
                    .with_help("Replace generic link text with a descriptive phrase"),
                );
            }
            _ => {}
        }
    }
    issues
}

/// 2.4.1: the page offers landmarks to bypass repeated blocks.
pub fn check_bypass_blocks(tree: &AxTree) -> Vec<Issue> {
    if !tree.landmarks().is_empty() {
        return Vec::new();
    }
    vec![issue_for(
        &BYPASS_BLOCKS,
        IssueType::Warning,
        "No landmark regions found (main, navigation, banner, ...)",
    )
    .with_selector("document".to_string())
    .with_help("Use landmark elements or roles so keyboard users can skip blocks")]
}

/// 3.1.1: the document declares its language.
pub fn check_language(tree: &AxTree) -> Vec<Issue> {
    let has_language = tree
        .root()
        .and_then(|root| root.property("language"))
        .and_then(|v| v.as_str())
        .is_some_and(|lang| !lang.is_empty());

    if has_language {
        return Vec::new();
    }
    vec![issue_for(
        &LANGUAGE_OF_PAGE,
        IssueType::Warning,
        "Document language is not exposed",
    )
    .with_selector("html".to_string())
    .with_help("Set the lang attribute on the <html> element")]
}

/// 2.4.6 (AA): headings exist and carry text.
pub fn check_headings(tree: &AxTree) -> Vec<Issue> {
    let headings = tree.headings();
    if headings.is_empty() {
        return vec![issue_for(
            &HEADINGS_AND_LABELS,
            IssueType::Error,
            "Page has no headings",
        )
        .with_selector("document".to_string())
        .with_help("Structure the page with at least one heading")];
    }

    let mut issues = Vec::new();
    for heading in &headings {
        if !heading.ignored && !heading.has_name() {
            issues.push(
                issue_for(&HEADINGS_AND_LABELS, IssueType::Warning, "Heading is empty")
                    .with_selector(heading.locator())
                    .with_context(heading.context_snippet())
                    .with_impact(Impact::Moderate)
                    .with_help("Remove empty headings or give them text"),
            );
        }
    }

    // Hierarchy check: a jump of more than one level loses document
    // structure for screen reader navigation.
    let mut last_level: Option<u8> = None;
    for heading in &headings {
        if let Some(level) = heading.heading_level() {
            if let Some(prev) = last_level {
                if level > prev + 1 {
                    issues.push(
                        issue_for(
                            &HEADINGS_AND_LABELS,
                            IssueType::Warning,
                            format!("Heading level jumps from h{} to h{}", prev, level),
                        )
                        .with_selector(heading.locator())
                        .with_context(heading.context_snippet())
                        .with_impact(Impact::Moderate)
                        .with_help("Keep heading levels sequential"),
                    );
                }
            }
            last_level = Some(level);
        }
    }

    issues
}

/// 2.4.10 (AAA): landmark regions are introduced by headings.
pub fn check_section_headings(tree: &AxTree) -> Vec<Issue> {
    let mut issues = Vec::new();
    for landmark in tree.landmarks() {
        if landmark.role.as_deref() != Some("region") {
            continue;
        }
        let has_heading_child = landmark.child_ids.iter().any(|id| {
            tree.get(id)
                .is_some_and(|child| child.role.as_deref() == Some("heading"))
        });
        if !has_heading_child {
            issues.push(
                issue_for(
                    &SECTION_HEADINGS,
                    IssueType::Notice,
                    "Region is not introduced by a heading",
                )
                .with_selector(landmark.locator())
                .with_context(landmark.context_snippet())
                .with_help("Start each content section with a heading"),
            );
        }
    }
    issues
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accessibility::{AxNode, AxTree};

    fn node(id: &str, role: &str, name: Option<&str>) -> AxNode {
        AxNode {
            node_id: id.to_string(),
            ignored: false,
            role: Some(role.to_string()),
            name: name.map(String::from),
            description: None,
            value: None,
            properties: vec![],
            child_ids: vec![],
            parent_id: None,
        }
    }

    #[test]
    fn test_image_without_alt_flagged() {
        let tree = AxTree::from_nodes(vec![
            node("1", "WebArea", Some("Page")),
            node("2", "image", None),
            node("3", "image", Some("Logo")),
        ]);

        let issues = check_text_alternatives(&tree);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].rule_code, "1.1.1");
        assert!(issues[0].is_error());
    }

    #[test]
    fn test_ignored_image_skipped() {
        let mut image = node("2", "image", None);
        image.ignored = true;
        let tree = AxTree::from_nodes(vec![node("1", "WebArea", Some("Page")), image]);
        assert!(check_text_alternatives(&tree).is_empty());
    }

    #[test]
    fn test_unlabeled_button_flagged() {
        let tree = AxTree::from_nodes(vec![
            node("1", "WebArea", Some("Page")),
            node("2", "button", None),
            node("3", "textbox", None),
        ]);

        let issues = check_control_labels(&tree);
        assert_eq!(issues.len(), 2);
        assert!(issues.iter().all(|i| i.rule_code == "4.1.2"));
    }

    #[test]
    fn test_missing_title_flagged() {
        let tree = AxTree::from_nodes(vec![node("1", "WebArea", None)]);
        let issues = check_page_title(&tree);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].rule_code, "2.4.2");
    }

    #[test]
    fn test_generic_link_text_warned() {
        let tree = AxTree::from_nodes(vec![
            node("1", "WebArea", Some("Page")),
            node("2", "link", Some("Click here")),
            node("3", "link", Some("Pricing details")),
        ]);

        let issues = check_link_purpose(&tree);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].issue_type, IssueType::Warning);
    }

    #[test]
    fn test_no_headings_is_error() {
        let tree = AxTree::from_nodes(vec![node("1", "WebArea", Some("Page"))]);
        let issues = check_headings(&tree);
        assert_eq!(issues.len(), 1);
        assert!(issues[0].is_error());
        assert_eq!(issues[0].rule_code, "2.4.6");
    }

    #[test]
    fn test_heading_level_jump_warned() {
        let mut h1 = node("2", "heading", Some("Title"));
        h1.properties.push(crate::accessibility::AxProperty {
            name: "level".to_string(),
            value: serde_json::json!(1),
        });
        let mut h4 = node("3", "heading", Some("Deep"));
        h4.properties.push(crate::accessibility::AxProperty {
            name: "level".to_string(),
            value: serde_json::json!(4),
        });
        let tree = AxTree::from_nodes(vec![node("1", "WebArea", Some("Page")), h1, h4]);

        let issues = check_headings(&tree);
        assert_eq!(issues.len(), 1);
        assert!(issues[0].message.contains("h1"));
        assert!(issues[0].message.contains("h4"));
    }

    #[test]
    fn test_no_landmarks_warned() {
        let tree = AxTree::from_nodes(vec![node("1", "WebArea", Some("Page"))]);
        let issues = check_bypass_blocks(&tree);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].rule_code, "2.4.1");
    }
}
