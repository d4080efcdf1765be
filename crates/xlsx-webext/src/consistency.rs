use std::fmt;
use std::path::Path;

use crate::layout::{
    descriptor_part_name, part_names_equal, part_path, CONTENT_TYPES_PART,
    REL_TYPE_WEBEXTENSION_TASKPANES, ROOT_RELS_PART, TASKPANES_PART, TASKPANES_RELS_PART,
};
use crate::relationships::{parse_relationships, resolve_target, RelationshipIndex};
use crate::fs::read_optional;
use crate::scan::descriptor_part_files;
use crate::xml::{parse_part, part_text};
use crate::WebExtError;

/// A broken link in the web extension part graph of an extracted package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsistencyIssue {
    /// A task pane references a relationship id missing from `taskpanes.xml.rels`.
    UnknownRelationshipId { rel_id: String },
    /// A relationship in `taskpanes.xml.rels` points at a part that does not exist.
    MissingTarget { rel_id: String, target: String },
    /// A descriptor part has no `Override` in `[Content_Types].xml`.
    MissingContentType { part: String },
    /// No descriptor is left but `part` still exists with entries.
    OrphanedPart { part: String },
    /// No descriptor is left but `_rels/.rels` still declares the task pane subsystem.
    OrphanedSubsystemRelationship { rel_id: String },
}

impl fmt::Display for ConsistencyIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsistencyIssue::UnknownRelationshipId { rel_id } => {
                write!(f, "task pane references unknown relationship {rel_id}")
            }
            ConsistencyIssue::MissingTarget { rel_id, target } => {
                write!(f, "relationship {rel_id} targets missing part {target}")
            }
            ConsistencyIssue::MissingContentType { part } => {
                write!(f, "{part} has no content type override")
            }
            ConsistencyIssue::OrphanedPart { part } => {
                write!(f, "{part} still has entries but no web extension remains")
            }
            ConsistencyIssue::OrphanedSubsystemRelationship { rel_id } => write!(
                f,
                "{ROOT_RELS_PART} relationship {rel_id} declares task panes but no web extension remains"
            ),
        }
    }
}

/// Check the web extension parts of an extracted package for dangling references.
///
/// Verifies that every task pane resolves through `taskpanes.xml.rels` to an existing descriptor
/// part with a content type override, and that a package without descriptors no longer
/// advertises task panes.
pub fn check_consistency(root: &Path) -> Result<Vec<ConsistencyIssue>, WebExtError> {
    let mut issues = Vec::new();
    let descriptors = descriptor_part_files(root)?;

    let rels_xml = read_optional(&part_path(root, TASKPANES_RELS_PART))?;
    let taskpanes_xml = read_optional(&part_path(root, TASKPANES_PART))?;
    let index = match &rels_xml {
        Some(rels) => RelationshipIndex::from_parts(rels, taskpanes_xml.as_deref())?,
        None => RelationshipIndex::from_parts(b"", taskpanes_xml.as_deref())?,
    };

    for rel_id in index.referenced_ids() {
        if index.relationship(rel_id).is_none() {
            issues.push(ConsistencyIssue::UnknownRelationshipId {
                rel_id: rel_id.to_string(),
            });
        }
    }

    for rel in index.relationships() {
        let target = resolve_target(TASKPANES_PART, &rel.target);
        if !part_path(root, &target).is_file() {
            issues.push(ConsistencyIssue::MissingTarget {
                rel_id: rel.id.clone(),
                target,
            });
        }
    }

    let overrides = content_type_overrides(root)?;
    for file in &descriptors {
        let part = descriptor_part_name(file);
        if !overrides.iter().any(|name| part_names_equal(name, &part)) {
            issues.push(ConsistencyIssue::MissingContentType { part });
        }
    }

    if descriptors.is_empty() {
        if index.taskpane_count() > 0 {
            issues.push(ConsistencyIssue::OrphanedPart {
                part: TASKPANES_PART.to_string(),
            });
        }
        if !index.relationships().is_empty() {
            issues.push(ConsistencyIssue::OrphanedPart {
                part: TASKPANES_RELS_PART.to_string(),
            });
        }
        if let Some(root_rels) = read_optional(&part_path(root, ROOT_RELS_PART))? {
            for rel in parse_relationships(&root_rels, ROOT_RELS_PART)? {
                if rel.type_.trim() == REL_TYPE_WEBEXTENSION_TASKPANES {
                    issues.push(ConsistencyIssue::OrphanedSubsystemRelationship { rel_id: rel.id });
                }
            }
        }
    }

    Ok(issues)
}

fn content_type_overrides(root: &Path) -> Result<Vec<String>, WebExtError> {
    let Some(bytes) = read_optional(&part_path(root, CONTENT_TYPES_PART))? else {
        return Ok(Vec::new());
    };
    let xml = part_text(&bytes, CONTENT_TYPES_PART)?;
    let Some(doc) = parse_part(xml, CONTENT_TYPES_PART)? else {
        return Ok(Vec::new());
    };
    Ok(doc
        .descendants()
        .filter(|n| n.is_element() && n.tag_name().name() == "Override")
        .filter_map(|n| n.attribute("PartName"))
        .map(str::to_string)
        .collect())
}
