use std::collections::BTreeMap;

use crate::layout::{part_names_equal, TASKPANES_PART, TASKPANES_RELS_PART};
use crate::xml::{parse_part, part_text};
use crate::WebExtError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub id: String,
    pub type_: String,
    pub target: String,
}

pub fn parse_relationships(xml: &[u8], part_name: &str) -> Result<Vec<Relationship>, WebExtError> {
    let xml = part_text(xml, part_name)?;
    // A relationships part whose container was stripped is just a prolog.
    let Some(doc) = parse_part(xml, part_name)? else {
        return Ok(Vec::new());
    };

    let mut rels = Vec::new();
    for node in doc.descendants().filter(|n| n.is_element()) {
        if node.tag_name().name() != "Relationship" {
            continue;
        }

        let Some(id) = node.attribute("Id") else {
            continue;
        };
        let type_ = node.attribute("Type").unwrap_or_default().to_string();
        let target = node.attribute("Target").unwrap_or_default().to_string();
        rels.push(Relationship {
            id: id.to_string(),
            type_,
            target,
        });
    }

    Ok(rels)
}

/// Resolve a relationship `target` against the part that owns the relationships file.
pub(crate) fn resolve_target(source_part: &str, target: &str) -> String {
    let target = target.split('#').next().unwrap_or(target);
    let joined = match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => {
            let base_dir = source_part.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("");
            format!("{base_dir}/{target}")
        }
    };

    let mut segments: Vec<&str> = Vec::new();
    for segment in joined.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

/// Links between descriptor files, relationship ids and task panes for one package.
///
/// Built from `xl/webextensions/_rels/taskpanes.xml.rels` and `xl/webextensions/taskpanes.xml`.
/// Task panes are identified by their position among the registry root's element children.
#[derive(Debug, Clone, Default)]
pub struct RelationshipIndex {
    relationships: Vec<Relationship>,
    taskpanes_by_rel_id: BTreeMap<String, Vec<usize>>,
    taskpane_count: usize,
}

impl RelationshipIndex {
    pub fn from_parts(
        taskpanes_rels_xml: &[u8],
        taskpanes_xml: Option<&[u8]>,
    ) -> Result<Self, WebExtError> {
        let relationships = parse_relationships(taskpanes_rels_xml, TASKPANES_RELS_PART)?;
        let (taskpanes_by_rel_id, taskpane_count) = match taskpanes_xml {
            Some(xml) => taskpane_references(xml)?,
            None => (BTreeMap::new(), 0),
        };
        Ok(Self {
            relationships,
            taskpanes_by_rel_id,
            taskpane_count,
        })
    }

    pub fn relationships(&self) -> &[Relationship] {
        &self.relationships
    }

    pub fn taskpane_count(&self) -> usize {
        self.taskpane_count
    }

    /// Ids of every relationship whose target is the descriptor file `file_name`, in document
    /// order.
    ///
    /// Empty when the descriptor is detached (no relationship points at it).
    pub fn relationship_ids_for(&self, file_name: &str) -> Vec<&str> {
        let part_name = crate::layout::descriptor_part_name(file_name);
        self.relationships
            .iter()
            .filter(|rel| part_names_equal(&resolve_target(TASKPANES_PART, &rel.target), &part_name))
            .map(|rel| rel.id.as_str())
            .collect()
    }

    pub fn relationship(&self, id: &str) -> Option<&Relationship> {
        self.relationships.iter().find(|rel| rel.id == id)
    }

    /// Positions of the task panes that reference `rel_id`.
    pub fn taskpanes_referencing(&self, rel_id: &str) -> &[usize] {
        self.taskpanes_by_rel_id
            .get(rel_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Every relationship id referenced from a task pane.
    pub fn referenced_ids(&self) -> impl Iterator<Item = &str> {
        self.taskpanes_by_rel_id.keys().map(String::as_str)
    }
}

fn taskpane_references(xml: &[u8]) -> Result<(BTreeMap<String, Vec<usize>>, usize), WebExtError> {
    let xml = part_text(xml, TASKPANES_PART)?;
    let mut refs: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    let Some(doc) = parse_part(xml, TASKPANES_PART)? else {
        return Ok((refs, 0));
    };

    let mut count = 0;
    for (index, taskpane) in doc
        .root_element()
        .children()
        .filter(|n| n.is_element())
        .enumerate()
    {
        count += 1;
        for node in taskpane.descendants().filter(|n| n.is_element()) {
            if node.tag_name().name() != "webextensionref" {
                continue;
            }
            // `r:id`, namespaced to the officeDocument relationships namespace.
            let rel_id = node
                .attributes()
                .find(|attr| attr.name() == "id" && attr.namespace().is_some())
                .map(|attr| attr.value());
            if let Some(rel_id) = rel_id {
                let positions = refs.entry(rel_id.to_string()).or_default();
                if !positions.contains(&index) {
                    positions.push(index);
                }
            }
        }
    }
    Ok((refs, count))
}
