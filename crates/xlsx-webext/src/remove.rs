use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::Path;

use crate::descriptor::descriptor_identity;
use crate::diagnostics::{DiagnosticEvent, Diagnostics, RemovalStep};
use crate::fs::{read_optional, replace_part};
use crate::layout::{
    descriptor_part_name, part_names_equal, part_path, webextensions_dir, CONTENT_TYPES_PART,
    REL_TYPE_WEBEXTENSION_TASKPANES, ROOT_RELS_PART, TASKPANES_PART, TASKPANES_RELS_PART,
};
use crate::relationships::RelationshipIndex;
use crate::scan::descriptor_part_files;
use crate::xml::{attribute_value, local_name, strip_child_elements};
use crate::WebExtError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalStatus {
    Success,
    /// At least one step failed; the failure is described in the report's diagnostics.
    PartialFailure,
}

#[derive(Debug, Default)]
pub struct RemovalReport {
    /// Descriptor files deleted because their identity was requested.
    pub removed_parts: Vec<String>,
    /// Descriptor files deleted only because the whole `xl/webextensions/` tree was dropped.
    pub collateral_parts: Vec<String>,
    /// `xl/webextensions/` was deleted as a whole.
    pub subtree_removed: bool,
    pub diagnostics: Vec<DiagnosticEvent>,
}

impl RemovalReport {
    pub fn status(&self) -> RemovalStatus {
        if self
            .diagnostics
            .iter()
            .any(|event| event.level == log::Level::Error)
        {
            RemovalStatus::PartialFailure
        } else {
            RemovalStatus::Success
        }
    }

    /// Nothing in the package was touched.
    pub fn is_noop(&self) -> bool {
        self.removed_parts.is_empty() && !self.subtree_removed
    }
}

/// Remove the web extensions whose identity is in `ids` from an extracted package.
///
/// See [`remove_descriptors_with_diagnostics`].
pub fn remove_descriptors<I, S>(root: &Path, ids: I) -> RemovalReport
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    remove_descriptors_with_diagnostics(root, ids, Diagnostics::new())
}

/// Remove the web extensions whose identity is in `ids` from an extracted package, recording
/// events into `diagnostics`.
///
/// Deletes the matching descriptor parts, then repairs `taskpanes.xml`, its relationships part,
/// `[Content_Types].xml` and `_rels/.rels` so no index references a deleted part. When every
/// descriptor goes, `xl/webextensions/` is deleted as a whole and the package-level
/// `webextensiontaskpanes` relationship is dropped.
///
/// Each step is attempted independently: a failing step is recorded as an error event (making the
/// report a [`RemovalStatus::PartialFailure`]) and the remaining steps still run. If the task pane
/// repair fails, the whole `xl/webextensions/` tree is removed instead of leaving it half-edited.
pub fn remove_descriptors_with_diagnostics<I, S>(
    root: &Path,
    ids: I,
    mut diagnostics: Diagnostics,
) -> RemovalReport
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let requested: BTreeSet<String> = ids.into_iter().map(|id| id.as_ref().to_string()).collect();
    let mut report = RemovalReport::default();

    let dir = webextensions_dir(root);
    if requested.is_empty() || !dir.is_dir() {
        diagnostics.debug(RemovalStep::Enumerate, "no web extensions to remove");
        report.diagnostics = diagnostics.into_events();
        return report;
    }

    let all_files = match descriptor_part_files(root) {
        Ok(files) => files,
        Err(err) => {
            diagnostics.error(
                RemovalStep::Enumerate,
                format!("failed to list descriptor parts: {err}"),
            );
            report.diagnostics = diagnostics.into_events();
            return report;
        }
    };

    let mut marked = Vec::new();
    for file in &all_files {
        let bytes = match fs::read(dir.join(file)) {
            Ok(bytes) => bytes,
            Err(err) => {
                diagnostics.warn(RemovalStep::Enumerate, format!("cannot read {file}: {err}"));
                continue;
            }
        };
        let Some(id) = descriptor_identity(&String::from_utf8_lossy(&bytes)) else {
            continue;
        };
        if requested.contains(&id) {
            diagnostics.debug(RemovalStep::Enumerate, format!("{file} holds {id}"));
            marked.push(file.clone());
        }
    }

    if marked.is_empty() {
        diagnostics.debug(
            RemovalStep::Enumerate,
            "none of the requested web extensions are present",
        );
        report.diagnostics = diagnostics.into_events();
        return report;
    }

    for file in &marked {
        match fs::remove_file(dir.join(file)) {
            Ok(()) => {
                diagnostics.info(RemovalStep::DeleteParts, format!("deleted {file}"));
                report.removed_parts.push(file.clone());
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                report.removed_parts.push(file.clone());
            }
            Err(err) => {
                diagnostics.error(
                    RemovalStep::DeleteParts,
                    format!("failed to delete {file}: {err}"),
                );
            }
        }
    }

    if marked.len() == all_files.len() {
        report.subtree_removed = remove_subtree(&dir, &mut diagnostics);
    } else if let Err(err) = detach_from_taskpanes(root, &report.removed_parts, &mut diagnostics) {
        diagnostics.error(
            RemovalStep::Taskpanes,
            format!("failed to update task panes ({err}); removing all web extensions instead"),
        );
        report.subtree_removed = remove_subtree(&dir, &mut diagnostics);
    }

    let mut removed_part_names: Vec<String> = report
        .removed_parts
        .iter()
        .map(|file| descriptor_part_name(file))
        .collect();
    if report.subtree_removed {
        report.collateral_parts = all_files
            .iter()
            .filter(|file| !marked.contains(*file))
            .cloned()
            .collect();
        if !report.collateral_parts.is_empty() {
            diagnostics.warn(
                RemovalStep::RemoveSubtree,
                format!(
                    "also removed unrequested web extensions: {}",
                    report.collateral_parts.join(", ")
                ),
            );
        }
        removed_part_names = all_files.iter().map(|file| descriptor_part_name(file)).collect();
        removed_part_names.push(TASKPANES_PART.to_string());
    }

    if let Err(err) = remove_content_type_overrides(root, &removed_part_names, &mut diagnostics) {
        diagnostics.error(
            RemovalStep::ContentTypes,
            format!("failed to update {CONTENT_TYPES_PART}: {err}"),
        );
    }

    if let Err(err) = remove_subsystem_relationship(root, &mut diagnostics) {
        diagnostics.error(
            RemovalStep::RootRelationships,
            format!("failed to update {ROOT_RELS_PART}: {err}"),
        );
    }

    report.diagnostics = diagnostics.into_events();
    report
}

fn remove_subtree(dir: &Path, diagnostics: &mut Diagnostics) -> bool {
    match fs::remove_dir_all(dir) {
        Ok(()) => {
            diagnostics.info(RemovalStep::RemoveSubtree, "removed xl/webextensions");
            true
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => true,
        Err(err) => {
            diagnostics.error(
                RemovalStep::RemoveSubtree,
                format!("failed to remove xl/webextensions: {err}"),
            );
            false
        }
    }
}

/// Drop the task panes and relationships that pointed at `removed_files`.
fn detach_from_taskpanes(
    root: &Path,
    removed_files: &[String],
    diagnostics: &mut Diagnostics,
) -> Result<(), WebExtError> {
    let rels_path = part_path(root, TASKPANES_RELS_PART);
    let taskpanes_path = part_path(root, TASKPANES_PART);
    let taskpanes_xml = read_optional(&taskpanes_path)?;
    let Some(rels_xml) = read_optional(&rels_path)? else {
        let hosted = match &taskpanes_xml {
            Some(xml) => {
                RelationshipIndex::from_parts(b"", Some(xml.as_slice()))?.taskpane_count()
            }
            None => 0,
        };
        if hosted > 0 {
            // Task panes cannot be tied to descriptors without the relationships part.
            diagnostics.warn(
                RemovalStep::Taskpanes,
                format!("{TASKPANES_RELS_PART} is missing; {hosted} task pane(s) left as-is"),
            );
        } else {
            diagnostics.debug(
                RemovalStep::Taskpanes,
                format!("{TASKPANES_RELS_PART} is missing; nothing to detach"),
            );
        }
        return Ok(());
    };

    let index = RelationshipIndex::from_parts(&rels_xml, taskpanes_xml.as_deref())?;

    let mut rel_ids: BTreeSet<String> = BTreeSet::new();
    let mut taskpanes: BTreeSet<usize> = BTreeSet::new();
    for file in removed_files {
        let ids = index.relationship_ids_for(file);
        if ids.is_empty() {
            // Tolerated: the part is already gone, but a task pane may still reference a
            // relationship id that never resolved to it.
            diagnostics.warn(
                RemovalStep::Taskpanes,
                format!("no relationship targets {file}; task pane references left as-is"),
            );
            continue;
        }
        for rel_id in ids {
            let referencing = index.taskpanes_referencing(rel_id);
            if referencing.is_empty() {
                diagnostics.debug(
                    RemovalStep::Taskpanes,
                    format!("{rel_id} ({file}) is not hosted in a task pane"),
                );
            }
            taskpanes.extend(referencing.iter().copied());
            rel_ids.insert(rel_id.to_string());
        }
    }

    if let Some(xml) = taskpanes_xml {
        let outcome = strip_child_elements(&xml, TASKPANES_PART, |position, _| {
            Ok(taskpanes.contains(&position))
        })?;
        if outcome.changed() {
            replace_part(&taskpanes_path, &outcome.xml)?;
            diagnostics.info(
                RemovalStep::Taskpanes,
                format!(
                    "removed {} task pane(s), {} left",
                    outcome.removed, outcome.remaining
                ),
            );
        }
    }

    let outcome = strip_child_elements(&rels_xml, TASKPANES_RELS_PART, |_, e| {
        if local_name(e.name().as_ref()) != b"Relationship" {
            return Ok(false);
        }
        Ok(attribute_value(e, b"Id")?.is_some_and(|id| rel_ids.contains(&id)))
    })?;
    if outcome.changed() {
        replace_part(&rels_path, &outcome.xml)?;
        diagnostics.info(
            RemovalStep::Taskpanes,
            format!(
                "removed {} relationship(s) from {TASKPANES_RELS_PART}, {} left",
                outcome.removed, outcome.remaining
            ),
        );
    }

    Ok(())
}

fn remove_content_type_overrides(
    root: &Path,
    part_names: &[String],
    diagnostics: &mut Diagnostics,
) -> Result<(), WebExtError> {
    if part_names.is_empty() {
        return Ok(());
    }
    let path = part_path(root, CONTENT_TYPES_PART);
    let Some(xml) = read_optional(&path)? else {
        diagnostics.debug(
            RemovalStep::ContentTypes,
            format!("{CONTENT_TYPES_PART} is missing"),
        );
        return Ok(());
    };

    let outcome = strip_child_elements(&xml, CONTENT_TYPES_PART, |_, e| {
        if local_name(e.name().as_ref()) != b"Override" {
            return Ok(false);
        }
        Ok(attribute_value(e, b"PartName")?.is_some_and(|name| {
            part_names
                .iter()
                .any(|removed| part_names_equal(&name, removed))
        }))
    })?;
    if outcome.changed() {
        replace_part(&path, &outcome.xml)?;
        diagnostics.info(
            RemovalStep::ContentTypes,
            format!("removed {} override(s)", outcome.removed),
        );
    }
    Ok(())
}

/// Drop the package-level `webextensiontaskpanes` relationship once no descriptor is left.
fn remove_subsystem_relationship(
    root: &Path,
    diagnostics: &mut Diagnostics,
) -> Result<(), WebExtError> {
    let remaining = descriptor_part_files(root)?;
    if !remaining.is_empty() {
        diagnostics.debug(
            RemovalStep::RootRelationships,
            format!("{} web extension(s) remain", remaining.len()),
        );
        return Ok(());
    }

    let path = part_path(root, ROOT_RELS_PART);
    let Some(xml) = read_optional(&path)? else {
        return Ok(());
    };
    let outcome = strip_child_elements(&xml, ROOT_RELS_PART, |_, e| {
        if local_name(e.name().as_ref()) != b"Relationship" {
            return Ok(false);
        }
        Ok(attribute_value(e, b"Type")?
            .is_some_and(|type_| type_.trim() == REL_TYPE_WEBEXTENSION_TASKPANES))
    })?;
    if outcome.changed() {
        replace_part(&path, &outcome.xml)?;
        diagnostics.info(
            RemovalStep::RootRelationships,
            "removed the webextensiontaskpanes relationship",
        );
    }
    Ok(())
}
