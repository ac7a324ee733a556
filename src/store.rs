//! Frame-of-reference-specific annotation store.
//!
//! DESIGN
//! ======
//! Annotations are grouped frame of reference → tool kind → ordered list.
//! Order within a bucket is insertion order and doubles as z-order. Empty
//! buckets and empty frames are removed eagerly so that listings never report
//! a frame that holds nothing.
//!
//! Records are held as `Arc<Annotation>`. Exports clone the maps and share the
//! handles; every mutation goes through `Arc::make_mut`, which copies a record
//! the first time it is written while an export still refers to it. Neither
//! side can observe the other's writes.

#[cfg(test)]
#[path = "store_test.rs"]
mod store_test;

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::annotation::{Annotation, AnnotationUid};
use crate::error::StoreError;

/// Shared, immutable handle to a committed annotation.
pub type AnnotationHandle = Arc<Annotation>;

/// Tool kind → ordered annotations.
pub type ToolAnnotations = BTreeMap<String, Vec<AnnotationHandle>>;

/// Frame of reference → tool kind → ordered annotations.
pub type AnnotationState = BTreeMap<String, ToolAnnotations>;

/// Optional scoping for lookups by identifier.
#[derive(Debug, Clone, Copy, Default)]
pub struct LookupFilter<'a> {
    pub frame_of_reference_uid: Option<&'a str>,
    pub tool_name: Option<&'a str>,
}

impl<'a> LookupFilter<'a> {
    #[must_use]
    pub fn frame(frame_of_reference_uid: &'a str) -> Self {
        Self { frame_of_reference_uid: Some(frame_of_reference_uid), tool_name: None }
    }

    #[must_use]
    pub fn bucket(frame_of_reference_uid: &'a str, tool_name: &'a str) -> Self {
        Self { frame_of_reference_uid: Some(frame_of_reference_uid), tool_name: Some(tool_name) }
    }
}

/// Exported store contents, shaped by the scope they were exported from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "scope", content = "annotations", rename_all = "snake_case")]
pub enum StateSnapshot {
    /// Every frame (or every frame restricted to one tool).
    All(AnnotationState),
    /// All tool buckets of one frame.
    Frame(ToolAnnotations),
    /// One frame/tool bucket.
    Bucket(Vec<AnnotationHandle>),
}

impl StateSnapshot {
    fn shape(&self) -> &'static str {
        match self {
            Self::All(_) => "all",
            Self::Frame(_) => "frame",
            Self::Bucket(_) => "bucket",
        }
    }

    /// Number of annotations in the snapshot.
    #[must_use]
    pub fn annotation_count(&self) -> usize {
        match self {
            Self::All(state) => state.values().flat_map(BTreeMap::values).map(Vec::len).sum(),
            Self::Frame(tools) => tools.values().map(Vec::len).sum(),
            Self::Bucket(list) => list.len(),
        }
    }
}

/// Owner of all committed annotations.
#[derive(Debug, Default)]
pub struct AnnotationStore {
    frames: AnnotationState,
}

impl AnnotationStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an annotation to the end of its frame/tool bucket.
    ///
    /// Identifier uniqueness is the caller's responsibility.
    pub fn add(&mut self, annotation: Annotation) {
        let frame = annotation.frame_of_reference_uid().to_owned();
        let tool = annotation.tool_name().to_owned();
        debug!(uid = %annotation.annotation_uid, %frame, %tool, "annotation added");
        self.frames
            .entry(frame)
            .or_default()
            .entry(tool)
            .or_default()
            .push(Arc::new(annotation));
    }

    /// Replace a stored annotation in place, keeping its z-order position.
    ///
    /// Returns `false` if no annotation with that identifier is stored under
    /// the annotation's own frame and tool.
    pub fn replace(&mut self, annotation: Annotation) -> bool {
        let uid = annotation.annotation_uid;
        let Some(bucket) = self
            .frames
            .get_mut(annotation.frame_of_reference_uid())
            .and_then(|tools| tools.get_mut(annotation.tool_name()))
        else {
            return false;
        };
        let Some(slot) = bucket.iter_mut().find(|a| a.annotation_uid == uid) else {
            return false;
        };
        *slot = Arc::new(annotation);
        true
    }

    /// Remove an annotation by identifier, returning it if it was present.
    ///
    /// Deletes the bucket (and the frame) if it becomes empty.
    pub fn remove(&mut self, uid: AnnotationUid, filter: LookupFilter<'_>) -> Option<AnnotationHandle> {
        let (frame, tool, index) = self.locate(uid, filter)?;
        let tools = self.frames.get_mut(&frame)?;
        let bucket = tools.get_mut(&tool)?;
        let removed = bucket.remove(index);
        if bucket.is_empty() {
            tools.remove(&tool);
        }
        if tools.is_empty() {
            self.frames.remove(&frame);
        }
        debug!(%uid, %frame, %tool, "annotation removed");
        Some(removed)
    }

    /// Look up an annotation by identifier.
    #[must_use]
    pub fn get(&self, uid: AnnotationUid, filter: LookupFilter<'_>) -> Option<&AnnotationHandle> {
        let (frame, tool, index) = self.locate(uid, filter)?;
        self.frames.get(&frame)?.get(&tool)?.get(index)
    }

    /// Mutate a stored annotation, copying it first if an export shares it.
    ///
    /// Returns `false` if the annotation was not found.
    pub fn modify<F>(&mut self, uid: AnnotationUid, filter: LookupFilter<'_>, f: F) -> bool
    where
        F: FnOnce(&mut Annotation),
    {
        let Some((frame, tool, index)) = self.locate(uid, filter) else {
            return false;
        };
        let Some(handle) = self
            .frames
            .get_mut(&frame)
            .and_then(|tools| tools.get_mut(&tool))
            .and_then(|bucket| bucket.get_mut(index))
        else {
            return false;
        };
        f(Arc::make_mut(handle));
        true
    }

    /// The ordered bucket for one frame and tool.
    #[must_use]
    pub fn get_by_frame_and_tool(&self, frame_of_reference_uid: &str, tool_name: &str) -> Option<&[AnnotationHandle]> {
        self.frames
            .get(frame_of_reference_uid)?
            .get(tool_name)
            .map(Vec::as_slice)
    }

    /// All annotations under a frame, tool buckets in key order.
    pub fn annotations_in_frame<'a>(&'a self, frame_of_reference_uid: &str) -> impl Iterator<Item = &'a AnnotationHandle> + use<'a> {
        self.frames
            .get(frame_of_reference_uid)
            .into_iter()
            .flat_map(BTreeMap::values)
            .flatten()
    }

    /// Frames of reference that currently hold at least one annotation.
    #[must_use]
    pub fn list_frames_of_reference(&self) -> Vec<String> {
        self.frames.keys().cloned().collect()
    }

    /// Total number of annotations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.frames.values().flat_map(BTreeMap::values).map(Vec::len).sum()
    }

    /// Returns `true` if the store holds no annotations.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    // --- Flags ---

    pub fn set_locked(&mut self, uid: AnnotationUid, locked: bool) -> bool {
        self.modify(uid, LookupFilter::default(), |a| a.is_locked = locked)
    }

    pub fn set_visible(&mut self, uid: AnnotationUid, visible: bool) -> bool {
        self.modify(uid, LookupFilter::default(), |a| a.is_visible = visible)
    }

    pub fn set_highlighted(&mut self, uid: AnnotationUid, highlighted: bool) -> bool {
        self.modify(uid, LookupFilter::default(), |a| a.data.highlighted = highlighted)
    }

    pub fn set_invalidated(&mut self, uid: AnnotationUid, invalidated: bool) -> bool {
        self.modify(uid, LookupFilter::default(), |a| a.data.invalidated = Some(invalidated))
    }

    // --- Snapshots ---

    /// Export a structurally independent copy of the requested scope.
    ///
    /// - no arguments: the whole store;
    /// - frame only: that frame's tool buckets;
    /// - frame and tool: that bucket;
    /// - tool only: every frame, restricted to that tool.
    ///
    /// Returns `None` if a named frame or bucket does not exist.
    #[must_use]
    pub fn export_state(&self, frame_of_reference_uid: Option<&str>, tool_name: Option<&str>) -> Option<StateSnapshot> {
        match (frame_of_reference_uid, tool_name) {
            (None, None) => Some(StateSnapshot::All(self.frames.clone())),
            (Some(frame), None) => self.frames.get(frame).cloned().map(StateSnapshot::Frame),
            (Some(frame), Some(tool)) => self
                .get_by_frame_and_tool(frame, tool)
                .map(|bucket| StateSnapshot::Bucket(bucket.to_vec())),
            (None, Some(tool)) => {
                let state = self
                    .frames
                    .iter()
                    .filter_map(|(frame, tools)| {
                        let bucket = tools.get(tool)?;
                        Some((frame.clone(), BTreeMap::from([(tool.to_owned(), bucket.clone())])))
                    })
                    .collect();
                Some(StateSnapshot::All(state))
            }
        }
    }

    /// Replace the requested scope wholesale with `snapshot`.
    ///
    /// The snapshot shape must match the scope (see [`Self::export_state`]).
    /// Every annotation must carry the frame and tool of the bucket it sits in.
    /// Empty buckets are dropped. On error the store is unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ScopeMismatch`] or [`StoreError::BucketMismatch`].
    pub fn import_state(
        &mut self,
        snapshot: StateSnapshot,
        frame_of_reference_uid: Option<&str>,
        tool_name: Option<&str>,
    ) -> Result<(), StoreError> {
        let count = snapshot.annotation_count();
        match (frame_of_reference_uid, tool_name, snapshot) {
            (None, None, StateSnapshot::All(state)) => {
                for (frame, tools) in &state {
                    check_frame(frame, tools)?;
                }
                self.frames = prune_state(state);
            }
            (None, Some(tool), StateSnapshot::All(state)) => {
                for (frame, tools) in &state {
                    for (bucket_tool, bucket) in tools {
                        if bucket_tool != tool {
                            return Err(StoreError::ScopeMismatch { shape: "all (other tools)", scope: "tool" });
                        }
                        check_bucket(frame, bucket_tool, bucket)?;
                    }
                }
                for tools in self.frames.values_mut() {
                    tools.remove(tool);
                }
                self.frames.retain(|_, tools| !tools.is_empty());
                for (frame, mut tools) in state {
                    if let Some(bucket) = tools.remove(tool).filter(|b| !b.is_empty()) {
                        self.frames.entry(frame).or_default().insert(tool.to_owned(), bucket);
                    }
                }
            }
            (Some(frame), None, StateSnapshot::Frame(tools)) => {
                check_frame(frame, &tools)?;
                let tools = prune_tools(tools);
                if tools.is_empty() {
                    self.frames.remove(frame);
                } else {
                    self.frames.insert(frame.to_owned(), tools);
                }
            }
            (Some(frame), Some(tool), StateSnapshot::Bucket(bucket)) => {
                check_bucket(frame, tool, &bucket)?;
                if bucket.is_empty() {
                    if let Some(tools) = self.frames.get_mut(frame) {
                        tools.remove(tool);
                        if tools.is_empty() {
                            self.frames.remove(frame);
                        }
                    }
                } else {
                    self.frames
                        .entry(frame.to_owned())
                        .or_default()
                        .insert(tool.to_owned(), bucket);
                }
            }
            (frame, tool, snapshot) => {
                return Err(StoreError::ScopeMismatch { shape: snapshot.shape(), scope: scope_name(frame, tool) });
            }
        }
        info!(frame = ?frame_of_reference_uid, tool = ?tool_name, count, "annotation state imported");
        Ok(())
    }

    // --- Invalidation ---

    /// Mark every annotation under `frame_of_reference_uid` whose invalidated
    /// flag is defined as stale. Returns the number of annotations touched.
    pub fn on_volume_modified(&mut self, frame_of_reference_uid: &str) -> usize {
        let Some(tools) = self.frames.get_mut(frame_of_reference_uid) else {
            return 0;
        };
        let mut touched = 0;
        for handle in tools.values_mut().flatten() {
            if handle.data.invalidated.is_some() {
                Arc::make_mut(handle).data.invalidated = Some(true);
                touched += 1;
            }
        }
        info!(frame = %frame_of_reference_uid, touched, "volume modified; annotations invalidated");
        touched
    }

    fn locate(&self, uid: AnnotationUid, filter: LookupFilter<'_>) -> Option<(String, String, usize)> {
        for (frame, tools) in &self.frames {
            if filter.frame_of_reference_uid.is_some_and(|f| f != frame) {
                continue;
            }
            for (tool, bucket) in tools {
                if filter.tool_name.is_some_and(|t| t != tool) {
                    continue;
                }
                if let Some(index) = bucket.iter().position(|a| a.annotation_uid == uid) {
                    return Some((frame.clone(), tool.clone(), index));
                }
            }
        }
        None
    }
}

fn scope_name(frame: Option<&str>, tool: Option<&str>) -> &'static str {
    match (frame, tool) {
        (None, None) => "all",
        (None, Some(_)) => "tool",
        (Some(_), None) => "frame",
        (Some(_), Some(_)) => "bucket",
    }
}

fn check_frame(frame: &str, tools: &ToolAnnotations) -> Result<(), StoreError> {
    for (tool, bucket) in tools {
        check_bucket(frame, tool, bucket)?;
    }
    Ok(())
}

fn check_bucket(frame: &str, tool: &str, bucket: &[AnnotationHandle]) -> Result<(), StoreError> {
    match bucket
        .iter()
        .find(|a| a.frame_of_reference_uid() != frame || a.tool_name() != tool)
    {
        Some(a) => Err(StoreError::BucketMismatch {
            uid: a.annotation_uid,
            frame: a.frame_of_reference_uid().to_owned(),
            tool: a.tool_name().to_owned(),
            bucket_frame: frame.to_owned(),
            bucket_tool: tool.to_owned(),
        }),
        None => Ok(()),
    }
}

fn prune_tools(tools: ToolAnnotations) -> ToolAnnotations {
    tools.into_iter().filter(|(_, bucket)| !bucket.is_empty()).collect()
}

fn prune_state(state: AnnotationState) -> AnnotationState {
    state
        .into_iter()
        .map(|(frame, tools)| (frame, prune_tools(tools)))
        .filter(|(_, tools)| !tools.is_empty())
        .collect()
}
