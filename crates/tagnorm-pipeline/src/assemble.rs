//! Entry assembly: from five stage lookups to one `TagMapEntry` per raw tag.
//!
//! Assembly is a pure function of the lookups and the raw tag. It never
//! fails; every omission by the oracle is covered by a fallback so each raw
//! tag yields exactly one entry.

use std::collections::{HashMap, HashSet};

use chrono::Utc;
use tracing::trace;

use tagnorm_core::{
    normalize, CanonicalTag, ClassifiedTag, DescriptorInfo, SplitResult, SubgenreInfo, TagClass,
    TagMapEntry, TagType,
};

use crate::blacklist::Blacklist;

/// Stage outputs of one batch, keyed by normalized source.
///
/// Duplicate sources from the oracle resolve last-wins.
#[derive(Debug, Clone, Default)]
pub struct StageLookups {
    pub canonical: HashMap<String, CanonicalTag>,
    pub splits: HashMap<String, SplitResult>,
    pub classes: HashMap<String, ClassifiedTag>,
    pub descriptors: HashMap<String, DescriptorInfo>,
    pub subgenres: HashMap<String, SubgenreInfo>,
}

fn index_by_source<T>(records: Vec<T>, source: fn(&T) -> &str) -> HashMap<String, T> {
    records
        .into_iter()
        .map(|r| (source(&r).to_string(), r))
        .collect()
}

impl StageLookups {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_canonical(mut self, records: Vec<CanonicalTag>) -> Self {
        self.canonical = index_by_source(records, |r| r.source.as_str());
        self
    }

    pub fn with_splits(mut self, records: Vec<SplitResult>) -> Self {
        self.splits = index_by_source(records, |r| r.source.as_str());
        self
    }

    pub fn with_classes(mut self, records: Vec<ClassifiedTag>) -> Self {
        self.classes = index_by_source(records, |r| r.source.as_str());
        self
    }

    pub fn with_descriptors(mut self, records: Vec<DescriptorInfo>) -> Self {
        self.descriptors = index_by_source(records, |r| r.source.as_str());
        self
    }

    pub fn with_subgenres(mut self, records: Vec<SubgenreInfo>) -> Self {
        self.subgenres = index_by_source(records, |r| r.source.as_str());
        self
    }

    /// Canonical record for a raw tag, looked up by its normalized form.
    pub fn canonical_for(&self, raw: &str) -> Option<&CanonicalTag> {
        self.canonical.get(&normalize(raw))
    }

    fn class_of(&self, tag: &str) -> Option<TagClass> {
        self.classes.get(tag).map(|c| c.class)
    }
}

/// The canonical string used downstream: the oracle's, or the normalized raw
/// tag when the oracle returned an empty canonical.
pub fn canonical_form(record: &CanonicalTag, raw: &str) -> String {
    if record.canonical.is_empty() {
        normalize(raw)
    } else {
        record.canonical.clone()
    }
}

/// Ordered, duplicate-free final tags with their types.
#[derive(Default)]
struct FinalTags {
    tags: Vec<String>,
    types: Vec<TagType>,
}

impl FinalTags {
    fn push(&mut self, tag: &str, tag_type: TagType) {
        if tag.is_empty() || self.tags.iter().any(|t| t == tag) {
            return;
        }
        self.tags.push(tag.to_string());
        self.types.push(tag_type);
    }
}

/// Strings touched while assembling one tag, in first-seen order.
#[derive(Default)]
struct Touched {
    order: Vec<String>,
    seen: HashSet<String>,
}

impl Touched {
    fn mark(&mut self, s: &str) {
        if !s.is_empty() && self.seen.insert(s.to_string()) {
            self.order.push(s.to_string());
        }
    }
}

/// Deduplicate tags preserving first-seen order and realign the parallel
/// type list: truncated when too long, padded with `Other` when too short.
pub fn align_tags(tags: Vec<String>, types: Vec<TagType>) -> (Vec<String>, Vec<TagType>) {
    let mut out_tags = Vec::with_capacity(tags.len());
    let mut out_types = Vec::with_capacity(tags.len());
    let mut seen = HashSet::new();

    for (i, tag) in tags.into_iter().enumerate() {
        if seen.insert(tag.clone()) {
            out_types.push(types.get(i).copied().unwrap_or_default());
            out_tags.push(tag);
        }
    }
    (out_tags, out_types)
}

fn fallback_entry(raw: &str, model: &str) -> TagMapEntry {
    let canonical = CanonicalTag::fallback(raw);
    let split = SplitResult::single(&canonical.canonical);
    TagMapEntry {
        source: raw.to_string(),
        normalized_tags: vec![canonical.canonical.clone()],
        tag_types: vec![TagType::Other],
        canonical_stage: canonical,
        split_stage: split,
        classification_stage: Vec::new(),
        descriptor_stage: Vec::new(),
        subgenre_stage: Vec::new(),
        model: model.to_string(),
        created_at: Utc::now(),
    }
}

/// Build the entry for a single raw tag.
pub fn assemble_entry(raw: &str, lookups: &StageLookups, model: &str) -> TagMapEntry {
    let Some(canonical) = lookups.canonical_for(raw) else {
        trace!(tag = %raw, "No canonical record, using fallback entry");
        return fallback_entry(raw, model);
    };

    let canonical_str = canonical_form(canonical, raw);
    let split = lookups
        .splits
        .get(&canonical_str)
        .cloned()
        .unwrap_or_else(|| SplitResult::single(&canonical_str));

    let mut out = FinalTags::default();
    let mut touched = Touched::default();

    for part in split.parts.iter().filter(|p| !p.is_empty()) {
        touched.mark(part);

        match lookups.subgenres.get(part) {
            Some(sub) if sub.is_subgenre => {
                out.push(part, TagType::Subgenre);
                touched.mark(&sub.parent_genre);
                out.push(&sub.parent_genre, TagType::Genre);
            }
            Some(_) => out.push(part, TagType::Genre),
            None => match lookups.class_of(part) {
                Some(TagClass::Genre) => out.push(part, TagType::Genre),
                Some(TagClass::Subgenre) => out.push(part, TagType::Subgenre),
                _ => {}
            },
        }

        if let Some(info) = lookups.descriptors.get(part) {
            for descriptor in &info.descriptors {
                if info.invalid_descriptors.contains(descriptor) {
                    continue;
                }
                touched.mark(descriptor);
                let tag_type = match lookups.class_of(descriptor) {
                    Some(TagClass::Mood) => TagType::Mood,
                    _ => TagType::Descriptor,
                };
                out.push(descriptor, tag_type);
            }
        }
    }

    if out.tags.is_empty() {
        trace!(tag = %raw, canonical = %canonical_str, "No typed parts, keeping canonical as other");
        out.push(&canonical_str, TagType::Other);
    }

    let (normalized_tags, tag_types) = align_tags(out.tags, out.types);

    let classification_stage = touched
        .order
        .iter()
        .filter_map(|s| lookups.classes.get(s).cloned())
        .collect();
    let descriptor_stage = touched
        .order
        .iter()
        .filter_map(|s| lookups.descriptors.get(s).cloned())
        .collect();
    let subgenre_stage = touched
        .order
        .iter()
        .filter_map(|s| lookups.subgenres.get(s).cloned())
        .collect();

    TagMapEntry {
        source: raw.to_string(),
        normalized_tags,
        tag_types,
        canonical_stage: CanonicalTag {
            source: raw.to_string(),
            ..canonical.clone()
        },
        split_stage: split,
        classification_stage,
        descriptor_stage,
        subgenre_stage,
        model: model.to_string(),
        created_at: Utc::now(),
    }
}

/// Drop blacklisted final tags together with their aligned types.
///
/// Returns the number of tags removed.
pub fn apply_blacklist_to_final_tags(entry: &mut TagMapEntry, blacklist: &Blacklist) -> usize {
    if blacklist.is_empty() {
        return 0;
    }

    let before = entry.normalized_tags.len();
    let (tags, types): (Vec<String>, Vec<TagType>) = entry
        .typed_tags()
        .filter(|(tag, _)| !blacklist.contains(tag))
        .map(|(tag, tag_type)| (tag.to_string(), tag_type))
        .unzip();

    entry.normalized_tags = tags;
    entry.tag_types = types;
    before - entry.normalized_tags.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tagnorm_core::CanonicalAction;

    const MODEL: &str = "test-model";

    fn canonical(source: &str, canonical: &str) -> CanonicalTag {
        CanonicalTag {
            source: source.to_string(),
            canonical: canonical.to_string(),
            action: CanonicalAction::Identity,
            reason: String::new(),
        }
    }

    fn split(source: &str, parts: &[&str]) -> SplitResult {
        SplitResult {
            source: source.to_string(),
            parts: parts.iter().map(|p| p.to_string()).collect(),
            reason: String::new(),
        }
    }

    fn class(source: &str, class: TagClass) -> ClassifiedTag {
        ClassifiedTag {
            source: source.to_string(),
            class,
            reason: String::new(),
        }
    }

    fn descriptors(source: &str, valid: &[&str], invalid: &[&str]) -> DescriptorInfo {
        DescriptorInfo {
            source: source.to_string(),
            genre_like: String::new(),
            descriptors: valid.iter().map(|d| d.to_string()).collect(),
            invalid_descriptors: invalid.iter().map(|d| d.to_string()).collect(),
            reason: String::new(),
        }
    }

    fn subgenre(source: &str, is_subgenre: bool, parent: &str) -> SubgenreInfo {
        SubgenreInfo {
            source: source.to_string(),
            is_subgenre,
            parent_genre: parent.to_string(),
            reason: String::new(),
        }
    }

    #[test]
    fn test_simple_genre_scenario() {
        let lookups = StageLookups::new()
            .with_canonical(vec![canonical("deep house", "deep house")])
            .with_splits(vec![split("deep house", &["deep house"])])
            .with_subgenres(vec![subgenre("deep house", true, "house")]);

        let entry = assemble_entry("Deep House", &lookups, MODEL);
        assert_eq!(entry.source, "Deep House");
        assert_eq!(entry.canonical_stage.source, "Deep House");
        assert_eq!(entry.canonical_stage.canonical, "deep house");
        assert_eq!(entry.normalized_tags, vec!["deep house", "house"]);
        assert_eq!(entry.tag_types, vec![TagType::Subgenre, TagType::Genre]);
        assert_eq!(entry.model, MODEL);
        assert_eq!(entry.subgenre_stage.len(), 1);
    }

    #[test]
    fn test_compound_split_scenario() {
        let lookups = StageLookups::new()
            .with_canonical(vec![canonical("rock / metal", "rock / metal")])
            .with_splits(vec![split("rock / metal", &["rock", "metal"])])
            .with_classes(vec![
                class("rock", TagClass::Genre),
                class("metal", TagClass::Genre),
            ]);

        let entry = assemble_entry("Rock / Metal", &lookups, MODEL);
        assert_eq!(entry.normalized_tags, vec!["rock", "metal"]);
        assert_eq!(entry.tag_types, vec![TagType::Genre, TagType::Genre]);
        assert_eq!(entry.classification_stage.len(), 2);
    }

    #[test]
    fn test_subgenre_stage_overrides_classifier() {
        let lookups = StageLookups::new()
            .with_canonical(vec![canonical("grunge", "grunge")])
            .with_splits(vec![split("grunge", &["grunge"])])
            .with_classes(vec![class("grunge", TagClass::Genre)])
            .with_subgenres(vec![subgenre("grunge", true, "rock")]);

        let entry = assemble_entry("grunge", &lookups, MODEL);
        assert_eq!(entry.normalized_tags, vec!["grunge", "rock"]);
        assert_eq!(entry.tag_types, vec![TagType::Subgenre, TagType::Genre]);
    }

    #[test]
    fn test_subgenre_stage_can_demote_to_genre() {
        let lookups = StageLookups::new()
            .with_canonical(vec![canonical("house", "house")])
            .with_classes(vec![class("house", TagClass::Subgenre)])
            .with_subgenres(vec![subgenre("house", false, "")]);

        let entry = assemble_entry("House", &lookups, MODEL);
        assert_eq!(entry.normalized_tags, vec!["house"]);
        assert_eq!(entry.tag_types, vec![TagType::Genre]);
    }

    #[test]
    fn test_classifier_subgenre_fallback() {
        let lookups = StageLookups::new()
            .with_canonical(vec![canonical("shoegaze", "shoegaze")])
            .with_classes(vec![class("shoegaze", TagClass::Subgenre)]);

        let entry = assemble_entry("Shoegaze", &lookups, MODEL);
        assert_eq!(entry.tag_types, vec![TagType::Subgenre]);
    }

    #[test]
    fn test_descriptor_with_mood() {
        let lookups = StageLookups::new()
            .with_canonical(vec![canonical("dark", "dark")])
            .with_classes(vec![class("dark", TagClass::Mood)])
            .with_descriptors(vec![descriptors("dark", &["dark"], &[])]);

        let entry = assemble_entry("Dark", &lookups, MODEL);
        assert_eq!(entry.normalized_tags, vec!["dark"]);
        assert_eq!(entry.tag_types, vec![TagType::Mood]);
    }

    #[test]
    fn test_descriptors_and_invalid_descriptors() {
        let lookups = StageLookups::new()
            .with_canonical(vec![canonical("dark ambient", "dark ambient")])
            .with_splits(vec![split("dark ambient", &["dark ambient"])])
            .with_classes(vec![class("dark ambient", TagClass::Subgenre)])
            .with_descriptors(vec![descriptors(
                "dark ambient",
                &["atmospheric", "dark"],
                &["seen live"],
            )])
            .with_subgenres(vec![subgenre("dark ambient", true, "ambient")]);

        let entry = assemble_entry("Dark Ambient", &lookups, MODEL);
        assert_eq!(
            entry.normalized_tags,
            vec!["dark ambient", "ambient", "atmospheric", "dark"]
        );
        assert_eq!(
            entry.tag_types,
            vec![
                TagType::Subgenre,
                TagType::Genre,
                TagType::Descriptor,
                TagType::Descriptor
            ]
        );
        assert!(!entry.normalized_tags.contains(&"seen live".to_string()));
    }

    #[test]
    fn test_descriptor_listed_as_invalid_is_discarded() {
        let lookups = StageLookups::new()
            .with_canonical(vec![canonical("lofi", "lofi")])
            .with_descriptors(vec![descriptors("lofi", &["lofi", "chill"], &["lofi"])]);

        let entry = assemble_entry("lofi", &lookups, MODEL);
        assert_eq!(entry.normalized_tags, vec!["chill"]);
    }

    #[test]
    fn test_canonical_omission_fallback() {
        let lookups = StageLookups::new().with_canonical(vec![canonical("rock", "rock")]);

        let entry = assemble_entry("Obscuretag123", &lookups, MODEL);
        assert_eq!(entry.source, "Obscuretag123");
        assert_eq!(entry.canonical_stage.source, "Obscuretag123");
        assert_eq!(entry.normalized_tags, vec!["obscuretag123"]);
        assert_eq!(entry.tag_types, vec![TagType::Other]);
        assert_eq!(entry.split_stage.parts, vec!["obscuretag123"]);
        assert!(entry.classification_stage.is_empty());
        assert!(entry.descriptor_stage.is_empty());
        assert!(entry.subgenre_stage.is_empty());
    }

    #[test]
    fn test_unclassified_parts_fall_back_to_canonical() {
        let lookups = StageLookups::new()
            .with_canonical(vec![canonical("dnb", "drum and bass")])
            .with_classes(vec![class("drum and bass", TagClass::Invalid)]);

        let entry = assemble_entry("DnB", &lookups, MODEL);
        assert_eq!(entry.normalized_tags, vec!["drum and bass"]);
        assert_eq!(entry.tag_types, vec![TagType::Other]);
        // Touched records are kept even though they produced nothing.
        assert_eq!(entry.classification_stage.len(), 1);
    }

    #[test]
    fn test_empty_canonical_uses_raw() {
        let lookups = StageLookups::new().with_canonical(vec![canonical("weird tag", "")]);

        let entry = assemble_entry("Weird  Tag", &lookups, MODEL);
        assert_eq!(entry.normalized_tags, vec!["weird tag"]);
        assert_eq!(entry.tag_types, vec![TagType::Other]);
    }

    #[test]
    fn test_no_duplicate_final_tags() {
        let lookups = StageLookups::new()
            .with_canonical(vec![canonical("deep house / house", "deep house / house")])
            .with_splits(vec![split("deep house / house", &["deep house", "house"])])
            .with_subgenres(vec![
                subgenre("deep house", true, "house"),
                subgenre("house", false, ""),
            ]);

        let entry = assemble_entry("Deep House / House", &lookups, MODEL);
        assert_eq!(entry.normalized_tags, vec!["deep house", "house"]);
        assert_eq!(entry.tag_types, vec![TagType::Subgenre, TagType::Genre]);
        assert!(entry.is_aligned());
    }

    #[test]
    fn test_parent_genre_audit_trail() {
        let lookups = StageLookups::new()
            .with_canonical(vec![canonical("deep house", "deep house")])
            .with_classes(vec![
                class("deep house", TagClass::Subgenre),
                class("house", TagClass::Genre),
                class("unrelated", TagClass::Genre),
            ])
            .with_subgenres(vec![subgenre("deep house", true, "house")]);

        let entry = assemble_entry("deep house", &lookups, MODEL);
        let sources: Vec<_> = entry
            .classification_stage
            .iter()
            .map(|c| c.source.as_str())
            .collect();
        assert_eq!(sources, vec!["deep house", "house"]);
    }

    #[test]
    fn test_align_tags_pads_and_truncates() {
        let (tags, types) = align_tags(
            vec!["a".into(), "b".into(), "a".into(), "c".into()],
            vec![TagType::Genre],
        );
        assert_eq!(tags, vec!["a", "b", "c"]);
        assert_eq!(types, vec![TagType::Genre, TagType::Other, TagType::Other]);

        let (tags, types) = align_tags(
            vec!["a".into()],
            vec![TagType::Mood, TagType::Genre, TagType::Genre],
        );
        assert_eq!(tags, vec!["a"]);
        assert_eq!(types, vec![TagType::Mood]);
    }

    #[test]
    fn test_apply_blacklist_to_final_tags() {
        let lookups = StageLookups::new()
            .with_canonical(vec![canonical("dark ambient", "dark ambient")])
            .with_descriptors(vec![descriptors("dark ambient", &["favorites"], &[])])
            .with_subgenres(vec![subgenre("dark ambient", true, "ambient")]);

        let mut entry = assemble_entry("dark ambient", &lookups, MODEL);
        let removed =
            apply_blacklist_to_final_tags(&mut entry, &Blacklist::from_tags(["Favorites"]));
        assert_eq!(removed, 1);
        assert_eq!(entry.normalized_tags, vec!["dark ambient", "ambient"]);
        assert_eq!(entry.tag_types, vec![TagType::Subgenre, TagType::Genre]);

        assert_eq!(
            apply_blacklist_to_final_tags(&mut entry, &Blacklist::empty()),
            0
        );
    }
}
