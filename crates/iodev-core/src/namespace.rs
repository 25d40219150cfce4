// ── Object namespace utilities ──
//
// Pure functions over dotted object ids (`alias.0.kitchen.light.SET`).

use std::sync::LazyLock;

use regex::Regex;

/// Reserved pseudo-folder for devices found outside the editable namespaces.
pub const AUTO_DETECTED_SEGMENT: &str = "automatically_detected";
/// Reserved pseudo-folder mirroring the linked-devices namespace.
pub const LINKED_DEVICES_SEGMENT: &str = "linked_devices";

/// Any run of characters outside the id alphabet.
static FORBIDDEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[^\p{Ll}\p{Lu}\p{Nd}._\-/ :!#$%&()+=@^{}|~]+").expect("valid forbidden-chars regex")
});

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s").expect("valid whitespace regex"));

/// Everything before the last `.`, or `""` for a single-segment id.
pub fn parent_id(id: &str) -> &str {
    id.rfind('.').map_or("", |pos| &id[..pos])
}

/// Everything after the last `.`, or the whole id.
pub fn last_segment(id: &str) -> &str {
    id.rfind('.').map_or(id, |pos| &id[pos + 1..])
}

pub fn join(parent: &str, segment: &str) -> String {
    if parent.is_empty() {
        segment.to_owned()
    } else {
        format!("{parent}.{segment}")
    }
}

pub fn segment_count(id: &str) -> usize {
    if id.is_empty() { 0 } else { id.split('.').count() }
}

/// `true` if `id` is `prefix` itself or lies below it.
pub fn is_within(id: &str, prefix: &str) -> bool {
    id.strip_prefix(prefix)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('.'))
}

/// `true` if `id` lies strictly below `prefix`.
pub fn is_below(id: &str, prefix: &str) -> bool {
    id.strip_prefix(prefix).is_some_and(|rest| rest.starts_with('.'))
}

/// Path of `id` relative to `root`, or `id` unchanged when outside it.
pub fn relative_to<'a>(id: &'a str, root: &str) -> &'a str {
    id.strip_prefix(root)
        .and_then(|rest| rest.strip_prefix('.'))
        .unwrap_or(id)
}

/// Move `id` from below `old_prefix` to below `new_prefix`.
pub fn rebase(id: &str, old_prefix: &str, new_prefix: &str) -> Option<String> {
    if id == old_prefix {
        return Some(new_prefix.to_owned());
    }
    id.strip_prefix(old_prefix)
        .and_then(|rest| rest.strip_prefix('.'))
        .map(|rest| join(new_prefix, rest))
}

/// Turn free text into a single id segment.
///
/// Runs of forbidden characters collapse into one `_`; whitespace and
/// dots each become `_`. Idempotent, and non-empty for non-empty input.
pub fn sanitize_segment(text: &str) -> String {
    let replaced = FORBIDDEN.replace_all(text, "_");
    let replaced = WHITESPACE.replace_all(&replaced, "_");
    replaced.replace('.', "_")
}

/// `true` for the two read-only pseudo-folders under `alias_ns`.
pub fn is_reserved_folder(id: &str, alias_ns: &str) -> bool {
    parent_id(id) == alias_ns
        && matches!(last_segment(id), AUTO_DETECTED_SEGMENT | LINKED_DEVICES_SEGMENT)
}

/// `true` if `id` is a reserved pseudo-folder or lies below one.
pub fn is_in_reserved_folder(id: &str, alias_ns: &str) -> bool {
    is_within(id, &join(alias_ns, AUTO_DETECTED_SEGMENT))
        || is_within(id, &join(alias_ns, LINKED_DEVICES_SEGMENT))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parent_and_last_segment() {
        assert_eq!(parent_id("alias.0.kitchen.light"), "alias.0.kitchen");
        assert_eq!(parent_id("alias"), "");
        assert_eq!(last_segment("alias.0.kitchen.light"), "light");
        assert_eq!(last_segment("alias"), "alias");
    }

    #[test]
    fn join_and_segments() {
        assert_eq!(join("", "alias"), "alias");
        assert_eq!(join("alias.0", "x"), "alias.0.x");
        assert_eq!(segment_count(""), 0);
        assert_eq!(segment_count("alias.0.x"), 3);
    }

    #[test]
    fn within_respects_segment_boundaries() {
        assert!(is_within("alias.0.kitchen", "alias.0.kitchen"));
        assert!(is_within("alias.0.kitchen.light", "alias.0.kitchen"));
        assert!(!is_within("alias.0.kitchenette", "alias.0.kitchen"));
        assert!(!is_below("alias.0.kitchen", "alias.0.kitchen"));
    }

    #[test]
    fn relative_and_rebase() {
        assert_eq!(relative_to("alias.0.a.b", "alias.0"), "a.b");
        assert_eq!(relative_to("enum.rooms", "alias.0"), "enum.rooms");
        assert_eq!(
            rebase("alias.0.a.b.c", "alias.0.a", "alias.0.z").as_deref(),
            Some("alias.0.z.b.c")
        );
        assert_eq!(rebase("alias.0.ab", "alias.0.a", "alias.0.z"), None);
    }

    #[test]
    fn sanitize_replaces_forbidden_whitespace_and_dots() {
        assert_eq!(sanitize_segment("Living room"), "Living_room");
        assert_eq!(sanitize_segment("a.b"), "a_b");
        assert_eq!(sanitize_segment("Küche*?[]"), "Küche_");
        assert_eq!(sanitize_segment("x\t\ty"), "x_y");
        assert_eq!(sanitize_segment("(1) #2 @home"), "(1)_#2_@home");
    }

    #[test]
    fn sanitize_is_idempotent() {
        let samples = [
            "Living room",
            "a..b",
            "ÄÖÜ ß 12",
            "**",
            "tab\there",
            "日本語",
            "a/b:c!d",
            " ",
            "emoji 💡 lamp",
        ];
        for s in samples {
            let once = sanitize_segment(s);
            assert_eq!(sanitize_segment(&once), once, "input {s:?}");
            assert!(!once.is_empty());
        }
    }

    #[test]
    fn reserved_folders() {
        assert!(is_reserved_folder("alias.0.automatically_detected", "alias.0"));
        assert!(is_reserved_folder("alias.0.linked_devices", "alias.0"));
        assert!(!is_reserved_folder("alias.0.x.linked_devices", "alias.0"));
        assert!(is_in_reserved_folder("alias.0.linked_devices.a.b", "alias.0"));
        assert!(!is_in_reserved_folder("alias.0.linked_devices_x", "alias.0"));
    }
}
