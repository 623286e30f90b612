//! Partition descriptor, carried here for data-model completeness (§3, §10.6).
//!
//! The files stage never formats or partitions disks — that belongs to an
//! earlier, out-of-scope stage — but this crate is the validated config
//! tree's single source of truth, so the type and its equality semantics
//! live here rather than being reinvented by whatever consumes it.

use serde::{Deserialize, Serialize};

use crate::Image;

/// Maximum partition label length, per the GUID Partition Table spec (56
/// bytes / 36 UTF-16 code units of partition name).
pub const PARTITION_LABEL_MAX_LEN: usize = 36;

/// Matches a GUID, or the empty string meaning "any". Validated upstream by
/// the config parser; carried here so there's one place that defines it.
pub const GUID_REGEX: &str =
    r"^([0-9A-Fa-f]{8}-[0-9A-Fa-f]{4}-[0-9A-Fa-f]{4}-[0-9A-Fa-f]{4}-[0-9A-Fa-f]{12})?$";

/// A single partition table entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Partition {
    pub label: String,
    pub number: u32,
    pub size: u64,
    pub start: u64,
    pub type_guid: String,
    pub guid: String,
    #[serde(default)]
    pub images: Option<Vec<Image>>,
}

/// Structural equality, with an absent image list treated as equal to an
/// empty one. The original implementation's `Equal` short-circuited into the
/// wrong boolean on the very first field comparison; this is a clean
/// rewrite, not a port, of the intended contract (§9).
impl PartialEq for Partition {
    fn eq(&self, other: &Self) -> bool {
        self.label == other.label
            && self.number == other.number
            && self.size == other.size
            && self.start == other.start
            && self.type_guid == other.type_guid
            && self.guid == other.guid
            && images_equal(&self.images, &other.images)
    }
}

pub(crate) fn images_equal(a: &Option<Vec<Image>>, b: &Option<Vec<Image>>) -> bool {
    const EMPTY: &Vec<Image> = &Vec::new();
    a.as_ref().unwrap_or(EMPTY) == b.as_ref().unwrap_or(EMPTY)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn partition(images: Option<Vec<Image>>) -> Partition {
        Partition {
            label: "root".into(),
            number: 1,
            size: 0,
            start: 0,
            type_guid: String::new(),
            guid: String::new(),
            images,
        }
    }

    #[test]
    fn none_images_equals_empty_vec() {
        assert_eq!(partition(None), partition(Some(vec![])));
    }

    #[test]
    fn differing_images_are_unequal() {
        let img = Image {
            source: "http://example.com/a.img".into(),
            verification: None,
        };
        assert_ne!(partition(None), partition(Some(vec![img])));
    }

    #[test]
    fn differing_scalar_field_is_unequal() {
        let mut a = partition(None);
        let b = partition(None);
        a.label = "data".into();
        assert_ne!(a, b);
    }
}
